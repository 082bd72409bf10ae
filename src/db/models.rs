use std::fmt;
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::Row;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

pub const EMAIL_MAX_LEN: usize = 120;
pub const PASSWORD_MAX_LEN: usize = 80;
pub const URL_MAX_LEN: usize = 255;
pub const COMMENT_MAX_LEN: usize = 255;

/// Integer identities assigned by SQLite. One newtype per table so a post id
/// can never be passed where a user id is expected.
macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            pub fn new(id: i64) -> Self {
                Self(id)
            }

            pub fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.0))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                i64::column_result(value).map(Self)
            }
        }
    };
}

entity_id!(
    /// Identity of a row in `user`
    UserId
);
entity_id!(
    /// Identity of a row in `post`
    PostId
);
entity_id!(
    /// Identity of a row in `media`
    MediaId
);
entity_id!(
    /// Identity of a row in `comment`
    CommentId
);

// --- MediaType ---

/// Kind of attachment. Stored as `'IMAGE'` / `'VIDEO'`; the column carries a
/// CHECK constraint so the set stays closed even for raw SQL writers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, async_graphql::Enum)]
#[serde(rename_all = "UPPERCASE")]
pub enum MediaType {
    Image,
    Video,
}

impl MediaType {
    pub const ALL: [MediaType; 2] = [MediaType::Image, MediaType::Video];

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Image => "IMAGE",
            MediaType::Video => "VIDEO",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown media type {0:?} (expected IMAGE or VIDEO)")]
pub struct UnknownMediaType(pub String);

impl FromStr for MediaType {
    type Err = UnknownMediaType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MediaType::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownMediaType(s.to_string()))
    }
}

impl ToSql for MediaType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for MediaType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: UnknownMediaType| FromSqlError::Other(Box::new(e)))
    }
}

// --- Entities ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    /// Stored representation (a bcrypt hash when written through the API)
    #[serde(skip_serializing, default)]
    pub password: String,
    pub is_active: bool,
}

impl User {
    pub(crate) const COLUMNS: &'static str = "id, email, password, is_active";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            email: row.get(1)?,
            password: row.get(2)?,
            is_active: row.get(3)?,
        })
    }

    pub fn verify_password(&self, plaintext: &str) -> bool {
        crate::password::verify(plaintext, &self.password)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub user_id: UserId,
}

impl Post {
    pub(crate) const COLUMNS: &'static str = "id, user_id";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    pub id: MediaId,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub url: String,
    pub post_id: PostId,
}

impl Media {
    pub(crate) const COLUMNS: &'static str = "id, type, url, post_id";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            media_type: row.get(1)?,
            url: row.get(2)?,
            post_id: row.get(3)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub comment_text: String,
    pub author_id: UserId,
    pub post_id: PostId,
}

impl Comment {
    pub(crate) const COLUMNS: &'static str = "id, comment_text, author_id, post_id";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            comment_text: row.get(1)?,
            author_id: row.get(2)?,
            post_id: row.get(3)?,
        })
    }
}

/// One directional edge of the `followers` join table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Follow {
    pub follower_id: UserId,
    pub followed_id: UserId,
}

/// Row counts per table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaStats {
    pub users: u64,
    pub posts: u64,
    pub media: u64,
    pub comments: u64,
    pub follows: u64,
}

// --- Write-side records ---

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl NewUser {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            is_active: true,
        }
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        check_text("user", "email", &self.email, EMAIL_MAX_LEN)?;
        check_text("user", "password", &self.password, PASSWORD_MAX_LEN)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct NewPost {
    pub user_id: UserId,
}

impl NewPost {
    pub fn new(user_id: UserId) -> Self {
        Self { user_id }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewMedia {
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub url: String,
    pub post_id: PostId,
}

impl NewMedia {
    pub fn new(media_type: MediaType, url: impl Into<String>, post_id: PostId) -> Self {
        Self {
            media_type,
            url: url.into(),
            post_id,
        }
    }

    /// Build from an untyped media kind, rejecting anything outside the enum.
    pub fn parse(kind: &str, url: impl Into<String>, post_id: PostId) -> Result<Self, StoreError> {
        Ok(Self::new(kind.parse()?, url, post_id))
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        check_text("media", "url", &self.url, URL_MAX_LEN)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewComment {
    pub comment_text: String,
    pub author_id: UserId,
    pub post_id: PostId,
}

impl NewComment {
    pub fn new(comment_text: impl Into<String>, author_id: UserId, post_id: PostId) -> Self {
        Self {
            comment_text: comment_text.into(),
            author_id,
            post_id,
        }
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        check_text("comment", "comment_text", &self.comment_text, COMMENT_MAX_LEN)
    }
}

/// Blank counts as missing; length is measured in characters, matching
/// SQLite's `length()` on TEXT.
fn check_text(
    entity: &'static str,
    field: &'static str,
    value: &str,
    max: usize,
) -> Result<(), StoreError> {
    if value.trim().is_empty() {
        return Err(StoreError::Required { entity, field });
    }
    let actual = value.chars().count();
    if actual > max {
        return Err(StoreError::TooLong {
            entity,
            field,
            max,
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_type_parses_both_cases() {
        assert_eq!("IMAGE".parse::<MediaType>().unwrap(), MediaType::Image);
        assert_eq!("video".parse::<MediaType>().unwrap(), MediaType::Video);
    }

    #[test]
    fn media_type_rejects_unknown_values() {
        let err = "gif".parse::<MediaType>().unwrap_err();
        assert_eq!(err, UnknownMediaType("gif".to_string()));
        assert!("".parse::<MediaType>().is_err());
    }

    #[test]
    fn media_type_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&MediaType::Video).unwrap(), "\"VIDEO\"");
        let parsed: MediaType = serde_json::from_str("\"IMAGE\"").unwrap();
        assert_eq!(parsed, MediaType::Image);
        assert!(serde_json::from_str::<MediaType>("\"AUDIO\"").is_err());
    }

    #[test]
    fn new_media_parse_surfaces_enum_violation() {
        let err = NewMedia::parse("audio", "https://x/a.mp3", PostId(1)).unwrap_err();
        assert!(matches!(err, StoreError::InvalidMediaType(_)));
    }

    #[test]
    fn new_user_requires_email_and_password() {
        let err = NewUser::new("   ", "secret").validate().unwrap_err();
        assert!(matches!(
            err,
            StoreError::Required {
                entity: "user",
                field: "email"
            }
        ));

        let err = NewUser::new("a@x.com", "").validate().unwrap_err();
        assert!(matches!(err, StoreError::Required { field: "password", .. }));
    }

    #[test]
    fn new_user_enforces_max_lengths() {
        let email = format!("{}@x.com", "a".repeat(EMAIL_MAX_LEN));
        let err = NewUser::new(email, "secret").validate().unwrap_err();
        assert!(matches!(
            err,
            StoreError::TooLong {
                field: "email",
                max: EMAIL_MAX_LEN,
                ..
            }
        ));

        let err = NewUser::new("a@x.com", "p".repeat(PASSWORD_MAX_LEN + 1))
            .validate()
            .unwrap_err();
        assert!(matches!(err, StoreError::TooLong { field: "password", .. }));

        assert!(NewUser::new("a@x.com", "p".repeat(PASSWORD_MAX_LEN))
            .validate()
            .is_ok());
    }

    #[test]
    fn lengths_count_characters_not_bytes() {
        // 255 two-byte characters is exactly at the limit
        let text = "é".repeat(COMMENT_MAX_LEN);
        assert!(NewComment::new(text, UserId(1), PostId(1)).validate().is_ok());
    }

    #[test]
    fn new_media_requires_url() {
        let err = NewMedia::new(MediaType::Image, "", PostId(1))
            .validate()
            .unwrap_err();
        assert!(matches!(err, StoreError::Required { field: "url", .. }));
    }

    #[test]
    fn user_serialization_hides_password() {
        let user = User {
            id: UserId(7),
            email: "a@x.com".into(),
            password: "hash".into(),
            is_active: true,
        };
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["id"], 7);
        assert!(json.get("password").is_none());
    }

    #[test]
    fn new_user_defaults_to_active() {
        let parsed: NewUser =
            serde_json::from_str(r#"{"email":"a@x.com","password":"pw"}"#).unwrap();
        assert!(parsed.is_active);
    }
}
