// Repository pattern - every read and write against the social schema
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Params, Row, Transaction, TransactionBehavior};
use std::sync::Arc;

use crate::db::models::*;
use crate::db::DbPool;
use crate::error::{StoreError, StoreResult};

/// All operations on users, posts, media, comments and follow edges.
///
/// Relationship views (`posts_by_user`, `followers`, ...) are plain indexed
/// lookups by foreign key; nothing is cached or back-linked in memory.
#[async_trait]
pub trait SocialRepository: Send + Sync {
    // --- Users ---

    async fn create_user(&self, new: &NewUser) -> StoreResult<User>;

    async fn get_user(&self, id: UserId) -> StoreResult<Option<User>>;

    /// Exact (case-sensitive) match
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    async fn list_users(&self) -> StoreResult<Vec<User>>;

    async fn set_user_active(&self, id: UserId, active: bool) -> StoreResult<User>;

    /// Returns false when the user does not exist. Fails with
    /// [`StoreError::Restricted`] while the user still owns posts or comments;
    /// the user's follow edges go with it.
    async fn delete_user(&self, id: UserId) -> StoreResult<bool>;

    // --- Follow edges ---

    async fn follow(&self, follower: UserId, followed: UserId) -> StoreResult<Follow>;

    async fn unfollow(&self, follower: UserId, followed: UserId) -> StoreResult<bool>;

    async fn is_following(&self, follower: UserId, followed: UserId) -> StoreResult<bool>;

    /// Users that `id` follows (edges from `id`)
    async fn following(&self, id: UserId) -> StoreResult<Vec<User>>;

    /// Users following `id` (edges to `id`)
    async fn followers(&self, id: UserId) -> StoreResult<Vec<User>>;

    // --- Posts ---

    async fn create_post(&self, new: &NewPost) -> StoreResult<Post>;

    async fn get_post(&self, id: PostId) -> StoreResult<Option<Post>>;

    async fn posts_by_user(&self, user: UserId) -> StoreResult<Vec<Post>>;

    /// Fails with [`StoreError::Restricted`] while comments or media remain.
    async fn delete_post(&self, id: PostId) -> StoreResult<bool>;

    // --- Media ---

    async fn add_media(&self, new: &NewMedia) -> StoreResult<Media>;

    async fn get_media(&self, id: MediaId) -> StoreResult<Option<Media>>;

    async fn media_for_post(&self, post: PostId) -> StoreResult<Vec<Media>>;

    async fn delete_media(&self, id: MediaId) -> StoreResult<bool>;

    // --- Comments ---

    async fn add_comment(&self, new: &NewComment) -> StoreResult<Comment>;

    async fn get_comment(&self, id: CommentId) -> StoreResult<Option<Comment>>;

    async fn comments_on_post(&self, post: PostId) -> StoreResult<Vec<Comment>>;

    async fn comments_by_user(&self, user: UserId) -> StoreResult<Vec<Comment>>;

    async fn delete_comment(&self, id: CommentId) -> StoreResult<bool>;

    async fn stats(&self) -> StoreResult<SchemaStats>;
}

/// SQLite implementation
pub struct SqliteSocialRepository {
    pool: DbPool,
}

impl SqliteSocialRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Run `f` inside one IMMEDIATE transaction: all or nothing.
    fn write<T>(
        &self,
        op: &'static str,
        f: impl FnOnce(&Transaction<'_>) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        match f(&tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(e) => {
                // Dropping `tx` rolls it back
                if e.is_integrity_violation() {
                    tracing::warn!(op, error = %e, "Rejected write");
                } else {
                    tracing::error!(op, error = %e, "Write failed");
                }
                Err(e)
            }
        }
    }

    fn query_all<T, P: Params>(
        &self,
        sql: &str,
        params: P,
        map: fn(&Row<'_>) -> rusqlite::Result<T>,
    ) -> StoreResult<Vec<T>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, map)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn query_one<T, P: Params>(
        &self,
        sql: &str,
        params: P,
        map: fn(&Row<'_>) -> rusqlite::Result<T>,
    ) -> StoreResult<Option<T>> {
        let conn = self.pool.get()?;
        Ok(conn.query_row(sql, params, map).optional()?)
    }
}

// --- Query helpers ---

fn exists_where(
    conn: &Connection,
    table: &'static str,
    column: &'static str,
    id: i64,
) -> rusqlite::Result<bool> {
    conn.query_row(
        &format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE {column} = ?1)"),
        params![id],
        |row| row.get(0),
    )
}

/// Resolve a foreign key before writing so the error names the missing side.
fn require(
    conn: &Connection,
    entity: &'static str,
    target: &'static str,
    id: i64,
) -> StoreResult<()> {
    if exists_where(conn, target, "id", id)? {
        Ok(())
    } else {
        Err(StoreError::ForeignKey { entity, target, id })
    }
}

/// Enforce ON DELETE RESTRICT up front with a precise error.
fn restrict(
    conn: &Connection,
    entity: &'static str,
    id: i64,
    dependents: &[(&'static str, &'static str, &'static str)],
) -> StoreResult<()> {
    for &(table, column, label) in dependents {
        if exists_where(conn, table, column, id)? {
            return Err(StoreError::Restricted {
                entity,
                id,
                dependents: label,
            });
        }
    }
    Ok(())
}

fn count(conn: &Connection, table: &'static str) -> rusqlite::Result<u64> {
    let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
        row.get(0)
    })?;
    Ok(n as u64)
}

const FOLLOWING_SQL: &str = "SELECT u.id, u.email, u.password, u.is_active
     FROM followers f
     JOIN user u ON u.id = f.followed_id
     WHERE f.follower_id = ?1
     ORDER BY u.id";

const FOLLOWERS_SQL: &str = "SELECT u.id, u.email, u.password, u.is_active
     FROM followers f
     JOIN user u ON u.id = f.follower_id
     WHERE f.followed_id = ?1
     ORDER BY u.id";

#[async_trait]
impl SocialRepository for SqliteSocialRepository {
    async fn create_user(&self, new: &NewUser) -> StoreResult<User> {
        new.validate()?;

        let user = self.write("create_user", |tx| {
            tx.execute(
                "INSERT INTO user (email, password, is_active) VALUES (?1, ?2, ?3)",
                params![new.email, new.password, new.is_active],
            )
            .map_err(|e| StoreError::classify(e, "user", || format!("email {}", new.email)))?;

            Ok(User {
                id: UserId(tx.last_insert_rowid()),
                email: new.email.clone(),
                password: new.password.clone(),
                is_active: new.is_active,
            })
        })?;

        tracing::debug!(user_id = %user.id, "Created user");
        Ok(user)
    }

    async fn get_user(&self, id: UserId) -> StoreResult<Option<User>> {
        self.query_one(
            &format!("SELECT {} FROM user WHERE id = ?1", User::COLUMNS),
            params![id],
            User::from_row,
        )
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.query_one(
            &format!("SELECT {} FROM user WHERE email = ?1", User::COLUMNS),
            params![email],
            User::from_row,
        )
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        self.query_all(
            &format!("SELECT {} FROM user ORDER BY id", User::COLUMNS),
            [],
            User::from_row,
        )
    }

    async fn set_user_active(&self, id: UserId, active: bool) -> StoreResult<User> {
        let user = self.write("set_user_active", |tx| {
            let rows = tx.execute(
                "UPDATE user SET is_active = ?1 WHERE id = ?2",
                params![active, id],
            )?;
            if rows == 0 {
                return Err(StoreError::NotFound {
                    entity: "user",
                    id: id.get(),
                });
            }

            let user = tx.query_row(
                &format!("SELECT {} FROM user WHERE id = ?1", User::COLUMNS),
                params![id],
                User::from_row,
            )?;
            Ok(user)
        })?;

        tracing::debug!(user_id = %id, active, "Updated user active flag");
        Ok(user)
    }

    async fn delete_user(&self, id: UserId) -> StoreResult<bool> {
        let deleted = self.write("delete_user", |tx| {
            if !exists_where(tx, "user", "id", id.get())? {
                return Ok(false);
            }
            restrict(
                tx,
                "user",
                id.get(),
                &[
                    ("post", "user_id", "posts"),
                    ("comment", "author_id", "comments"),
                ],
            )?;

            let rows = tx
                .execute("DELETE FROM user WHERE id = ?1", params![id])
                .map_err(|e| StoreError::classify(e, "user", || format!("id {id}")))?;
            Ok(rows > 0)
        })?;

        if deleted {
            tracing::debug!(user_id = %id, "Deleted user");
        }
        Ok(deleted)
    }

    async fn follow(&self, follower: UserId, followed: UserId) -> StoreResult<Follow> {
        if follower == followed {
            tracing::warn!(user_id = %follower, "Rejected self-follow");
            return Err(StoreError::SelfFollow(follower));
        }

        let edge = self.write("follow", |tx| {
            require(tx, "follow", "user", follower.get())?;
            require(tx, "follow", "user", followed.get())?;

            tx.execute(
                "INSERT INTO followers (follower_id, followed_id) VALUES (?1, ?2)",
                params![follower, followed],
            )
            .map_err(|e| {
                StoreError::classify(e, "follow", || format!("edge {follower} -> {followed}"))
            })?;

            Ok(Follow {
                follower_id: follower,
                followed_id: followed,
            })
        })?;

        tracing::debug!(follower = %follower, followed = %followed, "Created follow edge");
        Ok(edge)
    }

    async fn unfollow(&self, follower: UserId, followed: UserId) -> StoreResult<bool> {
        self.write("unfollow", |tx| {
            let rows = tx.execute(
                "DELETE FROM followers WHERE follower_id = ?1 AND followed_id = ?2",
                params![follower, followed],
            )?;
            Ok(rows > 0)
        })
    }

    async fn is_following(&self, follower: UserId, followed: UserId) -> StoreResult<bool> {
        let conn = self.pool.get()?;
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM followers WHERE follower_id = ?1 AND followed_id = ?2)",
            params![follower, followed],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    async fn following(&self, id: UserId) -> StoreResult<Vec<User>> {
        self.query_all(FOLLOWING_SQL, params![id], User::from_row)
    }

    async fn followers(&self, id: UserId) -> StoreResult<Vec<User>> {
        self.query_all(FOLLOWERS_SQL, params![id], User::from_row)
    }

    async fn create_post(&self, new: &NewPost) -> StoreResult<Post> {
        let post = self.write("create_post", |tx| {
            require(tx, "post", "user", new.user_id.get())?;

            tx.execute(
                "INSERT INTO post (user_id) VALUES (?1)",
                params![new.user_id],
            )
            .map_err(|e| StoreError::classify(e, "post", String::new))?;

            Ok(Post {
                id: PostId(tx.last_insert_rowid()),
                user_id: new.user_id,
            })
        })?;

        tracing::debug!(post_id = %post.id, user_id = %post.user_id, "Created post");
        Ok(post)
    }

    async fn get_post(&self, id: PostId) -> StoreResult<Option<Post>> {
        self.query_one(
            &format!("SELECT {} FROM post WHERE id = ?1", Post::COLUMNS),
            params![id],
            Post::from_row,
        )
    }

    async fn posts_by_user(&self, user: UserId) -> StoreResult<Vec<Post>> {
        self.query_all(
            &format!(
                "SELECT {} FROM post WHERE user_id = ?1 ORDER BY id",
                Post::COLUMNS
            ),
            params![user],
            Post::from_row,
        )
    }

    async fn delete_post(&self, id: PostId) -> StoreResult<bool> {
        let deleted = self.write("delete_post", |tx| {
            if !exists_where(tx, "post", "id", id.get())? {
                return Ok(false);
            }
            restrict(
                tx,
                "post",
                id.get(),
                &[
                    ("comment", "post_id", "comments"),
                    ("media", "post_id", "media"),
                ],
            )?;

            let rows = tx
                .execute("DELETE FROM post WHERE id = ?1", params![id])
                .map_err(|e| StoreError::classify(e, "post", || format!("id {id}")))?;
            Ok(rows > 0)
        })?;

        if deleted {
            tracing::debug!(post_id = %id, "Deleted post");
        }
        Ok(deleted)
    }

    async fn add_media(&self, new: &NewMedia) -> StoreResult<Media> {
        new.validate()?;

        let media = self.write("add_media", |tx| {
            require(tx, "media", "post", new.post_id.get())?;

            tx.execute(
                "INSERT INTO media (type, url, post_id) VALUES (?1, ?2, ?3)",
                params![new.media_type, new.url, new.post_id],
            )
            .map_err(|e| StoreError::classify(e, "media", String::new))?;

            Ok(Media {
                id: MediaId(tx.last_insert_rowid()),
                media_type: new.media_type,
                url: new.url.clone(),
                post_id: new.post_id,
            })
        })?;

        tracing::debug!(
            media_id = %media.id,
            post_id = %media.post_id,
            media_type = %media.media_type,
            "Attached media"
        );
        Ok(media)
    }

    async fn get_media(&self, id: MediaId) -> StoreResult<Option<Media>> {
        self.query_one(
            &format!("SELECT {} FROM media WHERE id = ?1", Media::COLUMNS),
            params![id],
            Media::from_row,
        )
    }

    async fn media_for_post(&self, post: PostId) -> StoreResult<Vec<Media>> {
        self.query_all(
            &format!(
                "SELECT {} FROM media WHERE post_id = ?1 ORDER BY id",
                Media::COLUMNS
            ),
            params![post],
            Media::from_row,
        )
    }

    async fn delete_media(&self, id: MediaId) -> StoreResult<bool> {
        self.write("delete_media", |tx| {
            let rows = tx.execute("DELETE FROM media WHERE id = ?1", params![id])?;
            Ok(rows > 0)
        })
    }

    async fn add_comment(&self, new: &NewComment) -> StoreResult<Comment> {
        new.validate()?;

        let comment = self.write("add_comment", |tx| {
            require(tx, "comment", "user", new.author_id.get())?;
            require(tx, "comment", "post", new.post_id.get())?;

            tx.execute(
                "INSERT INTO comment (comment_text, author_id, post_id) VALUES (?1, ?2, ?3)",
                params![new.comment_text, new.author_id, new.post_id],
            )
            .map_err(|e| StoreError::classify(e, "comment", String::new))?;

            Ok(Comment {
                id: CommentId(tx.last_insert_rowid()),
                comment_text: new.comment_text.clone(),
                author_id: new.author_id,
                post_id: new.post_id,
            })
        })?;

        tracing::debug!(
            comment_id = %comment.id,
            post_id = %comment.post_id,
            author_id = %comment.author_id,
            "Created comment"
        );
        Ok(comment)
    }

    async fn get_comment(&self, id: CommentId) -> StoreResult<Option<Comment>> {
        self.query_one(
            &format!("SELECT {} FROM comment WHERE id = ?1", Comment::COLUMNS),
            params![id],
            Comment::from_row,
        )
    }

    async fn comments_on_post(&self, post: PostId) -> StoreResult<Vec<Comment>> {
        self.query_all(
            &format!(
                "SELECT {} FROM comment WHERE post_id = ?1 ORDER BY id",
                Comment::COLUMNS
            ),
            params![post],
            Comment::from_row,
        )
    }

    async fn comments_by_user(&self, user: UserId) -> StoreResult<Vec<Comment>> {
        self.query_all(
            &format!(
                "SELECT {} FROM comment WHERE author_id = ?1 ORDER BY id",
                Comment::COLUMNS
            ),
            params![user],
            Comment::from_row,
        )
    }

    async fn delete_comment(&self, id: CommentId) -> StoreResult<bool> {
        self.write("delete_comment", |tx| {
            let rows = tx.execute("DELETE FROM comment WHERE id = ?1", params![id])?;
            Ok(rows > 0)
        })
    }

    async fn stats(&self) -> StoreResult<SchemaStats> {
        let conn = self.pool.get()?;
        Ok(SchemaStats {
            users: count(&conn, "user")?,
            posts: count(&conn, "post")?,
            media: count(&conn, "media")?,
            comments: count(&conn, "comment")?,
            follows: count(&conn, "followers")?,
        })
    }
}

/// Type alias for Arc-wrapped repository (shared with the GraphQL schema)
pub type DynSocialRepository = Arc<dyn SocialRepository>;
