use async_graphql::*;

use crate::db::models::{
    Comment, Follow, Media, MediaType, Post, PostId, SchemaStats, User, UserId,
};
use crate::db::repository::DynSocialRepository;
use crate::error::StoreError;

pub(crate) fn repo<'a>(ctx: &Context<'a>) -> Result<&'a DynSocialRepository> {
    ctx.data::<DynSocialRepository>()
}

/// Foreign keys always resolve, so a missing parent means the row vanished
/// between two reads.
async fn load_user(ctx: &Context<'_>, id: UserId) -> Result<UserNode> {
    repo(ctx)?
        .get_user(id)
        .await
        .map_err(|e| e.extend())?
        .map(UserNode)
        .ok_or_else(|| StoreError::NotFound { entity: "user", id: id.get() }.extend())
}

async fn load_post(ctx: &Context<'_>, id: PostId) -> Result<PostNode> {
    repo(ctx)?
        .get_post(id)
        .await
        .map_err(|e| e.extend())?
        .map(PostNode)
        .ok_or_else(|| StoreError::NotFound { entity: "post", id: id.get() }.extend())
}

fn nodes<T, N>(rows: Vec<T>, wrap: fn(T) -> N) -> Vec<N> {
    rows.into_iter().map(wrap).collect()
}

/// An account
pub struct UserNode(pub User);

#[Object(name = "User")]
impl UserNode {
    async fn id(&self) -> i64 {
        self.0.id.get()
    }

    async fn email(&self) -> &str {
        &self.0.email
    }

    /// False once the account has been soft-disabled
    async fn is_active(&self) -> bool {
        self.0.is_active
    }

    async fn posts(&self, ctx: &Context<'_>) -> Result<Vec<PostNode>> {
        let posts = repo(ctx)?
            .posts_by_user(self.0.id)
            .await
            .map_err(|e| e.extend())?;
        Ok(nodes(posts, PostNode))
    }

    /// Comments written by this user
    async fn comments(&self, ctx: &Context<'_>) -> Result<Vec<CommentNode>> {
        let comments = repo(ctx)?
            .comments_by_user(self.0.id)
            .await
            .map_err(|e| e.extend())?;
        Ok(nodes(comments, CommentNode))
    }

    /// Users this user follows
    async fn following(&self, ctx: &Context<'_>) -> Result<Vec<UserNode>> {
        let users = repo(ctx)?
            .following(self.0.id)
            .await
            .map_err(|e| e.extend())?;
        Ok(nodes(users, UserNode))
    }

    /// Users following this user
    async fn followers(&self, ctx: &Context<'_>) -> Result<Vec<UserNode>> {
        let users = repo(ctx)?
            .followers(self.0.id)
            .await
            .map_err(|e| e.extend())?;
        Ok(nodes(users, UserNode))
    }
}

pub struct PostNode(pub Post);

#[Object(name = "Post")]
impl PostNode {
    async fn id(&self) -> i64 {
        self.0.id.get()
    }

    async fn owner(&self, ctx: &Context<'_>) -> Result<UserNode> {
        load_user(ctx, self.0.user_id).await
    }

    async fn comments(&self, ctx: &Context<'_>) -> Result<Vec<CommentNode>> {
        let comments = repo(ctx)?
            .comments_on_post(self.0.id)
            .await
            .map_err(|e| e.extend())?;
        Ok(nodes(comments, CommentNode))
    }

    async fn media(&self, ctx: &Context<'_>) -> Result<Vec<MediaNode>> {
        let media = repo(ctx)?
            .media_for_post(self.0.id)
            .await
            .map_err(|e| e.extend())?;
        Ok(nodes(media, MediaNode))
    }
}

/// An image or video attached to a post
pub struct MediaNode(pub Media);

#[Object(name = "Media")]
impl MediaNode {
    async fn id(&self) -> i64 {
        self.0.id.get()
    }

    #[graphql(name = "type")]
    async fn media_type(&self) -> MediaType {
        self.0.media_type
    }

    async fn url(&self) -> &str {
        &self.0.url
    }

    async fn post(&self, ctx: &Context<'_>) -> Result<PostNode> {
        load_post(ctx, self.0.post_id).await
    }
}

pub struct CommentNode(pub Comment);

#[Object(name = "Comment")]
impl CommentNode {
    async fn id(&self) -> i64 {
        self.0.id.get()
    }

    async fn comment_text(&self) -> &str {
        &self.0.comment_text
    }

    async fn author(&self, ctx: &Context<'_>) -> Result<UserNode> {
        load_user(ctx, self.0.author_id).await
    }

    async fn post(&self, ctx: &Context<'_>) -> Result<PostNode> {
        load_post(ctx, self.0.post_id).await
    }
}

/// A directional follow edge
pub struct FollowNode(pub Follow);

#[Object(name = "Follow")]
impl FollowNode {
    async fn follower(&self, ctx: &Context<'_>) -> Result<UserNode> {
        load_user(ctx, self.0.follower_id).await
    }

    async fn followed(&self, ctx: &Context<'_>) -> Result<UserNode> {
        load_user(ctx, self.0.followed_id).await
    }
}

/// Row counts per table
#[derive(SimpleObject)]
#[graphql(name = "Stats")]
pub struct StatsNode {
    pub users: u64,
    pub posts: u64,
    pub media: u64,
    pub comments: u64,
    pub follows: u64,
}

impl From<SchemaStats> for StatsNode {
    fn from(stats: SchemaStats) -> Self {
        Self {
            users: stats.users,
            posts: stats.posts,
            media: stats.media,
            comments: stats.comments,
            follows: stats.follows,
        }
    }
}

/// Input for registering a user. The password is hashed before it is stored.
#[derive(InputObject)]
pub struct CreateUserInput {
    pub email: String,
    pub password: String,
}

#[derive(InputObject)]
pub struct AddMediaInput {
    pub post_id: i64,

    #[graphql(name = "type")]
    pub media_type: MediaType,

    pub url: String,
}

#[derive(InputObject)]
pub struct AddCommentInput {
    pub post_id: i64,
    pub author_id: i64,
    pub comment_text: String,
}
