use async_graphql::*;

use crate::db::models::{CommentId, MediaId, PostId, UserId};
use crate::graphql::types::{repo, CommentNode, MediaNode, PostNode, StatsNode, UserNode};

/// GraphQL Query root
pub struct QueryRoot;

#[Object]
impl QueryRoot {
    /// Look up a user by id
    async fn user(&self, ctx: &Context<'_>, id: i64) -> Result<Option<UserNode>> {
        let user = repo(ctx)?
            .get_user(UserId(id))
            .await
            .map_err(|e| e.extend())?;
        Ok(user.map(UserNode))
    }

    /// Look up a user by exact email
    async fn user_by_email(&self, ctx: &Context<'_>, email: String) -> Result<Option<UserNode>> {
        let user = repo(ctx)?
            .find_user_by_email(&email)
            .await
            .map_err(|e| e.extend())?;
        Ok(user.map(UserNode))
    }

    /// All users, oldest first
    async fn users(&self, ctx: &Context<'_>) -> Result<Vec<UserNode>> {
        let users = repo(ctx)?.list_users().await.map_err(|e| e.extend())?;
        Ok(users.into_iter().map(UserNode).collect())
    }

    async fn post(&self, ctx: &Context<'_>, id: i64) -> Result<Option<PostNode>> {
        let post = repo(ctx)?
            .get_post(PostId(id))
            .await
            .map_err(|e| e.extend())?;
        Ok(post.map(PostNode))
    }

    async fn media(&self, ctx: &Context<'_>, id: i64) -> Result<Option<MediaNode>> {
        let media = repo(ctx)?
            .get_media(MediaId(id))
            .await
            .map_err(|e| e.extend())?;
        Ok(media.map(MediaNode))
    }

    async fn comment(&self, ctx: &Context<'_>, id: i64) -> Result<Option<CommentNode>> {
        let comment = repo(ctx)?
            .get_comment(CommentId(id))
            .await
            .map_err(|e| e.extend())?;
        Ok(comment.map(CommentNode))
    }

    /// Row counts per table
    async fn stats(&self, ctx: &Context<'_>) -> Result<StatsNode> {
        let stats = repo(ctx)?.stats().await.map_err(|e| e.extend())?;
        Ok(stats.into())
    }
}
