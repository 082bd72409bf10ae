use async_graphql::*;

use crate::db::models::{
    CommentId, MediaId, NewComment, NewMedia, NewPost, NewUser, PostId, UserId,
};
use crate::error::StoreError;
use crate::graphql::schema::PasswordPolicy;
use crate::graphql::types::{
    repo, AddCommentInput, AddMediaInput, CommentNode, CreateUserInput, FollowNode, MediaNode,
    PostNode, UserNode,
};
use crate::password;

/// GraphQL Mutation root
pub struct MutationRoot;

#[Object]
impl MutationRoot {
    /// Register a user. The plaintext password is bcrypt-hashed before storage.
    async fn create_user(&self, ctx: &Context<'_>, input: CreateUserInput) -> Result<UserNode> {
        if input.password.trim().is_empty() {
            return Err(StoreError::Required {
                entity: "user",
                field: "password",
            }
            .extend());
        }

        let cost = ctx.data::<PasswordPolicy>()?.bcrypt_cost;
        let plaintext = input.password;
        let hashed =
            tokio::task::spawn_blocking(move || password::hash(&plaintext, cost)).await??;

        let user = repo(ctx)?
            .create_user(&NewUser::new(input.email, hashed))
            .await
            .map_err(|e| e.extend())?;
        Ok(UserNode(user))
    }

    /// Soft-disable or re-enable an account
    async fn set_user_active(&self, ctx: &Context<'_>, id: i64, active: bool) -> Result<UserNode> {
        let user = repo(ctx)?
            .set_user_active(UserId(id), active)
            .await
            .map_err(|e| e.extend())?;
        Ok(UserNode(user))
    }

    /// Delete a user that owns no posts or comments
    async fn delete_user(&self, ctx: &Context<'_>, id: i64) -> Result<bool> {
        repo(ctx)?
            .delete_user(UserId(id))
            .await
            .map_err(|e| e.extend())
    }

    async fn follow(
        &self,
        ctx: &Context<'_>,
        follower_id: i64,
        followed_id: i64,
    ) -> Result<FollowNode> {
        let edge = repo(ctx)?
            .follow(UserId(follower_id), UserId(followed_id))
            .await
            .map_err(|e| e.extend())?;
        Ok(FollowNode(edge))
    }

    async fn unfollow(&self, ctx: &Context<'_>, follower_id: i64, followed_id: i64) -> Result<bool> {
        repo(ctx)?
            .unfollow(UserId(follower_id), UserId(followed_id))
            .await
            .map_err(|e| e.extend())
    }

    async fn create_post(&self, ctx: &Context<'_>, user_id: i64) -> Result<PostNode> {
        let post = repo(ctx)?
            .create_post(&NewPost::new(UserId(user_id)))
            .await
            .map_err(|e| e.extend())?;
        Ok(PostNode(post))
    }

    /// Delete a post that has no comments or media
    async fn delete_post(&self, ctx: &Context<'_>, id: i64) -> Result<bool> {
        repo(ctx)?
            .delete_post(PostId(id))
            .await
            .map_err(|e| e.extend())
    }

    async fn add_media(&self, ctx: &Context<'_>, input: AddMediaInput) -> Result<MediaNode> {
        let new = NewMedia::new(input.media_type, input.url, PostId(input.post_id));
        let media = repo(ctx)?
            .add_media(&new)
            .await
            .map_err(|e| e.extend())?;
        Ok(MediaNode(media))
    }

    async fn delete_media(&self, ctx: &Context<'_>, id: i64) -> Result<bool> {
        repo(ctx)?
            .delete_media(MediaId(id))
            .await
            .map_err(|e| e.extend())
    }

    async fn add_comment(&self, ctx: &Context<'_>, input: AddCommentInput) -> Result<CommentNode> {
        let new = NewComment::new(
            input.comment_text,
            UserId(input.author_id),
            PostId(input.post_id),
        );
        let comment = repo(ctx)?
            .add_comment(&new)
            .await
            .map_err(|e| e.extend())?;
        Ok(CommentNode(comment))
    }

    async fn delete_comment(&self, ctx: &Context<'_>, id: i64) -> Result<bool> {
        repo(ctx)?
            .delete_comment(CommentId(id))
            .await
            .map_err(|e| e.extend())
    }
}
