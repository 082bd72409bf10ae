use async_graphql::{EmptySubscription, Schema};

use super::mutations::MutationRoot;
use super::queries::QueryRoot;
use crate::db::repository::DynSocialRepository;

/// GraphQL Schema type
pub type SocialSchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

/// How `createUser` turns a plaintext password into its stored form
#[derive(Debug, Clone, Copy)]
pub struct PasswordPolicy {
    pub bcrypt_cost: u32,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            bcrypt_cost: crate::password::DEFAULT_COST,
        }
    }
}

/// Build the GraphQL schema over a repository
pub fn build_schema(repo: DynSocialRepository, policy: PasswordPolicy) -> SocialSchema {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .data(repo)
        .data(policy)
        .finish()
}

/// SDL of the schema; needs no database
pub fn sdl() -> String {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .finish()
        .sdl()
}
