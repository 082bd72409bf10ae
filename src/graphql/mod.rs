pub mod mutations;
pub mod queries;
pub mod schema;
pub mod types;

pub use schema::{build_schema, sdl, PasswordPolicy, SocialSchema};
