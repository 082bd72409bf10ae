// Library exports for Plaza
// The binary and integration tests both go through these modules

pub mod config;
pub mod db;
pub mod error;
pub mod graphql;
pub mod password;
