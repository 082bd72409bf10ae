use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use plaza::config::{Cli, Command, Config};
use plaza::db;
use plaza::db::repository::{DynSocialRepository, SocialRepository, SqliteSocialRepository};
use plaza::graphql::{self, PasswordPolicy};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so command output on stdout stays machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let command = cli.command.clone().unwrap_or(Command::Migrate);

    if command == Command::Schema {
        println!("{}", graphql::sdl());
        return Ok(());
    }

    let config = Config::load(&cli)?;
    tracing::info!("Database: {}", config.db_path().display());

    let pool = db::create_pool(config.db_path(), &config.database)?;
    db::run_migrations(&pool)?;

    let repo: DynSocialRepository = Arc::new(SqliteSocialRepository::new(pool));

    match command {
        Command::Migrate | Command::Schema => {}
        Command::Stats => {
            let stats = repo.stats().await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Command::Query { document } => {
            let schema = graphql::build_schema(
                repo,
                PasswordPolicy {
                    bcrypt_cost: config.auth.bcrypt_cost,
                },
            );
            let response = schema.execute(document.as_str()).await;
            println!("{}", serde_json::to_string_pretty(&response)?);
            if !response.errors.is_empty() {
                anyhow::bail!("query returned {} error(s)", response.errors.len());
            }
        }
    }

    Ok(())
}
