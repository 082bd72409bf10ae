use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const DEFAULT_DB_FILE: &str = "plaza.db";

#[derive(Parser, Debug)]
#[command(name = "plaza", about = "Social data model over SQLite")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Path to data directory
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Path to the SQLite database file
    #[arg(long)]
    pub database: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create or upgrade the schema (default)
    Migrate,
    /// Print row counts per table as JSON
    Stats,
    /// Print the GraphQL schema (SDL)
    Schema,
    /// Execute a GraphQL document against the database
    Query {
        /// GraphQL query or mutation text
        document: String,
    },
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
    pub pool_size: u32,
    pub busy_timeout_ms: u32,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AuthConfig {
    /// bcrypt work factor for stored passwords
    pub bcrypt_cost: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            pool_size: 8,
            busy_timeout_ms: 5000,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            bcrypt_cost: crate::password::DEFAULT_COST,
        }
    }
}

impl Config {
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let data_dir = Self::data_dir(cli);
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| data_dir.join("config.toml"));

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };

        // CLI overrides
        if let Some(ref path) = cli.database {
            config.database.path = Some(path.clone());
        }

        // Resolve paths relative to data dir
        if config.database.path.is_none() {
            config.database.path = Some(data_dir.join(DEFAULT_DB_FILE));
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.database.pool_size == 0 {
            anyhow::bail!("database.pool_size must be at least 1");
        }
        if !(4..=31).contains(&self.auth.bcrypt_cost) {
            anyhow::bail!(
                "auth.bcrypt_cost must be between 4 and 31 (got {})",
                self.auth.bcrypt_cost
            );
        }
        Ok(())
    }

    pub fn data_dir(cli: &Cli) -> PathBuf {
        cli.data_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .map(|home| home.join(".plaza"))
                .unwrap_or_else(|| PathBuf::from(".plaza"))
        })
    }

    pub fn db_path(&self) -> &Path {
        self.database
            .path
            .as_deref()
            .unwrap_or_else(|| Path::new(DEFAULT_DB_FILE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(data_dir: &Path) -> Cli {
        Cli {
            config: None,
            data_dir: Some(data_dir.to_path_buf()),
            database: None,
            command: None,
        }
    }

    #[test]
    fn default_config_has_expected_values() {
        let config = Config::default();
        assert_eq!(config.database.pool_size, 8);
        assert_eq!(config.database.busy_timeout_ms, 5000);
        assert_eq!(config.auth.bcrypt_cost, crate::password::DEFAULT_COST);
        assert!(config.database.path.is_none());
    }

    #[test]
    fn data_dir_uses_cli_override() {
        let cli = cli(Path::new("/tmp/test-plaza"));
        assert_eq!(Config::data_dir(&cli), PathBuf::from("/tmp/test-plaza"));
    }

    #[test]
    fn data_dir_defaults_to_dot_plaza() {
        let cli = Cli {
            config: None,
            data_dir: None,
            database: None,
            command: None,
        };
        let dir = Config::data_dir(&cli);
        assert!(dir.ends_with(".plaza"));
    }

    #[test]
    fn load_with_no_config_file_uses_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::load(&cli(tmp.path())).unwrap();
        assert_eq!(config.database.pool_size, 8);
        assert_eq!(config.db_path(), tmp.path().join("plaza.db"));
    }

    #[test]
    fn load_applies_cli_overrides() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cli = cli(tmp.path());
        cli.database = Some(PathBuf::from("/var/lib/plaza/social.db"));
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.db_path(), Path::new("/var/lib/plaza/social.db"));
    }

    #[test]
    fn load_reads_toml_file() {
        let tmp = tempfile::tempdir().unwrap();
        let config_path = tmp.path().join("config.toml");
        std::fs::write(
            &config_path,
            r#"
[database]
path = "/srv/plaza.db"
pool_size = 2
busy_timeout_ms = 250

[auth]
bcrypt_cost = 6
"#,
        )
        .unwrap();

        let mut cli = cli(tmp.path());
        cli.config = Some(config_path);
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.db_path(), Path::new("/srv/plaza.db"));
        assert_eq!(config.database.pool_size, 2);
        assert_eq!(config.database.busy_timeout_ms, 250);
        assert_eq!(config.auth.bcrypt_cost, 6);
    }

    #[test]
    fn cli_overrides_beat_toml_values() {
        let tmp = tempfile::tempdir().unwrap();
        let config_path = tmp.path().join("config.toml");
        std::fs::write(
            &config_path,
            r#"
[database]
path = "/srv/plaza.db"
"#,
        )
        .unwrap();

        let mut cli = cli(tmp.path());
        cli.config = Some(config_path);
        cli.database = Some(PathBuf::from("/tmp/override.db"));
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.db_path(), Path::new("/tmp/override.db"));
    }

    #[test]
    fn load_rejects_out_of_range_bcrypt_cost() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("config.toml"), "[auth]\nbcrypt_cost = 2\n").unwrap();
        assert!(Config::load(&cli(tmp.path())).is_err());
    }

    #[test]
    fn subcommands_parse() {
        let cli = Cli::parse_from(["plaza", "--database", "x.db", "query", "{ users { id } }"]);
        assert_eq!(cli.database, Some(PathBuf::from("x.db")));
        assert_eq!(
            cli.command,
            Some(Command::Query {
                document: "{ users { id } }".to_string()
            })
        );

        let cli = Cli::parse_from(["plaza"]);
        assert_eq!(cli.command, None);
    }
}
