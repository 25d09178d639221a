//! Command-line and environment configuration.

use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "salesforge-api",
    version,
    about = "HTTP API for outreach sequences"
)]
pub struct ApiConfig {
    /// Socket address to listen on.
    #[arg(long, env = "API_ADDRESS", default_value = "0.0.0.0:8080")]
    pub address: String,

    /// SQLite database file; created and bootstrapped when missing.
    #[arg(long, env = "API_DATABASE_PATH")]
    pub database_path: PathBuf,

    /// Number of pooled connections.
    #[arg(
        long,
        env = "API_POOL_SIZE",
        default_value_t = 8,
        value_parser = clap::value_parser!(u16).range(1..)
    )]
    pub pool_size: u16,

    /// trace|debug|info|warn|error. Defaults to debug in debug builds.
    #[arg(long, env = "API_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Absolute directory for rotating log files. Logs go to stderr when unset.
    #[arg(long, env = "API_LOG_DIR")]
    pub log_dir: Option<String>,
}

impl ApiConfig {
    pub fn log_level(&self) -> &str {
        self.log_level
            .as_deref()
            .unwrap_or_else(|| salesforge_core::default_log_level())
    }
}

#[cfg(test)]
mod tests {
    use super::ApiConfig;
    use clap::Parser;
    use std::path::Path;

    #[test]
    fn defaults_apply_when_only_the_database_is_given() {
        let config =
            ApiConfig::try_parse_from(["salesforge-api", "--database-path", "/tmp/sf.db"]).unwrap();
        assert_eq!(config.database_path, Path::new("/tmp/sf.db"));
        assert_eq!(config.log_level(), salesforge_core::default_log_level());
    }

    #[test]
    fn explicit_flags_override_defaults() {
        let config = ApiConfig::try_parse_from([
            "salesforge-api",
            "--database-path",
            "/tmp/sf.db",
            "--address",
            "127.0.0.1:9000",
            "--pool-size",
            "3",
            "--log-level",
            "warn",
        ])
        .unwrap();
        assert_eq!(config.address, "127.0.0.1:9000");
        assert_eq!(config.pool_size, 3);
        assert_eq!(config.log_level(), "warn");
    }

    #[test]
    fn zero_pool_size_is_rejected() {
        let result = ApiConfig::try_parse_from([
            "salesforge-api",
            "--database-path",
            "/tmp/sf.db",
            "--pool-size",
            "0",
        ]);
        assert!(result.is_err());
    }
}
