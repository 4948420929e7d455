//! Configuration module for the outreach backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Directory where mission materials are stored
    pub upload_dir: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Lifetime of a login session in hours
    pub session_ttl_hours: i64,
    /// Largest accepted mission material upload
    pub max_upload_bytes: usize,
    /// Password applied by an admin reset when none is supplied
    pub reset_password: String,
    /// Create the bootstrap `admin` account at startup
    pub create_admin: bool,
    /// Password for the bootstrap admin account
    pub admin_password: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, String> {
        dotenvy::dotenv().ok();

        let db_path = env::var("OUTREACH_DB_PATH")
            .unwrap_or_else(|_| "./data/outreach.sqlite".to_string())
            .into();

        let upload_dir = env::var("OUTREACH_UPLOAD_DIR")
            .unwrap_or_else(|_| "./data/uploads".to_string())
            .into();

        let bind_addr = env::var("OUTREACH_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()
            .map_err(|e| format!("Invalid OUTREACH_BIND_ADDR format: {}", e))?;

        let log_level = env::var("OUTREACH_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let session_ttl_hours = parse_var("OUTREACH_SESSION_TTL_HOURS", 168)?;
        if session_ttl_hours <= 0 {
            return Err("OUTREACH_SESSION_TTL_HOURS must be positive".to_string());
        }

        let max_upload_bytes = parse_var("OUTREACH_MAX_UPLOAD_BYTES", 20 * 1024 * 1024)?;

        let reset_password =
            env::var("OUTREACH_RESET_PASSWORD").unwrap_or_else(|_| "reset123".to_string());

        let create_admin = parse_var("OUTREACH_CREATE_ADMIN", false)?;
        let admin_password = env::var("OUTREACH_ADMIN_PASSWORD")
            .ok()
            .filter(|p| !p.is_empty());

        Ok(Self {
            db_path,
            upload_dir,
            bind_addr,
            log_level,
            session_ttl_hours,
            max_upload_bytes,
            reset_password,
            create_admin,
            admin_password,
        })
    }
}

/// Parse an optional environment variable, falling back to `default` when unset.
fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, String>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| format!("Invalid {} value {:?}: {}", name, raw, e)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VARS: &[&str] = &[
        "OUTREACH_DB_PATH",
        "OUTREACH_UPLOAD_DIR",
        "OUTREACH_BIND_ADDR",
        "OUTREACH_LOG_LEVEL",
        "OUTREACH_SESSION_TTL_HOURS",
        "OUTREACH_MAX_UPLOAD_BYTES",
        "OUTREACH_RESET_PASSWORD",
        "OUTREACH_CREATE_ADMIN",
        "OUTREACH_ADMIN_PASSWORD",
    ];

    #[test]
    fn test_default_config() {
        // Clear any existing env vars
        for var in VARS {
            env::remove_var(var);
        }

        let config = Config::from_env().unwrap();

        assert_eq!(config.db_path, PathBuf::from("./data/outreach.sqlite"));
        assert_eq!(config.upload_dir, PathBuf::from("./data/uploads"));
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.session_ttl_hours, 168);
        assert_eq!(config.max_upload_bytes, 20 * 1024 * 1024);
        assert_eq!(config.reset_password, "reset123");
        assert!(!config.create_admin);
        assert!(config.admin_password.is_none());
    }

    #[test]
    fn test_parse_var_rejects_garbage() {
        env::set_var("OUTREACH_TEST_ONLY_NUMBER", "twelve");
        let parsed: Result<i64, String> = parse_var("OUTREACH_TEST_ONLY_NUMBER", 1);
        assert!(parsed.unwrap_err().contains("OUTREACH_TEST_ONLY_NUMBER"));

        env::set_var("OUTREACH_TEST_ONLY_NUMBER", " 12 ");
        assert_eq!(parse_var("OUTREACH_TEST_ONLY_NUMBER", 1i64).unwrap(), 12);
        env::remove_var("OUTREACH_TEST_ONLY_NUMBER");
    }
}
