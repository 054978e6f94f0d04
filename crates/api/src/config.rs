//! Application configuration loaded from environment variables.

use domain::{CancellationPolicy, DEFAULT_CANCELLATION_WINDOW_DAYS};

const DEFAULT_JWT_SECRET: &str = "insecure-development-secret";

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `DATABASE_URL`: PostgreSQL connection string; the in-memory store is
///   used when unset
/// - `DB_MAX_CONNECTIONS`: pool size (default: `10`)
/// - `AUTO_MIGRATE`: apply migrations on start-up (default: `true`)
/// - `JWT_SECRET`, `JWT_ISSUER`, `JWT_TTL_HOURS`: token signing settings
/// - `ORDER_CANCEL_WINDOW_DAYS`: cancellation window (default: `14`)
/// - `ORDER_RESTOCK_ON_CANCEL`: return units to stock on cancel (default: `false`)
/// - `ADMIN_EMAIL`, `ADMIN_PASSWORD`: administrator seeded at start-up
#[derive(Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub auto_migrate: bool,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_ttl_hours: i64,
    pub cancel_window_days: i64,
    pub restock_on_cancel: bool,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            host: non_empty("HOST").unwrap_or(defaults.host),
            port: parsed(&lookup, "PORT").unwrap_or(defaults.port),
            log_level: non_empty("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: non_empty("DATABASE_URL"),
            db_max_connections: parsed(&lookup, "DB_MAX_CONNECTIONS")
                .unwrap_or(defaults.db_max_connections),
            auto_migrate: flag(&lookup, "AUTO_MIGRATE").unwrap_or(defaults.auto_migrate),
            jwt_secret: non_empty("JWT_SECRET").unwrap_or(defaults.jwt_secret),
            jwt_issuer: non_empty("JWT_ISSUER").unwrap_or(defaults.jwt_issuer),
            jwt_ttl_hours: parsed(&lookup, "JWT_TTL_HOURS")
                .filter(|hours: &i64| *hours > 0)
                .unwrap_or(defaults.jwt_ttl_hours),
            cancel_window_days: parsed(&lookup, "ORDER_CANCEL_WINDOW_DAYS")
                .filter(|days: &i64| *days >= 0)
                .unwrap_or(defaults.cancel_window_days),
            restock_on_cancel: flag(&lookup, "ORDER_RESTOCK_ON_CANCEL")
                .unwrap_or(defaults.restock_on_cancel),
            admin_email: non_empty("ADMIN_EMAIL"),
            admin_password: non_empty("ADMIN_PASSWORD"),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn cancellation_policy(&self) -> CancellationPolicy {
        CancellationPolicy::with_window_days(self.cancel_window_days, self.restock_on_cancel)
    }

    /// Returns true if tokens are signed with the built-in development secret.
    pub fn uses_default_secret(&self) -> bool {
        self.jwt_secret == DEFAULT_JWT_SECRET
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            db_max_connections: 10,
            auto_migrate: true,
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            jwt_issuer: "storefront".to_string(),
            jwt_ttl_hours: 24,
            cancel_window_days: DEFAULT_CANCELLATION_WINDOW_DAYS,
            restock_on_cancel: false,
            admin_email: None,
            admin_password: None,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("log_level", &self.log_level)
            .field("database_url", &self.database_url.as_ref().map(|_| "<set>"))
            .field("db_max_connections", &self.db_max_connections)
            .field("auto_migrate", &self.auto_migrate)
            .field("jwt_secret", &"<redacted>")
            .field("jwt_issuer", &self.jwt_issuer)
            .field("jwt_ttl_hours", &self.jwt_ttl_hours)
            .field("cancel_window_days", &self.cancel_window_days)
            .field("restock_on_cancel", &self.restock_on_cancel)
            .field("admin_email", &self.admin_email)
            .finish()
    }
}

fn parsed<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}

fn flag(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<bool> {
    match lookup(key)?.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert!(config.database_url.is_none());
        assert_eq!(config.cancel_window_days, 14);
        assert!(!config.restock_on_cancel);
        assert!(config.uses_default_secret());
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_empty_environment_matches_defaults() {
        let config = from_pairs(&[]);
        assert_eq!(config.addr(), "0.0.0.0:3000");
        assert_eq!(config.db_max_connections, 10);
        assert!(config.auto_migrate);
        assert!(config.admin_email.is_none());
    }

    #[test]
    fn test_values_are_read_from_lookup() {
        let config = from_pairs(&[
            ("PORT", "8081"),
            ("DATABASE_URL", "postgres://localhost/shop"),
            ("AUTO_MIGRATE", "false"),
            ("JWT_SECRET", "s3cret"),
            ("JWT_TTL_HOURS", "2"),
            ("ORDER_CANCEL_WINDOW_DAYS", "30"),
            ("ORDER_RESTOCK_ON_CANCEL", "yes"),
            ("ADMIN_EMAIL", "root@example.com"),
        ]);

        assert_eq!(config.port, 8081);
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/shop")
        );
        assert!(!config.auto_migrate);
        assert!(!config.uses_default_secret());
        assert_eq!(config.jwt_ttl_hours, 2);
        assert_eq!(config.admin_email.as_deref(), Some("root@example.com"));

        let policy = config.cancellation_policy();
        assert_eq!(policy.window(), chrono::Duration::days(30));
        assert!(policy.restock_on_cancel());
    }

    #[test]
    fn test_unparsable_values_fall_back() {
        let config = from_pairs(&[
            ("PORT", "not-a-port"),
            ("AUTO_MIGRATE", "maybe"),
            ("JWT_TTL_HOURS", "-5"),
            ("DATABASE_URL", "  "),
        ]);

        assert_eq!(config.port, 3000);
        assert!(config.auto_migrate);
        assert_eq!(config.jwt_ttl_hours, 24);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_debug_hides_secrets() {
        let config = from_pairs(&[("JWT_SECRET", "hunter2"), ("ADMIN_PASSWORD", "pw")]);
        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("\"pw\""));
    }
}
