use secrecy::Secret;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: Secret<String>,
    pub db_max_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub host: String,
    pub port: u16,

    // Per-request deadline applied by the HTTP handlers
    pub ctx_timeout_secs: u64,

    // Reported by /info
    pub pod_name: String,
    pub environment: String,

    pub account_service: AccountServiceConfig,
}

/// Where and how to reach the external account service.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountServiceConfig {
    pub name: String,
    pub url: String,
    pub method: String,
    pub api_id: Option<Secret<String>>, // sent as x-apigw-api-id
    pub host_name: Option<String>,      // sent as Host
    pub timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        // Load .env file if it exists (for local development)
        let _ = dotenvy::dotenv();

        let config = config::Config::builder()
            .add_source(config::Environment::default().separator("__"))
            .build()?;

        Self::from_source(&config)
    }

    pub fn from_source(config: &config::Config) -> Result<Self, config::ConfigError> {
        let account_service_url: String = config.get("account_service_url")?;
        Url::parse(&account_service_url).map_err(|e| {
            config::ConfigError::Message(format!(
                "account_service_url is not a valid URL: {}",
                e
            ))
        })?;

        let method: String = config
            .get("account_service_method")
            .unwrap_or_else(|_| "GET".to_string());
        reqwest::Method::from_bytes(method.as_bytes()).map_err(|_| {
            config::ConfigError::Message(format!(
                "account_service_method is not an HTTP method: {}",
                method
            ))
        })?;

        Ok(Self {
            database_url: Secret::new(config.get("database_url")?),
            db_max_connections: config.get("db_max_connections").unwrap_or(20),
            db_acquire_timeout_secs: config.get("db_acquire_timeout_secs").unwrap_or(3),
            host: config.get("host").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: config.get("port")?,

            ctx_timeout_secs: config.get("ctx_timeout_secs").unwrap_or(30),

            pod_name: config
                .get("pod_name")
                .unwrap_or_else(|_| "card-service".to_string()),
            environment: config
                .get("environment")
                .unwrap_or_else(|_| "dev".to_string()),

            account_service: AccountServiceConfig {
                name: config
                    .get("account_service_name")
                    .unwrap_or_else(|_| "account".to_string()),
                url: account_service_url.trim_end_matches('/').to_string(),
                method: method.to_uppercase(),
                api_id: config
                    .get::<String>("account_service_api_id")
                    .ok()
                    .map(Secret::new),
                host_name: config.get("account_service_host_name").ok(),
                timeout_secs: config.get("account_service_timeout_secs").unwrap_or(15),
            },
        })
    }

    pub fn ctx_timeout(&self) -> Duration {
        Duration::from_secs(self.ctx_timeout_secs)
    }
}

impl AccountServiceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn source(pairs: &[(&str, &str)]) -> config::Config {
        let mut builder = config::Config::builder();
        for (key, value) in pairs {
            builder = builder.set_override(*key, *value).unwrap();
        }
        builder.build().unwrap()
    }

    #[test]
    fn test_defaults_applied() {
        let config = Config::from_source(&source(&[
            ("database_url", "postgres://localhost/cards"),
            ("port", "5000"),
            ("account_service_url", "http://account.local/account/"),
        ]))
        .unwrap();

        assert_eq!(config.database_url.expose_secret(), "postgres://localhost/cards");
        assert_eq!(config.port, 5000);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.ctx_timeout_secs, 30);
        assert_eq!(config.db_max_connections, 20);
        assert_eq!(config.account_service.name, "account");
        assert_eq!(config.account_service.url, "http://account.local/account");
        assert_eq!(config.account_service.method, "GET");
        assert_eq!(config.account_service.timeout_secs, 15);
        assert!(config.account_service.api_id.is_none());
    }

    #[test]
    fn test_missing_account_url_fails() {
        let result = Config::from_source(&source(&[
            ("database_url", "postgres://localhost/cards"),
            ("port", "5000"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_account_url_fails() {
        let result = Config::from_source(&source(&[
            ("database_url", "postgres://localhost/cards"),
            ("port", "5000"),
            ("account_service_url", "not a url"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn test_account_service_overrides() {
        let config = Config::from_source(&source(&[
            ("database_url", "postgres://localhost/cards"),
            ("port", "5000"),
            ("account_service_url", "https://gw.example.com/account"),
            ("account_service_method", "post"),
            ("account_service_api_id", "abc123"),
            ("account_service_host_name", "account.internal"),
            ("account_service_timeout_secs", "2"),
        ]))
        .unwrap();

        assert_eq!(config.account_service.method, "POST");
        assert_eq!(
            config.account_service.api_id.as_ref().map(|s| s.expose_secret().as_str()),
            Some("abc123")
        );
        assert_eq!(config.account_service.host_name.as_deref(), Some("account.internal"));
        assert_eq!(config.account_service.timeout(), Duration::from_secs(2));
    }
}
