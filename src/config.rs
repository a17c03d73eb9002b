use std::env;
use std::str::FromStr;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub notifier: NotifierConfig,
    pub email: EmailConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotifierConfig {
    /// Worker count in the delivery pool.
    pub threads: usize,
    /// Bound on concurrently live provider sends.
    pub pool_size: usize,
    /// Max delay between database polls for new jobs.
    pub poll_seconds: u64,
    /// Delay before a retry successor becomes eligible.
    pub job_retry_seconds: u64,
    /// Initial `retries_remaining` on a fresh job.
    pub job_max_retry_attempts: u32,
    /// Shared deadline for queue/pool/monitor shutdown.
    pub join_timeout_seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailProviderKind {
    Console,
    Smtp,
}

impl FromStr for EmailProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "console" => Ok(EmailProviderKind::Console),
            "smtp" => Ok(EmailProviderKind::Smtp),
            _ => Err(ConfigError::InvalidValue("EMAIL_PROVIDER".to_string())),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    pub provider: EmailProviderKind,
    pub from_email: String,
    pub smtp: SmtpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub use_tls: bool,
}

impl Config {
    /// Load configuration from the environment.
    ///
    /// `SERVICE_ENV` selects the profile: `.env.<env>` is loaded first,
    /// then `.env`, then process environment variables win as usual.
    pub fn from_env() -> Result<Self, ConfigError> {
        let service_env = env::var("SERVICE_ENV").unwrap_or_else(|_| "default".to_string());
        dotenvy::from_filename(format!(".env.{}", service_env)).ok();
        dotenvy::dotenv().ok();

        Ok(Config {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("PORT".to_string()))?,
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite://data/notifications.db".to_string()),
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .unwrap_or(5),
            },
            notifier: NotifierConfig {
                threads: env::var("NOTIFIER_THREADS")
                    .unwrap_or_else(|_| "1".to_string())
                    .parse()
                    .unwrap_or(1),
                pool_size: env::var("NOTIFIER_POOL_SIZE")
                    .unwrap_or_else(|_| "1".to_string())
                    .parse()
                    .unwrap_or(1),
                poll_seconds: env::var("NOTIFIER_POLL_SECONDS")
                    .unwrap_or_else(|_| "60".to_string())
                    .parse()
                    .unwrap_or(60),
                job_retry_seconds: env::var("NOTIFIER_JOB_RETRY_SECONDS")
                    .unwrap_or_else(|_| "300".to_string())
                    .parse()
                    .unwrap_or(300),
                job_max_retry_attempts: env::var("NOTIFIER_JOB_MAX_RETRY_ATTEMPTS")
                    .unwrap_or_else(|_| "3".to_string())
                    .parse()
                    .unwrap_or(3),
                join_timeout_seconds: env::var("SERVICE_JOIN_TIMEOUT_SECONDS")
                    .unwrap_or_else(|_| "1".to_string())
                    .parse()
                    .unwrap_or(1),
            },
            email: EmailConfig {
                provider: env::var("EMAIL_PROVIDER")
                    .unwrap_or_else(|_| "console".to_string())
                    .parse()?,
                from_email: env::var("EMAIL_FROM")
                    .unwrap_or_else(|_| "support@localhost".to_string()),
                smtp: SmtpConfig {
                    host: env::var("SMTP_HOST").unwrap_or_else(|_| "localhost".to_string()),
                    port: env::var("SMTP_PORT")
                        .unwrap_or_else(|_| "25".to_string())
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SMTP_PORT".to_string()))?,
                    username: env::var("SMTP_USERNAME").ok(),
                    password: env::var("SMTP_PASSWORD").ok(),
                    use_tls: match env::var("SMTP_USE_TLS") {
                        Ok(v) => matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"),
                        Err(_) => false,
                    },
                },
            },
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                url: "sqlite://data/notifications.db".to_string(),
                max_connections: 5,
            },
            notifier: NotifierConfig {
                threads: 1,
                pool_size: 1,
                poll_seconds: 60,
                job_retry_seconds: 300,
                job_max_retry_attempts: 3,
                join_timeout_seconds: 1,
            },
            email: EmailConfig {
                provider: EmailProviderKind::Console,
                from_email: "support@localhost".to_string(),
                smtp: SmtpConfig {
                    host: "localhost".to_string(),
                    port: 25,
                    username: None,
                    password: None,
                    use_tls: false,
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_documented_defaults() {
        let config = Config::default();
        assert_eq!(config.notifier.threads, 1);
        assert_eq!(config.notifier.pool_size, 1);
        assert_eq!(config.notifier.poll_seconds, 60);
        assert_eq!(config.notifier.job_retry_seconds, 300);
        assert_eq!(config.notifier.job_max_retry_attempts, 3);
        assert_eq!(config.email.provider, EmailProviderKind::Console);
        assert_eq!(config.email.smtp.port, 25);
        assert!(!config.email.smtp.use_tls);
    }

    #[test]
    fn provider_kind_parses_case_insensitively() {
        assert_eq!(
            "Console".parse::<EmailProviderKind>().unwrap(),
            EmailProviderKind::Console
        );
        assert_eq!(
            "SMTP".parse::<EmailProviderKind>().unwrap(),
            EmailProviderKind::Smtp
        );
        assert!("sendgrid".parse::<EmailProviderKind>().is_err());
    }
}
