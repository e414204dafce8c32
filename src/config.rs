use std::net::SocketAddr;

use chrono_tz::Tz;

/// Runtime configuration read from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt_secret: String,
    pub bind_addr: SocketAddr,
    /// `None` allows any origin.
    pub cors_origin: Option<String>,
    pub timezone: Tz,
    pub token_ttl_days: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup so it can be driven
    /// without touching the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };

        let database_url = required("DATABASE_URL")?;
        let jwt_secret = required("JWT_SECRET")?;

        let bind_raw = lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8000".to_string());
        let bind_addr = bind_raw.parse().map_err(|_| ConfigError::Invalid {
            name: "BIND_ADDR",
            value: bind_raw.clone(),
        })?;

        let cors_origin = lookup("CORS_ORIGIN").filter(|o| o != "*" && !o.is_empty());

        let tz_raw = lookup("CLINIC_TIMEZONE").unwrap_or_else(|| "Europe/Lisbon".to_string());
        let timezone = tz_raw.parse::<Tz>().map_err(|_| ConfigError::Invalid {
            name: "CLINIC_TIMEZONE",
            value: tz_raw.clone(),
        })?;

        let ttl_raw = lookup("TOKEN_TTL_DAYS").unwrap_or_else(|| "7".to_string());
        let token_ttl_days = match ttl_raw.parse::<i64>() {
            Ok(days) if days > 0 => days,
            _ => {
                return Err(ConfigError::Invalid {
                    name: "TOKEN_TTL_DAYS",
                    value: ttl_raw,
                })
            }
        };

        Ok(Self {
            database_url,
            jwt_secret,
            bind_addr,
            cors_origin,
            timezone,
            token_ttl_days,
        })
    }
}
