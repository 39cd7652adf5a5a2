use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use thiserror::Error;

use crate::allocator::DEFAULT_MAX_ATTEMPTS;

pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

/// Which database the service talks to
#[derive(Debug, Clone, PartialEq)]
pub enum StoreConfig {
    Supabase { url: String, service_key: String },
    Sqlite { database_url: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub store: StoreConfig,
    pub host: IpAddr,
    pub port: u16,
    pub max_alloc_attempts: u32,
}

impl Config {
    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Empty values count as unset
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let required = |name: &'static str| var(name).ok_or(ConfigError::Missing(name));

        let backend = var("STORE_BACKEND").unwrap_or_else(|| "supabase".to_string());
        let store = match backend.trim().to_ascii_lowercase().as_str() {
            "supabase" => StoreConfig::Supabase {
                url: required("SUPABASE_URL")?,
                service_key: required("SUPABASE_SERVICE_KEY")?,
            },
            "sqlite" => StoreConfig::Sqlite {
                database_url: required("DATABASE_URL")?,
            },
            _ => {
                return Err(ConfigError::Invalid {
                    name: "STORE_BACKEND",
                    value: backend,
                })
            }
        };

        let host = parse_or("HOST", var("HOST"), IpAddr::V4(Ipv4Addr::UNSPECIFIED))?;
        let port = parse_or("PORT", var("PORT"), DEFAULT_PORT)?;
        let max_alloc_attempts = parse_or(
            "NOVAPARTIDA_MAX_ATTEMPTS",
            var("NOVAPARTIDA_MAX_ATTEMPTS"),
            DEFAULT_MAX_ATTEMPTS,
        )?;
        if max_alloc_attempts == 0 {
            return Err(ConfigError::Invalid {
                name: "NOVAPARTIDA_MAX_ATTEMPTS",
                value: "0".to_string(),
            });
        }

        Ok(Config {
            store,
            host,
            port,
            max_alloc_attempts,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn parse_or<T: std::str::FromStr>(
    name: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid { name, value: raw }),
    }
}
