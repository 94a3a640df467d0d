use std::env;

use secrecy::SecretString;
use thiserror::Error;

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8081";
// Upper bound on tasks produced by a single recurring create
const DEFAULT_MAX_SERIES_OCCURRENCES: usize = 1000;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub database_url: String,
    pub listen_addr: String,
    pub jwt_secret: SecretString,
    pub max_series_occurrences: usize,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable `{0}` is not set")]
    MissingVar(&'static str),
    #[error("invalid value for environment variable `{0}`")]
    InvalidVar(&'static str),
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = env::var("SERVER_DATABASE_URL")
            .or_else(|_| env::var("DATABASE_URL"))
            .map_err(|_| ConfigError::MissingVar("SERVER_DATABASE_URL"))?;

        let listen_addr =
            env::var("SERVER_LISTEN_ADDR").unwrap_or_else(|_| DEFAULT_LISTEN_ADDR.to_string());

        let jwt_secret = env::var("SERVER_JWT_SECRET")
            .map_err(|_| ConfigError::MissingVar("SERVER_JWT_SECRET"))?;
        if jwt_secret.trim().is_empty() {
            return Err(ConfigError::InvalidVar("SERVER_JWT_SECRET"));
        }

        let max_series_occurrences = get_numeric_env_var(
            "SERVER_MAX_SERIES_OCCURRENCES",
            DEFAULT_MAX_SERIES_OCCURRENCES,
        )?
        .max(1);

        Ok(Self {
            database_url,
            listen_addr,
            jwt_secret: SecretString::new(jwt_secret.into()),
            max_series_occurrences,
        })
    }
}

fn get_numeric_env_var<T: std::str::FromStr>(
    var_name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match env::var(var_name) {
        Ok(value) => value
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidVar(var_name)),
        Err(_) => Ok(default),
    }
}
