use anyhow::Context;
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub mongodb: MongoConfig,
    pub redis: RedisConfig,
    pub gemini: GeminiConfig,
    pub jwt: JwtConfig,
    pub security: SecurityConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub environment: Environment,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoConfig {
    pub uri: String,
    pub database_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub expiration_hours: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    pub cors_enabled: bool,
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub window_secs: u64,
    pub max_requests: i64,
    pub auth_max_requests: i64,
    pub search_window_secs: u64,
    pub search_max_requests: i64,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy
            ::from_filename(".env.local")
            .or_else(|_| dotenvy::dotenv())
            .ok();

        let environment = env_or("NODE_ENV", "development").to_lowercase();
        let is_production = environment == "production";

        let dev_origins = env::var("DEV_FRONTEND_ORIGIN").unwrap_or_default();
        let prod_origins = env::var("PRODUCTION_FRONTEND_ORIGIN").unwrap_or_default();

        let allowed_origins: Vec<String> = (if is_production { prod_origins } else { dev_origins })
            .split(',')
            .filter(|s| !s.is_empty())
            .map(|s| s.trim().to_string())
            .collect();

        let config = Config {
            server: ServerConfig {
                port: env_or("PORT", "4000").parse()?,
                host: env_or("HOST", "0.0.0.0"),
                environment: if is_production {
                    Environment::Production
                } else {
                    Environment::Development
                },
            },
            mongodb: MongoConfig {
                uri: env::var("MONGODB_URI").context("MONGODB_URI must be set")?,
                database_name: env_or("MONGODB_DATABASE", "nutriscan"),
            },
            redis: RedisConfig {
                url: env_or("REDIS_URL", "redis://127.0.0.1:6379"),
            },
            gemini: GeminiConfig {
                api_key: env::var("GEMINI_API_KEY").context("GEMINI_API_KEY must be set")?,
                base_url: env_or(
                    "GEMINI_BASE_URL",
                    "https://generativelanguage.googleapis.com/v1beta"
                ),
                model: env_or("GEMINI_MODEL", "gemini-2.5-flash"),
                timeout_secs: env_or("GEMINI_TIMEOUT_SECS", "30").parse()?,
            },
            jwt: JwtConfig {
                secret: env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
                expiration_hours: env_or("JWT_EXPIRATION_HOURS", "24").parse()?,
            },
            security: SecurityConfig {
                cors_enabled: is_production,
                allowed_origins,
            },
            rate_limit: RateLimitConfig {
                window_secs: env_or("RATE_LIMIT_WINDOW_SECS", "900").parse()?,
                max_requests: env_or("RATE_LIMIT_MAX_REQUESTS", "100").parse()?,
                auth_max_requests: env_or("AUTH_RATE_LIMIT_MAX", "10").parse()?,
                search_window_secs: env_or("SEARCH_RATE_LIMIT_WINDOW_SECS", "60").parse()?,
                search_max_requests: env_or("SEARCH_RATE_LIMIT_MAX", "10").parse()?,
            },
        };

        Ok(config)
    }

    #[allow(dead_code)]
    pub fn is_development(&self) -> bool {
        self.server.environment == Environment::Development
    }

    #[allow(dead_code)]
    pub fn is_production(&self) -> bool {
        self.server.environment == Environment::Production
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPTIONAL_VARS: &[&str] = &[
        "NODE_ENV",
        "PORT",
        "HOST",
        "MONGODB_DATABASE",
        "REDIS_URL",
        "GEMINI_BASE_URL",
        "GEMINI_MODEL",
        "GEMINI_TIMEOUT_SECS",
        "JWT_EXPIRATION_HOURS",
        "RATE_LIMIT_WINDOW_SECS",
        "RATE_LIMIT_MAX_REQUESTS",
        "AUTH_RATE_LIMIT_MAX",
        "SEARCH_RATE_LIMIT_WINDOW_SECS",
        "SEARCH_RATE_LIMIT_MAX",
        "DEV_FRONTEND_ORIGIN",
        "PRODUCTION_FRONTEND_ORIGIN",
    ];

    // single test so the env mutations don't race each other
    #[test]
    fn from_env_applies_defaults_and_environment_switching() {
        env::set_var("MONGODB_URI", "mongodb://localhost:27017");
        env::set_var("GEMINI_API_KEY", "test-key");
        env::set_var("JWT_SECRET", "test-secret");
        for var in OPTIONAL_VARS {
            env::remove_var(var);
        }

        let config = Config::from_env().unwrap();
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert!(config.is_development());
        assert_eq!(config.mongodb.database_name, "nutriscan");
        assert_eq!(config.redis.url, "redis://127.0.0.1:6379");
        assert_eq!(config.gemini.base_url, "https://generativelanguage.googleapis.com/v1beta");
        assert_eq!(config.gemini.model, "gemini-2.5-flash");
        assert_eq!(config.gemini.timeout_secs, 30);
        assert_eq!(config.jwt.expiration_hours, 24);
        assert!(!config.security.cors_enabled);
        assert!(config.security.allowed_origins.is_empty());
        assert_eq!(config.rate_limit.window_secs, 900);
        assert_eq!(config.rate_limit.max_requests, 100);
        assert_eq!(config.rate_limit.auth_max_requests, 10);
        assert_eq!(config.rate_limit.search_window_secs, 60);
        assert_eq!(config.rate_limit.search_max_requests, 10);

        env::set_var("NODE_ENV", "production");
        env::set_var("PRODUCTION_FRONTEND_ORIGIN", "https://app.example.com");

        let config = Config::from_env().unwrap();
        assert!(config.is_production());
        assert!(config.security.cors_enabled);
        assert_eq!(config.security.allowed_origins, vec!["https://app.example.com"]);

        env::remove_var("NODE_ENV");
        env::remove_var("PRODUCTION_FRONTEND_ORIGIN");
    }
}
