use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub payment: PaymentConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

/// Fixed-window allowance applied to one group of routes
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub max_requests: u32,
    pub window_secs: u64,
}

impl RateLimitPolicy {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
    pub enable_rate_limiting: bool,
    pub auth_rate_limit: RateLimitPolicy,
    pub upload_rate_limit: RateLimitPolicy,
    pub rate_limit_sweep_secs: u64,
    pub max_request_size_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub cors_origins: Vec<String>,
    pub enable_audit_logging: bool,
    /// Read the client address from `X-Forwarded-For` / `X-Real-IP`; only
    /// safe behind a proxy that overwrites them
    pub trust_proxy_headers: bool,
    /// Emails allowed to read every account's audit entries
    pub audit_admins: Vec<String>,
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
}

impl SecurityConfig {
    pub fn is_audit_admin(&self, email: &str) -> bool {
        self.audit_admins.iter().any(|admin| admin.eq_ignore_ascii_case(email.trim()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfig {
    pub api_url: String,
    #[serde(skip_serializing)]
    pub api_key: String,
    pub timeout_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = Some(v);
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }

        // API overrides
        if let Some(port) = env::var("FARMAGENIUS_PORT")
            .ok()
            .or_else(|| env::var("PORT").ok())
            .and_then(|s| s.parse::<u16>().ok())
        {
            self.api.port = port;
        }
        if let Ok(v) = env::var("API_ENABLE_RATE_LIMITING") {
            self.api.enable_rate_limiting = v.parse().unwrap_or(self.api.enable_rate_limiting);
        }
        if let Ok(v) = env::var("API_AUTH_RATE_LIMIT_REQUESTS") {
            self.api.auth_rate_limit.max_requests = v.parse().unwrap_or(self.api.auth_rate_limit.max_requests);
        }
        if let Ok(v) = env::var("API_AUTH_RATE_LIMIT_WINDOW_SECS") {
            self.api.auth_rate_limit.window_secs = v.parse().unwrap_or(self.api.auth_rate_limit.window_secs);
        }
        if let Ok(v) = env::var("API_UPLOAD_RATE_LIMIT_REQUESTS") {
            self.api.upload_rate_limit.max_requests = v.parse().unwrap_or(self.api.upload_rate_limit.max_requests);
        }
        if let Ok(v) = env::var("API_UPLOAD_RATE_LIMIT_WINDOW_SECS") {
            self.api.upload_rate_limit.window_secs = v.parse().unwrap_or(self.api.upload_rate_limit.window_secs);
        }
        if let Ok(v) = env::var("RATE_LIMIT_SWEEP_SECS") {
            self.api.rate_limit_sweep_secs = v.parse().unwrap_or(self.api.rate_limit_sweep_secs);
        }
        if let Ok(v) = env::var("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = v.parse().unwrap_or(self.api.max_request_size_bytes);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Ok(v) = env::var("SECURITY_ENABLE_AUDIT_LOGGING") {
            self.security.enable_audit_logging = v.parse().unwrap_or(self.security.enable_audit_logging);
        }
        if let Ok(v) = env::var("SECURITY_TRUST_PROXY_HEADERS") {
            self.security.trust_proxy_headers = v.parse().unwrap_or(self.security.trust_proxy_headers);
        }
        if let Ok(v) = env::var("SECURITY_AUDIT_ADMINS") {
            self.security.audit_admins = v
                .split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Ok(v) = env::var("SECURITY_JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }

        // Payment provider overrides
        if let Ok(v) = env::var("PAYMENT_API_URL") {
            self.payment.api_url = v;
        }
        if let Ok(v) = env::var("PAYMENT_API_KEY") {
            self.payment.api_key = v;
        }
        if let Ok(v) = env::var("PAYMENT_TIMEOUT_SECS") {
            self.payment.timeout_secs = v.parse().unwrap_or(self.payment.timeout_secs);
        }

        self
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                connection_timeout: 30,
            },
            api: ApiConfig {
                port: 3000,
                enable_rate_limiting: true,
                auth_rate_limit: RateLimitPolicy { max_requests: 20, window_secs: 15 * 60 },
                upload_rate_limit: RateLimitPolicy { max_requests: 100, window_secs: 60 },
                rate_limit_sweep_secs: 60,
                max_request_size_bytes: 10 * 1024 * 1024, // 10MB
            },
            security: SecurityConfig {
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
                enable_audit_logging: true,
                trust_proxy_headers: true,
                audit_admins: Vec::new(),
                jwt_secret: "farmagenius-dev-secret".to_string(),
                jwt_expiry_hours: 24 * 7, // 1 week
            },
            payment: PaymentConfig {
                api_url: "http://localhost:4010".to_string(),
                api_key: String::new(),
                timeout_secs: 30,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig {
                url: None,
                max_connections: 20,
                connection_timeout: 10,
            },
            api: ApiConfig {
                port: 3000,
                enable_rate_limiting: true,
                auth_rate_limit: RateLimitPolicy { max_requests: 10, window_secs: 15 * 60 },
                upload_rate_limit: RateLimitPolicy { max_requests: 60, window_secs: 60 },
                rate_limit_sweep_secs: 60,
                max_request_size_bytes: 10 * 1024 * 1024,
            },
            security: SecurityConfig {
                cors_origins: vec!["https://staging.farmagenius.com.br".to_string()],
                enable_audit_logging: true,
                trust_proxy_headers: false,
                audit_admins: Vec::new(),
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
            },
            payment: PaymentConfig {
                api_url: "https://sandbox.asaas.com/api/v3".to_string(),
                api_key: String::new(),
                timeout_secs: 15,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            database: DatabaseConfig {
                url: None,
                max_connections: 50,
                connection_timeout: 5,
            },
            api: ApiConfig {
                port: 3000,
                enable_rate_limiting: true,
                auth_rate_limit: RateLimitPolicy { max_requests: 5, window_secs: 15 * 60 },
                upload_rate_limit: RateLimitPolicy { max_requests: 30, window_secs: 60 },
                rate_limit_sweep_secs: 60,
                max_request_size_bytes: 10 * 1024 * 1024,
            },
            security: SecurityConfig {
                cors_origins: vec!["https://app.farmagenius.com.br".to_string()],
                enable_audit_logging: true,
                trust_proxy_headers: false,
                audit_admins: Vec::new(),
                jwt_secret: String::new(),
                jwt_expiry_hours: 8,
            },
            payment: PaymentConfig {
                api_url: "https://api.asaas.com/v3".to_string(),
                api_key: String::new(),
                timeout_secs: 15,
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert!(config.api.enable_rate_limiting);
        assert!(!config.security.jwt_secret.is_empty());
        assert!(config.security.trust_proxy_headers);
        assert_eq!(config.api.auth_rate_limit.window(), Duration::from_secs(900));
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert!(config.security.jwt_secret.is_empty());
        assert_eq!(config.api.auth_rate_limit.max_requests, 5);
        assert!(config.security.enable_audit_logging);
        assert!(!config.security.trust_proxy_headers);
        assert!(config.security.audit_admins.is_empty());
    }

    #[test]
    fn audit_admins_match_without_case() {
        let mut security = AppConfig::development().security;
        security.audit_admins = vec!["gestor@farmacia.com".to_string()];
        assert!(security.is_audit_admin("Gestor@Farmacia.com"));
        assert!(!security.is_audit_admin("ana@farmacia.com"));
    }
}
