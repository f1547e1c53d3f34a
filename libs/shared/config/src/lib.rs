use std::env;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Supabase,
    Memory,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_service_key: String,
    pub supabase_jwt_secret: String,
    pub review_token_secret: String,
    pub public_base_url: String,
    pub notification_webhook_url: Option<String>,
    pub notification_queue_capacity: usize,
    pub storage_backend: StorageBackend,
    pub server_port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_service_key: env::var("SUPABASE_SERVICE_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_SERVICE_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            review_token_secret: env::var("REVIEW_TOKEN_SECRET")
                .unwrap_or_else(|_| {
                    warn!("REVIEW_TOKEN_SECRET not set, using empty value");
                    String::new()
                }),
            public_base_url: env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| {
                    warn!("PUBLIC_BASE_URL not set, using default");
                    "http://localhost:3000".to_string()
                }),
            notification_webhook_url: env::var("NOTIFICATION_WEBHOOK_URL")
                .ok()
                .filter(|url| !url.is_empty()),
            notification_queue_capacity: env::var("NOTIFICATION_QUEUE_CAPACITY")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(256),
            storage_backend: match env::var("STORAGE_BACKEND").as_deref() {
                Ok("memory") => StorageBackend::Memory,
                Ok("supabase") | Err(_) => StorageBackend::Supabase,
                Ok(other) => {
                    warn!("Unknown STORAGE_BACKEND '{}', using supabase", other);
                    StorageBackend::Supabase
                }
            },
            server_port: env::var("SERVER_PORT")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(3000),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        let storage_ready = match self.storage_backend {
            StorageBackend::Memory => true,
            StorageBackend::Supabase => {
                !self.supabase_url.is_empty() && !self.supabase_service_key.is_empty()
            }
        };

        storage_ready
            && !self.supabase_jwt_secret.is_empty()
            && !self.review_token_secret.is_empty()
    }

    pub fn review_link(&self, token: &str) -> String {
        format!("{}/review/{}", self.public_base_url.trim_end_matches('/'), token)
    }
}
