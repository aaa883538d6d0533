use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub admin_token: String,
    pub token_secret: String,
    pub app_host: String,
    pub notify_url: Option<String>,
    pub from_address: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "slotbook.db".to_string()),
            admin_token: env::var("ADMIN_TOKEN").unwrap_or_else(|_| "changeme".to_string()),
            token_secret: env::var("TOKEN_SECRET").unwrap_or_else(|_| "changeme".to_string()),
            app_host: env::var("APP_HOST")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            notify_url: env::var("NOTIFY_URL").ok().filter(|v| !v.is_empty()),
            from_address: env::var("FROM_ADDRESS").unwrap_or_default(),
        }
    }
}
