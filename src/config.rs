// src/config.rs

use dotenvy::dotenv;
use std::env;

/// Default token lifetime: 24 hours.
const DEFAULT_JWT_EXPIRATION_SECS: u64 = 60 * 60 * 24;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    /// Token lifetime in seconds.
    pub jwt_expiration: u64,
    pub rust_log: String,
    /// Directory uploaded files are written to. Served under /uploads.
    pub upload_dir: String,
    /// Optional credentials for seeding an admin account at startup.
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");

        let jwt_expiration = env::var("JWT_EXPIRATION")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_JWT_EXPIRATION_SECS);

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let upload_dir = env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string());

        let admin_email = env::var("ADMIN_EMAIL").ok();
        let admin_password = env::var("ADMIN_PASSWORD").ok();

        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            upload_dir,
            admin_email,
            admin_password,
        }
    }
}
