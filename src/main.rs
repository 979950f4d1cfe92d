// src/main.rs

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use blog_portal::config::Config;
use blog_portal::routes;
use blog_portal::state::AppState;
use blog_portal::utils::hash::hash_password;
use blog_portal::utils::jwt::ROLE_ADMIN;
use blog_portal::utils::storage::LocalFileStorage;
use dotenvy::dotenv;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenv().ok();

    // Load configuration from environment
    let config = Config::from_env();

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    // Initialize Database Pool with Retry
    let mut retry_count = 0;
    let pool = loop {
        match PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.database_url)
            .await
        {
            Ok(pool) => break pool,
            Err(e) => {
                retry_count += 1;
                if retry_count > 5 {
                    panic!("Failed to connect to database after 5 retries: {}", e);
                }
                tracing::warn!("Database not ready, retrying in 2s... (Attempt {})", retry_count);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    };

    tracing::info!("Database connected...");

    // Run Migrations Automatically
    tracing::info!("Running migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Migrations applied successfully.");

    // Seed Admin User
    if let Err(e) = seed_admin_user(&pool, &config).await {
        tracing::error!("Failed to seed admin user: {:?}", e);
    }

    // Uploaded files land here; the router serves the directory read-only.
    std::fs::create_dir_all(&config.upload_dir).expect("Failed to create upload directory");
    let storage = Arc::new(LocalFileStorage::new(&config.upload_dir));

    // Create AppState
    let state = AppState {
        pool: pool.clone(),
        config: config.clone(),
        storage,
    };

    // Create the Axum application router
    let app = routes::create_router(state);

    // Bind to the listening address
    let addr = SocketAddr::from(([0, 0, 0, 0], 3000));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();

    // Start the server
    axum::serve(listener, app).await.unwrap();
}

async fn seed_admin_user(pool: &PgPool, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) {
        let existing = sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(pool)
            .await?;

        if existing.is_none() {
            tracing::info!("Seeding admin user: {}", email);
            let hashed_password = hash_password(password)?;

            sqlx::query(
                r#"
                INSERT INTO users (username, email, password_hash, display_name, role)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind("admin")
            .bind(email)
            .bind(&hashed_password)
            .bind("Administrator")
            .bind(ROLE_ADMIN)
            .execute(pool)
            .await?;
            tracing::info!("Admin user created successfully.");
        }
    }
    Ok(())
}
