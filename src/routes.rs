// src/routes.rs

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::Method,
    middleware,
    routing::{delete, get, post, put},
};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::{
    handlers::{auth, comments, posts, users},
    state::AppState,
    utils::jwt::{auth_gate, require_auth},
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (users, posts, comments).
/// * Applies global middleware (Trace, CORS, authentication gate).
/// * Serves uploaded files under /uploads.
pub fn create_router(state: AppState) -> Router {
    let origins = [
        "http://localhost:3000".parse().unwrap(),
        "http://127.0.0.1:3000".parse().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let user_routes = Router::new()
        .route("/create", post(auth::register))
        .route("/login", post(auth::login))
        .route("/", get(users::list_users))
        .route("/{id}", get(users::get_user))
        // Protected user routes
        .merge(
            Router::new()
                .route("/update/{id}", put(users::update_user))
                .route("/delete/{id}", delete(users::delete_user))
                .layer(middleware::from_fn(require_auth)),
        );

    let post_routes = Router::new()
        .route("/", get(posts::list_posts))
        .route("/{id}", get(posts::get_post))
        // Protected post routes
        .merge(
            Router::new()
                .route("/create", post(posts::create_post))
                .route("/{id}", put(posts::update_post).delete(posts::delete_post))
                .layer(middleware::from_fn(require_auth))
                // Multipart uploads need room beyond the default body cap.
                .layer(DefaultBodyLimit::max(20 * 1024 * 1024)),
        );

    let comment_routes = Router::new()
        .route("/post/{post_id}", get(comments::list_comments_for_post))
        .route("/{id}", get(comments::get_comment))
        // Protected comment routes
        .merge(
            Router::new()
                .route("/create", post(comments::create_comment))
                .route("/delete/{id}", delete(comments::delete_comment))
                .layer(middleware::from_fn(require_auth)),
        );

    Router::new()
        .nest("/api/users", user_routes)
        .nest("/api/posts", post_routes)
        .nest("/api/comments", comment_routes)
        .nest_service("/uploads", ServeDir::new(&state.config.upload_dir))
        // Global Middleware (applied from outside in)
        .layer(middleware::from_fn_with_state(state.clone(), auth_gate))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
