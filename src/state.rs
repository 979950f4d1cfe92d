use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::PgPool;

use crate::{config::Config, utils::storage::FileStorage};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    /// Collaborator for persisting uploaded files.
    pub storage: Arc<dyn FileStorage>,
}

impl FromRef<AppState> for PgPool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
