use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::AppError;

/// Public URL prefix stored file references are served from.
pub const PUBLIC_PREFIX: &str = "/uploads/";

/// Persists uploaded files and hands back a public reference for each.
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Stores the bytes under a name derived from the upload time and the
    /// original filename. Returns the public path the file is served from.
    async fn save_file(&self, original_name: &str, bytes: &[u8]) -> Result<String, AppError>;

    /// Removes a previously stored file by its public path.
    async fn remove_file(&self, public_path: &str) -> Result<(), AppError>;
}

/// Stores files on the local filesystem under a configured directory.
pub struct LocalFileStorage {
    root: PathBuf,
}

impl LocalFileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Replaces path separators so a crafted filename cannot escape the
    /// upload directory.
    fn sanitize(name: &str) -> String {
        name.chars()
            .map(|c| match c {
                '/' | '\\' | ':' => '_',
                c => c,
            })
            .collect()
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn save_file(&self, original_name: &str, bytes: &[u8]) -> Result<String, AppError> {
        tokio::fs::create_dir_all(&self.root).await?;

        let file_name = format!(
            "{}_{}",
            Utc::now().timestamp_millis(),
            Self::sanitize(original_name)
        );
        tokio::fs::write(self.root.join(&file_name), bytes).await?;

        Ok(format!("{}{}", PUBLIC_PREFIX, file_name))
    }

    async fn remove_file(&self, public_path: &str) -> Result<(), AppError> {
        // References not produced by save_file are left alone.
        let Some(file_name) = public_path.strip_prefix(PUBLIC_PREFIX) else {
            return Ok(());
        };

        tokio::fs::remove_file(self.root.join(file_name)).await?;
        Ok(())
    }
}
