use std::path::{Component, Path, PathBuf};
use tokio::fs as async_fs;

use crate::config::FileConfig;
use crate::error::{AppError, Result};
use super::models::Destination;

/// Maps destinations and folder keys onto directories under the root folder.
#[derive(Debug, Clone)]
pub struct PathResolver {
    base_dir: Option<PathBuf>,
    root_folder_name: String,
}

impl PathResolver {
    pub fn new(config: &FileConfig) -> Self {
        Self {
            base_dir: config.base_dir.clone(),
            root_folder_name: config.root_folder_name.clone(),
        }
    }

    pub fn root_folder_name(&self) -> &str {
        &self.root_folder_name
    }

    /// `<base>/<root folder>`. Without a configured base the working
    /// directory is read here, on every call.
    pub fn root(&self) -> Result<PathBuf> {
        let base = match &self.base_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir()?,
        };
        Ok(base.join(&self.root_folder_name))
    }

    pub fn resolve_directory(&self, destination: &Destination) -> Result<PathBuf> {
        self.folder_directory(destination.folder_key())
    }

    /// Directory for a `/`-separated folder key, or the root for `None`.
    pub fn folder_directory(&self, folder: Option<&str>) -> Result<PathBuf> {
        let root = self.root()?;
        let Some(folder) = folder else {
            return Ok(root);
        };

        let mut directory = root.clone();
        for segment in folder.split('/') {
            let mut components = Path::new(segment).components();
            match (components.next(), components.next()) {
                (Some(Component::Normal(part)), None) => directory.push(part),
                _ => return Err(AppError::InvalidPath(folder.to_string())),
            }
        }

        if !directory.starts_with(&root) {
            return Err(AppError::InvalidPath(folder.to_string()));
        }

        Ok(directory)
    }

    pub async fn ensure_directory(&self, directory: &Path) -> Result<()> {
        if !async_fs::try_exists(directory).await? {
            tracing::debug!("Creating storage directory {}", directory.display());
            async_fs::create_dir_all(directory).await?;
        }
        Ok(())
    }
}
