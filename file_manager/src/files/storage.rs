use async_trait::async_trait;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs as async_fs;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use super::models::FileKey;
use super::paths::PathResolver;

/// Where file bytes live. The local filesystem is the only backend today;
/// validation and naming sit above this trait so another backend can be
/// swapped in without touching them.
///
/// No locking is done here. A `get` racing a `remove` on the same key may
/// see either the bytes or `NotFound`.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Writes `data` under `key`, creating the folder when missing.
    async fn put(&self, key: &FileKey, data: &[u8]) -> Result<()>;

    /// Reads the object stored under `key`. Missing objects are `NotFound`.
    async fn get(&self, key: &FileKey) -> Result<Vec<u8>>;

    /// Removes the object stored under `key`. Missing objects are `NotFound`.
    async fn remove(&self, key: &FileKey) -> Result<()>;

    /// Every stored object named exactly `name`, in any folder.
    async fn search(&self, name: &str) -> Result<Vec<FileKey>>;

    /// Backend-specific location of `key`; a filesystem path for local storage.
    fn locate(&self, key: &FileKey) -> Result<PathBuf>;
}

#[derive(Debug, Clone)]
pub struct LocalStorage {
    resolver: PathResolver,
}

impl LocalStorage {
    pub fn new(resolver: PathResolver) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    fn file_path(&self, key: &FileKey) -> Result<PathBuf> {
        let directory = self.resolver.folder_directory(key.folder.as_deref())?;
        Ok(directory.join(&key.name))
    }
}

fn not_found(key: &FileKey) -> AppError {
    AppError::NotFound(key.name.clone())
}

#[async_trait]
impl StorageBackend for LocalStorage {
    async fn put(&self, key: &FileKey, data: &[u8]) -> Result<()> {
        let directory = self.resolver.folder_directory(key.folder.as_deref())?;
        self.resolver.ensure_directory(&directory).await?;

        let path = directory.join(&key.name);
        let mut file = async_fs::File::create(&path).await?;
        file.write_all(data).await?;
        file.sync_all().await?;

        Ok(())
    }

    async fn get(&self, key: &FileKey) -> Result<Vec<u8>> {
        let path = self.file_path(key)?;
        match async_fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(not_found(key)),
            Err(e) => {
                tracing::error!("Failed to read file {}: {}", key, e);
                Err(e.into())
            }
        }
    }

    async fn remove(&self, key: &FileKey) -> Result<()> {
        let path = self.file_path(key)?;
        match async_fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(not_found(key)),
            Err(e) => {
                tracing::error!("Failed to delete file {}: {}", key, e);
                Err(e.into())
            }
        }
    }

    async fn search(&self, name: &str) -> Result<Vec<FileKey>> {
        let root = self.resolver.root()?;
        let name = name.to_string();

        let keys = tokio::task::spawn_blocking(move || find_by_name(&root, &name)).await??;
        tracing::debug!("Search found {} matching file(s)", keys.len());
        Ok(keys)
    }

    fn locate(&self, key: &FileKey) -> Result<PathBuf> {
        self.file_path(key)
    }
}

fn find_by_name(root: &Path, name: &str) -> std::io::Result<Vec<FileKey>> {
    fn visit_dir(dir: &Path, folder: Option<&str>, name: &str, found: &mut Vec<FileKey>) -> std::io::Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            let entry_name = entry.file_name();
            let Some(entry_name) = entry_name.to_str() else {
                continue;
            };

            if file_type.is_dir() {
                let child = match folder {
                    Some(parent) => format!("{}/{}", parent, entry_name),
                    None => entry_name.to_string(),
                };
                visit_dir(&entry.path(), Some(&child), name, found)?;
            } else if file_type.is_file() && entry_name == name {
                found.push(FileKey::new(folder, entry_name));
            }
        }
        Ok(())
    }

    let mut found = Vec::new();
    if root.is_dir() {
        visit_dir(root, None, name, &mut found)?;
    }
    found.sort_by(|a, b| a.to_string().cmp(&b.to_string()));
    Ok(found)
}
