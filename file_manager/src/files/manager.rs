use std::sync::Arc;
use url::Url;
use uuid::Uuid;

use crate::config::{FileConfig, LinkStyle, StorageLayout};
use crate::error::{AppError, Result};
use super::archive::{self, ARCHIVE_EXTENSION};
use super::models::{Destination, FileCategory, FileKey, FileUpload, RequestOrigin, StoredFile};
use super::paths::PathResolver;
use super::storage::{LocalStorage, StorageBackend};
use super::validation::{self, FileValidator, ValidationError};

/// Entry point for uploads, downloads, deletes and compression.
///
/// Cheap to clone; configuration is fixed at construction and shared.
#[derive(Clone)]
pub struct FileManager {
    config: Arc<FileConfig>,
    resolver: PathResolver,
    validator: FileValidator,
    backend: Arc<dyn StorageBackend>,
}

impl FileManager {
    pub fn new(config: FileConfig) -> Self {
        let resolver = PathResolver::new(&config);
        let backend = Arc::new(LocalStorage::new(resolver.clone()));
        Self::with_backend(config, backend)
    }

    pub fn with_default_config() -> Self {
        Self::new(FileConfig::default())
    }

    pub fn with_backend(config: FileConfig, backend: Arc<dyn StorageBackend>) -> Self {
        let validator = FileValidator::new(&config);
        let resolver = PathResolver::new(&config);

        Self {
            config: Arc::new(config),
            resolver,
            validator,
            backend,
        }
    }

    pub async fn initialize(&self) -> Result<()> {
        let root = self.resolver.root()?;
        self.resolver.ensure_directory(&root).await
    }

    pub fn config(&self) -> &FileConfig {
        &self.config
    }

    pub fn layout(&self) -> StorageLayout {
        self.config.layout
    }

    pub fn root_directory(&self) -> Result<std::path::PathBuf> {
        self.resolver.root()
    }

    pub fn validator(&self) -> &FileValidator {
        &self.validator
    }

    pub fn total_size_mb(files: &[FileUpload]) -> f64 {
        validation::total_size_mb(files)
    }

    /// Runs every check an upload to `destination` would run, without writing.
    pub fn validate(&self, file: &FileUpload, destination: &Destination) -> Result<()> {
        self.validator.check_destination(destination)?;
        self.validator.validate_upload(file, destination)?;
        Ok(())
    }

    pub async fn upload(
        &self,
        file: FileUpload,
        destination: &Destination,
        origin: Option<&RequestOrigin>,
    ) -> Result<StoredFile> {
        self.validate(&file, destination).inspect_err(|e| {
            tracing::warn!("Rejected upload of {}: {}", file.original_filename, e);
        })?;
        self.ensure_link_available(origin)?;

        self.store(file, destination, origin).await
    }

    /// Uploads `files` in order. The aggregate size and every file are
    /// checked before the first write; a write failure part-way through
    /// leaves the files already written in place.
    pub async fn upload_many(
        &self,
        files: Vec<FileUpload>,
        destination: &Destination,
        limit_override_mb: Option<f64>,
        origin: Option<&RequestOrigin>,
    ) -> Result<Vec<StoredFile>> {
        self.validate_batch(&files, destination, limit_override_mb)?;
        self.ensure_link_available(origin)?;

        let mut stored = Vec::with_capacity(files.len());
        for file in files {
            stored.push(self.store(file, destination, origin).await?);
        }

        tracing::info!("Stored batch of {} file(s) in {}", stored.len(), destination);
        Ok(stored)
    }

    /// Zips `file` and stores the archive as `<uuid>.zip`.
    pub async fn upload_compressed(
        &self,
        file: FileUpload,
        destination: &Destination,
        origin: Option<&RequestOrigin>,
    ) -> Result<StoredFile> {
        self.validate(&file, destination).inspect_err(|e| {
            tracing::warn!("Rejected compressed upload of {}: {}", file.original_filename, e);
        })?;
        self.ensure_link_available(origin)?;

        self.store_compressed(file, destination, origin).await
    }

    pub async fn upload_many_compressed(
        &self,
        files: Vec<FileUpload>,
        destination: &Destination,
        limit_override_mb: Option<f64>,
        origin: Option<&RequestOrigin>,
    ) -> Result<Vec<StoredFile>> {
        self.validate_batch(&files, destination, limit_override_mb)?;
        self.ensure_link_available(origin)?;

        let mut stored = Vec::with_capacity(files.len());
        for file in files {
            stored.push(self.store_compressed(file, destination, origin).await?);
        }

        tracing::info!("Stored batch of {} archive(s) in {}", stored.len(), destination);
        Ok(stored)
    }

    /// In-memory zip of `file`, for handing straight back to a client.
    /// Uses the allow-list of the `Other` category (or the global list).
    pub async fn compress(&self, file: FileUpload) -> Result<Vec<u8>> {
        let destination = self.default_destination();
        self.validator.validate_upload(&file, &destination)?;

        let bytes = tokio::task::spawn_blocking(move || archive::compress(&file)).await??;
        Ok(bytes)
    }

    /// Reads `name` from the folder of `destination`.
    pub async fn download(&self, name: &str, destination: &Destination) -> Result<Vec<u8>> {
        self.validator.check_destination(destination)?;
        self.validator.validate_stored_name(name)?;

        let key = FileKey::new(destination.folder_key(), name);
        self.backend.get(&key).await
    }

    /// Reads `name` wherever it is under the root. More than one match is
    /// refused rather than guessed.
    pub async fn download_by_name(&self, name: &str) -> Result<Vec<u8>> {
        self.validator.validate_stored_name(name)?;

        let mut matches = self.backend.search(name).await?;
        match matches.len() {
            0 => Err(AppError::NotFound(name.to_string())),
            1 => {
                let key = matches.remove(0);
                self.backend.get(&key).await
            }
            count => {
                tracing::warn!("Download of {} is ambiguous: {} matches", name, count);
                Err(AppError::AmbiguousFileName {
                    name: name.to_string(),
                    matches: count,
                })
            }
        }
    }

    /// Deletes `name` from the folder of `destination`.
    ///
    /// Not synchronised with readers: a concurrent `download` of the same
    /// name may return the bytes or `NotFound`.
    pub async fn delete(&self, name: &str, destination: &Destination) -> Result<bool> {
        self.validator.check_destination(destination)?;
        self.validator.validate_stored_name(name)?;

        let key = FileKey::new(destination.folder_key(), name);
        self.backend.remove(&key).await?;

        tracing::info!("Deleted {}", key);
        Ok(true)
    }

    /// Deletes every file called `name` under the root and returns how many.
    pub async fn delete_by_name(&self, name: &str) -> Result<usize> {
        self.validator.validate_stored_name(name)?;

        let matches = self.backend.search(name).await?;
        if matches.is_empty() {
            return Err(AppError::NotFound(name.to_string()));
        }

        for key in &matches {
            self.backend.remove(key).await?;
            tracing::info!("Deleted {}", key);
        }

        Ok(matches.len())
    }

    fn validate_batch(
        &self,
        files: &[FileUpload],
        destination: &Destination,
        limit_override_mb: Option<f64>,
    ) -> Result<()> {
        self.validator.check_destination(destination)?;

        let checked = self
            .validator
            .validate_batch(files, limit_override_mb)
            .and_then(|()| {
                files
                    .iter()
                    .try_for_each(|file| self.validator.validate_upload(file, destination))
            });

        checked.map_err(|e: ValidationError| {
            tracing::warn!("Rejected batch of {} file(s): {}", files.len(), e);
            AppError::from(e)
        })
    }

    fn default_destination(&self) -> Destination {
        match self.config.layout {
            StorageLayout::Category => Destination::Category(FileCategory::Other),
            StorageLayout::Subfolder => Destination::root(),
        }
    }

    fn ensure_link_available(&self, origin: Option<&RequestOrigin>) -> Result<()> {
        if self.config.link_style == LinkStyle::Url {
            let origin = origin.ok_or(AppError::ContextUnavailable)?;
            base_url(origin)?;
        }
        Ok(())
    }

    async fn store(
        &self,
        file: FileUpload,
        destination: &Destination,
        origin: Option<&RequestOrigin>,
    ) -> Result<StoredFile> {
        let extension = validation::original_extension(&file.original_filename).unwrap_or_default();
        let name = generate_name(extension);

        self.persist(name, file.original_filename, &file.data, destination, origin)
            .await
    }

    async fn store_compressed(
        &self,
        file: FileUpload,
        destination: &Destination,
        origin: Option<&RequestOrigin>,
    ) -> Result<StoredFile> {
        let original_filename = file.original_filename.clone();
        let bytes = tokio::task::spawn_blocking(move || archive::compress(&file)).await??;

        let name = generate_name(ARCHIVE_EXTENSION);
        self.persist(name, original_filename, &bytes, destination, origin)
            .await
    }

    async fn persist(
        &self,
        name: String,
        original_filename: String,
        data: &[u8],
        destination: &Destination,
        origin: Option<&RequestOrigin>,
    ) -> Result<StoredFile> {
        let key = FileKey::new(destination.folder_key(), name);
        self.backend.put(&key, data).await?;

        let path = self.backend.locate(&key)?;
        let location = match self.config.link_style {
            LinkStyle::Name => key.name.clone(),
            LinkStyle::Path => path.to_string_lossy().to_string(),
            LinkStyle::Url => {
                let origin = origin.ok_or(AppError::ContextUnavailable)?;
                file_url(origin, &self.config.root_folder_name, &key)?
            }
        };

        tracing::info!(
            original = %original_filename,
            stored = %key,
            size = data.len(),
            "Stored file"
        );

        Ok(StoredFile {
            name: key.name,
            original_filename,
            folder: key.folder,
            size: data.len() as u64,
            location,
            path,
        })
    }
}

fn generate_name(extension: &str) -> String {
    format!("{}{}", Uuid::new_v4(), extension)
}

fn base_url(origin: &RequestOrigin) -> Result<Url> {
    Url::parse(&format!("{}://{}/", origin.scheme, origin.host))
        .ok()
        .filter(|url| !url.cannot_be_a_base() && url.path() == "/")
        .ok_or_else(|| AppError::BadRequest(format!("Invalid request host: {}", origin.host)))
}

/// `<scheme>://<host>/<root>/<folder>/<name>` with every path segment
/// percent-encoded.
fn file_url(origin: &RequestOrigin, root_folder_name: &str, key: &FileKey) -> Result<String> {
    let mut url = base_url(origin)?;
    if let Ok(mut segments) = url.path_segments_mut() {
        segments
            .pop_if_empty()
            .push(root_folder_name)
            .extend(key.folder.iter().flat_map(|folder| folder.split('/')))
            .push(&key.name);
    }

    Ok(url.into())
}
