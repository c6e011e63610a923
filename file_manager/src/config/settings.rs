use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};

const MEGABYTE: u64 = 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub files: FileConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// How stored files are grouped under the root folder.
///
/// `Category` keys directories by [`FileCategory`](crate::files::FileCategory) and
/// applies the per-category allow-lists. `Subfolder` accepts a caller-chosen
/// folder and applies the global allow-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageLayout {
    Category,
    Subfolder,
}

impl fmt::Display for StorageLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageLayout::Category => f.write_str("category"),
            StorageLayout::Subfolder => f.write_str("subfolder"),
        }
    }
}

/// What an upload hands back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkStyle {
    /// The generated file name only.
    Name,
    /// The absolute path on disk.
    Path,
    /// `<scheme>://<host>/<root>/<folder>/<name>`, needs a request origin.
    Url,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    pub root_folder_name: String,
    /// Directory that holds the root folder. Falls back to the process
    /// working directory, read on every call.
    pub base_dir: Option<PathBuf>,
    pub layout: StorageLayout,
    pub allowed_extensions: Vec<String>,
    pub allowed_image_extensions: Vec<String>,
    pub allowed_document_extensions: Vec<String>,
    pub allowed_video_extensions: Vec<String>,
    pub max_single_file_size_bytes: u64,
    pub max_total_files_size_in_mb: Option<f64>,
    /// Most files a single batch may carry.
    pub max_files_per_request: usize,
    pub link_style: LinkStyle,
    pub azure_blob_connection_string: Option<String>,
    pub azure_blob_container_name: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            files: FileConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

fn extensions(list: &[&str]) -> Vec<String> {
    list.iter().map(|ext| ext.to_string()).collect()
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            root_folder_name: "Uploads".to_string(),
            base_dir: None,
            layout: StorageLayout::Category,
            allowed_extensions: extensions(&[
                ".jpg", ".jpeg", ".png", ".gif", ".pdf", ".docx", ".txt", ".mp4", ".avi", ".mov",
            ]),
            allowed_image_extensions: extensions(&[".jpg", ".jpeg", ".png", ".gif", ".webp"]),
            allowed_document_extensions: extensions(&[".pdf", ".docx", ".doc", ".txt", ".xlsx", ".csv"]),
            allowed_video_extensions: extensions(&[".mp4", ".avi", ".mov", ".mkv"]),
            max_single_file_size_bytes: 10 * MEGABYTE,
            max_total_files_size_in_mb: Some(50.0),
            max_files_per_request: 20,
            link_style: LinkStyle::Url,
            azure_blob_connection_string: None,
            azure_blob_container_name: None,
        }
    }
}

impl FileConfig {
    /// Largest request body the upload endpoints need to accept. Without a
    /// total cap a batch may hold `max_files_per_request` full-size files.
    pub fn max_request_bytes(&self) -> usize {
        let batch_bytes = match self.max_total_files_size_in_mb {
            Some(mb) => (mb * MEGABYTE as f64).ceil() as u64,
            None => self
                .max_single_file_size_bytes
                .saturating_mul(self.max_files_per_request as u64),
        };

        // Multipart framing and headers ride on top of the payload.
        let limit = batch_bytes
            .max(self.max_single_file_size_bytes)
            .saturating_add(MEGABYTE);
        usize::try_from(limit).unwrap_or(usize::MAX)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut components = Path::new(&self.root_folder_name).components();
        let single_normal = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );
        if self.root_folder_name.trim().is_empty() || !single_normal {
            return Err(ConfigError::Message(format!(
                "Root folder name must be a single directory name, got {:?}",
                self.root_folder_name
            )));
        }

        if self.max_single_file_size_bytes == 0 {
            return Err(ConfigError::Message(
                "Max single file size must be greater than 0".to_string(),
            ));
        }

        if self.max_files_per_request == 0 {
            return Err(ConfigError::Message(
                "Max files per request must be greater than 0".to_string(),
            ));
        }

        if let Some(limit) = self.max_total_files_size_in_mb {
            if !limit.is_finite() || limit <= 0.0 {
                return Err(ConfigError::Message(
                    "Max total files size must be greater than 0".to_string(),
                ));
            }
        }

        if self.azure_blob_connection_string.is_some() || self.azure_blob_container_name.is_some() {
            tracing::warn!(
                "Azure Blob Storage settings are present but no object-store backend is available; files stay on the local filesystem"
            );
        }

        Ok(())
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .add_source(Config::try_from(&AppConfig::default())?);

        if std::path::Path::new("config.toml").exists() {
            builder = builder.add_source(File::with_name("config"));
        }

        builder = builder.add_source(
            Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("files.allowed_extensions")
                .with_list_parse_key("files.allowed_image_extensions")
                .with_list_parse_key("files.allowed_document_extensions")
                .with_list_parse_key("files.allowed_video_extensions")
                .try_parsing(true),
        );

        let config = builder.build()?;
        let app_config: AppConfig = config.try_deserialize()?;

        app_config.validate()?;

        Ok(app_config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Message("Server port cannot be 0".to_string()));
        }

        self.socket_addr()?;
        self.files.validate()
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind_address()
            .parse()
            .map_err(|e| ConfigError::Message(format!("Invalid bind address: {}", e)))
    }
}
