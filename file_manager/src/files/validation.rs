use std::path::Path;
use thiserror::Error;

use crate::config::{FileConfig, StorageLayout};
use super::models::{Destination, FileCategory, FileUpload};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;
const MAX_FILENAME_LENGTH: usize = 255;

/// Extensions rejected no matter what the allow-lists say.
pub const BLACKLISTED_EXTENSIONS: [&str; 11] = [
    ".exe", ".bat", ".sh", ".cmd", ".com", ".msi", ".vbs", ".js", ".scr", ".jar", ".ps1",
];

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("File is empty")]
    EmptyFile,

    #[error("File size ({} MB) exceeds the allowed limit of {} MB", whole_mb(.size), whole_mb(.max_size))]
    FileTooLarge { size: u64, max_size: u64 },

    #[error("Filename too long: {length} characters (max: {max_length})")]
    FilenameTooLong { length: usize, max_length: usize },

    #[error("Invalid filename: {filename}")]
    InvalidFilename { filename: String },

    #[error("File type {extension} is not allowed for security reasons")]
    ForbiddenExtension { extension: String },

    #[error("Invalid file type {extension}. Allowed extensions: {}", join_list(.allowed))]
    DisallowedExtension { extension: String, allowed: Vec<String> },

    #[error("No files provided")]
    NoFiles,

    #[error("Files size ({total_mb} MB) exceeds the allowed limit of {limit_mb} MB")]
    BatchTooLarge { total_mb: f64, limit_mb: f64 },

    #[error("Too many files: {count} (max: {max})")]
    TooManyFiles { count: usize, max: usize },

    #[error("Invalid batch size limit {limit_mb} MB: must be a positive number")]
    InvalidBatchLimit { limit_mb: f64 },

    #[error("Invalid subfolder: {subfolder}")]
    InvalidSubfolder { subfolder: String },

    #[error("{destination} cannot be used with the {layout} storage layout")]
    UnsupportedDestination { destination: String, layout: StorageLayout },
}

fn whole_mb(bytes: &u64) -> u64 {
    bytes / (1024 * 1024)
}

fn join_list(items: &[String]) -> String {
    items.join(", ")
}

impl ValidationError {
    pub fn is_size_limit(&self) -> bool {
        matches!(
            self,
            ValidationError::FileTooLarge { .. }
                | ValidationError::BatchTooLarge { .. }
                | ValidationError::TooManyFiles { .. }
        )
    }
}

/// Extension of `filename` as written, leading dot included. A name that is
/// all extension (`.exe`) counts as one; a trailing dot yields none.
pub(crate) fn original_extension(filename: &str) -> Option<&str> {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let dot = name.rfind('.')?;
    if dot + 1 == name.len() {
        return None;
    }
    Some(&name[dot..])
}

/// Lowercased extension of `filename`, leading dot included, or an empty
/// string when there is none.
pub fn extension_of(filename: &str) -> String {
    original_extension(filename)
        .map(str::to_lowercase)
        .unwrap_or_default()
}

/// Combined size of `files` in megabytes, rounded to two decimals.
pub fn total_size_mb(files: &[FileUpload]) -> f64 {
    let total_bytes: u64 = files.iter().map(FileUpload::size).sum();
    round_mb(total_bytes as f64 / BYTES_PER_MB)
}

fn round_mb(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn normalize_extensions(list: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = list
        .iter()
        .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
        .filter(|ext| !ext.is_empty())
        .map(|ext| format!(".{}", ext))
        .collect();
    normalized.dedup();
    normalized
}

#[derive(Debug, Clone)]
enum AllowList {
    Global(Vec<String>),
    PerCategory {
        image: Vec<String>,
        document: Vec<String>,
        video: Vec<String>,
        other: Vec<String>,
    },
}

#[derive(Debug, Clone)]
pub struct FileValidator {
    layout: StorageLayout,
    allow_list: AllowList,
    max_file_size: u64,
    max_total_mb: Option<f64>,
    max_files: usize,
}

impl FileValidator {
    pub fn new(config: &FileConfig) -> Self {
        let allow_list = match config.layout {
            StorageLayout::Subfolder => AllowList::Global(normalize_extensions(&config.allowed_extensions)),
            StorageLayout::Category => AllowList::PerCategory {
                image: normalize_extensions(&config.allowed_image_extensions),
                document: normalize_extensions(&config.allowed_document_extensions),
                video: normalize_extensions(&config.allowed_video_extensions),
                other: normalize_extensions(&config.allowed_extensions),
            },
        };

        Self {
            layout: config.layout,
            allow_list,
            max_file_size: config.max_single_file_size_bytes,
            max_total_mb: config.max_total_files_size_in_mb,
            max_files: config.max_files_per_request,
        }
    }

    pub fn with_default_config() -> Self {
        Self::new(&FileConfig::default())
    }

    pub fn layout(&self) -> StorageLayout {
        self.layout
    }

    /// Allow-list that applies to uploads aimed at `destination`.
    pub fn allowed_extensions(&self, destination: &Destination) -> &[String] {
        match (&self.allow_list, destination) {
            (AllowList::Global(list), _) => list,
            (AllowList::PerCategory { image, document, video, other }, Destination::Category(category)) => {
                match category {
                    FileCategory::Image => image,
                    FileCategory::Document => document,
                    FileCategory::Video => video,
                    FileCategory::Other => other,
                }
            }
            (AllowList::PerCategory { other, .. }, Destination::Folder(_)) => other,
        }
    }

    /// Rejects destinations that don't belong to the configured layout.
    pub fn check_destination(&self, destination: &Destination) -> Result<(), ValidationError> {
        let matches_layout = matches!(
            (self.layout, destination),
            (StorageLayout::Category, Destination::Category(_))
                | (StorageLayout::Subfolder, Destination::Folder(_))
        );

        if !matches_layout {
            return Err(ValidationError::UnsupportedDestination {
                destination: destination.to_string(),
                layout: self.layout,
            });
        }
        Ok(())
    }

    pub fn validate_upload(&self, file: &FileUpload, destination: &Destination) -> Result<(), ValidationError> {
        if file.data.is_empty() {
            return Err(ValidationError::EmptyFile);
        }

        if file.size() > self.max_file_size {
            return Err(ValidationError::FileTooLarge {
                size: file.size(),
                max_size: self.max_file_size,
            });
        }

        self.validate_filename(&file.original_filename)?;

        let extension = extension_of(&file.original_filename);

        if BLACKLISTED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(ValidationError::ForbiddenExtension { extension });
        }

        let allowed = self.allowed_extensions(destination);
        if !allowed.contains(&extension) {
            return Err(ValidationError::DisallowedExtension {
                extension,
                allowed: allowed.to_vec(),
            });
        }

        Ok(())
    }

    /// Aggregate check for a multi-file upload. Runs before any file is written.
    pub fn validate_batch(&self, files: &[FileUpload], limit_override_mb: Option<f64>) -> Result<(), ValidationError> {
        if files.is_empty() {
            return Err(ValidationError::NoFiles);
        }

        if files.len() > self.max_files {
            return Err(ValidationError::TooManyFiles {
                count: files.len(),
                max: self.max_files,
            });
        }

        if let Some(limit_mb) = limit_override_mb {
            if !limit_mb.is_finite() || limit_mb <= 0.0 {
                return Err(ValidationError::InvalidBatchLimit { limit_mb });
            }
        }

        let limit_mb = limit_override_mb
            .or(self.max_total_mb)
            .unwrap_or_else(|| {
                round_mb(files.len() as f64 * self.max_file_size as f64 / BYTES_PER_MB)
            });

        let total_mb = total_size_mb(files);
        if total_mb > limit_mb {
            return Err(ValidationError::BatchTooLarge { total_mb, limit_mb });
        }

        Ok(())
    }

    /// Checks a name supplied for download or delete: a bare file name only.
    pub fn validate_stored_name(&self, name: &str) -> Result<(), ValidationError> {
        let invalid = name.trim().is_empty()
            || name == "."
            || name == ".."
            || name.contains(['/', '\\', '\0']);

        if invalid {
            return Err(ValidationError::InvalidFilename {
                filename: name.to_string(),
            });
        }
        Ok(())
    }

    fn validate_filename(&self, filename: &str) -> Result<(), ValidationError> {
        let length = filename.chars().count();
        if length > MAX_FILENAME_LENGTH {
            return Err(ValidationError::FilenameTooLong {
                length,
                max_length: MAX_FILENAME_LENGTH,
            });
        }

        if filename.trim().is_empty() || filename.contains(['/', '\\', '\0']) {
            return Err(ValidationError::InvalidFilename {
                filename: filename.to_string(),
            });
        }

        Ok(())
    }
}
