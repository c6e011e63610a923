use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use super::validation::ValidationError;

/// Closed classification of an upload. Picks the allow-list and, under the
/// category layout, the directory the file lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileCategory {
    Image,
    Document,
    Video,
    Other,
}

impl FileCategory {
    pub const ALL: [FileCategory; 4] = [
        FileCategory::Image,
        FileCategory::Document,
        FileCategory::Video,
        FileCategory::Other,
    ];

    /// Directory name used on disk and in URLs.
    pub fn dir_name(self) -> &'static str {
        match self {
            FileCategory::Image => "Image",
            FileCategory::Document => "Document",
            FileCategory::Video => "Video",
            FileCategory::Other => "Other",
        }
    }
}

impl fmt::Display for FileCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl FromStr for FileCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FileCategory::ALL
            .into_iter()
            .find(|category| category.dir_name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown file category: {}", s))
    }
}

/// A caller-chosen folder under the root, checked so it cannot leave it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Subfolder(String);

impl Subfolder {
    pub fn new(raw: &str) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::InvalidSubfolder {
            subfolder: raw.to_string(),
        };

        let parts: Vec<&str> = raw
            .trim()
            .split(['/', '\\'])
            .collect();

        let all_plain = parts.iter().all(|part| {
            !part.is_empty()
                && *part != "."
                && *part != ".."
                && part.trim() == *part
                && !part.contains(':')
                && !part.contains('\0')
        });

        if !all_plain {
            return Err(invalid());
        }

        Ok(Self(parts.join("/")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }
}

impl fmt::Display for Subfolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where an operation is aimed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Category(FileCategory),
    /// `None` addresses the root folder itself.
    Folder(Option<Subfolder>),
}

impl Destination {
    pub fn root() -> Self {
        Destination::Folder(None)
    }

    pub fn subfolder(raw: &str) -> Result<Self, ValidationError> {
        Subfolder::new(raw).map(|folder| Destination::Folder(Some(folder)))
    }

    /// Folder key relative to the root, `/`-separated.
    pub fn folder_key(&self) -> Option<&str> {
        match self {
            Destination::Category(category) => Some(category.dir_name()),
            Destination::Folder(Some(folder)) => Some(folder.as_str()),
            Destination::Folder(None) => None,
        }
    }
}

impl From<FileCategory> for Destination {
    fn from(category: FileCategory) -> Self {
        Destination::Category(category)
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Category(category) => write!(f, "category {}", category),
            Destination::Folder(Some(folder)) => write!(f, "subfolder {}", folder),
            Destination::Folder(None) => f.write_str("root folder"),
        }
    }
}

/// A file handed to the manager by the caller.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub original_filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl FileUpload {
    pub fn new(original_filename: impl Into<String>, content_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            original_filename: original_filename.into(),
            content_type: content_type.into(),
            data,
        }
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Storage address of an object: optional folder key plus file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileKey {
    pub folder: Option<String>,
    pub name: String,
}

impl FileKey {
    pub fn new(folder: Option<&str>, name: impl Into<String>) -> Self {
        Self {
            folder: folder.map(str::to_string),
            name: name.into(),
        }
    }
}

impl fmt::Display for FileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.folder {
            Some(folder) => write!(f, "{}/{}", folder, self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// Outcome of a successful upload.
#[derive(Debug, Clone, Serialize)]
pub struct StoredFile {
    pub name: String,
    pub original_filename: String,
    pub folder: Option<String>,
    pub size: u64,
    /// Name, path or URL, per the configured link style.
    pub location: String,
    #[serde(skip)]
    pub path: PathBuf,
}

/// Scheme and host of the request being served, used to build URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOrigin {
    pub scheme: String,
    pub host: String,
}

impl RequestOrigin {
    pub fn new(scheme: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            host: host.into(),
        }
    }
}
