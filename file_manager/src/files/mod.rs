pub mod archive;
pub mod manager;
pub mod models;
pub mod paths;
pub mod storage;
pub mod validation;

pub use manager::FileManager;
pub use models::{Destination, FileCategory, FileKey, FileUpload, RequestOrigin, StoredFile, Subfolder};
pub use paths::PathResolver;
pub use storage::{LocalStorage, StorageBackend};
pub use validation::{extension_of, total_size_mb, FileValidator, ValidationError, BLACKLISTED_EXTENSIONS};
