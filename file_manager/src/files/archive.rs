use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::Result;
use super::models::FileUpload;

pub const ARCHIVE_EXTENSION: &str = ".zip";
const MAX_DEFLATE_LEVEL: i64 = 9;

/// Builds a single-entry zip holding `file` under its original name.
///
/// Synchronous and CPU-bound: callers on the async runtime should run it
/// through `spawn_blocking`.
pub fn compress(file: &FileUpload) -> Result<Vec<u8>> {
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(MAX_DEFLATE_LEVEL))
        .large_file(file.size() >= u32::MAX as u64);

    let mut writer = ZipWriter::new(Cursor::new(Vec::with_capacity(file.data.len() / 2)));
    writer.start_file(file.original_filename.as_str(), options)?;
    writer.write_all(&file.data)?;

    let cursor = writer.finish()?;
    Ok(cursor.into_inner())
}
