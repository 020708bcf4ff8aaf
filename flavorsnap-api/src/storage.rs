//! Upload storage
//!
//! Accepted uploads are written to the upload directory as
//! `<unix-millis>-<sanitized name>`.

use std::path::{Path, PathBuf};

use chrono::Utc;
use flavorsnap_common::UploadFile;

/// Where an upload ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredUpload {
    pub file_name: String,
    pub path: PathBuf,
}

/// `<millis>-<name>` with whitespace runs replaced by `-` and any
/// directory components dropped
pub fn stored_file_name(client_name: &str, unix_millis: i64) -> String {
    let base = client_name.rsplit(['/', '\\']).next().unwrap_or(client_name);
    let sanitized = base.split_whitespace().collect::<Vec<_>>().join("-");

    let name = match sanitized.as_str() {
        "" | "." | ".." => "upload",
        other => other,
    };
    format!("{}-{}", unix_millis, name)
}

/// Write `file` into `dir`, creating the directory if needed
pub async fn store_upload(dir: &Path, file: &UploadFile) -> std::io::Result<StoredUpload> {
    tokio::fs::create_dir_all(dir).await?;

    let file_name = stored_file_name(&file.file_name, Utc::now().timestamp_millis());
    let path = dir.join(&file_name);
    tokio::fs::write(&path, &file.data).await?;

    Ok(StoredUpload { file_name, path })
}
