//! Content type detection for local image files

use std::path::Path;

use flavorsnap_common::UploadFile;

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// MIME type from magic bytes, else from the file extension
pub fn detect_content_type(path: &Path, data: &[u8]) -> String {
    if let Some(kind) = infer::get(data) {
        return kind.mime_type().to_string();
    }
    content_type_from_extension(path)
        .unwrap_or(FALLBACK_CONTENT_TYPE)
        .to_string()
}

fn content_type_from_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "txt" => Some("text/plain"),
        _ => None,
    }
}

/// Read a file from disk into an [`UploadFile`] with a detected type
pub async fn load_upload(path: &Path) -> std::io::Result<UploadFile> {
    let data = tokio::fs::read(path).await?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());
    let content_type = detect_content_type(path, &data);
    Ok(UploadFile::new(file_name, content_type, data))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    #[test]
    fn test_magic_bytes_win_over_extension() {
        assert_eq!(detect_content_type(Path::new("photo.txt"), PNG_MAGIC), "image/png");
        assert_eq!(detect_content_type(Path::new("x"), &[0xFF, 0xD8, 0xFF, 0xE0, 0, 0]), "image/jpeg");
    }

    #[test]
    fn test_extension_fallback() {
        assert_eq!(detect_content_type(Path::new("notes.TXT"), b"hello"), "text/plain");
        assert_eq!(detect_content_type(Path::new("meal.webp"), b""), "image/webp");
        assert_eq!(detect_content_type(Path::new("blob"), b"???"), FALLBACK_CONTENT_TYPE);
    }

    #[tokio::test]
    async fn test_load_upload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jollof.png");
        std::fs::write(&path, PNG_MAGIC).unwrap();

        let upload = load_upload(&path).await.unwrap();
        assert_eq!(upload.file_name, "jollof.png");
        assert_eq!(upload.content_type, "image/png");
        assert_eq!(upload.size(), PNG_MAGIC.len() as u64);
    }
}
