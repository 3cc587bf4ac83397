use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use flowsmith_core::error::{FlowsmithError, Result};
use flowsmith_core::types::{FileRef, FilePayload};
use tracing::debug;

/// MIME type for a file name, from its extension.
pub fn guess_mime(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// Read one file into transport form.
pub async fn encode_file(path: &Path) -> Result<FileRef> {
    let bytes = tokio::fs::read(path).await?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    debug!(file = %name, size = bytes.len(), "Encoded upload");
    Ok(FileRef {
        name,
        mime_type: guess_mime(path),
        size: bytes.len() as u64,
        data: BASE64.encode(&bytes),
    })
}

/// Encode every file concurrently. The result keeps the order of `paths`.
pub async fn encode_files(paths: &[PathBuf]) -> Result<Vec<FileRef>> {
    let futs = paths.iter().map(|p| encode_file(p));
    futures::future::try_join_all(futs).await
}

/// Raw bytes of a produced file.
///
/// Base64 strings may carry a `data:<mime>;base64,` prefix.
pub fn decode_payload(payload: &FilePayload) -> Result<Vec<u8>> {
    match payload {
        FilePayload::Bytes(bytes) => Ok(bytes.clone()),
        FilePayload::Base64(text) => {
            let body = match text.split_once(";base64,") {
                Some((prefix, body)) if prefix.starts_with("data:") => body,
                _ => text.as_str(),
            };
            let cleaned: String = body.chars().filter(|c| !c.is_ascii_whitespace()).collect();
            BASE64
                .decode(cleaned)
                .map_err(|e| FlowsmithError::Decode(format!("Invalid base64: {}", e)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guess_mime() {
        assert_eq!(guess_mime(Path::new("report.pdf")), "application/pdf");
        assert_eq!(guess_mime(Path::new("table.csv")), "text/csv");
        assert_eq!(guess_mime(Path::new("archive")), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_encode_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        std::fs::write(&path, "hello").unwrap();

        let file = encode_file(&path).await.unwrap();
        assert_eq!(file.name, "hello.txt");
        assert_eq!(file.mime_type, "text/plain");
        assert_eq!(file.size, 5);
        assert_eq!(file.data, "aGVsbG8=");
    }

    #[tokio::test]
    async fn test_encode_files_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut paths = Vec::new();
        for (i, body) in ["large body of text".repeat(500), "x".to_string(), "yy".to_string()]
            .iter()
            .enumerate()
        {
            let p = dir.path().join(format!("part-{}.txt", i));
            std::fs::write(&p, body).unwrap();
            paths.push(p);
        }
        let files = encode_files(&paths).await.unwrap();
        let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["part-0.txt", "part-1.txt", "part-2.txt"]);
        assert_eq!(files[1].size, 1);
    }

    #[tokio::test]
    async fn test_encode_missing_file_fails() {
        let err = encode_files(&[PathBuf::from("/nonexistent/flowsmith/upload.pdf")])
            .await
            .unwrap_err();
        assert!(matches!(err, FlowsmithError::Io(_)));
    }

    #[test]
    fn test_decode_payload() {
        assert_eq!(decode_payload(&FilePayload::Base64("aGVsbG8=".into())).unwrap(), b"hello");
        assert_eq!(
            decode_payload(&FilePayload::Base64("data:text/plain;base64,aGVsbG8=".into())).unwrap(),
            b"hello"
        );
        assert_eq!(decode_payload(&FilePayload::Bytes(vec![1, 2, 3])).unwrap(), vec![1, 2, 3]);
        assert!(matches!(
            decode_payload(&FilePayload::Base64("not base64!".into())),
            Err(FlowsmithError::Decode(_))
        ));
    }
}
