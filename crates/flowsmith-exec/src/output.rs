use std::path::{Component, Path, PathBuf};

use flowsmith_core::error::{FlowsmithError, Result};
use flowsmith_core::types::ExecutionResult;
use tracing::info;

use crate::files::decode_payload;

/// File name used when the service does not declare one.
pub const DEFAULT_FILE_NAME: &str = "output";

/// A produced file, normalised to bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl Download {
    /// Write into `dir` under the declared file name.
    ///
    /// The name must be a single plain path component; anything that would
    /// resolve outside `dir` is rejected.
    pub async fn save_to(&self, dir: &Path) -> Result<PathBuf> {
        let mut components = Path::new(&self.file_name).components();
        let plain = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );
        if !plain || self.file_name.contains(|c: char| c == '/' || c == '\\') {
            return Err(FlowsmithError::Decode(format!(
                "Refusing output file name '{}'",
                self.file_name
            )));
        }
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(&self.file_name);
        tokio::fs::write(&path, &self.bytes).await?;
        info!(path = %path.display(), bytes = self.bytes.len(), "Saved execution output");
        Ok(path)
    }
}

/// Download support for [`ExecutionResult`].
pub trait ResultDownload {
    /// The produced file, if the result carries one.
    fn download(&self) -> Result<Option<Download>>;
}

impl ResultDownload for ExecutionResult {
    fn download(&self) -> Result<Option<Download>> {
        let Some(payload) = &self.file else {
            return Ok(None);
        };
        Ok(Some(Download {
            file_name: self
                .file_name
                .clone()
                .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string()),
            bytes: decode_payload(payload)?,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowsmith_core::types::FilePayload;

    #[test]
    fn test_no_file_no_download() {
        assert!(ExecutionResult::markdown("# Only text").download().unwrap().is_none());
    }

    #[test]
    fn test_base64_and_bytes_normalise_the_same() {
        let from_b64 = ExecutionResult {
            file: Some(FilePayload::Base64("UTEgcmVwb3J0".into())),
            file_name: Some("Q1 report.docx".into()),
            ..Default::default()
        };
        let from_bytes = ExecutionResult {
            file: Some(FilePayload::Bytes(b"Q1 report".to_vec())),
            file_name: Some("Q1 report.docx".into()),
            ..Default::default()
        };
        assert_eq!(from_b64.download().unwrap(), from_bytes.download().unwrap());
    }

    #[test]
    fn test_missing_name_uses_default() {
        let result = ExecutionResult {
            file: Some(FilePayload::Bytes(vec![0])),
            ..Default::default()
        };
        assert_eq!(result.download().unwrap().unwrap().file_name, DEFAULT_FILE_NAME);
    }

    #[tokio::test]
    async fn test_save_uses_declared_name_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let download = Download {
            file_name: "Résumé (final) v2.xlsx".into(),
            bytes: vec![1, 2, 3],
        };
        let path = download.save_to(dir.path()).await.unwrap();
        assert_eq!(path.file_name().unwrap().to_str().unwrap(), "Résumé (final) v2.xlsx");
        assert_eq!(std::fs::read(path).unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_save_rejects_names_leaving_the_directory() {
        let root = tempfile::tempdir().unwrap();
        let out = root.path().join("out");
        for name in ["../escaped.txt", "/tmp/abs.txt", "nested/file.txt", "..", ""] {
            let download = Download {
                file_name: name.into(),
                bytes: vec![1],
            };
            assert!(
                matches!(download.save_to(&out).await, Err(FlowsmithError::Decode(_))),
                "accepted {name:?}"
            );
        }
        assert!(!root.path().join("escaped.txt").exists());
        assert!(!out.exists());
    }
}
