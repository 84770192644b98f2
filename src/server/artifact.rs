//! Resolution of artifact names to files under the models directory.

use std::io;
use std::path::{Component, Path, PathBuf};

use tokio::fs::File;

use crate::error::ArtifactError;
use crate::models::ServerConfig;

/// Directory of downloadable model artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
    extension: Option<String>,
}

/// An artifact that resolved to a regular file inside the store root.
#[derive(Debug, Clone)]
pub struct ArtifactDescriptor {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
}

/// A resolved artifact together with its open file handle.
pub struct OpenArtifact {
    pub file: File,
    pub descriptor: ArtifactDescriptor,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>, extension: Option<String>) -> Self {
        let extension = extension
            .map(|ext| ext.trim_start_matches('.').to_string())
            .filter(|ext| !ext.is_empty());
        Self {
            root: root.into(),
            extension,
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(config.models_dir.clone(), config.extension.clone())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File name an artifact name maps to, or `None` if the name is not a
    /// single plain path component.
    pub fn file_name(&self, name: &str) -> Option<String> {
        if !is_plain_name(name) {
            return None;
        }
        match self.extension {
            Some(ref ext) if !name.ends_with(&format!(".{}", ext)) => {
                Some(format!("{}.{}", name, ext))
            }
            _ => Some(name.to_string()),
        }
    }

    /// Open `name` for reading. The size is taken from the open handle so
    /// it reflects the file as it is now.
    pub async fn open(&self, name: &str) -> Result<OpenArtifact, ArtifactError> {
        let file_name = self.file_name(name).ok_or(ArtifactError::NotFound)?;

        let root = tokio::fs::canonicalize(&self.root)
            .await
            .map_err(not_found_or_io)?;
        let path = tokio::fs::canonicalize(root.join(&file_name))
            .await
            .map_err(not_found_or_io)?;

        // symlinks may point outside the root even when the name is plain
        if !path.starts_with(&root) {
            tracing::warn!(name = %name, path = %path.display(), "artifact escapes models directory");
            return Err(ArtifactError::NotFound);
        }

        let file = File::open(&path).await.map_err(not_found_or_io)?;
        let metadata = file.metadata().await?;
        if !metadata.is_file() {
            return Err(ArtifactError::NotFound);
        }

        Ok(OpenArtifact {
            file,
            descriptor: ArtifactDescriptor {
                name: file_name,
                path,
                size: metadata.len(),
            },
        })
    }
}

fn is_plain_name(name: &str) -> bool {
    if name.is_empty() || name.starts_with('.') || name.contains(['/', '\\', '\0']) {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

fn not_found_or_io(err: io::Error) -> ArtifactError {
    match err.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => ArtifactError::NotFound,
        _ => ArtifactError::Io(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dir: &Path) -> ArtifactStore {
        ArtifactStore::new(dir, Some("onnx".to_string()))
    }

    #[test]
    fn test_plain_names() {
        assert!(is_plain_name("bge-small"));
        assert!(is_plain_name("model_v2.onnx"));
        assert!(!is_plain_name(""));
        assert!(!is_plain_name(".."));
        assert!(!is_plain_name(".hidden"));
        assert!(!is_plain_name("../secret"));
        assert!(!is_plain_name("a/b"));
        assert!(!is_plain_name("a\\b"));
        assert!(!is_plain_name("/etc/passwd"));
        assert!(!is_plain_name("bad\0name"));
    }

    #[test]
    fn test_extension_appended_once() {
        let store = ArtifactStore::new("models", Some(".onnx".to_string()));
        assert_eq!(store.file_name("bge").as_deref(), Some("bge.onnx"));
        assert_eq!(store.file_name("bge.onnx").as_deref(), Some("bge.onnx"));
        assert_eq!(store.file_name("../bge"), None);
    }

    #[test]
    fn test_empty_extension_means_none() {
        let store = ArtifactStore::new("models", Some(String::new()));
        assert_eq!(store.file_name("tokenizer.json").as_deref(), Some("tokenizer.json"));

        let store = ArtifactStore::new("models", None);
        assert_eq!(store.file_name("bge").as_deref(), Some("bge"));
    }

    #[tokio::test]
    async fn test_open_reports_current_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bge.onnx");
        std::fs::write(&path, b"0123456789").unwrap();

        let artifact = store(dir.path()).open("bge").await.unwrap();
        assert_eq!(artifact.descriptor.size, 10);
        assert_eq!(artifact.descriptor.name, "bge.onnx");

        std::fs::write(&path, b"0123456789abcdef").unwrap();
        let artifact = store(dir.path()).open("bge").await.unwrap();
        assert_eq!(artifact.descriptor.size, 16);
    }

    #[tokio::test]
    async fn test_open_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let result = store(dir.path()).open("absent").await;
        assert!(matches!(result, Err(ArtifactError::NotFound)));
    }

    #[tokio::test]
    async fn test_open_directory_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested.onnx")).unwrap();
        let result = store(dir.path()).open("nested").await;
        assert!(matches!(result, Err(ArtifactError::NotFound)));
    }

    #[tokio::test]
    async fn test_missing_root_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let result = store(&dir.path().join("nope")).open("bge").await;
        assert!(matches!(result, Err(ArtifactError::NotFound)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_outside_root_is_not_found() {
        let outside = tempfile::tempdir().unwrap();
        let secret = outside.path().join("secret.onnx");
        std::fs::write(&secret, b"secret").unwrap();

        let dir = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(&secret, dir.path().join("leak.onnx")).unwrap();

        let result = store(dir.path()).open("leak").await;
        assert!(matches!(result, Err(ArtifactError::NotFound)));
    }
}
