use directories::ProjectDirs;
use pagemark_core::persistence::{KeyValueStore, StoreError, StoreKey, StoreResult};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum FileStoreError {
    #[error("unable to resolve local data directory")]
    NoDataDirectory,
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl From<FileStoreError> for StoreError {
    fn from(err: FileStoreError) -> Self {
        match err {
            FileStoreError::Io(err) => StoreError::Io(err),
            other => StoreError::Backend(other.to_string()),
        }
    }
}

/// Key-value store keeping one JSON file per page collection
///
/// Layout: `<root>/<document>/<page>-<kind>.json`. Writes go to a temporary
/// file that is renamed over the target, so a reader never sees a partial
/// collection.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn from_default_project() -> Result<Self, FileStoreError> {
        let dirs =
            ProjectDirs::from("dev", "Pagemark", "Pagemark").ok_or(FileStoreError::NoDataDirectory)?;

        Self::open(dirs.data_local_dir().join("annotations"))
    }

    /// Use `root`, creating it if needed
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, FileStoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &StoreKey) -> PathBuf {
        self.root
            .join(encode_component(key.document.as_str()))
            .join(format!("{}-{}.json", key.page, key.kind.as_str()))
    }
}

impl KeyValueStore for FileStore {
    fn read(&self, key: &StoreKey) -> StoreResult<Option<Vec<u8>>> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn write(&self, key: &StoreKey, bytes: &[u8]) -> StoreResult<()> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, bytes)?;
        fs::rename(&temp_path, &path)?;

        tracing::trace!(key = %key, bytes = bytes.len(), "collection written");
        Ok(())
    }

    fn delete(&self, key: &StoreKey) -> StoreResult<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// File-name safe, collision-free encoding of a document id
///
/// ASCII letters, digits, `-` and `_` are kept; every other byte becomes `%XX`.
fn encode_component(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{byte:02X}"));
        }
    }
    if encoded.is_empty() {
        encoded.push('%');
    }
    encoded
}
