use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutOptions {
    pub content_type: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

impl PutOptions {
    pub fn json() -> Self {
        Self {
            content_type: Some("application/json".to_string()),
            metadata: BTreeMap::new(),
        }
    }

    pub fn content_type_or_default(&self) -> &str {
        self.content_type.as_deref().unwrap_or(DEFAULT_CONTENT_TYPE)
    }
}

/// Narrow view of an object store, keyed by `/`-separated object keys.
pub trait BlobStore {
    fn write_object(&self, key: &str, body: &[u8], options: &PutOptions) -> Result<(), String>;

    /// Drains `reader` into the object at `key` and returns the bytes written.
    fn write_stream(
        &self,
        key: &str,
        reader: &mut dyn Read,
        options: &PutOptions,
    ) -> Result<u64, String>;

    fn read_object(&self, key: &str) -> Result<Option<Vec<u8>>, String>;

    fn exists(&self, key: &str) -> Result<bool, String>;

    fn delete_object(&self, key: &str) -> Result<(), String>;

    fn list_keys(&self, prefix: &str) -> Result<Vec<String>, String>;
}

/// Filesystem-backed store for local runs. Content type and metadata are not persisted.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, String> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|error| {
            format!(
                "failed to create local storage directory '{}': {error}",
                root.display()
            )
        })?;
        Ok(Self { root })
    }

    fn object_path(&self, key: &str) -> Result<PathBuf, String> {
        let relative = key.trim_start_matches('/');
        if relative.is_empty() || relative.split('/').any(|segment| segment == "..") {
            return Err(format!("invalid object key '{key}'"));
        }
        Ok(self.root.join(relative))
    }

    fn create_parent(path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|error| {
                format!("failed to create directory '{}': {error}", parent.display())
            })?;
        }
        Ok(())
    }
}

impl BlobStore for LocalBlobStore {
    fn write_object(&self, key: &str, body: &[u8], _options: &PutOptions) -> Result<(), String> {
        let path = self.object_path(key)?;
        Self::create_parent(&path)?;
        fs::write(&path, body)
            .map_err(|error| format!("failed to write '{}': {error}", path.display()))
    }

    fn write_stream(
        &self,
        key: &str,
        reader: &mut dyn Read,
        _options: &PutOptions,
    ) -> Result<u64, String> {
        let path = self.object_path(key)?;
        Self::create_parent(&path)?;
        let parent = path.parent().unwrap_or(self.root.as_path());

        // Staged beside the destination; deleted on drop unless persisted.
        let mut staged = NamedTempFile::new_in(parent)
            .map_err(|error| format!("failed to stage '{}': {error}", path.display()))?;
        let written = io::copy(reader, &mut staged)
            .map_err(|error| format!("failed to stream into '{}': {error}", path.display()))?;
        staged.persist(&path).map_err(|error| {
            format!("failed to move '{}' into place: {}", path.display(), error.error)
        })?;
        Ok(written)
    }

    fn read_object(&self, key: &str) -> Result<Option<Vec<u8>>, String> {
        let path = self.object_path(key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(format!("failed to read '{}': {error}", path.display())),
        }
    }

    fn exists(&self, key: &str) -> Result<bool, String> {
        Ok(self.object_path(key)?.is_file())
    }

    fn delete_object(&self, key: &str) -> Result<(), String> {
        let path = self.object_path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(format!("failed to delete '{}': {error}", path.display())),
        }
    }

    fn list_keys(&self, prefix: &str) -> Result<Vec<String>, String> {
        let mut keys = Vec::new();
        collect_files(&self.root, &self.root, &mut keys)?;
        keys.retain(|key| key.starts_with(prefix));
        keys.sort();
        Ok(keys)
    }
}

fn collect_files(root: &Path, dir: &Path, keys: &mut Vec<String>) -> Result<(), String> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(error) => return Err(format!("failed to list '{}': {error}", dir.display())),
    };

    for entry in entries {
        let path = entry
            .map_err(|error| format!("failed to list '{}': {error}", dir.display()))?
            .path();
        if path.is_dir() {
            collect_files(root, &path, keys)?;
        } else if let Ok(relative) = path.strip_prefix(root) {
            let key = relative
                .components()
                .map(|component| component.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            keys.push(key);
        }
    }

    Ok(())
}
