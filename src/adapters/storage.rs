//! Key-value storage adapters.
//!
//! Implements both [`ConfigPort`] and [`StoragePort`].
//!
//! - [`MemoryStorage`] - `HashMap` backend for simulation and tests.
//! - [`FileStorage`] - one file per key under `<root>/<namespace>/<key>`.
//!   Writes go to `<key>.tmp`, are fsynced, then renamed over the old file,
//!   so a crash leaves either the old or the new value.
//!
//! Namespaces and keys are limited to 15 ASCII alphanumerics, `_` or `-`
//! (the NVS key limit), keeping both backends interchangeable.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::app::ports::{ConfigError, ConfigPort, StorageError, StoragePort};
use crate::config::FeederConfig;

const CONFIG_NAMESPACE: &str = "petfeeder";
const CONFIG_KEY: &str = "feedercfg";
const MAX_KEY_LEN: usize = 15;

fn check_key(namespace: &str, key: &str) -> Result<(), StorageError> {
    let valid = |s: &str| {
        !s.is_empty()
            && s.len() <= MAX_KEY_LEN
            && s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
    };
    if valid(namespace) && valid(key) {
        Ok(())
    } else {
        Err(StorageError::InvalidKey)
    }
}

fn load_config(storage: &dyn StoragePort) -> Result<FeederConfig, ConfigError> {
    let bytes = storage.read(CONFIG_NAMESPACE, CONFIG_KEY)?;
    let config: FeederConfig = postcard::from_bytes(&bytes).map_err(|_| ConfigError::Corrupted)?;
    config.validate()?;
    info!("Storage: loaded config ({} bytes)", bytes.len());
    Ok(config)
}

fn save_config(storage: &mut dyn StoragePort, config: &FeederConfig) -> Result<(), ConfigError> {
    config.validate()?;
    let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
    storage.write(CONFIG_NAMESPACE, CONFIG_KEY, &bytes)?;
    info!("Storage: config saved");
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// In-memory backend
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    store: HashMap<String, Vec<u8>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn composite_key(namespace: &str, key: &str) -> String {
        format!("{}::{}", namespace, key)
    }
}

impl StoragePort for MemoryStorage {
    fn read(&self, namespace: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        check_key(namespace, key)?;
        self.store
            .get(&Self::composite_key(namespace, key))
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        check_key(namespace, key)?;
        self.store
            .insert(Self::composite_key(namespace, key), data.to_vec());
        Ok(())
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        check_key(namespace, key)?;
        self.store.remove(&Self::composite_key(namespace, key));
        Ok(())
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        check_key(namespace, key).is_ok()
            && self.store.contains_key(&Self::composite_key(namespace, key))
    }
}

impl ConfigPort for MemoryStorage {
    fn load(&self) -> Result<FeederConfig, ConfigError> {
        load_config(self)
    }

    fn save(&mut self, config: &FeederConfig) -> Result<(), ConfigError> {
        save_config(self, config)
    }
}

// ───────────────────────────────────────────────────────────────
// File backend
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Open (creating if needed) a storage directory.
    pub fn open(root: impl AsRef<Path>) -> io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        info!("FileStorage: using {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, namespace: &str, key: &str) -> Result<PathBuf, StorageError> {
        check_key(namespace, key)?;
        Ok(self.root.join(namespace).join(key))
    }
}

fn map_io(e: io::Error) -> StorageError {
    match e.kind() {
        io::ErrorKind::NotFound => StorageError::NotFound,
        io::ErrorKind::StorageFull => StorageError::Full,
        _ => {
            warn!("FileStorage: {}", e);
            StorageError::IoError
        }
    }
}

impl StoragePort for FileStorage {
    fn read(&self, namespace: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        fs::read(self.path(namespace, key)?).map_err(map_io)
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        let path = self.path(namespace, key)?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(map_io)?;
        }
        let tmp_path = path.with_extension("tmp");
        {
            let mut file = File::create(&tmp_path).map_err(map_io)?;
            file.write_all(data).map_err(map_io)?;
            file.sync_all().map_err(map_io)?;
        }
        fs::rename(&tmp_path, &path).map_err(map_io)
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path(namespace, key)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(map_io(e)),
        }
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.path(namespace, key).is_ok_and(|p| p.is_file())
    }
}

impl ConfigPort for FileStorage {
    fn load(&self) -> Result<FeederConfig, ConfigError> {
        load_config(self)
    }

    fn save(&mut self, config: &FeederConfig) -> Result<(), ConfigError> {
        save_config(self, config)
    }
}
