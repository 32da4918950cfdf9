//! File-backed store image

use crate::core::config::StoreConfig;
use crate::persistence::{check_bounds, ByteStore, StoreError, STORE_SIZE};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Store image kept in one file; the file is rewritten on every commit
pub struct FileStore {
    path: PathBuf,
    image: Vec<u8>,
}

impl FileStore {
    /// Open the image at `path`, starting blank if the file does not exist
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let image = match fs::read(&path) {
            Ok(image) if image.len() == STORE_SIZE => image,
            Ok(image) => {
                return Err(StoreError::WrongSize {
                    expected: STORE_SIZE,
                    actual: image.len(),
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => vec![0; STORE_SIZE],
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), "Store opened");
        Ok(Self { path, image })
    }

    /// Open the store under the user's local data directory
    pub fn with_default_path() -> Result<Self> {
        let path = StoreConfig::default().resolve_path();
        Self::open(&path).with_context(|| format!("Failed to open store {}", path.display()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ByteStore for FileStore {
    fn read(&self, addr: usize, buf: &mut [u8]) -> Result<(), StoreError> {
        check_bounds(addr, buf.len())?;
        buf.copy_from_slice(&self.image[addr..addr + buf.len()]);
        Ok(())
    }

    fn write(&mut self, addr: usize, bytes: &[u8]) -> Result<(), StoreError> {
        check_bounds(addr, bytes.len())?;
        self.image[addr..addr + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&self.path, &self.image)?;
        Ok(())
    }
}
