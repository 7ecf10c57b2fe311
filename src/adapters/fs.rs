//! Flash filesystem adapters.
//!
//! Implements [`FilesystemPort`] two ways:
//!
//! - [`FlashFs`]: `std::fs` rooted at a mount point.  On
//!   **`target_os = "espidf"`** [`FlashFs::mount`] registers the SPIFFS
//!   partition with the VFS first; on the host it points at any directory.
//! - [`MemFs`]: in-memory map for simulation and tests.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;

use log::info;

use crate::app::ports::{FilesystemPort, FsError};

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

/// VFS mount point of the data partition.
pub const MOUNT_POINT: &str = "/spiffs";

// ───────────────────────────────────────────────────────────────
// FlashFs
// ───────────────────────────────────────────────────────────────

pub struct FlashFs {
    root: PathBuf,
}

impl FlashFs {
    /// Register and mount the SPIFFS data partition, formatting it if the
    /// mount fails (first boot).
    #[cfg(target_os = "espidf")]
    pub fn mount() -> Result<Self, FsError> {
        let base = b"/spiffs\0";
        let conf = esp_vfs_spiffs_conf_t {
            base_path: base.as_ptr() as *const _,
            partition_label: core::ptr::null(),
            max_files: 5,
            format_if_mount_failed: true,
        };
        // SAFETY: called once from main() before any file access; `conf`
        // and the static path outlive the call.
        let ret = unsafe { esp_vfs_spiffs_register(&conf) };
        if ret != ESP_OK as i32 {
            log::error!("FlashFs: SPIFFS mount failed (rc={})", ret);
            return Err(FsError::NotMounted);
        }
        info!("FlashFs: SPIFFS mounted at {}", MOUNT_POINT);
        Ok(Self::at(MOUNT_POINT))
    }

    /// Host build: use a local directory as the flash root.
    #[cfg(not(target_os = "espidf"))]
    pub fn mount() -> Result<Self, FsError> {
        let root = std::env::temp_dir().join("microbox-flash");
        std::fs::create_dir_all(&root).map_err(|_| FsError::NotMounted)?;
        info!("FlashFs: simulation root {}", root.display());
        Ok(Self { root })
    }

    /// Use an already-mounted directory as the root.
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

fn map_io(e: &std::io::Error) -> FsError {
    match e.kind() {
        ErrorKind::NotFound => FsError::NotFound,
        ErrorKind::StorageFull => FsError::Full,
        _ => FsError::IoError,
    }
}

impl FilesystemPort for FlashFs {
    fn read(&self, path: &str) -> Result<Vec<u8>, FsError> {
        std::fs::read(self.resolve(path)).map_err(|e| map_io(&e))
    }

    fn write(&mut self, path: &str, data: &[u8]) -> Result<(), FsError> {
        let full = self.resolve(path);
        // SPIFFS is flat; directory creation only matters on the host.
        if let Some(parent) = full.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        std::fs::write(full, data).map_err(|e| map_io(&e))
    }

    fn exists(&self, path: &str) -> bool {
        self.resolve(path).exists()
    }

    fn remove(&mut self, path: &str) -> Result<(), FsError> {
        match std::fs::remove_file(self.resolve(path)) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(map_io(&e)),
            _ => Ok(()),
        }
    }

    fn rename(&mut self, from: &str, to: &str) -> Result<(), FsError> {
        self.clear_rename_target(to)?;
        std::fs::rename(self.resolve(from), self.resolve(to)).map_err(|e| map_io(&e))
    }
}

impl FlashFs {
    /// SPIFFS rejects a rename onto an existing name
    /// (`SPIFFS_ERR_CONFLICTING_NAME`), so the target goes first.
    #[cfg(target_os = "espidf")]
    fn clear_rename_target(&mut self, to: &str) -> Result<(), FsError> {
        self.remove(to)
    }

    /// POSIX rename already replaces the target.
    #[cfg(not(target_os = "espidf"))]
    fn clear_rename_target(&mut self, _to: &str) -> Result<(), FsError> {
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// MemFs
// ───────────────────────────────────────────────────────────────

/// Volatile filesystem backed by a `HashMap`.
#[derive(Debug, Default, Clone)]
pub struct MemFs {
    files: HashMap<String, Vec<u8>>,
    /// When set, `rename` fails so the delete-then-create path is used.
    pub fail_rename: bool,
}

impl MemFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FilesystemPort for MemFs {
    fn read(&self, path: &str) -> Result<Vec<u8>, FsError> {
        self.files.get(path).cloned().ok_or(FsError::NotFound)
    }

    fn write(&mut self, path: &str, data: &[u8]) -> Result<(), FsError> {
        self.files.insert(path.into(), data.to_vec());
        Ok(())
    }

    fn exists(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    fn remove(&mut self, path: &str) -> Result<(), FsError> {
        self.files.remove(path);
        Ok(())
    }

    fn rename(&mut self, from: &str, to: &str) -> Result<(), FsError> {
        if self.fail_rename {
            return Err(FsError::IoError);
        }
        let data = self.files.remove(from).ok_or(FsError::NotFound)?;
        self.files.insert(to.into(), data);
        Ok(())
    }
}
