// Firmware installation
//
// Checks a user-selected disk system firmware image against the known MD5
// digests and copies it into the home folder.

use camino::{Utf8Path, Utf8PathBuf};
use md5::{Digest, Md5};
use std::fs::{self, File};
use std::io;
use thiserror::Error;

/// File name of the disk system firmware inside the home folder.
pub const FIRMWARE_FILE_NAME: &str = "FdsBios.bin";

/// MD5 digests of the accepted firmware dumps.
pub const KNOWN_FIRMWARE_MD5: [&str; 2] = [
    "ca30b50f880eb660a320674ed365ef7a",
    "c1a9e9415a6adde3c8563c622d4c9fce",
];

/// Errors that can occur while installing firmware
#[derive(Error, Debug)]
pub enum FirmwareError {
    #[error("{path} is not a known firmware image (md5 {digest})")]
    InvalidFirmware { path: Utf8PathBuf, digest: String },

    #[error("Firmware I/O error on {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Validates a user-selected firmware image and copies it into place.
#[derive(Debug, Clone)]
pub struct FirmwareInstaller {
    target: Utf8PathBuf,
}

impl FirmwareInstaller {
    /// Installer writing to `<home_dir>/FdsBios.bin`.
    pub fn new(home_dir: &Utf8Path) -> Self {
        Self {
            target: home_dir.join(FIRMWARE_FILE_NAME),
        }
    }

    pub fn target(&self) -> &Utf8Path {
        &self.target
    }

    /// Lowercase hex MD5 of the file at `path`.
    pub fn digest(path: &Utf8Path) -> Result<String, FirmwareError> {
        let io_err = |source| FirmwareError::Io {
            path: path.to_path_buf(),
            source,
        };

        let mut file = File::open(path).map_err(io_err)?;
        let mut hasher = Md5::new();
        io::copy(&mut file, &mut hasher).map_err(io_err)?;
        Ok(hex::encode(hasher.finalize()))
    }

    /// Check `source` against the known digests and copy it to the target path.
    ///
    /// Nothing is written when validation fails.
    pub fn install(&self, source: &Utf8Path) -> Result<&Utf8Path, FirmwareError> {
        let digest = Self::digest(source)?;
        if !KNOWN_FIRMWARE_MD5.contains(&digest.as_str()) {
            tracing::warn!("Rejected firmware {} (md5 {})", source, digest);
            return Err(FirmwareError::InvalidFirmware {
                path: source.to_path_buf(),
                digest,
            });
        }

        fs::copy(source, &self.target).map_err(|e| FirmwareError::Io {
            path: self.target.clone(),
            source: e,
        })?;

        tracing::info!("Installed firmware from {} to {}", source, self.target);
        Ok(&self.target)
    }
}
