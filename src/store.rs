// Small helpers for the JSON files kept under the config directory.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StoreError;

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Read the raw contents of `path`, reporting a missing file as
/// `StoreError::NotFound` rather than an I/O failure.
pub fn read_to_string(path: &Path) -> Result<String, StoreError> {
    match fs::read_to_string(path) {
        Ok(data) => Ok(data),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            Err(StoreError::NotFound(path.to_path_buf()))
        }
        Err(err) => Err(io_error(path)(err)),
    }
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let data = read_to_string(path)?;
    serde_json::from_str(&data).map_err(|source| StoreError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

/// Create `dir` and its parents, owner-only on Unix.
pub fn ensure_dir(dir: &Path) -> Result<(), StoreError> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(dir).map_err(io_error(dir))
}

/// Serialize `value` and replace `path` with it. The data goes to a
/// sibling temp file first and is renamed over the target, so a crash
/// leaves either the old file or an undecodable partial temp file behind.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(value).map_err(|source| StoreError::Encode {
        path: path.to_path_buf(),
        source,
    })?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_dir(parent)?;
    }

    let tmp = temp_path(path);
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(&tmp).map_err(io_error(&tmp))?;
    file.write_all(json.as_bytes()).map_err(io_error(&tmp))?;
    file.sync_all().map_err(io_error(&tmp))?;
    drop(file);

    fs::rename(&tmp, path).map_err(io_error(path))
}

/// Create an empty file at `path` if nothing is there yet.
pub fn touch(path: &Path) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_dir(parent)?;
    }
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map(|_| ())
        .map_err(io_error(path))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
