//! Default filesystem locations
//!
//! The harness config file lives in the platform config directory:
//! - Linux: `~/.config/ftp-harness/config.toml`
//! - macOS: `~/Library/Application Support/ftp-harness/config.toml`

use std::io;
use std::path::{Path, PathBuf};

const APP_NAME: &str = "ftp-harness";

/// Get the configuration directory path
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the configuration file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Make `path` absolute against the current working directory
///
/// Does not touch the filesystem, so the target need not exist yet.
pub fn absolutize(path: &Path) -> io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// Name the kernel reports for a process started from `binary`
///
/// Linux truncates the command name to 15 bytes, which is what `ps` and
/// `pgrep` match against.
pub fn process_name(binary: &Path) -> Option<String> {
    let name = binary.file_name()?.to_string_lossy();
    let mut end = name.len().min(15);
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    Some(name[..end].to_string())
}
