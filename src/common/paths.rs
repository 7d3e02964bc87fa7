//! Cross-platform socket, store and configuration paths
//!
//! Unix/macOS: Uses Unix domain sockets at $XDG_RUNTIME_DIR or /tmp
//! Windows: Uses named pipes at \\.\pipe\shstore-<name>

use std::io;
use std::path::{Path, PathBuf};

/// Application name used for directories and the default socket
const APP_NAME: &str = "shstore";

/// Get the default socket/pipe path for IPC communication
///
/// Platform-specific:
/// - Unix: `$XDG_RUNTIME_DIR/shstore/daemon.sock` or `/tmp/shstore-<uid>/daemon.sock`
/// - Windows: a pipe name derived from the user name
#[cfg(unix)]
pub fn default_socket_path() -> PathBuf {
    // Try XDG_RUNTIME_DIR first (preferred on Linux)
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        return PathBuf::from(runtime_dir).join(APP_NAME).join("daemon.sock");
    }

    // Fallback to /tmp with uid for security
    // SAFETY: getuid has no preconditions and cannot fail
    let uid = unsafe { libc::getuid() };
    PathBuf::from(format!("/tmp/{}-{}", APP_NAME, uid)).join("daemon.sock")
}

#[cfg(windows)]
pub fn default_socket_path() -> PathBuf {
    let username = std::env::var("USERNAME").unwrap_or_else(|_| "default".to_string());
    data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(format!("{}-{}.sock", APP_NAME, username))
}

/// Get the socket name for interprocess LocalSocketName
///
/// On Unix this is the filesystem path itself.
#[cfg(unix)]
pub fn socket_name(sock_path: &Path) -> String {
    sock_path.to_string_lossy().into_owned()
}

/// On Windows the pipe lives in the pipe namespace, keyed by the file name
#[cfg(windows)]
pub fn socket_name(sock_path: &Path) -> String {
    let stem = sock_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| APP_NAME.to_string());
    format!("{}-{}", APP_NAME, stem)
}

/// Path of the lock file that guards exclusive ownership of a socket address
pub fn lock_path_for(sock_path: &Path) -> PathBuf {
    let mut name = sock_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    sock_path.with_file_name(name)
}

/// Ensure the parent directory of `path` exists
///
/// On Unix, a newly created directory gets mode 0700
pub fn ensure_parent_dir(path: &Path) -> io::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => return Ok(()),
    };

    if !dir.exists() {
        std::fs::create_dir_all(dir)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700))?;
        }
    }

    Ok(())
}

/// Remove the socket file if it exists (for cleanup)
#[cfg(unix)]
pub fn remove_socket(sock_path: &Path) -> io::Result<()> {
    match std::fs::remove_file(sock_path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

#[cfg(windows)]
pub fn remove_socket(_sock_path: &Path) -> io::Result<()> {
    // Named pipes are automatically cleaned up on Windows
    Ok(())
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", APP_NAME)
}

/// Get the configuration directory path
///
/// - Linux: `~/.config/shstore/`
/// - macOS: `~/Library/Application Support/shstore/`
/// - Windows: `%APPDATA%\shstore\`
pub fn config_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the configuration file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the data directory, where the store lives by default
pub fn data_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.data_dir().to_path_buf())
}

/// Get the default store database path
pub fn default_db_path() -> Option<PathBuf> {
    data_dir().map(|dir| dir.join("store.db"))
}

/// Get the path to the log directory
pub fn log_dir() -> Option<PathBuf> {
    data_dir().map(|dir| dir.join("logs"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_path_is_valid() {
        let path = default_socket_path();
        assert!(!path.as_os_str().is_empty());
    }

    #[test]
    fn test_lock_path_sits_next_to_socket() {
        let lock = lock_path_for(Path::new("/run/user/1000/shstore/daemon.sock"));
        assert_eq!(lock, PathBuf::from("/run/user/1000/shstore/daemon.sock.lock"));
    }

    #[test]
    fn test_ensure_parent_dir_creates_missing_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let sock = tmp.path().join("a").join("b").join("daemon.sock");
        ensure_parent_dir(&sock).unwrap();
        assert!(sock.parent().unwrap().is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn test_remove_missing_socket_is_ok() {
        let tmp = tempfile::tempdir().unwrap();
        remove_socket(&tmp.path().join("nothing.sock")).unwrap();
    }
}
