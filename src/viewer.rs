//! Hand a downloaded file to the system's default viewer.

use std::io;
use std::path::Path;
use std::process::{Child, Command};
use tracing::{info, warn};

/// Launch the default application for `path` without waiting for it.
///
/// Failure to open is logged and otherwise ignored.
pub fn open_detached(path: &Path) {
    match spawn_viewer(path) {
        Ok(_) => info!(path = %path.display(), "Opened PDF in system viewer"),
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to open PDF, open it manually"),
    }
}

#[cfg(target_os = "windows")]
fn spawn_viewer(path: &Path) -> io::Result<Child> {
    Command::new("cmd")
        .args(["/C", "start", ""])
        .arg(path)
        .spawn()
}

#[cfg(target_os = "macos")]
fn spawn_viewer(path: &Path) -> io::Result<Child> {
    Command::new("open").arg(path).spawn()
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
fn spawn_viewer(path: &Path) -> io::Result<Child> {
    Command::new("xdg-open").arg(path).spawn()
}
