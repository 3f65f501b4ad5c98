//! Open a rendered video in the platform's default player

use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::thread::JoinHandle;

/// Program and leading arguments that open a file on this platform
fn opener() -> (&'static str, &'static [&'static str]) {
    if cfg!(target_os = "macos") {
        ("open", &[])
    } else if cfg!(target_os = "windows") {
        ("cmd", &["/C", "start", ""])
    } else {
        ("xdg-open", &[])
    }
}

/// Launch the player without waiting for it
pub fn open_video(path: &Path) -> std::io::Result<()> {
    let (program, args) = opener();
    log::info!("Opening {} with {}", path.display(), program);
    spawn_detached(program, args, path).map(|_| ())
}

/// Spawn `program args.. path` and reap it on a background thread, so a
/// long chat session does not collect zombie openers
fn spawn_detached(program: &str, args: &[&str], path: &Path) -> std::io::Result<JoinHandle<Option<ExitStatus>>> {
    let mut child = Command::new(program)
        .args(args)
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    let program = program.to_string();
    Ok(std::thread::spawn(move || match child.wait() {
        Ok(status) => {
            log::debug!("{} exited with {}", program, status);
            Some(status)
        }
        Err(e) => {
            log::debug!("Failed to wait for {}: {}", program, e);
            None
        }
    }))
}
