//! Link liveness via two touch-files: `connected` holds iff the connect
//! file's mtime is newer than the disconnect file's mtime (or the
//! disconnect file doesn't exist yet at all).

use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommState {
    Init,
    StartingUp,
    Connected,
    Disconnected,
}

#[derive(Clone)]
pub struct LinkFlags {
    connect_file: PathBuf,
    disconnect_file: PathBuf,
}

impl LinkFlags {
    pub fn new(connect_file: PathBuf, disconnect_file: PathBuf) -> Self {
        Self {
            connect_file,
            disconnect_file,
        }
    }

    /// Touches the connect-time flag file, recording "now" as the last
    /// connect time.
    pub fn touch_connect(&self) -> std::io::Result<()> {
        touch(&self.connect_file)
    }

    /// Touches the disconnect-time flag file, recording "now" as the last
    /// disconnect time.
    pub fn touch_disconnect(&self) -> std::io::Result<()> {
        touch(&self.disconnect_file)
    }

    /// True iff the connect file exists and (the disconnect file is
    /// absent, or the connect file is newer).
    pub fn connected(&self) -> bool {
        let Some(connect_mtime) = mtime(&self.connect_file) else {
            return false;
        };
        match mtime(&self.disconnect_file) {
            Some(disconnect_mtime) => connect_mtime > disconnect_mtime,
            None => true,
        }
    }
}

fn touch(path: &Path) -> std::io::Result<()> {
    File::create(path)?;
    Ok(())
}

fn mtime(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).ok()?.modified().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn not_connected_when_neither_file_exists() {
        let dir = tempfile::tempdir().unwrap();
        let flags = LinkFlags::new(dir.path().join("connect_time"), dir.path().join("disconnect_time"));
        assert!(!flags.connected());
    }

    #[test]
    fn connected_once_connect_file_touched_with_no_disconnect_yet() {
        let dir = tempfile::tempdir().unwrap();
        let flags = LinkFlags::new(dir.path().join("connect_time"), dir.path().join("disconnect_time"));
        flags.touch_connect().unwrap();
        assert!(flags.connected());
    }

    #[test]
    fn disconnected_after_disconnect_touched_more_recently() {
        let dir = tempfile::tempdir().unwrap();
        let flags = LinkFlags::new(dir.path().join("connect_time"), dir.path().join("disconnect_time"));
        flags.touch_connect().unwrap();
        sleep(Duration::from_millis(20));
        flags.touch_disconnect().unwrap();
        assert!(!flags.connected());
    }

    #[test]
    fn reconnecting_after_disconnect_flips_back_to_connected() {
        let dir = tempfile::tempdir().unwrap();
        let flags = LinkFlags::new(dir.path().join("connect_time"), dir.path().join("disconnect_time"));
        flags.touch_connect().unwrap();
        sleep(Duration::from_millis(20));
        flags.touch_disconnect().unwrap();
        sleep(Duration::from_millis(20));
        flags.touch_connect().unwrap();
        assert!(flags.connected());
    }
}
