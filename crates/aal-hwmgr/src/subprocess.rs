//! A global subprocess-invocation lock.
//!
//! `sbcctl` is not safe to invoke concurrently from multiple threads, so
//! every shell-out in this process goes through [`exec`], which serializes
//! callers behind one `Mutex` — matching the original's `subprocess_lock`.

use std::process::Command;
use std::sync::Mutex;

static SUBPROCESS_LOCK: Mutex<()> = Mutex::new(());

/// Runs `cmd` through `sh -c`, serialized against every other caller of
/// this function in the process. Returns `(stdout, stderr)`.
pub fn exec(cmd: &str) -> std::io::Result<(String, String)> {
    let _guard = SUBPROCESS_LOCK.lock().expect("subprocess lock poisoned");
    let output = Command::new("sh").arg("-c").arg(cmd).output()?;
    Ok((
        String::from_utf8_lossy(&output.stdout).into_owned(),
        String::from_utf8_lossy(&output.stderr).into_owned(),
    ))
}
