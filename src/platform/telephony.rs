//! Telephony handoff.

use crate::{Error, Result};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::JoinHandle;

/// Builds a `tel:` URI, dropping characters the dialer would reject.
///
/// ```rust
/// use haven::platform::tel_uri;
///
/// assert_eq!(tel_uri("+91 89174-83689"), "tel:+918917483689");
/// ```
#[must_use]
pub fn tel_uri(number: &str) -> String {
    let cleaned: String = number
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '+' | '*' | '#'))
        .collect();
    format!("tel:{cleaned}")
}

/// Hands a URI to the native dialer.
///
/// Success means the handoff was issued; whether a call connects is never
/// observed.
pub trait Telephony: Send + Sync {
    /// Opens `uri` (a `tel:` link) with the platform handler.
    fn dial(&self, uri: &str) -> Result<()>;
}

/// Opens `tel:` links with the operating system's URI opener.
#[derive(Debug, Clone, Default)]
pub struct SystemTelephony {
    dry_run: bool,
}

impl SystemTelephony {
    /// Creates a handoff that launches the OS opener.
    #[must_use]
    pub const fn new() -> Self {
        Self { dry_run: false }
    }

    /// Creates a handoff that only logs the URI.
    #[must_use]
    pub const fn dry_run() -> Self {
        Self { dry_run: true }
    }

    fn opener(uri: &str) -> Command {
        #[cfg(target_os = "macos")]
        {
            let mut cmd = Command::new("open");
            cmd.arg(uri);
            cmd
        }
        #[cfg(target_os = "windows")]
        {
            let mut cmd = Command::new("cmd");
            cmd.args(["/C", "start", "", uri]);
            cmd
        }
        #[cfg(not(any(target_os = "macos", target_os = "windows")))]
        {
            let mut cmd = Command::new("xdg-open");
            cmd.arg(uri);
            cmd
        }
    }
}

impl Telephony for SystemTelephony {
    fn dial(&self, uri: &str) -> Result<()> {
        if self.dry_run {
            tracing::info!(uri = %uri, "Dry-run call handoff");
            return Ok(());
        }

        let child = Self::opener(uri)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::operation("telephony_handoff", e))?;
        reap(child);
        Ok(())
    }
}

/// Waits for `child` on a detached thread so it never lingers as a zombie.
///
/// The dial result does not depend on the opener's exit status; it is only
/// logged. The returned handle may be dropped.
fn reap(mut child: Child) -> JoinHandle<Option<ExitStatus>> {
    std::thread::spawn(move || {
        let pid = child.id();
        match child.wait() {
            Ok(status) => {
                tracing::debug!(pid, %status, "Dialer opener exited");
                Some(status)
            },
            Err(e) => {
                tracing::warn!(pid, error = %e, "Could not wait for dialer opener");
                None
            },
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tel_uri_strips_formatting() {
        assert_eq!(tel_uri("(555) 010-2030"), "tel:5550102030");
        assert_eq!(tel_uri("112"), "tel:112");
        assert_eq!(tel_uri("*#06#"), "tel:*#06#");
    }

    #[test]
    fn test_dry_run_dial_succeeds() {
        assert!(SystemTelephony::dry_run().dial("tel:112").is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_opener_is_reaped() {
        let child = Command::new("sh")
            .args(["-c", "exit 3"])
            .spawn()
            .expect("spawn sh");
        let status = reap(child)
            .join()
            .expect("reaper thread")
            .expect("exit status");
        assert_eq!(status.code(), Some(3));
    }
}
