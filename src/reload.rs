//! Triggering the reverse proxy to pick up a rewritten config
//!
//! The reload command is an external collaborator with no completion
//! contract: by the time it runs, the registration already succeeded as a
//! file mutation. It runs detached from the response path, bounded by a
//! timeout so a wedged proxy cannot pile up zombie reload tasks.

use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Fire-and-forget reload invocation
#[derive(Debug, Clone)]
pub struct ReloadTrigger {
    command: Option<String>,
    timeout: Duration,
}

impl ReloadTrigger {
    pub fn new(command: Option<String>, timeout: Duration) -> Self {
        Self {
            command: command.filter(|c| !c.trim().is_empty()),
            timeout,
        }
    }

    /// Trigger with no command configured; reloads become no-ops
    pub fn disabled() -> Self {
        Self::new(None, Duration::from_secs(30))
    }

    pub fn is_enabled(&self) -> bool {
        self.command.is_some()
    }

    /// Spawn the reload command on a detached task. Returns immediately;
    /// outcome is observable only through logs.
    pub fn fire(&self) {
        let Some(command) = self.command.clone() else {
            debug!("No reload command configured, skipping reload");
            return;
        };
        let timeout = self.timeout;

        tokio::spawn(async move {
            let argv = match shell_words::split(&command) {
                Ok(argv) if !argv.is_empty() => argv,
                Ok(_) => {
                    warn!(command, "Reload command is empty after parsing");
                    return;
                }
                Err(e) => {
                    warn!(command, error = %e, "Failed to parse reload command");
                    return;
                }
            };

            let mut cmd = Command::new(&argv[0]);
            cmd.args(&argv[1..]);

            match tokio::time::timeout(timeout, cmd.output()).await {
                Ok(Ok(output)) if output.status.success() => {
                    info!(command, "Proxy reload triggered");
                }
                Ok(Ok(output)) => {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    warn!(
                        command,
                        status = %output.status,
                        stderr = %stderr.trim(),
                        "Reload command exited with failure"
                    );
                }
                Ok(Err(e)) => {
                    warn!(command, error = %e, "Failed to run reload command");
                }
                Err(_) => {
                    warn!(
                        command,
                        timeout_secs = timeout.as_secs(),
                        "Reload command timed out"
                    );
                }
            }
        });
    }
}
