// Background upgrade of the yt-dlp engine through pip
//
// Fire-and-forget: nothing waits on it and every failure is swallowed.

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::UpdateConfig;

use super::utils::run_output_with_timeout;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Packaged build or updates disabled
    Skipped,
    Upgraded,
    Failed,
}

pub struct UpdateChecker {
    config: UpdateConfig,
}

impl UpdateChecker {
    pub fn new(config: UpdateConfig) -> Self {
        Self { config }
    }

    pub fn upgrade_args() -> Vec<String> {
        ["-m", "pip", "install", "--upgrade", "yt-dlp"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    pub async fn check_and_upgrade(&self) -> UpdateOutcome {
        if self.config.packaged || !self.config.enabled {
            debug!(packaged = self.config.packaged, "yt-dlp update skipped");
            return UpdateOutcome::Skipped;
        }

        info!("checking for yt-dlp updates");
        match run_output_with_timeout(
            &self.config.python,
            Self::upgrade_args(),
            self.config.timeout_secs,
        )
        .await
        {
            Ok(output) if output.status.success() => {
                info!("yt-dlp is up to date");
                UpdateOutcome::Upgraded
            }
            Ok(output) => {
                debug!(
                    code = ?output.status.code(),
                    stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                    "yt-dlp update failed"
                );
                UpdateOutcome::Failed
            }
            Err(e) => {
                debug!(error = %e, "yt-dlp update failed");
                UpdateOutcome::Failed
            }
        }
    }

    /// Run the check on its own task; the handle may be dropped
    pub fn spawn(self) -> JoinHandle<UpdateOutcome> {
        tokio::spawn(async move { self.check_and_upgrade().await })
    }
}
