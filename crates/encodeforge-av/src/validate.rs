//! Post-run verification of the produced artifact.

use std::path::Path;

use crate::probe::Prober;
use crate::supervisor::RunOutcome;

/// Decides whether a cleanly exited run actually produced a usable file.
///
/// Checks run in order and the first failure wins: the file must exist, then
/// the prober must read it and report at least one stream.
#[derive(Debug, Clone)]
pub struct OutcomeValidator<P> {
    prober: P,
}

impl<P: Prober> OutcomeValidator<P> {
    pub fn new(prober: P) -> Self {
        Self { prober }
    }

    pub fn prober(&self) -> &P {
        &self.prober
    }

    /// Classify the artifact at `artifact`.
    pub async fn validate(&self, artifact: &Path) -> RunOutcome {
        match tokio::fs::try_exists(artifact).await {
            Ok(true) => {}
            Ok(false) => {
                return RunOutcome::FailedNoOutput {
                    artifact: artifact.to_path_buf(),
                }
            }
            Err(e) => {
                tracing::warn!("cannot stat {}: {e}", artifact.display());
                return RunOutcome::FailedNoOutput {
                    artifact: artifact.to_path_buf(),
                };
            }
        }

        match self.prober.probe(artifact).await {
            Ok(media) if media.is_valid() => RunOutcome::Succeeded {
                artifact: artifact.to_path_buf(),
                media,
            },
            Ok(_) => RunOutcome::FailedInvalidOutput {
                artifact: artifact.to_path_buf(),
                reason: "encoded file is invalid".to_string(),
            },
            Err(e) => {
                tracing::debug!("{} could not read {}: {e}", self.prober.name(), artifact.display());
                RunOutcome::FailedInvalidOutput {
                    artifact: artifact.to_path_buf(),
                    reason: format!("encoded file is invalid: {e}"),
                }
            }
        }
    }
}
