// Synthetic transfer - fixed-interval ticks with random increments
//
// Stands in for a real transfer when no download tool is configured. Every
// tick adds a random step in (0, max_step]; at 100 the task sits in a short
// "finalizing" phase before it is reported complete.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use crate::media::errors::DownloadError;
use crate::media::models::TransferRequest;
use crate::media::orchestrator::ProgressReporter;
use crate::media::traits::TransferBackend;

pub const DEFAULT_MAX_STEP: f32 = 15.0;

pub struct SimulatedTransfer {
    tick: Duration,
    max_step: f32,
    settle: Duration,
}

impl SimulatedTransfer {
    pub fn new(tick: Duration, max_step: f32, settle: Duration) -> Self {
        let max_step = if max_step.is_finite() && max_step > 0.0 {
            max_step.min(100.0)
        } else {
            DEFAULT_MAX_STEP
        };
        Self {
            tick: tick.max(Duration::from_millis(1)),
            max_step,
            settle,
        }
    }

    /// Random increment in (0, max_step]
    fn next_step(&self) -> f32 {
        self.max_step - rand::thread_rng().gen_range(0.0..self.max_step)
    }
}

#[async_trait]
impl TransferBackend for SimulatedTransfer {
    fn name(&self) -> &'static str {
        "simulated"
    }

    async fn transfer(
        &self,
        request: TransferRequest,
        progress: ProgressReporter,
    ) -> Result<(), DownloadError> {
        let mut ticker = tokio::time::interval(self.tick);
        // First tick fires immediately
        ticker.tick().await;

        let mut percent = 0.0f32;
        loop {
            ticker.tick().await;
            percent = (percent + self.next_step()).min(100.0);

            if percent >= 100.0 {
                break;
            }
            if !progress.report(percent, format!("Downloading {}... {:.0}%", request.format, percent)) {
                return Ok(());
            }
        }

        progress.report(100.0, "Finalizing...");
        tokio::time::sleep(self.settle).await;
        Ok(())
    }
}
