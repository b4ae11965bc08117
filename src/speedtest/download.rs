use super::sampler::{
    conclude, speed_mbps, trial_percent, BestOf, ProgressTracker, ThroughputProgress,
};
use super::transport::Transport;
use super::Throughput;
use crate::error::Result;
use crate::settings::{FallbackPolicy, FallbackRange, Settings};
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{timeout, Instant};
use tracing::{debug, warn};

/// Streams one download per trial size and keeps the best per-chunk speed
/// over the trials that complete.
pub struct DownloadTest {
    sizes: Vec<u64>,
    pause: Duration,
    trial_timeout: Duration,
    fallback: FallbackPolicy,
    fallback_range: FallbackRange,
}

impl DownloadTest {
    pub fn new(settings: &Settings) -> Self {
        Self {
            sizes: settings.download_sizes.clone(),
            pause: settings.pause_between_trials(),
            trial_timeout: settings.transfer_timeout(),
            fallback: settings.fallback,
            fallback_range: settings.download_fallback,
        }
    }

    pub async fn run<T: Transport>(
        &self,
        transport: &T,
        progress_tx: mpsc::Sender<ThroughputProgress>,
    ) -> Throughput {
        let trials = self.sizes.len();
        let mut best = BestOf::new();
        let mut progress = ProgressTracker::new();

        for (index, &size) in self.sizes.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.pause).await;
            }

            let trial = self.run_trial(transport, index, size, &best, &mut progress, &progress_tx);
            let outcome = timeout(self.trial_timeout, trial)
                .await
                .unwrap_or_else(|elapsed| Err(elapsed.into()));
            match outcome {
                Ok(trial_best) => {
                    debug!(
                        trial = index + 1,
                        size,
                        best_mbps = ?trial_best.best(),
                        "download trial complete"
                    );
                    best.merge(&trial_best);
                }
                Err(err) => {
                    warn!(trial = index + 1, size, error = %err, "download trial failed");
                }
            }
        }

        let result = conclude(best.best(), self.fallback, self.fallback_range);
        if !result.is_measured() {
            warn!(?result, "no download trial succeeded");
        }

        let _ = progress_tx
            .send(ThroughputProgress {
                trial: trials,
                trials,
                bytes: 0,
                speed_mbps: result.mbps(),
                best_mbps: result.mbps(),
                percent: progress.complete(),
            })
            .await;

        result
    }

    /// Samples are kept local to the trial so a broken stream adds nothing
    /// to the phase result.
    async fn run_trial<T: Transport>(
        &self,
        transport: &T,
        index: usize,
        size: u64,
        committed: &BestOf,
        progress: &mut ProgressTracker,
        progress_tx: &mpsc::Sender<ThroughputProgress>,
    ) -> Result<BestOf> {
        let trials = self.sizes.len();
        let start = Instant::now();
        let mut stream = transport.download(size).await?;
        let mut received: u64 = 0;
        let mut trial_best = BestOf::new();

        while let Some(chunk) = stream.next().await {
            received += chunk? as u64;
            let fraction = received as f64 / size as f64;
            let percent = progress.advance(trial_percent(index, trials, fraction));

            if let Some(speed) = speed_mbps(received, start.elapsed()) {
                trial_best.observe(speed);
                let _ = progress_tx
                    .send(ThroughputProgress {
                        trial: index + 1,
                        trials,
                        bytes: received,
                        speed_mbps: speed,
                        best_mbps: committed.best().unwrap_or(0.0),
                        percent,
                    })
                    .await;
            }
        }

        Ok(trial_best)
    }
}
