use super::sampler::{
    conclude, speed_mbps, trial_percent, BestOf, ProgressTracker, ThroughputProgress,
};
use super::transport::Transport;
use super::Throughput;
use crate::settings::{FallbackPolicy, FallbackRange, Settings};
use rand::Rng;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{timeout, Instant};
use tracing::{debug, warn};

/// Posts one random payload per trial size; each successful post is a
/// single speed sample.
pub struct UploadTest {
    sizes: Vec<usize>,
    pause: Duration,
    trial_timeout: Duration,
    fallback: FallbackPolicy,
    fallback_range: FallbackRange,
}

impl UploadTest {
    pub fn new(settings: &Settings) -> Self {
        Self {
            sizes: settings.upload_sizes.clone(),
            pause: settings.pause_between_trials(),
            trial_timeout: settings.transfer_timeout(),
            fallback: settings.fallback,
            fallback_range: settings.upload_fallback,
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

            let payload = random_payload(size);
            let start = Instant::now();
            let outcome = timeout(self.trial_timeout, transport.upload(payload))
                .await
                .unwrap_or_else(|elapsed| Err(elapsed.into()));
            let sample = match outcome {
                Ok(()) => speed_mbps(size as u64, start.elapsed()),
                Err(err) => {
                    warn!(trial = index + 1, size, error = %err, "upload trial failed");
                    None
                }
            };

            if let Some(speed) = sample {
                debug!(trial = index + 1, size, speed_mbps = speed, "upload trial complete");
                best.observe(speed);
            }

            let _ = progress_tx
                .send(ThroughputProgress {
                    trial: index + 1,
                    trials,
                    bytes: if sample.is_some() { size as u64 } else { 0 },
                    speed_mbps: sample.unwrap_or(0.0),
                    best_mbps: best.best().unwrap_or(0.0),
                    percent: progress.advance(trial_percent(index, trials, 1.0)),
                })
                .await;
        }

        let result = conclude(best.best(), self.fallback, self.fallback_range);
        if !result.is_measured() {
            warn!(?result, "no upload trial succeeded");
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
}

fn random_payload(size: usize) -> Vec<u8> {
    let mut data = vec![0u8; size];
    rand::thread_rng().fill(&mut data[..]);
    data
}
