use super::transport::Transport;
use crate::settings::Settings;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{timeout, Instant};
use tracing::{debug, warn};

/// Times one request per endpoint, sequentially, and averages the ones that
/// got any response.
pub struct PingTest {
    endpoints: Vec<String>,
    timeout: Duration,
    fallback_ms: u32,
    samples: Vec<f64>,
}

impl PingTest {
    pub fn new(settings: &Settings) -> Self {
        Self {
            endpoints: settings.ping_endpoints.clone(),
            timeout: settings.ping_timeout(),
            fallback_ms: settings.ping_fallback_ms,
            samples: Vec::new(),
        }
    }

    pub async fn run<T: Transport>(
        &mut self,
        transport: &T,
        progress_tx: mpsc::Sender<PingProgress>,
    ) -> PingResult {
        self.samples.clear();
        let total = self.endpoints.len();

        for (index, url) in self.endpoints.iter().enumerate() {
            let start = Instant::now();
            let outcome = timeout(self.timeout, transport.probe(url))
                .await
                .unwrap_or_else(|elapsed| Err(elapsed.into()));
            let latest = match outcome {
                Ok(()) => {
                    let elapsed = start.elapsed().as_secs_f64() * 1000.0;
                    debug!(%url, elapsed_ms = elapsed, "latency probe answered");
                    self.samples.push(elapsed);
                    Some(elapsed)
                }
                Err(err) => {
                    warn!(%url, error = %err, "latency probe failed");
                    None
                }
            };

            let _ = progress_tx
                .send(PingProgress {
                    latest_ping: latest,
                    percent: (index + 1) as f64 / total as f64 * 100.0,
                })
                .await;
        }

        self.calculate_result()
    }

    fn calculate_result(&self) -> PingResult {
        let Some(avg_ms) = average_latency_ms(&self.samples) else {
            return PingResult {
                avg_ms: self.fallback_ms,
                jitter_ms: 0.0,
                answered: 0,
            };
        };

        let mean = self.samples.iter().sum::<f64>() / self.samples.len() as f64;
        let jitter_ms = if self.samples.len() > 1 {
            let variance: f64 = self.samples.iter().map(|&x| (x - mean).powi(2)).sum::<f64>()
                / (self.samples.len() - 1) as f64;
            variance.sqrt()
        } else {
            0.0
        };

        PingResult {
            avg_ms,
            jitter_ms,
            answered: self.samples.len(),
        }
    }
}

/// Mean round-trip time rounded to whole milliseconds.
pub fn average_latency_ms(samples: &[f64]) -> Option<u32> {
    if samples.is_empty() {
        return None;
    }
    let mean = samples.iter().sum::<f64>() / samples.len() as f64;
    Some(mean.round().max(0.0) as u32)
}

#[derive(Debug, Clone)]
pub struct PingProgress {
    pub latest_ping: Option<f64>,
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PingResult {
    pub avg_ms: u32,
    pub jitter_ms: f64,
    /// Endpoints that answered. Zero means `avg_ms` is the fallback.
    pub answered: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speedtest::testing::{ms, Call, Reply, ScriptedTransport};

    fn settings() -> Settings {
        Settings {
            ping_endpoints: vec!["a".into(), "b".into(), "c".into()],
            ..Settings::default()
        }
    }

    async fn run(transport: &ScriptedTransport) -> (PingResult, Vec<PingProgress>) {
        let (tx, mut rx) = mpsc::channel(32);
        let mut test = PingTest::new(&settings());
        let result = test.run(transport, tx).await;
        let mut progress = Vec::new();
        while let Some(p) = rx.recv().await {
            progress.push(p);
        }
        (result, progress)
    }

    #[test]
    fn average_rounds_to_whole_milliseconds() {
        assert_eq!(average_latency_ms(&[]), None);
        assert_eq!(average_latency_ms(&[20.0, 40.0]), Some(30));
        assert_eq!(average_latency_ms(&[10.2, 10.9]), Some(11));
        assert_eq!(average_latency_ms(&[12.4]), Some(12));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_endpoint_is_excluded_from_average() {
        let transport = ScriptedTransport::new()
            .with_probe("a", Reply::Ok(ms(20)))
            .with_probe("b", Reply::Ok(ms(40)))
            .with_probe("c", Reply::Fail(ms(5)));

        let (result, progress) = run(&transport).await;

        assert_eq!(result.avg_ms, 30);
        assert_eq!(result.answered, 2);
        assert_eq!(
            transport.calls(),
            vec![Call::Probe("a".into()), Call::Probe("b".into()), Call::Probe("c".into())]
        );
        let percents: Vec<f64> = progress.iter().map(|p| p.percent).collect();
        assert_eq!(percents.len(), 3);
        assert!(percents.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(percents.last(), Some(&100.0));
        assert_eq!(progress[2].latest_ping, None);
    }

    #[tokio::test(start_paused = true)]
    async fn no_answers_falls_back_to_fifty() {
        let transport = ScriptedTransport::new();
        let (result, _) = run(&transport).await;
        assert_eq!(result.avg_ms, 50);
        assert_eq!(result.answered, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_endpoint_times_out_and_is_skipped() {
        let transport = ScriptedTransport::new()
            .with_probe("a", Reply::Hang)
            .with_probe("b", Reply::Ok(ms(35)))
            .with_probe("c", Reply::Hang);

        let (result, _) = run(&transport).await;

        assert_eq!(result.avg_ms, 35);
        assert_eq!(result.answered, 1);
        assert_eq!(result.jitter_ms, 0.0);
    }
}
