use super::download::DownloadTest;
use super::ping::{PingProgress, PingTest};
use super::sampler::ThroughputProgress;
use super::transport::Transport;
use super::upload::UploadTest;
use super::{SpeedTestResult, TestPhase, TestState};
use crate::error::{Result, SpeedError};
use crate::settings::Settings;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc, watch};
use tracing::{info, instrument};

const PROGRESS_BUFFER: usize = 32;

/// Runs ping, download and upload in order and publishes every change of
/// phase, progress and result to subscribers.
///
/// Only the run in progress writes the state, and only one run may be in
/// progress at a time.
pub struct SpeedTest<T> {
    transport: T,
    settings: Settings,
    state: watch::Sender<TestState>,
    running: AtomicBool,
}

impl<T: Transport> SpeedTest<T> {
    pub fn new(transport: T, settings: Settings) -> Self {
        let (state, _) = watch::channel(TestState::default());
        Self {
            transport,
            settings,
            state,
            running: AtomicBool::new(false),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<TestState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> TestState {
        *self.state.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Runs a full test. Fails with `AlreadyRunning` without touching the
    /// state when another run is active, and with `Cancelled` once `cancel`
    /// turns true, in which case the phase goes back to `Idle`.
    #[instrument(skip_all)]
    pub async fn run_full_test(
        &self,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<SpeedTestResult> {
        let _guard = RunGuard::acquire(&self.running, &self.state)?;

        tokio::select! {
            biased;
            _ = cancelled(&mut cancel) => {
                return_to_idle(&self.state);
                info!("speed test cancelled");
                Err(SpeedError::Cancelled)
            }
            result = self.run_phases() => Ok(result),
        }
    }

    async fn run_phases(&self) -> SpeedTestResult {
        self.state.send_replace(TestState::default());

        // Ping
        self.begin_phase(TestPhase::Ping);
        let (ping_tx, ping_rx) = mpsc::channel(PROGRESS_BUFFER);
        let mut ping = PingTest::new(&self.settings);
        let (ping_result, ()) = tokio::join!(
            ping.run(&self.transport, ping_tx),
            self.forward_ping(ping_rx)
        );
        info!(
            ping_ms = ping_result.avg_ms,
            jitter_ms = ping_result.jitter_ms,
            answered = ping_result.answered,
            "ping complete"
        );
        self.finish_phase(|state| {
            state.result.ping_ms = ping_result.avg_ms;
            state.result.jitter_ms = ping_result.jitter_ms;
        })
        .await;

        // Download
        self.begin_phase(TestPhase::Download);
        let (download_tx, download_rx) = mpsc::channel(PROGRESS_BUFFER);
        let download = DownloadTest::new(&self.settings);
        let (download_result, ()) = tokio::join!(
            download.run(&self.transport, download_tx),
            self.forward_throughput(download_rx)
        );
        info!(result = ?download_result, "download complete");
        self.finish_phase(|state| {
            state.result.download = download_result;
            state.live_mbps = download_result.mbps();
        })
        .await;

        // Upload
        self.begin_phase(TestPhase::Upload);
        let (upload_tx, upload_rx) = mpsc::channel(PROGRESS_BUFFER);
        let upload = UploadTest::new(&self.settings);
        let (upload_result, ()) = tokio::join!(
            upload.run(&self.transport, upload_tx),
            self.forward_throughput(upload_rx)
        );
        info!(result = ?upload_result, "upload complete");
        self.finish_phase(|state| {
            state.result.upload = upload_result;
            state.live_mbps = upload_result.mbps();
        })
        .await;
        self.state.send_modify(|state| state.phase = TestPhase::Complete);

        SpeedTestResult {
            ping_ms: ping_result.avg_ms,
            jitter_ms: ping_result.jitter_ms,
            download: download_result,
            upload: upload_result,
        }
    }

    fn begin_phase(&self, phase: TestPhase) {
        self.state.send_modify(|state| {
            state.phase = phase;
            state.progress = 0.0;
            state.live_mbps = 0.0;
        });
    }

    /// Publishes the phase result at 100% and yields once so subscribers see
    /// the finished phase before the next one starts.
    async fn finish_phase(&self, record: impl FnOnce(&mut TestState)) {
        self.state.send_modify(|state| {
            record(state);
            state.progress = 100.0;
        });
        tokio::task::yield_now().await;
    }

    async fn forward_ping(&self, mut rx: mpsc::Receiver<PingProgress>) {
        while let Some(update) = rx.recv().await {
            self.state.send_modify(|state| state.progress = update.percent);
        }
    }

    async fn forward_throughput(&self, mut rx: mpsc::Receiver<ThroughputProgress>) {
        while let Some(update) = rx.recv().await {
            self.state.send_modify(|state| {
                state.progress = update.percent;
                state.live_mbps = update.speed_mbps;
            });
        }
    }
}

/// Resolves once `cancel` holds `true`. A dropped sender never cancels.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    let outcome = cancel.wait_for(|cancelled| *cancelled).await.map(|_| ());
    if outcome.is_err() {
        std::future::pending::<()>().await;
    }
}

fn return_to_idle(state: &watch::Sender<TestState>) {
    state.send_if_modified(|state| {
        if !state.phase.is_active() {
            return false;
        }
        state.phase = TestPhase::Idle;
        state.progress = 0.0;
        state.live_mbps = 0.0;
        true
    });
}

/// Holds the running flag for one run. Dropping it mid-phase, whether through
/// cancellation, a dropped future or a panic, puts the phase back to `Idle`.
struct RunGuard<'a> {
    running: &'a AtomicBool,
    state: &'a watch::Sender<TestState>,
}

impl<'a> RunGuard<'a> {
    fn acquire(running: &'a AtomicBool, state: &'a watch::Sender<TestState>) -> Result<Self> {
        running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| SpeedError::AlreadyRunning)?;
        Ok(Self { running, state })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        return_to_idle(self.state);
        self.running.store(false, Ordering::Release);
    }
}
