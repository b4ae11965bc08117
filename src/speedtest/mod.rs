pub mod download;
pub mod ping;
pub mod rating;
pub mod runner;
pub mod sampler;
pub mod transport;
pub mod upload;

#[cfg(test)]
pub(crate) mod testing;

pub use runner::SpeedTest;
pub use transport::{HttpTransport, Transport};

/// Outcome of a throughput phase.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Throughput {
    /// Best sample across the phase's successful trials, in Mbps.
    Measured(f64),
    /// Every trial failed; a plausible value was substituted.
    Synthetic(f64),
    /// Every trial failed and no substitute was requested.
    Unmeasurable,
    #[default]
    Pending,
}

impl Throughput {
    /// Display value in Mbps. Zero for `Unmeasurable` and `Pending`.
    pub fn mbps(&self) -> f64 {
        match self {
            Throughput::Measured(mbps) | Throughput::Synthetic(mbps) => *mbps,
            Throughput::Unmeasurable | Throughput::Pending => 0.0,
        }
    }

    pub fn is_measured(&self) -> bool {
        matches!(self, Throughput::Measured(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SpeedTestResult {
    pub ping_ms: u32,
    pub jitter_ms: f64,
    pub download: Throughput,
    pub upload: Throughput,
}

impl SpeedTestResult {
    pub fn download_mbps(&self) -> f64 {
        self.download.mbps()
    }

    pub fn upload_mbps(&self) -> f64 {
        self.upload.mbps()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TestPhase {
    #[default]
    Idle,
    Ping,
    Download,
    Upload,
    Complete,
}

impl TestPhase {
    pub fn is_active(self) -> bool {
        matches!(self, TestPhase::Ping | TestPhase::Download | TestPhase::Upload)
    }
}

/// Snapshot published to subscribers after every change.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TestState {
    pub phase: TestPhase,
    pub result: SpeedTestResult,
    /// 0–100 within the current phase.
    pub progress: f64,
    /// Latest instantaneous sample of the current throughput phase.
    pub live_mbps: f64,
}
