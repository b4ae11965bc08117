use super::SpeedTestResult;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Rating {
    Fair,
    Good,
    VeryGood,
    Excellent,
}

impl Rating {
    pub fn download(mbps: f64) -> Self {
        Self::from_thresholds(mbps, [100.0, 50.0, 25.0])
    }

    pub fn upload(mbps: f64) -> Self {
        Self::from_thresholds(mbps, [50.0, 25.0, 10.0])
    }

    /// Latency has no "very good" grade.
    pub fn latency(ping_ms: u32) -> Self {
        match ping_ms {
            0..=49 => Rating::Excellent,
            50..=99 => Rating::Good,
            _ => Rating::Fair,
        }
    }

    fn from_thresholds(mbps: f64, [excellent, very_good, good]: [f64; 3]) -> Self {
        if mbps >= excellent {
            Rating::Excellent
        } else if mbps >= very_good {
            Rating::VeryGood
        } else if mbps >= good {
            Rating::Good
        } else {
            Rating::Fair
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Rating::Excellent => "Excellent",
            Rating::VeryGood => "Very good",
            Rating::Good => "Good",
            Rating::Fair => "Fair",
        };
        f.write_str(label)
    }
}

/// Whether a connection comfortably covers common workloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Suitability {
    pub hd_streaming: bool,
    pub video_calls: bool,
    pub online_gaming: bool,
    pub remote_work: bool,
}

impl Suitability {
    pub fn assess(result: &SpeedTestResult) -> Self {
        let down = result.download_mbps();
        let up = result.upload_mbps();
        Self {
            hd_streaming: down >= 25.0,
            video_calls: up >= 5.0,
            online_gaming: result.ping_ms < 100,
            remote_work: down >= 10.0 && up >= 3.0,
        }
    }
}
