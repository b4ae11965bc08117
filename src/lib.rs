pub mod error;
pub mod logger;
pub mod settings;
pub mod speedtest;

pub use error::{Result, SpeedError};
pub use settings::Settings;
pub use speedtest::{HttpTransport, SpeedTest, SpeedTestResult, TestPhase, TestState, Throughput};
