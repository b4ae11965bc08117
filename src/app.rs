use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use netgauge::{TestPhase, TestState, Throughput};
use std::time::Duration;
use tokio::sync::watch;

const MAX_SAMPLES: usize = 200;

/// Dashboard state, fed from the speed test's published snapshots.
pub struct App {
    pub state: TestState,
    pub should_quit: bool,

    // Live speed samples for charts
    pub download_samples: Vec<f64>,
    pub upload_samples: Vec<f64>,

    cancel: Option<watch::Sender<bool>>,
}

impl App {
    pub fn new() -> Self {
        Self {
            state: TestState::default(),
            should_quit: false,
            download_samples: Vec::new(),
            upload_samples: Vec::new(),
            cancel: None,
        }
    }

    pub fn phase(&self) -> TestPhase {
        self.state.phase
    }

    pub fn handle_key_event(&mut self, key: event::KeyEvent) -> Option<AppAction> {
        if key.kind != KeyEventKind::Press {
            return None;
        }

        match key.code {
            KeyCode::Char('q') => {
                self.should_quit = true;
                Some(AppAction::Quit)
            }
            KeyCode::Enter if !self.phase().is_active() => Some(AppAction::StartTest),
            KeyCode::Esc if self.phase().is_active() => Some(AppAction::CancelTest),
            _ => None,
        }
    }

    /// Cancel handle for a new run, or `None` while the previous run still
    /// holds its receiver.
    pub fn begin_run(&mut self) -> Option<watch::Receiver<bool>> {
        if self.cancel.as_ref().is_some_and(|tx| !tx.is_closed()) {
            return None;
        }
        let (tx, rx) = watch::channel(false);
        self.cancel = Some(tx);
        Some(rx)
    }

    pub fn cancel_run(&self) {
        if let Some(tx) = &self.cancel {
            let _ = tx.send(true);
        }
    }

    /// Applies a new snapshot, recording the live sample of throughput phases.
    pub fn sync(&mut self, state: TestState) {
        if state == self.state {
            return;
        }

        if state.phase == TestPhase::Ping && self.state.phase != TestPhase::Ping {
            self.download_samples.clear();
            self.upload_samples.clear();
        }

        let moved =
            state.live_mbps != self.state.live_mbps || state.progress != self.state.progress;
        if moved && state.live_mbps > 0.0 {
            let samples = match state.phase {
                TestPhase::Download => Some(&mut self.download_samples),
                TestPhase::Upload => Some(&mut self.upload_samples),
                _ => None,
            };
            if let Some(samples) = samples {
                samples.push(state.live_mbps);
                if samples.len() > MAX_SAMPLES {
                    samples.remove(0);
                }
            }
        }

        self.state = state;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppAction {
    Quit,
    StartTest,
    CancelTest,
}

pub fn format_throughput(throughput: &Throughput) -> String {
    match throughput {
        Throughput::Measured(mbps) => format!("{mbps:.1} Mbps"),
        Throughput::Synthetic(mbps) => format!("~{mbps:.1} Mbps (estimated)"),
        Throughput::Unmeasurable => "unavailable".to_string(),
        Throughput::Pending => "—".to_string(),
    }
}

pub fn poll_event(timeout: Duration) -> Result<Option<Event>> {
    if event::poll(timeout)? {
        Ok(Some(event::read()?))
    } else {
        Ok(None)
    }
}
