//! Operator driven pause/resume.
//!
//! A dedicated thread reads commands from stdin and sends `ControlEvent`s down a channel.
//! The row loop calls `PauseController::checkpoint` between rows, never while a fetch is running.

use std::io::BufRead;
use std::thread::{self, JoinHandle};

use tokio::sync::mpsc;
use tracing::warn;

use crate::info_time;

const CONTROL_CHANNEL_SIZE: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    Pause,
    Resume,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseState {
    Running,
    Paused,
}

#[derive(Debug)]
pub struct PauseController {
    rx: mpsc::Receiver<ControlEvent>,
    state: PauseState,
}

impl PauseController {
    pub fn new(rx: mpsc::Receiver<ControlEvent>) -> Self {
        Self {
            rx,
            state: PauseState::Running,
        }
    }

    pub fn channel() -> (mpsc::Sender<ControlEvent>, Self) {
        let (tx, rx) = mpsc::channel(CONTROL_CHANNEL_SIZE);
        (tx, Self::new(rx))
    }

    pub fn state(&self) -> PauseState {
        self.state
    }

    /// Applies every pending event, then waits for a `Resume` if the run ended up paused.
    pub async fn checkpoint(&mut self) {
        while let Ok(event) = self.rx.try_recv() {
            self.apply(event);
        }

        while self.state == PauseState::Paused {
            match self.rx.recv().await {
                Some(event) => self.apply(event),
                None => {
                    warn!("Operator input closed while paused, resuming");
                    self.state = PauseState::Running;
                }
            }
        }
    }

    fn apply(&mut self, event: ControlEvent) {
        match (self.state, event) {
            (PauseState::Running, ControlEvent::Pause) => {
                info_time!("Paused. Press Enter (or type 'r') to resume.");
                self.state = PauseState::Paused;
            }
            (PauseState::Paused, ControlEvent::Resume) => {
                info_time!("Resuming.");
                self.state = PauseState::Running;
            }
            // Repeated requests are no-ops.
            _ => {}
        }
    }
}

/// Maps one line of operator input to an event. A bare Enter toggles.
pub fn parse_command(line: &str, paused: bool) -> Option<ControlEvent> {
    match line.trim().to_lowercase().as_str() {
        "" if paused => Some(ControlEvent::Resume),
        "" => Some(ControlEvent::Pause),
        "p" | "pause" => Some(ControlEvent::Pause),
        "r" | "resume" => Some(ControlEvent::Resume),
        _ => None,
    }
}

/// Spawns the stdin reader. It stops once stdin closes or the controller is dropped.
pub fn spawn_operator_input(tx: mpsc::Sender<ControlEvent>) -> JoinHandle<()> {
    thread::spawn(move || {
        let stdin = std::io::stdin();
        // Only tracks what this thread last asked for, so a bare Enter knows which way to toggle.
        let mut paused = false;
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            let Some(event) = parse_command(&line, paused) else {
                warn!("Unknown command '{}', use 'p' to pause and 'r' to resume", line.trim());
                continue;
            };
            paused = event == ControlEvent::Pause;
            if tx.blocking_send(event).is_err() {
                break;
            }
        }
    })
}
