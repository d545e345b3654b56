//! Progress events and the bus that fans them out.
//!
//! Every subscriber runs on its own thread behind an unbounded channel, so
//! `publish` never waits on a subscriber. Subscribers are registered before
//! the bus is handed to the producing stages.

use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::mutants::MutantStatus;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MutationEvent {
    GenerationStarted {
        file_count: usize,
    },
    FileProcessed {
        file: Utf8PathBuf,
        mutations: usize,
    },
    /// The file could not be parsed and contributes no mutations.
    FileSkipped {
        file: Utf8PathBuf,
        reason: String,
    },
    GenerationFinished {
        mutation_count: usize,
    },
    MutantStarted {
        index: usize,
        id: String,
    },
    MutantFinished {
        index: usize,
        id: String,
        status: MutantStatus,
    },
}

pub trait EventSubscriber: Send + 'static {
    fn on_event(&mut self, event: &MutationEvent);
}

impl<F> EventSubscriber for F
where
    F: FnMut(&MutationEvent) + Send + 'static,
{
    fn on_event(&mut self, event: &MutationEvent) {
        self(event)
    }
}

struct Lane {
    sender: Option<Sender<MutationEvent>>,
    worker: Option<JoinHandle<()>>,
}

#[derive(Default)]
pub struct EventBus {
    lanes: Vec<Lane>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, mut subscriber: impl EventSubscriber) {
        let (sender, receiver) = mpsc::channel::<MutationEvent>();
        let worker = std::thread::Builder::new()
            .name(format!("event-lane-{}", self.lanes.len()))
            .spawn(move || {
                for event in receiver {
                    subscriber.on_event(&event);
                }
            });
        match worker {
            Ok(worker) => self.lanes.push(Lane {
                sender: Some(sender),
                worker: Some(worker),
            }),
            Err(e) => tracing::warn!("failed to start event subscriber thread: {}", e),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.lanes.len()
    }

    pub fn publish(&self, event: MutationEvent) {
        for lane in &self.lanes {
            if let Some(sender) = &lane.sender {
                // A subscriber that panicked has dropped its receiver.
                let _ = sender.send(event.clone());
            }
        }
    }

    /// Closes every lane and waits until all queued events are delivered.
    pub fn shutdown(mut self) {
        self.close();
    }

    fn close(&mut self) {
        for lane in &mut self.lanes {
            lane.sender.take();
        }
        for lane in &mut self.lanes {
            if let Some(worker) = lane.worker.take() {
                let _ = worker.join();
            }
        }
    }
}

impl Drop for EventBus {
    fn drop(&mut self) {
        self.close();
    }
}

/// Keeps every event it receives. Cloning shares the same log.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<MutationEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<MutationEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl EventSubscriber for EventLog {
    fn on_event(&mut self, event: &MutationEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event.clone());
    }
}

/// Turns progress events into log lines.
#[derive(Debug, Default)]
pub struct LogSubscriber {
    total_files: usize,
    processed_files: usize,
}

impl EventSubscriber for LogSubscriber {
    fn on_event(&mut self, event: &MutationEvent) {
        match event {
            MutationEvent::GenerationStarted { file_count } => {
                self.total_files = *file_count;
                tracing::info!("generating mutations for {} files", file_count);
            }
            MutationEvent::FileProcessed { file, mutations } => {
                self.processed_files += 1;
                tracing::debug!(
                    "[{}/{}] {}: {} mutations",
                    self.processed_files,
                    self.total_files,
                    file,
                    mutations
                );
            }
            MutationEvent::FileSkipped { file, reason } => {
                self.processed_files += 1;
                tracing::warn!("skipping {}: {}", file, reason);
            }
            MutationEvent::GenerationFinished { mutation_count } => {
                tracing::info!("generated {} mutations", mutation_count);
            }
            MutationEvent::MutantStarted { index, id } => {
                tracing::debug!("mutant {} started: {}", index, id);
            }
            MutationEvent::MutantFinished { index, id, status } => {
                tracing::debug!("mutant {} finished: {} = {}", index, id, status.as_str());
            }
        }
    }
}
