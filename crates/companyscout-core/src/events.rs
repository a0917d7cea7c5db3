//! Job lifecycle events for observers (CLI progress, audit trails, tests).

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::model::JobStatus;

pub type EventId = String;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    ProviderStarted {
        event_id: EventId,
        timestamp: i64,
        job_id: String,
        provider: String,
    },
    ProviderFinished {
        event_id: EventId,
        timestamp: i64,
        job_id: String,
        provider: String,
        outcome: ProviderOutcome,
        duration_ms: u64,
    },
    JobFinished {
        event_id: EventId,
        timestamp: i64,
        job_id: String,
        status: JobStatus,
        succeeded: usize,
        total: usize,
    },
}

impl Event {
    pub fn event_id(&self) -> &str {
        match self {
            Event::ProviderStarted { event_id, .. }
            | Event::ProviderFinished { event_id, .. }
            | Event::JobFinished { event_id, .. } => event_id,
        }
    }

    pub fn job_id(&self) -> &str {
        match self {
            Event::ProviderStarted { job_id, .. }
            | Event::ProviderFinished { job_id, .. }
            | Event::JobFinished { job_id, .. } => job_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderOutcome {
    Success { total_score: u32 },
    Failure { reason: String },
}

/// Cloneable sender half; emitting never blocks and a dropped receiver is tolerated.
#[derive(Clone)]
pub struct EventCollector {
    sender: Option<mpsc::UnboundedSender<Event>>,
}

impl EventCollector {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                sender: Some(sender),
            },
            receiver,
        )
    }

    /// Collector that discards everything.
    pub fn disabled() -> Self {
        Self { sender: None }
    }

    pub fn provider_started(&self, job_id: &str, provider: &str) {
        self.emit(Event::ProviderStarted {
            event_id: generate_event_id(),
            timestamp: Utc::now().timestamp_millis(),
            job_id: job_id.to_string(),
            provider: provider.to_string(),
        });
    }

    pub fn provider_finished(
        &self,
        job_id: &str,
        provider: &str,
        outcome: ProviderOutcome,
        duration_ms: u64,
    ) {
        self.emit(Event::ProviderFinished {
            event_id: generate_event_id(),
            timestamp: Utc::now().timestamp_millis(),
            job_id: job_id.to_string(),
            provider: provider.to_string(),
            outcome,
            duration_ms,
        });
    }

    pub fn job_finished(&self, job_id: &str, status: JobStatus, succeeded: usize, total: usize) {
        self.emit(Event::JobFinished {
            event_id: generate_event_id(),
            timestamp: Utc::now().timestamp_millis(),
            job_id: job_id.to_string(),
            status,
            succeeded,
            total,
        });
    }

    fn emit(&self, event: Event) {
        let Some(sender) = &self.sender else {
            return;
        };
        if let Err(err) = sender.send(event) {
            tracing::trace!(error = %err, "event receiver dropped");
        }
    }
}

impl Default for EventCollector {
    fn default() -> Self {
        Self::disabled()
    }
}

fn generate_event_id() -> EventId {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let id = COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("evt_{id}")
}

/// Drain every event currently buffered in `receiver`.
pub fn drain(receiver: &mut mpsc::UnboundedReceiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    events
}
