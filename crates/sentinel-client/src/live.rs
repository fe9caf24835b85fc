//! Subscriber-side view of the live session.

use std::time::Duration;

use sentinel_core::{SensorPayload, SessionId};
use tokio::time::Instant;

use crate::events::ClientEvent;
use crate::history::HistoryBuffer;

/// Latest sample, recent history and the running session, folded from
/// [`ClientEvent`]s.
#[derive(Debug)]
pub struct LiveView {
    latest: Option<SensorPayload>,
    history: HistoryBuffer<SensorPayload>,
    session: Option<(SessionId, Instant)>,
}

impl LiveView {
    /// Create an empty instance.
    pub fn new(history_capacity: usize) -> Self {
        Self {
            latest: None,
            history: HistoryBuffer::new(history_capacity),
            session: None,
        }
    }

    /// Fold one event into the view. Connection events are ignored.
    pub fn apply(&mut self, event: &ClientEvent) {
        match event {
            ClientEvent::LiveSensorData(payload) => {
                self.latest = Some(payload.clone());
                self.history.push(payload.clone());
            }
            ClientEvent::SessionStarted(id) => {
                self.history.clear();
                self.session = Some((id.clone(), Instant::now()));
            }
            ClientEvent::SessionEnded => self.session = None,
            _ => {}
        }
    }

    /// Most recent sample.
    pub fn latest(&self) -> Option<&SensorPayload> {
        self.latest.as_ref()
    }

    /// Recent samples, oldest first.
    pub fn history(&self) -> &HistoryBuffer<SensorPayload> {
        &self.history
    }

    /// Id of the running session, if any.
    pub fn session_id(&self) -> Option<&SessionId> {
        self.session.as_ref().map(|(id, _)| id)
    }

    /// Time since the current session started.
    pub fn elapsed(&self) -> Option<Duration> {
        self.session.as_ref().map(|(_, started)| started.elapsed())
    }

    /// `MM:SS` for the running session.
    pub fn elapsed_display(&self) -> Option<String> {
        self.elapsed().map(|d| format_duration(d.as_secs()))
    }
}

/// Render seconds as `MM:SS`. Minutes are not wrapped into hours.
pub fn format_duration(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
