//! Reconnecting telemetry client.
//!
//! A background task owns the transport. It reconnects on unexpected loss
//! according to the [`ReconnectPolicy`] and publishes decoded frames and
//! connection changes on the [`EventBus`]. Outbound frames are only accepted
//! while connected; nothing is queued across a disconnect.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use sentinel_core::{OutboundFrame, SensorPayload, SessionId, TelemetryFrame};
use sentinel_settings::ClientSettings;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::connector::{Connector, Transport, WsConnector};
use crate::error::{ClientError, Result};
use crate::events::{ClientEvent, EventBus, EventKind, SubscriptionId};
use crate::supervisor::{ConnectionState, NextStep, ReconnectPolicy, Supervisor};

const COMMAND_QUEUE: usize = 256;

/// Where to connect and how hard to retry.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// WebSocket endpoint, e.g. `ws://127.0.0.1:8080/ws`.
    pub url: String,
    /// Reconnect schedule.
    pub policy: ReconnectPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::from(&ClientSettings::default())
    }
}

impl From<&ClientSettings> for ClientConfig {
    fn from(s: &ClientSettings) -> Self {
        Self {
            url: s.url.clone(),
            policy: ReconnectPolicy::from(s),
        }
    }
}

/// State shared between the handle and the connection task.
struct Shared {
    config: ClientConfig,
    connector: Arc<dyn Connector>,
    events: EventBus,
    connected: AtomicBool,
    state: Mutex<ConnectionState>,
}

impl Shared {
    fn set_state(&self, state: ConnectionState) {
        *self.state.lock() = state;
        self.connected
            .store(state == ConnectionState::Connected, Ordering::SeqCst);
    }
}

struct Worker {
    commands: mpsc::Sender<String>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Handle to a background connection task.
///
/// Dropping the handle cancels the task without emitting further events.
pub struct TelemetryClient {
    shared: Arc<Shared>,
    worker: Mutex<Option<Worker>>,
}

impl TelemetryClient {
    /// Connect over WebSocket to `config.url`.
    pub fn connect(config: ClientConfig) -> Self {
        Self::with_connector(config, Arc::new(WsConnector))
    }

    /// Start the connection task with a custom transport.
    pub fn with_connector(config: ClientConfig, connector: Arc<dyn Connector>) -> Self {
        let shared = Arc::new(Shared {
            config,
            connector,
            events: EventBus::new(),
            connected: AtomicBool::new(false),
            state: Mutex::new(ConnectionState::Disconnected),
        });
        let client = Self {
            shared,
            worker: Mutex::new(None),
        };
        client.spawn_worker();
        client
    }

    fn spawn_worker(&self) {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(Arc::clone(&self.shared), rx, cancel.clone()));
        *self.worker.lock() = Some(Worker {
            commands: tx,
            cancel,
            task,
        });
    }

    /// Register `handler` for events of `kind`.
    pub fn on<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        self.shared.events.on(kind, handler)
    }

    /// Remove a handler. Returns `false` if `id` was already gone.
    pub fn off(&self, id: SubscriptionId) -> bool {
        self.shared.events.off(id)
    }

    /// The underlying event bus.
    pub fn events(&self) -> &EventBus {
        &self.shared.events
    }

    /// Whether the socket is open right now.
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.shared.state.lock()
    }

    /// Configured endpoint.
    pub fn url(&self) -> &str {
        &self.shared.config.url
    }

    /// Ask the relay to start recording into `id`.
    pub fn start_session(&self, id: SessionId) -> Result<()> {
        self.send_frame(&TelemetryFrame::StartSession(id))
    }

    /// Ask the relay to stop recording.
    pub fn end_session(&self) -> Result<()> {
        self.send_frame(&TelemetryFrame::EndSession)
    }

    /// Send one sample for relay and recording.
    pub fn send_sensor_data(&self, payload: SensorPayload) -> Result<()> {
        self.send_frame(&TelemetryFrame::SensorData(payload))
    }

    fn send_frame(&self, frame: &TelemetryFrame) -> Result<()> {
        if !self.is_connected() {
            warn!(frame_type = frame.frame_type(), "not connected, dropping frame");
            return Err(ClientError::NotConnected);
        }
        let text = frame.encode()?;
        let guard = self.worker.lock();
        let worker = guard.as_ref().ok_or(ClientError::Stopped)?;
        worker.commands.try_send(text).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                ClientError::Transport("outbound queue full".into())
            }
            mpsc::error::TrySendError::Closed(_) => ClientError::Stopped,
        })
    }

    /// Close the socket without reconnecting and drop every handler.
    pub async fn disconnect(&self) {
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            worker.cancel.cancel();
            if let Err(e) = worker.task.await {
                warn!(error = %e, "client task ended abnormally");
            }
        }
        self.shared.set_state(ConnectionState::Disconnected);
        self.shared.events.clear();
        info!(url = %self.shared.config.url, "client disconnected");
    }

    /// Start over after giving up or disconnecting, with attempts reset to
    /// zero. Returns `false` without touching anything while the client is
    /// connecting or connected.
    ///
    /// Must not be awaited from inside an event handler: handlers run on the
    /// connection task this waits for.
    pub async fn restart(&self) -> bool {
        if matches!(
            self.state(),
            ConnectionState::Connecting | ConnectionState::Connected
        ) {
            debug!(state = ?self.state(), "restart ignored, client is live");
            return false;
        }
        let previous = self.worker.lock().take();
        if let Some(worker) = previous {
            worker.cancel.cancel();
            if let Err(e) = worker.task.await {
                warn!(error = %e, "client task ended abnormally");
            }
        }
        info!(url = %self.shared.config.url, "restarting client");
        self.spawn_worker();
        true
    }
}

impl Drop for TelemetryClient {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.lock().take() {
            worker.cancel.cancel();
        }
    }
}

enum Exit {
    Cancelled,
    Lost(String),
}

async fn run(shared: Arc<Shared>, mut commands: mpsc::Receiver<String>, cancel: CancellationToken) {
    let url = shared.config.url.clone();
    let mut supervisor = Supervisor::new(shared.config.policy);

    loop {
        supervisor.begin_connect();
        shared.set_state(supervisor.state());

        let connected = tokio::select! {
            _ = cancel.cancelled() => break,
            r = shared.connector.connect(&url) => r,
        };

        match connected {
            Ok(mut transport) => {
                supervisor.on_connected();
                shared.set_state(supervisor.state());
                info!(url = %url, "connected");
                let _ = shared.events.emit(&ClientEvent::Connected);

                match pump(transport.as_mut(), &shared.events, &mut commands, &cancel).await {
                    Exit::Cancelled => {
                        transport.close().await;
                        break;
                    }
                    Exit::Lost(reason) => {
                        info!(url = %url, reason = %reason, "connection lost");
                        shared.set_state(ConnectionState::Disconnected);
                        while commands.try_recv().is_ok() {}
                        let _ = shared.events.emit(&ClientEvent::Disconnected { reason });
                    }
                }
            }
            Err(e) => {
                warn!(url = %url, error = %e, "connect failed");
                let _ = shared.events.emit(&ClientEvent::Error(e.to_string()));
            }
        }

        match supervisor.on_connection_lost() {
            NextStep::Retry { attempt, delay } => {
                shared.set_state(supervisor.state());
                info!(
                    attempt,
                    max_attempts = supervisor.policy().max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "scheduling reconnect"
                );
                let _ = shared
                    .events
                    .emit(&ClientEvent::Reconnecting { attempt, delay });
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            NextStep::GiveUp { attempts } => {
                shared.set_state(supervisor.state());
                error!(url = %url, attempts, "reconnect attempts exhausted");
                let _ = shared
                    .events
                    .emit(&ClientEvent::ReconnectExhausted { attempts });
                return;
            }
            NextStep::Stop => break,
        }
    }

    supervisor.on_manual_disconnect();
    shared.set_state(supervisor.state());
}

/// Move frames until the socket drops or the client is cancelled.
async fn pump(
    transport: &mut dyn Transport,
    events: &EventBus,
    commands: &mut mpsc::Receiver<String>,
    cancel: &CancellationToken,
) -> Exit {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Exit::Cancelled,
            cmd = commands.recv() => {
                let Some(text) = cmd else { return Exit::Cancelled };
                if let Err(e) = transport.send(text).await {
                    return Exit::Lost(e.to_string());
                }
            }
            msg = transport.recv() => match msg {
                Some(Ok(text)) => handle_inbound(&text, events),
                Some(Err(e)) => return Exit::Lost(e.to_string()),
                None => return Exit::Lost("closed by server".into()),
            },
        }
    }
}

fn handle_inbound(text: &str, events: &EventBus) {
    let frame = match OutboundFrame::decode(text) {
        Ok(frame) => frame,
        Err(e) if e.is_unknown_type() => {
            debug!(error = %e, "ignoring unknown frame type");
            return;
        }
        Err(e) => {
            warn!(error = %e, "dropping undecodable frame");
            return;
        }
    };
    let event = match frame {
        OutboundFrame::LiveSensorData { data } => ClientEvent::LiveSensorData(data),
        OutboundFrame::SessionStarted { session_id } => ClientEvent::SessionStarted(session_id),
        OutboundFrame::SessionEnded => ClientEvent::SessionEnded,
    };
    let _ = events.emit(&event);
}
