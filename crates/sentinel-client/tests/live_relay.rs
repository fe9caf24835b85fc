//! Client against a real relay server.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::timeout;

use sentinel_client::{
    ClientConfig, ClientEvent, ConnectionState, EventKind, LiveView, ReconnectPolicy,
    TelemetryClient,
};
use sentinel_core::{ImuReading, SensorPayload, SessionId};
use sentinel_server::{ServerConfig, ServerHandle};
use sentinel_store::{MemorySessionStore, NewSession, SessionStore};

const TIMEOUT: Duration = Duration::from_secs(5);

async fn boot_server(port: u16, store: Arc<MemorySessionStore>) -> ServerHandle {
    let config = ServerConfig {
        port,
        ..ServerConfig::default()
    };
    sentinel_server::start(config, store, None).await.unwrap()
}

fn client_for(handle: &ServerHandle) -> TelemetryClient {
    TelemetryClient::connect(ClientConfig {
        url: handle.ws_url(),
        policy: ReconnectPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(50),
        },
    })
}

async fn wait_until(mut f: impl FnMut() -> bool) {
    timeout(TIMEOUT, async {
        while !f() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition never held");
}

#[tokio::test]
async fn producer_and_subscriber_share_a_session() {
    let store = Arc::new(MemorySessionStore::new());
    let _ = store.create(NewSession::with_id("s1")).unwrap();
    let handle = boot_server(0, store.clone()).await;

    let producer = client_for(&handle);
    let subscriber = client_for(&handle);
    let view = Arc::new(Mutex::new(LiveView::new(50)));
    for kind in [
        EventKind::LiveSensorData,
        EventKind::SessionStarted,
        EventKind::SessionEnded,
    ] {
        let v = Arc::clone(&view);
        let _ = subscriber.on(kind, move |e| v.lock().apply(e));
    }
    let ended = Arc::new(Mutex::new(0));
    let e = Arc::clone(&ended);
    let _ = subscriber.on(EventKind::SessionEnded, move |_| *e.lock() += 1);

    wait_until(|| producer.is_connected() && subscriber.is_connected()).await;
    wait_until(|| handle.hub().connection_count() == 2).await;

    producer.start_session(SessionId::from_raw("s1")).unwrap();
    for i in 0..60 {
        let v = f64::from(i) / 100.0;
        producer
            .send_sensor_data(SensorPayload::new(ImuReading::default(), [v; 5]))
            .unwrap();
    }
    wait_until(|| view.lock().history().len() == 50).await;
    assert_eq!(view.lock().session_id().map(SessionId::as_str), Some("s1"));
    producer.end_session().unwrap();
    wait_until(|| *ended.lock() == 1).await;

    let view = view.lock();
    assert!(view.session_id().is_none());
    assert_eq!(view.history().snapshot()[0].flex_values()[0], 0.1);
    assert_eq!(view.latest().unwrap().flex_values()[0], 0.59);
    assert_eq!(store.samples(&SessionId::from_raw("s1")).unwrap().len(), 60);

    producer.disconnect().await;
    subscriber.disconnect().await;
    let _ = handle.shutdown().await;
}

#[tokio::test]
async fn reconnects_after_server_restart() {
    let store = Arc::new(MemorySessionStore::new());
    let handle = boot_server(0, store.clone()).await;
    let port = handle.port();

    let client = client_for(&handle);
    let events = Arc::new(Mutex::new(Vec::new()));
    for kind in [
        EventKind::Connected,
        EventKind::Disconnected,
        EventKind::Reconnecting,
    ] {
        let ev = Arc::clone(&events);
        let _ = client.on(kind, move |e| ev.lock().push(e.kind()));
    }
    wait_until(|| client.is_connected()).await;

    let _ = handle.shutdown().await;
    wait_until(|| !client.is_connected()).await;

    let handle = boot_server(port, store).await;
    wait_until(|| client.is_connected()).await;

    let seen = events.lock().clone();
    assert_eq!(seen.first(), Some(&EventKind::Connected));
    assert!(seen.contains(&EventKind::Disconnected));
    assert!(seen.contains(&EventKind::Reconnecting));
    assert_eq!(seen.last(), Some(&EventKind::Connected));

    client.disconnect().await;
    let _ = handle.shutdown().await;
}

#[tokio::test]
async fn gives_up_when_server_never_returns() {
    let handle = boot_server(0, Arc::new(MemorySessionStore::new())).await;
    let client = TelemetryClient::connect(ClientConfig {
        url: handle.ws_url(),
        policy: ReconnectPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(20),
        },
    });
    let exhausted = Arc::new(Mutex::new(Vec::new()));
    let ex = Arc::clone(&exhausted);
    let _ = client.on(EventKind::ReconnectExhausted, move |e| ex.lock().push(e.clone()));
    wait_until(|| client.is_connected()).await;

    let _ = handle.shutdown().await;
    wait_until(|| client.state() == ConnectionState::GaveUp).await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(
        *exhausted.lock(),
        vec![ClientEvent::ReconnectExhausted { attempts: 2 }]
    );
    assert!(client.send_sensor_data(SensorPayload::default()).is_err());
}
