//! Stub collaborators shared by the integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use live_notify::Result;
use live_notify::database::{DedupStore, KvStore, MemoryKvStore};
use live_notify::monitor::{Clock, EngineConfig, StatusEngine};
use live_notify::notification::NotificationChannel;
use live_platform::{
    LiveEvent, LiveEventBroadcaster, LiveTransport, ProxyConfig, RoomSnapshot, RoomState,
    TransportError, TransportStrategy,
};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::broadcast;

/// What the scripted room currently answers.
#[derive(Debug, Clone)]
pub enum RoomScript {
    Live(RoomSnapshot),
    NotLive,
    Broken(String),
}

impl RoomScript {
    fn to_result(&self) -> std::result::Result<RoomSnapshot, TransportError> {
        match self {
            RoomScript::Live(snapshot) => Ok(snapshot.clone()),
            RoomScript::NotLive => Err(TransportError::NotLive("LIVE has ended".to_string())),
            RoomScript::Broken(message) => Err(TransportError::Other(message.clone())),
        }
    }
}

/// Transport whose answers are set by the test.
pub struct ScriptedTransport {
    strategy: TransportStrategy,
    room: Mutex<RoomScript>,
    connect_error: Mutex<Option<String>>,
    events: LiveEventBroadcaster,
    connected: AtomicBool,
    room_delay: Mutex<Option<Duration>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    pub room_info_calls: AtomicUsize,
    pub connect_calls: AtomicUsize,
    pub disconnect_calls: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new(strategy: TransportStrategy) -> Arc<Self> {
        Arc::new(Self {
            strategy,
            room: Mutex::new(RoomScript::NotLive),
            connect_error: Mutex::new(None),
            events: LiveEventBroadcaster::new(),
            connected: AtomicBool::new(false),
            room_delay: Mutex::new(None),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            room_info_calls: AtomicUsize::new(0),
            connect_calls: AtomicUsize::new(0),
            disconnect_calls: AtomicUsize::new(0),
        })
    }

    /// Transport allowed to open an active connection.
    pub fn active() -> Arc<Self> {
        Self::new(TransportStrategy::Direct)
    }

    /// Transport restricted to snapshot polling.
    pub fn passive() -> Arc<Self> {
        Self::new(TransportStrategy::HttpProxy(ProxyConfig::new(
            "127.0.0.1:8080",
        )))
    }

    pub fn set_room(&self, script: RoomScript) {
        *self.room.lock() = script;
    }

    pub fn go_live(&self, viewers: u64, started_at: i64) {
        self.set_room(RoomScript::Live(snapshot(viewers, started_at)));
    }

    /// Make `connect()` fail with a transport error.
    pub fn fail_connect(&self, message: &str) {
        *self.connect_error.lock() = Some(message.to_string());
    }

    /// Publish an event as the connection would. `Disconnected` also ends the session.
    pub fn emit(&self, event: LiveEvent) {
        if event == LiveEvent::Disconnected {
            self.connected.store(false, Ordering::SeqCst);
        }
        self.events.publish(event);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Make every `room_info()` call take `delay` before answering.
    pub fn slow_room_info(&self, delay: Duration) {
        *self.room_delay.lock() = Some(delay);
    }

    /// Highest number of `room_info()` calls observed running at once.
    pub fn max_concurrent_room_info(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LiveTransport for ScriptedTransport {
    fn unique_id(&self) -> &str {
        "someone"
    }

    fn strategy(&self) -> &TransportStrategy {
        &self.strategy
    }

    async fn room_info(&self) -> std::result::Result<RoomSnapshot, TransportError> {
        self.room_info_calls.fetch_add(1, Ordering::SeqCst);
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        let delay = *self.room_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.room.lock().to_result()
    }

    async fn connect(&self) -> std::result::Result<RoomState, TransportError> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.connect_error.lock().clone() {
            return Err(TransportError::Other(message));
        }
        if self.connected.load(Ordering::SeqCst) {
            return Err(TransportError::AlreadyConnected("1".to_string()));
        }

        let snapshot = self.room.lock().to_result()?;
        let state = RoomState::from(&snapshot);
        self.connected.store(true, Ordering::SeqCst);
        self.events.publish(LiveEvent::Connected(state.clone()));
        Ok(state)
    }

    async fn disconnect(&self) -> std::result::Result<(), TransportError> {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<LiveEvent> {
        self.events.subscribe()
    }
}

/// Channel that records every message it is asked to send.
#[derive(Default)]
pub struct RecordingChannel {
    sent: Mutex<Vec<String>>,
    attempts: AtomicUsize,
    failing: AtomicBool,
}

impl RecordingChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Messages delivered successfully.
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    /// Send attempts, including failed ones.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    fn channel_type(&self) -> &'static str {
        "recording"
    }

    async fn send(&self, message: &str) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(live_notify::Error::notification("channel unavailable"));
        }
        self.sent.lock().push(message.to_string());
        Ok(())
    }
}

/// Key/value store that is always down.
pub struct BrokenStore;

#[async_trait]
impl KvStore for BrokenStore {
    async fn get(&self, _key: &str) -> Result<Option<Value>> {
        Err(live_notify::Error::Other("store unavailable".to_string()))
    }

    async fn set(&self, _key: &str, _value: Value) -> Result<()> {
        Err(live_notify::Error::Other("store unavailable".to_string()))
    }

    async fn set_many(&self, _entries: &[(&str, Value)]) -> Result<()> {
        Err(live_notify::Error::Other("store unavailable".to_string()))
    }

    async fn delete(&self, _key: &str) -> Result<bool> {
        Err(live_notify::Error::Other("store unavailable".to_string()))
    }

    async fn clear(&self) -> Result<()> {
        Err(live_notify::Error::Other("store unavailable".to_string()))
    }
}

/// In-memory store that fails a set number of reads or writes, then recovers.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryKvStore,
    failing_reads: AtomicUsize,
    failing_writes: AtomicUsize,
}

impl FlakyStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_reads(&self, count: usize) {
        self.failing_reads.store(count, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, count: usize) {
        self.failing_writes.store(count, Ordering::SeqCst);
    }

    fn take_failure(counter: &AtomicUsize) -> Result<()> {
        let failed = counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            Err(live_notify::Error::Other("store busy".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl KvStore for FlakyStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Self::take_failure(&self.failing_reads)?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        Self::take_failure(&self.failing_writes)?;
        self.inner.set(key, value).await
    }

    async fn set_many(&self, entries: &[(&str, Value)]) -> Result<()> {
        Self::take_failure(&self.failing_writes)?;
        self.inner.set_many(entries).await
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Self::take_failure(&self.failing_writes)?;
        self.inner.delete(key).await
    }

    async fn clear(&self) -> Result<()> {
        Self::take_failure(&self.failing_writes)?;
        self.inner.clear().await
    }
}

/// Clock moved by hand.
pub struct ManualClock(AtomicI64);

impl ManualClock {
    pub fn new(now: i64) -> Arc<Self> {
        Arc::new(Self(AtomicI64::new(now)))
    }

    pub fn set(&self, now: i64) {
        self.0.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: i64) {
        self.0.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

pub fn snapshot(viewers: u64, started_at: i64) -> RoomSnapshot {
    RoomSnapshot {
        room_id: "7000000000000000001".to_string(),
        viewer_count: viewers,
        broadcast_started_at: started_at,
        bio_text: Some("streaming most nights".to_string()),
        playback_url: Some("https://pull.example.com/stream/index.m3u8".to_string()),
    }
}

/// Everything a scenario needs, wired around one engine.
pub struct Harness {
    pub engine: StatusEngine,
    pub transport: Arc<ScriptedTransport>,
    pub channel: Arc<RecordingChannel>,
    pub store: Arc<MemoryKvStore>,
    pub dedup: DedupStore,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub fn new(transport: Arc<ScriptedTransport>, config: EngineConfig, now: i64) -> Self {
        Self::with_store(transport, config, now, Arc::new(MemoryKvStore::new()))
    }

    /// Build around an existing store, as after a process restart.
    pub fn with_store(
        transport: Arc<ScriptedTransport>,
        config: EngineConfig,
        now: i64,
        store: Arc<MemoryKvStore>,
    ) -> Self {
        let channel = RecordingChannel::new();
        let clock = ManualClock::new(now);
        let dedup = DedupStore::new(store.clone());
        let engine = StatusEngine::new(
            transport.clone(),
            channel.clone(),
            dedup.clone(),
            clock.clone(),
            config,
        );

        Self {
            engine,
            transport,
            channel,
            store,
            dedup,
            clock,
        }
    }
}

pub fn config(min_viewers: u64, min_update_interval: i64) -> EngineConfig {
    EngineConfig {
        min_viewers,
        min_update_interval,
        message: "Live now!\nCome watch".to_string(),
        ..EngineConfig::default()
    }
}
