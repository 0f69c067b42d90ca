//! Hub: connection registry, room fan-out and the dispatch loop.
//!
//! [`Hub`] is generic over the transport connection type. One dispatch loop
//! per hub is the only writer of the connection registry; registrations,
//! unregistrations and full broadcasts reach it through channels. Room
//! broadcasts, room membership and connection counts go straight to the
//! identifier index and [`RoomIndex`], which carry their own locks.
//!
//! # Lock order
//!
//! The identifier index is always locked before the room index. Unregistering
//! holds the index write lock while leaving every room, and joining holds the
//! index read lock while adding to a room, so a join can never re-add a
//! connection that is concurrently being unregistered.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{RwLock, mpsc, oneshot};
use tokio::task::JoinHandle;

use super::client::Client;
use super::lifecycle::{HubState, Lifecycle};
use super::rooms::RoomIndex;
use super::{ConnId, ConnectionEvent, EventBus};
use crate::config::HubConfig;
use crate::error::RealtimeError;

/// A registration request; `ack` fires once the connection is indexed.
#[derive(Debug)]
struct Registration<C> {
    conn: Arc<C>,
    ack: oneshot::Sender<()>,
}

/// Receiving halves of the dispatch channels, taken by the loop on start.
#[derive(Debug)]
struct Inbox<C: Client> {
    register: mpsc::Receiver<Registration<C>>,
    unregister: mpsc::UnboundedReceiver<Arc<C>>,
    broadcast: mpsc::Receiver<C::Payload>,
}

#[derive(Debug)]
struct Shared<C: Client> {
    lifecycle: Lifecycle,
    rooms: RoomIndex,
    index: RwLock<HashMap<ConnId, Arc<C>>>,
    register_tx: mpsc::Sender<Registration<C>>,
    unregister_tx: mpsc::UnboundedSender<Arc<C>>,
    broadcast_tx: mpsc::Sender<C::Payload>,
    inbox: parking_lot::Mutex<Option<Inbox<C>>>,
    config: HubConfig,
    events: EventBus,
}

/// Central registry and dispatcher for one class of realtime connections.
///
/// Cheap to clone; every clone refers to the same hub. Independent hubs
/// share no state.
#[derive(Debug)]
pub struct Hub<C: Client> {
    shared: Arc<Shared<C>>,
}

impl<C: Client> Clone for Hub<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<C: Client> Hub<C> {
    /// Creates an idle hub. Start it with [`Hub::spawn`] or [`Hub::run`].
    #[must_use]
    pub fn new(config: HubConfig, events: EventBus) -> Self {
        let capacity = config.buffer_size.max(1);
        let (register_tx, register) = mpsc::channel(capacity);
        let (unregister_tx, unregister) = mpsc::unbounded_channel();
        let (broadcast_tx, broadcast) = mpsc::channel(capacity);

        Self {
            shared: Arc::new(Shared {
                lifecycle: Lifecycle::new(),
                rooms: RoomIndex::new(),
                index: RwLock::new(HashMap::new()),
                register_tx,
                unregister_tx,
                broadcast_tx,
                inbox: parking_lot::Mutex::new(Some(Inbox {
                    register,
                    unregister,
                    broadcast,
                })),
                config,
                events,
            }),
        }
    }

    /// Spawns the dispatch loop on the current tokio runtime.
    pub fn spawn(&self) -> JoinHandle<Result<(), RealtimeError>> {
        let hub = self.clone();
        tokio::spawn(async move { hub.run().await })
    }

    /// Runs the dispatch loop until shutdown is requested and the drain is
    /// complete.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::HubAlreadyStarted`] if the loop was already
    /// started, or if the hub was shut down before it ever ran.
    pub async fn run(&self) -> Result<(), RealtimeError> {
        let shared = &self.shared;
        shared.lifecycle.start()?;
        let Some(mut inbox) = shared.inbox.lock().take() else {
            shared.lifecycle.mark_stopped();
            return Err(RealtimeError::Internal(
                "dispatch channels already taken".to_string(),
            ));
        };

        let transport = C::TRANSPORT;
        tracing::info!(?transport, "hub dispatch loop started");

        let mut registry: HashMap<ConnId, Arc<C>> = HashMap::new();

        loop {
            tokio::select! {
                () = shared.lifecycle.draining() => break,
                Some(registration) = inbox.register.recv() => {
                    self.register_conn(&mut registry, registration).await;
                }
                Some(conn) = inbox.unregister.recv() => {
                    self.unregister_conn(&mut registry, conn).await;
                }
                Some(payload) = inbox.broadcast.recv() => {
                    self.broadcast_to_all(&registry, &payload);
                }
                else => break,
            }
        }

        let closed = self.close_all(&mut registry).await;
        Self::drain_inbox(&mut inbox);

        tracing::info!(?transport, closed, "hub dispatch loop stopped");
        shared.events.publish(ConnectionEvent::HubStopped {
            transport,
            closed_connections: closed,
            timestamp: chrono::Utc::now(),
        });
        shared.lifecycle.mark_stopped();
        Ok(())
    }

    /// Registers `conn` and waits until the dispatch loop has indexed it.
    ///
    /// Once this returns `Ok`, [`Hub::join_room`] observes the connection.
    /// On a hub whose loop has not started yet, waits for it to start. A
    /// refused connection is closed.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::HubNotRunning`] if the hub is draining or
    /// stopped.
    pub async fn register(&self, conn: Arc<C>) -> Result<(), RealtimeError> {
        if self.state() >= HubState::Draining {
            conn.close();
            return Err(RealtimeError::HubNotRunning);
        }

        let (ack, acked) = oneshot::channel();
        let registration = Registration {
            conn: Arc::clone(&conn),
            ack,
        };
        if self.shared.register_tx.send(registration).await.is_err() {
            conn.close();
            return Err(RealtimeError::HubNotRunning);
        }
        acked.await.map_err(|_| RealtimeError::HubNotRunning)
    }

    /// Schedules `conn` for removal from the registry, the identifier index
    /// and every room. The connection is always closed.
    ///
    /// Never blocks: the request goes through an unbounded queue, so it is
    /// safe to call from a broadcast loop or a transport task.
    pub fn unregister(&self, conn: Arc<C>) {
        if let Err(rejected) = self.shared.unregister_tx.send(conn) {
            rejected.0.close();
        }
    }

    /// Queues `payload` for delivery to every connection registered when the
    /// dispatch loop processes it.
    ///
    /// Per-recipient failures are not reported; failing connections are
    /// evicted.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::HubNotRunning`] if the dispatch loop no
    /// longer accepts broadcasts.
    pub async fn broadcast(&self, payload: C::Payload) -> Result<(), RealtimeError> {
        if self.state() >= HubState::Draining {
            return Err(RealtimeError::HubNotRunning);
        }
        self.shared
            .broadcast_tx
            .send(payload)
            .await
            .map_err(|_| RealtimeError::HubNotRunning)
    }

    /// Delivers `payload` to every current member of `room`, bypassing the
    /// dispatch loop.
    ///
    /// Returns the number of members the payload was enqueued for. Failing
    /// members are evicted exactly as in [`Hub::broadcast`].
    pub async fn broadcast_to_room(&self, room: &str, payload: &C::Payload) -> usize {
        let members = self.shared.rooms.members(room).await;
        if members.is_empty() {
            return 0;
        }

        let index = self.shared.index.read().await;
        let mut delivered = 0;
        for conn in members.iter().filter_map(|id| index.get(id)) {
            if self.deliver_or_evict(conn, payload) {
                delivered += 1;
            }
        }
        delivered
    }

    /// Adds a registered connection to `room`.
    ///
    /// Returns `false` (and changes nothing) if the connection is not
    /// currently registered.
    pub async fn join_room(&self, conn: &C, room: &str) -> bool {
        let id = conn.id();
        let index = self.shared.index.read().await;
        if !index.contains_key(&id) {
            return false;
        }
        self.shared.rooms.join(id, room).await;
        tracing::debug!(conn_id = %id, room, "joined room");
        true
    }

    /// Removes a connection from `room`. Returns `false` if it was not a
    /// member.
    pub async fn leave_room(&self, conn: &C, room: &str) -> bool {
        let left = self.shared.rooms.leave(conn.id(), room).await;
        if left {
            tracing::debug!(conn_id = %conn.id(), room, "left room");
        }
        left
    }

    /// Returns the number of connections in `room`.
    pub async fn room_count(&self, room: &str) -> usize {
        self.shared.rooms.count(room).await
    }

    /// Returns the names of all non-empty rooms.
    pub async fn rooms(&self) -> Vec<String> {
        self.shared.rooms.names().await
    }

    /// Returns the number of registered connections.
    pub async fn connection_count(&self) -> usize {
        self.shared.index.read().await.len()
    }

    /// Looks up a registered connection by identifier.
    pub async fn connection(&self, id: ConnId) -> Option<Arc<C>> {
        self.shared.index.read().await.get(&id).map(Arc::clone)
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub fn state(&self) -> HubState {
        self.shared.lifecycle.state()
    }

    /// Returns `true` while the dispatch loop is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shared.lifecycle.is_running()
    }

    /// Returns the configuration this hub was built with.
    #[must_use]
    pub fn config(&self) -> &HubConfig {
        &self.shared.config
    }

    /// Returns the lifecycle event bus.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.shared.events
    }

    /// Requests a graceful shutdown and waits up to `deadline` for the
    /// dispatch loop to notify and close every client.
    ///
    /// Safe to call repeatedly and concurrently.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::ShutdownTimeout`] if draining did not finish
    /// in time; draining continues in the background.
    pub async fn shutdown(&self, deadline: Duration) -> Result<(), RealtimeError> {
        let result = self.shared.lifecycle.shutdown(deadline).await;
        // A hub stopped before it ever ran still holds its inbox.
        if self.state() == HubState::Stopped {
            let unused = self.shared.inbox.lock().take();
            if let Some(mut inbox) = unused {
                Self::drain_inbox(&mut inbox);
            }
        }
        result
    }

    /// Resolves once the dispatch loop has stopped.
    pub async fn stopped(&self) {
        self.shared.lifecycle.stopped().await;
    }

    async fn register_conn(
        &self,
        registry: &mut HashMap<ConnId, Arc<C>>,
        registration: Registration<C>,
    ) {
        let Registration { conn, ack } = registration;
        let id = conn.id();
        self.shared.index.write().await.insert(id, Arc::clone(&conn));
        registry.insert(id, Arc::clone(&conn));
        if ack.send(()).is_err() {
            // The caller gave up waiting; nobody owns this connection.
            registry.remove(&id);
            self.shared.index.write().await.remove(&id);
            conn.close();
            tracing::debug!(conn_id = %id, "registration abandoned, connection dropped");
            return;
        }
        tracing::debug!(conn_id = %id, total = registry.len(), "connection registered");
    }

    async fn unregister_conn(&self, registry: &mut HashMap<ConnId, Arc<C>>, conn: Arc<C>) {
        let id = conn.id();
        if registry.remove(&id).is_some() {
            let mut index = self.shared.index.write().await;
            index.remove(&id);
            let rooms_left = self.shared.rooms.leave_all(id).await;
            drop(index);
            tracing::debug!(
                conn_id = %id,
                rooms_left,
                total = registry.len(),
                "connection unregistered"
            );
        }
        conn.close();
    }

    fn broadcast_to_all(&self, registry: &HashMap<ConnId, Arc<C>>, payload: &C::Payload) {
        for conn in registry.values() {
            self.deliver_or_evict(conn, payload);
        }
    }

    /// Enqueues `payload` on `conn`; on failure schedules its eviction.
    fn deliver_or_evict(&self, conn: &Arc<C>, payload: &C::Payload) -> bool {
        match conn.deliver(payload) {
            Ok(()) => true,
            Err(RealtimeError::ConnectionClosed) => {
                tracing::debug!(conn_id = %conn.id(), "delivery to closed connection, evicting");
                self.unregister(Arc::clone(conn));
                false
            }
            Err(e) => {
                tracing::warn!(conn_id = %conn.id(), error = %e, "delivery failed, evicting");
                self.unregister(Arc::clone(conn));
                false
            }
        }
    }

    /// Notifies and closes every registered connection, then clears the
    /// identifier index and all rooms.
    async fn close_all(&self, registry: &mut HashMap<ConnId, Arc<C>>) -> usize {
        let count = registry.len();
        for (_, conn) in registry.drain() {
            conn.farewell();
            conn.close();
        }
        self.shared.index.write().await.clear();
        self.shared.rooms.clear().await;
        count
    }

    /// Processes whatever was already buffered when the loop stopped, once.
    /// Late registrations are refused and closed; broadcasts are dropped.
    fn drain_inbox(inbox: &mut Inbox<C>) {
        inbox.register.close();
        inbox.unregister.close();
        inbox.broadcast.close();

        while let Ok(Registration { conn, .. }) = inbox.register.try_recv() {
            conn.farewell();
            conn.close();
        }
        while let Ok(conn) = inbox.unregister.try_recv() {
            conn.close();
        }
        while inbox.broadcast.try_recv().is_ok() {}
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::sync::mpsc::error::TrySendError;
    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::hub::Transport;

    /// In-memory client with a bounded queue, standing in for a transport.
    #[derive(Debug)]
    struct TestClient {
        id: ConnId,
        queue: parking_lot::Mutex<Option<mpsc::Sender<String>>>,
        capacity: usize,
        farewells: AtomicUsize,
        closes: AtomicUsize,
    }

    impl TestClient {
        fn new(capacity: usize) -> (Arc<Self>, mpsc::Receiver<String>) {
            let (tx, rx) = mpsc::channel(capacity);
            let client = Arc::new(Self {
                id: ConnId::new(),
                queue: parking_lot::Mutex::new(Some(tx)),
                capacity,
                farewells: AtomicUsize::new(0),
                closes: AtomicUsize::new(0),
            });
            (client, rx)
        }
    }

    impl Client for TestClient {
        type Payload = String;
        const TRANSPORT: Transport = Transport::WebSocket;

        fn id(&self) -> ConnId {
            self.id
        }

        fn deliver(&self, payload: &String) -> Result<(), RealtimeError> {
            let guard = self.queue.lock();
            let Some(tx) = guard.as_ref() else {
                return Err(RealtimeError::ConnectionClosed);
            };
            tx.try_send(payload.clone()).map_err(|e| match e {
                TrySendError::Full(_) => RealtimeError::Backpressure {
                    capacity: self.capacity,
                },
                TrySendError::Closed(_) => RealtimeError::ConnectionClosed,
            })
        }

        fn farewell(&self) {
            if self.deliver(&"bye".to_string()).is_ok() {
                self.farewells.fetch_add(1, Ordering::SeqCst);
            }
        }

        fn close(&self) -> bool {
            let closed = self.queue.lock().take().is_some();
            if closed {
                self.closes.fetch_add(1, Ordering::SeqCst);
            }
            closed
        }

        fn is_closed(&self) -> bool {
            self.queue.lock().is_none()
        }
    }

    fn start_hub() -> Hub<TestClient> {
        let hub = Hub::new(HubConfig::default(), EventBus::new(64));
        let _loop = hub.spawn();
        hub
    }

    /// Waits until the hub reports `expected` connections.
    async fn wait_for_connections(hub: &Hub<TestClient>, expected: usize) {
        for _ in 0..200 {
            if hub.connection_count().await == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("hub never reached {expected} connections");
    }

    async fn wait_closed(client: &TestClient) {
        for _ in 0..200 {
            if client.is_closed() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("client {} was never closed", client.id());
    }

    async fn recv(rx: &mut mpsc::Receiver<String>) -> Option<String> {
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .ok()
            .flatten()
    }

    async fn assert_consistent(hub: &Hub<TestClient>) {
        let index = hub.shared.index.read().await;
        let ids: HashSet<ConnId> = index.keys().copied().collect();
        for member in hub.shared.rooms.all_members().await {
            assert!(ids.contains(&member), "room member {member} not indexed");
        }
    }

    #[tokio::test]
    async fn broadcast_reaches_every_registered_client_once() {
        let hub = start_hub();
        let mut receivers = Vec::new();
        for _ in 0..5 {
            let (client, rx) = TestClient::new(8);
            assert_ok!(hub.register(client).await);
            receivers.push(rx);
        }

        assert_ok!(hub.broadcast("hello".to_string()).await);

        for rx in &mut receivers {
            assert_eq!(recv(rx).await.as_deref(), Some("hello"));
        }
        tokio::task::yield_now().await;
        for rx in &mut receivers {
            assert!(rx.try_recv().is_err());
        }
    }

    #[tokio::test]
    async fn unregistered_client_misses_later_broadcasts() {
        let hub = start_hub();
        let (a, mut rx_a) = TestClient::new(8);
        let (b, mut rx_b) = TestClient::new(8);
        let (c, mut rx_c) = TestClient::new(8);
        for client in [&a, &b, &c] {
            assert_ok!(hub.register(Arc::clone(client)).await);
        }

        assert_ok!(hub.broadcast("hello".to_string()).await);
        for rx in [&mut rx_a, &mut rx_b, &mut rx_c] {
            assert_eq!(recv(rx).await.as_deref(), Some("hello"));
        }

        hub.unregister(Arc::clone(&c));
        wait_for_connections(&hub, 2).await;
        assert!(c.is_closed());

        assert_ok!(hub.broadcast("world".to_string()).await);
        assert_eq!(recv(&mut rx_a).await.as_deref(), Some("world"));
        assert_eq!(recv(&mut rx_b).await.as_deref(), Some("world"));
        assert_eq!(recv(&mut rx_c).await, None);
    }

    #[tokio::test]
    async fn room_broadcast_only_reaches_current_members() {
        let hub = start_hub();
        let (a, mut rx_a) = TestClient::new(8);
        let (b, mut rx_b) = TestClient::new(8);
        let (outsider, mut rx_out) = TestClient::new(8);
        for client in [&a, &b, &outsider] {
            assert_ok!(hub.register(Arc::clone(client)).await);
        }

        assert!(hub.join_room(&a, "lobby").await);
        assert!(hub.join_room(&b, "lobby").await);
        assert!(hub.join_room(&outsider, "kitchen").await);
        assert!(hub.leave_room(&a, "lobby").await);

        let delivered = hub.broadcast_to_room("lobby", &"x".to_string()).await;
        assert_eq!(delivered, 1);
        assert_eq!(recv(&mut rx_b).await.as_deref(), Some("x"));
        assert!(rx_a.try_recv().is_err());
        assert!(rx_out.try_recv().is_err());
    }

    #[tokio::test]
    async fn join_requires_registration() {
        let hub = start_hub();
        let (stranger, _rx) = TestClient::new(1);
        assert!(!hub.join_room(&stranger, "lobby").await);
        assert_eq!(hub.room_count("lobby").await, 0);
    }

    #[tokio::test]
    async fn unregister_removes_client_from_every_room() {
        let hub = start_hub();
        let (a, _rx_a) = TestClient::new(4);
        let (b, _rx_b) = TestClient::new(4);
        assert_ok!(hub.register(Arc::clone(&a)).await);
        assert_ok!(hub.register(Arc::clone(&b)).await);
        for room in ["red", "green", "blue"] {
            assert!(hub.join_room(&a, room).await);
        }
        assert!(hub.join_room(&b, "blue").await);

        hub.unregister(Arc::clone(&a));
        wait_for_connections(&hub, 1).await;

        assert_eq!(hub.rooms().await, vec!["blue".to_string()]);
        assert_eq!(hub.room_count("blue").await, 1);
        assert_consistent(&hub).await;
    }

    #[tokio::test]
    async fn registry_and_rooms_stay_consistent_under_churn() {
        let hub = start_hub();
        let mut tasks = Vec::new();
        for i in 0..32 {
            let hub = hub.clone();
            tasks.push(tokio::spawn(async move {
                let (client, _rx) = TestClient::new(4);
                if hub.register(Arc::clone(&client)).await.is_err() {
                    return;
                }
                let room = format!("room-{}", i % 4);
                hub.join_room(&client, &room).await;
                if i % 2 == 0 {
                    hub.unregister(Arc::clone(&client));
                    // Racing join after unregister must not leave a stale member.
                    hub.join_room(&client, &room).await;
                }
            }));
        }
        for task in tasks {
            assert!(task.await.is_ok());
        }

        wait_for_connections(&hub, 16).await;
        assert_consistent(&hub).await;
    }

    #[tokio::test]
    async fn full_queue_evicts_and_never_blocks() {
        let hub = start_hub();
        let (slow, mut rx_slow) = TestClient::new(2);
        let (fast, mut rx_fast) = TestClient::new(8);
        assert_ok!(hub.register(Arc::clone(&slow)).await);
        assert_ok!(hub.register(Arc::clone(&fast)).await);

        for n in 0..3 {
            assert_ok!(hub.broadcast(format!("m{n}")).await);
        }

        wait_closed(&slow).await;
        wait_for_connections(&hub, 1).await;

        assert_eq!(recv(&mut rx_slow).await.as_deref(), Some("m0"));
        assert_eq!(recv(&mut rx_slow).await.as_deref(), Some("m1"));
        assert_eq!(recv(&mut rx_slow).await, None);

        for n in 0..3 {
            assert_eq!(recv(&mut rx_fast).await, Some(format!("m{n}")));
        }
        assert!(!fast.is_closed());
    }

    #[tokio::test]
    async fn room_broadcast_evicts_overflowing_member() {
        let hub = start_hub();
        let (member, _rx) = TestClient::new(1);
        assert_ok!(hub.register(Arc::clone(&member)).await);
        assert!(hub.join_room(&member, "lobby").await);

        assert_eq!(hub.broadcast_to_room("lobby", &"one".to_string()).await, 1);
        assert_eq!(hub.broadcast_to_room("lobby", &"two".to_string()).await, 0);

        wait_for_connections(&hub, 0).await;
        assert!(member.is_closed());
        assert_eq!(hub.room_count("lobby").await, 0);
    }

    #[tokio::test]
    async fn graceful_shutdown_notifies_then_closes_everyone() {
        let hub = start_hub();
        let mut clients = Vec::new();
        for _ in 0..3 {
            let (client, rx) = TestClient::new(4);
            assert_ok!(hub.register(Arc::clone(&client)).await);
            assert!(hub.join_room(&client, "lobby").await);
            clients.push((client, rx));
        }

        assert_ok!(hub.shutdown(Duration::from_secs(5)).await);
        assert_eq!(hub.state(), HubState::Stopped);
        assert_eq!(hub.connection_count().await, 0);
        assert!(hub.rooms().await.is_empty());

        for (client, rx) in &mut clients {
            assert_eq!(client.farewells.load(Ordering::SeqCst), 1);
            assert_eq!(client.closes.load(Ordering::SeqCst), 1);
            assert_eq!(recv(rx).await.as_deref(), Some("bye"));
        }
    }

    #[tokio::test]
    async fn elapsed_deadline_times_out_but_drain_completes() {
        let hub = start_hub();
        let (client, _rx) = TestClient::new(4);
        assert_ok!(hub.register(Arc::clone(&client)).await);

        let result = hub.shutdown(Duration::ZERO).await;
        assert!(matches!(result, Err(RealtimeError::ShutdownTimeout { .. })));

        hub.stopped().await;
        assert!(client.is_closed());
        assert_ok!(hub.shutdown(Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn hub_refuses_work_after_shutdown() {
        let hub = start_hub();
        assert_ok!(hub.shutdown(Duration::from_secs(1)).await);

        let (late, _rx) = TestClient::new(1);
        assert_err!(hub.register(Arc::clone(&late)).await);
        assert!(late.is_closed());
        assert_err!(hub.broadcast("nope".to_string()).await);

        let (other, _rx) = TestClient::new(1);
        hub.unregister(Arc::clone(&other));
        assert!(other.is_closed());
    }

    #[tokio::test]
    async fn run_twice_is_rejected() {
        let hub: Hub<TestClient> = Hub::new(HubConfig::default(), EventBus::new(4));
        let first = hub.spawn();
        while !hub.is_running() {
            tokio::task::yield_now().await;
        }
        assert!(matches!(hub.run().await, Err(RealtimeError::HubAlreadyStarted)));

        assert_ok!(hub.shutdown(Duration::from_secs(1)).await);
        assert!(matches!(first.await, Ok(Ok(()))));
    }

    #[tokio::test]
    async fn abandoned_registration_is_rolled_back() {
        let hub: Hub<TestClient> = Hub::new(HubConfig::default(), EventBus::new(4));
        let (client, _rx) = TestClient::new(1);
        let attempt =
            tokio::time::timeout(Duration::ZERO, hub.register(Arc::clone(&client))).await;
        assert!(attempt.is_err());

        let loop_handle = hub.spawn();
        wait_closed(&client).await;
        wait_for_connections(&hub, 0).await;
        assert_eq!(client.closes.load(Ordering::SeqCst), 1);
        assert_consistent(&hub).await;

        assert_ok!(hub.shutdown(Duration::from_secs(1)).await);
        assert!(matches!(loop_handle.await, Ok(Ok(()))));
    }

    #[tokio::test]
    async fn shutdown_before_start_releases_pending_registrations() {
        let hub: Hub<TestClient> = Hub::new(HubConfig::default(), EventBus::new(4));
        let (client, _rx) = TestClient::new(1);
        let pending = {
            let hub = hub.clone();
            let client = Arc::clone(&client);
            tokio::spawn(async move { hub.register(client).await })
        };
        tokio::task::yield_now().await;

        assert_ok!(hub.shutdown(Duration::from_secs(1)).await);
        let Ok(Ok(result)) = tokio::time::timeout(Duration::from_secs(1), pending).await else {
            panic!("pending registration never resolved");
        };
        assert_err!(result);
        assert!(client.is_closed());
        assert!(matches!(hub.run().await, Err(RealtimeError::HubAlreadyStarted)));
    }

    #[tokio::test]
    async fn hub_stop_is_published() {
        let events = EventBus::new(8);
        let mut rx = events.subscribe();
        let hub: Hub<TestClient> = Hub::new(HubConfig::default(), events);
        let _loop = hub.spawn();
        let (client, _client_rx) = TestClient::new(1);
        assert_ok!(hub.register(client).await);
        assert_ok!(hub.shutdown(Duration::from_secs(1)).await);

        let Ok(ConnectionEvent::HubStopped {
            closed_connections, ..
        }) = rx.recv().await
        else {
            panic!("expected hub stop event");
        };
        assert_eq!(closed_connections, 1);
    }

    #[tokio::test]
    async fn independent_hubs_do_not_share_clients() {
        let first = start_hub();
        let second = start_hub();
        let (client, mut rx) = TestClient::new(4);
        assert_ok!(first.register(Arc::clone(&client)).await);

        assert_ok!(second.broadcast("other".to_string()).await);
        assert_ok!(first.broadcast("mine".to_string()).await);

        assert_eq!(recv(&mut rx).await.as_deref(), Some("mine"));
        assert_eq!(second.connection_count().await, 0);
    }
}
