use crate::gateway::protocol::GatewayEvent;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Max number of recent events to keep in the ring buffer for replay on
/// connect
const EVENT_BUFFER_SIZE: usize = 200;

/// Broadcasts events to all connected WebSocket clients.
///
/// Calling `broadcast()` is non-blocking: the event is handed to an internal
/// channel and a background tokio task handles buffering, cloning, and
/// per-client delivery so the caller (the orchestration loop) is never
/// stalled by a slow subscriber.
pub struct EventBroadcaster {
    /// Non-blocking event channel to the background task
    event_tx: mpsc::UnboundedSender<GatewayEvent>,
    /// Shared client map, used directly by subscribe/unsubscribe
    clients: Arc<DashMap<String, mpsc::Sender<GatewayEvent>>>,
    /// Ring buffer for replay on new connections
    recent_events: Arc<parking_lot::Mutex<VecDeque<GatewayEvent>>>,
}

impl EventBroadcaster {
    pub fn new() -> Self {
        let clients: Arc<DashMap<String, mpsc::Sender<GatewayEvent>>> = Arc::new(DashMap::new());
        let recent_events = Arc::new(parking_lot::Mutex::new(VecDeque::with_capacity(
            EVENT_BUFFER_SIZE,
        )));

        let (event_tx, event_rx) = mpsc::unbounded_channel();

        tokio::spawn(Self::run_loop(
            event_rx,
            clients.clone(),
            recent_events.clone(),
        ));

        Self {
            event_tx,
            clients,
            recent_events,
        }
    }

    /// Subscribe a new client and return (client_id, receiver)
    pub fn subscribe(&self) -> (String, mpsc::Receiver<GatewayEvent>) {
        let client_id = Uuid::new_v4().to_string();
        let (tx, rx) = mpsc::channel(1000);
        self.clients.insert(client_id.clone(), tx);
        log::debug!("Client {} subscribed to events", client_id);
        (client_id, rx)
    }

    /// Snapshot of recent events for replaying to newly connected clients
    pub fn get_recent_events(&self) -> Vec<GatewayEvent> {
        self.recent_events.lock().iter().cloned().collect()
    }

    /// Unsubscribe a client
    pub fn unsubscribe(&self, client_id: &str) {
        self.clients.remove(client_id);
        log::debug!("Client {} unsubscribed from events", client_id);
    }

    /// Queue an event for broadcast. Returns immediately; fan-out happens on
    /// the background task.
    pub fn broadcast(&self, event: GatewayEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Number of connected clients
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    // ── background task ──────────────────────────────────────────────

    async fn run_loop(
        mut event_rx: mpsc::UnboundedReceiver<GatewayEvent>,
        clients: Arc<DashMap<String, mpsc::Sender<GatewayEvent>>>,
        recent_events: Arc<parking_lot::Mutex<VecDeque<GatewayEvent>>>,
    ) {
        while let Some(event) = event_rx.recv().await {
            // Store in the ring buffer for replay
            {
                let mut buffer = recent_events.lock();
                if buffer.len() >= EVENT_BUFFER_SIZE {
                    buffer.pop_front();
                }
                buffer.push_back(event.clone());
            }

            let event_name = event.event.clone();

            // Tool activity is worth surfacing at info level
            if event_name == "agent.tool_call" || event_name == "tool.result" {
                log::info!("[BROADCAST] '{}' to {} client(s)", event_name, clients.len());
            }

            let mut failed_clients = Vec::new();

            for entry in clients.iter() {
                let client_id = entry.key().clone();
                match entry.value().try_send(event.clone()) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        log::warn!(
                            "[BROADCAST] Channel full for client {}, dropping '{}' event",
                            client_id,
                            event_name
                        );
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        failed_clients.push(client_id);
                    }
                }
            }

            // Clean up disconnected clients
            for client_id in failed_clients {
                clients.remove(&client_id);
                log::debug!("Removed disconnected client {}", client_id);
            }
        }

        log::info!("[BROADCASTER] Background broadcast loop shutting down");
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}
