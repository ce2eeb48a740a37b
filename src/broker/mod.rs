//! Embedded MQTT listener
//!
//! A deliberately small MQTT 3.1.1 endpoint: clients connect, publish stream
//! commands and subscribe to their response topics. Client publishes are
//! handed to the dispatcher, never forwarded to other clients, so private
//! keys in command topics are not fanned out. Outbound delivery is QoS 0 and
//! nothing is retained.

mod flood;
mod session;

use crate::config::BrokerConfig;
use crate::dispatcher::Dispatcher;
use crate::mqtt::{encode_publish, TopicMatcher};
use crate::transport::{OutboundMessage, Transport};

use anyhow::{Context, Result};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Routing entry for one connected client
struct SessionHandle {
    client_id: String,
    filters: Vec<String>,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
}

/// MQTT listener and response router
pub struct Broker {
    config: BrokerConfig,
    sessions: DashMap<u64, SessionHandle>,
    next_session_id: AtomicU64,
    topic_matcher: TopicMatcher,
}

impl Broker {
    pub fn new(config: &BrokerConfig) -> Self {
        Self {
            config: config.clone(),
            sessions: DashMap::new(),
            next_session_id: AtomicU64::new(1),
            topic_matcher: TopicMatcher::new(),
        }
    }

    /// Bind the configured address and serve until the listener fails
    pub async fn run(self: Arc<Self>, dispatcher: Arc<Dispatcher>) -> Result<()> {
        let address = format!("{}:{}", self.config.bind, self.config.port);
        let listener = TcpListener::bind(&address)
            .await
            .with_context(|| format!("Failed to bind MQTT listener on {address}"))?;

        info!(address = %address, "MQTT listener started");
        self.serve(listener, dispatcher).await
    }

    /// Accept connections from an already bound listener
    pub async fn serve(
        self: Arc<Self>,
        listener: TcpListener,
        dispatcher: Arc<Dispatcher>,
    ) -> Result<()> {
        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!(error = %e, "Failed to accept connection");
                    continue;
                }
            };

            debug!(peer = %peer, "Connection accepted");
            let broker = Arc::clone(&self);
            let dispatcher = Arc::clone(&dispatcher);

            tokio::spawn(async move {
                if let Err(e) = session::run(broker, dispatcher, stream, peer).await {
                    debug!(peer = %peer, error = %e, "Connection closed with error");
                }
            });
        }
    }

    /// Number of connected clients
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    fn config(&self) -> &BrokerConfig {
        &self.config
    }

    fn topic_matcher(&self) -> &TopicMatcher {
        &self.topic_matcher
    }

    fn register(&self, client_id: &str, outbound: mpsc::UnboundedSender<Vec<u8>>) -> u64 {
        let id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        self.sessions.insert(
            id,
            SessionHandle {
                client_id: client_id.to_string(),
                filters: Vec::new(),
                outbound,
            },
        );
        id
    }

    fn unregister(&self, id: u64) {
        if let Some((_, handle)) = self.sessions.remove(&id) {
            debug!(client_id = %handle.client_id, "Session removed");
        }
    }

    fn subscribe(&self, id: u64, filters: &[String]) {
        if let Some(mut handle) = self.sessions.get_mut(&id) {
            for filter in filters {
                if !handle.filters.contains(filter) {
                    handle.filters.push(filter.clone());
                }
            }
        }
    }

    fn unsubscribe(&self, id: u64, filters: &[String]) {
        if let Some(mut handle) = self.sessions.get_mut(&id) {
            handle.filters.retain(|f| !filters.contains(f));
        }
    }
}

impl Transport for Broker {
    fn publish(&self, message: OutboundMessage) {
        let frame = match encode_publish(&message.topic, &message.payload) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(topic = %message.topic, error = %e, "Failed to encode response");
                return;
            }
        };

        let mut delivered = 0usize;
        for handle in self.sessions.iter() {
            let subscribed = handle
                .filters
                .iter()
                .any(|filter| self.topic_matcher.matches(&message.topic, filter));

            if subscribed && handle.outbound.send(frame.clone()).is_ok() {
                delivered += 1;
            }
        }

        debug!(topic = %message.topic, delivered, "Response published");
    }
}
