//! One client connection

use super::flood::FloodGuard;
use super::Broker;
use crate::dispatcher::Dispatcher;
use crate::error::PacketError;
use crate::mqtt::{
    encode_connack, encode_pingresp, encode_puback, encode_pubcomp, encode_pubrec, encode_suback,
    encode_unsuback, frame_length, parse_packet, MqttPacket, ParsedPublish,
};
use crate::transport::{InboundMessage, OutboundMessage, Transport};

use anyhow::{anyhow, Result};
use mqttrs::Pid;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const READ_CHUNK: usize = 4096;

/// Serve one connection until the client disconnects or misbehaves
pub(super) async fn run(
    broker: Arc<Broker>,
    dispatcher: Arc<Dispatcher>,
    stream: TcpStream,
    peer: SocketAddr,
) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Vec<u8>>();

    let writer_task = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            if writer.write_all(&frame).await.is_err() {
                break;
            }
        }
    });

    let mut session = Session {
        id: None,
        peer,
        awaiting_release: Vec::new(),
        flood: FloodGuard::new(broker.config()),
        broker,
        dispatcher,
        outbound,
    };

    let result = session.read_loop(reader).await;

    if let Some(id) = session.id {
        session.broker.unregister(id);
    }
    // Closing the last sender lets the writer drain and stop
    drop(session);
    let _ = writer_task.await;

    result
}

struct Session {
    /// Set once CONNECT has been accepted
    id: Option<u64>,
    peer: SocketAddr,
    /// QoS 2 packet ids acknowledged with PUBREC but not yet released
    awaiting_release: Vec<Pid>,
    flood: Option<FloodGuard>,
    broker: Arc<Broker>,
    dispatcher: Arc<Dispatcher>,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
}

impl Session {
    async fn read_loop(&mut self, mut reader: OwnedReadHalf) -> Result<()> {
        let max_packet_size = self.broker.config().max_packet_size;
        let mut buf = Vec::with_capacity(READ_CHUNK);
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            while let Some(len) = frame_length(&buf)? {
                if len > max_packet_size {
                    return Err(PacketError::TooLarge {
                        size: len,
                        limit: max_packet_size,
                    }
                    .into());
                }
                if buf.len() < len {
                    break;
                }

                let frame: Vec<u8> = buf.drain(..len).collect();
                if !self.on_packet(parse_packet(&frame)?)? {
                    return Ok(());
                }
            }

            let n = reader.read(&mut chunk).await?;
            if n == 0 {
                debug!(peer = %self.peer, "Client closed connection");
                return Ok(());
            }
            buf.extend_from_slice(&chunk[..n]);
        }
    }

    fn send(&self, frame: Result<Vec<u8>, PacketError>) -> Result<()> {
        self.outbound
            .send(frame?)
            .map_err(|_| anyhow!("connection writer closed"))
    }

    /// Returns `false` when the connection should close
    fn on_packet(&mut self, packet: MqttPacket) -> Result<bool> {
        let Some(id) = self.id else {
            return match packet {
                MqttPacket::Connect(connect) => {
                    info!(
                        client_id = %connect.client_id,
                        peer = %self.peer,
                        protocol_version = connect.protocol_version,
                        keep_alive = connect.keep_alive,
                        clean_session = connect.clean_session,
                        username = ?connect.username,
                        "MQTT CONNECT"
                    );
                    self.id = Some(self.broker.register(&connect.client_id, self.outbound.clone()));
                    self.send(encode_connack())?;
                    Ok(true)
                }
                other => {
                    warn!(peer = %self.peer, packet = ?other, "Packet before CONNECT");
                    Ok(false)
                }
            };
        };

        match packet {
            MqttPacket::Connect(_) => {
                warn!(peer = %self.peer, "Second CONNECT on one connection");
                Ok(false)
            }
            MqttPacket::Publish(publish) => self.on_publish(publish),
            MqttPacket::Pubrel(pid) => {
                self.awaiting_release.retain(|p| *p != pid);
                self.send(encode_pubcomp(pid))?;
                Ok(true)
            }
            MqttPacket::Subscribe(subscribe) => {
                let matcher = self.broker.topic_matcher();
                let accepted: Vec<bool> = subscribe
                    .topic_filters
                    .iter()
                    .map(|f| matcher.is_valid_filter(f))
                    .collect();
                let filters: Vec<String> = subscribe
                    .topic_filters
                    .into_iter()
                    .zip(&accepted)
                    .filter_map(|(f, ok)| ok.then_some(f))
                    .collect();

                debug!(peer = %self.peer, filters = ?filters, "MQTT SUBSCRIBE");
                self.broker.subscribe(id, &filters);
                self.send(encode_suback(subscribe.packet_id, &accepted))?;
                Ok(true)
            }
            MqttPacket::Unsubscribe(unsubscribe) => {
                self.broker.unsubscribe(id, &unsubscribe.topics);
                self.send(encode_unsuback(unsubscribe.packet_id))?;
                Ok(true)
            }
            MqttPacket::PingReq => {
                self.send(encode_pingresp())?;
                Ok(true)
            }
            MqttPacket::Disconnect => {
                debug!(peer = %self.peer, "MQTT DISCONNECT");
                Ok(false)
            }
            MqttPacket::Other(kind) => {
                debug!(peer = %self.peer, packet = kind.as_str(), "Ignoring broker-bound packet");
                Ok(true)
            }
        }
    }

    fn on_publish(&mut self, publish: ParsedPublish) -> Result<bool> {
        if !self.broker.topic_matcher().is_valid_topic(&publish.topic) {
            warn!(peer = %self.peer, topic = %publish.topic, "Invalid PUBLISH topic");
            return Ok(false);
        }

        // Acked before the flood guard
        match (publish.qos, publish.packet_id) {
            (1, Some(pid)) => self.send(encode_puback(pid))?,
            (2, Some(pid)) => {
                self.send(encode_pubrec(pid))?;
                // Retransmission of a message already dispatched
                if self.awaiting_release.contains(&pid) {
                    debug!(peer = %self.peer, topic = %publish.topic, "Duplicate QoS 2 PUBLISH");
                    return Ok(true);
                }
                self.awaiting_release.push(pid);
            }
            _ => {}
        }

        if self.flood.as_ref().is_some_and(|guard| !guard.allow()) {
            info!(peer = %self.peer, topic = %publish.topic, "PUBLISH dropped by flood guard");
            return Ok(true);
        }

        if publish.retain {
            debug!(topic = %publish.topic, "Retain flag ignored");
        }

        if !self.dispatcher.owns_topic(&publish.topic) {
            self.broker.publish(OutboundMessage {
                topic: publish.topic,
                payload: publish.payload,
                qos: 0,
                retain: false,
            });
            return Ok(true);
        }

        let dispatcher = Arc::clone(&self.dispatcher);
        let message = InboundMessage::new(publish.topic, publish.payload);
        tokio::spawn(async move {
            dispatcher.handle(message).await;
        });

        Ok(true)
    }
}
