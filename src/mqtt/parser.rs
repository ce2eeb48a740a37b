//! MQTT packet codec
//!
//! Wraps the mqttrs crate: frames packets out of a TCP byte stream, parses
//! the packets a client sends and encodes the ones the broker answers with.

use crate::error::PacketError;
use mqttrs::{
    decode_slice, encode_slice, Connack, ConnectReturnCode, Packet, Pid, Protocol, Publish,
    QoS, QosPid, Suback, SubscribeReturnCodes,
};

/// Parsed client packet with the fields the broker acts on
#[derive(Debug, Clone)]
pub enum MqttPacket {
    Connect(ParsedConnect),
    Publish(ParsedPublish),
    Pubrel(Pid),
    Subscribe(ParsedSubscribe),
    Unsubscribe(ParsedUnsubscribe),
    PingReq,
    Disconnect,
    Other(MqttPacketType),
}

/// MQTT packet type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MqttPacketType {
    Connack,
    Puback,
    Pubrec,
    Pubcomp,
    Suback,
    Unsuback,
    Pingresp,
}

impl MqttPacketType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connack => "CONNACK",
            Self::Puback => "PUBACK",
            Self::Pubrec => "PUBREC",
            Self::Pubcomp => "PUBCOMP",
            Self::Suback => "SUBACK",
            Self::Unsuback => "UNSUBACK",
            Self::Pingresp => "PINGRESP",
        }
    }
}

/// Parsed CONNECT packet
#[derive(Debug, Clone)]
pub struct ParsedConnect {
    /// Protocol version (3 = 3.1, 4 = 3.1.1)
    pub protocol_version: u8,
    pub client_id: String,
    pub clean_session: bool,
    pub keep_alive: u16,
    pub username: Option<String>,
}

/// Parsed PUBLISH packet
#[derive(Debug, Clone)]
pub struct ParsedPublish {
    pub topic: String,
    pub payload: Vec<u8>,
    /// QoS level (0, 1, or 2)
    pub qos: u8,
    pub retain: bool,
    /// Packet identifier (for QoS > 0)
    pub packet_id: Option<Pid>,
}

/// Parsed SUBSCRIBE packet
#[derive(Debug, Clone)]
pub struct ParsedSubscribe {
    pub packet_id: Pid,
    pub topic_filters: Vec<String>,
}

/// Parsed UNSUBSCRIBE packet
#[derive(Debug, Clone)]
pub struct ParsedUnsubscribe {
    pub packet_id: Pid,
    pub topics: Vec<String>,
}

/// Total length of the first packet in `buf`, fixed header included.
///
/// Returns `Ok(None)` until enough bytes have arrived to know it.
pub fn frame_length(buf: &[u8]) -> Result<Option<usize>, PacketError> {
    let mut remaining: usize = 0;
    let mut multiplier: usize = 1;

    // Remaining length is 1-4 bytes after the packet type byte
    for (i, byte) in buf.iter().skip(1).take(4).enumerate() {
        remaining += usize::from(byte & 0x7F) * multiplier;
        if byte & 0x80 == 0 {
            return Ok(Some(1 + (i + 1) + remaining));
        }
        multiplier *= 128;
    }

    if buf.len() >= 5 {
        Err(PacketError::MalformedLength)
    } else {
        Ok(None)
    }
}

/// Parse one complete MQTT packet
pub fn parse_packet(data: &[u8]) -> Result<MqttPacket, PacketError> {
    let packet = decode_slice(data)?.ok_or(PacketError::Incomplete)?;

    let parsed = match packet {
        Packet::Connect(connect) => MqttPacket::Connect(ParsedConnect {
            protocol_version: match connect.protocol {
                Protocol::MQTT311 => 4,
                Protocol::MQIsdp => 3,
            },
            client_id: connect.client_id.to_string(),
            clean_session: connect.clean_session,
            keep_alive: connect.keep_alive,
            username: connect.username.map(|s| s.to_string()),
        }),

        Packet::Publish(publish) => {
            let (qos, packet_id) = match publish.qospid {
                QosPid::AtMostOnce => (0, None),
                QosPid::AtLeastOnce(pid) => (1, Some(pid)),
                QosPid::ExactlyOnce(pid) => (2, Some(pid)),
            };

            MqttPacket::Publish(ParsedPublish {
                topic: publish.topic_name.to_string(),
                payload: publish.payload.to_vec(),
                qos,
                retain: publish.retain,
                packet_id,
            })
        }

        Packet::Subscribe(subscribe) => MqttPacket::Subscribe(ParsedSubscribe {
            packet_id: subscribe.pid,
            topic_filters: subscribe
                .topics
                .iter()
                .map(|t| t.topic_path.to_string())
                .collect(),
        }),

        Packet::Unsubscribe(unsub) => MqttPacket::Unsubscribe(ParsedUnsubscribe {
            packet_id: unsub.pid,
            topics: unsub.topics.iter().map(|t| t.to_string()).collect(),
        }),

        Packet::Pubrel(pid) => MqttPacket::Pubrel(pid),
        Packet::Pingreq => MqttPacket::PingReq,
        Packet::Disconnect => MqttPacket::Disconnect,

        Packet::Connack(_) => MqttPacket::Other(MqttPacketType::Connack),
        Packet::Puback(_) => MqttPacket::Other(MqttPacketType::Puback),
        Packet::Pubrec(_) => MqttPacket::Other(MqttPacketType::Pubrec),
        Packet::Pubcomp(_) => MqttPacket::Other(MqttPacketType::Pubcomp),
        Packet::Suback(_) => MqttPacket::Other(MqttPacketType::Suback),
        Packet::Unsuback(_) => MqttPacket::Other(MqttPacketType::Unsuback),
        Packet::Pingresp => MqttPacket::Other(MqttPacketType::Pingresp),
    };

    Ok(parsed)
}

fn encode(packet: &Packet<'_>, capacity: usize) -> Result<Vec<u8>, PacketError> {
    let mut buf = vec![0u8; capacity];
    let len = encode_slice(packet, &mut buf)?;
    buf.truncate(len);
    Ok(buf)
}

/// CONNACK accepting the connection
pub fn encode_connack() -> Result<Vec<u8>, PacketError> {
    encode(
        &Packet::Connack(Connack {
            session_present: false,
            code: ConnectReturnCode::Accepted,
        }),
        4,
    )
}

/// QoS 0, non-retained PUBLISH
pub fn encode_publish(topic: &str, payload: &[u8]) -> Result<Vec<u8>, PacketError> {
    let packet = Packet::Publish(Publish {
        dup: false,
        qospid: QosPid::AtMostOnce,
        retain: false,
        topic_name: topic,
        payload,
    });
    // fixed header (5) + topic length (2)
    encode(&packet, 7 + topic.len() + payload.len())
}

pub fn encode_puback(pid: Pid) -> Result<Vec<u8>, PacketError> {
    encode(&Packet::Puback(pid), 4)
}

pub fn encode_pubrec(pid: Pid) -> Result<Vec<u8>, PacketError> {
    encode(&Packet::Pubrec(pid), 4)
}

pub fn encode_pubcomp(pid: Pid) -> Result<Vec<u8>, PacketError> {
    encode(&Packet::Pubcomp(pid), 4)
}

/// SUBACK granting QoS 0 to each accepted filter
pub fn encode_suback(pid: Pid, accepted: &[bool]) -> Result<Vec<u8>, PacketError> {
    let return_codes = accepted
        .iter()
        .map(|ok| {
            if *ok {
                SubscribeReturnCodes::Success(QoS::AtMostOnce)
            } else {
                SubscribeReturnCodes::Failure
            }
        })
        .collect();

    encode(
        &Packet::Suback(Suback { pid, return_codes }),
        7 + accepted.len(),
    )
}

pub fn encode_unsuback(pid: Pid) -> Result<Vec<u8>, PacketError> {
    encode(&Packet::Unsuback(pid), 4)
}

pub fn encode_pingresp() -> Result<Vec<u8>, PacketError> {
    encode(&Packet::Pingresp, 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_with_username() {
        let bytes = [
            0x10, 0x19, // CONNECT, 25 bytes follow
            0x00, 0x04, b'M', b'Q', b'T', b'T', 0x04, // MQTT 3.1.1
            0x82, // username, clean session
            0x00, 0x1E, // keep alive 30s
            0x00, 0x08, b's', b'e', b'n', b's', b'o', b'r', b'-', b'7',
            0x00, 0x03, b'd', b'e', b'v',
        ];

        match parse_packet(&bytes).unwrap() {
            MqttPacket::Connect(connect) => {
                assert_eq!(connect.client_id, "sensor-7");
                assert_eq!(connect.username.as_deref(), Some("dev"));
                assert_eq!(connect.keep_alive, 30);
                assert_eq!(connect.protocol_version, 4);
            }
            other => panic!("Expected CONNECT packet, got {other:?}"),
        }
    }

    #[test]
    fn test_qos1_write_command() {
        let bytes = [
            0x32, 0x17, // PUBLISH QoS 1, 23 bytes follow
            0x00, 0x0C, b'i', b'n', b'/', b'p', b'/', b'w', b'r', b'i', b't', b'e', b'/', b'k',
            0x00, 0x2A, // packet id 42
            b'{', b'"', b't', b'"', b':', b'1', b'}',
        ];

        match parse_packet(&bytes).unwrap() {
            MqttPacket::Publish(publish) => {
                assert_eq!(publish.topic, "in/p/write/k");
                assert_eq!(publish.payload, br#"{"t":1}"#);
                assert_eq!(publish.qos, 1);
                assert_eq!(publish.packet_id, Some(Pid::try_from(42u16).unwrap()));
            }
            other => panic!("Expected PUBLISH packet, got {other:?}"),
        }
    }

    #[test]
    fn test_frame_length() {
        // Not even a fixed header yet
        assert_eq!(frame_length(&[]).unwrap(), None);
        assert_eq!(frame_length(&[0x30]).unwrap(), None);

        // Single byte remaining length
        assert_eq!(frame_length(&[0x30, 0x0C]).unwrap(), Some(14));

        // Two byte remaining length: 0xC1 0x02 = 65 + 2 * 128 = 321
        assert_eq!(frame_length(&[0x30, 0xC1, 0x02]).unwrap(), Some(1 + 2 + 321));

        // Continuation bit on every length byte
        assert!(frame_length(&[0x30, 0xFF, 0xFF, 0xFF, 0xFF]).is_err());
    }

    #[test]
    fn test_encoded_publish_parses_back() {
        let frame = encode_publish("input/pub/response", br#"{"success":true}"#).unwrap();
        assert_eq!(frame_length(&frame).unwrap(), Some(frame.len()));

        match parse_packet(&frame).unwrap() {
            MqttPacket::Publish(publish) => {
                assert_eq!(publish.topic, "input/pub/response");
                assert_eq!(publish.payload, br#"{"success":true}"#);
                assert!(!publish.retain);
            }
            other => panic!("Expected PUBLISH packet, got {other:?}"),
        }
    }

    #[test]
    fn test_control_packets() {
        assert_eq!(encode_connack().unwrap(), vec![0x20, 0x02, 0x00, 0x00]);
        assert_eq!(encode_pingresp().unwrap(), vec![0xD0, 0x00]);

        let pid = Pid::try_from(7u16).unwrap();
        assert_eq!(encode_puback(pid).unwrap(), vec![0x40, 0x02, 0x00, 0x07]);
        assert_eq!(
            encode_suback(pid, &[true, false]).unwrap(),
            vec![0x90, 0x04, 0x00, 0x07, 0x00, 0x80]
        );
    }
}
