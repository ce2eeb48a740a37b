//! MQTT protocol handling module
//!
//! Packet codec, topic filter matching and the stream command grammar.

mod command;
mod parser;
mod topic;

pub use command::{response_topic, Action, CommandTopic};
pub use parser::{
    encode_connack, encode_pingresp, encode_puback, encode_pubcomp, encode_publish,
    encode_pubrec, encode_suback, encode_unsuback, frame_length, parse_packet, MqttPacket,
    MqttPacketType, ParsedConnect, ParsedPublish, ParsedSubscribe, ParsedUnsubscribe,
};
pub use topic::TopicMatcher;
