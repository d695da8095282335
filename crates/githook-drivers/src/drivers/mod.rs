pub mod amqp;
pub mod http;
#[cfg(feature = "kafka-producer")]
pub mod kafka;
pub mod nats;
