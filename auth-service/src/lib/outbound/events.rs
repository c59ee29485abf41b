pub mod log;
pub mod messages;
pub mod producer;

pub use log::LogEventPublisher;
pub use producer::KafkaEventProducer;
