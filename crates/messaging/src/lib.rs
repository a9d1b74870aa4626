pub mod consumer;
pub mod producer;

pub use consumer::{
    ConsumerError, Disposition, EventConsumer, InboundMessage, MessageHandler, PartitionControl,
    PartitionWorker,
};
pub use producer::{EventPublisher, PublisherError};
