pub mod consumer;
pub mod producer;
pub mod session;
pub mod store;


pub use consumer::KafkaConsumerSession;
pub use producer::KafkaProducerSession;
pub use session::{ConsumerSession, ProduceRecord, ProducerSession, Record, SessionFactory};
pub use store::KafkaStore;
