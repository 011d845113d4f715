pub mod config;
pub mod consume;
pub mod error;
pub mod message;
pub mod produce;
pub mod settings;

pub mod kafka;

pub use config::SessionConfig;
pub use consume::{consume_start, ConsumePipeline};
pub use error::{Error, Result};
pub use message::{DisplayMode, Message};
pub use produce::{produce_publish, ProducePipeline, ProduceRequest};
