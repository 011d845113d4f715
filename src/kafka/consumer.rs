use super::session::{ConsumerSession, Record};
use crate::{Error, Result};
use async_trait::async_trait;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Headers, Message};
use std::collections::BTreeMap;
use tracing::debug;

pub struct KafkaConsumerSession {
    consumer: StreamConsumer,
}

impl KafkaConsumerSession {
    pub fn new(consumer: StreamConsumer) -> Self {
        Self { consumer }
    }
}

#[async_trait]
impl ConsumerSession for KafkaConsumerSession {
    async fn read_next(&mut self) -> Result<Record> {
        // StreamConsumer::recv is cancel safe
        let message = self.consumer.recv().await.map_err(Error::consume)?;
        Ok(to_record(&message))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let KafkaConsumerSession { consumer } = *self;
        if let Ok(assignment) = consumer.assignment() {
            debug!(partitions = assignment.count(), "Closing consumer");
        }

        // Destroying the handle leaves the group and flushes pending offset
        // commits, which blocks.
        tokio::task::spawn_blocking(move || drop(consumer))
            .await
            .map_err(|e| Error::ConsumeFailure(format!("consumer close failed: {}", e)))
    }
}

fn to_record(message: &BorrowedMessage<'_>) -> Record {
    let mut headers = BTreeMap::new();
    if let Some(borrowed) = message.headers() {
        for header in borrowed.iter() {
            let value = header
                .value
                .map(|v| String::from_utf8_lossy(v).into_owned())
                .unwrap_or_default();
            headers.insert(header.key.to_string(), value);
        }
    }

    Record {
        key: message.key().map(<[u8]>::to_vec).unwrap_or_default(),
        value: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
        headers,
        partition: message.partition(),
        offset: message.offset(),
    }
}
