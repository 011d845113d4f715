use super::session::{ProduceRecord, ProducerSession};
use crate::{Error, Result};
use async_trait::async_trait;
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer, PurgeConfig};
use rdkafka::util::Timeout;
use std::time::Duration;
use tracing::debug;

const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Time left for purged delivery reports to drain before teardown.
const PURGE_DRAIN: Duration = Duration::from_millis(100);

pub struct KafkaProducerSession {
    producer: FutureProducer,
    topic: String,
}

impl KafkaProducerSession {
    pub fn new(producer: FutureProducer, topic: String) -> Self {
        Self { producer, topic }
    }
}

#[async_trait]
impl ProducerSession for KafkaProducerSession {
    async fn write(&mut self, record: ProduceRecord) -> Result<()> {
        let headers = record
            .headers
            .iter()
            .fold(OwnedHeaders::new(), |headers, (name, value)| {
                headers.insert(Header {
                    key: name.as_str(),
                    value: Some(value.as_str()),
                })
            });

        let future_record = FutureRecord::to(&self.topic)
            .key(&record.key)
            .payload(&record.value)
            .headers(headers);

        let (partition, offset) = self
            .producer
            .send(future_record, Timeout::Never)
            .await
            .map_err(|(e, _)| Error::produce(e))?;

        debug!(partition, offset, "Message delivered");
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let KafkaProducerSession { producer, .. } = *self;
        tokio::task::spawn_blocking(move || producer.flush(Timeout::After(FLUSH_TIMEOUT)))
            .await
            .map_err(|e| Error::ProduceFailure(format!("producer close failed: {}", e)))?
            .map_err(Error::produce)
    }

    async fn discard(self: Box<Self>) -> Result<()> {
        let KafkaProducerSession { producer, .. } = *self;
        tokio::task::spawn_blocking(move || {
            producer.purge(PurgeConfig::default().queue().inflight());
            // purged records still report back as failed deliveries
            if let Err(e) = producer.flush(Timeout::After(PURGE_DRAIN)) {
                debug!("Purged records not drained before teardown: {}", e);
            }
            debug!(in_flight = producer.in_flight_count(), "Producer discarded");
        })
        .await
        .map_err(|e| Error::ProduceFailure(format!("producer discard failed: {}", e)))
    }
}
