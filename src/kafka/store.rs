use super::consumer::KafkaConsumerSession;
use super::producer::KafkaProducerSession;
use super::session::{ConsumerSession, ProducerSession, SessionFactory};
use crate::config::{ConsumerTarget, SessionConfig};
use crate::Result;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::producer::FutureProducer;
use rdkafka::{ClientConfig, Offset, TopicPartitionList};
use tracing::{debug, info, instrument};

const CLIENT_ID: &str = "kcli";
const SOCKET_SETUP_TIMEOUT_MS: u32 = 10_000;

// Consumer tuning
const FETCH_MIN_BYTES: u32 = 5;
const FETCH_MAX_BYTES: u32 = 10_000_000;
const FETCH_WAIT_MAX_MS: u32 = 5_000;
const QUEUED_MIN_MESSAGES: u32 = 1_000;
const METADATA_REFRESH_INTERVAL_MS: u32 = 5_000;
const AUTO_COMMIT_INTERVAL_MS: u32 = 500;

// Producer tuning
const BATCH_NUM_MESSAGES: u32 = 100;
const LINGER_MS: u32 = 5;
const PARTITIONER: &str = "random";
const ACKS: &str = "all";

/// Session factory backed by librdkafka.
///
/// Nothing touches the network until a session is first read from or
/// written to.
pub struct KafkaStore {
    config: SessionConfig,
}

impl KafkaStore {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Settings shared by both session kinds: brokers and transport security.
    fn base_config(&self) -> ClientConfig {
        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", self.config.bootstrap_servers())
            .set("client.id", CLIENT_ID)
            .set(
                "socket.connection.setup.timeout.ms",
                SOCKET_SETUP_TIMEOUT_MS.to_string(),
            );

        match self.config.credentials() {
            Some(credentials) => {
                client_config
                    .set("security.protocol", "SASL_PLAINTEXT")
                    .set("sasl.mechanisms", "PLAIN")
                    .set("sasl.username", &credentials.username)
                    .set("sasl.password", &credentials.password);
            }
            None => {
                client_config.set("security.protocol", "plaintext");
            }
        }

        client_config
    }

    pub(crate) fn consumer_config(&self, target: &ConsumerTarget) -> ClientConfig {
        let mut client_config = self.base_config();
        client_config
            .set("fetch.min.bytes", FETCH_MIN_BYTES.to_string())
            .set("fetch.max.bytes", FETCH_MAX_BYTES.to_string())
            .set("fetch.wait.max.ms", FETCH_WAIT_MAX_MS.to_string())
            .set("queued.min.messages", QUEUED_MIN_MESSAGES.to_string())
            .set(
                "topic.metadata.refresh.interval.ms",
                METADATA_REFRESH_INTERVAL_MS.to_string(),
            )
            .set("enable.partition.eof", "false");

        match target {
            ConsumerTarget::Group(group_id) => {
                client_config
                    .set("group.id", group_id)
                    .set("enable.auto.commit", "true")
                    .set(
                        "auto.commit.interval.ms",
                        AUTO_COMMIT_INTERVAL_MS.to_string(),
                    )
                    .set("auto.offset.reset", "latest");
            }
            ConsumerTarget::Partition(_) => {
                client_config.set("enable.auto.commit", "false");
            }
        }

        client_config
    }

    pub(crate) fn producer_config(&self) -> ClientConfig {
        let mut client_config = self.base_config();
        client_config
            .set("batch.num.messages", BATCH_NUM_MESSAGES.to_string())
            .set("linger.ms", LINGER_MS.to_string())
            .set("partitioner", PARTITIONER)
            .set("acks", ACKS);
        client_config
    }
}

impl SessionFactory for KafkaStore {
    #[instrument(skip(self), fields(topic = %self.config.topic()))]
    fn open_consumer(&self) -> Result<Box<dyn ConsumerSession>> {
        let target = self.config.consumer_target()?;
        let topic = self.config.topic();

        let consumer: StreamConsumer = self.consumer_config(target).create()?;

        match target {
            ConsumerTarget::Partition(partition) => {
                let mut assignment = TopicPartitionList::new();
                assignment.add_partition_offset(topic, *partition, Offset::End)?;
                consumer.assign(&assignment)?;
                info!(partition = *partition, "Consumer assigned to partition");
            }
            ConsumerTarget::Group(group_id) => {
                consumer.subscribe(&[topic])?;
                info!(group_id = %group_id, "Consumer subscribed with group");
            }
        }

        debug!(
            authenticated = self.config.credentials().is_some(),
            "Consumer session opened"
        );
        Ok(Box::new(KafkaConsumerSession::new(consumer)))
    }

    #[instrument(skip(self), fields(topic = %self.config.topic()))]
    fn open_producer(&self) -> Result<Box<dyn ProducerSession>> {
        let producer: FutureProducer = self.producer_config().create()?;

        debug!(
            authenticated = self.config.credentials().is_some(),
            "Producer session opened"
        );
        Ok(Box::new(KafkaProducerSession::new(
            producer,
            self.config.topic().to_string(),
        )))
    }
}
