//! Continuous streaming from a topic.
//!
//! A background task owns the consumer session and pushes each record into a
//! bounded channel; the caller's task renders what comes out of it. Both
//! sides watch the same [`CancellationToken`]. Once it fires the reader stops
//! reading (abandoning any read in flight), closes the session and exits.
//!
//! ```text
//!  reader task                       caller task
//!  session.read_next() ──► mpsc(64) ──► Message::render()
//!        ▲                                  │
//!        └──────── CancellationToken ───────┘
//! ```

use crate::config::SessionConfig;
use crate::kafka::{ConsumerSession, KafkaStore, SessionFactory};
use crate::message::{DisplayMode, Message};
use crate::{Error, Result};
use std::io::Write;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Messages buffered between the reader and the renderer.
pub const HANDOFF_CAPACITY: usize = 64;

/// How long the reader gets to close its session after the stream stops.
pub const CLOSE_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Streaming,
    Closed,
}

enum StreamEnd {
    Cancelled,
    RendererGone,
    Failed(Error),
}

pub struct ConsumePipeline<F> {
    factory: F,
    state: PipelineState,
    close_grace: Duration,
}

impl<F: SessionFactory> ConsumePipeline<F> {
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            state: PipelineState::Idle,
            close_grace: CLOSE_GRACE,
        }
    }

    pub fn with_close_grace(mut self, close_grace: Duration) -> Self {
        self.close_grace = close_grace;
        self
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    fn transition(&mut self, next: PipelineState) {
        debug!(from = ?self.state, to = ?next, "Consume pipeline state change");
        self.state = next;
    }

    /// Streams messages into `out` until `cancel` fires or the session fails.
    ///
    /// Returns `Ok(())` after a cancelled stream whose session closed cleanly.
    /// A read failure takes precedence over a close failure.
    #[instrument(skip_all, fields(mode = ?mode))]
    pub async fn start<W: Write>(
        &mut self,
        mode: DisplayMode,
        cancel: CancellationToken,
        out: &mut W,
    ) -> Result<()> {
        if self.state != PipelineState::Idle {
            return Err(Error::ConsumeFailure(
                "consume pipeline can only be started once".to_string(),
            ));
        }

        let session = match self.factory.open_consumer() {
            Ok(session) => session,
            Err(e) => {
                self.transition(PipelineState::Closed);
                return Err(e);
            }
        };
        self.transition(PipelineState::Streaming);

        let (tx, mut rx) = mpsc::channel(HANDOFF_CAPACITY);
        let mut reader = tokio::spawn(read_loop(session, tx, cancel.clone()));

        let mut presented: u64 = 0;
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Cancellation requested, stopping consumer");
                    break;
                }
                next = rx.recv() => match next {
                    Some(message) => {
                        present(&message, mode, out);
                        presented += 1;
                    }
                    None => break,
                },
            }
        }
        // Unblocks a reader parked on a full channel.
        drop(rx);

        let joined = tokio::time::timeout(self.close_grace, &mut reader).await;
        let result = match joined {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(join_err)) => Err(Error::ConsumeFailure(format!(
                "reader task failed: {}",
                join_err
            ))),
            Err(_) => {
                reader.abort();
                Err(Error::ConsumeFailure(format!(
                    "consumer session did not close within {:?}",
                    self.close_grace
                )))
            }
        };

        self.transition(PipelineState::Closed);
        info!(messages = presented, "Consumer closed");
        result
    }
}

/// Streams `config`'s topic to stdout until `cancel` fires.
pub async fn consume_start(
    config: SessionConfig,
    mode: DisplayMode,
    cancel: CancellationToken,
) -> Result<()> {
    let mut pipeline = ConsumePipeline::new(KafkaStore::new(config));
    let mut out = std::io::stdout();
    pipeline.start(mode, cancel, &mut out).await
}

fn present<W: Write>(message: &Message, mode: DisplayMode, out: &mut W) {
    let rendered = message
        .render(mode, out)
        .and_then(|()| out.flush().map_err(Error::from));
    if let Err(e) = rendered {
        warn!(
            partition = message.partition(),
            offset = message.offset(),
            "Failed to render message: {}",
            e
        );
    }
}

async fn read_loop(
    mut session: Box<dyn ConsumerSession>,
    tx: mpsc::Sender<Message>,
    cancel: CancellationToken,
) -> Result<()> {
    let end = loop {
        let record = tokio::select! {
            biased;
            _ = cancel.cancelled() => break StreamEnd::Cancelled,
            record = session.read_next() => record,
        };

        let message = match record {
            Ok(record) => Message::from(record),
            Err(e) => break StreamEnd::Failed(as_consume_failure(e)),
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break StreamEnd::Cancelled,
            sent = tx.send(message) => {
                if sent.is_err() {
                    break StreamEnd::RendererGone;
                }
            }
        }
    };

    let closed = session.close().await.map_err(as_consume_failure);
    match (end, closed) {
        (StreamEnd::Failed(e), closed) => {
            if let Err(close_err) = closed {
                warn!("Consumer close failed after read error: {}", close_err);
            }
            Err(e)
        }
        (StreamEnd::Cancelled, closed) => {
            debug!("Reader stopped by cancellation");
            closed
        }
        (StreamEnd::RendererGone, closed) => {
            debug!("Reader stopped because the renderer went away");
            closed
        }
    }
}

fn as_consume_failure(err: Error) -> Error {
    match err {
        Error::ConsumeFailure(_) | Error::Authentication(_) => err,
        other => Error::ConsumeFailure(other.to_string()),
    }
}
