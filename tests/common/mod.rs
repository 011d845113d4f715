#![allow(dead_code)]

use async_trait::async_trait;
use kcli::kafka::{ConsumerSession, ProduceRecord, ProducerSession, Record, SessionFactory};
use kcli::{Error, Result};
use std::collections::{BTreeMap, VecDeque};
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// One scripted outcome of `read_next`. Once the script runs out the read
/// blocks forever, like a consumer on an idle topic.
#[derive(Debug, Clone)]
pub enum ReadStep {
    Deliver(Record),
    Fail(String),
    Reject(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteBehavior {
    Succeed,
    Fail,
    Hang,
}

/// Counters shared between a [`MockStore`] and the sessions it opened.
#[derive(Default)]
pub struct Probe {
    pub consumers_opened: AtomicUsize,
    pub consumers_closed: AtomicUsize,
    pub producers_opened: AtomicUsize,
    pub producers_closed: AtomicUsize,
    pub producers_discarded: AtomicUsize,
    pub reads: AtomicUsize,
    pub read_blocked: AtomicBool,
    pub published: Mutex<Vec<ProduceRecord>>,
}

impl Probe {
    pub fn consumers_closed(&self) -> usize {
        self.consumers_closed.load(Ordering::SeqCst)
    }

    pub fn producers_opened(&self) -> usize {
        self.producers_opened.load(Ordering::SeqCst)
    }

    pub fn producers_closed(&self) -> usize {
        self.producers_closed.load(Ordering::SeqCst)
    }

    pub fn producers_discarded(&self) -> usize {
        self.producers_discarded.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn published(&self) -> Vec<ProduceRecord> {
        self.published.lock().unwrap().clone()
    }

    pub async fn wait_until_read_blocked(&self) {
        while !self.read_blocked.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

pub struct MockStore {
    pub probe: Arc<Probe>,
    script: Mutex<Vec<ReadStep>>,
    write: WriteBehavior,
    fail_close: bool,
    hang_close: bool,
    release_delay: Duration,
}

impl MockStore {
    pub fn new() -> Self {
        Self {
            probe: Arc::new(Probe::default()),
            script: Mutex::new(Vec::new()),
            write: WriteBehavior::Succeed,
            fail_close: false,
            hang_close: false,
            release_delay: Duration::ZERO,
        }
    }

    pub fn with_script(self, steps: Vec<ReadStep>) -> Self {
        *self.script.lock().unwrap() = steps;
        self
    }

    pub fn with_write(mut self, write: WriteBehavior) -> Self {
        self.write = write;
        self
    }

    pub fn with_failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    pub fn with_hanging_close(mut self) -> Self {
        self.hang_close = true;
        self
    }

    /// Makes producer `close` and `discard` take `delay` to finish.
    pub fn with_slow_release(mut self, delay: Duration) -> Self {
        self.release_delay = delay;
        self
    }
}

impl SessionFactory for MockStore {
    fn open_consumer(&self) -> Result<Box<dyn ConsumerSession>> {
        self.probe.consumers_opened.fetch_add(1, Ordering::SeqCst);
        let steps = std::mem::take(&mut *self.script.lock().unwrap());
        Ok(Box::new(MockConsumer {
            steps: steps.into(),
            probe: self.probe.clone(),
            fail_close: self.fail_close,
            hang_close: self.hang_close,
        }))
    }

    fn open_producer(&self) -> Result<Box<dyn ProducerSession>> {
        self.probe.producers_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockProducer {
            probe: self.probe.clone(),
            write: self.write,
            release_delay: self.release_delay,
            queued: None,
        }))
    }
}

struct MockConsumer {
    steps: VecDeque<ReadStep>,
    probe: Arc<Probe>,
    fail_close: bool,
    hang_close: bool,
}

#[async_trait]
impl ConsumerSession for MockConsumer {
    async fn read_next(&mut self) -> Result<Record> {
        self.probe.reads.fetch_add(1, Ordering::SeqCst);
        match self.steps.pop_front() {
            Some(ReadStep::Deliver(record)) => Ok(record),
            Some(ReadStep::Fail(reason)) => Err(Error::ConsumeFailure(reason)),
            Some(ReadStep::Reject(reason)) => Err(Error::Authentication(reason)),
            None => {
                self.probe.read_blocked.store(true, Ordering::SeqCst);
                std::future::pending().await
            }
        }
    }

    async fn close(self: Box<Self>) -> Result<()> {
        if self.hang_close {
            return std::future::pending().await;
        }
        self.probe.consumers_closed.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(Error::ConsumeFailure("leave group failed".to_string()));
        }
        Ok(())
    }
}

/// A hung write leaves its record queued, the way librdkafka keeps it
/// buffered. `close` flushes the queue into `published`; `discard` drops it.
struct MockProducer {
    probe: Arc<Probe>,
    write: WriteBehavior,
    release_delay: Duration,
    queued: Option<ProduceRecord>,
}

#[async_trait]
impl ProducerSession for MockProducer {
    async fn write(&mut self, record: ProduceRecord) -> Result<()> {
        match self.write {
            WriteBehavior::Succeed => {
                self.probe.published.lock().unwrap().push(record);
                Ok(())
            }
            WriteBehavior::Fail => Err(Error::ProduceFailure(
                "Broker: Unknown topic or partition".to_string(),
            )),
            WriteBehavior::Hang => {
                self.queued = Some(record);
                std::future::pending().await
            }
        }
    }

    async fn close(self: Box<Self>) -> Result<()> {
        tokio::time::sleep(self.release_delay).await;
        if let Some(record) = self.queued {
            self.probe.published.lock().unwrap().push(record);
        }
        self.probe.producers_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn discard(self: Box<Self>) -> Result<()> {
        self.probe.producers_discarded.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.release_delay).await;
        Ok(())
    }
}

pub fn record(partition: i32, offset: i64, value: &str) -> Record {
    Record {
        key: format!("key-{}", offset).into_bytes(),
        value: value.as_bytes().to_vec(),
        headers: BTreeMap::new(),
        partition,
        offset,
    }
}

/// A writer the test can read while the pipeline is still writing to it.
#[derive(Clone, Default)]
pub struct SharedOutput(Arc<Mutex<Vec<u8>>>);

impl SharedOutput {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }

    pub async fn wait_for(&self, needle: &str) {
        while !self.contents().contains(needle) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

impl Write for SharedOutput {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// A writer whose writes block until [`GatedOutput::open`] is called.
///
/// Needs a multi-threaded runtime: the blocked write parks its worker via
/// `block_in_place`.
#[derive(Clone, Default)]
pub struct GatedOutput {
    output: SharedOutput,
    gate: Arc<Gate>,
}

#[derive(Default)]
struct Gate {
    open: Mutex<bool>,
    opened: Condvar,
    stalled: AtomicBool,
}

impl GatedOutput {
    pub fn contents(&self) -> String {
        self.output.contents()
    }

    pub async fn wait_for(&self, needle: &str) {
        self.output.wait_for(needle).await
    }

    pub async fn wait_until_stalled(&self) {
        while !self.gate.stalled.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    pub fn open(&self) {
        *self.gate.open.lock().unwrap() = true;
        self.gate.opened.notify_all();
    }
}

impl Write for GatedOutput {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let gate = self.gate.clone();
        tokio::task::block_in_place(|| {
            let mut open = gate.open.lock().unwrap();
            while !*open {
                gate.stalled.store(true, Ordering::SeqCst);
                open = gate.opened.wait(open).unwrap();
            }
        });
        self.output.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Fails the first `failures` write calls, then behaves like a `Vec<u8>`.
pub struct FlakyOutput {
    pub failures: usize,
    pub buffer: Vec<u8>,
}

impl Write for FlakyOutput {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if self.failures > 0 {
            self.failures -= 1;
            return Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed"));
        }
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
