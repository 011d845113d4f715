//! Consumed message model and its three renderings.

use crate::kafka::Record;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;

/// How consumed messages are written out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    /// One JSON object per line.
    #[serde(alias = "0")]
    Compact,
    /// Indented JSON.
    #[serde(alias = "1")]
    Pretty,
    /// Human-oriented bullet list.
    #[default]
    #[serde(alias = "2")]
    List,
}

/// One record as read from the broker.
///
/// Immutable once built; the length is always derived from the value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    key: Vec<u8>,
    value: Vec<u8>,
    headers: BTreeMap<String, String>,
    partition: i32,
    offset: i64,
}

#[derive(Serialize)]
struct MessageView<'a> {
    key: String,
    value: String,
    #[serde(skip_serializing_if = "no_headers")]
    headers: &'a BTreeMap<String, String>,
    partition: i32,
    offset: i64,
    length: usize,
}

fn no_headers(headers: &&BTreeMap<String, String>) -> bool {
    headers.is_empty()
}

impl Message {
    pub fn new(
        key: Vec<u8>,
        value: Vec<u8>,
        headers: BTreeMap<String, String>,
        partition: i32,
        offset: i64,
    ) -> Self {
        Self {
            key,
            value,
            headers,
            partition,
            offset,
        }
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn partition(&self) -> i32 {
        self.partition
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// Byte length of the value.
    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    fn view(&self) -> MessageView<'_> {
        MessageView {
            key: String::from_utf8_lossy(&self.key).into_owned(),
            value: String::from_utf8_lossy(&self.value).into_owned(),
            headers: &self.headers,
            partition: self.partition,
            offset: self.offset,
            length: self.len(),
        }
    }

    /// Writes the message to `out` in the requested form, followed by a
    /// newline.
    pub fn render<W: Write>(&self, mode: DisplayMode, out: &mut W) -> Result<()> {
        match mode {
            DisplayMode::Compact => {
                serde_json::to_writer(&mut *out, &self.view())?;
                writeln!(out)?;
            }
            DisplayMode::Pretty => {
                serde_json::to_writer_pretty(&mut *out, &self.view())?;
                writeln!(out)?;
            }
            DisplayMode::List => self.render_list(out)?,
        }
        Ok(())
    }

    fn render_list<W: Write>(&self, out: &mut W) -> Result<()> {
        let view = self.view();
        writeln!(out, "New message coming:")?;
        writeln!(out, "  - Key: {}", view.key)?;
        writeln!(out, "    - Value: {}", view.value)?;
        if !self.headers.is_empty() {
            writeln!(out, "    - Headers:")?;
            for (name, value) in &self.headers {
                writeln!(out, "      - {}: {}", name, value)?;
            }
        }
        writeln!(out, "    - Partition: {}", view.partition)?;
        writeln!(out, "    - Offset: {}", view.offset)?;
        writeln!(out, "    - Length: {}", view.length)?;
        Ok(())
    }
}

impl From<Record> for Message {
    fn from(record: Record) -> Self {
        Message::new(
            record.key,
            record.value,
            record.headers,
            record.partition,
            record.offset,
        )
    }
}
