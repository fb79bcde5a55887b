//! Queue Entry Types
//!
//! One `QueueEntry` per message in the Postfix queue, as listed by the
//! `showq` service. Entries serialize to JSON for diagnostic logging and
//! encode back to the showq wire format for tests and mock servers.

use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Field separator on the wire
pub const NUL: u8 = 0;

/// Arrival time in whole seconds since the Unix epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArrivalTime(pub i64);

impl ArrivalTime {
    pub const EPOCH: ArrivalTime = ArrivalTime(0);

    pub fn from_secs(secs: i64) -> Self {
        ArrivalTime(secs)
    }

    /// Truncates to second resolution
    pub fn from_system_time(time: SystemTime) -> Self {
        match time.duration_since(UNIX_EPOCH) {
            Ok(d) => ArrivalTime(d.as_secs() as i64),
            Err(e) => ArrivalTime(-(e.duration().as_secs_f64().ceil() as i64)),
        }
    }

    pub fn as_secs(&self) -> i64 {
        self.0
    }

    pub fn as_system_time(&self) -> SystemTime {
        if self.0 >= 0 {
            UNIX_EPOCH + Duration::from_secs(self.0 as u64)
        } else {
            UNIX_EPOCH - Duration::from_secs(self.0.unsigned_abs())
        }
    }

    /// Seconds elapsed between arrival and `now`. Negative when the
    /// arrival time lies in the future of `now`.
    pub fn age_at(&self, now: SystemTime) -> f64 {
        match now.duration_since(self.as_system_time()) {
            Ok(d) => d.as_secs_f64(),
            Err(e) => -e.duration().as_secs_f64(),
        }
    }
}

impl std::fmt::Display for ArrivalTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Recipient and the reason its delivery was delayed, if any
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Recipient {
    pub address: String,
    pub delay_reason: Option<String>,
}

impl Recipient {
    pub fn new(address: impl Into<String>) -> Self {
        Recipient {
            address: address.into(),
            delay_reason: None,
        }
    }

    pub fn with_delay_reason(mut self, reason: impl Into<String>) -> Self {
        self.delay_reason = Some(reason.into());
        self
    }
}

/// A message in the sendmail-style queue listing
///
/// Recipients keep the order they were listed in, which is the order
/// delivery was attempted.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QueueEntry {
    pub queue_name: String,
    pub queue_id: String,
    pub arrival_time: ArrivalTime,
    pub message_size: u64,
    pub forced_expire: bool,
    pub sender: String,
    pub recipients: Vec<Recipient>,
}

impl QueueEntry {
    /// Encoded length of this entry, including the record terminator
    pub fn encoded_len(&self) -> usize {
        let mut len = 0;
        let mut field = |key: &str, value_len: usize| len += key.len() + value_len + 2;
        field("queue_name", self.queue_name.len());
        field("queue_id", self.queue_id.len());
        let secs = self.arrival_time.as_secs();
        field("time", decimal_width(secs.unsigned_abs()) + usize::from(secs < 0));
        field("size", decimal_width(self.message_size));
        field("forced_expire", if self.forced_expire { 4 } else { 5 });
        field("sender", self.sender.len());
        for r in &self.recipients {
            field("recipient", r.address.len());
            if let Some(reason) = &r.delay_reason {
                field("reason", reason.len());
            }
        }
        len + 1
    }

    /// Append this entry as one showq record: `key\0value\0...\0`
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.reserve(self.encoded_len());
        put_field(buf, "queue_name", self.queue_name.as_bytes());
        put_field(buf, "queue_id", self.queue_id.as_bytes());
        put_field(buf, "time", self.arrival_time.as_secs().to_string().as_bytes());
        put_field(buf, "size", self.message_size.to_string().as_bytes());
        put_field(
            buf,
            "forced_expire",
            if self.forced_expire { b"true" } else { b"false" },
        );
        put_field(buf, "sender", self.sender.as_bytes());
        for recipient in &self.recipients {
            put_field(buf, "recipient", recipient.address.as_bytes());
            if let Some(reason) = &recipient.delay_reason {
                put_field(buf, "reason", reason.as_bytes());
            }
        }
        buf.put_u8(NUL);
    }

    pub fn to_bytes(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode(&mut buf);
        buf
    }

    /// Copy of this entry with every address passed through `mask`
    pub fn redacted(&self, mask: impl Fn(&str) -> String) -> QueueEntry {
        QueueEntry {
            sender: mask(&self.sender),
            recipients: self
                .recipients
                .iter()
                .map(|r| Recipient {
                    address: mask(&r.address),
                    delay_reason: r.delay_reason.as_deref().map(&mask),
                })
                .collect(),
            ..self.clone()
        }
    }
}

/// Append the end-of-stream marker (an empty record)
pub fn encode_end(buf: &mut BytesMut) {
    buf.put_u8(NUL);
}

/// Encode a full listing: every entry followed by the end-of-stream marker
pub fn encode_listing<'a>(entries: impl IntoIterator<Item = &'a QueueEntry>) -> BytesMut {
    let mut buf = BytesMut::new();
    for entry in entries {
        entry.encode(&mut buf);
    }
    encode_end(&mut buf);
    buf
}

fn put_field(buf: &mut BytesMut, key: &str, value: &[u8]) {
    buf.extend_from_slice(key.as_bytes());
    buf.put_u8(NUL);
    buf.extend_from_slice(value);
    buf.put_u8(NUL);
}

fn decimal_width(n: u64) -> usize {
    n.checked_ilog10().map_or(1, |d| d as usize + 1)
}
