//! showq Stream Codec
//!
//! Wire format (one record per queued message):
//!
//! ```text
//! key1\0value1\0key2\0value2\0\0      <- record, closed by an empty field
//! key1\0value1\0\0                    <- next record
//! \0                                  <- empty record: end of listing
//! ```
//!
//! The decoder scans field by field and remembers how far it has looked,
//! so a field split across any number of socket reads is reassembled
//! without rescanning and without a length limit.

use super::entry::{ArrivalTime, QueueEntry, Recipient, NUL};
use super::error::{DecodeError, RawRecord, ValueError};
use bytes::{Buf, BytesMut};
use memchr::{memchr, memchr_iter};
use tokio_util::codec::{Decoder, Encoder};

/// One decoded unit of the showq stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShowqFrame {
    Entry(QueueEntry),
    /// Empty record; nothing follows
    End,
}

#[derive(Debug, Default)]
pub struct ShowqCodec {
    /// Start of the field currently being scanned, relative to the buffer
    field_start: usize,
    /// Everything before this offset has been scanned for NUL
    next_index: usize,
}

impl ShowqCodec {
    pub fn new() -> Self {
        Self::default()
    }

    fn reset(&mut self) {
        self.field_start = 0;
        self.next_index = 0;
    }
}

impl Decoder for ShowqCodec {
    type Item = ShowqFrame;
    type Error = DecodeError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<ShowqFrame>, DecodeError> {
        loop {
            let offset = match memchr(NUL, &src[self.next_index..]) {
                Some(offset) => offset,
                None => {
                    self.next_index = src.len();
                    return Ok(None);
                }
            };
            let nul_at = self.next_index + offset;

            if nul_at != self.field_start {
                // Non-empty field; keep scanning
                self.field_start = nul_at + 1;
                self.next_index = nul_at + 1;
                continue;
            }

            // Empty field terminates the record
            let frame = src.split_to(nul_at + 1);
            self.reset();
            if nul_at == 0 {
                return Ok(Some(ShowqFrame::End));
            }
            // Drop the separator of the last field and the terminator
            let body = &frame[..nul_at - 1];
            return parse_record(body).map(|entry| Some(ShowqFrame::Entry(entry)));
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<ShowqFrame>, DecodeError> {
        match self.decode(buf)? {
            Some(frame) => Ok(Some(frame)),
            None if buf.is_empty() => Ok(None),
            None => {
                let partial = buf.len();
                buf.advance(partial);
                self.reset();
                Err(DecodeError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("showq stream closed inside a record ({} bytes buffered)", partial),
                )))
            }
        }
    }
}

impl Encoder<&QueueEntry> for ShowqCodec {
    type Error = std::io::Error;

    fn encode(&mut self, entry: &QueueEntry, dst: &mut BytesMut) -> Result<(), std::io::Error> {
        entry.encode(dst);
        Ok(())
    }
}

/// Interpret the body of one record (fields joined by NUL, without the
/// terminating empty field).
pub fn parse_record(body: &[u8]) -> Result<QueueEntry, DecodeError> {
    let fields = split_fields(body);
    if fields.len() % 2 != 0 {
        return Err(DecodeError::OddFieldCount {
            fields: fields.len(),
            record: RawRecord::new(body),
        });
    }

    let mut entry = QueueEntry::default();
    for pair in fields.chunks_exact(2) {
        let (key, value) = (pair[0], pair[1]);
        match key {
            b"queue_name" => entry.queue_name = text(value),
            b"queue_id" => entry.queue_id = text(value),
            b"time" => {
                let secs = parse_int::<i64>(value)
                    .map_err(|source| invalid("time", source, body))?;
                entry.arrival_time = ArrivalTime::from_secs(secs);
            }
            b"size" => {
                entry.message_size =
                    parse_int::<u64>(value).map_err(|source| invalid("size", source, body))?;
            }
            b"sender" => entry.sender = text(value),
            b"forced_expire" => {
                entry.forced_expire =
                    parse_bool(value).map_err(|source| invalid("forced_expire", source, body))?;
            }
            b"recipient" => entry.recipients.push(Recipient::new(text(value))),
            b"reason" => match entry.recipients.last_mut() {
                Some(recipient) => recipient.delay_reason = Some(text(value)),
                None => {
                    return Err(DecodeError::OrphanReason {
                        record: RawRecord::new(body),
                    })
                }
            },
            _ => {
                return Err(DecodeError::UnknownKey {
                    key: text(key),
                    record: RawRecord::new(body),
                })
            }
        }
    }
    Ok(entry)
}

fn split_fields(body: &[u8]) -> Vec<&[u8]> {
    let mut fields = Vec::with_capacity(16);
    let mut start = 0;
    for at in memchr_iter(NUL, body) {
        fields.push(&body[start..at]);
        start = at + 1;
    }
    fields.push(&body[start..]);
    fields
}

fn text(value: &[u8]) -> String {
    String::from_utf8_lossy(value).into_owned()
}

fn invalid(key: &'static str, source: ValueError, body: &[u8]) -> DecodeError {
    DecodeError::InvalidValue {
        key,
        source,
        record: RawRecord::new(body),
    }
}

fn parse_int<T>(value: &[u8]) -> Result<T, ValueError>
where
    T: std::str::FromStr<Err = std::num::ParseIntError>,
{
    Ok(String::from_utf8_lossy(value).parse::<T>()?)
}

/// Accepts the same literals as Go's `strconv.ParseBool`, which is what
/// Postfix tooling emits and expects.
fn parse_bool(value: &[u8]) -> Result<bool, ValueError> {
    match value {
        b"1" | b"t" | b"T" | b"TRUE" | b"true" | b"True" => Ok(true),
        b"0" | b"f" | b"F" | b"FALSE" | b"false" | b"False" => Ok(false),
        other => Err(ValueError::Boolean(text(other))),
    }
}
