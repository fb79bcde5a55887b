//! Postfix showq Protocol
//!
//! Decoding of the queue listing that Postfix's `showq` service writes to
//! clients of its local socket: a sequence of NUL-separated key/value
//! records, one per queued message, closed by an empty record.

mod codec;
mod entry;
mod error;
mod reader;

pub use codec::{parse_record, ShowqCodec, ShowqFrame};
pub use entry::{encode_end, encode_listing, ArrivalTime, QueueEntry, Recipient};
pub use error::{DecodeError, RawRecord, ValueError};
pub use reader::{ReadStep, ShowqReader};
