//! WAL Entry definitions
//!
//! Defines the structure of individual WAL records and their binary codec.

use std::io::Read;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Result, StoreError};

/// Size of the fixed record header in bytes
pub const HEADER_SIZE: usize = 25;

/// Header fields covered by both checksums (timestamp, lengths, op)
const CHECKSUMMED_HEADER: usize = 17;

const OP_SET: u8 = 1;
const OP_DELETE: u8 = 2;

/// A single entry in the WAL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalEntry {
    /// Timestamp (unix millis) when the entry was created
    pub timestamp: u64,

    /// The operation to perform
    pub operation: Operation,
}

/// Operations that can be logged
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Set a key to a value (the value may be empty)
    Set { key: Vec<u8>, value: Vec<u8> },

    /// Delete a key (tombstone)
    Delete { key: Vec<u8> },
}

impl Operation {
    pub fn key(&self) -> &[u8] {
        match self {
            Operation::Set { key, .. } | Operation::Delete { key } => key,
        }
    }

    /// The value for a Set, `None` for a Delete
    pub fn value(&self) -> Option<&[u8]> {
        match self {
            Operation::Set { value, .. } => Some(value),
            Operation::Delete { .. } => None,
        }
    }

    pub fn is_set(&self) -> bool {
        matches!(self, Operation::Set { .. })
    }
}

impl WalEntry {
    pub fn new(timestamp: u64, operation: Operation) -> Self {
        Self {
            timestamp,
            operation,
        }
    }

    pub fn key(&self) -> &[u8] {
        self.operation.key()
    }

    /// Number of bytes this entry occupies on disk
    pub fn encoded_len(&self) -> u64 {
        let value_len = self.operation.value().map_or(0, <[u8]>::len);
        (HEADER_SIZE + self.key().len() + value_len) as u64
    }

    /// Encode into a complete on-disk record
    pub fn encode(&self) -> Result<Bytes> {
        encode_record(self.timestamp, self.key(), self.operation.value())
    }

    /// Decode the record at the start of `bytes`.
    ///
    /// Bytes past the first record are ignored. An incomplete or torn record
    /// is reported as corruption since a standalone buffer has no "tail".
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = bytes;
        match decode_one(&mut reader, 0, bytes.len() as u64)? {
            Decoded::Record { entry, .. } => Ok(entry),
            Decoded::EndOfLog | Decoded::TruncatedTail => Err(StoreError::corruption(
                0,
                format!("incomplete record in {} byte buffer", bytes.len()),
            )),
        }
    }
}

/// Encode one record: fixed header, then raw key and value bytes.
///
/// `value == None` encodes a Delete with `value_length = 0` and no payload.
pub fn encode_record(timestamp: u64, key: &[u8], value: Option<&[u8]>) -> Result<Bytes> {
    let key_len = u32::try_from(key.len()).map_err(|_| {
        StoreError::InvalidArgument(format!("key of {} bytes exceeds u32::MAX", key.len()))
    })?;
    let value_bytes = value.unwrap_or_default();
    let value_len = u32::try_from(value_bytes.len()).map_err(|_| {
        StoreError::InvalidArgument(format!(
            "value of {} bytes exceeds u32::MAX",
            value_bytes.len()
        ))
    })?;
    let op = if value.is_some() { OP_SET } else { OP_DELETE };

    let mut buf = BytesMut::with_capacity(HEADER_SIZE + key.len() + value_bytes.len());
    buf.put_u64_le(timestamp);
    buf.put_u32_le(key_len);
    buf.put_u32_le(value_len);
    buf.put_u8(op);
    let header_crc = crc32fast::hash(&buf[..CHECKSUMMED_HEADER]);
    let crc = checksum(&buf[..CHECKSUMMED_HEADER], key, value_bytes);
    buf.put_u32_le(header_crc);
    buf.put_u32_le(crc);
    buf.put_slice(key);
    buf.put_slice(value_bytes);

    Ok(buf.freeze())
}

/// Outcome of decoding at one offset
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// A complete, checksummed record and the offset right after it
    Record { entry: WalEntry, next_offset: u64 },

    /// No bytes remain
    EndOfLog,

    /// The remaining bytes are an incomplete final record (interrupted write)
    TruncatedTail,
}

/// Decode the record starting at `offset`.
///
/// `reader` must be positioned at `offset`; `file_len` is the log length used
/// to tell a short tail from a complete record.
///
/// The header has its own checksum, so lengths are only trusted once it
/// matches: a complete header that fails it is corruption, never a tail. A
/// valid header whose record runs past `file_len` is a torn write. A payload
/// checksum mismatch on the record that ends exactly at `file_len` is a torn
/// write, anywhere else it is corruption.
pub fn decode_one<R: Read>(reader: &mut R, offset: u64, file_len: u64) -> Result<Decoded> {
    let remaining = file_len.saturating_sub(offset);
    if remaining == 0 {
        return Ok(Decoded::EndOfLog);
    }
    if remaining < HEADER_SIZE as u64 {
        return Ok(Decoded::TruncatedTail);
    }

    let mut raw = [0u8; HEADER_SIZE];
    reader.read_exact(&mut raw)?;
    let header = Header::parse(&raw);
    if crc32fast::hash(&raw[..CHECKSUMMED_HEADER]) != header.header_crc {
        return Err(StoreError::corruption(offset, "header checksum mismatch"));
    }

    let record_len = HEADER_SIZE as u64 + header.payload_len();
    if record_len > remaining {
        return Ok(Decoded::TruncatedTail);
    }

    let mut payload = vec![0u8; header.payload_len() as usize];
    reader.read_exact(&mut payload)?;
    let next_offset = offset + record_len;

    let (key, value) = payload.split_at(header.key_len as usize);
    if checksum(&raw[..CHECKSUMMED_HEADER], key, value) != header.crc {
        if next_offset == file_len {
            return Ok(Decoded::TruncatedTail);
        }
        return Err(StoreError::corruption(offset, "payload checksum mismatch"));
    }

    let operation = header.into_operation(offset, payload)?;
    Ok(Decoded::Record {
        entry: WalEntry::new(header.timestamp, operation),
        next_offset,
    })
}

fn checksum(header: &[u8], key: &[u8], value: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(header);
    hasher.update(key);
    hasher.update(value);
    hasher.finalize()
}

#[derive(Clone, Copy)]
struct Header {
    timestamp: u64,
    key_len: u32,
    value_len: u32,
    op: u8,
    header_crc: u32,
    crc: u32,
}

impl Header {
    fn parse(raw: &[u8; HEADER_SIZE]) -> Self {
        let mut buf = &raw[..];
        Self {
            timestamp: buf.get_u64_le(),
            key_len: buf.get_u32_le(),
            value_len: buf.get_u32_le(),
            op: buf.get_u8(),
            header_crc: buf.get_u32_le(),
            crc: buf.get_u32_le(),
        }
    }

    fn payload_len(&self) -> u64 {
        u64::from(self.key_len) + u64::from(self.value_len)
    }

    fn into_operation(self, offset: u64, mut payload: Vec<u8>) -> Result<Operation> {
        let value = payload.split_off(self.key_len as usize);
        match self.op {
            OP_SET => Ok(Operation::Set {
                key: payload,
                value,
            }),
            OP_DELETE if value.is_empty() => Ok(Operation::Delete { key: payload }),
            OP_DELETE => Err(StoreError::corruption(
                offset,
                format!("delete record carries {} value bytes", value.len()),
            )),
            other => Err(StoreError::corruption(
                offset,
                format!("unknown operation tag {other:#04x}"),
            )),
        }
    }
}
