//! Serialized cache form of a [`Table`]
//!
//! # Format
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       4     Magic ("MXTB")
//! 4       1     Format version
//! 5       4     Payload size (bytes, little-endian)
//! 9       n     Postcard-encoded table
//! ```
//!
//! Files are written to a temporary sibling and renamed into place, so a
//! reader never sees a partially written snapshot.

use std::fs;
use std::io::Write;
use std::path::Path;

use thiserror::Error;

use crate::table::Table;

/// Magic bytes identifying a snapshot file
pub const MAGIC: &[u8; 4] = b"MXTB";

/// Current format version
pub const CURRENT_VERSION: u8 = 1;

const HEADER_SIZE: usize = 9;

/// Errors from writing or reading a snapshot
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Encoding error: {0}")]
    Encoding(#[from] postcard::Error),

    #[error("Not a table snapshot (bad magic bytes)")]
    NotASnapshot,

    #[error("Unsupported snapshot version {found} (expected {CURRENT_VERSION})")]
    UnsupportedVersion { found: u8 },

    #[error("Payload of {0} bytes exceeds the 4 GiB snapshot limit")]
    TooLarge(usize),

    #[error("Snapshot truncated: header declares {expected} payload bytes, found {actual}")]
    Truncated { expected: usize, actual: usize },
}

/// Encode a table with the snapshot header
pub fn encode(table: &Table) -> Result<Vec<u8>, SnapshotError> {
    let payload = postcard::to_allocvec(table)?;
    let size = payload_size(payload.len())?;
    let mut out = Vec::with_capacity(HEADER_SIZE + payload.len());
    out.extend_from_slice(MAGIC);
    out.push(CURRENT_VERSION);
    out.extend_from_slice(&size.to_le_bytes());
    out.extend_from_slice(&payload);
    Ok(out)
}

fn payload_size(len: usize) -> Result<u32, SnapshotError> {
    u32::try_from(len).map_err(|_| SnapshotError::TooLarge(len))
}

/// Decode a snapshot produced by [`encode`]
pub fn decode(bytes: &[u8]) -> Result<Table, SnapshotError> {
    if bytes.len() < HEADER_SIZE || &bytes[..4] != MAGIC {
        return Err(SnapshotError::NotASnapshot);
    }
    if bytes[4] != CURRENT_VERSION {
        return Err(SnapshotError::UnsupportedVersion { found: bytes[4] });
    }
    let mut size = [0u8; 4];
    size.copy_from_slice(&bytes[5..HEADER_SIZE]);
    let expected = u32::from_le_bytes(size) as usize;
    let payload = &bytes[HEADER_SIZE..];
    if payload.len() < expected {
        return Err(SnapshotError::Truncated {
            expected,
            actual: payload.len(),
        });
    }
    Ok(postcard::from_bytes(&payload[..expected])?)
}

/// Write `table` to `path`, replacing any existing file
pub fn write(path: &Path, table: &Table) -> Result<(), SnapshotError> {
    let bytes = encode(table)?;
    let tmp = path.with_extension(format!("tmp.{}", std::process::id()));

    let result = fs::File::create(&tmp).and_then(|mut file| {
        file.write_all(&bytes)?;
        file.sync_all()
    });
    if let Err(e) = result.and_then(|_| fs::rename(&tmp, path)) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }

    tracing::debug!(path = %path.display(), bytes = bytes.len(), "Wrote table snapshot");
    Ok(())
}

/// Read a snapshot written by [`write`]
pub fn read(path: &Path) -> Result<Table, SnapshotError> {
    decode(&fs::read(path)?)
}
