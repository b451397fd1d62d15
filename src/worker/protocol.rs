//! Supervisor/worker wire protocol
//!
//! The supervisor writes [`PROTOCOL_MAGIC`] once, then both sides exchange
//! frames: a little-endian `u32` length followed by a JSON payload. One
//! request is answered by exactly one response before the next request is
//! sent.

use crate::core::{Arguments, Failure, TaskResult};
use crate::error::{MputilsError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::io::{ErrorKind, Read, Write};

/// Magic bytes opening every worker session
pub const PROTOCOL_MAGIC: &[u8; 8] = b"MPWORKR1";

/// Maximum frame size (64 MB)
pub const MAX_FRAME_SIZE: usize = 64 * 1024 * 1024;

/// Run one registered function
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request<'a> {
    /// Request ID, echoed by the response
    pub id: u64,
    /// Registered function name
    pub function: Cow<'a, str>,
    /// Named arguments
    pub arguments: Cow<'a, Arguments>,
}

/// Result of one request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// ID of the request being answered
    pub id: u64,
    /// What the function produced
    pub outcome: Reply,
}

/// Wire form of a task result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reply {
    /// Returned value
    Ok(Value),
    /// Failure descriptor
    Err(Failure),
}

impl From<TaskResult> for Reply {
    fn from(result: TaskResult) -> Self {
        match result {
            Ok(value) => Reply::Ok(value),
            Err(failure) => Reply::Err(failure),
        }
    }
}

impl From<Reply> for TaskResult {
    fn from(reply: Reply) -> Self {
        match reply {
            Reply::Ok(value) => Ok(value),
            Reply::Err(failure) => Err(failure),
        }
    }
}

/// Write the session magic
pub fn write_magic<W: Write>(writer: &mut W) -> Result<()> {
    writer
        .write_all(PROTOCOL_MAGIC)
        .map_err(|e| MputilsError::protocol(e.to_string()))
}

/// Read and check the session magic
pub fn read_magic<R: Read>(reader: &mut R) -> Result<()> {
    let mut magic = [0u8; 8];
    reader
        .read_exact(&mut magic)
        .map_err(|e| MputilsError::protocol(e.to_string()))?;

    if &magic != PROTOCOL_MAGIC {
        return Err(MputilsError::protocol("Invalid protocol magic bytes"));
    }
    Ok(())
}

/// Serialize a message and write it as one frame
pub fn write_frame<W: Write, T: Serialize>(writer: &mut W, message: &T) -> Result<()> {
    let msg = serde_json::to_vec(message)?;
    if msg.len() > MAX_FRAME_SIZE {
        return Err(MputilsError::protocol(format!(
            "Message too large: {} bytes",
            msg.len()
        )));
    }

    let len = (msg.len() as u32).to_le_bytes();
    writer
        .write_all(&len)
        .and_then(|_| writer.write_all(&msg))
        .and_then(|_| writer.flush())
        .map_err(|e| MputilsError::protocol(e.to_string()))
}

/// Read one frame; `None` on a clean end of stream between frames
///
/// A stream that ends inside the length header or the payload is an error.
pub fn read_frame<R: Read, T: DeserializeOwned>(reader: &mut R) -> Result<Option<T>> {
    let mut len_buf = [0u8; 4];
    loop {
        match reader.read(&mut len_buf[..1]) {
            Ok(0) => return Ok(None),
            Ok(_) => break,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(MputilsError::protocol(e.to_string())),
        }
    }
    reader
        .read_exact(&mut len_buf[1..])
        .map_err(|e| MputilsError::protocol(format!("truncated frame header: {}", e)))?;

    let msg_len = u32::from_le_bytes(len_buf) as usize;
    if msg_len > MAX_FRAME_SIZE {
        return Err(MputilsError::protocol(format!(
            "Message too large: {} bytes",
            msg_len
        )));
    }

    let mut msg_buf = vec![0u8; msg_len];
    reader
        .read_exact(&mut msg_buf)
        .map_err(|e| MputilsError::protocol(e.to_string()))?;

    Ok(Some(serde_json::from_slice(&msg_buf)?))
}
