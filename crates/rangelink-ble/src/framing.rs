use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Maximum payload bytes carried by one notify chunk. The terminator
/// rides on the final chunk, so the last wire frame may carry up to
/// `MAX_CHUNK_SIZE + 2` bytes.
pub const MAX_CHUNK_SIZE: usize = 100;

/// In-band end-of-message delimiter.
pub const MESSAGE_TERMINATOR: &[u8] = b"\r\n";

/// One bounded-size fragment of a serialized message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    pub last: bool,
    pub bytes: Vec<u8>,
}

/// Splits a serialized message into ordered chunks, appending the
/// terminator to the final chunk's payload. An empty payload still
/// yields one terminal chunk so the message boundary is observable.
pub fn split_into_chunks(payload: &[u8], max_chunk: usize) -> Vec<Chunk> {
    let max_chunk = max_chunk.max(1);
    let mut chunks: Vec<Chunk> = payload
        .chunks(max_chunk)
        .enumerate()
        .map(|(index, bytes)| Chunk {
            index,
            last: false,
            bytes: bytes.to_vec(),
        })
        .collect();

    if chunks.is_empty() {
        chunks.push(Chunk {
            index: 0,
            last: false,
            bytes: Vec::new(),
        });
    }

    if let Some(chunk) = chunks.last_mut() {
        chunk.last = true;
        chunk.bytes.extend_from_slice(MESSAGE_TERMINATOR);
    }
    chunks
}

/// Bounds on a reassembly buffer. The reference transport had neither;
/// both close the unbounded-growth gap against a stalled or runaway
/// sender.
#[derive(Debug, Clone, Copy)]
pub struct ReassemblyLimits {
    pub max_buffer: usize,
    pub stall_timeout: Duration,
}

impl Default for ReassemblyLimits {
    fn default() -> Self {
        Self {
            max_buffer: 64 * 1024,
            stall_timeout: Duration::from_secs(30),
        }
    }
}

/// Result of feeding one fragment into a reassembly buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FragmentOutcome {
    /// Terminator not seen yet; awaiting more fragments.
    Incomplete,
    /// A full message was delimited and decoded.
    Complete(Value),
    /// Terminator seen but the accumulated bytes were not valid JSON;
    /// the buffer was discarded.
    ParseFailed,
    /// The fragment would exceed the buffer bound; everything pending
    /// (including this fragment) was discarded.
    Overflow,
}

/// Per-connection accumulator for write-characteristic fragments.
///
/// Holds at most one pending message: the terminator of message N must
/// arrive before any byte of message N+1.
#[derive(Debug)]
pub struct ReassemblyBuffer {
    buf: Vec<u8>,
    limits: ReassemblyLimits,
    last_fragment_at: Option<Instant>,
}

impl ReassemblyBuffer {
    pub fn new(limits: ReassemblyLimits) -> Self {
        Self {
            buf: Vec::new(),
            limits,
            last_fragment_at: None,
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Appends one fragment. When the buffer then ends with the
    /// terminator, the message is decoded, the buffer cleared, and the
    /// decoded value returned. Malformed messages are discarded without
    /// retry; decode failure is contained to this one message.
    pub fn push(&mut self, bytes: &[u8]) -> FragmentOutcome {
        let now = Instant::now();
        if let Some(last) = self.last_fragment_at {
            if !self.buf.is_empty() && now.duration_since(last) > self.limits.stall_timeout {
                warn!(
                    pending = self.buf.len(),
                    "discarding stalled partial message"
                );
                self.buf.clear();
            }
        }
        self.last_fragment_at = Some(now);

        if self.buf.len() + bytes.len() > self.limits.max_buffer {
            warn!(
                pending = self.buf.len(),
                incoming = bytes.len(),
                max = self.limits.max_buffer,
                "reassembly buffer overflow, discarding"
            );
            self.buf.clear();
            return FragmentOutcome::Overflow;
        }

        self.buf.extend_from_slice(bytes);
        if !self.buf.ends_with(MESSAGE_TERMINATOR) {
            return FragmentOutcome::Incomplete;
        }

        let body_len = self.buf.len() - MESSAGE_TERMINATOR.len();
        let outcome = match serde_json::from_slice::<Value>(&self.buf[..body_len]) {
            Ok(message) => FragmentOutcome::Complete(message),
            Err(err) => {
                debug!(%err, "dropping undecodable message");
                FragmentOutcome::ParseFailed
            }
        };
        self.buf.clear();
        outcome
    }
}

impl Default for ReassemblyBuffer {
    fn default() -> Self {
        Self::new(ReassemblyLimits::default())
    }
}
