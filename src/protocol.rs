//! Wire constants and frame-header codec for the ferry framed transport

use crate::error::{FerryError, Result};

// Protocol header constants
pub const MAGIC: &[u8; 4] = b"FRRY";
pub const VERSION: u16 = 1;

/// Frame header layout: MAGIC (4) | VERSION (2) | TYPE (1) | LENGTH (4, LE)
pub const HEADER_LEN: usize = 11;

// Maximum structured-frame payload (16MB) - prevents memory exhaustion from a
// hostile length prefix. Raw file payloads are not framed; they are bounded by
// the size declared in the preceding handshake instead.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

// Chunk size for raw payload copies
pub const COPY_CHUNK: usize = 64 * 1024;

// Frame type IDs
pub mod frame {
    /// Structured request (client to server).
    pub const REQUEST: u8 = 1;
    /// Structured response or handshake token (either direction).
    pub const RESPONSE: u8 = 2;
}

// Centralized deadline constants. A session may legitimately sit idle between
// requests, so the wait for the first header byte is unbounded; every read or
// write inside an in-flight exchange is deadline-bounded.
pub mod timeouts {
    // Connection establishment timeout (ms)
    pub const CONNECT_MS: u64 = 5_000;

    // Client-side wait for a structured response (ms)
    pub const RESPONSE_MS: u64 = 5_000;

    // Wait for the readiness token before a bulk transfer (ms)
    pub const READY_MS: u64 = 5_000;

    // Base timeout for writes (ms)
    pub const WRITE_BASE_MS: u64 = 1_000;

    // Base timeout for reads (ms)
    pub const READ_BASE_MS: u64 = 1_000;

    // Additional timeout per MB of data (ms)
    pub const PER_MB_MS: u64 = 100;

    // Calculate write deadline based on payload size (ms)
    pub fn write_deadline_ms(payload_len: usize) -> u64 {
        let mb = (payload_len as u64 + 1_048_575) / 1_048_576;
        WRITE_BASE_MS + mb * PER_MB_MS
    }

    // Calculate read deadline based on payload size (ms)
    pub fn read_deadline_ms(payload_len: usize) -> u64 {
        let mb = (payload_len as u64 + 1_048_575) / 1_048_576;
        READ_BASE_MS + mb * PER_MB_MS
    }
}

/// Reject frame payloads larger than [`MAX_FRAME_SIZE`].
pub fn validate_frame_size(size: usize) -> Result<()> {
    if size > MAX_FRAME_SIZE {
        return Err(FerryError::protocol(format!(
            "frame payload too large: {} bytes (max: {})",
            size, MAX_FRAME_SIZE
        )));
    }
    Ok(())
}

/// Build frame header (11 bytes)
pub fn build_frame_header(frame_type: u8, payload_len: u32) -> [u8; HEADER_LEN] {
    let mut header = [0u8; HEADER_LEN];
    header[0..4].copy_from_slice(MAGIC);
    header[4..6].copy_from_slice(&VERSION.to_le_bytes());
    header[6] = frame_type;
    header[7..11].copy_from_slice(&payload_len.to_le_bytes());
    header
}

/// Parse frame header
/// Returns: (frame_type, payload_length)
pub fn parse_frame_header(header: &[u8; HEADER_LEN]) -> Result<(u8, u32)> {
    if &header[0..4] != MAGIC {
        return Err(FerryError::protocol("invalid magic in frame header"));
    }

    let version = u16::from_le_bytes([header[4], header[5]]);
    if version != VERSION {
        return Err(FerryError::protocol(format!(
            "protocol version mismatch: got {}, expected {}",
            version, VERSION
        )));
    }

    let frame_type = header[6];
    let payload_len = u32::from_le_bytes([header[7], header[8], header[9], header[10]]);

    Ok((frame_type, payload_len))
}
