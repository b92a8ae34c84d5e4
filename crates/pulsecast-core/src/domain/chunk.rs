//! Fixed-size slices of a turn's encoded audio.

use bytes::Bytes;

/// Default chunk size in raw bytes (before base64 encoding on the wire).
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// A bounded slice of one turn's encoded audio, the unit of wire transmission.
///
/// `seq` is contiguous from 0 within a turn. Concatenating every chunk of a
/// turn in `seq` order reproduces that turn's audio exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub turn_index: usize,
    pub seq: usize,
    pub bytes: Bytes,
}

impl Chunk {
    #[must_use]
    pub const fn new(turn_index: usize, seq: usize, bytes: Bytes) -> Self {
        Self {
            turn_index,
            seq,
            bytes,
        }
    }

    /// Size of the payload in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Split a turn's audio into chunks of at most `chunk_size` bytes.
///
/// Slices share the underlying allocation of `audio`; nothing is copied.
/// A `chunk_size` of zero is treated as one.
pub fn split_audio(
    turn_index: usize,
    audio: &Bytes,
    chunk_size: usize,
) -> impl Iterator<Item = Chunk> + '_ {
    let size = chunk_size.max(1);
    (0..audio.len())
        .step_by(size)
        .enumerate()
        .map(move |(seq, start)| {
            let end = (start + size).min(audio.len());
            Chunk::new(turn_index, seq, audio.slice(start..end))
        })
}
