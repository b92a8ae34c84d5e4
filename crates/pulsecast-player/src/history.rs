//! Ordered log of every chunk the media buffer has accepted.
//!
//! Entries outlive eviction from the media buffer, so the log can answer
//! "which turn is at t" for any delivered position and reconstruct audio
//! for export.

use bytes::Bytes;
use pulsecast_core::Chunk;

/// One accepted chunk and where it sits in the stream.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub turn_index: usize,
    pub seq: usize,
    /// Offset of the first byte from the start of the stream.
    pub byte_offset: u64,
    /// Stream time of the first byte, in seconds.
    pub start_secs: f64,
    pub bytes: Bytes,
}

impl HistoryEntry {
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct HistoryLog {
    entries: Vec<HistoryEntry>,
    byte_rate: f64,
    total_bytes: u64,
}

impl HistoryLog {
    #[must_use]
    pub fn new(byte_rate: u32) -> Self {
        Self {
            entries: Vec::new(),
            byte_rate: f64::from(byte_rate.max(1)),
            total_bytes: 0,
        }
    }

    /// Append `chunk` at the current end of the stream.
    #[allow(clippy::cast_precision_loss)]
    pub fn record(&mut self, chunk: &Chunk) {
        self.entries.push(HistoryEntry {
            turn_index: chunk.turn_index,
            seq: chunk.seq,
            byte_offset: self.total_bytes,
            start_secs: self.total_bytes as f64 / self.byte_rate,
            bytes: chunk.bytes.clone(),
        });
        self.total_bytes += chunk.len() as u64;
    }

    #[must_use]
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub const fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn duration_secs(&self) -> f64 {
        self.total_bytes as f64 / self.byte_rate
    }

    /// Entry covering stream time `secs`.
    #[must_use]
    pub fn at(&self, secs: f64) -> Option<&HistoryEntry> {
        if secs < 0.0 || secs >= self.duration_secs() {
            return None;
        }
        let idx = self.entries.partition_point(|e| e.start_secs <= secs);
        idx.checked_sub(1).and_then(|i| self.entries.get(i))
    }

    /// Audio between two stream byte offsets, `from` inclusive.
    #[must_use]
    pub fn bytes_between(&self, from: u64, to: u64) -> Vec<u8> {
        let to = to.min(self.total_bytes);
        let mut out = Vec::new();
        if from >= to {
            return out;
        }
        let first = self
            .entries
            .partition_point(|e| e.byte_offset + e.len() as u64 <= from);
        for entry in self.entries.iter().skip(first) {
            if entry.byte_offset >= to {
                break;
            }
            let start = usize::try_from(from.saturating_sub(entry.byte_offset)).unwrap_or(0);
            let end = usize::try_from(to - entry.byte_offset).map_or(entry.len(), |end| end.min(entry.len()));
            if let Some(part) = entry.bytes.get(start..end) {
                out.extend_from_slice(part);
            }
        }
        out
    }

    /// Distinct turn indices in delivery order.
    #[must_use]
    pub fn turns(&self) -> Vec<usize> {
        let mut turns: Vec<usize> = self.entries.iter().map(|e| e.turn_index).collect();
        turns.dedup();
        turns
    }

    /// Concatenated audio of one turn.
    #[must_use]
    pub fn turn_audio(&self, turn_index: usize) -> Vec<u8> {
        self.entries
            .iter()
            .filter(|e| e.turn_index == turn_index)
            .flat_map(|e| e.bytes.iter().copied())
            .collect()
    }

    /// Concatenated audio of the whole stream.
    #[must_use]
    pub fn audio(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(usize::try_from(self.total_bytes).unwrap_or(0));
        for entry in &self.entries {
            out.extend_from_slice(&entry.bytes);
        }
        out
    }
}
