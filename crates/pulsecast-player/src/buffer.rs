//! Decodable media buffer abstraction.
//!
//! [`MediaBuffer`] mirrors a media-source buffer: an append *starts* an
//! update and its completion arrives later as an [`UpdateEnd`] notification
//! on a separate channel. Capacity errors are reported synchronously by the
//! append call itself.

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::{AppendError, PlayerError};

/// MIME types the bundled buffer accepts.
pub const SUPPORTED_MIME_TYPES: &[&str] = &["audio/mpeg", "audio/wav"];

/// Receiver of append completions.
pub type UpdateEnds = mpsc::UnboundedReceiver<UpdateEnd>;

/// Completion of one append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateEnd {
    /// Bytes made playable by the completed append.
    pub bytes: usize,
}

/// Time range currently held by the buffer, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BufferedRange {
    pub start: f64,
    pub end: f64,
}

impl BufferedRange {
    #[must_use]
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    #[must_use]
    pub fn contains(&self, t: f64) -> bool {
        (self.start..=self.end).contains(&t)
    }

    #[must_use]
    pub fn clamp(&self, t: f64) -> f64 {
        t.clamp(self.start, self.end)
    }
}

/// A buffer the output decodes from.
///
/// At most one append may be outstanding: a second append before the first
/// one's [`UpdateEnd`] has been acknowledged with
/// [`MediaBuffer::finish_update`] fails with [`AppendError::Busy`].
pub trait MediaBuffer: Send {
    /// Prepare the buffer for `mime_type`. Unknown types are fatal.
    fn open(&mut self, mime_type: &str) -> Result<(), PlayerError>;

    /// Begin appending `data`.
    fn append(&mut self, data: Bytes) -> Result<(), AppendError>;

    /// Acknowledge the [`UpdateEnd`] of the last append.
    fn finish_update(&mut self);

    /// Remove up to `seconds` of the oldest audio. Returns the bytes removed.
    fn evict_front(&mut self, seconds: f64) -> usize;

    /// Put previously evicted audio back immediately before the buffered
    /// start. Completes synchronously and does not count as an append.
    fn restore_front(&mut self, data: Bytes) -> Result<(), AppendError>;

    /// Currently buffered range, `None` when empty.
    fn buffered(&self) -> Option<BufferedRange>;

    /// Drop all data and refuse further appends.
    fn release(&mut self);
}

// ── In-memory implementation ─────────────────────────────────────────────────

/// Capacity-bounded byte store that maps bytes to seconds with a fixed byte
/// rate.
#[derive(Debug)]
pub struct MemoryMediaBuffer {
    data: Vec<u8>,
    capacity: usize,
    byte_rate: f64,
    evicted: u64,
    /// Bytes whose append has been acknowledged.
    appended: u64,
    in_flight: usize,
    open: bool,
    updating: bool,
    updates: mpsc::UnboundedSender<UpdateEnd>,
}

impl MemoryMediaBuffer {
    /// Create a closed buffer and the receiver its completions arrive on.
    #[must_use]
    pub fn new(capacity: usize, byte_rate: u32) -> (Self, UpdateEnds) {
        let (updates, rx) = mpsc::unbounded_channel();
        let buffer = Self {
            data: Vec::new(),
            capacity,
            byte_rate: f64::from(byte_rate.max(1)),
            evicted: 0,
            appended: 0,
            in_flight: 0,
            open: false,
            updating: false,
            updates,
        };
        (buffer, rx)
    }

    /// Bytes currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub fn contents(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.open
    }

    #[allow(clippy::cast_precision_loss)]
    fn seconds(&self, bytes: u64) -> f64 {
        bytes as f64 / self.byte_rate
    }
}

impl MediaBuffer for MemoryMediaBuffer {
    fn open(&mut self, mime_type: &str) -> Result<(), PlayerError> {
        if !SUPPORTED_MIME_TYPES.contains(&mime_type) {
            return Err(PlayerError::UnsupportedFormat(mime_type.to_string()));
        }
        self.open = true;
        Ok(())
    }

    fn append(&mut self, data: Bytes) -> Result<(), AppendError> {
        if !self.open {
            return Err(AppendError::NotOpen);
        }
        if self.updating {
            return Err(AppendError::Busy);
        }
        let free = self.capacity.saturating_sub(self.data.len());
        if data.len() > free {
            return Err(AppendError::QuotaExceeded {
                requested: data.len(),
                free,
            });
        }

        self.data.extend_from_slice(&data);
        self.in_flight = data.len();
        self.updating = true;
        // The receiver only goes away with the session that owns this buffer.
        let _ = self.updates.send(UpdateEnd { bytes: data.len() });
        Ok(())
    }

    fn finish_update(&mut self) {
        self.appended += std::mem::take(&mut self.in_flight) as u64;
        self.updating = false;
    }

    fn evict_front(&mut self, seconds: f64) -> usize {
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss
        )]
        let wanted = (seconds.max(0.0) * self.byte_rate).ceil() as usize;
        // Only acknowledged audio can be evicted.
        let committed = self.data.len() - self.in_flight;
        let removed = wanted.min(committed);
        self.data.drain(..removed);
        self.evicted += removed as u64;
        removed
    }

    fn restore_front(&mut self, data: Bytes) -> Result<(), AppendError> {
        if !self.open {
            return Err(AppendError::NotOpen);
        }
        let requested = data.len();
        if requested as u64 > self.evicted {
            return Err(AppendError::RestoreOverrun {
                requested,
                evicted: self.evicted,
            });
        }
        let free = self.capacity.saturating_sub(self.data.len());
        if requested > free {
            return Err(AppendError::QuotaExceeded { requested, free });
        }

        self.data.splice(0..0, data.iter().copied());
        self.evicted -= requested as u64;
        Ok(())
    }

    fn buffered(&self) -> Option<BufferedRange> {
        if self.appended == self.evicted {
            return None;
        }
        Some(BufferedRange {
            start: self.seconds(self.evicted),
            end: self.seconds(self.appended),
        })
    }

    fn release(&mut self) {
        self.open = false;
        self.updating = false;
        self.evicted = self.appended;
        self.in_flight = 0;
        self.data = Vec::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_buffer(capacity: usize) -> (MemoryMediaBuffer, UpdateEnds) {
        let (mut buffer, updates) = MemoryMediaBuffer::new(capacity, 1000);
        buffer.open("audio/mpeg").unwrap();
        (buffer, updates)
    }

    #[test]
    fn rejects_unknown_mime_type() {
        let (mut buffer, _) = MemoryMediaBuffer::new(1024, 1000);
        assert_eq!(
            buffer.open("audio/ogg"),
            Err(PlayerError::UnsupportedFormat("audio/ogg".to_string()))
        );
        assert_eq!(
            buffer.append(Bytes::from_static(b"x")),
            Err(AppendError::NotOpen)
        );
    }

    #[test]
    fn append_completes_through_update_end() {
        let (mut buffer, mut updates) = open_buffer(1024);
        buffer.append(Bytes::from(vec![0; 500])).unwrap();
        assert_eq!(updates.try_recv().unwrap(), UpdateEnd { bytes: 500 });
        buffer.finish_update();
        assert_eq!(
            buffer.buffered(),
            Some(BufferedRange {
                start: 0.0,
                end: 0.5
            })
        );
    }

    #[test]
    fn in_flight_bytes_are_not_buffered_until_acknowledged() {
        let (mut buffer, _updates) = open_buffer(4096);
        buffer.append(Bytes::from(vec![0; 1000])).unwrap();
        assert_eq!(buffer.buffered(), None);
        assert_eq!(buffer.evict_front(10.0), 0);

        buffer.finish_update();
        buffer.append(Bytes::from(vec![0; 500])).unwrap();
        assert_eq!(
            buffer.buffered(),
            Some(BufferedRange {
                start: 0.0,
                end: 1.0
            })
        );
        assert_eq!(buffer.evict_front(10.0), 1000);
        assert_eq!(buffer.buffered(), None);
        assert_eq!(buffer.len(), 500);

        buffer.finish_update();
        assert_eq!(
            buffer.buffered(),
            Some(BufferedRange {
                start: 1.0,
                end: 1.5
            })
        );
    }

    #[test]
    fn second_append_before_acknowledgement_is_busy() {
        let (mut buffer, _updates) = open_buffer(1024);
        buffer.append(Bytes::from_static(b"one")).unwrap();
        assert_eq!(
            buffer.append(Bytes::from_static(b"two")),
            Err(AppendError::Busy)
        );
        buffer.finish_update();
        buffer.append(Bytes::from_static(b"two")).unwrap();
    }

    #[test]
    fn quota_and_eviction() {
        let (mut buffer, _updates) = open_buffer(2000);
        buffer.append(Bytes::from(vec![1; 1500])).unwrap();
        buffer.finish_update();

        assert_eq!(
            buffer.append(Bytes::from(vec![2; 1000])),
            Err(AppendError::QuotaExceeded {
                requested: 1000,
                free: 500
            })
        );

        assert_eq!(buffer.evict_front(1.0), 1000);
        let range = buffer.buffered().unwrap();
        assert!((range.start - 1.0).abs() < f64::EPSILON);
        assert!((range.end - 1.5).abs() < f64::EPSILON);

        buffer.append(Bytes::from(vec![2; 1000])).unwrap();
        assert_eq!(buffer.len(), 1500);
    }

    #[test]
    fn restore_puts_evicted_audio_back_in_front() {
        let (mut buffer, _updates) = open_buffer(2000);
        buffer.append(Bytes::from(vec![1; 1500])).unwrap();
        buffer.finish_update();
        assert_eq!(buffer.evict_front(1.0), 1000);

        assert_eq!(
            buffer.restore_front(Bytes::from(vec![1; 1200])),
            Err(AppendError::RestoreOverrun {
                requested: 1200,
                evicted: 1000
            })
        );

        buffer.restore_front(Bytes::from(vec![1; 400])).unwrap();
        let range = buffer.buffered().unwrap();
        assert!((range.start - 0.6).abs() < 1e-9);
        assert!((range.end - 1.5).abs() < f64::EPSILON);
        assert_eq!(buffer.len(), 900);

        buffer.append(Bytes::from(vec![2; 1000])).unwrap();
        assert_eq!(
            buffer.restore_front(Bytes::from(vec![1; 600])),
            Err(AppendError::QuotaExceeded {
                requested: 600,
                free: 100
            })
        );
    }

    #[test]
    fn release_drops_data() {
        let (mut buffer, _updates) = open_buffer(1024);
        buffer.append(Bytes::from_static(b"abc")).unwrap();
        buffer.release();
        assert!(buffer.is_empty());
        assert!(!buffer.is_open());
        assert_eq!(buffer.buffered(), None);
    }

    #[test]
    fn range_clamp() {
        let range = BufferedRange {
            start: 2.0,
            end: 5.0,
        };
        assert!((range.clamp(1.0) - 2.0).abs() < f64::EPSILON);
        assert!((range.clamp(9.0) - 5.0).abs() < f64::EPSILON);
        assert!(range.contains(3.0));
        assert!((range.duration() - 3.0).abs() < f64::EPSILON);
    }
}
