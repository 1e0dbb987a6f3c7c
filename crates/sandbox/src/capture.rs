//! Bounded output capture shared by the backends.

/// Keeps at most `limit` bytes of a child's output and counts the rest.
///
/// Readers keep pulling from the pipe after the limit is reached so the
/// child never blocks on a full pipe; the excess is simply dropped.
#[derive(Debug)]
pub struct Capture {
    kept: Vec<u8>,
    limit: usize,
    dropped: u64,
}

impl Capture {
    pub fn new(limit: usize) -> Self {
        Self {
            kept: Vec::new(),
            limit,
            dropped: 0,
        }
    }

    pub fn push(&mut self, bytes: &[u8]) {
        let room = self.limit.saturating_sub(self.kept.len());
        let take = room.min(bytes.len());
        self.kept.extend_from_slice(&bytes[..take]);
        self.dropped += (bytes.len() - take) as u64;
    }

    /// Bytes read past the limit.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Take the kept bytes, leaving the buffer empty.
    pub fn take(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.kept)
    }
}
