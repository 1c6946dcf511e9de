//! Growable byte buffers with a fixed capacity and a monotonic write cursor.
//!
//! Mirrors the `put1`/`put2`/`put4`/`put8` shape of a `CodeSink`: every
//! write appends little-endian bytes and nothing here ever branches on
//! compiler state. Writes past capacity are dropped rather than panicking,
//! and the drop count is tracked so the caller can surface it as a warning.

/// Default code buffer capacity: 4 MiB.
pub const DEFAULT_CODE_CAPACITY: usize = 4 * 1024 * 1024;
/// Default data buffer capacity: 1 MiB.
pub const DEFAULT_DATA_CAPACITY: usize = 1024 * 1024;

/// An append-only byte buffer with a fixed capacity.
#[derive(Debug, Default)]
pub struct ByteBuffer {
    bytes: Vec<u8>,
    capacity: usize,
    dropped: u64,
}

impl ByteBuffer {
    pub fn new(capacity: usize) -> Self {
        ByteBuffer {
            bytes: Vec::with_capacity(capacity.min(64 * 1024)),
            capacity,
            dropped: 0,
        }
    }

    /// Current write cursor, i.e. the number of bytes written so far.
    pub fn len(&self) -> u32 {
        self.bytes.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total bytes silently dropped because the buffer was full.
    pub fn dropped_bytes(&self) -> u64 {
        self.dropped
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn put1(&mut self, b: u8) {
        if self.bytes.len() < self.capacity {
            self.bytes.push(b);
        } else {
            self.dropped += 1;
        }
    }

    pub fn put_bytes(&mut self, data: &[u8]) {
        for &b in data {
            self.put1(b);
        }
    }

    pub fn put2(&mut self, v: u16) {
        self.put_bytes(&v.to_le_bytes());
    }

    pub fn put4(&mut self, v: u32) {
        self.put_bytes(&v.to_le_bytes());
    }

    pub fn put_i32(&mut self, v: i32) {
        self.put4(v as u32);
    }

    pub fn put8(&mut self, v: u64) {
        self.put_bytes(&v.to_le_bytes());
    }

    /// Overwrite four bytes at `offset` with a little-endian `i32`. Used to
    /// resolve fixups once their target label is known. A no-op if `offset`
    /// falls outside the written region (can only happen if the original
    /// fixup write was itself dropped for capacity).
    pub fn patch_i32(&mut self, offset: u32, v: i32) {
        let offset = offset as usize;
        if offset + 4 <= self.bytes.len() {
            self.bytes[offset..offset + 4].copy_from_slice(&v.to_le_bytes());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_little_endian() {
        let mut buf = ByteBuffer::new(64);
        buf.put4(0x11223344);
        assert_eq!(buf.as_slice(), &[0x44, 0x33, 0x22, 0x11]);
    }

    #[test]
    fn drops_writes_past_capacity() {
        let mut buf = ByteBuffer::new(2);
        buf.put1(1);
        buf.put1(2);
        buf.put1(3);
        assert_eq!(buf.as_slice(), &[1, 2]);
        assert_eq!(buf.dropped_bytes(), 1);
    }

    #[test]
    fn patch_rewrites_in_place() {
        let mut buf = ByteBuffer::new(64);
        let at = buf.len();
        buf.put4(0);
        buf.put1(0xff);
        buf.patch_i32(at, -16);
        assert_eq!(&buf.as_slice()[..4], &(-16i32).to_le_bytes());
        assert_eq!(buf.as_slice()[4], 0xff);
    }
}
