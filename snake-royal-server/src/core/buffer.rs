//! Cursor-Addressed Byte Buffer
//!
//! Growable byte container used for every receive, send and scratch region
//! in the network layer. Supports overwrite-write, shift-insert, shift-erase,
//! sequential reads and clamped seeking.
//!
//! A buffer either owns its storage or borrows a caller supplied slice.
//! Borrowed buffers never reallocate; growing one past its slice is a bug in
//! the caller and panics.

use std::fmt;

/// Cursor positioning for [`ByteBuffer::seek`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Seek {
    /// Absolute position from the start.
    Start(usize),
    /// Relative to the current cursor.
    Current(isize),
    /// Relative to the end (`End(0)` is the end, negative moves back).
    End(isize),
}

enum Storage<'a> {
    Owned(Vec<u8>),
    Borrowed(&'a mut [u8]),
}

impl Storage<'_> {
    #[inline]
    fn bytes(&self) -> &[u8] {
        match self {
            Storage::Owned(v) => v,
            Storage::Borrowed(s) => s,
        }
    }

    #[inline]
    fn bytes_mut(&mut self) -> &mut [u8] {
        match self {
            Storage::Owned(v) => v,
            Storage::Borrowed(s) => s,
        }
    }
}

/// Growable byte buffer with a read/write cursor.
///
/// Invariant: `0 <= offset <= len <= capacity`.
pub struct ByteBuffer<'a> {
    storage: Storage<'a>,
    size: usize,
    offset: usize,
}

/// A buffer that owns its storage.
pub type OwnedBuffer = ByteBuffer<'static>;

impl ByteBuffer<'static> {
    /// Create an empty owned buffer.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create an owned buffer with room for `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            storage: Storage::Owned(vec![0; capacity]),
            size: 0,
            offset: 0,
        }
    }
}

impl Default for ByteBuffer<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> ByteBuffer<'a> {
    /// Empty scratch view over `slice`. Capacity is fixed at `slice.len()`.
    pub fn borrowed(slice: &'a mut [u8]) -> Self {
        Self {
            storage: Storage::Borrowed(slice),
            size: 0,
            offset: 0,
        }
    }

    /// View over bytes that are already filled in, cursor at the start.
    pub fn from_slice(slice: &'a mut [u8]) -> Self {
        let size = slice.len();
        Self {
            storage: Storage::Borrowed(slice),
            size,
            offset: 0,
        }
    }

    /// Committed length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.size
    }

    /// True when no bytes are committed.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Allocated capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.storage.bytes().len()
    }

    /// Current cursor position.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Bytes between the cursor and the end.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.size - self.offset
    }

    /// True when the buffer borrows external memory.
    pub fn is_borrowed(&self) -> bool {
        matches!(self.storage, Storage::Borrowed(_))
    }

    /// Committed bytes.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.storage.bytes()[..self.size]
    }

    /// Committed bytes, mutable.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        let size = self.size;
        &mut self.storage.bytes_mut()[..size]
    }

    /// Make sure `required` bytes fit, reallocating owned storage if needed.
    fn ensure_capacity(&mut self, required: usize) {
        let capacity = self.capacity();
        if required <= capacity {
            return;
        }
        match &mut self.storage {
            Storage::Owned(v) => v.resize((required + 1) * 2, 0),
            Storage::Borrowed(_) => panic!(
                "borrowed ByteBuffer overflow: need {} bytes, capacity is {}",
                required, capacity
            ),
        }
    }

    /// Overwrite at the cursor, growing as needed. Returns bytes written.
    pub fn write(&mut self, bytes: &[u8]) -> usize {
        let end = self.offset + bytes.len();
        self.ensure_capacity(end);
        self.storage.bytes_mut()[self.offset..end].copy_from_slice(bytes);
        self.size = self.size.max(end);
        self.offset = end;
        bytes.len()
    }

    /// Grow by `n` zeroed bytes at the cursor without copying anything in.
    ///
    /// Returns the cursor position before the call; the reserved region is
    /// `[returned, returned + n)` and can be filled through `as_mut_slice`.
    pub fn reserve_room(&mut self, n: usize) -> usize {
        let start = self.offset;
        let end = start + n;
        self.ensure_capacity(end);
        self.storage.bytes_mut()[start..end].fill(0);
        self.size = self.size.max(end);
        self.offset = end;
        start
    }

    /// Shift everything at/after the cursor right and write `bytes` in the gap.
    pub fn insert(&mut self, bytes: &[u8]) -> usize {
        let n = bytes.len();
        if n == 0 {
            return 0;
        }
        self.ensure_capacity(self.size + n);
        let (offset, size) = (self.offset, self.size);
        let data = self.storage.bytes_mut();
        data.copy_within(offset..size, offset + n);
        data[offset..offset + n].copy_from_slice(bytes);
        self.size += n;
        self.offset += n;
        n
    }

    /// Remove up to `n` bytes at the cursor, shifting the tail left.
    ///
    /// Returns the number of bytes actually removed.
    pub fn erase(&mut self, n: usize) -> usize {
        if self.size == 0 {
            return 0;
        }
        let n = n.min(self.size - self.offset);
        if n == 0 {
            return 0;
        }
        let (offset, size) = (self.offset, self.size);
        self.storage
            .bytes_mut()
            .copy_within(offset + n..size, offset);
        self.size -= n;
        n
    }

    /// Copy up to `out.len()` bytes from the cursor. A short read is not an error.
    pub fn read(&mut self, out: &mut [u8]) -> usize {
        let n = out.len().min(self.remaining());
        out[..n].copy_from_slice(&self.storage.bytes()[self.offset..self.offset + n]);
        self.offset += n;
        n
    }

    /// Move the cursor, clamped to `[0, len]`. Returns the new position.
    pub fn seek(&mut self, pos: Seek) -> usize {
        let target = match pos {
            Seek::Start(at) => at as i128,
            Seek::Current(delta) => self.offset as i128 + delta as i128,
            Seek::End(delta) => self.size as i128 + delta as i128,
        };
        self.offset = target.clamp(0, self.size as i128) as usize;
        self.offset
    }

    /// Drop all committed bytes, keeping the allocation.
    pub fn clear(&mut self) {
        self.size = 0;
        self.offset = 0;
    }
}

impl fmt::Debug for ByteBuffer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteBuffer")
            .field("len", &self.size)
            .field("offset", &self.offset)
            .field("capacity", &self.capacity())
            .field("borrowed", &self.is_borrowed())
            .finish()
    }
}
