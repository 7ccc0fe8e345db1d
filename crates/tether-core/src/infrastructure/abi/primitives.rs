//! # Primitive ABI Types
//!
//! Owned byte buffers with a guaranteed memory layout, used to move native
//! allocations (raw socket addresses, query results) across the boundary.

/// FFI-safe owned buffer
///
/// Describes a heap region allocated by the Rust side. Whoever holds the
/// `FfiBuffer` value owns the region; it is intentionally not `Clone`.
///
/// **Memory Layout (32 bytes on 64-bit)**:
/// - Offset 0: `data` (pointer, 8 bytes)
/// - Offset 8: `len` (usize, 8 bytes)
/// - Offset 16: `cap` (usize, 8 bytes)
/// - Offset 24: `_padding` (u64, 8 bytes)
#[repr(C, align(8))]
#[derive(Debug)]
pub struct FfiBuffer {
    /// Pointer to buffer data
    pub data: *mut u8,
    /// Current length (valid data bytes)
    pub len: usize,
    /// Capacity (total allocated bytes)
    pub cap: usize,
    /// Explicit padding for alignment
    pub _padding: u64,
}

impl FfiBuffer {
    /// Create a new empty FfiBuffer
    pub const fn new() -> Self {
        Self {
            data: std::ptr::null_mut(),
            len: 0,
            cap: 0,
            _padding: 0,
        }
    }

    /// Take ownership of a `Vec` allocation without copying it
    pub fn from_vec(mut v: Vec<u8>) -> Self {
        if v.capacity() == 0 {
            return Self::new();
        }
        let data = v.as_mut_ptr();
        let len = v.len();
        let cap = v.capacity();
        std::mem::forget(v);
        Self {
            data,
            len,
            cap,
            _padding: 0,
        }
    }

    /// Give the allocation back to a `Vec`
    ///
    /// # Safety
    /// The buffer must have been produced by [`FfiBuffer::from_vec`] and its
    /// fields must not have been modified since.
    pub unsafe fn into_vec(self) -> Vec<u8> {
        if self.data.is_null() {
            return Vec::new();
        }
        // SAFETY: caller guarantees (data, len, cap) came from a Vec<u8>
        unsafe { Vec::from_raw_parts(self.data, self.len, self.cap) }
    }

    /// View the valid bytes
    ///
    /// # Safety
    /// `data` must point to at least `len` initialized bytes that stay alive
    /// for the returned lifetime.
    pub unsafe fn as_slice(&self) -> &[u8] {
        if self.data.is_null() {
            return &[];
        }
        // SAFETY: caller guarantees data/len describe a live allocation
        unsafe { std::slice::from_raw_parts(self.data, self.len) }
    }

    /// Verify buffer is valid for FFI crossing
    pub fn is_valid(&self) -> bool {
        // Null ptr with zero len/cap is valid (empty buffer)
        if self.data.is_null() {
            return self.len == 0 && self.cap == 0;
        }
        self.cap >= self.len && self.len > 0
    }

    /// Check if buffer holds no bytes
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for FfiBuffer {
    fn default() -> Self {
        Self::new()
    }
}

// SAFETY: FfiBuffer is a uniquely owned allocation (not Clone); moving it to
// another thread moves that ownership with it.
unsafe impl Send for FfiBuffer {}

// SAFETY: shared references only expose the immutable descriptor fields.
unsafe impl Sync for FfiBuffer {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ffi_buffer_creation() {
        let buf = FfiBuffer::new();
        assert!(buf.data.is_null());
        assert_eq!(buf.len, 0);
        assert_eq!(buf.cap, 0);
        assert!(buf.is_valid());
        assert!(buf.is_empty());
    }

    #[test]
    fn ffi_buffer_size_and_align() {
        assert_eq!(
            std::mem::align_of::<FfiBuffer>(),
            8,
            "FfiBuffer must be 8-byte aligned"
        );
        #[cfg(target_pointer_width = "64")]
        assert_eq!(
            std::mem::size_of::<FfiBuffer>(),
            32,
            "FfiBuffer must be exactly 32 bytes"
        );
    }

    #[test]
    fn from_vec_preserves_allocation() {
        let data = vec![1u8, 2, 3, 4];
        let ptr = data.as_ptr();

        let buf = FfiBuffer::from_vec(data);
        assert_eq!(buf.data as *const u8, ptr);
        assert_eq!(buf.len, 4);
        assert!(buf.is_valid());
        assert_eq!(unsafe { buf.as_slice() }, &[1, 2, 3, 4]);

        let back = unsafe { buf.into_vec() };
        assert_eq!(back.as_ptr(), ptr);
        assert_eq!(back, vec![1, 2, 3, 4]);
    }

    #[test]
    fn from_empty_vec_is_null() {
        let buf = FfiBuffer::from_vec(Vec::new());
        assert!(buf.data.is_null());
        assert!(unsafe { buf.into_vec() }.is_empty());
    }

    #[test]
    fn invalid_when_len_exceeds_cap() {
        let mut byte = 0u8;
        let buf = FfiBuffer {
            data: &mut byte,
            len: 4,
            cap: 1,
            _padding: 0,
        };
        assert!(!buf.is_valid());
    }
}
