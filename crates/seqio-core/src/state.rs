//! Shared fast-path state embedded by every stream implementation.
//!
//! A stream's hot operations (`read`/`write` against a non-empty internal
//! buffer window) only touch this record: a base pointer plus two `u32`
//! cursors and a status byte. No trait dispatch happens until the window
//! is exhausted.
//!
//! `base + offset` points at the next byte to read or write and
//! `available` counts how many such bytes the window still holds.
//! Advancing the window adds to `offset` and subtracts from `available`.

use std::ptr;

/// Sticky stream error. Set once, never cleared by stream operations.
pub const STATUS_ERROR: u8 = 1 << 0;
/// Sticky end of stream. Input-side terminal state.
pub const STATUS_END_OF_STREAM: u8 = 1 << 1;

pub struct StreamState {
    base: *mut u8,
    offset: u32,
    available: u32,
    flags: u8,
    manages_buffer: bool,
}

impl StreamState {
    /// `manages_buffer` is fixed for the lifetime of the stream object.
    pub fn new(manages_buffer: bool) -> Self {
        Self {
            base: ptr::null_mut(),
            offset: 0,
            available: 0,
            flags: 0,
            manages_buffer,
        }
    }

    #[inline]
    pub fn manages_buffer(&self) -> bool {
        self.manages_buffer
    }

    #[inline]
    pub fn base(&self) -> *mut u8 {
        self.base
    }

    pub fn set_base(&mut self, base: *mut u8) {
        self.base = base;
    }

    #[inline]
    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn set_offset(&mut self, offset: u32) {
        self.offset = offset;
    }

    #[inline]
    pub fn available(&self) -> u32 {
        self.available
    }

    pub fn set_available(&mut self, available: u32) {
        self.available = available;
    }

    pub fn set_window(&mut self, offset: u32, available: u32) {
        self.offset = offset;
        self.available = available;
    }

    /// Pointer to the next byte of the window. Only meaningful while
    /// `available() > 0`.
    #[inline]
    pub fn window_ptr(&self) -> *mut u8 {
        debug_assert!(!self.base.is_null());
        unsafe { self.base.add(self.offset as usize) }
    }

    /// Move the window cursor forward by `count` bytes.
    #[inline]
    pub fn advance(&mut self, count: usize) {
        debug_assert!(count <= self.available as usize);
        self.offset += count as u32;
        self.available -= count as u32;
    }

    #[inline]
    pub fn flags(&self) -> u8 {
        self.flags
    }

    pub fn set_flags(&mut self, flags: u8) {
        self.flags = flags;
    }

    pub fn set_error(&mut self) {
        self.flags |= STATUS_ERROR;
    }

    pub fn set_end_of_stream(&mut self) {
        self.flags |= STATUS_END_OF_STREAM;
    }

    #[inline]
    pub fn has_error(&self) -> bool {
        self.flags & STATUS_ERROR != 0
    }

    #[inline]
    pub fn at_end(&self) -> bool {
        self.flags & STATUS_END_OF_STREAM != 0
    }
}
