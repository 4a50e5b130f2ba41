//! Bounds-checked, byte-addressable register memory.
//!
//! A [`RegisterBuffer`] is the memory a bus master sees through the module
//! protocol. Every access (raw, bit-level or typed) is checked against the
//! buffer length. The `try_` methods report violations as [`BufferError`];
//! everything else treats a violation as fatal.

use crate::fatal;
use heapless::Vec;
use thiserror::Error;

/// Largest register buffer a single-byte register address can cover.
pub const MAX_REGISTER_LEN: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BufferError {
    #[error("transfer of {len} bytes at offset {pos} is outside a {size} byte buffer")]
    OutOfBounds { pos: usize, len: usize, size: usize },
    #[error("{requested} bytes requested, capacity is {capacity}")]
    CapacityExceeded { requested: usize, capacity: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    Read,
    Write,
}

/// Describes one completed access, passed to the buffer hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Access {
    pub kind: AccessKind,
    pub pos: usize,
    pub len: usize,
}

/// Change-notification hook, called after every read or write.
pub type AccessHook = fn(Access);

/// Checks a transfer of `len` bytes starting at `pos` against a buffer of
/// `size` bytes.
pub fn check_transfer(pos: usize, len: usize, size: usize) -> Result<(), BufferError> {
    match pos.checked_add(len) {
        Some(end) if pos < size && end <= size => Ok(()),
        _ => Err(BufferError::OutOfBounds { pos, len, size }),
    }
}

/// A value that can be stored in registers, little-endian.
pub trait Field: Copy {
    const SIZE: usize;

    /// `bytes` is exactly `SIZE` long.
    fn decode(bytes: &[u8]) -> Self;
    /// `out` is exactly `SIZE` long.
    fn encode(self, out: &mut [u8]);
}

macro_rules! impl_field {
    ($($t:ty),*) => {
        $(
            impl Field for $t {
                const SIZE: usize = core::mem::size_of::<$t>();

                fn decode(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; core::mem::size_of::<$t>()];
                    raw.copy_from_slice(bytes);
                    <$t>::from_le_bytes(raw)
                }

                fn encode(self, out: &mut [u8]) {
                    out.copy_from_slice(&self.to_le_bytes());
                }
            }
        )*
    };
}

impl_field!(u8, u16, u32, i8, i16, i32);

#[derive(Debug, Clone)]
pub struct RegisterBuffer {
    data: Vec<u8, MAX_REGISTER_LEN>,
    pos: usize,
    hook: Option<AccessHook>,
}

impl RegisterBuffer {
    /// Creates a zero-filled buffer of `len` bytes. Halts if `len` exceeds
    /// [`MAX_REGISTER_LEN`].
    pub fn new(len: usize) -> Self {
        fatal::check(Self::try_new(len))
    }

    pub fn try_new(len: usize) -> Result<Self, BufferError> {
        let mut data = Vec::new();
        data.resize(len, 0).map_err(|()| BufferError::CapacityExceeded {
            requested: len,
            capacity: MAX_REGISTER_LEN,
        })?;
        Ok(Self { data, pos: 0, hook: None })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The cursor: one past the last byte of the most recent access.
    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn set_hook(&mut self, hook: Option<AccessHook>) {
        self.hook = hook;
    }

    fn notify(&self, kind: AccessKind, pos: usize, len: usize) {
        if let Some(hook) = self.hook {
            hook(Access { kind, pos, len });
        }
    }

    pub fn try_write(&mut self, pos: usize, src: &[u8]) -> Result<(), BufferError> {
        check_transfer(pos, src.len(), self.data.len())?;
        self.data[pos..pos + src.len()].copy_from_slice(src);
        self.pos = pos + src.len();
        self.notify(AccessKind::Write, pos, src.len());
        Ok(())
    }

    pub fn write(&mut self, pos: usize, src: &[u8]) {
        fatal::check(self.try_write(pos, src));
    }

    /// Writes at the cursor.
    pub fn write_next(&mut self, src: &[u8]) {
        self.write(self.pos, src);
    }

    /// Reads without moving the cursor.
    pub fn try_peek(&self, pos: usize, dst: &mut [u8]) -> Result<(), BufferError> {
        check_transfer(pos, dst.len(), self.data.len())?;
        dst.copy_from_slice(&self.data[pos..pos + dst.len()]);
        self.notify(AccessKind::Read, pos, dst.len());
        Ok(())
    }

    pub fn peek(&self, pos: usize, dst: &mut [u8]) {
        fatal::check(self.try_peek(pos, dst));
    }

    pub fn try_read(&mut self, pos: usize, dst: &mut [u8]) -> Result<(), BufferError> {
        self.try_peek(pos, dst)?;
        self.pos = pos + dst.len();
        Ok(())
    }

    pub fn read(&mut self, pos: usize, dst: &mut [u8]) {
        fatal::check(self.try_read(pos, dst));
    }

    /// Reads at the cursor.
    pub fn read_next(&mut self, dst: &mut [u8]) {
        self.read(self.pos, dst);
    }

    pub fn get<T: Field>(&self, pos: usize) -> T {
        let mut raw = [0u8; 8];
        let raw = &mut raw[..T::SIZE];
        self.peek(pos, raw);
        T::decode(raw)
    }

    pub fn set<T: Field>(&mut self, pos: usize, value: T) {
        let mut raw = [0u8; 8];
        let raw = &mut raw[..T::SIZE];
        value.encode(raw);
        self.write(pos, raw);
    }

    fn byte(&self, pos: usize) -> u8 {
        self.get::<u8>(pos)
    }

    /// Writes `value` only if it differs from the stored byte, so unchanged
    /// bits never fire the hook.
    fn write_byte_if_changed(&mut self, pos: usize, value: u8) {
        if self.byte(pos) != value {
            self.write(pos, &[value]);
        }
    }

    pub fn bit_get(&self, pos: usize, sig: u8) -> bool {
        self.byte(pos) & (1 << sig) != 0
    }

    pub fn bit_set(&mut self, pos: usize, sig: u8, state: bool) {
        let current = self.byte(pos);
        let value = if state {
            current | (1 << sig)
        } else {
            current & !(1 << sig)
        };
        self.write_byte_if_changed(pos, value);
    }

    pub fn bit_clear(&mut self, pos: usize, sig: u8) {
        self.bit_set(pos, sig, false);
    }

    pub fn bit_set_mask(&mut self, pos: usize, mask: u8) {
        let value = self.byte(pos) | mask;
        self.write_byte_if_changed(pos, value);
    }

    pub fn bit_clear_mask(&mut self, pos: usize, mask: u8) {
        let value = self.byte(pos) & !mask;
        self.write_byte_if_changed(pos, value);
    }

    /// Extracts the multi-bit field selected by `mask`, shifted down by `shift`.
    pub fn field_get(&self, pos: usize, mask: u8, shift: u8) -> u8 {
        (self.byte(pos) & mask) >> shift
    }

    pub fn field_set(&mut self, pos: usize, mask: u8, shift: u8, value: u8) {
        let merged = (self.byte(pos) & !mask) | ((value << shift) & mask);
        self.write_byte_if_changed(pos, merged);
    }

    pub fn fill(&mut self, value: u8) {
        self.data.iter_mut().for_each(|b| *b = value);
        self.pos = 0;
        self.notify(AccessKind::Write, 0, self.data.len());
    }
}
