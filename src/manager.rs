//! Keeps the bus hardware's staging buffers in step with a register buffer
//! and derives connection liveness from completed transactions.
//!
//! Wire framing, from the slave's point of view:
//!
//! - master write: `[register address][data...]`
//! - master read:  `[header...][registers from the last address...][zeros...]`
//!
//! Nothing is retried or acknowledged at this level. A malformed master write
//! is dropped and state resynchronises on the next transaction.

use crate::buffer::{RegisterBuffer, MAX_REGISTER_LEN};
use crate::fatal;
use crate::timer::{Ticks, Timer};
use crate::twi::{Snapshot, TwiSlave};
use heapless::Vec;
use thiserror::Error;
use tracing::{debug, trace};

pub const MAX_HEADER_LEN: usize = 4;
pub const SEND_CAPACITY: usize = MAX_REGISTER_LEN + MAX_HEADER_LEN;
/// One extra byte for the register address.
pub const RECEIVE_CAPACITY: usize = MAX_REGISTER_LEN + 1;
pub const DEFAULT_TIMEOUT: Ticks = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StagingError {
    #[error("staging buffer of {requested} bytes exceeds capacity {capacity}")]
    CapacityExceeded { requested: usize, capacity: usize },
}

/// Discards the contents of `buf` and resizes it to `len` zero bytes.
fn reallocate<const N: usize>(buf: &mut Vec<u8, N>, len: usize) -> Result<(), StagingError> {
    buf.clear();
    buf.resize(len, 0)
        .map_err(|()| StagingError::CapacityExceeded { requested: len, capacity: N })
}

#[derive(Debug)]
pub struct SlaveBufferManager<H> {
    twi: H,
    header: Vec<u8, MAX_HEADER_LEN>,
    send: Vec<u8, SEND_CAPACITY>,
    receive: Vec<u8, RECEIVE_CAPACITY>,
    register_address: usize,
    timer: Timer,
    timeout: Ticks,
    last: Snapshot,
}

impl<H: TwiSlave> SlaveBufferManager<H> {
    /// `header` is prefixed to every master read. Halts if it is longer than
    /// [`MAX_HEADER_LEN`].
    pub fn new(twi: H, header: &[u8]) -> Self {
        let header = fatal::check(Vec::from_slice(header).map_err(|()| {
            StagingError::CapacityExceeded { requested: header.len(), capacity: MAX_HEADER_LEN }
        }));

        // An expired timer: disconnected until the first transaction.
        let mut timer = Timer::new();
        timer.start();

        Self {
            twi,
            header,
            send: Vec::new(),
            receive: Vec::new(),
            register_address: 0,
            timer,
            timeout: DEFAULT_TIMEOUT,
            last: Snapshot::default(),
        }
    }

    /// Sizes the staging buffers and publishes the current registers without
    /// looking at the hardware result.
    pub fn prepare(&mut self, buffer: &RegisterBuffer) {
        if buffer.is_empty() {
            return;
        }
        self.sync_staging(buffer.len());
        self.publish(buffer);
    }

    /// Call once per control cycle.
    pub fn update(&mut self, buffer: &RegisterBuffer) {
        let snapshot = self.twi.take_snapshot();
        self.last = snapshot;

        if snapshot.result.completed() {
            self.timer.restart(self.timeout);
        }

        if buffer.is_empty() {
            return;
        }
        self.sync_staging(buffer.len());
        // Received data arrives through `received`, never by polling here.
        self.publish(buffer);
    }

    /// Refreshes the send staging buffer unless a transaction is in flight,
    /// so the master never clocks out a half-written buffer.
    pub fn publish(&mut self, buffer: &RegisterBuffer) {
        if !self.twi.communicating() {
            self.refresh(buffer);
        }
    }

    fn sync_staging(&mut self, len: usize) {
        let send_len = len + self.header.len();
        if self.send.len() != send_len {
            fatal::check(reallocate(&mut self.send, send_len));
            self.send[..self.header.len()].copy_from_slice(&self.header);
            debug!(len = send_len, "send staging buffer resized");
            self.twi.set_send_buffer(&self.send);
        }

        let receive_len = len + 1;
        if self.receive.len() != receive_len {
            fatal::check(reallocate(&mut self.receive, receive_len));
            debug!(len = receive_len, "receive staging buffer resized");
            self.twi.set_receive_len(receive_len);
        }

        if self.register_address >= len {
            self.register_address = 0;
        }
    }

    /// Copies the registers from the last address onwards behind the header
    /// and zeroes the tail.
    fn refresh(&mut self, buffer: &RegisterBuffer) {
        if self.send.len() != buffer.len() + self.header.len() {
            return;
        }
        let start = self.header.len();
        let registers = &buffer.as_slice()[self.register_address..];
        let end = start + registers.len();
        self.send[start..end].copy_from_slice(registers);
        self.send[end..].fill(0);
        self.twi.set_send_buffer(&self.send);
    }

    /// Master write completed. The first byte selects the register address;
    /// addresses outside the buffer are ignored, data past the end is
    /// truncated.
    pub fn received(&mut self, buffer: &mut RegisterBuffer, data: &[u8]) {
        let Some((&address, payload)) = data.split_first() else {
            return;
        };
        let address = usize::from(address);
        if address >= buffer.len() {
            trace!(address, len = buffer.len(), "ignoring write to out-of-range register");
            return;
        }
        if self.send.len() != buffer.len() + self.header.len() {
            self.sync_staging(buffer.len());
        }

        self.register_address = address;
        let count = payload.len().min(buffer.len() - address);
        buffer.write(address, &payload[..count]);
        self.refresh(buffer);
    }

    /// Master read completed. Liveness already covers it.
    pub fn sent(&mut self, _data: &[u8]) {}

    /// True until the liveness timeout elapses without a completed transaction.
    pub fn connected(&self) -> bool {
        !self.timer.finished()
    }

    /// Takes effect on the next completed transaction.
    pub fn set_timeout(&mut self, ticks: Ticks) {
        self.timeout = ticks;
    }

    pub fn timeout(&self) -> Ticks {
        self.timeout
    }

    pub fn set_address(&mut self, address: u8) {
        self.twi.set_address(address);
    }

    pub fn tick(&mut self) {
        self.timer.tick();
    }

    pub fn register_address(&self) -> usize {
        self.register_address
    }

    pub fn header(&self) -> &[u8] {
        &self.header
    }

    pub fn send_staging(&self) -> &[u8] {
        &self.send
    }

    pub fn receive_staging_len(&self) -> usize {
        self.receive.len()
    }

    pub fn last_snapshot(&self) -> Snapshot {
        self.last
    }

    pub fn twi(&self) -> &H {
        &self.twi
    }

    pub fn twi_mut(&mut self) -> &mut H {
        &mut self.twi
    }
}
