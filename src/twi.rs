//! Contract with the interrupt-driven two-wire slave hardware.
//!
//! A platform driver implements [`TwiSlave`] for the main-loop side and calls
//! a [`TransactionHandler`] from its interrupt handler when a transaction
//! completes. State written by the interrupt and read by the main loop goes
//! through a [`TransactionCell`].

use core::cell::Cell;
use critical_section::Mutex;
use serde::{Deserialize, Serialize};

/// Outcome of the most recent bus activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TwiResult {
    /// No transaction, or one still in progress.
    #[default]
    Wait,
    /// Master clocked past the end of the receive buffer.
    NackSent,
    /// Bus error. Ignored; liveness is the only loss signal.
    Error,
    Sent,
    Received,
}

impl TwiResult {
    pub fn completed(self) -> bool {
        matches!(self, TwiResult::Sent | TwiResult::Received)
    }
}

/// Direction from the slave's point of view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Master read.
    #[default]
    Send,
    /// Master write.
    Receive,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionInfo {
    pub direction: Direction,
    pub len: usize,
}

/// Result and transaction info captured together.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub result: TwiResult,
    pub info: TransactionInfo,
}

pub trait TwiSlave {
    /// True while a transaction addressed to this slave is in flight.
    fn communicating(&self) -> bool;

    /// Atomically reads the result and last transaction. `Sent` and
    /// `Received` are consumed (reset to `Wait`).
    fn take_snapshot(&mut self) -> Snapshot;

    fn set_address(&mut self, address: u8);

    /// Bytes to clock out on the next master read. Reads beyond the end
    /// clock out zeros.
    fn set_send_buffer(&mut self, data: &[u8]);

    /// Bytes accepted per master write; the byte after the last is NACKed.
    fn set_receive_len(&mut self, len: usize);
}

/// Completion callbacks, invoked from the hardware's interrupt context.
pub trait TransactionHandler {
    fn sent(&mut self, data: &[u8]);
    fn received(&mut self, data: &[u8]);
}

/// Single-producer/single-consumer snapshot cell shared between the bus
/// interrupt (producer) and the control loop (consumer).
#[derive(Debug)]
pub struct TransactionCell {
    inner: Mutex<Cell<Snapshot>>,
}

impl TransactionCell {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(Cell::new(Snapshot {
                result: TwiResult::Wait,
                info: TransactionInfo { direction: Direction::Send, len: 0 },
            })),
        }
    }

    /// Interrupt side: records a finished transaction.
    pub fn publish(&self, result: TwiResult, info: TransactionInfo) {
        critical_section::with(|cs| self.inner.borrow(cs).set(Snapshot { result, info }));
    }

    /// Interrupt side: records a result without touching the transaction info.
    pub fn set_result(&self, result: TwiResult) {
        critical_section::with(|cs| {
            let cell = self.inner.borrow(cs);
            let mut snapshot = cell.get();
            snapshot.result = result;
            cell.set(snapshot);
        });
    }

    pub fn peek(&self) -> Snapshot {
        critical_section::with(|cs| self.inner.borrow(cs).get())
    }

    /// Main side: reads and consumes a completed result.
    pub fn take(&self) -> Snapshot {
        critical_section::with(|cs| {
            let cell = self.inner.borrow(cs);
            let snapshot = cell.get();
            if snapshot.result.completed() {
                cell.set(Snapshot { result: TwiResult::Wait, ..snapshot });
            }
            snapshot
        })
    }
}

impl Default for TransactionCell {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_consumes_completed_results() {
        let cell = TransactionCell::new();
        cell.publish(
            TwiResult::Received,
            TransactionInfo { direction: Direction::Receive, len: 3 },
        );
        let first = cell.take();
        assert_eq!(first.result, TwiResult::Received);
        assert_eq!(first.info.len, 3);

        let second = cell.take();
        assert_eq!(second.result, TwiResult::Wait);
        assert_eq!(second.info.direction, Direction::Receive);
    }

    #[test]
    fn test_take_keeps_non_completed_results() {
        let cell = TransactionCell::new();
        cell.set_result(TwiResult::NackSent);
        assert_eq!(cell.take().result, TwiResult::NackSent);
        assert_eq!(cell.peek().result, TwiResult::NackSent);
    }
}
