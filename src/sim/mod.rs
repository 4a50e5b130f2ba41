//! In-memory bus for running modules on a host.
//!
//! [`SimTwi`] plays both roles: modules see it as their [`TwiSlave`], while
//! tests and the simulator binary drive it as the bus master. Master calls
//! stand in for the hardware interrupt and invoke the module's
//! [`TransactionHandler`] directly.

pub mod bridge;

use crate::twi::{
    Direction, Snapshot, TransactionCell, TransactionHandler, TransactionInfo, TwiResult, TwiSlave,
};
use core::cell::RefCell;
use critical_section::Mutex;
use std::sync::Arc;
use tracing::trace;

#[derive(Debug, Default)]
struct BusState {
    address: u8,
    send: Vec<u8>,
    receive_len: usize,
    communicating: bool,
    publishes: usize,
}

/// Cloneable handle to one simulated bus slave port.
#[derive(Debug, Clone)]
pub struct SimTwi {
    bus: Arc<Mutex<RefCell<BusState>>>,
    cell: Arc<TransactionCell>,
}

impl Default for SimTwi {
    fn default() -> Self {
        Self {
            bus: Arc::new(Mutex::new(RefCell::new(BusState::default()))),
            cell: Arc::new(TransactionCell::new()),
        }
    }
}

impl SimTwi {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_bus<R>(&self, f: impl FnOnce(&mut BusState) -> R) -> R {
        critical_section::with(|cs| f(&mut self.bus.borrow_ref_mut(cs)))
    }

    /// Master write of `bytes`. Bytes past the receive length are NACKed and
    /// dropped; the accepted prefix is delivered. Returns the accepted count.
    pub fn master_write<T>(&self, handler: &mut T, bytes: &[u8]) -> usize
    where
        T: TransactionHandler + ?Sized,
    {
        let accepted = self.with_bus(|bus| bytes.len().min(bus.receive_len));
        if accepted < bytes.len() {
            trace!(offered = bytes.len(), accepted, "master write truncated");
        }
        let data = &bytes[..accepted];
        handler.received(data);
        self.cell.publish(
            TwiResult::Received,
            TransactionInfo { direction: Direction::Receive, len: accepted },
        );
        accepted
    }

    /// Master read of `len` bytes from the published send buffer, zero padded.
    pub fn master_read<T>(&self, handler: &mut T, len: usize) -> Vec<u8>
    where
        T: TransactionHandler + ?Sized,
    {
        let mut data = self.with_bus(|bus| {
            let available = len.min(bus.send.len());
            bus.send[..available].to_vec()
        });
        data.resize(len, 0);
        handler.sent(&data);
        self.cell.publish(TwiResult::Sent, TransactionInfo { direction: Direction::Send, len });
        data
    }

    /// Models a transaction in flight, during which the module must not
    /// refresh its send buffer.
    pub fn set_communicating(&self, communicating: bool) {
        self.with_bus(|bus| bus.communicating = communicating);
    }

    /// Records a bus anomaly without completing a transaction.
    pub fn inject_result(&self, result: TwiResult) {
        self.cell.set_result(result);
    }

    pub fn address(&self) -> u8 {
        self.with_bus(|bus| bus.address)
    }

    pub fn send_buffer(&self) -> Vec<u8> {
        self.with_bus(|bus| bus.send.clone())
    }

    pub fn receive_len(&self) -> usize {
        self.with_bus(|bus| bus.receive_len)
    }

    /// Number of send buffer publications seen so far.
    pub fn publishes(&self) -> usize {
        self.with_bus(|bus| bus.publishes)
    }

    pub fn last_result(&self) -> TwiResult {
        self.cell.peek().result
    }
}

impl TwiSlave for SimTwi {
    fn communicating(&self) -> bool {
        self.with_bus(|bus| bus.communicating)
    }

    fn take_snapshot(&mut self) -> Snapshot {
        self.cell.take()
    }

    fn set_address(&mut self, address: u8) {
        self.with_bus(|bus| bus.address = address);
    }

    fn set_send_buffer(&mut self, data: &[u8]) {
        self.with_bus(|bus| {
            bus.send.clear();
            bus.send.extend_from_slice(data);
            bus.publishes += 1;
        });
    }

    fn set_receive_len(&mut self, len: usize) {
        self.with_bus(|bus| bus.receive_len = len);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        received: Vec<Vec<u8>>,
        sent: Vec<Vec<u8>>,
    }

    impl TransactionHandler for Recorder {
        fn sent(&mut self, data: &[u8]) {
            self.sent.push(data.to_vec());
        }

        fn received(&mut self, data: &[u8]) {
            self.received.push(data.to_vec());
        }
    }

    #[test]
    fn test_master_write_truncates_to_receive_len() {
        let mut slave = SimTwi::new();
        slave.set_receive_len(3);
        let mut recorder = Recorder::default();
        assert_eq!(slave.master_write(&mut recorder, &[1, 2, 3, 4, 5]), 3);
        assert_eq!(recorder.received, vec![vec![1, 2, 3]]);

        let snapshot = slave.take_snapshot();
        assert_eq!(snapshot.result, TwiResult::Received);
        assert_eq!(snapshot.info.len, 3);
        assert_eq!(slave.take_snapshot().result, TwiResult::Wait);
    }

    #[test]
    fn test_master_read_pads_with_zeros() {
        let mut slave = SimTwi::new();
        slave.set_send_buffer(&[0x5E, 7]);
        let mut recorder = Recorder::default();
        assert_eq!(slave.master_read(&mut recorder, 4), vec![0x5E, 7, 0, 0]);
        assert_eq!(recorder.sent.len(), 1);
        assert_eq!(slave.last_result(), TwiResult::Sent);
    }

    #[test]
    fn test_default_port_is_idle() {
        let mut slave = SimTwi::default();
        assert_eq!(slave.address(), 0);
        assert_eq!(slave.receive_len(), 0);
        assert!(slave.send_buffer().is_empty());
        assert!(!slave.communicating());
        assert_eq!(slave.publishes(), 0);
        assert_eq!(slave.take_snapshot().result, TwiResult::Wait);
    }

    #[test]
    fn test_clones_share_state() {
        let slave = SimTwi::new();
        let mut port = slave.clone();
        port.set_address(0x21);
        slave.set_communicating(true);
        assert_eq!(slave.address(), 0x21);
        assert!(port.communicating());
    }
}
