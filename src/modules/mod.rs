/// Forwards bus callbacks from a module to its `slave` field. Must stay above
/// the `mod` declarations below.
macro_rules! forward_transactions {
    ($module:ident) => {
        impl<H: $crate::twi::TwiSlave> $crate::twi::TransactionHandler for $module<H> {
            fn sent(&mut self, data: &[u8]) {
                $crate::twi::TransactionHandler::sent(&mut self.slave, data);
            }

            fn received(&mut self, data: &[u8]) {
                $crate::twi::TransactionHandler::received(&mut self.slave, data);
            }
        }
    };
}

pub mod horn;
pub mod motor_controller;
pub mod motor_mover;
pub mod speed_monitor;

pub use horn::Horn;
pub use motor_controller::{MotorController, MotorMode, OvercurrentState};
pub use motor_mover::{MotorMover, MoverMode};
pub use speed_monitor::{Sample, SpeedMonitor, SpeedMonitorManager};

use crate::buffer::RegisterBuffer;
use crate::fatal;
use crate::layout::common::{self, offset, settings, status};
use crate::manager::SlaveBufferManager;
use crate::timer::Ticks;
use crate::twi::{TransactionHandler, TwiSlave};
use arrayvec::ArrayString;
use tracing::info;

pub type ModuleName = ArrayString<{ common::NAME_LEN }>;

/// Re-asserts a module's constant registers.
///
/// Called only when the connection state changes, not every cycle: a master
/// that overwrites a constant sees the wrong value until the next
/// reconnection, which makes communication bugs visible.
pub trait ConstantsWriter {
    fn write_constants(&mut self, buffer: &mut RegisterBuffer);
}

/// For modules whose only constants are the common header.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoConstants;

impl ConstantsWriter for NoConstants {
    fn write_constants(&mut self, _buffer: &mut RegisterBuffer) {}
}

/// A device exposed to the bus master through the module protocol.
pub trait Module: TransactionHandler {
    /// Call once per control cycle.
    fn update(&mut self);
    /// Call once per tick of the 1 kHz tick source.
    fn tick(&mut self);
    fn connected(&self) -> bool;
    /// Master-controlled status LED request.
    fn led(&self) -> bool;
    fn registers(&self) -> &[u8];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Identity {
    type_signature: u8,
    id: u8,
    name_len: usize,
    name: [u8; common::NAME_LEN],
}

/// Common module state: the register buffer, the bus manager serving it and
/// the identity block every module shares.
#[derive(Debug)]
pub struct Slave<H> {
    buffer: RegisterBuffer,
    manager: SlaveBufferManager<H>,
    identity: Identity,
    previously_connected: bool,
}

impl<H: TwiSlave> Slave<H> {
    /// Creates a zero-filled register buffer of `size` bytes with the Active
    /// and Operational bits set.
    pub fn new(twi: H, size: usize, type_signature: u8) -> Self {
        if size < offset::SIZE {
            fatal::halt(format_args!(
                "module buffer of {size} bytes cannot hold the common header"
            ));
        }
        let mut slave = Self {
            buffer: RegisterBuffer::new(size),
            manager: SlaveBufferManager::new(twi, &common::SIGNATURE[..common::SEND_PREFIX_LEN]),
            identity: Identity { type_signature, id: 0, name_len: 0, name: [0; common::NAME_LEN] },
            previously_connected: true,
        };
        slave.write_identity();
        slave.buffer.bit_set(offset::STATUS, status::ACTIVE, true);
        slave.set_operational(true);
        slave.manager.prepare(&slave.buffer);
        slave
    }

    /// Polls the bus manager and, on a connection change, rewrites the
    /// identity block, the Active bit and the module's own constants.
    pub fn update<C: ConstantsWriter + ?Sized>(&mut self, constants: &mut C) {
        self.manager.update(&self.buffer);

        let connected = self.manager.connected();
        if connected != self.previously_connected {
            self.previously_connected = connected;
            info!(connected, "module connection changed, rewriting constants");
            self.write_identity();
            // Active always reads as 1.
            self.buffer.bit_set(offset::STATUS, status::ACTIVE, true);
            constants.write_constants(&mut self.buffer);
            self.manager.publish(&self.buffer);
        }
    }

    fn write_identity(&mut self) {
        let identity = self.identity;
        self.buffer.write(offset::SIGNATURE, &common::SIGNATURE);
        self.buffer.set(offset::TYPE_SIGNATURE, identity.type_signature);
        self.buffer.set(offset::ID, identity.id);
        self.buffer.write(offset::NAME, &identity.name[..identity.name_len]);
    }

    /// Pushes register changes made after [`Slave::update`] to the send
    /// staging buffer instead of waiting for the next cycle.
    pub fn publish(&mut self) {
        self.manager.publish(&self.buffer);
    }

    pub fn tick(&mut self) {
        self.manager.tick();
    }

    pub fn connected(&self) -> bool {
        self.manager.connected()
    }

    pub fn set_timeout(&mut self, ticks: Ticks) {
        self.manager.set_timeout(ticks);
    }

    pub fn set_address(&mut self, address: u8) {
        self.manager.set_address(address);
    }

    pub fn set_signature(&mut self, signature: u8) {
        self.identity.type_signature = signature;
        self.buffer.set(offset::TYPE_SIGNATURE, signature);
    }

    pub fn signature(&self) -> u8 {
        self.buffer.get(offset::TYPE_SIGNATURE)
    }

    pub fn set_id(&mut self, id: u8) {
        self.identity.id = id;
        self.buffer.set(offset::ID, id);
    }

    pub fn id(&self) -> u8 {
        self.buffer.get(offset::ID)
    }

    /// Writes at most [`common::NAME_LEN`] bytes of `name`. Shorter names are
    /// not padded, so bytes past them keep their previous value.
    pub fn set_name(&mut self, name: &str) {
        let mut len = name.len().min(common::NAME_LEN);
        while !name.is_char_boundary(len) {
            len -= 1;
        }
        let bytes = &name.as_bytes()[..len];
        self.identity.name[..len].copy_from_slice(bytes);
        self.identity.name_len = len;
        self.buffer.write(offset::NAME, bytes);
    }

    /// The name as currently held in the registers, up to the first NUL.
    pub fn name(&self) -> ModuleName {
        let mut raw = [0u8; common::NAME_LEN];
        self.buffer.peek(offset::NAME, &mut raw);
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        let text = match core::str::from_utf8(&raw[..end]) {
            Ok(text) => text,
            Err(e) => core::str::from_utf8(&raw[..e.valid_up_to()]).unwrap_or_default(),
        };
        ModuleName::from(text).unwrap_or_default()
    }

    pub fn set_operational(&mut self, state: bool) {
        self.buffer.bit_set(offset::STATUS, status::OPERATIONAL, state);
    }

    pub fn operational(&self) -> bool {
        self.buffer.bit_get(offset::STATUS, status::OPERATIONAL)
    }

    pub fn active(&self) -> bool {
        self.buffer.bit_get(offset::STATUS, status::ACTIVE)
    }

    pub fn get_led(&self) -> bool {
        self.buffer.bit_get(offset::SETTINGS, settings::LED)
    }

    pub fn get_power(&self) -> bool {
        self.buffer.bit_get(offset::SETTINGS, settings::POWER)
    }

    pub fn status(&self) -> u8 {
        self.buffer.get(offset::STATUS)
    }

    pub fn settings(&self) -> u8 {
        self.buffer.get(offset::SETTINGS)
    }

    pub fn registers(&self) -> &[u8] {
        self.buffer.as_slice()
    }

    pub fn buffer(&self) -> &RegisterBuffer {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut RegisterBuffer {
        &mut self.buffer
    }

    pub fn manager(&self) -> &SlaveBufferManager<H> {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut SlaveBufferManager<H> {
        &mut self.manager
    }
}

impl<H: TwiSlave> TransactionHandler for Slave<H> {
    fn sent(&mut self, data: &[u8]) {
        self.manager.sent(data);
    }

    fn received(&mut self, data: &[u8]) {
        self.manager.received(&mut self.buffer, data);
    }
}
