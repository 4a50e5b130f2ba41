use super::{ConstantsWriter, Module, Slave};
use crate::buffer::RegisterBuffer;
use crate::layout::common::offset::{SETTINGS, STATUS};
use crate::layout::motor_mover::{offset, settings, status, SIZE, TYPE_SIGNATURE};
use crate::twi::TwiSlave;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoverMode {
    /// Move between the engaged and disengaged end positions.
    #[default]
    Binary,
    /// Follow the master's continuous position register.
    Continuous,
}

/// End positions owned by the module. The master may read but not change them.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct MoverConstants {
    engaged: u16,
    disengaged: u16,
}

impl ConstantsWriter for MoverConstants {
    fn write_constants(&mut self, buffer: &mut RegisterBuffer) {
        buffer.set(offset::POSITION_ENGAGED, self.engaged);
        buffer.set(offset::POSITION_DISENGAGED, self.disengaged);
    }
}

/// Actuator moved either between two end positions or continuously.
#[derive(Debug)]
pub struct MotorMover<H> {
    slave: Slave<H>,
    constants: MoverConstants,
}

impl<H: TwiSlave> MotorMover<H> {
    pub fn new(twi: H) -> Self {
        Self {
            slave: Slave::new(twi, SIZE, TYPE_SIGNATURE),
            constants: MoverConstants::default(),
        }
    }

    pub fn set_position_engaged(&mut self, position: u16) {
        self.constants.engaged = position;
        self.slave.buffer_mut().set(offset::POSITION_ENGAGED, position);
    }

    pub fn set_position_disengaged(&mut self, position: u16) {
        self.constants.disengaged = position;
        self.slave.buffer_mut().set(offset::POSITION_DISENGAGED, position);
    }

    /// Reports whether the mechanism actually reached the engaged position.
    pub fn set_engaged(&mut self, engaged: bool) {
        self.slave.buffer_mut().bit_set(STATUS, status::ENGAGED, engaged);
    }

    pub fn mode(&self) -> MoverMode {
        if self.slave.buffer().bit_get(SETTINGS, settings::MODE) {
            MoverMode::Continuous
        } else {
            MoverMode::Binary
        }
    }

    /// Requested end position in binary mode.
    pub fn binary_engaged(&self) -> bool {
        self.slave.buffer().bit_get(SETTINGS, settings::ENGAGED)
    }

    pub fn continuous_position(&self) -> u16 {
        self.slave.buffer().get(offset::CONTINUOUS_POSITION)
    }

    pub fn mechanism_powered(&self) -> bool {
        self.slave.buffer().bit_get(SETTINGS, settings::POWERED)
    }

    pub fn position_engaged(&self) -> u16 {
        self.constants.engaged
    }

    pub fn position_disengaged(&self) -> u16 {
        self.constants.disengaged
    }

    pub fn slave(&self) -> &Slave<H> {
        &self.slave
    }

    pub fn slave_mut(&mut self) -> &mut Slave<H> {
        &mut self.slave
    }
}

impl<H: TwiSlave> Module for MotorMover<H> {
    fn update(&mut self) {
        self.slave.update(&mut self.constants);
    }

    fn tick(&mut self) {
        self.slave.tick();
    }

    fn connected(&self) -> bool {
        self.slave.connected()
    }

    fn led(&self) -> bool {
        self.slave.get_led()
    }

    fn registers(&self) -> &[u8] {
        self.slave.registers()
    }
}

forward_transactions!(MotorMover);
