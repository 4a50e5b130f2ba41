use super::{Module, NoConstants, Slave};
use crate::layout::common::offset::SETTINGS;
use crate::layout::horn::{settings, SIZE, TYPE_SIGNATURE};
use crate::twi::TwiSlave;

/// Signal horn. The master switches it through a single settings bit.
#[derive(Debug)]
pub struct Horn<H> {
    slave: Slave<H>,
}

impl<H: TwiSlave> Horn<H> {
    pub fn new(twi: H) -> Self {
        Self { slave: Slave::new(twi, SIZE, TYPE_SIGNATURE) }
    }

    pub fn horn_on(&self) -> bool {
        self.slave.buffer().bit_get(SETTINGS, settings::HORN_STATE)
    }

    pub fn slave(&self) -> &Slave<H> {
        &self.slave
    }

    pub fn slave_mut(&mut self) -> &mut Slave<H> {
        &mut self.slave
    }
}

impl<H: TwiSlave> Module for Horn<H> {
    fn update(&mut self) {
        self.slave.update(&mut NoConstants);
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

forward_transactions!(Horn);
