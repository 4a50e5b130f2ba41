//! Rotational speed sampling. One manager owns a single register buffer that
//! holds a fixed number of channels, each with its own ring of samples.
//!
//! ```text
//! 0x0E            instance count
//! 0x0F            samples per instance
//! per instance:
//! +0x00-0x03      revolutions per second constant
//! +0x04-0x07      ticks per second constant
//! +0x08           position of the last written sample
//! +0x09...        sample ring
//! ```

use super::{ConstantsWriter, Module, Slave};
use crate::buffer::{Field, RegisterBuffer, MAX_REGISTER_LEN};
use crate::fatal;
use crate::layout::common::offset::STATUS;
use crate::layout::speed_monitor::{
    buffer_size, instance, instance_size, manager, status, Rps, Tps, TYPE_SIGNATURE,
};
use crate::twi::{TransactionHandler, TwiSlave};
use core::marker::PhantomData;

/// A sample type storable in the ring. Its byte size is published to the
/// master in four status bits.
pub trait Sample: Field + Default {}

impl Sample for u8 {}
impl Sample for u16 {}
impl Sample for u32 {}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Channel {
    rps: Rps,
    tps: Tps,
    pos: u8,
}

struct SpeedConstants<'a> {
    channels: &'a [Channel],
    sample_size: usize,
    samples: usize,
}

impl ConstantsWriter for SpeedConstants<'_> {
    fn write_constants(&mut self, buffer: &mut RegisterBuffer) {
        // Values are bounded by the manager's compile-time checks.
        buffer.bit_set_mask(STATUS, (self.sample_size as u8) << status::SAMPLE_SIZE);
        buffer.set(manager::INSTANCE_COUNT, self.channels.len() as u8);
        buffer.set(manager::SAMPLE_COUNT, self.samples as u8);
        for (index, channel) in self.channels.iter().enumerate() {
            let base = channel_base(index, self.samples, self.sample_size);
            buffer.set(base + instance::RPS, channel.rps);
            buffer.set(base + instance::TPS, channel.tps);
        }
    }
}

const fn channel_base(index: usize, samples: usize, sample_size: usize) -> usize {
    manager::SIZE + index * instance_size(samples, sample_size)
}

/// `COUNT` channels of `LEN` samples of type `S`.
#[derive(Debug)]
pub struct SpeedMonitorManager<H, S, const COUNT: usize, const LEN: usize> {
    slave: Slave<H>,
    channels: [Channel; COUNT],
    _sample: PhantomData<S>,
}

impl<H: TwiSlave, S: Sample, const COUNT: usize, const LEN: usize>
    SpeedMonitorManager<H, S, COUNT, LEN>
{
    pub const BUFFER_SIZE: usize = buffer_size(COUNT, LEN, S::SIZE);

    const VALID: () = {
        assert!(COUNT > 0, "speed monitor needs at least one channel");
        assert!(COUNT <= u8::MAX as usize, "channel count must fit in one register");
        assert!(LEN > 0, "speed monitor channels need at least one sample");
        assert!(LEN <= u8::MAX as usize, "sample position must fit in one register");
        assert!(S::SIZE <= 0xF, "sample size must fit in four status bits");
        assert!(
            buffer_size(COUNT, LEN, S::SIZE) <= MAX_REGISTER_LEN,
            "speed monitor registers exceed the register buffer capacity"
        );
    };

    pub fn new(twi: H) -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::VALID;

        let mut monitor = Self {
            slave: Slave::new(twi, Self::BUFFER_SIZE, TYPE_SIGNATURE),
            channels: [Channel::default(); COUNT],
            _sample: PhantomData,
        };
        let mut constants =
            SpeedConstants { channels: &monitor.channels, sample_size: S::SIZE, samples: LEN };
        constants.write_constants(monitor.slave.buffer_mut());
        monitor.slave.publish();
        monitor
    }

    /// View of one channel. Halts if `index` is not below `COUNT`.
    pub fn channel(&mut self, index: usize) -> SpeedMonitor<'_, S> {
        if index >= COUNT {
            fatal::halt(format_args!("speed monitor channel {index} of {} does not exist", COUNT));
        }
        SpeedMonitor {
            buffer: self.slave.buffer_mut(),
            channel: &mut self.channels[index],
            base: channel_base(index, LEN, S::SIZE),
            len: LEN,
            _sample: PhantomData,
        }
    }

    pub fn channel_count(&self) -> usize {
        COUNT
    }

    pub fn sample_count(&self) -> usize {
        LEN
    }

    pub fn slave(&self) -> &Slave<H> {
        &self.slave
    }

    pub fn slave_mut(&mut self) -> &mut Slave<H> {
        &mut self.slave
    }
}

impl<H: TwiSlave, S: Sample, const COUNT: usize, const LEN: usize> Module
    for SpeedMonitorManager<H, S, COUNT, LEN>
{
    fn update(&mut self) {
        let mut constants =
            SpeedConstants { channels: &self.channels, sample_size: S::SIZE, samples: LEN };
        self.slave.update(&mut constants);
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

impl<H: TwiSlave, S, const COUNT: usize, const LEN: usize> TransactionHandler
    for SpeedMonitorManager<H, S, COUNT, LEN>
{
    fn sent(&mut self, data: &[u8]) {
        self.slave.sent(data);
    }

    fn received(&mut self, data: &[u8]) {
        self.slave.received(data);
    }
}

/// One channel of a [`SpeedMonitorManager`].
#[derive(Debug)]
pub struct SpeedMonitor<'a, S> {
    buffer: &'a mut RegisterBuffer,
    channel: &'a mut Channel,
    base: usize,
    len: usize,
    _sample: PhantomData<S>,
}

impl<S: Sample> SpeedMonitor<'_, S> {
    pub fn set_rps_constant(&mut self, rps: Rps) {
        self.channel.rps = rps;
        self.buffer.set(self.base + instance::RPS, rps);
    }

    pub fn set_tps_constant(&mut self, tps: Tps) {
        self.channel.tps = tps;
        self.buffer.set(self.base + instance::TPS, tps);
    }

    /// Stores `sample` at the ring position, publishes that position and
    /// advances, wrapping after the last sample.
    pub fn push_sample(&mut self, sample: S) {
        let pos = self.channel.pos;
        let offset = self.sample_offset(usize::from(pos));
        self.buffer.set(offset, sample);
        self.buffer.set(self.base + instance::SAMPLE_POS, pos);
        self.channel.pos = if usize::from(pos) + 1 >= self.len {
            0
        } else {
            pos + 1
        };
    }

    /// The sample at `pos`, or the default value when `pos` is out of range.
    pub fn sample(&self, pos: usize) -> S {
        if pos >= self.len {
            return S::default();
        }
        self.buffer.get(self.sample_offset(pos))
    }

    /// Zeroes the ring and restarts at position 0. The published position
    /// register keeps its value until the next push.
    pub fn clear_samples(&mut self) {
        for pos in 0..self.len {
            let offset = self.sample_offset(pos);
            self.buffer.set(offset, S::default());
        }
        self.channel.pos = 0;
    }

    pub fn rps_constant(&self) -> Rps {
        self.channel.rps
    }

    pub fn tps_constant(&self) -> Tps {
        self.channel.tps
    }

    /// Ring position the next sample is written to.
    pub fn next_position(&self) -> usize {
        usize::from(self.channel.pos)
    }

    fn sample_offset(&self, pos: usize) -> usize {
        self.base + instance::SAMPLE_BUFFER + pos * S::SIZE
    }
}
