use super::{Module, NoConstants, Slave};
use crate::layout::common::offset::{SETTINGS, STATUS};
use crate::layout::motor_controller::{offset, settings, status, SIZE, TYPE_SIGNATURE};
use crate::timer::{Ticks, Timer};
use crate::twi::TwiSlave;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const DEFAULT_OVERCURRENT_TIMEOUT: Ticks = 1000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotorMode {
    #[default]
    Off = 0b00,
    Voltage = 0b01,
    Pwm = 0b10,
}

impl MotorMode {
    /// Decodes the two-bit settings field. The unused encoding reads as `Off`.
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b01 => MotorMode::Voltage,
            0b10 => MotorMode::Pwm,
            _ => MotorMode::Off,
        }
    }

    pub fn bits(self) -> u8 {
        self as u8
    }
}

/// How far the drive has been de-rated after exceeding its current limit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OvercurrentState {
    #[default]
    None = 0b00,
    /// Voltage mode tripped, now running in PWM mode.
    Pwm = 0b01,
    /// Tripped while already de-rated or off.
    Off = 0b10,
}

impl OvercurrentState {
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b01 => OvercurrentState::Pwm,
            0b10 => OvercurrentState::Off,
            _ => OvercurrentState::None,
        }
    }

    pub fn bits(self) -> u8 {
        self as u8
    }
}

/// Motor drive with debounced overcurrent protection.
///
/// While no overcurrent has been recorded the master selects the drive mode
/// through the settings register. An overcurrent that persists for the
/// protection timeout de-rates Voltage to PWM, and anything else to Off.
/// The master clears the condition by setting the reset bit.
#[derive(Debug)]
pub struct MotorController<H> {
    slave: Slave<H>,
    mode: MotorMode,
    overcurrent: OvercurrentState,
    timer: Timer,
    timeout: Ticks,
    measured_ma: u16,
    measured_mv: u16,
}

impl<H: TwiSlave> MotorController<H> {
    pub fn new(twi: H) -> Self {
        let mut timer = Timer::new();
        timer.restart(DEFAULT_OVERCURRENT_TIMEOUT);
        Self {
            slave: Slave::new(twi, SIZE, TYPE_SIGNATURE),
            mode: MotorMode::Off,
            overcurrent: OvercurrentState::None,
            timer,
            timeout: DEFAULT_OVERCURRENT_TIMEOUT,
            measured_ma: 0,
            measured_mv: 0,
        }
    }

    pub fn set_measured_current(&mut self, ma: u16) {
        self.measured_ma = ma;
        self.slave.buffer_mut().set(offset::MEASURED_CURRENT, ma);
    }

    pub fn set_measured_voltage(&mut self, mv: u16) {
        self.measured_mv = mv;
        self.slave.buffer_mut().set(offset::MEASURED_VOLTAGE, mv);
    }

    /// How long the current must stay above the limit before tripping.
    pub fn set_overcurrent_timeout(&mut self, ticks: Ticks) {
        self.timeout = ticks;
    }

    pub fn measured_current(&self) -> u16 {
        self.measured_ma
    }

    pub fn measured_voltage(&self) -> u16 {
        self.measured_mv
    }

    pub fn mode(&self) -> MotorMode {
        self.mode
    }

    pub fn overcurrent_state(&self) -> OvercurrentState {
        self.overcurrent
    }

    pub fn max_current_voltage(&self) -> u16 {
        self.slave.buffer().get(offset::VOLTAGE_MAX_CURRENT)
    }

    pub fn max_current_pwm(&self) -> u16 {
        self.slave.buffer().get(offset::PWM_MAX_CURRENT)
    }

    pub fn pwm_frequency(&self) -> u16 {
        self.slave.buffer().get(offset::PWM_FREQUENCY)
    }

    pub fn pwm_duty(&self) -> u8 {
        self.slave.buffer().get(offset::PWM_DUTY_CYCLE)
    }

    pub fn control_mv(&self) -> u16 {
        self.slave.buffer().get(offset::CONTROL_VOLTAGE)
    }

    pub fn slave(&self) -> &Slave<H> {
        &self.slave
    }

    pub fn slave_mut(&mut self) -> &mut Slave<H> {
        &mut self.slave
    }

    fn max_current(&self) -> u16 {
        match self.mode {
            MotorMode::Voltage => self.max_current_voltage(),
            MotorMode::Off | MotorMode::Pwm => self.max_current_pwm(),
        }
    }

    fn trip(&mut self) -> bool {
        let previous_mode = self.mode;
        let restart = match self.mode {
            MotorMode::Voltage => {
                self.overcurrent = OvercurrentState::Pwm;
                self.mode = MotorMode::Pwm;
                true
            }
            MotorMode::Off | MotorMode::Pwm => {
                self.overcurrent = OvercurrentState::Off;
                self.mode = MotorMode::Off;
                self.slave.set_operational(false);
                false
            }
        };
        warn!(
            measured_ma = self.measured_ma,
            from = ?previous_mode,
            to = ?self.mode,
            "overcurrent protection tripped"
        );
        restart
    }
}

impl<H: TwiSlave> Module for MotorController<H> {
    fn update(&mut self) {
        self.slave.update(&mut NoConstants);

        let previous = self.overcurrent;
        let mut restart_timer = false;

        let exceeded = self.slave.connected()
            && self.measured_ma > self.max_current()
            && self.overcurrent != OvercurrentState::Off;
        if exceeded {
            // Debounce: act only once the limit has been exceeded for the
            // whole timeout.
            if self.timer.finished() {
                restart_timer = self.trip();
            }
        } else {
            restart_timer = true;
        }

        let buffer = self.slave.buffer_mut();
        if buffer.bit_get(SETTINGS, settings::OVERCURRENT_RESET) {
            buffer.bit_clear(SETTINGS, settings::OVERCURRENT_RESET);
            self.overcurrent = OvercurrentState::None;
            restart_timer = true;
            info!("overcurrent state reset by master");
        }

        if restart_timer {
            self.timer.restart(self.timeout);
        }

        if self.overcurrent == OvercurrentState::None {
            self.slave.set_operational(true);
            let bits = self
                .slave
                .buffer()
                .field_get(SETTINGS, settings::MOTOR_MODE_MASK, settings::MOTOR_MODE);
            self.mode = MotorMode::from_bits(bits);
        }

        if previous != self.overcurrent {
            self.slave.buffer_mut().field_set(
                STATUS,
                status::OVERCURRENT_STATE_MASK,
                status::OVERCURRENT_STATE,
                self.overcurrent.bits(),
            );
            self.slave.publish();
        }
    }

    fn tick(&mut self) {
        self.slave.tick();
        self.timer.tick();
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

forward_transactions!(MotorController);
