//! Register layout shared by every module and the regions specific to each
//! module type.
//!
//! ```text
//! 0x00-0x01  fixed signature (0x5E 0x8A)
//! 0x02       module type signature
//! 0x03       module id
//! 0x04-0x0B  name
//! 0x0C       status    (bit 0 active, bit 1 operational, rest per module)
//! 0x0D       settings  (per module)
//! 0x0E...    module specific region
//! ```
//!
//! Multi-byte fields are little-endian.

use static_assertions::const_assert;

pub mod common {
    pub const SIGNATURE: [u8; 2] = [0x5E, 0x8A];
    /// Bytes of [`SIGNATURE`] prefixed to every master read.
    pub const SEND_PREFIX_LEN: usize = 1;
    pub const NAME_LEN: usize = 8;

    pub mod offset {
        pub const SIGNATURE: usize = 0;
        pub const TYPE_SIGNATURE: usize = SIGNATURE + super::SIGNATURE.len();
        pub const ID: usize = TYPE_SIGNATURE + 1;
        pub const NAME: usize = ID + 1;
        pub const STATUS: usize = NAME + super::NAME_LEN;
        pub const SETTINGS: usize = STATUS + 1;
        pub const SIZE: usize = SETTINGS + 1;
    }

    pub mod status {
        pub const ACTIVE: u8 = 0;
        pub const OPERATIONAL: u8 = 1;
    }

    pub mod settings {
        pub const POWER: u8 = 0;
        pub const LED: u8 = 1;
    }
}

pub mod horn {
    pub const TYPE_SIGNATURE: u8 = 0x10;
    pub const SIZE: usize = super::common::offset::SIZE;

    pub mod settings {
        pub const HORN_STATE: u8 = 2;
    }
}

pub mod motor_controller {
    pub const TYPE_SIGNATURE: u8 = 0x20;

    pub mod offset {
        pub const VOLTAGE_MAX_CURRENT: usize = crate::layout::common::offset::SIZE;
        pub const PWM_MAX_CURRENT: usize = VOLTAGE_MAX_CURRENT + 2;
        pub const MEASURED_CURRENT: usize = PWM_MAX_CURRENT + 2;
        pub const MEASURED_VOLTAGE: usize = MEASURED_CURRENT + 2;
        pub const PWM_FREQUENCY: usize = MEASURED_VOLTAGE + 2;
        pub const PWM_DUTY_CYCLE: usize = PWM_FREQUENCY + 2;
        pub const CONTROL_VOLTAGE: usize = PWM_DUTY_CYCLE + 1;
        pub const SIZE: usize = CONTROL_VOLTAGE + 2;
    }

    pub mod status {
        pub const OVERCURRENT_STATE: u8 = 2;
        pub const OVERCURRENT_STATE_MASK: u8 = 0b11 << OVERCURRENT_STATE;
    }

    pub mod settings {
        pub const MOTOR_MODE: u8 = 2;
        pub const MOTOR_MODE_MASK: u8 = 0b11 << MOTOR_MODE;
        pub const OVERCURRENT_RESET: u8 = 4;
    }

    pub const SIZE: usize = offset::SIZE;
}

pub mod motor_mover {
    pub const TYPE_SIGNATURE: u8 = 0x30;

    pub mod offset {
        pub const POSITION_ENGAGED: usize = crate::layout::common::offset::SIZE;
        pub const POSITION_DISENGAGED: usize = POSITION_ENGAGED + 2;
        pub const CONTINUOUS_POSITION: usize = POSITION_DISENGAGED + 2;
        pub const SIZE: usize = CONTINUOUS_POSITION + 2;
    }

    pub mod status {
        pub const ENGAGED: u8 = 2;
    }

    pub mod settings {
        pub const MODE: u8 = 2;
        pub const ENGAGED: u8 = 3;
        pub const POWERED: u8 = 4;
    }

    pub const SIZE: usize = offset::SIZE;
}

pub mod speed_monitor {
    pub const TYPE_SIGNATURE: u8 = 0x40;

    pub type Rps = u32;
    pub type Tps = u32;

    /// Manager region, directly after the common header.
    pub mod manager {
        pub const INSTANCE_COUNT: usize = crate::layout::common::offset::SIZE;
        pub const SAMPLE_COUNT: usize = INSTANCE_COUNT + 1;
        pub const SIZE: usize = SAMPLE_COUNT + 1;
    }

    /// Per-instance region, relative to the start of the instance.
    pub mod instance {
        pub const RPS: usize = 0;
        pub const TPS: usize = RPS + core::mem::size_of::<super::Rps>();
        pub const SAMPLE_POS: usize = TPS + core::mem::size_of::<super::Tps>();
        pub const SAMPLE_BUFFER: usize = SAMPLE_POS + 1;
    }

    pub mod status {
        pub const SAMPLE_SIZE: u8 = 4;
        pub const SAMPLE_SIZE_MASK: u8 = 0b1111 << SAMPLE_SIZE;
    }

    /// Size of one instance region holding `samples` samples of `sample_size` bytes.
    pub const fn instance_size(samples: usize, sample_size: usize) -> usize {
        instance::SAMPLE_BUFFER + samples * sample_size
    }

    /// Size of a whole speed monitor register buffer.
    pub const fn buffer_size(count: usize, samples: usize, sample_size: usize) -> usize {
        manager::SIZE + count * instance_size(samples, sample_size)
    }
}

const_assert!(common::offset::SIZE == 14);
const_assert!(common::offset::STATUS == 12);
const_assert!(common::offset::SETTINGS == 13);
const_assert!(common::SEND_PREFIX_LEN <= common::SIGNATURE.len());
const_assert!(
    motor_controller::offset::PWM_MAX_CURRENT > motor_controller::offset::VOLTAGE_MAX_CURRENT
);
const_assert!(motor_controller::offset::CONTROL_VOLTAGE > motor_controller::offset::PWM_DUTY_CYCLE);
const_assert!(motor_controller::SIZE == 27);
const_assert!(motor_mover::SIZE == 20);
const_assert!(speed_monitor::manager::SIZE == 16);
const_assert!(speed_monitor::instance::SAMPLE_BUFFER == 9);
const_assert!(motor_controller::SIZE <= crate::buffer::MAX_REGISTER_LEN);
