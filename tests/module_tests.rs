use twimodule::buffer::RegisterBuffer;
use twimodule::layout::common::{offset, SIGNATURE};
use twimodule::modules::{ConstantsWriter, Slave};
use twimodule::sim::SimTwi;

const TYPE_SIGNATURE: u8 = 0x77;
const SIZE: usize = offset::SIZE + 2;
const CONSTANT: usize = offset::SIZE;

#[derive(Default)]
struct CountingConstants {
    writes: usize,
}

impl ConstantsWriter for CountingConstants {
    fn write_constants(&mut self, buffer: &mut RegisterBuffer) {
        self.writes += 1;
        buffer.set(CONSTANT, 0xBEEF_u16);
    }
}

fn slave() -> (SimTwi, Slave<SimTwi>) {
    let twi = SimTwi::new();
    let slave = Slave::new(twi.clone(), SIZE, TYPE_SIGNATURE);
    (twi, slave)
}

#[cfg(test)]
mod identity_tests {
    use super::*;

    #[test]
    fn test_new_slave_header() {
        let (_twi, slave) = slave();
        let registers = slave.registers();
        assert_eq!(&registers[..2], &SIGNATURE);
        assert_eq!(slave.signature(), TYPE_SIGNATURE);
        assert!(slave.active());
        assert!(slave.operational());
        assert_eq!(slave.settings(), 0);
        assert!(registers[offset::SIZE..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_name_is_truncated_to_eight_bytes() {
        let (_twi, mut slave) = slave();
        slave.set_name("conveyor-belt");
        assert_eq!(slave.name().as_str(), "conveyor");
    }

    #[test]
    fn test_short_name_is_not_padded() {
        let (_twi, mut slave) = slave();
        slave.set_name("abcdefgh");
        slave.set_name("xy");
        assert_eq!(slave.name().as_str(), "xycdefgh");
    }

    #[test]
    fn test_name_is_cut_at_a_char_boundary() {
        let (_twi, mut slave) = slave();
        slave.set_name("motor-ü");
        assert_eq!(slave.name().as_str(), "motor-ü");
        slave.set_name("pumpenrädchen");
        assert_eq!(slave.name().as_str(), "pumpenr");
    }

    #[test]
    fn test_id_and_led_power_bits() {
        let (twi, mut slave) = slave();
        slave.set_id(7);
        assert_eq!(slave.id(), 7);

        twi.master_write(&mut slave, &[offset::SETTINGS as u8, 0b11]);
        assert!(slave.get_power());
        assert!(slave.get_led());
    }

    #[test]
    #[should_panic(expected = "fatal")]
    fn test_buffer_smaller_than_header_is_fatal() {
        let _ = Slave::new(SimTwi::new(), offset::SIZE - 1, TYPE_SIGNATURE);
    }

    #[test]
    #[should_panic(expected = "fatal")]
    fn test_buffer_larger_than_capacity_is_fatal() {
        let _ = Slave::new(SimTwi::new(), twimodule::buffer::MAX_REGISTER_LEN + 1, TYPE_SIGNATURE);
    }
}

#[cfg(test)]
mod reconnection_tests {
    use super::*;

    #[test]
    fn test_constants_written_once_per_connection_change() {
        let (twi, mut slave) = slave();
        let mut constants = CountingConstants::default();
        slave.set_timeout(20);

        // Starts out considered connected, so the first cycle is a change.
        slave.update(&mut constants);
        assert_eq!(constants.writes, 1);
        slave.update(&mut constants);
        slave.update(&mut constants);
        assert_eq!(constants.writes, 1);

        twi.master_read(&mut slave, 1);
        slave.update(&mut constants);
        assert!(slave.connected());
        assert_eq!(constants.writes, 2);
        slave.update(&mut constants);
        assert_eq!(constants.writes, 2);

        for _ in 0..20 {
            slave.tick();
        }
        slave.update(&mut constants);
        assert!(!slave.connected());
        assert_eq!(constants.writes, 3);
    }

    #[test]
    fn test_master_overwrite_of_constants_persists_until_reconnection() {
        let (twi, mut slave) = slave();
        let mut constants = CountingConstants::default();
        slave.set_timeout(20);
        slave.set_name("lift");
        slave.update(&mut constants);
        twi.master_read(&mut slave, 1);
        slave.update(&mut constants);
        assert_eq!(constants.writes, 2);

        twi.master_write(&mut slave, &[0, 0xFF, 0xFF, 0x00, 0x00]);
        twi.master_write(&mut slave, &[CONSTANT as u8, 1, 2]);
        slave.update(&mut constants);
        assert!(slave.connected());
        assert_eq!(slave.registers()[0], 0xFF);
        assert_eq!(slave.signature(), 0x00);
        assert_eq!(slave.buffer().get::<u16>(CONSTANT), 0x0201);
        assert_eq!(constants.writes, 2);

        for _ in 0..20 {
            slave.tick();
        }
        slave.update(&mut constants);
        assert_eq!(&slave.registers()[..2], &SIGNATURE);
        assert_eq!(slave.signature(), TYPE_SIGNATURE);
        assert_eq!(slave.name().as_str(), "lift");
        assert_eq!(slave.buffer().get::<u16>(CONSTANT), 0xBEEF);
    }

    #[test]
    fn test_active_bit_restored_on_reconnection() {
        let (twi, mut slave) = slave();
        let mut constants = CountingConstants::default();
        slave.update(&mut constants);

        twi.master_write(&mut slave, &[offset::STATUS as u8, 0]);
        assert!(!slave.active());
        slave.update(&mut constants);
        assert!(slave.active());
    }

    #[test]
    fn test_constants_published_to_the_master() {
        let (twi, mut slave) = slave();
        let mut constants = CountingConstants::default();
        slave.update(&mut constants);

        let bytes = twi.master_read(&mut slave, SIZE + 1);
        assert_eq!(&bytes[1 + CONSTANT..], &0xBEEF_u16.to_le_bytes());
    }
}
