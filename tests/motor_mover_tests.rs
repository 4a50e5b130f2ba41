use twimodule::layout::common::offset::{SETTINGS, STATUS};
use twimodule::layout::motor_mover::{offset, settings, status};
use twimodule::modules::{Module, MotorMover, MoverMode};
use twimodule::sim::SimTwi;

fn mover() -> (SimTwi, MotorMover<SimTwi>) {
    let twi = SimTwi::new();
    let mut mover = MotorMover::new(twi.clone());
    mover.slave_mut().set_timeout(50);
    mover.set_position_engaged(1200);
    mover.set_position_disengaged(300);
    mover.update();
    (twi, mover)
}

#[cfg(test)]
mod control_tests {
    use super::*;

    #[test]
    fn test_settings_decode() {
        let (twi, mut mover) = mover();
        assert_eq!(mover.mode(), MoverMode::Binary);
        assert!(!mover.binary_engaged());
        assert!(!mover.mechanism_powered());

        let bits = (1 << settings::MODE) | (1 << settings::ENGAGED) | (1 << settings::POWERED);
        twi.master_write(&mut mover, &[SETTINGS as u8, bits]);
        assert_eq!(mover.mode(), MoverMode::Continuous);
        assert!(mover.binary_engaged());
        assert!(mover.mechanism_powered());
    }

    #[test]
    fn test_continuous_position() {
        let (twi, mut mover) = mover();
        twi.master_write(&mut mover, &[offset::CONTINUOUS_POSITION as u8, 0x34, 0x12]);
        assert_eq!(mover.continuous_position(), 0x1234);
    }

    #[test]
    fn test_engaged_status_follows_argument() {
        let (_twi, mut mover) = mover();
        mover.set_engaged(true);
        assert!(mover.slave().buffer().bit_get(STATUS, status::ENGAGED));
        mover.set_engaged(false);
        assert!(!mover.slave().buffer().bit_get(STATUS, status::ENGAGED));
    }
}

#[cfg(test)]
mod reconnection_tests {
    use super::*;

    #[test]
    fn test_end_positions_reasserted_on_reconnection() {
        let (twi, mut mover) = mover();
        twi.master_read(&mut mover, 1);
        mover.update();
        assert!(mover.connected());

        twi.master_write(&mut mover, &[offset::POSITION_ENGAGED as u8, 0, 0, 0, 0]);
        mover.update();
        assert_eq!(mover.slave().buffer().get::<u16>(offset::POSITION_ENGAGED), 0);
        assert_eq!(mover.position_engaged(), 1200);

        for _ in 0..50 {
            mover.tick();
        }
        mover.update();
        assert!(!mover.connected());
        assert_eq!(mover.slave().buffer().get::<u16>(offset::POSITION_ENGAGED), 1200);
        assert_eq!(mover.slave().buffer().get::<u16>(offset::POSITION_DISENGAGED), 300);
    }
}
