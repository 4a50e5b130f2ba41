use twimodule::layout::common::{offset, SIGNATURE};
use twimodule::layout::horn;
use twimodule::modules::{Horn, Module};
use twimodule::sim::SimTwi;
use twimodule::twi::TwiResult;

/// Header byte plus every register.
const READ_LEN: usize = horn::SIZE + 1;

fn horn() -> (SimTwi, Horn<SimTwi>) {
    let twi = SimTwi::new();
    let mut horn = Horn::new(twi.clone());
    horn.update();
    (twi, horn)
}

#[cfg(test)]
mod framing_tests {
    use super::*;

    #[test]
    fn test_initial_read_starts_at_register_zero() {
        let (twi, mut horn) = horn();
        let bytes = twi.master_read(&mut horn, READ_LEN);

        assert_eq!(bytes[0], SIGNATURE[0]);
        assert_eq!(&bytes[1..3], &SIGNATURE);
        assert_eq!(bytes[1 + offset::TYPE_SIGNATURE], horn::TYPE_SIGNATURE);
        assert_eq!(bytes[1 + offset::STATUS], 0b11);
    }

    #[test]
    fn test_read_follows_last_written_address() {
        let (twi, mut horn) = horn();
        twi.master_write(&mut horn, &[offset::STATUS as u8]);

        let bytes = twi.master_read(&mut horn, READ_LEN);
        assert_eq!(bytes[0], SIGNATURE[0]);
        assert_eq!(bytes[1], 0b11);
        assert_eq!(bytes[2], 0);
        assert!(bytes[3..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_reads_past_the_buffer_clock_out_zeros() {
        let (twi, mut horn) = horn();
        let bytes = twi.master_read(&mut horn, READ_LEN + 10);
        assert_eq!(bytes.len(), READ_LEN + 10);
        assert!(bytes[READ_LEN..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_write_is_visible_in_the_next_read() {
        let (twi, mut horn) = horn();
        twi.master_write(&mut horn, &[offset::SETTINGS as u8, 0b110]);
        let bytes = twi.master_read(&mut horn, 2);
        assert_eq!(bytes, vec![SIGNATURE[0], 0b110]);
        assert_eq!(horn.slave().settings(), 0b110);
    }

    #[test]
    fn test_oversized_write_is_truncated() {
        let (twi, mut horn) = horn();
        let mut write = vec![offset::SETTINGS as u8];
        write.extend(1..=30u8);

        assert_eq!(twi.master_write(&mut horn, &write), READ_LEN);
        assert_eq!(horn.slave().settings(), 1);
        assert_eq!(horn.registers().len(), horn::SIZE);
    }

    #[test]
    fn test_out_of_range_address_is_ignored() {
        let (twi, mut horn) = horn();
        let before = horn.registers().to_vec();
        twi.master_write(&mut horn, &[horn::SIZE as u8, 0xFF, 0xFF]);
        assert_eq!(horn.registers(), &before[..]);
    }

    #[test]
    fn test_empty_write_changes_nothing() {
        let (twi, mut horn) = horn();
        let before = horn.registers().to_vec();
        twi.master_write(&mut horn, &[]);
        assert_eq!(horn.registers(), &before[..]);
    }
}

#[cfg(test)]
mod liveness_tests {
    use super::*;

    #[test]
    fn test_module_starts_disconnected() {
        let (_twi, horn) = horn();
        assert!(!horn.connected());
    }

    #[test]
    fn test_connection_lasts_for_timeout_ticks() {
        let (twi, mut horn) = horn();
        horn.slave_mut().set_timeout(10);
        twi.master_read(&mut horn, 1);
        horn.update();
        assert!(horn.connected());

        for _ in 0..9 {
            horn.tick();
        }
        assert!(horn.connected());
        horn.tick();
        assert!(!horn.connected());
    }

    #[test]
    fn test_any_completed_transaction_refreshes_liveness() {
        let (twi, mut horn) = horn();
        horn.slave_mut().set_timeout(5);
        twi.master_write(&mut horn, &[0]);
        horn.update();
        for _ in 0..4 {
            horn.tick();
        }
        twi.master_read(&mut horn, 1);
        horn.update();
        for _ in 0..4 {
            horn.tick();
        }
        assert!(horn.connected());
    }

    #[test]
    fn test_bus_anomalies_do_not_keep_the_link_alive() {
        let (twi, mut horn) = horn();
        for result in [TwiResult::NackSent, TwiResult::Error] {
            twi.inject_result(result);
            horn.update();
            assert!(!horn.connected());
        }
    }

    #[test]
    fn test_out_of_range_write_still_counts_as_activity() {
        let (twi, mut horn) = horn();
        twi.master_write(&mut horn, &[0xF0, 1]);
        horn.update();
        assert!(horn.connected());
    }
}

#[cfg(test)]
mod staging_tests {
    use super::*;

    #[test]
    fn test_send_buffer_is_not_refreshed_mid_transaction() {
        let (twi, mut horn) = horn();
        let published = twi.send_buffer();

        twi.set_communicating(true);
        horn.slave_mut().set_operational(false);
        horn.update();
        assert_eq!(twi.send_buffer(), published);

        twi.set_communicating(false);
        horn.update();
        assert_eq!(twi.send_buffer()[1 + offset::STATUS], 0b01);
    }

    #[test]
    fn test_staging_lengths() {
        let (twi, horn) = horn();
        assert_eq!(twi.receive_len(), horn::SIZE + 1);
        assert_eq!(twi.send_buffer().len(), horn::SIZE + 1);
        assert_eq!(horn.slave().manager().header(), &[SIGNATURE[0]]);
    }
}
