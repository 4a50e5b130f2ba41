use twimodule::layout::common::offset::STATUS;
use twimodule::layout::speed_monitor::{instance, instance_size, manager, status};
use twimodule::modules::{Module, SpeedMonitorManager};
use twimodule::sim::SimTwi;

type Monitor = SpeedMonitorManager<SimTwi, u16, 2, 4>;

const CHANNEL_SIZE: usize = instance_size(4, 2);

fn channel_base(index: usize) -> usize {
    manager::SIZE + index * CHANNEL_SIZE
}

fn monitor() -> (SimTwi, Monitor) {
    let twi = SimTwi::new();
    let mut monitor = Monitor::new(twi.clone());
    monitor.update();
    (twi, monitor)
}

#[cfg(test)]
mod layout_tests {
    use super::*;

    #[test]
    fn test_buffer_size() {
        let (_twi, monitor) = monitor();
        assert_eq!(Monitor::BUFFER_SIZE, 16 + 2 * (9 + 4 * 2));
        assert_eq!(monitor.registers().len(), Monitor::BUFFER_SIZE);
    }

    #[test]
    fn test_constants_describe_the_layout() {
        let (_twi, monitor) = monitor();
        let buffer = monitor.slave().buffer();
        assert_eq!(buffer.field_get(STATUS, status::SAMPLE_SIZE_MASK, status::SAMPLE_SIZE), 2);
        assert_eq!(buffer.get::<u8>(manager::INSTANCE_COUNT), 2);
        assert_eq!(buffer.get::<u8>(manager::SAMPLE_COUNT), 4);
        assert!(monitor.slave().active());
        assert!(monitor.slave().operational());
    }

    #[test]
    fn test_channel_constants_are_little_endian() {
        let (_twi, mut monitor) = monitor();
        monitor.channel(1).set_rps_constant(0x0102_0304);
        monitor.channel(1).set_tps_constant(7);
        let base = channel_base(1);
        assert_eq!(&monitor.registers()[base..base + 4], &[4, 3, 2, 1]);
        assert_eq!(monitor.slave().buffer().get::<u32>(base + instance::TPS), 7);
    }

    #[test]
    #[should_panic(expected = "fatal")]
    fn test_channel_index_out_of_range_is_fatal() {
        let (_twi, mut monitor) = monitor();
        let _ = monitor.channel(2);
    }
}

#[cfg(test)]
mod sample_tests {
    use super::*;

    #[test]
    fn test_samples_wrap_around() {
        let (_twi, mut monitor) = monitor();
        let mut channel = monitor.channel(0);
        for sample in [10, 20, 30, 40, 50] {
            channel.push_sample(sample);
        }
        assert_eq!(channel.sample(0), 50);
        assert_eq!(channel.sample(1), 20);
        assert_eq!(channel.sample(3), 40);
        assert_eq!(channel.next_position(), 1);
        assert_eq!(monitor.slave().buffer().get::<u8>(channel_base(0) + instance::SAMPLE_POS), 0);
    }

    #[test]
    fn test_out_of_range_sample_reads_zero() {
        let (_twi, mut monitor) = monitor();
        let mut channel = monitor.channel(1);
        channel.push_sample(99);
        assert_eq!(channel.sample(4), 0);
        assert_eq!(channel.sample(usize::MAX), 0);
    }

    #[test]
    fn test_channels_are_independent() {
        let (_twi, mut monitor) = monitor();
        monitor.channel(0).push_sample(1);
        monitor.channel(1).push_sample(2);
        assert_eq!(monitor.channel(0).sample(0), 1);
        assert_eq!(monitor.channel(1).sample(0), 2);
    }

    #[test]
    fn test_clear_samples() {
        let (_twi, mut monitor) = monitor();
        let mut channel = monitor.channel(0);
        channel.push_sample(5);
        channel.push_sample(6);
        channel.clear_samples();
        assert_eq!(channel.next_position(), 0);
        assert!((0..4).all(|pos| channel.sample(pos) == 0));
    }

    #[test]
    fn test_master_reads_sample_ring() {
        let (twi, mut monitor) = monitor();
        monitor.channel(0).push_sample(0x0A0B);
        monitor.update();

        let ring = channel_base(0) + instance::SAMPLE_BUFFER;
        twi.master_write(&mut monitor, &[ring as u8]);
        let bytes = twi.master_read(&mut monitor, 3);
        assert_eq!(&bytes[1..], &[0x0B, 0x0A]);
    }

    #[test]
    fn test_rps_constant_reasserted_after_overwrite() {
        let (twi, mut monitor) = monitor();
        monitor.slave_mut().set_timeout(10);
        monitor.channel(0).set_rps_constant(60);
        twi.master_read(&mut monitor, 1);
        monitor.update();

        twi.master_write(&mut monitor, &[(channel_base(0) + instance::RPS) as u8, 0, 0, 0, 0]);
        monitor.update();
        assert_eq!(monitor.channel(0).rps_constant(), 60);
        assert_eq!(monitor.slave().buffer().get::<u32>(channel_base(0)), 0);

        for _ in 0..10 {
            monitor.tick();
        }
        monitor.update();
        assert_eq!(monitor.slave().buffer().get::<u32>(channel_base(0)), 60);
    }
}
