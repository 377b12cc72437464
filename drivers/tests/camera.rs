mod common;

use nscamera_drivers::acquisition;
use nscamera_drivers::boards;
use nscamera_drivers::camera;
use nscamera_drivers::channel;
use nscamera_drivers::device;
use nscamera_drivers::registers;
use nscamera_drivers::sensors;
use nscamera_drivers::sensors::daedalus;
use nscamera_drivers::timing;
use nscamera_drivers::transport;
use nscamera_drivers::types;
use nscamera_drivers::Configuration;

type Camera = camera::Camera<common::Board, common::FakeClock>;

fn configuration(sensor: sensors::Type) -> Configuration {
    Configuration::new(
        boards::Type::LlnlV4,
        sensor,
        channel::Configuration::rs422("/dev/ttyUSB0"),
    )
}

fn icarus2(board: common::Board) -> Result<Camera, camera::Error> {
    Camera::new(
        board.with_register(0x000, common::FPGA_NUM_V4_ICARUS),
        common::FakeClock::new(),
        &configuration(sensors::Type::Icarus2),
    )
}

fn board(camera: &Camera) -> &common::Board {
    camera.registers().bus().channel()
}

#[test]
fn initialize() -> Result<(), camera::Error> {
    let mut camera = icarus2(common::Board::new().with_register(0x001, 0x0002_0001))?;
    let info = camera.initialize()?;
    assert!(info.valid);
    assert_eq!(info.version, 4);
    assert_eq!(info.sensor_id, 1);
    assert_eq!(info.revision, 0x0002_0001);
    assert!(info.rs422);
    let board = board(&camera);
    assert_eq!(board.written(0x041), vec![0]);
    assert_eq!(board.value(0x044), 0);
    assert_eq!(board.value(0x045), 3);
    assert_eq!(board.value(0x043), 1023);
    assert_eq!(board.value(0x013), device::DEFAULT_TIMING_LOW);
    assert_eq!(board.value(0x015), device::DEFAULT_TIMING_LOW);
    assert_eq!(board.value(0x046), 1);
    assert_eq!(board.value(0x090), 0xffff_ffff);
    assert_eq!(board.value(0x091), 0x81a8_01ff);
    Ok(())
}

#[test]
fn initialize_retries_once() -> Result<(), camera::Error> {
    let mut board = common::Board::new();
    board.silent_requests = 1;
    let mut camera = icarus2(board)?;
    assert!(camera.initialize()?.valid);

    let mut board = common::Board::new();
    board.silent_requests = 2;
    let mut camera = icarus2(board)?;
    assert!(matches!(
        camera.initialize(),
        Err(camera::Error::Registers(registers::Error::Transport(
            transport::Error::Timeout
        )))
    ));
    Ok(())
}

#[test]
#[tracing_test::traced_test]
fn mismatched_board_is_not_fatal() -> Result<(), camera::Error> {
    let mut camera = icarus2(common::Board::new())?;
    camera.registers_mut().bus_mut().channel_mut().memory.insert(0x000, 0x1234_5678);
    let info = camera.initialize()?;
    assert!(!info.valid);
    assert!(logs_contain("FPGA self-identification is invalid"));
    Ok(())
}

#[test]
fn selection() -> Result<(), camera::Error> {
    let mut camera = icarus2(common::Board::new())?;
    camera.initialize()?;
    assert_eq!(
        camera.geometry().payload_bytes(),
        4 * 1024 * 512 * 2
    );
    camera.set_frames(types::Region { first: 1, last: 2 })?;
    camera.set_rows(types::Region { first: 0, last: 9 })?;
    assert_eq!(camera.geometry().payload_bytes(), 2 * 10 * 512 * 2);
    assert_eq!(board(&camera).value(0x044), 1);
    assert_eq!(board(&camera).value(0x043), 9);

    let writes = board(&camera).writes.len();
    assert!(matches!(
        camera.set_frames(types::Region { first: 0, last: 4 }),
        Err(camera::Error::FrameRange { .. })
    ));
    assert!(matches!(
        camera.set_rows(types::Region { first: 100, last: 1024 }),
        Err(camera::Error::RowRange { .. })
    ));
    assert!(matches!(
        camera.set_frames(types::Region { first: 3, last: 1 }),
        Err(camera::Error::EmptyRegion(_))
    ));
    assert!(matches!(
        camera.set_rows(types::Region { first: 9, last: 0 }),
        Err(camera::Error::EmptyRegion(_))
    ));
    assert_eq!(board(&camera).writes.len(), writes);
    assert_eq!(camera.frames(), types::Region { first: 1, last: 2 });
    Ok(())
}

#[test]
fn paired_timing() -> Result<(), camera::Error> {
    let mut camera = icarus2(common::Board::new())?;
    camera.initialize()?;
    let compiled = camera.set_timing(Some(types::Side::A), timing::Paired::new(5, 2, 3))?;
    assert_eq!(compiled.repeats, 4);
    assert_eq!(board(&camera).value(0x013), 0x3e7c_f9f0);
    assert_eq!(board(&camera).value(0x014), 0);
    assert_eq!(board(&camera).value(0x015), device::DEFAULT_TIMING_LOW);
    assert_eq!(board(&camera).value(0x010) & 1, 1);
    assert_eq!(board(&camera).value(0x050) & 1, 0);
    assert_eq!(
        camera.actual_timing(types::Side::A)?,
        vec![3, 5, 2, 5, 2, 5, 2, 5]
    );
    assert_eq!(
        camera.timing(types::Side::A)?,
        timing::Paired::new(5, 2, 3)
    );
    assert_eq!(
        camera.timing_mode().request(types::Side::A),
        Some(&timing::Request::Paired(timing::Paired::new(5, 2, 3)))
    );
    assert_eq!(camera.timing_mode().request(types::Side::B), None);
    Ok(())
}

#[test]
fn invalid_timing_changes_nothing() -> Result<(), camera::Error> {
    let mut camera = icarus2(common::Board::new())?;
    camera.initialize()?;
    let writes = board(&camera).writes.len();
    assert!(matches!(
        camera.set_timing(None, timing::Paired::new(35, 10, 0)),
        Err(camera::Error::Timing(timing::Error::TooLong { .. }))
    ));
    assert_eq!(board(&camera).writes.len(), writes);
    assert_eq!(camera.timing_mode(), &timing::TimingMode::default());
    Ok(())
}

#[test]
fn manual_timing() -> Result<(), camera::Error> {
    let mut camera = icarus2(common::Board::new())?;
    camera.initialize()?;
    camera.set_manual_timing(&[100, 200, 300, 400, 500, 600, 700])?;
    assert_eq!(board(&camera).value(0x051), 4);
    assert_eq!(board(&camera).value(0x05e), 28);
    assert_eq!(board(&camera).value(0x050) & 1, 1);
    assert_eq!(board(&camera).value(0x010) & 1, 0);
    assert!(camera.timing_mode().is_manual());
    assert_eq!(
        camera.manual_timing()?,
        [100u64, 200, 300, 400, 500, 600, 700].repeat(2)
    );

    camera.set_arbitrary_timing(Some(types::Side::B), &[3, 5, 2, 5])?;
    assert!(!camera.timing_mode().is_manual());
    assert_eq!(board(&camera).value(0x015), 0xf9f0);
    Ok(())
}

#[test]
fn reinitialize_replays_timing() -> Result<(), camera::Error> {
    let mut camera = icarus2(common::Board::new())?;
    camera.initialize()?;
    camera.set_timing(None, timing::Paired::new(5, 2, 3))?;
    camera.reinitialize()?;
    assert_eq!(board(&camera).value(0x013), 0x3e7c_f9f0);
    assert_eq!(board(&camera).value(0x015), 0x3e7c_f9f0);
    assert_eq!(
        board(&camera).written(0x013),
        vec![
            device::DEFAULT_TIMING_LOW,
            0x3e7c_f9f0,
            device::DEFAULT_TIMING_LOW,
            0x3e7c_f9f0
        ]
    );
    Ok(())
}

#[test]
fn readoff() -> Result<(), camera::Error> {
    let payload: Vec<u8> = (0..1024).map(|index| (index % 7) as u8).collect();
    let mut board = common::Board::new().with_register(common::STAT_REG, 1);
    board.bulk_responses.push_back(common::bulk_response(&payload));
    let mut camera = icarus2(board)?;
    camera.initialize()?;
    camera.set_frames(types::Region { first: 0, last: 0 })?;
    camera.set_rows(types::Region { first: 0, last: 0 })?;
    camera.arm(types::TriggerMode::Software)?;
    assert_eq!(camera.state(), acquisition::State::Armed);
    let (wait, readout) = camera.readoff()?;
    assert_eq!(wait, acquisition::Wait::Ready);
    assert_eq!(readout.outcome, transport::PayloadOutcome::Ok);
    assert_eq!(readout.payload, payload);
    assert_eq!(camera.state(), acquisition::State::Disarmed);
    assert!(matches!(
        camera.read_bulk(),
        Err(camera::Error::Acquisition(
            acquisition::Error::InvalidState { .. }
        ))
    ));
    Ok(())
}

#[test]
fn board_controls() -> Result<(), camera::Error> {
    let mut camera = icarus2(common::Board::new().with_register(0x03d, 1234))?;
    camera.initialize()?;
    let writes = board(&camera).writes.len();
    camera.set_led(1, true)?;
    assert_eq!(board(&camera).writes.len(), writes);

    camera.set_power_save(true)?;
    assert_eq!(board(&camera).value(0x025) & 0b1000, 0b1000);
    assert_eq!(camera.timer()?, 1234);
    camera.reset_timer()?;
    assert_eq!(board(&camera).written(0x03c), vec![1, 0]);

    camera.select_oscillator(device::Oscillator::RingBypass)?;
    assert_eq!(board(&camera).value(0x047) & 0b11, 2);
    assert!(matches!(
        camera.select_oscillator(device::Oscillator::Internal500MHz),
        Err(camera::Error::Unsupported { .. })
    ));

    let dump = camera.dump_registers()?;
    assert_eq!(dump.len(), camera.registers().map().registers().count());
    assert!(dump.contains(&("FPGA_NUM".to_owned(), 0x000, common::FPGA_NUM_V4_ICARUS)));
    Ok(())
}

#[test]
fn pots() -> Result<(), camera::Error> {
    let mut camera = icarus2(common::Board::new())?;
    camera.initialize()?;
    assert_eq!(camera.set_pot_voltage("VRST", 2.5)?, 0.5);
    assert!((camera.get_pot_voltage("VRST")? - 2.5).abs() < 1e-3);
    camera.set_pot("VAB", 1.0)?;
    assert_eq!(camera.get_pot("DACG")?, 1.0);
    assert!(matches!(
        camera.set_pot_voltage("STAT_REG", 1.0),
        Err(camera::Error::Registers(registers::Error::UnknownSubregister(_)))
    ));
    Ok(())
}

#[test]
fn tuned_pot_voltage() -> Result<(), camera::Error> {
    let mut configuration = configuration(sensors::Type::Icarus2);
    configuration.tuning.enabled = true;
    let mut board = common::Board::new().with_register(0x000, common::FPGA_NUM_V4_ICARUS);
    board.analog_loop = Some(common::AnalogLoop {
        pot: 0x02a,
        monitor: 0x098,
        gain: 0.8,
    });
    let mut camera = Camera::new(board, common::FakeClock::new(), &configuration)?;
    camera.initialize()?;
    // the monitor reads 2.64 V at full scale, the calibration assumes 5 V
    let setting = camera.set_pot_voltage("VRST", 1.0)?;
    assert!((setting - 1.0 / 2.64).abs() < 5e-3);
    assert!((camera.monitor_voltage("VRST")? - 1.0).abs() < 0.01);
    Ok(())
}

#[test]
#[tracing_test::traced_test]
fn unresponsive_monitor_falls_back_to_calibration() -> Result<(), camera::Error> {
    let mut configuration = configuration(sensors::Type::Icarus2);
    configuration.tuning.enabled = true;
    let mut camera = Camera::new(
        common::Board::new().with_register(0x000, common::FPGA_NUM_V4_ICARUS),
        common::FakeClock::new(),
        &configuration,
    )?;
    camera.initialize()?;
    assert_eq!(camera.set_pot_voltage("VRST", 2.5)?, 0.5);
    assert_eq!(board(&camera).value(0x02a) & 0xffff, 0x8000);
    assert_eq!(board(&camera).written(0x026).last(), Some(&15));
    assert!(logs_contain("tuning unavailable, using the calibration"));
    Ok(())
}

#[test]
fn icarus_has_no_readout_modes() -> Result<(), camera::Error> {
    let mut camera = icarus2(common::Board::new())?;
    camera.initialize()?;
    assert!(matches!(
        camera.set_interlacing(1, None),
        Err(camera::Error::Unsupported {
            sensor: "Icarus2",
            ..
        })
    ));
    assert!(matches!(
        camera.set_trigger_delay(1.0),
        Err(camera::Error::Unsupported { .. })
    ));
    Ok(())
}

#[test]
fn daedalus_readout_modes() -> Result<(), camera::Error> {
    let mut camera = Camera::new(
        common::Board::new().with_register(0x000, 0x8400_0102),
        common::FakeClock::new(),
        &configuration(sensors::Type::Daedalus),
    )?;
    let info = camera.initialize()?;
    assert_eq!(info.sensor_id, 2);
    assert_eq!(board(&camera).value(0x160), 0);

    camera.set_interlacing(1, Some(types::Side::A))?;
    assert_eq!(board(&camera).value(0x025) & (1 << 9), 1 << 9);
    assert_eq!(board(&camera).value(0x160), 0xaaaa_aaaa);
    assert_eq!(board(&camera).value(0x140), 0);
    assert_eq!(camera.readout_modes().interlacing, [1, 0]);

    camera.set_high_full_well(true)?;
    assert_eq!(board(&camera).value(0x133), 1);
    assert_eq!(board(&camera).value(0x160), 0);
    assert_eq!(
        camera.readout_modes(),
        daedalus::Modes {
            interlacing: [0, 0],
            high_full_well: true,
            zero_dead_time: false,
        }
    );

    camera.set_zero_dead_time(true, None)?;
    assert_eq!(board(&camera).value(0x133), 0);
    assert_eq!(board(&camera).value(0x135), 1);
    assert_eq!(board(&camera).value(0x136), 1);
    assert!(!camera.readout_modes().high_full_well);

    assert!((camera.set_trigger_delay(0.3)? - 0.3).abs() < 1e-9);
    assert_eq!(board(&camera).value(0x120), 0b11);
    assert_eq!(board(&camera).value(0x131), 1);
    assert!(matches!(
        camera.set_phi_delay(2.0, None),
        Err(camera::Error::Readout(daedalus::Error::Delay { .. }))
    ));

    camera.set_external_clock(1e6)?;
    assert_eq!(board(&camera).value(0x129), 19);
    assert_eq!(board(&camera).value(0x047) & 0b11, 3);
    Ok(())
}
