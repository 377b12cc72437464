mod common;

use nscamera_drivers::acquisition;
use nscamera_drivers::boards;
use nscamera_drivers::log;
use nscamera_drivers::registers;
use nscamera_drivers::sensors;
use nscamera_drivers::transport;
use nscamera_drivers::types;

type Registers = registers::Registers<transport::Transport<common::Board, common::FakeClock>>;

fn setup(board: common::Board) -> (Registers, acquisition::Controller<common::FakeClock>) {
    let context = log::Context::default();
    let clock = common::FakeClock::new();
    let mut map = boards::Type::LlnlV4
        .register_map(sensors::Type::Icarus2.properties().family)
        .expect("board map");
    sensors::Type::Icarus2
        .extend_register_map(&mut map, boards::Type::LlnlV4.properties())
        .expect("sensor map");
    let transport =
        transport::Transport::new(board, clock.clone(), transport::Timeouts::default(), &context);
    (
        registers::Registers::new(map, transport, &context),
        acquisition::Controller::new(
            acquisition::Polling {
                interval: std::time::Duration::from_millis(50),
                timeout: Some(std::time::Duration::from_secs(1)),
            },
            clock,
            &context,
        ),
    )
}

fn board(registers: &Registers) -> &common::Board {
    registers.bus().channel()
}

fn arm(
    registers: &mut Registers,
    controller: &mut acquisition::Controller<common::FakeClock>,
    mode: types::TriggerMode,
) -> Result<(), acquisition::Error> {
    let latch = boards::Type::LlnlV4.latch_messages();
    controller.arm(registers, &latch, false, mode)
}

#[test]
fn arm_software_trigger() -> Result<(), acquisition::Error> {
    let (mut registers, mut controller) = setup(common::Board::new());
    arm(&mut registers, &mut controller, types::TriggerMode::Software)?;
    assert_eq!(controller.state(), acquisition::State::Armed);
    let board = board(&registers);
    assert_eq!(&board.reads[..2], &[0x02f, 0x031]);
    assert_eq!(board.written(0x026), vec![1, 3, 5, 7, 9, 11, 13, 15]);
    assert_eq!(board.value(0x090), 0xf);
    assert_eq!(board.value(0x010) & 1, 1);
    assert_eq!(board.value(0x03a), 0b100);
    assert_eq!(board.value(0x017) & 1, 1);
    Ok(())
}

#[test]
fn arm_hardware_trigger() -> Result<(), acquisition::Error> {
    let (mut registers, mut controller) = setup(common::Board::new());
    arm(&mut registers, &mut controller, types::TriggerMode::Dual)?;
    assert_eq!(board(&registers).value(0x03a), 0b011);
    arm(&mut registers, &mut controller, types::TriggerMode::Hardware)?;
    assert_eq!(board(&registers).value(0x03a), 0b001);
    Ok(())
}

#[test]
fn read_bulk_requires_data() {
    let (mut registers, mut controller) = setup(common::Board::new());
    let result = controller.read_bulk(&mut registers, 1024, &transport::RetryPolicy::default());
    assert!(matches!(
        result,
        Err(acquisition::Error::InvalidState {
            state: acquisition::State::Disarmed,
            ..
        })
    ));
    assert!(board(&registers).reads.is_empty());
    assert!(board(&registers).writes.is_empty());
    assert_eq!(controller.state(), acquisition::State::Disarmed);
}

#[test]
fn wait_requires_arm() {
    let (mut registers, mut controller) = setup(common::Board::new());
    assert!(matches!(
        controller.wait_for_data(&mut registers),
        Err(acquisition::Error::InvalidState { .. })
    ));
}

#[test]
fn download() -> Result<(), acquisition::Error> {
    let payload: Vec<u8> = (0..1024).map(|index| (index % 251) as u8).collect();
    let mut board = common::Board::new().with_register(common::STAT_REG, 1);
    board.bulk_responses.push_back(common::bulk_response(&payload));
    let (mut registers, mut controller) = setup(board);
    arm(&mut registers, &mut controller, types::TriggerMode::Software)?;
    assert_eq!(
        controller.wait_for_data(&mut registers)?,
        acquisition::Wait::Ready
    );
    assert_eq!(controller.state(), acquisition::State::DataReady);
    let readout = controller.read_bulk(&mut registers, 1024, &transport::RetryPolicy::default())?;
    assert_eq!(readout.outcome, transport::PayloadOutcome::Ok);
    assert_eq!(readout.payload, payload);
    assert_eq!(controller.state(), acquisition::State::Disarmed);
    Ok(())
}

#[test]
fn wait_times_out() -> Result<(), acquisition::Error> {
    let (mut registers, mut controller) = setup(common::Board::new());
    arm(&mut registers, &mut controller, types::TriggerMode::Hardware)?;
    assert_eq!(
        controller.wait_for_data(&mut registers)?,
        acquisition::Wait::TimedOut
    );
    assert_eq!(controller.state(), acquisition::State::DataReady);
    assert!(registers.bus().clock().elapsed() > std::time::Duration::from_secs(1));
    Ok(())
}

#[test]
fn abort_ends_the_wait() -> Result<(), acquisition::Error> {
    let (mut registers, mut controller) = setup(common::Board::new());
    arm(&mut registers, &mut controller, types::TriggerMode::Hardware)?;
    let abort = controller.abort_handle();
    let waiter = std::thread::spawn(move || abort.raise());
    waiter.join().expect("abort thread");
    assert_eq!(
        controller.wait_for_data(&mut registers)?,
        acquisition::Wait::Aborted
    );
    assert_eq!(controller.state(), acquisition::State::DataReady);
    Ok(())
}

#[test]
fn abort_before_arm_is_ignored() -> Result<(), acquisition::Error> {
    let (mut registers, mut controller) =
        setup(common::Board::new().with_register(common::STAT_REG, 1));
    controller.abort_handle().raise();
    arm(&mut registers, &mut controller, types::TriggerMode::Software)?;
    assert_eq!(
        controller.wait_for_data(&mut registers)?,
        acquisition::Wait::Ready
    );
    Ok(())
}

#[test]
fn empty_download() -> Result<(), acquisition::Error> {
    let (mut registers, mut controller) =
        setup(common::Board::new().with_register(common::STAT_REG, 1));
    let policy = transport::RetryPolicy {
        max_attempts: 2,
        settle: std::time::Duration::ZERO,
    };
    arm(&mut registers, &mut controller, types::TriggerMode::Software)?;
    controller.wait_for_data(&mut registers)?;
    assert!(matches!(
        controller.read_bulk(&mut registers, 1024, &policy),
        Err(acquisition::Error::EmptyPayload { attempts: 2 })
    ));
    assert_eq!(controller.state(), acquisition::State::Error);
    controller.disarm(&mut registers)?;
    assert_eq!(controller.state(), acquisition::State::Disarmed);
    assert_eq!(board(&registers).value(0x03a), 0);
    arm(&mut registers, &mut controller, types::TriggerMode::Software)?;
    assert_eq!(controller.state(), acquisition::State::Armed);
    Ok(())
}
