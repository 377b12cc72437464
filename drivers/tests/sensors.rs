use nscamera_drivers::boards;
use nscamera_drivers::channel;
use nscamera_drivers::device;
use nscamera_drivers::sensors;
use nscamera_drivers::sensors::daedalus;
use nscamera_drivers::timing;
use nscamera_drivers::types;
use nscamera_drivers::Configuration;

#[test]
fn parse_types() {
    assert_eq!("llnl_v4".parse::<boards::Type>(), Ok(boards::Type::LlnlV4));
    assert_eq!("daedalus".parse::<sensors::Type>(), Ok(sensors::Type::Daedalus));
    assert_eq!(
        "icarus3".parse::<sensors::Type>().map_err(|error| error.to_string()),
        Err("unknown sensor type \"icarus3\"".to_owned())
    );
    assert_eq!(
        "llnl_v2".parse::<boards::Type>().map_err(|error| error.to_string()),
        Err("unknown board type \"llnl_v2\"".to_owned())
    );
    for sensor in sensors::Type::ALL {
        assert_eq!(sensor.to_string().parse::<sensors::Type>(), Ok(*sensor));
    }
    for board in boards::Type::ALL {
        assert_eq!(board.to_string().parse::<boards::Type>(), Ok(*board));
    }
}

#[test]
fn properties() {
    assert_eq!(boards::Type::LlnlV1.name(), "LLNL v1");
    assert_eq!(boards::Type::LlnlV4.properties().version, 4);
    assert_eq!(sensors::Type::Icarus.properties().frames.len(), 2);
    assert_eq!(sensors::Type::Icarus2.properties().frames.len(), 4);
    assert_eq!(sensors::Type::Daedalus.properties().frames.len(), 3);
    assert_eq!(
        sensors::Type::Daedalus.compiler(3).family(),
        timing::Family::Daedalus
    );
    assert_eq!(sensors::Type::Icarus.compiler(2).model(), timing::Model::Icarus);
    assert_eq!(sensors::Type::Icarus2.compiler(4).model(), timing::Model::Icarus2);
    assert_eq!(sensors::Type::Daedalus.detect_subregister(), "DAEDALUS_DET");
    assert_eq!(sensors::Type::Icarus2.detect_subregister(), "ICARUS_DET");
    assert_eq!(
        sensors::Type::Icarus.oscillator_code(device::Oscillator::Relaxation),
        Some(0)
    );
    assert_eq!(
        sensors::Type::Daedalus.oscillator_code(device::Oscillator::Relaxation),
        None
    );
}

#[test]
fn sensor_layout_depends_on_board() -> Result<(), nscamera_drivers::registers::Error> {
    let mut v1 = boards::Type::LlnlV1.register_map(timing::Family::Icarus)?;
    sensors::Type::Icarus.extend_register_map(&mut v1, boards::Type::LlnlV1.properties())?;
    assert_eq!(v1.subregister("VRESET_HIGH")?.width(), 8);
    assert!(v1.contains_subregister("ICARUS_DET"));
    assert!(!v1.contains_register("DELAY_ASSERTION_ROWDCD_EN"));

    let mut v4 = boards::Type::LlnlV4.register_map(timing::Family::Icarus)?;
    sensors::Type::Icarus.extend_register_map(&mut v4, boards::Type::LlnlV4.properties())?;
    assert_eq!(v4.subregister("VRESET_HIGH")?.width(), 16);
    assert!(!v4.contains_subregister("ICARUS_DET"));
    assert!(v4.contains_register("DELAY_ASSERTION_ROWDCD_EN"));

    let messages = sensors::Type::Icarus.init_messages(boards::Type::LlnlV1.properties());
    assert_eq!(
        messages.last(),
        Some(&nscamera_drivers::Message::new("VRESET_HIGH_VALUE", 0xd5))
    );
    Ok(())
}

#[test]
fn board_identification() {
    let info = device::BoardInfo::new(0x8100_0202, 7);
    assert!(info.valid);
    assert_eq!(info.version, 1);
    assert_eq!(info.sensor_id, 2);
    assert!(info.gige);
    assert!(!info.rs422);
    assert!(device::BoardInfo::new(device::BoardInfo::LEGACY, 0).valid);
    assert!(!device::BoardInfo::new(0x8200_0001, 0).valid);
    assert!(!device::BoardInfo::new(0x8400_0003, 0).valid);
}

#[test]
fn interlacing_bounds() {
    let modes = daedalus::Modes::default();
    assert_eq!(
        modes.interlacing(1024, None).map(|(modes, _)| modes),
        Err(daedalus::Error::Interlacing {
            factor: 1024,
            max: 1023
        })
    );
    let (modes, messages) = modes.interlacing(1023, None).expect("largest factor");
    assert_eq!(modes.interlacing, [1023, 1023]);
    let row_zero_only = messages
        .iter()
        .find(|message| message.name == "RSL_CONFIG_DATA_B0")
        .map(|message| message.value);
    assert_eq!(row_zero_only, Some(0xffff_fffe));
}

#[test]
fn modes_exclude_each_other() {
    let (modes, _) = daedalus::Modes::default().zero_dead_time(true, Some(types::Side::B));
    assert!(modes.zero_dead_time);
    assert_eq!(modes.interlacing, [0, 1]);

    let (modes, messages) = modes.interlacing(2, None).expect("valid factor");
    assert!(!modes.zero_dead_time);
    assert_eq!(modes.interlacing, [2, 2]);
    assert_eq!(messages[0], nscamera_drivers::Message::new("ZDT_A", 0));
    assert_eq!(messages[1], nscamera_drivers::Message::new("ZDT_B", 0));

    let (modes, messages) = modes.high_full_well(true);
    assert!(modes.high_full_well);
    assert_eq!(modes.interlacing, [0, 0]);
    assert_eq!(messages[0], nscamera_drivers::Message::new("HFW", 1));

    let (modes, _) = modes.zero_dead_time(false, None);
    assert!(modes.high_full_well);
    assert!(!modes.zero_dead_time);
}

#[test]
fn delays() -> Result<(), daedalus::Error> {
    let (messages, applied) = daedalus::trigger_delay_messages(6.0)?;
    assert!((applied - 6.0).abs() < 1e-9);
    assert_eq!(messages[1].value, u32::MAX);
    assert_eq!(messages[2].value, 0xff);
    let (messages, applied) = daedalus::phi_delay_messages(0.2, Some(types::Side::B))?;
    assert!((applied - 0.15).abs() < 1e-9);
    assert_eq!(messages, vec![nscamera_drivers::Message::new("PHI_DELAY_B", 1)]);
    assert!(daedalus::trigger_delay_messages(-0.1).is_err());
    assert!(daedalus::external_clock_messages(0.0).is_err());
    assert!(daedalus::external_clock_messages(f64::NAN).is_err());
    assert_eq!(
        daedalus::external_clock_messages(4e7)?,
        vec![nscamera_drivers::Message::new("HST_EXT_CLK_HALF_PER", 0)]
    );
    Ok(())
}

#[test]
fn configuration() -> Result<(), nscamera_drivers::bincode::Error> {
    let configuration = Configuration::new(
        boards::Type::LlnlV1,
        sensors::Type::Icarus,
        channel::Configuration::Rs422 {
            path: "/dev/ttyUSB0".to_owned(),
            baud_rate: 0,
        },
    )
    .with_tag("bench");
    assert_eq!(
        configuration.interface,
        channel::Configuration::Rs422 {
            path: "/dev/ttyUSB0".to_owned(),
            baud_rate: 921600,
        }
    );
    assert_eq!(configuration.log.tag.as_deref(), Some("bench"));
    assert!(!configuration.tuning.enabled);
    let bytes = configuration.serialize_bincode()?;
    assert_eq!(Configuration::deserialize_bincode(&bytes)?, configuration);
    Ok(())
}
