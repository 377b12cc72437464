use nscamera_drivers::sensors;
use nscamera_drivers::timing;
use nscamera_drivers::types;

#[test]
fn paired_icarus() -> Result<(), timing::Error> {
    let compiler = timing::Compiler::new(timing::Model::Icarus2, 4);
    let compiled = compiler.compile_paired(timing::Paired::new(5, 2, 3))?;
    assert_eq!(compiled.repeats, 4);
    assert!(!compiled.truncated);
    assert_eq!(compiled.field.value(), 0x3e_7cf9_f0);
    assert_eq!(
        compiler.decompile_actual(compiled.field),
        vec![3, 5, 2, 5, 2, 5, 2, 5]
    );
    assert_eq!(
        compiler.decompile_settings(compiled.field),
        timing::Paired::new(5, 2, 3)
    );
    Ok(())
}

#[test]
fn paired_icarus_truncated() -> Result<(), timing::Error> {
    let compiler = timing::Compiler::new(timing::Model::Icarus2, 4);
    let compiled = compiler.compile_paired(timing::Paired::new(10, 5, 0))?;
    assert_eq!(compiled.repeats, 2);
    assert!(compiled.truncated);
    Ok(())
}

#[test]
fn paired_icarus_model_1() -> Result<(), timing::Error> {
    let compiler = sensors::Type::Icarus.compiler(2);
    assert_eq!(compiler.model(), timing::Model::Icarus);
    let compiled = compiler.compile_paired(timing::Paired::new(3, 2, 0))?;
    assert_eq!(compiled.repeats, 8);
    assert!(!compiled.truncated);
    assert_eq!(compiled.field.value(), 0x73_9ce7_39ce);
    assert_eq!(compiler.decompile_actual(compiled.field), vec![0, 3, 2, 3]);
    assert_eq!(
        compiler.decompile_settings(compiled.field),
        timing::Paired::new(3, 2, 0)
    );

    let compiled = compiler.compile_paired(timing::Paired::new(5, 2, 3))?;
    assert_eq!(compiled.field.value(), 0x1f_3e7c_f9f0);
    assert_eq!(compiler.decompile_actual(compiled.field), vec![3, 5, 2, 5]);
    Ok(())
}

#[test]
fn paired_icarus_model_1_fits_once() -> Result<(), timing::Error> {
    let compiler = sensors::Type::Icarus.compiler(2);
    let compiled = compiler.compile_paired(timing::Paired::new(20, 15, 0))?;
    assert_eq!(compiled.repeats, 1);
    assert!(compiled.truncated);
    assert_eq!(compiled.field.value(), 0x1f_fffe);
    assert_eq!(compiler.decompile_actual(compiled.field), vec![0, 20, 20, 20]);
    assert_eq!(
        compiler.decompile_settings(compiled.field),
        timing::Paired::new(20, 20, 0)
    );
    Ok(())
}

#[test]
fn paired_daedalus() -> Result<(), timing::Error> {
    let compiler = timing::Compiler::new(timing::Model::Daedalus, 3);
    let compiled = compiler.compile_paired(timing::Paired::new(5, 2, 3))?;
    assert_eq!(compiled.repeats, 5);
    assert!(!compiled.truncated);
    assert_eq!(
        compiler.decompile_actual(compiled.field),
        vec![3, 5, 2, 5, 2, 5]
    );
    assert_eq!(
        compiler.decompile_settings(compiled.field),
        timing::Paired::new(5, 2, 3)
    );
    Ok(())
}

#[test]
fn paired_too_long() {
    let compiler = timing::Compiler::new(timing::Model::Icarus2, 4);
    assert_eq!(
        compiler.compile_paired(timing::Paired::new(35, 10, 0)),
        Err(timing::Error::TooLong {
            request: timing::Paired::new(35, 10, 0)
        })
    );
}

#[test]
fn paired_never_open() -> Result<(), timing::Error> {
    let compiler = timing::Compiler::new(timing::Model::Icarus2, 2);
    let compiled = compiler.compile_paired(timing::Paired::new(0, 4, 2))?;
    assert_eq!(compiled.field.value(), 0);
    assert_eq!(compiled.repeats, 0);
    assert_eq!(compiler.decompile_actual(compiled.field), vec![0; 8]);
    assert_eq!(
        compiler.decompile_settings(compiled.field),
        timing::Paired::default()
    );
    Ok(())
}

#[test]
fn arbitrary() {
    let compiler = timing::Compiler::new(timing::Model::Icarus2, 2);
    let compiled = compiler.compile_arbitrary(&[3, 5, 2, 5]);
    assert_eq!(compiled.repeats, 2);
    assert!(!compiled.truncated);
    assert_eq!(compiled.field.value(), 0xf9f0);
    assert_eq!(
        &compiler.decompile_actual(compiled.field)[..4],
        &[3, 5, 2, 5]
    );

    let compiled = compiler.compile_arbitrary(&[30, 20]);
    assert!(compiled.truncated);
}

#[test]
fn register_halves() {
    let field = timing::BitField40::new(0xab_1234_5678);
    assert_eq!(field.low(), 0x1234_5678);
    assert_eq!(field.high(), 0xab);
    assert_eq!(timing::BitField40::from_registers(0x1234_5678, 0xab), field);
    assert_eq!(timing::BitField40::new(u64::MAX).value(), (1 << 40) - 1);

    let compiled = timing::Compiled {
        field,
        repeats: 1,
        truncated: false,
    };
    let [low, high] = compiled.messages(types::Side::B);
    assert_eq!(low.name, "HS_TIMING_DATA_BLO");
    assert_eq!(low.value, 0x1234_5678);
    assert_eq!(high.name, "HS_TIMING_DATA_BHI");
    assert_eq!(high.value, 0xab);
}

#[test]
fn manual_icarus() -> Result<(), timing::Error> {
    let compiler = timing::Compiler::new(timing::Model::Icarus2, 4);
    let nanoseconds = [100, 200, 300, 400, 500, 600, 700];
    let messages = compiler.manual_messages(&nanoseconds)?;
    assert_eq!(messages.len(), 14);
    assert_eq!(messages[0].name, timing::ICARUS_MANUAL_REGISTERS[0]);
    assert_eq!(messages[0].value, 4);
    assert_eq!(messages[7].value, 4);
    assert_eq!(messages[13].value, 28);
    let counts: Vec<u32> = messages.iter().map(|message| message.value).collect();
    assert_eq!(
        timing::Compiler::manual_nanoseconds(&counts[..7]),
        nanoseconds.to_vec()
    );
    assert!(matches!(
        compiler.manual_messages(&[100; 5]),
        Err(timing::Error::ManualCount { received: 5, .. })
    ));
    assert_eq!(
        compiler.manual_messages(&[50, 100, 100, 100, 100, 100, 100]),
        Err(timing::Error::ManualRange {
            value: 50,
            min: 75,
            max: 25 << 30
        })
    );
    Ok(())
}

#[test]
fn manual_daedalus() -> Result<(), timing::Error> {
    let compiler = timing::Compiler::new(timing::Model::Daedalus, 3);
    let messages = compiler.manual_messages(&[25, 50, 75, 100, 125])?;
    assert_eq!(
        messages.iter().map(|message| message.value).collect::<Vec<_>>(),
        vec![1, 2, 3, 4, 5]
    );
    assert!(compiler.manual_messages(&[25; 7]).is_err());
    Ok(())
}

#[test]
fn timing_mode() {
    let mut mode = timing::TimingMode::Manual(vec![100; 7]);
    assert!(mode.is_manual());
    mode.record(
        types::Side::A,
        timing::Request::Paired(timing::Paired::new(2, 2, 0)),
    );
    assert!(!mode.is_manual());
    assert_eq!(
        mode.request(types::Side::A),
        Some(&timing::Request::Paired(timing::Paired::new(2, 2, 0)))
    );
    assert_eq!(mode.request(types::Side::B), None);
}
