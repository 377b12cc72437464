use crate::device;
use crate::properties;
use crate::registers;
use crate::timing;
use crate::types;

/// Resolution of the trigger and phi delay lines.
pub const DELAY_STEP_NANOSECONDS: f64 = 0.15;

pub const MAX_TRIGGER_DELAY_NANOSECONDS: f64 = 6.0;

pub const MAX_PHI_DELAY_NANOSECONDS: f64 = 1.5;

/// Row selection registers per side (32 rows each).
const RSL_CONFIG_REGISTERS: u32 = 32;

pub struct Sensor;

const REGISTERS: &[(&str, u16)] = &[
    ("HST_READBACK_A_LO", 0x018),
    ("HST_READBACK_A_HI", 0x019),
    ("HST_READBACK_B_LO", 0x01a),
    ("HST_READBACK_B_HI", 0x01b),
    ("HSTALLWEN_WAIT_TIME", 0x03f),
    ("VRESET_HIGH_VALUE", 0x04a),
    ("FRAME_ORDER_SEL", 0x04b),
    ("EXT_PHI_CLK_SH0_ON", 0x050),
    ("EXT_PHI_CLK_SH0_OFF", 0x051),
    ("EXT_PHI_CLK_SH1_ON", 0x052),
    ("EXT_PHI_CLK_SH1_OFF", 0x053),
    ("EXT_PHI_CLK_SH2_ON", 0x054),
    ("HST_TRIGGER_DELAY_DATA_LO", 0x120),
    ("HST_TRIGGER_DELAY_DATA_HI", 0x121),
    ("HST_PHI_DELAY_DATA", 0x122),
    ("HST_EXT_CLK_HALF_PER", 0x129),
    ("HST_COUNT_TRIG", 0x130),
    ("HST_DELAY_EN", 0x131),
    ("RSL_HFW_MODE_EN", 0x133),
    ("RSL_ZDT_MODE_B_EN", 0x135),
    ("RSL_ZDT_MODE_A_EN", 0x136),
    ("BGTRIMA", 0x137),
    ("BGTRIMB", 0x138),
    ("COLUMN_TEST_EN", 0x139),
];

const SUBREGISTERS: &[registers::Entry] = registers::subregisters! {
    "HST_MODE" => "HS_TIMING_CTL" [0; 1] rw,
    "SLOWREADOFF_0" => "CTRL_REG" [4; 1] rw,
    "SLOWREADOFF_1" => "CTRL_REG" [5; 1] rw,
    "MANSHUT_MODE" => "CTRL_REG" [8; 1] rw,
    "INTERLACING_EN" => "CTRL_REG" [9; 1] rw,
    "HFW" => "RSL_HFW_MODE_EN" [0; 1] rw,
    "ZDT_A" => "RSL_ZDT_MODE_A_EN" [0; 1] rw,
    "ZDT_B" => "RSL_ZDT_MODE_B_EN" [0; 1] rw,
    "HST_DEL_EN" => "HST_DELAY_EN" [0; 1] rw,
    "PHI_DELAY_A" => "HST_PHI_DELAY_DATA" [9; 10] rw,
    "PHI_DELAY_B" => "HST_PHI_DELAY_DATA" [29; 10] rw,
    "VRESET_HIGH" => "VRESET_HIGH_VALUE" [15; 16] rw,
    "STAT_SH0RISEUR" => "STAT_REG" [3; 1] ro,
    "STAT_SH0FALLUR" => "STAT_REG" [4; 1] ro,
    "STAT_RSLNALLWENA" => "STAT_REG" [12; 1] ro,
    "STAT_RSLNALLWENB" => "STAT_REG" [15; 1] ro,
};

fn rsl_config_register(side: types::Side, index: u32) -> String {
    format!("RSL_CONFIG_DATA_{side}{index}")
}

impl device::Sensor for Sensor {
    const PROPERTIES: properties::Sensor = properties::Sensor {
        name: "Daedalus",
        family: timing::Family::Daedalus,
        timing: timing::Model::Daedalus,
        fpga_id: 2,
        frames: types::Region { first: 0, last: 2 },
        width: 512,
        height: 1024,
        bytes_per_pixel: 2,
    };

    const DETECT: &'static str = "DAEDALUS_DET";

    const REGISTERS: &'static [(&'static str, u16)] = REGISTERS;

    const SUBREGISTERS: &'static [registers::Entry] = SUBREGISTERS;

    fn extend_register_map(
        map: &mut registers::RegisterMap,
        _board: &properties::Board,
    ) -> Result<(), registers::Error> {
        map.insert_registers(REGISTERS);
        for side in types::Side::BOTH {
            let base: u16 = match side {
                types::Side::A => 0x160,
                types::Side::B => 0x140,
            };
            for index in 0..RSL_CONFIG_REGISTERS {
                map.insert_registers(&[(
                    rsl_config_register(side, index).as_str(),
                    base + index as u16,
                )]);
            }
        }
        map.insert_subregisters(SUBREGISTERS)
    }

    fn init_messages(_board: &properties::Board) -> Vec<registers::Message> {
        let mut messages =
            super::selection_messages(Self::PROPERTIES.frames, Self::PROPERTIES.rows()).to_vec();
        // side A first
        let [b_high, b_low, a_high, a_low] = device::default_timing_messages();
        messages.extend([a_low, a_high, b_low, b_high]);
        messages.extend([
            registers::Message::new("FRAME_ORDER_SEL", 0),
            registers::Message::new("RSL_HFW_MODE_EN", 0),
            registers::Message::new("RSL_ZDT_MODE_B_EN", 0),
            registers::Message::new("RSL_ZDT_MODE_A_EN", 0),
        ]);
        for side in [types::Side::B, types::Side::A] {
            for index in 0..RSL_CONFIG_REGISTERS {
                messages.push(registers::Message::new(rsl_config_register(side, index), 0));
            }
        }
        messages.extend([
            registers::Message::new("HST_TRIGGER_DELAY_DATA_LO", 0),
            registers::Message::new("HST_TRIGGER_DELAY_DATA_HI", 0),
            registers::Message::new("HST_PHI_DELAY_DATA", 0),
            registers::Message::new("SLOWREADOFF_0", 0),
            registers::Message::new("SLOWREADOFF_1", 0),
        ]);
        messages
    }

    fn oscillator_code(oscillator: device::Oscillator) -> Option<u32> {
        match oscillator {
            device::Oscillator::Internal500MHz => Some(0),
            device::Oscillator::Internal100MHz => Some(1),
            device::Oscillator::Ring => Some(2),
            device::Oscillator::External => Some(3),
            _ => None,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("interlacing factor {factor} is larger than {max}")]
    Interlacing { factor: u32, max: u32 },

    #[error("{line} delay {delay} ns is outside [0, {max}] ns")]
    Delay {
        line: &'static str,
        delay: f64,
        max: f64,
    },

    #[error("external clock frequency {0} Hz is not positive")]
    Frequency(f64),
}

/// Row readout modes. High full well, zero dead time and interlacing exclude
/// each other; enabling one disengages the others.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Modes {
    /// Interlacing factor of sides A and B.
    pub interlacing: [u32; 2],
    pub high_full_well: bool,
    pub zero_dead_time: bool,
}

impl Modes {
    /// Returns the modes after interlacing `factor` lines on `side` (both if `None`)
    /// and the writes that apply them. Each frame yields `factor + 1` images.
    pub fn interlacing(
        &self,
        factor: u32,
        side: Option<types::Side>,
    ) -> Result<(Self, Vec<registers::Message>), Error> {
        let max = <Sensor as device::Sensor>::PROPERTIES.height - 1;
        if factor > max {
            return Err(Error::Interlacing { factor, max });
        }
        let mut modes = *self;
        let mut messages = Vec::new();
        if modes.high_full_well {
            tracing::warn!("high full well disengaged by interlacing");
            messages.push(registers::Message::new("HFW", 0));
            modes.high_full_well = false;
        }
        if modes.zero_dead_time {
            tracing::warn!("zero dead time disengaged by interlacing");
            messages.extend(zero_dead_time_writes(false, None));
            modes.zero_dead_time = false;
        }
        messages.extend(interlacing_writes(&mut modes, factor, side));
        Ok((modes, messages))
    }

    /// All rows integrate simultaneously; interlacing is reset to 0.
    pub fn high_full_well(&self, enable: bool) -> (Self, Vec<registers::Message>) {
        let mut modes = *self;
        let mut messages = Vec::new();
        if enable {
            if modes.zero_dead_time {
                tracing::warn!("zero dead time disengaged by high full well");
                messages.extend(zero_dead_time_writes(false, None));
                modes.zero_dead_time = false;
            }
            messages.push(registers::Message::new("HFW", 1));
            messages.extend(interlacing_writes(&mut modes, 0, None));
        } else {
            messages.push(registers::Message::new("HFW", 0));
        }
        modes.high_full_well = enable;
        (modes, messages)
    }

    /// Odd rows integrate while the even rows' shutter is closed. Disabling
    /// resets interlacing to 0 on both sides.
    pub fn zero_dead_time(
        &self,
        enable: bool,
        side: Option<types::Side>,
    ) -> (Self, Vec<registers::Message>) {
        let mut modes = *self;
        let mut messages = Vec::new();
        if enable {
            if modes.high_full_well {
                tracing::warn!("high full well disengaged by zero dead time");
                messages.push(registers::Message::new("HFW", 0));
                modes.high_full_well = false;
            }
            messages.extend(zero_dead_time_writes(true, side));
            for side in sides(side) {
                modes.interlacing[side as usize] = 1;
            }
        } else {
            messages.extend(zero_dead_time_writes(false, side));
            messages.extend(interlacing_writes(&mut modes, 0, None));
        }
        modes.zero_dead_time = enable;
        (modes, messages)
    }
}

fn sides(side: Option<types::Side>) -> Vec<types::Side> {
    match side {
        Some(side) => vec![side],
        None => types::Side::BOTH.to_vec(),
    }
}

fn zero_dead_time_writes(enable: bool, side: Option<types::Side>) -> Vec<registers::Message> {
    sides(side)
        .into_iter()
        .map(|side| {
            registers::Message::new(
                match side {
                    types::Side::A => "ZDT_A",
                    types::Side::B => "ZDT_B",
                },
                u32::from(enable),
            )
        })
        .collect()
}

/// Row `r` is skipped unless `r` is a multiple of `factor + 1`. Row 0 of each
/// register is its least significant bit.
fn interlacing_writes(
    modes: &mut Modes,
    factor: u32,
    side: Option<types::Side>,
) -> Vec<registers::Message> {
    let mut messages = Vec::new();
    if factor > 0 {
        messages.push(registers::Message::new("INTERLACING_EN", 1));
    } else if side.is_none() {
        messages.push(registers::Message::new("INTERLACING_EN", 0));
    }
    for index in 0..RSL_CONFIG_REGISTERS {
        let value = if factor == 0 {
            0
        } else {
            (0..32).fold(0u32, |value, bit| {
                let row = index * 32 + bit;
                if row % (factor + 1) != 0 {
                    value | (1 << bit)
                } else {
                    value
                }
            })
        };
        for side in sides(side) {
            messages.push(registers::Message::new(
                rsl_config_register(side, index),
                value,
            ));
        }
    }
    for side in sides(side) {
        modes.interlacing[side as usize] = factor;
    }
    messages
}

fn delay_steps(nanoseconds: f64, line: &'static str, max: f64) -> Result<u32, Error> {
    if !(0.0..=max).contains(&nanoseconds) {
        return Err(Error::Delay {
            line,
            delay: nanoseconds,
            max,
        });
    }
    // 1e-9 absorbs representation error (0.3 / 0.15 must give 2 steps)
    Ok((nanoseconds / DELAY_STEP_NANOSECONDS + 1e-9).floor() as u32)
}

/// Delays the high-speed sequence after the trigger, in 0.15 ns steps.
/// Returns the writes and the delay actually applied.
pub fn trigger_delay_messages(nanoseconds: f64) -> Result<(Vec<registers::Message>, f64), Error> {
    let steps = delay_steps(nanoseconds, "trigger", MAX_TRIGGER_DELAY_NANOSECONDS)?
        .min(timing::FIELD_BITS);
    let field = timing::BitField40::new((1u64 << steps) - 1);
    Ok((
        vec![
            registers::Message::new("HST_DEL_EN", 1),
            registers::Message::new("HST_TRIGGER_DELAY_DATA_LO", field.low()),
            registers::Message::new("HST_TRIGGER_DELAY_DATA_HI", field.high()),
            registers::Message::new("HST_MODE", 1),
        ],
        f64::from(steps) * DELAY_STEP_NANOSECONDS,
    ))
}

/// Delays the phi clock of `side` (both if `None`), in 0.15 ns steps.
pub fn phi_delay_messages(
    nanoseconds: f64,
    side: Option<types::Side>,
) -> Result<(Vec<registers::Message>, f64), Error> {
    let steps = delay_steps(nanoseconds, "phi", MAX_PHI_DELAY_NANOSECONDS)?.min(10);
    let value = (1u32 << steps) - 1;
    Ok((
        sides(side)
            .into_iter()
            .map(|side| {
                registers::Message::new(
                    match side {
                        types::Side::A => "PHI_DELAY_A",
                        types::Side::B => "PHI_DELAY_B",
                    },
                    value,
                )
            })
            .collect(),
        f64::from(steps) * DELAY_STEP_NANOSECONDS,
    ))
}

/// Half-period count of the external phi clock (20 MHz at most).
pub fn external_clock_messages(frequency: f64) -> Result<Vec<registers::Message>, Error> {
    if frequency.is_nan() || frequency <= 0.0 {
        return Err(Error::Frequency(frequency));
    }
    let count = 2e7 / frequency - 1.0;
    if count < 0.0 {
        tracing::warn!(frequency, "external clock limited to 20 MHz");
    }
    let count = count.clamp(0.0, f64::from(u32::MAX)) as u32;
    Ok(vec![registers::Message::new("HST_EXT_CLK_HALF_PER", count)])
}
