use crate::pots;
use crate::properties;
use crate::registers;
use crate::timing;

/// A camera board: its register layout, analog front end and setup sequence.
pub trait Board {
    const PROPERTIES: properties::Board;

    const REGISTERS: &'static [(&'static str, u16)];

    const SUBREGISTERS: &'static [registers::Entry];

    /// Sensor-facing names for the board's pots and monitors.
    fn aliases(family: timing::Family) -> &'static [(&'static str, &'static str)];

    /// Pairs of (monitor, pot) for pots whose output can be measured.
    fn monitors(family: timing::Family) -> &'static [(&'static str, &'static str)];

    /// ADC configuration and board controls, sent after clearing status.
    fn init_messages() -> Vec<registers::Message>;

    fn led_messages(_led: u8, _on: bool) -> Vec<registers::Message> {
        Vec::new()
    }

    /// Latches every pot, in pot order.
    fn latch_messages() -> Vec<registers::Message> {
        Self::PROPERTIES
            .pot_ranges
            .iter()
            .filter_map(|range| pots::latch_value(range.name))
            .map(|value| registers::Message::new(Self::PROPERTIES.analog.latch_register, value))
            .collect()
    }

    fn register_map(family: timing::Family) -> Result<registers::RegisterMap, registers::Error> {
        let mut map = registers::RegisterMap::new();
        map.insert_registers(Self::REGISTERS);
        map.insert_subregisters(Self::SUBREGISTERS)?;
        map.insert_aliases(Self::aliases(family));
        map.insert_monitors(Self::monitors(family));
        pots::calibrate(&mut map, Self::PROPERTIES.pot_ranges)?;
        Ok(map)
    }
}

/// An image sensor: its extra registers, geometry and default configuration.
pub trait Sensor {
    const PROPERTIES: properties::Sensor;

    /// Board status bit set when the sensor is plugged in.
    const DETECT: &'static str;

    const REGISTERS: &'static [(&'static str, u16)];

    const SUBREGISTERS: &'static [registers::Entry];

    fn detect_subregister() -> &'static str {
        Self::DETECT
    }

    /// Registers and subregisters whose layout differs between boards.
    fn board_specific(
        _board: &properties::Board,
    ) -> (&'static [(&'static str, u16)], &'static [registers::Entry]) {
        (&[], &[])
    }

    /// Frame and row selection, default timing and sensor controls.
    fn init_messages(board: &properties::Board) -> Vec<registers::Message>;

    /// `OSC_SELECT` value for `oscillator`, `None` if the sensor cannot use it.
    fn oscillator_code(oscillator: Oscillator) -> Option<u32>;

    fn extend_register_map(
        map: &mut registers::RegisterMap,
        board: &properties::Board,
    ) -> Result<(), registers::Error> {
        let (registers, subregisters) = Self::board_specific(board);
        map.insert_registers(Self::REGISTERS);
        map.insert_registers(registers);
        map.insert_subregisters(Self::SUBREGISTERS)?;
        map.insert_subregisters(subregisters)
    }
}

/// Timing clock sources. Each sensor supports a subset.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Oscillator {
    Relaxation,
    Ring,
    /// Ring oscillator without its capacitors.
    RingBypass,
    Internal500MHz,
    Internal100MHz,
    External,
}

impl std::fmt::Display for Oscillator {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Relaxation => write!(formatter, "relaxation"),
            Self::Ring => write!(formatter, "ring"),
            Self::RingBypass => write!(formatter, "ring (bypass)"),
            Self::Internal500MHz => write!(formatter, "500 MHz"),
            Self::Internal100MHz => write!(formatter, "100 MHz"),
            Self::External => write!(formatter, "external"),
        }
    }
}

/// Default high-speed timing field (two frames open, two closed per cycle).
pub const DEFAULT_TIMING_LOW: u32 = 0x6666;

pub fn default_timing_messages() -> [registers::Message; 4] {
    [
        registers::Message::new("HS_TIMING_DATA_BHI", 0),
        registers::Message::new("HS_TIMING_DATA_BLO", DEFAULT_TIMING_LOW),
        registers::Message::new("HS_TIMING_DATA_AHI", 0),
        registers::Message::new("HS_TIMING_DATA_ALO", DEFAULT_TIMING_LOW),
    ]
}

/// Ring oscillator with capacitors, divided clock enabled.
pub fn oscillator_messages() -> [registers::Message; 2] {
    [
        registers::Message::new("FPA_OSCILLATOR_SEL_ADDR", 0),
        registers::Message::new("FPA_DIVCLK_EN_ADDR", 1),
    ]
}

pub fn timing_mode_messages(manual: bool) -> [registers::Message; 2] {
    [
        registers::Message::new("HST_MODE", u32::from(!manual)),
        registers::Message::new("MANSHUT_MODE", u32::from(manual)),
    ]
}

/// Decoded `FPGA_NUM` and `FPGA_REV` registers.
#[derive(Debug, Copy, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BoardInfo {
    pub raw: u32,
    /// Firmware revision, as reported.
    pub revision: u32,
    /// Board version nibble (1 or 4 for supported boards).
    pub version: u8,
    pub rad_hard: bool,
    pub sensor_id: u8,
    pub rs422: bool,
    pub gige: bool,
    /// The identification fields are consistent with a supported board.
    pub valid: bool,
}

impl BoardInfo {
    /// Older firmware reports this value; it is accepted as valid.
    pub const LEGACY: u32 = 0x8000_0001;

    pub fn new(raw: u32, revision: u32) -> Self {
        let nibble = |index: u32| ((raw >> (28 - 4 * index)) & 0xf) as u8;
        let version = nibble(1);
        let sensor_id = nibble(7);
        let llnl = nibble(0) & 0x8 != 0;
        let valid = raw == Self::LEGACY
            || (llnl && matches!(version, 1 | 4) && matches!(sensor_id, 1 | 2));
        Self {
            raw,
            revision,
            version,
            rad_hard: nibble(6) & 1 != 0,
            sensor_id,
            rs422: nibble(5) & 1 != 0,
            gige: nibble(5) & 2 != 0,
            valid,
        }
    }
}

impl std::fmt::Display for BoardInfo {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "FPGA {:08x} rev {:08x} (board v{}, sensor {}, rad-hard {}, RS422 {}, GigE {})",
            self.raw,
            self.revision,
            self.version,
            self.sensor_id,
            self.rad_hard,
            self.rs422,
            self.gige
        )
    }
}

/// Declares one module per device kind and generates the closed `Type` enum
/// over them: names, parsing, properties and a dispatching method per listed
/// trait function.
macro_rules! register {
    (
        $kind:literal,
        $trait:ident,
        $properties:ty,
        $modules:tt,
        {
            $(
                $(#[$meta:meta])*
                fn $method:ident($($argument:ident: $argument_type:ty),*) -> $output:ty;
            )*
        }
    ) => {
        $crate::device::register!(@kinds $kind, $trait, $properties, $modules);

        impl Type {
            $(
                $crate::device::register!(
                    @dispatch $trait,
                    $modules,
                    $(#[$meta])*
                    $method($($argument: $argument_type),*) ($($argument),*) -> $output
                );
            )*
        }
    };

    (@kinds $kind:literal, $trait:ident, $properties:ty, [$($module:ident),+]) => {
        paste::paste! {
            $(
                pub mod $module;
            )+

            #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
            pub enum Type {
                $(
                    #[serde(rename = "" $module)]
                    [<$module:camel>],
                )+
            }

            impl std::fmt::Display for Type {
                fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    match self {
                        $(
                            Self::[<$module:camel>] => write!(formatter, stringify!($module)),
                        )+
                    }
                }
            }

            impl Type {
                pub const ALL: &'static [Type] = &[$(Type::[<$module:camel>],)+];

                pub fn name(self) -> &'static str {
                    self.properties().name
                }

                pub fn properties(self) -> &'static $properties {
                    match self {
                        $(
                            Type::[<$module:camel>] => &$module::$trait::PROPERTIES,
                        )+
                    }
                }
            }

            #[derive(Debug, PartialEq, Eq)]
            pub struct ParseTypeError {
                on: String
            }

            impl std::fmt::Display for ParseTypeError {
                fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                    write!(formatter, concat!("unknown ", $kind, " type \"{}\""), self.on)
                }
            }

            impl std::error::Error for ParseTypeError {}

            impl std::str::FromStr for Type {
                type Err = ParseTypeError;

                fn from_str(string: &str) -> Result<Self, Self::Err> {
                    match string {
                        $(
                            stringify!($module) => Ok(Self::[<$module:camel>]),
                        )+
                        _ => Err(Self::Err {on: string.to_owned()}),
                    }
                }
            }
        }
    };

    (
        @dispatch $trait:ident,
        [$($module:ident),+],
        $(#[$meta:meta])*
        $method:ident($($argument:ident: $argument_type:ty),*) $call:tt -> $output:ty
    ) => {
        paste::paste! {
            $(#[$meta])*
            pub fn $method(self, $($argument: $argument_type),*) -> $output {
                match self {
                    $(
                        Type::[<$module:camel>] => $module::$trait::$method $call,
                    )+
                }
            }
        }
    };
}

pub(crate) use register;
