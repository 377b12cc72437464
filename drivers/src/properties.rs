use crate::timing;
use crate::types;

/// How a board's pots are latched and its monitor ADC is scaled.
#[derive(Debug, Copy, Clone, PartialEq, serde::Serialize)]
pub struct Analog {
    /// Register written after a pot change (`index * 2 + 1`).
    pub latch_register: &'static str,
    pub reference_voltage: f64,
    pub monitor_multiplier: f64,
    /// The monitor ADC returns two's-complement readings.
    pub bipolar: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, serde::Serialize)]
pub struct PotRange {
    pub name: &'static str,
    pub min_volt: f64,
    pub max_volt: f64,
}

#[derive(Debug, Copy, Clone, serde::Serialize)]
pub struct Board {
    pub name: &'static str,
    /// Second nibble of `FPGA_NUM`.
    pub version: u8,
    pub analog: Analog,
    pub default_baud_rate: u32,
    pub pot_ranges: &'static [PotRange],
}

#[derive(Debug, Copy, Clone, serde::Serialize)]
pub struct Sensor {
    pub name: &'static str,
    pub family: timing::Family,
    pub timing: timing::Model,
    /// Value reported in the last nibble of `FPGA_NUM`.
    pub fpga_id: u8,
    /// Selectable frames.
    pub frames: types::Region,
    pub width: u32,
    pub height: u32,
    pub bytes_per_pixel: u32,
}

impl Sensor {
    pub fn rows(&self) -> types::Region {
        types::Region {
            first: 0,
            last: self.height - 1,
        }
    }

    pub fn default_geometry(&self) -> types::FrameGeometry {
        types::FrameGeometry {
            frames: self.frames.len(),
            rows: self.height,
            columns: self.width,
            bytes_per_pixel: self.bytes_per_pixel,
        }
    }
}
