use crate::device;
use crate::properties;
use crate::registers;
use crate::timing;
use crate::types;

/// Icarus model 1. Only frames 1 and 2 are readable.
pub struct Sensor;

const V1_SUBREGISTERS: &[registers::Entry] = registers::subregisters! {
    "STAT_W3TOPAEDGE1" => "STAT_REG" [3; 1] ro,
    "STAT_W3TOPBEDGE1" => "STAT_REG" [4; 1] ro,
    "READOFF_DELAY_EN" => "TRIGGER_CTL" [4; 1] rw,
    "VRESET_HIGH" => "VRESET_HIGH_VALUE" [7; 8] rw,
};

const V4_SUBREGISTERS: &[registers::Entry] = registers::subregisters! {
    "STAT_W3TOPAEDGE1" => "STAT_REG" [3; 1] ro,
    "STAT_W3TOPBEDGE1" => "STAT_REG" [4; 1] ro,
    "READOFF_DELAY_EN" => "TRIGGER_CTL" [4; 1] rw,
    "VRESET_HIGH" => "VRESET_HIGH_VALUE" [15; 16] rw,
};

impl device::Sensor for Sensor {
    const PROPERTIES: properties::Sensor = properties::Sensor {
        name: "Icarus",
        family: timing::Family::Icarus,
        timing: timing::Model::Icarus,
        fpga_id: 1,
        frames: types::Region { first: 1, last: 2 },
        width: 512,
        height: 1024,
        bytes_per_pixel: 2,
    };

    const DETECT: &'static str = "ICARUS_DET";

    const REGISTERS: &'static [(&'static str, u16)] = super::ICARUS_REGISTERS;

    const SUBREGISTERS: &'static [registers::Entry] = super::ICARUS_SUBREGISTERS;

    fn board_specific(
        board: &properties::Board,
    ) -> (&'static [(&'static str, u16)], &'static [registers::Entry]) {
        if board.version == 1 {
            (&[("VRESET_HIGH_VALUE", 0x04a)], V1_SUBREGISTERS)
        } else {
            (
                &[
                    ("VRESET_HIGH_VALUE", 0x04a),
                    ("DELAY_ASSERTION_ROWDCD_EN", 0x04f),
                ],
                V4_SUBREGISTERS,
            )
        }
    }

    fn init_messages(board: &properties::Board) -> Vec<registers::Message> {
        let mut messages = vec![registers::Message::new("ICARUS_VER_SEL", 1)];
        messages.extend(super::selection_messages(
            Self::PROPERTIES.frames,
            Self::PROPERTIES.rows(),
        ));
        messages.push(registers::Message::new("VRESET_WAIT_TIME", 0x927c0));
        messages.extend(device::default_timing_messages());
        // 3.3 V on the 8-bit pot of v1 boards (full scale is 3.96 V)
        messages.push(registers::Message::new(
            "VRESET_HIGH_VALUE",
            if board.version == 1 { 0xd5 } else { 0xffff },
        ));
        messages
    }

    fn oscillator_code(oscillator: device::Oscillator) -> Option<u32> {
        super::icarus_oscillator_code(oscillator)
    }
}
