use crate::device;
use crate::properties;
use crate::registers;
use crate::timing;
use crate::types;

pub struct Sensor;

const EDGE_SUBREGISTERS: &[registers::Entry] = registers::subregisters! {
    "STAT_W3TOPLEDGE1" => "STAT_REG" [3; 1] ro,
    "STAT_W3TOPREDGE1" => "STAT_REG" [4; 1] ro,
};

impl device::Sensor for Sensor {
    const PROPERTIES: properties::Sensor = properties::Sensor {
        name: "Icarus2",
        family: timing::Family::Icarus,
        timing: timing::Model::Icarus2,
        fpga_id: 1,
        frames: types::Region { first: 0, last: 3 },
        width: 512,
        height: 1024,
        bytes_per_pixel: 2,
    };

    const DETECT: &'static str = "ICARUS_DET";

    const REGISTERS: &'static [(&'static str, u16)] = super::ICARUS_REGISTERS;

    const SUBREGISTERS: &'static [registers::Entry] = super::ICARUS_SUBREGISTERS;

    fn board_specific(
        _board: &properties::Board,
    ) -> (&'static [(&'static str, u16)], &'static [registers::Entry]) {
        (&[], EDGE_SUBREGISTERS)
    }

    fn init_messages(_board: &properties::Board) -> Vec<registers::Message> {
        let mut messages = vec![registers::Message::new("ICARUS_VER_SEL", 0)];
        messages.extend(super::selection_messages(
            Self::PROPERTIES.frames,
            Self::PROPERTIES.rows(),
        ));
        messages.extend(device::default_timing_messages());
        messages
    }

    fn oscillator_code(oscillator: device::Oscillator) -> Option<u32> {
        super::icarus_oscillator_code(oscillator)
    }
}
