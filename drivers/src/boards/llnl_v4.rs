use crate::device;
use crate::properties;
use crate::registers;
use crate::timing;

pub struct Board;

const DAC_RANGES: [properties::PotRange; 8] = {
    const fn dac(name: &'static str) -> properties::PotRange {
        properties::PotRange {
            name,
            min_volt: 0.0,
            max_volt: 5.0,
        }
    }
    [
        dac("DACA"),
        dac("DACB"),
        dac("DACC"),
        dac("DACD"),
        dac("DACE"),
        dac("DACF"),
        dac("DACG"),
        dac("DACH"),
    ]
};

impl device::Board for Board {
    const PROPERTIES: properties::Board = properties::Board {
        name: "LLNL v4",
        version: 4,
        analog: properties::Analog {
            latch_register: "DAC_CTL",
            reference_voltage: 3.3,
            monitor_multiplier: 1.0,
            bipolar: false,
        },
        default_baud_rate: 921600,
        pot_ranges: &DAC_RANGES,
    };

    const REGISTERS: &'static [(&'static str, u16)] = &[
        ("FPGA_NUM", 0x000),
        ("FPGA_REV", 0x001),
        ("HS_TIMING_CTL", 0x010),
        ("HS_TIMING_DATA_ALO", 0x013),
        ("HS_TIMING_DATA_AHI", 0x014),
        ("HS_TIMING_DATA_BLO", 0x015),
        ("HS_TIMING_DATA_BHI", 0x016),
        ("SW_TRIGGER_CONTROL", 0x017),
        ("SW_COARSE_CONTROL", 0x01c),
        ("STAT_REG", 0x024),
        ("CTRL_REG", 0x025),
        ("DAC_CTL", 0x026),
        ("DAC_REG_A_AND_B", 0x027),
        ("DAC_REG_C_AND_D", 0x028),
        ("DAC_REG_E_AND_F", 0x029),
        ("DAC_REG_G_AND_H", 0x02a),
        ("SW_RESET", 0x02d),
        ("HST_SETTINGS", 0x02e),
        ("STAT_REG_SRC", 0x02f),
        ("STAT_REG2", 0x030),
        ("STAT_REG2_SRC", 0x031),
        ("ADC_BYTECOUNTER", 0x032),
        ("RBP_PIXEL_CNTR", 0x033),
        ("DIAG_MAX_CNT_0", 0x034),
        ("DIAG_MAX_CNT_1", 0x035),
        ("DIAG_CNTR_VAL_0", 0x036),
        ("DIAG_CNTR_VAL_1", 0x037),
        ("STAT_EDGE_DETECTS", 0x038),
        ("TRIGGER_CTL", 0x03a),
        ("SRAM_CTL", 0x03b),
        ("TIMER_CTL", 0x03c),
        ("TIMER_VALUE", 0x03d),
        ("HSTALLWEN_WAIT_TIME", 0x03f),
        ("FPA_ROW_INITIAL", 0x042),
        ("FPA_ROW_FINAL", 0x043),
        ("FPA_FRAME_INITIAL", 0x044),
        ("FPA_FRAME_FINAL", 0x045),
        ("FPA_DIVCLK_EN_ADDR", 0x046),
        ("FPA_OSCILLATOR_SEL_ADDR", 0x047),
        ("ADC_CTL", 0x090),
        ("ADC1_CONFIG_DATA", 0x091),
        ("ADC2_CONFIG_DATA", 0x092),
        ("ADC3_CONFIG_DATA", 0x093),
        ("ADC4_CONFIG_DATA", 0x094),
        ("ADC5_DATA_1", 0x095),
        ("ADC5_DATA_2", 0x096),
        ("ADC5_DATA_3", 0x097),
        ("ADC5_DATA_4", 0x098),
        ("ADC6_DATA_1", 0x099),
        ("ADC6_DATA_2", 0x09a),
        ("ADC6_DATA_3", 0x09b),
        ("ADC6_DATA_4", 0x09c),
        ("ADC_PPER", 0x09d),
        ("ADC_RESET", 0x09e),
    ];

    const SUBREGISTERS: &'static [registers::Entry] = registers::subregisters! {
        "HST_MODE" => "HS_TIMING_CTL" [0; 1] rw,
        "SW_TRIG_START" => "SW_TRIGGER_CONTROL" [0; 1] rw,
        "SW_COARSE_TRIGGER" => "SW_COARSE_CONTROL" [0; 1] rw,
        "LED_EN" => "CTRL_REG" [1; 1] rw,
        "COLQUENCHEN" => "CTRL_REG" [2; 1] rw,
        "POWERSAVE" => "CTRL_REG" [3; 1] rw,
        "PDBIAS_LOW" => "CTRL_REG" [6; 1] rw,
        "DACA" => "DAC_REG_A_AND_B" [31; 16] rw,
        "DACB" => "DAC_REG_A_AND_B" [15; 16] rw,
        "DACC" => "DAC_REG_C_AND_D" [31; 16] rw,
        "DACD" => "DAC_REG_C_AND_D" [15; 16] rw,
        "DACE" => "DAC_REG_E_AND_F" [31; 16] rw,
        "DACF" => "DAC_REG_E_AND_F" [15; 16] rw,
        "DACG" => "DAC_REG_G_AND_H" [31; 16] rw,
        "DACH" => "DAC_REG_G_AND_H" [15; 16] rw,
        "RESET" => "SW_RESET" [0; 1] rw,
        "HST_SW_CTL_EN" => "HST_SETTINGS" [0; 1] rw,
        "SW_HSTALLWEN" => "HST_SETTINGS" [1; 1] rw,
        "MAXERR_FIT" => "DIAG_MAX_CNT_0" [31; 16] rw,
        "MAXERR_SRT" => "DIAG_MAX_CNT_0" [7; 8] rw,
        "MAXERR_UTTR" => "DIAG_MAX_CNT_1" [31; 16] rw,
        "MAXERR_URTR" => "DIAG_MAX_CNT_1" [15; 16] rw,
        "HW_TRIG_EN" => "TRIGGER_CTL" [0; 1] rw,
        "DUAL_EDGE_TRIG_EN" => "TRIGGER_CTL" [1; 1] rw,
        "SW_TRIG_EN" => "TRIGGER_CTL" [2; 1] rw,
        "READ_SRAM" => "SRAM_CTL" [0; 1] rw,
        "RESET_TIMER" => "TIMER_CTL" [0; 1] rw,
        "OSC_SELECT" => "FPA_OSCILLATOR_SEL_ADDR" [1; 2] rw,
        "PPER" => "ADC_PPER" [7; 8] rw,
        "SRAM_READY" => "STAT_REG" [0; 1] ro,
        "STAT_COARSE" => "STAT_REG" [1; 1] ro,
        "STAT_FINE" => "STAT_REG" [2; 1] ro,
        "STAT_SENSREADIP" => "STAT_REG" [5; 1] ro,
        "STAT_SENSREADDONE" => "STAT_REG" [6; 1] ro,
        "STAT_SRAMREADSTART" => "STAT_REG" [7; 1] ro,
        "STAT_SRAMREADDONE" => "STAT_REG" [8; 1] ro,
        "STAT_HSTCONFIGURED" => "STAT_REG" [9; 1] ro,
        "STAT_ADCSCONFIGURED" => "STAT_REG" [10; 1] ro,
        "STAT_DACSCONFIGURED" => "STAT_REG" [11; 1] ro,
        "STAT_TIMERCOUNTERRESET" => "STAT_REG" [13; 1] ro,
        "STAT_ARMED" => "STAT_REG" [14; 1] ro,
        "STAT_TEMP" => "STAT_REG" [23; 7] ro,
        "STAT_PRESS" => "STAT_REG" [31; 8] ro,
        "FPA_IF_TO" => "STAT_REG2" [0; 1] ro,
        "SRAM_RO_TO" => "STAT_REG2" [1; 1] ro,
        "PIXELRD_TOUT_ERR" => "STAT_REG2" [2; 1] ro,
        "UART_TX_TO_RST" => "STAT_REG2" [3; 1] ro,
        "UART_RX_TO_RST" => "STAT_REG2" [4; 1] ro,
        "FIT_COUNT" => "DIAG_CNTR_VAL_0" [31; 16] ro,
        "SRT_COUNT" => "DIAG_CNTR_VAL_0" [7; 8] ro,
        "UTTR_COUNT" => "DIAG_CNTR_VAL_1" [31; 16] ro,
        "URTR_COUNT" => "DIAG_CNTR_VAL_1" [15; 16] ro,
        "MON_CH1" => "ADC5_DATA_1" [11; 12] ro,
        "MON_CH2" => "ADC5_DATA_1" [23; 12] ro,
        "MON_CH3" => "ADC5_DATA_2" [11; 12] ro,
        "MON_CH4" => "ADC5_DATA_2" [23; 12] ro,
        "MON_CH5" => "ADC5_DATA_3" [11; 12] ro,
        "MON_CH6" => "ADC5_DATA_3" [23; 12] ro,
        "MON_CH7" => "ADC5_DATA_4" [11; 12] ro,
        "MON_CH8" => "ADC5_DATA_4" [23; 12] ro,
        "MON_CH9" => "ADC6_DATA_1" [11; 12] ro,
        "MON_CH10" => "ADC6_DATA_1" [23; 12] ro,
        "MON_CH11" => "ADC6_DATA_2" [11; 12] ro,
        "MON_CH12" => "ADC6_DATA_2" [23; 12] ro,
        "MON_CH13" => "ADC6_DATA_3" [11; 12] ro,
        "MON_CH14" => "ADC6_DATA_3" [23; 12] ro,
        "MON_CH15" => "ADC6_DATA_4" [11; 12] ro,
        "MON_CH16" => "ADC6_DATA_4" [23; 12] ro,
    };

    fn aliases(family: timing::Family) -> &'static [(&'static str, &'static str)] {
        match family {
            timing::Family::Icarus => &[
                ("HST_A_PDELAY", "DACA"),
                ("HST_A_NDELAY", "DACB"),
                ("HST_B_PDELAY", "DACC"),
                ("HST_B_NDELAY", "DACD"),
                ("HST_RO_IBIAS", "DACE"),
                ("HST_RO_NC_IBIAS", "DACE"),
                ("HST_OSC_CTL", "DACF"),
                ("VAB", "DACG"),
                ("VRST", "DACH"),
                ("MON_PRES_MINUS", "MON_CH1"),
                ("MON_PRES_PLUS", "MON_CH2"),
                ("MON_TEMP", "MON_CH3"),
                ("MON_COL_TOP_IBIAS_IN", "MON_CH4"),
                ("MON_HST_OSC_R_BIAS", "MON_CH5"),
                ("MON_VAB", "MON_CH6"),
                ("MON_HST_RO_IBIAS", "MON_CH7"),
                ("MON_HST_RO_NC_IBIAS", "MON_CH7"),
                ("MON_VRST", "MON_CH8"),
                ("MON_COL_BOT_IBIAS_IN", "MON_CH9"),
                ("MON_HST_A_PDELAY", "MON_CH10"),
                ("MON_HST_B_NDELAY", "MON_CH11"),
                ("DOSIMETER", "MON_CH12"),
                ("MON_HST_OSC_VREF_IN", "MON_CH13"),
                ("MON_HST_B_PDELAY", "MON_CH14"),
                ("MON_HST_OSC_CTL", "MON_CH15"),
                ("MON_HST_A_NDELAY", "MON_CH16"),
                ("MON_CHA", "MON_CH10"),
                ("MON_CHB", "MON_CH16"),
                ("MON_CHC", "MON_CH14"),
                ("MON_CHD", "MON_CH11"),
                ("MON_CHE", "MON_CH7"),
                ("MON_CHF", "MON_CH15"),
                ("MON_CHG", "MON_CH6"),
                ("MON_CHH", "MON_CH8"),
            ],
            timing::Family::Daedalus => &[
                ("HST_OSC_VREF_IN", "DACC"),
                ("HST_OSC_CTL", "DACE"),
                ("COL_TST_IN", "DACF"),
                ("VAB", "DACG"),
                ("MON_PRES_MINUS", "MON_CH1"),
                ("MON_PRES_PLUS", "MON_CH2"),
                ("MON_TEMP", "MON_CH3"),
                ("MON_VAB", "MON_CH6"),
                ("MON_HST_OSC_CTL", "MON_CH7"),
                ("MON_TSENSE_OUT", "MON_CH10"),
                ("MON_BGREF", "MON_CH11"),
                ("DOSIMETER", "MON_CH12"),
                ("MON_HST_RO_NC_IBIAS", "MON_CH13"),
                ("MON_HST_OSC_VREF_IN", "MON_CH14"),
                ("MON_COL_TST_IN", "MON_CH15"),
                ("MON_HST_OSC_PBIAS_PAD", "MON_CH16"),
                ("MON_CHC", "MON_CH14"),
                ("MON_CHE", "MON_CH7"),
                ("MON_CHF", "MON_CH15"),
                ("MON_CHG", "MON_CH6"),
            ],
        }
    }

    fn monitors(family: timing::Family) -> &'static [(&'static str, &'static str)] {
        match family {
            timing::Family::Icarus => &[
                ("MON_CH10", "DACA"),
                ("MON_CH16", "DACB"),
                ("MON_CH14", "DACC"),
                ("MON_CH11", "DACD"),
                ("MON_CH7", "DACE"),
                ("MON_CH15", "DACF"),
                ("MON_CH6", "DACG"),
                ("MON_CH8", "DACH"),
            ],
            timing::Family::Daedalus => &[
                ("MON_CH14", "DACC"),
                ("MON_CH7", "DACE"),
                ("MON_CH15", "DACF"),
                ("MON_CH6", "DACG"),
            ],
        }
    }

    fn init_messages() -> Vec<registers::Message> {
        let mut messages = vec![registers::Message::new("ADC_RESET", 0)];
        for adc in 1..=4 {
            messages.push(registers::Message::new(
                format!("ADC{adc}_CONFIG_DATA"),
                0xffff_ffff,
            ));
        }
        messages.push(registers::Message::new("ADC_CTL", 0xffff_ffff));
        // external 1.25 V reference
        for adc in 1..=4 {
            messages.push(registers::Message::new(
                format!("ADC{adc}_CONFIG_DATA"),
                0x81a8_01ff,
            ));
        }
        messages
    }
}
