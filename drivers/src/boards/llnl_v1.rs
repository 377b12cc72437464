use crate::device;
use crate::properties;
use crate::registers;
use crate::timing;

pub struct Board;

const POT_RANGES: [properties::PotRange; 13] = {
    const fn pot(name: &'static str, max_volt: f64) -> properties::PotRange {
        properties::PotRange {
            name,
            min_volt: 0.0,
            max_volt,
        }
    }
    [
        pot("POT1", 3.3),
        pot("POT2", 3.3),
        pot("POT3", 3.3),
        pot("POT4", 3.3),
        pot("POT5", 3.3),
        pot("POT6", 3.3),
        pot("POT7", 3.3),
        pot("POT8", 3.3),
        pot("POT9", 3.3),
        pot("POT10", 3.3),
        pot("POT11", 3.3),
        pot("POT12", 3.3),
        pot("POT13", 3.96),
    ]
};

impl device::Board for Board {
    const PROPERTIES: properties::Board = properties::Board {
        name: "LLNL v1",
        version: 1,
        analog: properties::Analog {
            latch_register: "POT_CTL",
            reference_voltage: 2.5,
            monitor_multiplier: 2.0,
            bipolar: true,
        },
        default_baud_rate: 921600,
        pot_ranges: &POT_RANGES,
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
        ("STAT_REG", 0x024),
        ("CTRL_REG", 0x025),
        ("POT_CTL", 0x026),
        ("POT_REG4_TO_1", 0x027),
        ("POT_REG8_TO_5", 0x028),
        ("POT_REG12_TO_9", 0x029),
        ("POT_REG13", 0x02a),
        ("LED_GP", 0x02b),
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
        ("FRAME_ORDER_SEL", 0x04b),
        ("SENSOR_VOLT_STAT", 0x082),
        ("SENSOR_VOLT_CTL", 0x083),
        ("ADC_CTL", 0x090),
        ("ADC1_CONFIG_DATA", 0x091),
        ("ADC2_CONFIG_DATA", 0x092),
        ("ADC3_CONFIG_DATA", 0x093),
        ("ADC4_CONFIG_DATA", 0x094),
        ("ADC5_CONFIG_DATA", 0x095),
        ("ADC5_DATA_1", 0x096),
        ("ADC5_DATA_2", 0x097),
        ("ADC5_DATA_3", 0x098),
        ("ADC5_DATA_4", 0x099),
        ("ADC5_PPER", 0x09a),
        // ADC_STANDBY on boards up to revision AD
        ("ADC_RESET", 0x09b),
        ("TEMP_SENSE_PPER", 0x0a0),
        ("TEMP_SENSE_DATA", 0x0a1),
    ];

    const SUBREGISTERS: &'static [registers::Entry] = registers::subregisters! {
        "HST_MODE" => "HS_TIMING_CTL" [0; 1] rw,
        "SW_TRIG_START" => "SW_TRIGGER_CONTROL" [0; 1] rw,
        "LED_EN" => "CTRL_REG" [1; 1] rw,
        "COLQUENCHEN" => "CTRL_REG" [2; 1] rw,
        "POWERSAVE" => "CTRL_REG" [3; 1] rw,
        "POT1" => "POT_REG4_TO_1" [7; 8] rw,
        "POT2" => "POT_REG4_TO_1" [15; 8] rw,
        "POT3" => "POT_REG4_TO_1" [23; 8] rw,
        "POT4" => "POT_REG4_TO_1" [31; 8] rw,
        "POT5" => "POT_REG8_TO_5" [7; 8] rw,
        "POT6" => "POT_REG8_TO_5" [15; 8] rw,
        "POT7" => "POT_REG8_TO_5" [23; 8] rw,
        "POT8" => "POT_REG8_TO_5" [31; 8] rw,
        "POT9" => "POT_REG12_TO_9" [7; 8] rw,
        "POT10" => "POT_REG12_TO_9" [15; 8] rw,
        "POT11" => "POT_REG12_TO_9" [23; 8] rw,
        "POT12" => "POT_REG12_TO_9" [31; 8] rw,
        "POT13" => "POT_REG13" [7; 8] rw,
        "LED1" => "LED_GP" [0; 1] rw,
        "LED2" => "LED_GP" [1; 1] rw,
        "LED3" => "LED_GP" [2; 1] rw,
        "LED4" => "LED_GP" [3; 1] rw,
        "LED5" => "LED_GP" [4; 1] rw,
        "LED6" => "LED_GP" [5; 1] rw,
        "LED7" => "LED_GP" [6; 1] rw,
        "LED8" => "LED_GP" [7; 1] rw,
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
        "ADC5_VREF" => "ADC5_CONFIG_DATA" [9; 10] rw,
        "ADC5_VREF3" => "ADC5_CONFIG_DATA" [13; 1] rw,
        "ADC5_INT" => "ADC5_CONFIG_DATA" [15; 1] rw,
        "ADC5_MULT" => "ADC5_CONFIG_DATA" [24; 6] rw,
        "PPER" => "ADC5_PPER" [7; 8] rw,
        "SRAM_READY" => "STAT_REG" [0; 1] ro,
        "STAT_COARSE" => "STAT_REG" [1; 1] ro,
        "STAT_FINE" => "STAT_REG" [2; 1] ro,
        "STAT_SENSREADIP" => "STAT_REG" [5; 1] ro,
        "STAT_SENSREADDONE" => "STAT_REG" [6; 1] ro,
        "STAT_SRAMREADSTART" => "STAT_REG" [7; 1] ro,
        "STAT_SRAMREADDONE" => "STAT_REG" [8; 1] ro,
        "STAT_HSTCONFIGURED" => "STAT_REG" [9; 1] ro,
        "STAT_ADCSCONFIGURED" => "STAT_REG" [10; 1] ro,
        "STAT_POTSCONFIGURED" => "STAT_REG" [11; 1] ro,
        "STAT_TIMERCOUNTERRESET" => "STAT_REG" [13; 1] ro,
        "STAT_ARMED" => "STAT_REG" [14; 1] ro,
        "STAT_TEMP" => "STAT_REG" [27; 11] ro,
        "STAT_PRESS" => "STAT_REG" [31; 4] ro,
        "FPA_IF_TO" => "STAT_REG2" [0; 1] ro,
        "SRAM_RO_TO" => "STAT_REG2" [1; 1] ro,
        "PIXELRD_TOUT_ERR" => "STAT_REG2" [2; 1] ro,
        "UART_TX_TO_RST" => "STAT_REG2" [3; 1] ro,
        "UART_RX_TO_RST" => "STAT_REG2" [4; 1] ro,
        "SENSOR_POSN" => "SENSOR_VOLT_STAT" [0; 1] ro,
        "SENSOR_NEGP" => "SENSOR_VOLT_STAT" [1; 1] ro,
        "ICARUS_DET" => "SENSOR_VOLT_STAT" [2; 1] ro,
        "DAEDALUS_DET" => "SENSOR_VOLT_STAT" [3; 1] ro,
        "HORUS_DET" => "SENSOR_VOLT_STAT" [4; 1] ro,
        "SENSOR_POWER" => "SENSOR_VOLT_STAT" [5; 1] ro,
        "FIT_COUNT" => "DIAG_CNTR_VAL_0" [31; 16] ro,
        "SRT_COUNT" => "DIAG_CNTR_VAL_0" [7; 8] ro,
        "UTTR_COUNT" => "DIAG_CNTR_VAL_1" [31; 16] ro,
        "URTR_COUNT" => "DIAG_CNTR_VAL_1" [15; 16] ro,
        "MON_CH2" => "ADC5_DATA_1" [15; 16] ro,
        "MON_CH3" => "ADC5_DATA_1" [31; 16] ro,
        "MON_CH4" => "ADC5_DATA_2" [15; 16] ro,
        "MON_CH5" => "ADC5_DATA_2" [31; 16] ro,
        "MON_CH6" => "ADC5_DATA_3" [15; 16] ro,
        "MON_CH7" => "ADC5_DATA_3" [31; 16] ro,
        "MON_CH8" => "ADC5_DATA_4" [15; 16] ro,
        "MON_VRST" => "ADC5_DATA_4" [31; 16] ro,
    };

    fn aliases(family: timing::Family) -> &'static [(&'static str, &'static str)] {
        match family {
            timing::Family::Icarus => &[
                ("COL_BOT_IBIAS_IN", "POT1"),
                ("HST_A_PDELAY", "POT2"),
                ("HST_B_NDELAY", "POT3"),
                ("HST_RO_IBIAS", "POT4"),
                ("HST_OSC_VREF_IN", "POT5"),
                ("HST_B_PDELAY", "POT6"),
                ("HST_OSC_CTL", "POT7"),
                ("HST_A_NDELAY", "POT8"),
                ("COL_TOP_IBIAS_IN", "POT9"),
                ("HST_OSC_R_BIAS", "POT10"),
                ("VAB", "POT11"),
                ("HST_RO_NC_IBIAS", "POT12"),
                ("VRST", "POT13"),
                ("MON_HST_A_PDELAY", "MON_CH2"),
                ("MON_HST_B_NDELAY", "MON_CH3"),
                ("MON_HST_RO_IBIAS", "MON_CH4"),
                ("MON_HST_OSC_VREF_IN", "MON_CH5"),
                ("MON_HST_B_PDELAY", "MON_CH6"),
                ("MON_HST_OSC_CTL", "MON_CH7"),
                ("MON_HST_A_NDELAY", "MON_CH8"),
            ],
            timing::Family::Daedalus => &[
                ("HST_OSC_CTL", "POT4"),
                ("HST_RO_NC_IBIAS", "POT5"),
                ("HST_OSC_VREF_IN", "POT6"),
                ("VAB", "POT11"),
                ("MON_TSENSEOUT", "MON_CH2"),
                ("MON_BGREF", "MON_CH3"),
                ("MON_HST_OSC_CTL", "MON_CH4"),
                ("MON_HST_RO_NC_IBIAS", "MON_CH5"),
                ("MON_HST_OSC_VREF_IN", "MON_CH6"),
                ("MON_COL_TST_IN", "MON_CH7"),
                ("MON_HST_OSC_PBIAS_PAD", "MON_CH8"),
            ],
        }
    }

    fn monitors(family: timing::Family) -> &'static [(&'static str, &'static str)] {
        match family {
            timing::Family::Icarus => &[
                ("MON_CH2", "POT2"),
                ("MON_CH3", "POT3"),
                ("MON_CH4", "POT4"),
                ("MON_CH5", "POT5"),
                ("MON_CH6", "POT6"),
                ("MON_CH7", "POT7"),
                ("MON_CH8", "POT8"),
                // reads about 1 V below the pot output
                ("MON_VRST", "POT13"),
            ],
            timing::Family::Daedalus => &[
                ("MON_CH4", "POT4"),
                ("MON_CH5", "POT5"),
                ("MON_CH6", "POT6"),
                ("MON_VRST", "POT13"),
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
        for adc in 1..=4 {
            messages.push(registers::Message::new(
                format!("ADC{adc}_CONFIG_DATA"),
                0x81a8_01ff,
            ));
        }
        // monitor ADC, internal 2.5 V reference
        messages.push(registers::Message::new("ADC5_CONFIG_DATA", 0x81a8_83ff));
        messages.push(registers::Message::new("LED_EN", 1));
        messages
    }

    fn led_messages(led: u8, on: bool) -> Vec<registers::Message> {
        if (1..=8).contains(&led) {
            vec![registers::Message::new(format!("LED{led}"), u32::from(on))]
        } else {
            Vec::new()
        }
    }
}
