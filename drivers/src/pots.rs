use crate::properties;
use crate::registers;

/// Value written to the board's latch register after changing `pot`
/// (`POT1` to `POT13` or `DACA` to `DACH`), `None` if `pot` is not a pot.
pub fn latch_value(pot: &str) -> Option<u32> {
    let pot = pot.to_ascii_uppercase();
    let index = if let Some(number) = pot.strip_prefix("POT") {
        number.parse::<u32>().ok().filter(|number| *number > 0)?
    } else if let Some(letter) = pot.strip_prefix("DAC") {
        match letter.as_bytes() {
            [letter @ b'A'..=b'Z'] => u32::from(letter - b'A'),
            _ => return None,
        }
    } else {
        return None;
    };
    Some(index * 2 + 1)
}

/// Converts a normalized monitor reading to volts.
pub fn monitor_volts(normalized: f64, analog: &properties::Analog) -> f64 {
    if analog.bipolar {
        let normalized = if normalized >= 0.5 {
            normalized - 1.0
        } else {
            normalized
        };
        2.0 * analog.monitor_multiplier * normalized * analog.reference_voltage
    } else {
        analog.monitor_multiplier * normalized * analog.reference_voltage
    }
}

/// Attaches voltage ranges to the pots they name.
pub fn calibrate(
    map: &mut registers::RegisterMap,
    ranges: &[properties::PotRange],
) -> Result<(), registers::Error> {
    for range in ranges {
        let subregister = map.subregister_mut(range.name)?;
        subregister.calibration = Some(registers::Calibration::new(
            range.min_volt,
            range.max_volt,
            subregister.max_value(),
        ));
    }
    Ok(())
}

impl<Device: registers::Bus> registers::Registers<Device> {
    /// Reads a pot or monitor on a 0 to 1 scale.
    pub fn get_pot(&mut self, name: &str) -> Result<f64, registers::Error> {
        let max_value = self.map().subregister(name)?.max_value();
        let value = self.get_subregister(name)?;
        Ok(f64::from(value) / f64::from(max_value))
    }

    /// Sets a pot on a 0 to 1 scale (clamped) and latches it.
    pub fn set_pot(
        &mut self,
        name: &str,
        value: f64,
        analog: &properties::Analog,
    ) -> Result<(), registers::Error> {
        let subregister = self.map().subregister(name)?;
        let pot = subregister.name().to_owned();
        let latch = latch_value(&pot).ok_or_else(|| registers::Error::NotAPot(name.to_owned()))?;
        let setpoint = (value.clamp(0.0, 1.0) * f64::from(subregister.max_value())).round() as u32;
        self.set_subregister(&pot, setpoint)?;
        self.set_register(analog.latch_register, latch)
    }

    /// Voltage the pot is set to (not the measured output).
    pub fn get_pot_voltage(&mut self, name: &str) -> Result<f64, registers::Error> {
        let calibration = self
            .map()
            .subregister(name)?
            .calibration
            .clone()
            .ok_or_else(|| registers::Error::Uncalibrated(name.to_owned()))?;
        let normalized = self.get_pot(name)?;
        Ok(calibration.min_volt + normalized * (calibration.max_volt - calibration.min_volt))
    }

    /// Sets a pot from its calibration without reading the monitor back.
    /// Returns the normalized setting applied.
    pub fn set_pot_voltage(
        &mut self,
        name: &str,
        volts: f64,
        analog: &properties::Analog,
    ) -> Result<f64, registers::Error> {
        let calibration = self
            .map()
            .subregister(name)?
            .calibration
            .clone()
            .ok_or_else(|| registers::Error::Uncalibrated(name.to_owned()))?;
        let volts = volts.clamp(calibration.min_volt, calibration.max_volt);
        let setting =
            (volts - calibration.min_volt) / (calibration.max_volt - calibration.min_volt);
        self.set_pot(name, setting, analog)?;
        Ok(setting)
    }

    /// Reads the monitor named `name`, or the monitor of the pot named `name`.
    pub fn monitor_voltage(
        &mut self,
        name: &str,
        analog: &properties::Analog,
    ) -> Result<f64, registers::Error> {
        let monitor = match self.map().monitor_for(name) {
            Some(monitor) => monitor,
            None if self.map().contains_subregister(name) => self.map().resolve(name),
            None => return Err(registers::Error::NoMonitor(name.to_owned())),
        };
        Ok(monitor_volts(self.get_pot(&monitor)?, analog))
    }
}
