use crate::clock;
use crate::log;

/// Normalized settings used to estimate the transfer function, in the order applied.
pub const SAMPLE_SETTINGS: [f64; 2] = [0.65, 0.35];

/// Consecutive stalled iterations tolerated before giving up.
pub const STALL_LIMIT: usize = 12;

/// Closed-loop tuning parameters shared by every pot of a session.
#[derive(Debug, Copy, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Tuning {
    pub enabled: bool,
    /// Acceptable error, in volts.
    pub tolerance: f64,
    pub max_iterations: usize,
    /// Fraction of the estimated correction applied per iteration (above 1 overshoots).
    pub approach_gain: f64,
    pub settle: std::time::Duration,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            enabled: false,
            tolerance: 0.01,
            max_iterations: 20,
            approach_gain: 0.75,
            settle: std::time::Duration::from_millis(200),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub subregister: String,
    /// Volts.
    pub target: f64,
    pub tolerance: f64,
    pub max_iterations: usize,
    pub approach_gain: f64,
    pub max_digital_value: u32,
}

impl Target {
    pub fn new(subregister: &str, target: f64, max_digital_value: u32, tuning: &Tuning) -> Self {
        Self {
            subregister: subregister.to_owned(),
            target,
            tolerance: tuning.tolerance,
            max_iterations: tuning.max_iterations,
            approach_gain: tuning.approach_gain,
            max_digital_value,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Outcome {
    /// Normalized setting left on the hardware.
    pub setting: f64,
    pub measured: f64,
    pub iterations: usize,
    /// The loop stopped because the error no longer changed, not because it converged.
    pub slow: bool,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("{subregister} monitor does not respond ({reason})")]
    Unresponsive { subregister: String, reason: String },

    #[error("{subregister} tuning failed: {reason}")]
    Access { subregister: String, reason: String },

    #[error("{subregister} reached {measured} V instead of {target} V (setting {setting})")]
    ToleranceNotMet {
        subregister: String,
        target: f64,
        measured: f64,
        setting: f64,
    },
}

/// Drives a pot until its monitor reads a target voltage.
pub struct Tuner<Time: clock::Clock> {
    clock: Time,
    settle: std::time::Duration,
    span: tracing::Span,
}

impl<Time: clock::Clock> Tuner<Time> {
    pub fn new(clock: Time, settle: std::time::Duration, context: &log::Context) -> Self {
        Self {
            clock,
            settle,
            span: context.span("tuner"),
        }
    }

    /// `set` applies a normalized setting in [0, 1]; `read` returns the monitor voltage.
    ///
    /// On `ToleranceNotMet` the best setting seen is left applied. On `Unresponsive`
    /// the last sample setting is, and the caller is expected to fall back to the calibration.
    pub fn tune<Set, Read, SetError, ReadError>(
        &self,
        mut set: Set,
        mut read: Read,
        target: &Target,
    ) -> Result<Outcome, Error>
    where
        Set: FnMut(f64) -> Result<(), SetError>,
        Read: FnMut() -> Result<f64, ReadError>,
        SetError: std::fmt::Display,
        ReadError: std::fmt::Display,
    {
        let _entered = self.span.enter();
        let subregister = target.subregister.as_str();
        let unresponsive = |reason: String| Error::Unresponsive {
            subregister: subregister.to_owned(),
            reason,
        };
        let access = |reason: String| Error::Access {
            subregister: subregister.to_owned(),
            reason,
        };

        let mut sample = |setting: f64| -> Result<f64, String> {
            set(setting).map_err(|error| error.to_string())?;
            self.clock.sleep(self.settle);
            read().map_err(|error| error.to_string())
        };
        let high = sample(SAMPLE_SETTINGS[0]).map_err(unresponsive)?;
        let low = sample(SAMPLE_SETTINGS[1]).map_err(unresponsive)?;
        let slope = (high - low) / (SAMPLE_SETTINGS[0] - SAMPLE_SETTINGS[1]);
        if !slope.is_finite() || slope.abs() < 1.0 {
            tracing::warn!(subregister, low, high, "monitor shows no response to the pot");
            return Err(unresponsive(format!("slope {slope} V")));
        }
        let step = (slope / (f64::from(target.max_digital_value) + 1.0)).abs();
        let intercept = SAMPLE_SETTINGS[1] - low / slope;
        tracing::debug!(subregister, slope, step, intercept, "transfer function");

        let mut setting = (intercept + target.target / slope).clamp(0.0, 1.0);
        let mut apply = |setting: f64| -> Result<(), Error> {
            set(setting).map_err(|error| access(error.to_string()))?;
            self.clock.sleep(self.settle);
            Ok(())
        };
        apply(setting)?;

        let mut best = (setting, f64::INFINITY);
        let mut last_difference = 0.0;
        let mut stalled = 0;
        for iteration in 1..=target.max_iterations {
            let measured = read().map_err(|error| access(error.to_string()))?;
            let difference = target.target - measured;
            if difference.abs() < (target.target - best.1).abs() {
                best = (setting, measured);
            }
            if difference.abs() < step / 2.0 {
                tracing::debug!(subregister, iteration, setting, measured, "converged");
                return Ok(Outcome {
                    setting,
                    measured,
                    iterations: iteration,
                    slow: false,
                });
            }
            if (difference - last_difference).abs() < step / 2.0 {
                stalled += 1;
                if stalled > STALL_LIMIT {
                    tracing::warn!(
                        subregister,
                        target = target.target,
                        measured,
                        setting,
                        "tuning converged too slowly"
                    );
                    return Ok(Outcome {
                        setting,
                        measured,
                        iterations: iteration,
                        slow: true,
                    });
                }
            } else {
                stalled = 0;
            }
            setting = (setting + target.approach_gain * difference / slope).clamp(0.0, 1.0);
            apply(setting)?;
            last_difference = difference;
        }

        let measured = read().map_err(|error| access(error.to_string()))?;
        let difference = target.target - measured;
        if difference.abs() < (target.target - best.1).abs() {
            best = (setting, measured);
        }
        if difference.abs() >= target.tolerance.max(step) {
            if best.0 != setting {
                apply(best.0)?;
            }
            tracing::warn!(
                subregister,
                target = target.target,
                measured = best.1,
                setting = best.0,
                "tolerance not met"
            );
            return Err(Error::ToleranceNotMet {
                subregister: subregister.to_owned(),
                target: target.target,
                measured: best.1,
                setting: best.0,
            });
        }
        Ok(Outcome {
            setting,
            measured,
            iterations: target.max_iterations,
            slow: false,
        })
    }
}
