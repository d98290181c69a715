//! Energy measurement around the timed block

/// Source of energy readings (e.g. an RAPL counter or an emissions tracker).
pub trait EnergyMeter {
    /// Begin a measurement.
    fn start(&mut self);

    /// End the measurement and return the energy used since `start`.
    fn stop(&mut self) -> f64;
}

/// Measurement open for the lifetime of the guard.
///
/// The meter is always stopped: explicitly by [`EnergyScope::finish`] or on
/// drop when the timed block exits early.
pub struct EnergyScope<'a> {
    meter: &'a mut dyn EnergyMeter,
    open: bool,
}

impl<'a> EnergyScope<'a> {
    /// Start `meter` and hold it until finished or dropped.
    pub fn start(meter: &'a mut dyn EnergyMeter) -> Self {
        meter.start();
        Self { meter, open: true }
    }

    /// Stop the meter and return the reading.
    pub fn finish(mut self) -> f64 {
        self.open = false;
        self.meter.stop()
    }
}

impl Drop for EnergyScope<'_> {
    fn drop(&mut self) {
        if self.open {
            self.meter.stop();
        }
    }
}

/// Meter reporting a fixed amount per measurement.
#[derive(Debug, Clone, Default)]
pub struct FixedEnergyMeter {
    per_measurement: f64,
    running: bool,
    measurements: usize,
}

impl FixedEnergyMeter {
    /// Meter that reports `per_measurement` each time it is stopped.
    #[must_use]
    pub const fn new(per_measurement: f64) -> Self {
        Self {
            per_measurement,
            running: false,
            measurements: 0,
        }
    }

    /// Number of completed measurements.
    #[must_use]
    pub const fn measurements(&self) -> usize {
        self.measurements
    }

    /// Whether a measurement is open.
    #[must_use]
    pub const fn running(&self) -> bool {
        self.running
    }
}

impl EnergyMeter for FixedEnergyMeter {
    fn start(&mut self) {
        self.running = true;
    }

    fn stop(&mut self) -> f64 {
        if !self.running {
            return 0.0;
        }
        self.running = false;
        self.measurements += 1;
        self.per_measurement
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_finish_reports_reading() {
        let mut meter = FixedEnergyMeter::new(2.5);
        let scope = EnergyScope::start(&mut meter);
        assert!((scope.finish() - 2.5).abs() < f64::EPSILON);
        assert_eq!(meter.measurements(), 1);
        assert!(!meter.running());
    }

    #[test]
    fn test_scope_stops_meter_on_drop() {
        let mut meter = FixedEnergyMeter::new(1.0);
        {
            let _scope = EnergyScope::start(&mut meter);
        }
        assert!(!meter.running());
        assert_eq!(meter.measurements(), 1);
    }
}
