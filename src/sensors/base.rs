use bitfield::bitfield;
use log::*;
use serde::Serialize;

use crate::am2315::INVALID_VALUE;

bitfield! {
    /// Lifecycle status of a sensor, as tracked by the measurement framework.
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct SensorStatus(u8);
    impl Debug;
    pub bool, setup_successful, set_setup_successful: 0;
    pub bool, power_attempted, set_power_attempted: 1;
    pub bool, powered, set_powered: 2;
    pub bool, wake_attempted, set_wake_attempted: 3;
    pub bool, awake, set_awake: 4;
    pub bool, measurement_attempted, set_measurement_attempted: 5;
    pub bool, measurement_started, set_measurement_started: 6;
    pub bool, error, set_error: 7;
}

impl SensorStatus {
    pub fn bits(&self) -> u8 {
        self.0
    }
}

// Everything but the measurement request bits (5 and 6).
const MEASUREMENT_REQUEST_MASK: u8 = 0b1001_1111;

/// Describes one value a sensor reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Variable {
    /// Result slot the value is recorded into.
    pub var_num: usize,
    pub name: &'static str,
    pub unit: &'static str,
    /// Decimal places worth reporting.
    pub resolution: u8,
    pub code: &'static str,
}

/// Averaged outcome of one variable over the current measurement cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VariableResult {
    pub code: &'static str,
    pub unit: &'static str,
    pub value: Option<f32>,
    pub samples: u8,
}

/// Per-sensor state owned by the measurement framework.
///
/// Drivers only touch it through `verify_and_add_measurement_result` and
/// `clear_measurement_request`; scheduling (power, warm-up, stabilization)
/// is up to the framework.
#[derive(Debug, Clone)]
pub struct SensorBase {
    name: &'static str,
    variables: &'static [Variable],
    warm_up_time_ms: u32,
    stabilization_time_ms: u32,
    measurement_time_ms: u32,
    power_pin: Option<u8>,
    i2c_address: u8,
    status: SensorStatus,
    measurement_requested_ms: Option<u64>,
    sums: Vec<f32>,
    counts: Vec<u8>,
}

impl SensorBase {
    pub fn new(
        name: &'static str,
        variables: &'static [Variable],
        power_pin: Option<u8>,
        i2c_address: u8,
    ) -> Self {
        Self {
            name,
            variables,
            warm_up_time_ms: 0,
            stabilization_time_ms: 0,
            measurement_time_ms: 0,
            power_pin,
            i2c_address,
            status: SensorStatus(0),
            measurement_requested_ms: None,
            sums: vec![0.0; variables.len()],
            counts: vec![0; variables.len()],
        }
    }

    /// Sets the warm-up, stabilization and measurement times in milliseconds.
    pub fn with_timing(
        mut self,
        warm_up_ms: u32,
        stabilization_ms: u32,
        measurement_ms: u32,
    ) -> Self {
        self.warm_up_time_ms = warm_up_ms;
        self.stabilization_time_ms = stabilization_ms;
        self.measurement_time_ms = measurement_ms;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn variables(&self) -> &'static [Variable] {
        self.variables
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn warm_up_time_ms(&self) -> u32 {
        self.warm_up_time_ms
    }

    pub fn stabilization_time_ms(&self) -> u32 {
        self.stabilization_time_ms
    }

    pub fn measurement_time_ms(&self) -> u32 {
        self.measurement_time_ms
    }

    pub fn power_pin(&self) -> Option<u8> {
        self.power_pin
    }

    pub fn i2c_address(&self) -> u8 {
        self.i2c_address
    }

    pub fn status(&self) -> SensorStatus {
        self.status
    }

    pub fn measurement_requested_ms(&self) -> Option<u64> {
        self.measurement_requested_ms
    }

    /// Records the outcome of a setup attempt.
    pub fn mark_setup(&mut self, success: bool) {
        self.status.set_setup_successful(success);
        self.status.set_error(!success);
    }

    /// Marks a measurement as requested at `now_ms`.
    pub fn start_measurement(&mut self, now_ms: u64) {
        self.status.set_measurement_attempted(true);
        self.status.set_measurement_started(true);
        self.measurement_requested_ms = Some(now_ms);
    }

    /// Hands scheduling back to the framework after a measurement attempt.
    pub fn clear_measurement_request(&mut self) {
        self.measurement_requested_ms = None;
        self.status.0 &= MEASUREMENT_REQUEST_MASK;
    }

    /// Adds `value` to the running result of slot `var_num`.
    ///
    /// NaN, the invalid sentinel and unknown slots are dropped, as is
    /// anything past the 255th sample of a slot.
    pub fn verify_and_add_measurement_result(&mut self, var_num: usize, value: f32) {
        if var_num >= self.variables.len() {
            warn!("{}: no result slot {}", self.name, var_num);
            return;
        }
        if value.is_nan() || value == INVALID_VALUE {
            debug!("{}: dropping invalid value for slot {}", self.name, var_num);
            return;
        }
        if self.counts[var_num] == u8::MAX {
            warn!("{}: slot {} is full, dropping value", self.name, var_num);
            return;
        }
        self.sums[var_num] += value;
        self.counts[var_num] += 1;
    }

    /// Forgets all results recorded so far.
    pub fn clear_values(&mut self) {
        self.sums.iter_mut().for_each(|s| *s = 0.0);
        self.counts.iter_mut().for_each(|c| *c = 0);
    }

    pub fn averaged_values(&self) -> Vec<Option<f32>> {
        self.sums
            .iter()
            .zip(&self.counts)
            .map(|(sum, count)| match count {
                0 => None,
                n => Some(sum / *n as f32),
            })
            .collect()
    }

    pub fn results(&self) -> Vec<VariableResult> {
        self.variables
            .iter()
            .zip(self.averaged_values())
            .zip(&self.counts)
            .map(|((variable, value), samples)| VariableResult {
                code: variable.code,
                unit: variable.unit,
                value,
                samples: *samples,
            })
            .collect()
    }
}

/// What the measurement framework needs from a sensor.
pub trait Sensor {
    fn base(&self) -> &SensorBase;

    fn base_mut(&mut self) -> &mut SensorBase;

    fn name(&self) -> &'static str {
        self.base().name()
    }

    fn num_variables(&self) -> usize {
        self.base().num_variables()
    }

    /// Prepares the sensor. A sensor that fails setup is treated as absent.
    fn setup(&mut self) -> bool;

    /// Takes one measurement and records it into the base's result slots.
    fn add_single_measurement_result(&mut self) -> bool;
}
