use core::fmt::Debug;

use embedded_hal::blocking::{delay::DelayMs, i2c::*};
use log::*;

use super::{
    base::{Sensor, SensorBase, Variable},
    i2c_sensor::I2CSensor,
};
use crate::{
    am2315::{Am2315, Reading},
    clock::Clock,
};

pub const TEMP_VAR_NUM: usize = 0;
pub const HUMIDITY_VAR_NUM: usize = 1;

// Warm-up, stabilization and measurement times in milliseconds.
const WARM_UP_TIME_MS: u32 = 100;
const STABILIZATION_TIME_MS: u32 = 500;
const MEASUREMENT_TIME_MS: u32 = 500;

pub static VARIABLES: [Variable; 2] = [
    Variable {
        var_num: TEMP_VAR_NUM,
        name: "temperature",
        unit: "degreeCelsius",
        resolution: 1,
        code: "AM2315Temp",
    },
    Variable {
        var_num: HUMIDITY_VAR_NUM,
        name: "relativeHumidity",
        unit: "percent",
        resolution: 1,
        code: "AM2315Humidity",
    },
];

/// AM2315C as seen by the measurement framework.
///
/// Every read method runs a full transaction on the underlying driver. The
/// driver refuses to start one until its minimum interval (2000 ms by
/// default) has passed since the previous successful transaction finished,
/// so `read_temperature` followed straight away by `read_humidity` yields
/// NaN for the humidity. Use `read_temperature_and_humidity` when both are
/// needed.
pub struct Am2315c<I2C, D, C> {
    sensor: Am2315<I2C, D, C>,
    base: SensorBase,
}

impl<I2C, D, C> Am2315c<I2C, D, C> {
    pub fn new(i2c: I2C, delay: D, clock: C, power_pin: Option<u8>, address: u8) -> Self {
        Self {
            sensor: Am2315::new(i2c, delay, clock, address),
            base: SensorBase::new("AM2315C", &VARIABLES, power_pin, address).with_timing(
                WARM_UP_TIME_MS,
                STABILIZATION_TIME_MS,
                MEASUREMENT_TIME_MS,
            ),
        }
    }

    /// The protocol driver, for callers that need to know why a read failed.
    pub fn driver(&mut self) -> &mut Am2315<I2C, D, C> {
        &mut self.sensor
    }
}

impl<I2C, D, C, E> Am2315c<I2C, D, C>
where
    I2C: Read<Error = E> + Write<Error = E>,
    D: DelayMs<u32>,
    C: Clock,
    E: Debug,
{
    fn read(&mut self) -> Option<Reading> {
        match self.sensor.perform_read() {
            Ok(reading) => {
                debug!(
                    "{}: temperature: {}, humidity: {}",
                    self.base.name(),
                    reading.temperature(),
                    reading.humidity()
                );
                Some(reading)
            }
            Err(e) => {
                warn!("{}: error: {}", self.base.name(), e);
                None
            }
        }
    }

    /// Returns the temperature in °C, or NaN if the read failed.
    pub fn read_temperature(&mut self) -> f32 {
        self.read().map_or(f32::NAN, |r| r.temperature())
    }

    /// Returns the relative humidity in %, or NaN if the read failed.
    pub fn read_humidity(&mut self) -> f32 {
        self.read().map_or(f32::NAN, |r| r.humidity())
    }

    /// Reads both values in a single transaction.
    ///
    /// The outputs are only written when this returns `true`.
    pub fn read_temperature_and_humidity(
        &mut self,
        temperature: &mut f32,
        humidity: &mut f32,
    ) -> bool {
        match self.read() {
            Some(reading) => {
                *temperature = reading.temperature();
                *humidity = reading.humidity();
                true
            }
            None => false,
        }
    }
}

impl<I2C, D, C, E> Sensor for Am2315c<I2C, D, C>
where
    I2C: Read<Error = E> + Write<Error = E>,
    D: DelayMs<u32>,
    C: Clock,
    E: Debug,
{
    fn base(&self) -> &SensorBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut SensorBase {
        &mut self.base
    }

    fn setup(&mut self) -> bool {
        let address = self.sensor.address();
        let found = match self.sensor.probe() {
            Ok(()) => {
                info!("{}: found at {:#04x}", self.base.name(), address);
                true
            }
            Err(e) => {
                warn!(
                    "{}: failed to initialize at {:#04x}: {:?}",
                    self.base.name(),
                    address,
                    e
                );
                false
            }
        };
        self.base.mark_setup(found);
        found
    }

    fn add_single_measurement_result(&mut self) -> bool {
        let mut temperature = f32::NAN;
        let mut humidity = f32::NAN;
        let success = self.read_temperature_and_humidity(&mut temperature, &mut humidity);

        if success {
            self.base
                .verify_and_add_measurement_result(TEMP_VAR_NUM, temperature);
            self.base
                .verify_and_add_measurement_result(HUMIDITY_VAR_NUM, humidity);
        }

        self.base.clear_measurement_request();
        success
    }
}

impl<I2C, D, C, E> I2CSensor<I2C, E> for Am2315c<I2C, D, C>
where
    I2C: Read<Error = E> + Write<Error = E>,
{
    fn address(&self) -> u8 {
        self.sensor.address()
    }

    fn release(self) -> I2C {
        self.sensor.release()
    }
}
