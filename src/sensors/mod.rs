pub mod am2315c;
pub mod base;
pub mod i2c_sensor;

pub use am2315c::Am2315c;
pub use base::{Sensor, SensorBase, SensorStatus, Variable, VariableResult};
pub use i2c_sensor::I2CSensor;
