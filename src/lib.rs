//! Driver for the AOSong AM2315 family of I2C temperature/humidity sensors.
//!
//! [`am2315::Am2315`] runs the wake/command/response protocol and keeps the
//! last good reading. [`sensors::Am2315c`] wraps it for a measurement
//! framework that works with result slots and NaN sentinels.

pub mod am2315;
pub mod clock;
pub mod sensors;
