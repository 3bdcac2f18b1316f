use core::fmt::{Debug, Display, Formatter};

use embedded_hal::blocking::{delay::DelayMs, i2c::*};
use serde::Serialize;

use crate::{clock::Clock, sensors::I2CSensor};

pub const ADDRESS: u8 = 0x5C;

// Modbus-style function code for "read input registers".
const AM2315_READREG: u8 = 0x03;
// First register of the humidity/temperature block.
const AM2315_START_REG: u8 = 0x00;
// Two bytes humidity followed by two bytes temperature.
const AM2315_REG_COUNT: u8 = 0x04;
// Echoed header, four data bytes and a two byte CRC.
const FRAME_LEN: usize = 8;

/// Value held by the cache before the first successful transaction.
pub const INVALID_VALUE: f32 = -9999.0;

/// Minimum waits the read protocol needs.
///
/// The engine only ever waits through the injected `DelayMs` provider, so a
/// scheduler that yields instead of spinning can stand in for a blocking one
/// as long as it waits at least this long.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Wait after the wake-up write before the sensor accepts commands.
    pub wake_delay_ms: u32,
    /// Wait between the read command and fetching the reply.
    pub settle_delay_ms: u32,
    /// Minimum time between two successful transactions.
    pub min_interval_ms: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            wake_delay_ms: 2000,
            settle_delay_ms: 50,
            min_interval_ms: 2000,
        }
    }
}

/// A single temperature and humidity reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Reading {
    temperature: f32,
    humidity: f32,
}

impl Reading {
    /// Returns the temperature in °C
    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    /// Returns the relative humidity in %
    pub fn humidity(&self) -> f32 {
        self.humidity
    }
}

/// Last known values, replaced as a whole on every successful transaction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReadingCache {
    temperature: f32,
    humidity: f32,
    last_read_ms: Option<u64>,
}

impl ReadingCache {
    fn new() -> Self {
        Self {
            temperature: INVALID_VALUE,
            humidity: INVALID_VALUE,
            last_read_ms: None,
        }
    }

    fn store(&mut self, reading: Reading, now_ms: u64) {
        *self = Self {
            temperature: reading.temperature,
            humidity: reading.humidity,
            last_read_ms: Some(now_ms),
        };
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    pub fn humidity(&self) -> f32 {
        self.humidity
    }

    /// Timestamp of the last successful transaction, if there was one.
    pub fn last_read_ms(&self) -> Option<u64> {
        self.last_read_ms
    }
}

pub struct Am2315<I2C, D, C> {
    i2c: I2C,
    delay: D,
    clock: C,
    address: u8,
    timing: Timing,
    cache: ReadingCache,
}

impl<I2C, D, C> Am2315<I2C, D, C> {
    /// Creates a new sensor driver.
    pub fn new(i2c: I2C, delay: D, clock: C, address: u8) -> Self {
        Self {
            i2c,
            delay,
            clock,
            address,
            timing: Timing::default(),
            cache: ReadingCache::new(),
        }
    }

    /// Replaces the default protocol timing.
    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    pub fn cache(&self) -> &ReadingCache {
        &self.cache
    }
}

impl<I2C, D, C, E> I2CSensor<I2C, E> for Am2315<I2C, D, C>
where
    I2C: Read<Error = E> + Write<Error = E>,
{
    fn address(&self) -> u8 {
        self.address
    }

    fn release(self) -> I2C {
        self.i2c
    }
}

impl<I2C, D, C, E> Am2315<I2C, D, C>
where
    I2C: Read<Error = E> + Write<Error = E>,
    D: DelayMs<u32>,
    C: Clock,
    E: Debug,
{
    /// Checks that something acknowledges the device address.
    pub fn probe(&mut self) -> Result<(), E> {
        self.i2c.write(self.address, &[])
    }

    /// Runs one complete wake/command/response transaction.
    ///
    /// Blocks for at least `wake_delay_ms + settle_delay_ms`. The minimum
    /// interval counts from the end of the last successful transaction. On
    /// any error the cache is left as it was; retrying is up to the caller.
    pub fn perform_read(&mut self) -> Result<Reading, SensorError<E>> {
        if let Some(last) = self.cache.last_read_ms {
            if self.clock.now_ms().wrapping_sub(last) < self.timing.min_interval_ms {
                return Err(SensorError::Throttled);
            }
        }

        // The sensor sleeps with its I2C interface off, so this write is
        // usually NACKed. Only the bus activity matters.
        self.i2c.write(self.address, &[0x00]).ok();
        self.delay.delay_ms(self.timing.wake_delay_ms);

        self.i2c
            .write(
                self.address,
                &[AM2315_READREG, AM2315_START_REG, AM2315_REG_COUNT],
            )
            .map_err(SensorError::CommandWrite)?;
        self.delay.delay_ms(self.timing.settle_delay_ms);

        let mut buf = [0u8; FRAME_LEN];
        self.i2c
            .read(self.address, &mut buf)
            .map_err(SensorError::ResponseRead)?;

        let reading = parse_frame(&buf)?;
        // Measured from the end of the transaction, after both waits.
        self.cache.store(reading, self.clock.now_ms());
        Ok(reading)
    }
}

/// Validates the echoed header and decodes the data bytes
fn parse_frame<E: Debug>(buf: &[u8; FRAME_LEN]) -> Result<Reading, SensorError<E>> {
    if buf[0] != AM2315_READREG || buf[1] != AM2315_REG_COUNT {
        return Err(SensorError::InvalidResponse {
            function: buf[0],
            count: buf[1],
        });
    }

    let humidity = as_u16(buf[2], buf[3]) as f32 / 10.0;

    // Sign-magnitude, not two's complement.
    let magnitude = as_u16(buf[4] & 0x7F, buf[5]) as f32 / 10.0;
    let temperature = if buf[4] & 0x80 != 0 {
        -magnitude
    } else {
        magnitude
    };

    Ok(Reading {
        temperature,
        humidity,
    })
}

/// Converts two bytes into a u16
fn as_u16(hi: u8, lo: u8) -> u16 {
    ((hi as u16) << 8) | (lo as u16)
}

/// Describes errors returned by the temperature/humidity sensor
#[derive(Debug)]
pub enum SensorError<E: Debug> {
    /// A read was attempted before the minimum interval since the last
    /// successful one had passed. No bus traffic took place.
    Throttled,
    /// Writing the read command to the I2C bus failed
    CommandWrite(E),
    /// Reading the reply frame from the I2C bus failed
    ResponseRead(E),
    /// The reply did not echo the function code and register count
    ///
    /// This usually means the sensor was not fully awake yet.
    InvalidResponse { function: u8, count: u8 },
}

impl<E: Debug> Display for SensorError<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        use SensorError::*;
        match self {
            Throttled => f.write_str("Too soon to read again"),
            CommandWrite(error) => write!(f, "Failed to send read command: {:?}", error),
            ResponseRead(error) => write!(f, "Failed to read response: {:?}", error),
            InvalidResponse { function, count } => write!(
                f,
                "Invalid response header: function {:#04x}, count {}",
                function, count
            ),
        }
    }
}

#[cfg(feature = "std")]
impl<E: Debug> std::error::Error for SensorError<E> {}
