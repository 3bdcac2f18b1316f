use embedded_hal::blocking::i2c::*;

pub trait I2CSensor<T, E>
where
    T: Read<Error = E> + Write<Error = E>,
{
    /// Returns the 7-bit address the driver talks to.
    fn address(&self) -> u8;

    /// Releases the underlying I2C bus and destroys the driver.
    fn release(self) -> T;
}
