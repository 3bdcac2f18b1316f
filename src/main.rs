use esp_idf_hal::{cpu::core, delay::FreeRtos, i2c::*, peripherals::Peripherals, prelude::*};
use esp_idf_sys as _; // If using the `binstart` feature of `esp-idf-sys`, always keep this module imported
use log::*;

use am2315_driver::{
    clock::{Clock, StdClock},
    sensors::{Am2315c, Sensor},
};

use anyhow::{Error, Result};

#[toml_cfg::toml_config]
pub struct Config {
    #[default(0x5C)]
    i2c_address: u8,
    #[default(5000)]
    poll_interval_ms: u32,
    #[default(3)]
    measurements_per_report: u8,
    #[default(60000)]
    setup_retry_ms: u32,
}

fn main() -> Result<()> {
    // It is necessary to call this function once. Otherwise some patches to the runtime
    // implemented by esp-idf-sys might not link properly. See https://github.com/esp-rs/esp-idf-template/issues/71
    esp_idf_sys::link_patches();
    // Bind the log crate to the ESP Logging facilities
    esp_idf_svc::log::EspLogger::initialize_default();

    info!("main: running on core: {:?}", core());
    let cfg = CONFIG;

    info!("Setting up board...");
    let peripherals = Peripherals::take().ok_or_else(|| Error::msg("peripherals already taken"))?;

    info!("Setting up I2C bus...");
    let sda = peripherals.pins.gpio21;
    let scl = peripherals.pins.gpio22;
    let i2c = peripherals.i2c1;
    let config = I2cConfig::new().baudrate(100.kHz().into());
    let driver = I2cDriver::new(i2c, sda, scl, &config)?;
    let bus: &'static _ = shared_bus::new_std!(I2cDriver = driver)
        .ok_or_else(|| Error::msg("I2C bus manager already created"))?;

    let clock = StdClock::new();
    let mut sensor = Am2315c::new(bus.acquire_i2c(), FreeRtos, clock, None, cfg.i2c_address);

    info!("am2315c: setup...");
    while !sensor.setup() {
        warn!("am2315c: not found, retrying in {} ms", cfg.setup_retry_ms);
        FreeRtos::delay_ms(cfg.setup_retry_ms);
    }

    loop {
        sensor.base_mut().clear_values();

        for _ in 0..cfg.measurements_per_report {
            info!("am2315c: taking measurement...");
            sensor.base_mut().start_measurement(clock.now_ms());
            if !sensor.add_single_measurement_result() {
                warn!("am2315c: measurement failed");
            }

            info!("am2315c: sleeping...");
            FreeRtos::delay_ms(cfg.poll_interval_ms);
        }

        let report = serde_json::to_string(&sensor.base().results())?;
        info!("am2315c: {}", report);
    }
}
