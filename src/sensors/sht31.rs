//! Sensirion SHT31 temperature / humidity sensor.
//!
//! Single-shot measurement, high repeatability, clock stretching enabled.
//! The response is two CRC-protected words: temperature then humidity.
//! Each word is checked independently, so a corrupt humidity word still
//! yields a valid temperature for the tick.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{Error as _, I2c};
use log::warn;

use crate::app::ports::SensorPort;
use crate::error::SensorError;
use crate::sensors::crc::checked_word;
use crate::sensors::{HUMIDITY, QuantitySpec, Readings, TEMPERATURE};

/// ADDR pin low.  Strap ADDR high for 0x45.
pub const DEFAULT_ADDRESS: u8 = 0x44;

const CMD_MEASURE_HIGH_REP_STRETCH: [u8; 2] = [0x2C, 0x06];
/// Datasheet max for high repeatability is 15.5 ms.
const MEASUREMENT_MS: u32 = 20;

pub const QUANTITIES: &[QuantitySpec] = &[
    QuantitySpec {
        name: TEMPERATURE,
        unit: "°C",
        precision: 2,
    },
    QuantitySpec {
        name: HUMIDITY,
        unit: "%RH",
        precision: 2,
    },
];

pub fn temperature_from_ticks(raw: u16) -> f32 {
    -45.0 + 175.0 * f32::from(raw) / 65535.0
}

pub fn humidity_from_ticks(raw: u16) -> f32 {
    100.0 * f32::from(raw) / 65535.0
}

pub struct Sht31<I, D> {
    i2c: I,
    delay: D,
    address: u8,
}

impl<I: I2c, D: DelayNs> Sht31<I, D> {
    pub fn new(i2c: I, delay: D, address: u8) -> Self {
        Self {
            i2c,
            delay,
            address,
        }
    }

    /// Give the bus and delay back, e.g. to inspect a mock in tests.
    pub fn release(self) -> (I, D) {
        (self.i2c, self.delay)
    }

    /// One measurement.  The outer `Result` is the bus transaction; each
    /// inner one is a word's checksum.
    pub fn measure(
        &mut self,
    ) -> Result<(Result<f32, SensorError>, Result<f32, SensorError>), SensorError> {
        self.i2c
            .write(self.address, &CMD_MEASURE_HIGH_REP_STRETCH)
            .map_err(|e| {
                warn!("SHT31@0x{:02X}: command write failed: {:?}", self.address, e.kind());
                SensorError::Bus
            })?;

        self.delay.delay_ms(MEASUREMENT_MS);

        let mut buf = [0u8; 6];
        self.i2c.read(self.address, &mut buf).map_err(|e| {
            warn!("SHT31@0x{:02X}: read failed: {:?}", self.address, e.kind());
            SensorError::Bus
        })?;

        let temp = checked_word([buf[0], buf[1], buf[2]]).map(temperature_from_ticks);
        let hum = checked_word([buf[3], buf[4], buf[5]]).map(humidity_from_ticks);
        Ok((temp, hum))
    }
}

impl<I, D> SensorPort for Sht31<I, D>
where
    I: I2c + Send,
    D: DelayNs + Send,
{
    fn quantities(&self) -> &'static [QuantitySpec] {
        QUANTITIES
    }

    fn acquire(&mut self, _inputs: &Readings) -> Readings {
        let mut out = Readings::new();
        let Ok((temp, hum)) = self.measure() else {
            return out;
        };
        for (name, word) in [(TEMPERATURE, temp), (HUMIDITY, hum)] {
            match word {
                Ok(v) => out.set(name, Some(v)),
                Err(e) => warn!("SHT31@0x{:02X}: {} word: {}", self.address, name, e),
            }
        }
        out
    }
}
