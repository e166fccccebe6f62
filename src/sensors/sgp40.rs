//! Sensirion SGP40 VOC sensor.
//!
//! `measure_raw` takes the current relative humidity and temperature as
//! compensation parameters, so this sensor cannot be read until a peer
//! (normally an SHT31 in the same group) has smoothed values for both.
//! The output is the raw SRAW_VOC signal in ticks.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{Error as _, I2c};
use log::warn;

use crate::app::ports::SensorPort;
use crate::error::SensorError;
use crate::sensors::crc::{checked_word, word_with_crc};
use crate::sensors::{AIR_QUALITY, HUMIDITY, QuantitySpec, Readings, TEMPERATURE};

pub const DEFAULT_ADDRESS: u8 = 0x59;

const CMD_MEASURE_RAW: [u8; 2] = [0x26, 0x0F];
/// Datasheet max is 30 ms.
const MEASUREMENT_MS: u32 = 30;

pub const QUANTITIES: &[QuantitySpec] = &[QuantitySpec {
    name: AIR_QUALITY,
    unit: "ticks",
    precision: 0,
}];

pub const COMPENSATION_INPUTS: &[&str] = &[TEMPERATURE, HUMIDITY];

/// Relative humidity (%) to the sensor's 16-bit parameter, rounded.
pub fn humidity_ticks(rh: f32) -> u16 {
    let rh = rh.clamp(0.0, 100.0);
    (rh * 65535.0 / 100.0 + 0.5) as u16
}

/// Temperature (°C) to the sensor's 16-bit parameter, truncated.
pub fn temperature_ticks(celsius: f32) -> u16 {
    let t = celsius.clamp(-45.0, 130.0);
    ((t + 45.0) * 65535.0 / 175.0) as u16
}

/// Full 8-byte `measure_raw` frame.
pub fn measure_command(rh: f32, celsius: f32) -> [u8; 8] {
    let [h0, h1, h2] = word_with_crc(humidity_ticks(rh));
    let [t0, t1, t2] = word_with_crc(temperature_ticks(celsius));
    [CMD_MEASURE_RAW[0], CMD_MEASURE_RAW[1], h0, h1, h2, t0, t1, t2]
}

pub struct Sgp40<I, D> {
    i2c: I,
    delay: D,
    address: u8,
}

impl<I: I2c, D: DelayNs> Sgp40<I, D> {
    pub fn new(i2c: I, delay: D, address: u8) -> Self {
        Self {
            i2c,
            delay,
            address,
        }
    }

    pub fn measure_raw(&mut self, rh: f32, celsius: f32) -> Result<u16, SensorError> {
        let cmd = measure_command(rh, celsius);
        self.i2c.write(self.address, &cmd).map_err(|e| {
            warn!("SGP40@0x{:02X}: command write failed: {:?}", self.address, e.kind());
            SensorError::Bus
        })?;

        self.delay.delay_ms(MEASUREMENT_MS);

        let mut buf = [0u8; 3];
        self.i2c.read(self.address, &mut buf).map_err(|e| {
            warn!("SGP40@0x{:02X}: read failed: {:?}", self.address, e.kind());
            SensorError::Bus
        })?;

        checked_word(buf)
    }
}

impl<I, D> SensorPort for Sgp40<I, D>
where
    I: I2c + Send,
    D: DelayNs + Send,
{
    fn quantities(&self) -> &'static [QuantitySpec] {
        QUANTITIES
    }

    fn compensation_inputs(&self) -> &'static [&'static str] {
        COMPENSATION_INPUTS
    }

    fn acquire(&mut self, inputs: &Readings) -> Readings {
        let (Some(celsius), Some(rh)) = (inputs.get(TEMPERATURE), inputs.get(HUMIDITY)) else {
            return Readings::new();
        };
        match self.measure_raw(rh, celsius) {
            Ok(raw) => Readings::new().with(AIR_QUALITY, f32::from(raw)),
            Err(e) => {
                warn!("SGP40@0x{:02X}: {}", self.address, e);
                Readings::new()
            }
        }
    }
}
