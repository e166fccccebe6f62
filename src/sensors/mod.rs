//! Sensor subsystem: kinds, per-sensor state and the process-wide registry.
//!
//! The registry is built once at startup from configuration and then lent
//! by reference to both loops.  Each [`SensorState`] owns its driver and
//! one [`SmoothingWindow`] per quantity; smoothed means are published
//! through [`AtomicValue`] cells so readers never take a lock.

pub mod cell;
pub mod compensation;
pub mod crc;
pub mod group;
pub mod sgp40;
pub mod sht31;
pub mod window;

use core::fmt;
use core::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::{debug, warn};

use crate::app::ports::{ConfigError, SensorPort};
use crate::config::SensorConfig;
use crate::error::{Result, SensorError};
use cell::AtomicValue;
use sgp40::Sgp40;
use sht31::Sht31;
pub use window::{SmoothingWindow, WINDOW_CAPACITY};

/// Temperature in degrees Celsius.
pub const TEMPERATURE: &str = "temp";
/// Relative humidity in percent.
pub const HUMIDITY: &str = "hum";
/// Raw VOC signal from a gas sensor.
pub const AIR_QUALITY: &str = "aqi";

/// Upper bound on quantities per sensor (and per compensation input set).
pub const MAX_QUANTITIES: usize = 4;

// ───────────────────────────────────────────────────────────────
// Quantities and readings
// ───────────────────────────────────────────────────────────────

/// Static description of one quantity a sensor kind produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantitySpec {
    /// Key used in published payloads and compensation lookups.
    pub name: &'static str,
    pub unit: &'static str,
    /// Decimal places kept when publishing.
    pub precision: u8,
}

/// A small name → value map.  A quantity that is absent is undefined.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Readings {
    values: heapless::Vec<(&'static str, f32), MAX_QUANTITIES>,
}

impl Readings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`set`](Self::set) for a defined value.
    #[must_use]
    pub fn with(mut self, name: &'static str, value: f32) -> Self {
        self.set(name, Some(value));
        self
    }

    /// Define or clear one quantity.
    pub fn set(&mut self, name: &'static str, value: Option<f32>) {
        match value {
            Some(v) => {
                if let Some(slot) = self.values.iter_mut().find(|(k, _)| *k == name) {
                    slot.1 = v;
                } else if self.values.push((name, v)).is_err() {
                    warn!("Readings: no room for '{}', dropped", name);
                }
            }
            None => self.values.retain(|(k, _)| *k != name),
        }
    }

    pub fn get(&self, name: &str) -> Option<f32> {
        self.values
            .iter()
            .find(|(k, _)| *k == name)
            .map(|&(_, v)| v)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }
}

// ───────────────────────────────────────────────────────────────
// Sensor kinds
// ───────────────────────────────────────────────────────────────

/// Every supported sensor model.  Adding a model means adding a variant,
/// a driver module, and a branch in [`create_driver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorKind {
    /// Sensirion SHT31 temperature / humidity sensor.
    Sht31,
    /// Sensirion SGP40 VOC sensor (needs temperature / humidity compensation).
    Sgp40,
}

impl SensorKind {
    pub const ALL: [SensorKind; 2] = [SensorKind::Sht31, SensorKind::Sgp40];

    /// Name used in configuration files.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Sht31 => "SHT31",
            Self::Sgp40 => "SGP40",
        }
    }

    /// Fixed I2C address of the part (SHT31 can be strapped to 0x45).
    pub const fn default_address(self) -> u8 {
        match self {
            Self::Sht31 => sht31::DEFAULT_ADDRESS,
            Self::Sgp40 => sgp40::DEFAULT_ADDRESS,
        }
    }

    pub const fn quantities(self) -> &'static [QuantitySpec] {
        match self {
            Self::Sht31 => sht31::QUANTITIES,
            Self::Sgp40 => sgp40::QUANTITIES,
        }
    }

    pub const fn compensation_inputs(self) -> &'static [&'static str] {
        match self {
            Self::Sht31 => &[],
            Self::Sgp40 => sgp40::COMPENSATION_INPUTS,
        }
    }

    /// The quantity a fan rule triggers on unless configured otherwise.
    pub const fn primary_quantity(self) -> &'static QuantitySpec {
        &self.quantities()[0]
    }

    /// Look up a declared quantity by name.
    pub fn quantity(self, name: &str) -> Option<&'static QuantitySpec> {
        self.quantities().iter().find(|q| q.name == name)
    }
}

impl FromStr for SensorKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|k| k.label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ConfigError::UnknownSensorKind(s.to_string()))
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Build the driver for `kind` on an already-opened bus.
pub fn create_driver<I, D>(kind: SensorKind, address: u8, i2c: I, delay: D) -> Box<dyn SensorPort>
where
    I: I2c + Send + 'static,
    D: DelayNs + Send + 'static,
{
    match kind {
        SensorKind::Sht31 => Box::new(Sht31::new(i2c, delay, address)),
        SensorKind::Sgp40 => Box::new(Sgp40::new(i2c, delay, address)),
    }
}

// ───────────────────────────────────────────────────────────────
// Descriptor
// ───────────────────────────────────────────────────────────────

/// Identity of one physical sensor.  Immutable after startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorDescriptor {
    pub name: String,
    pub kind: SensorKind,
    /// Linux I2C bus number (`/dev/i2c-<bus>`).
    pub bus: u8,
    pub address: u8,
}

impl SensorDescriptor {
    pub fn from_config(cfg: &SensorConfig) -> core::result::Result<Self, ConfigError> {
        let kind: SensorKind = cfg.kind.parse()?;
        Ok(Self {
            name: cfg.name.clone(),
            kind,
            bus: cfg.i2c_bus,
            address: cfg.address.unwrap_or_else(|| kind.default_address()),
        })
    }
}

impl fmt::Display for SensorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} @ i2c-{}:0x{:02X})",
            self.name, self.kind, self.bus, self.address
        )
    }
}

// ───────────────────────────────────────────────────────────────
// SensorState
// ───────────────────────────────────────────────────────────────

/// What happened to one sensor during one acquisition tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleOutcome {
    /// The driver was read; `updated` quantities got a new sample and
    /// `undefined` were skipped.
    Sampled { updated: usize, undefined: usize },
    /// A required compensation input was undefined; no read was attempted.
    CompensationMissing(&'static str),
}

struct Quantity {
    spec: QuantitySpec,
    window: Mutex<SmoothingWindow>,
    current: AtomicValue,
}

impl Quantity {
    fn new(spec: QuantitySpec) -> Self {
        Self {
            spec,
            window: Mutex::new(SmoothingWindow::new()),
            current: AtomicValue::unset(),
        }
    }

    /// Push one raw sample and publish the new mean.  The window lock is
    /// held only for this single update.
    fn push(&self, sample: f32) -> core::result::Result<f32, SensorError> {
        let mut window = lock(&self.window);
        window.push(sample)?;
        let mean = window.current().ok_or(SensorError::NotFinite)?;
        self.current.store(Some(mean));
        Ok(mean)
    }
}

/// One sensor's identity, driver and smoothed quantities.
///
/// Written only by the acquisition thread (through [`sample`](Self::sample));
/// any thread may read values at any time.
pub struct SensorState {
    descriptor: SensorDescriptor,
    quantities: Vec<Quantity>,
    compensation_inputs: &'static [&'static str],
    driver: Mutex<Box<dyn SensorPort>>,
}

impl SensorState {
    /// The quantity set and compensation inputs come from the descriptor's
    /// kind; the driver must agree with it.
    pub fn new(descriptor: SensorDescriptor, driver: Box<dyn SensorPort>) -> Self {
        let kind = descriptor.kind;
        debug_assert_eq!(driver.quantities(), kind.quantities(), "{kind} driver quantities");
        debug_assert_eq!(
            driver.compensation_inputs(),
            kind.compensation_inputs(),
            "{kind} driver compensation inputs"
        );
        let quantities = kind.quantities().iter().copied().map(Quantity::new).collect();
        let compensation_inputs = kind.compensation_inputs();
        Self {
            descriptor,
            quantities,
            compensation_inputs,
            driver: Mutex::new(driver),
        }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn kind(&self) -> SensorKind {
        self.descriptor.kind
    }

    /// Declared quantities, in kind order.
    pub fn quantities(&self) -> impl Iterator<Item = &QuantitySpec> + '_ {
        self.quantities.iter().map(|q| &q.spec)
    }

    pub fn quantity(&self, name: &str) -> Option<&QuantitySpec> {
        self.quantities().find(|q| q.name == name)
    }

    pub fn declares(&self, name: &str) -> bool {
        self.quantity(name).is_some()
    }

    pub fn compensation_inputs(&self) -> &'static [&'static str] {
        self.compensation_inputs
    }

    /// Current smoothed value of `name`; `None` before the first sample or
    /// if the quantity is not declared.
    pub fn value(&self, name: &str) -> Option<f32> {
        self.quantities
            .iter()
            .find(|q| q.spec.name == name)
            .and_then(|q| q.current.load())
    }

    /// Every declared quantity with its current smoothed value.
    pub fn snapshot(&self) -> Vec<(QuantitySpec, Option<f32>)> {
        self.quantities
            .iter()
            .map(|q| (q.spec, q.current.load()))
            .collect()
    }

    /// Number of raw samples currently held for `name`.
    pub fn sample_count(&self, name: &str) -> usize {
        self.quantities
            .iter()
            .find(|q| q.spec.name == name)
            .map_or(0, |q| lock(&q.window).len())
    }

    /// Acquire once and fold every defined raw value into its window.
    ///
    /// If any compensation input is undefined the driver is not called at
    /// all, so an uncompensated read can never leak into the windows.
    pub fn sample(&self, inputs: &Readings) -> SampleOutcome {
        if let Some(&missing) = self
            .compensation_inputs
            .iter()
            .find(|&&input| inputs.get(input).is_none())
        {
            return SampleOutcome::CompensationMissing(missing);
        }

        let raw = lock(&self.driver).acquire(inputs);

        let mut updated = 0;
        let mut undefined = 0;
        for q in &self.quantities {
            let Some(sample) = raw.get(q.spec.name) else {
                undefined += 1;
                continue;
            };
            match q.push(sample) {
                Ok(mean) => {
                    debug!(
                        "{}: {}={} {} (mean {:.3})",
                        self.descriptor.name, q.spec.name, sample, q.spec.unit, mean
                    );
                    updated += 1;
                }
                Err(e) => {
                    warn!("{}: {} sample rejected: {}", self.descriptor.name, q.spec.name, e);
                    undefined += 1;
                }
            }
        }
        SampleOutcome::Sampled { updated, undefined }
    }
}

impl fmt::Debug for SensorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SensorState")
            .field("descriptor", &self.descriptor)
            .field("values", &self.snapshot())
            .finish_non_exhaustive()
    }
}

// ───────────────────────────────────────────────────────────────
// Registry
// ───────────────────────────────────────────────────────────────

/// Every configured sensor, in configuration order.  Never grows or
/// shrinks after startup.
#[derive(Debug, Default)]
pub struct SensorRegistry {
    sensors: Vec<SensorState>,
}

impl SensorRegistry {
    pub fn new(sensors: Vec<SensorState>) -> Self {
        Self { sensors }
    }

    /// Build the registry from configuration.  `open` turns a descriptor
    /// into a live driver (opening the bus on real hardware, a mock in
    /// tests); the first failure aborts startup.
    pub fn build<F>(configs: &[SensorConfig], mut open: F) -> Result<Self>
    where
        F: FnMut(&SensorDescriptor) -> Result<Box<dyn SensorPort>>,
    {
        let mut sensors = Vec::with_capacity(configs.len());
        for cfg in configs {
            let descriptor = SensorDescriptor::from_config(cfg)?;
            if sensors.iter().any(|s: &SensorState| s.name() == descriptor.name) {
                return Err(ConfigError::DuplicateSensor(descriptor.name).into());
            }
            let driver = open(&descriptor)?;
            log::info!("Sensor registered: {}", descriptor);
            sensors.push(SensorState::new(descriptor, driver));
        }
        Ok(Self { sensors })
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&SensorState> {
        self.sensors.get(index)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.sensors.iter().position(|s| s.name() == name)
    }

    pub fn by_name(&self, name: &str) -> Option<&SensorState> {
        self.index_of(name).and_then(|i| self.get(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = &SensorState> + '_ {
        self.sensors.iter()
    }
}

/// Lock a field mutex.  A poisoned guard still holds consistent data here
/// (every critical section is a single push or read), so recover it.
fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
