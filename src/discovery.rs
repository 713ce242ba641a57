//! Chip and bus discovery
//!
//! Walks sysfs for hardware monitoring chips and I2C adapters, and hands what
//! it finds to a [`Catalog`].
//!
//! # Examples
//!
//! Print every chip on the system
//!
//! ```rust,no_run
//! # use linsensors::{discovery::*, sysfs::Sysfs};
//! let mut discovery = Discovery::new(Sysfs::detect(), Config::default());
//! let mut catalog = MemoryCatalog::default();
//! discovery.chips(&mut catalog).unwrap();
//!
//! for chip in catalog.chips() {
//!     println!("{} on {:?} at {:#x}", chip.prefix(), chip.bus(), chip.address());
//! }
//! ```
//!
//! # Implementation
//!
//! Chips are found through the `hwmon` class. Kernels too old to have it
//! are scanned through the devices on the `i2c` bus instead.
//!
//! Every chip is matched against the known chip definitions. Chips with no
//! definition get one built from their attributes, see [`crate::feature`],
//! up to a fixed number of chip families.
use crate::{
    chip::{identify, Bus, ChipIdentity, Identification, ISA_ADAPTER_PREFIX},
    error::{text::*, DiscoveryError, Result},
    feature::{classify, ChipFeatureSet},
    sysfs::{ClassDevice, Device, Sysfs},
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, info, warn};

/// How many chip families may be classified dynamically
pub const DYNAMIC_CHIP_CAPACITY: usize = 20;

/// Class hardware monitoring chips are registered under
pub const MONITOR_CLASS: &str = "hwmon";

/// Bus scanned for chips when there is no [`MONITOR_CLASS`]
pub const LEGACY_BUS: &str = "i2c";

/// Class I2C adapters are registered under
pub const ADAPTER_CLASS: &str = "i2c-adapter";

lazy_static! {
    static ref ADAPTER_NAME: Regex = Regex::new(r"^i2c-(\d+)").expect("valid regex");
}

/// Discovery settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Class chips are found under
    pub monitor_class: String,

    /// Bus scanned when `monitor_class` doesn't exist
    pub legacy_bus: String,

    /// Class adapters are found under
    pub adapter_class: String,

    /// How many chip families may be classified dynamically
    pub dynamic_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            monitor_class: MONITOR_CLASS.into(),
            legacy_bus: LEGACY_BUS.into(),
            adapter_class: ADAPTER_CLASS.into(),
            dynamic_capacity: DYNAMIC_CHIP_CAPACITY,
        }
    }
}

/// Known chip definitions
///
/// Hand written definitions come first, followed by those classified during
/// discovery. Only the latter count against the capacity.
#[derive(Debug, Clone)]
pub struct Registry {
    known: Vec<ChipFeatureSet>,
    dynamic: usize,
    capacity: usize,
}

impl Registry {
    pub fn new(definitions: Vec<ChipFeatureSet>, capacity: usize) -> Self {
        Self {
            known: definitions,
            dynamic: 0,
            capacity,
        }
    }

    /// Definition for chip family `prefix`, compared case-insensitively.
    pub fn lookup(&self, prefix: &str) -> Option<&ChipFeatureSet> {
        self.known
            .iter()
            .find(|c| c.prefix().eq_ignore_ascii_case(prefix))
    }

    /// Add a dynamically classified chip.
    ///
    /// # Errors
    ///
    /// Gives `chip` back if the registry is full.
    pub fn push_dynamic(&mut self, chip: ChipFeatureSet) -> Result<(), ChipFeatureSet> {
        if self.is_full() {
            return Err(chip);
        }
        self.known.push(chip);
        self.dynamic += 1;
        Ok(())
    }

    /// Whether no more chips can be classified
    pub fn is_full(&self) -> bool {
        self.dynamic >= self.capacity
    }

    /// How many chips were classified dynamically
    pub fn dynamic_len(&self) -> usize {
        self.dynamic
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Every known definition
    pub fn chips(&self) -> &[ChipFeatureSet] {
        &self.known
    }
}

/// An I2C adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusEntry {
    adapter: String,
    bus: Bus,
}

impl BusEntry {
    /// Adapter name, ie `SMBus I801 adapter at 0400`
    pub fn adapter(&self) -> &str {
        &self.adapter
    }

    /// [`Bus::I2c`] with the adapter number, [`Bus::Isa`] for ISA adapters,
    /// or [`Bus::Dummy`] if it couldn't be numbered.
    pub fn bus(&self) -> Bus {
        self.bus
    }
}

/// Where discovered chips and buses go
pub trait Catalog {
    fn add_chip(&mut self, chip: ChipIdentity);

    fn add_bus(&mut self, bus: BusEntry);
}

/// A [`Catalog`] that keeps everything in memory, in discovery order.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    chips: Vec<ChipIdentity>,
    buses: Vec<BusEntry>,
}

impl MemoryCatalog {
    pub fn chips(&self) -> &[ChipIdentity] {
        &self.chips
    }

    pub fn buses(&self) -> &[BusEntry] {
        &self.buses
    }
}

impl Catalog for MemoryCatalog {
    fn add_chip(&mut self, chip: ChipIdentity) {
        self.chips.push(chip);
    }

    fn add_bus(&mut self, bus: BusEntry) {
        self.buses.push(bus);
    }
}

/// Discovers chips and buses in a [`Sysfs`]
#[derive(Debug, Clone)]
pub struct Discovery {
    sysfs: Sysfs,
    registry: Registry,
    config: Config,
}

// Public
impl Discovery {
    /// Discover with no hand written chip definitions
    pub fn new(sysfs: Sysfs, config: Config) -> Self {
        Self::with_chips(sysfs, config, Vec::new())
    }

    /// Discover, using `definitions` instead of classifying chips they
    /// describe.
    pub fn with_chips(sysfs: Sysfs, config: Config, definitions: Vec<ChipFeatureSet>) -> Self {
        let registry = Registry::new(definitions, config.dynamic_capacity);
        Self {
            sysfs,
            registry,
            config,
        }
    }

    pub fn sysfs(&self) -> &Sysfs {
        &self.sysfs
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Known chip definitions, including everything classified so far.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Find every chip and add it to `catalog`.
    ///
    /// The registry is kept between calls, so a chip family is only
    /// classified once.
    ///
    /// # Errors
    ///
    /// - If a device name couldn't be parsed, see [`identify`]
    /// - If a class device has no underlying device
    /// - If sysfs couldn't be read
    ///
    /// The scan stops at the first error, chips found before it stay in
    /// `catalog`.
    pub fn chips<C: Catalog>(&mut self, catalog: &mut C) -> Result<()> {
        let devices = match self.sysfs.class_devices(&self.config.monitor_class)? {
            Some(d) => d,
            None => {
                debug!(
                    class = %self.config.monitor_class,
                    bus = %self.config.legacy_bus,
                    "No monitoring class, scanning bus"
                );
                return self.legacy_chips(catalog);
            }
        };
        let mut found = 0;
        for class_dev in &devices {
            let device = class_dev
                .device()?
                .ok_or_else(|| DiscoveryError::NoDevice(class_dev.kernel_name().to_owned()))?;
            // Older kernels only have the attributes on the device.
            let holder: &dyn Device = if class_dev.attribute("name")?.is_some() {
                class_dev
            } else {
                &device
            };
            if self.chip(&device, holder, catalog)? {
                found += 1;
            }
        }
        info!(chips = found, class = %self.config.monitor_class, "Scanned for chips");
        Ok(())
    }

    /// Find every I2C adapter and add it to `catalog`.
    ///
    /// Adapters without a name are skipped.
    ///
    /// # Errors
    ///
    /// - If sysfs couldn't be read
    pub fn buses<C: Catalog>(&self, catalog: &mut C) -> Result<()> {
        let devices = match self.sysfs.class_devices(&self.config.adapter_class)? {
            Some(d) => d,
            None => return Ok(()),
        };
        let mut found = 0;
        for class_dev in &devices {
            let adapter = match adapter_name(class_dev)? {
                Some(name) => name,
                None => continue,
            };
            let bus = if adapter.starts_with(ISA_ADAPTER_PREFIX) {
                Bus::Isa
            } else {
                adapter_number(class_dev.kernel_name()).map_or(Bus::Dummy, Bus::I2c)
            };
            catalog.add_bus(BusEntry { adapter, bus });
            found += 1;
        }
        info!(buses = found, class = %self.config.adapter_class, "Scanned for buses");
        Ok(())
    }
}

// Private
impl Discovery {
    /// Scan the legacy bus for chips.
    ///
    /// A missing bus just means there are no chips.
    fn legacy_chips<C: Catalog>(&mut self, catalog: &mut C) -> Result<()> {
        let devices = match self.sysfs.bus_devices(&self.config.legacy_bus)? {
            Some(d) => d,
            None => return Ok(()),
        };
        let mut found = 0;
        for device in &devices {
            if self.chip(device, device, catalog)? {
                found += 1;
            }
        }
        info!(chips = found, bus = %self.config.legacy_bus, "Scanned for chips");
        Ok(())
    }

    /// Identify, classify if needed, and register one chip.
    ///
    /// Returns whether a chip was registered.
    fn chip<C: Catalog>(
        &mut self,
        device: &dyn Device,
        holder: &dyn Device,
        catalog: &mut C,
    ) -> Result<bool> {
        let chip = match identify(&self.sysfs, device, holder)? {
            Identification::Chip(chip) => chip,
            Identification::Skip(reason) => {
                debug!(device = device.kernel_name(), ?reason, "Skipping device");
                return Ok(false);
            }
        };
        if self.registry.lookup(chip.prefix()).is_none() {
            if self.registry.is_full() {
                warn!(chip = chip.prefix(), "{}", REGISTRY_FULL);
            } else {
                let features = classify(holder)?;
                debug!(
                    chip = chip.prefix(),
                    features = features.features().len(),
                    "Classified chip"
                );
                if let Err(features) = self.registry.push_dynamic(features) {
                    warn!(chip = features.prefix(), "{}", REGISTRY_FULL);
                }
            }
        }
        catalog.add_chip(chip);
        Ok(true)
    }
}

/// Name of the adapter at `class_dev`.
///
/// Older kernels only have the name on the underlying device, which is also
/// used when the class device's name can't be read.
fn adapter_name(class_dev: &ClassDevice) -> Result<Option<String>> {
    if let Some(attr) = class_dev.attribute("name")? {
        match attr.read_value() {
            Ok(name) => return Ok(Some(name)),
            Err(e) => {
                debug!(adapter = class_dev.kernel_name(), error = %e, "Unreadable adapter name");
            }
        }
    }
    let device = match class_dev.device()? {
        Some(d) => d,
        None => return Ok(None),
    };
    match device.attribute("name")? {
        Some(attr) => Ok(Some(attr.read_value()?)),
        None => Ok(None),
    }
}

/// Adapter number from a kernel name like `i2c-0`
fn adapter_number(kernel_name: &str) -> Option<u32> {
    ADAPTER_NAME.captures(kernel_name)?[1].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(prefix: &str) -> ChipFeatureSet {
        ChipFeatureSet::new(prefix, Vec::new())
    }

    #[test]
    fn registry() {
        let mut registry = Registry::new(vec![set("LM78"), set("it87")], 2);
        assert!(registry.lookup("lm78").is_some());
        assert!(registry.lookup("IT87").is_some());
        assert!(registry.lookup("lm75").is_none());
        assert_eq!(registry.dynamic_len(), 0);

        assert!(registry.push_dynamic(set("lm75")).is_ok());
        assert!(registry.push_dynamic(set("k10temp")).is_ok());
        assert!(registry.is_full());
        let back = registry.push_dynamic(set("coretemp")).unwrap_err();
        assert_eq!(back.prefix(), "coretemp");
        assert_eq!(registry.dynamic_len(), 2);
        assert_eq!(registry.chips().len(), 4);
        assert!(registry.lookup("LM75").is_some());
        assert!(registry.lookup("coretemp").is_none());
    }

    #[test]
    fn empty_registry_is_full() {
        let registry = Registry::new(Vec::new(), 0);
        assert!(registry.is_full());
        assert_eq!(registry.capacity(), 0);
    }

    #[test]
    fn adapter_numbers() {
        assert_eq!(adapter_number("i2c-0"), Some(0));
        assert_eq!(adapter_number("i2c-12"), Some(12));
        assert_eq!(adapter_number("i2c-dev"), None);
        assert_eq!(adapter_number("smbus0"), None);
    }

    #[test]
    fn config() {
        let config = Config::default();
        assert_eq!(config.monitor_class, "hwmon");
        assert_eq!(config.legacy_bus, "i2c");
        assert_eq!(config.adapter_class, "i2c-adapter");
        assert_eq!(config.dynamic_capacity, DYNAMIC_CHIP_CAPACITY);
    }
}
