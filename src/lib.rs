//! Discovery of Linux hardware monitoring chips
//!
//! Finds the sensor chips the kernel exposes through sysfs, works out which
//! bus and address each is on, and describes chips without a hand written
//! definition by classifying their attributes into a numbered feature table.
//!
//! Reading and writing feature values is left to the caller.
//!
//! # Implementation details
//!
//! Hardware monitoring chips are provided through files in `/sys`, so this
//! library requires it to exist, or the sysfs root to be given explicitly.
//!
//! The hwmon attribute names are documented by the kernel [here][1], but
//! the layout of the devices carrying them has changed between kernel
//! versions. Both the `hwmon` class layout and the older `i2c` bus layout
//! are supported.
//!
//! [1]: https://www.kernel.org/doc/Documentation/hwmon/sysfs-interface
#![doc(html_root_url = "https://docs.rs/linsensors/0.1.0")]

pub mod chip;
pub mod discovery;
pub mod error;
pub mod feature;
pub mod sysfs;
mod util;

pub use self::{
    chip::{identify, Bus, BusKind, ChipIdentity, Identification, SkipReason},
    discovery::{BusEntry, Catalog, Config, Discovery, MemoryCatalog, Registry},
    error::DiscoveryError,
    feature::{classify, ChipFeatureSet, Mode, SensorFeature},
    sysfs::Sysfs,
};
