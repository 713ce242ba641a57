//! Chip identification
//!
//! Works out what a hardware monitoring device is called, and where it lives.
//!
//! # Implementation
//!
//! The kernel name of a device encodes its address, in one of three forms:
//!
//! - `<bus>-<addr>`, an I2C client, ie `0-0048`. Bus number and hex address.
//! - `<driver>.<addr>`, a platform device, ie `it87.656`. These are ISA chips
//!   on kernels new enough to register them as platform drivers.
//! - `<domain>:<bus>:<slot>.<fn>`, a PCI device, ie `0000:00:18.3`.
//!
//! Older kernels registered ISA chips as I2C clients on a fake bus, either
//! numbered `9191` or on a real-looking bus whose adapter name starts with
//! `ISA `. Both are turned back into ISA here.
use crate::{
    error::{DiscoveryError, Result},
    sysfs::{Device, Sysfs},
};
use lazy_static::lazy_static;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Fake I2C bus number legacy kernels used for ISA chips
pub const LEGACY_ISA_BUS: u32 = 9191;

/// Adapter names starting with this are really ISA.
pub(crate) const ISA_ADAPTER_PREFIX: &str = "ISA ";

/// Name attributes ending with this belong to part of another chip.
const SUBCLIENT_SUFFIX: &str = " subclient";

lazy_static! {
    static ref I2C_NAME: Regex = Regex::new(r"^(\d+)-([0-9a-fA-F]+)$").expect("valid regex");
    static ref PLATFORM_NAME: Regex = Regex::new(r"^[a-z0-9_]+\.(\d+)$").expect("valid regex");
    static ref PCI_NAME: Regex = Regex::new(
        r"^([0-9a-fA-F]{1,8}):([0-9a-fA-F]{1,8}):([0-9a-fA-F]{1,8})\.([0-9a-fA-F]{1,8})$"
    )
    .expect("valid regex");
}

/// Kind of bus a chip is attached through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BusKind {
    Isa,
    Pci,
    I2c,

    /// Unknown, or an adapter that couldn't be numbered
    Dummy,
}

/// A bus, including its number where it has one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bus {
    Isa,
    Pci,
    I2c(u32),
    Dummy,
}

impl Bus {
    /// Plain kind of this bus
    pub fn kind(&self) -> BusKind {
        match self {
            Self::Isa => BusKind::Isa,
            Self::Pci => BusKind::Pci,
            Self::I2c(_) => BusKind::I2c,
            Self::Dummy => BusKind::Dummy,
        }
    }

    /// Numeric form of the bus.
    ///
    /// I2C buses are their adapter number, everything else a negative
    /// sentinel.
    pub fn number(&self) -> i64 {
        match self {
            Self::Isa => -1,
            Self::Dummy => -4,
            Self::Pci => -5,
            Self::I2c(n) => i64::from(*n),
        }
    }
}

/// Identity of one chip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChipIdentity {
    prefix: String,
    bus: Bus,
    address: u32,
    path: PathBuf,
}

impl ChipIdentity {
    /// Chip family name, ie `lm75`.
    ///
    /// Compare this case-insensitively.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Bus the chip is on
    pub fn bus(&self) -> Bus {
        self.bus
    }

    /// Address of the chip on its bus.
    ///
    /// For PCI this is `(domain << 16) + (bus << 8) + (slot << 3) + fn`.
    pub fn address(&self) -> u32 {
        self.address
    }

    /// Path of the device the chip was found at
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Why a device was skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No readable `name` attribute
    NoName,

    /// Part of a multi-function chip, registered through its parent
    Subclient,
}

/// Result of [`identify`]ing a device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identification {
    Chip(ChipIdentity),
    Skip(SkipReason),
}

/// Identify the chip at `device`.
///
/// `device` provides the kernel name the address is parsed from, and
/// `attributes` the `name` attribute. On older kernels these are the same
/// device, newer ones keep hwmon attributes on the class device.
///
/// # Errors
///
/// - [`DiscoveryError::Parse`] if the kernel name isn't a known address form
/// - [`DiscoveryError::AttributeRead`] if the I2C adapter has a `name`
///   attribute that couldn't be read
pub fn identify(sysfs: &Sysfs, device: &dyn Device, attributes: &dyn Device) -> Result<Identification> {
    let name = match attributes.attribute("name")? {
        Some(attr) => attr.read_value(),
        None => return Ok(Identification::Skip(SkipReason::NoName)),
    };
    let prefix = match name {
        Ok(name) => name,
        Err(e) => {
            debug!(device = ?attributes.path(), error = %e, "Unreadable name attribute");
            return Ok(Identification::Skip(SkipReason::NoName));
        }
    };
    if prefix.ends_with(SUBCLIENT_SUFFIX) {
        return Ok(Identification::Skip(SkipReason::Subclient));
    }

    let kernel_name = device.kernel_name();
    let (bus, address) = if let Some((bus, address)) = parse_i2c(kernel_name) {
        if bus == LEGACY_ISA_BUS || is_isa_adapter(sysfs, bus)? {
            (Bus::Isa, address)
        } else {
            (Bus::I2c(bus), address)
        }
    } else if let Some(address) = parse_platform(kernel_name) {
        (Bus::Isa, address)
    } else if let Some(address) = parse_pci(kernel_name) {
        (Bus::Pci, address)
    } else {
        return Err(DiscoveryError::Parse(kernel_name.to_owned()));
    };

    Ok(Identification::Chip(ChipIdentity {
        prefix,
        bus,
        address,
        path: device.path().to_path_buf(),
    }))
}

/// Whether I2C bus `bus` is really an ISA bus, going by its adapter name.
///
/// An adapter without a name is taken to be I2C.
fn is_isa_adapter(sysfs: &Sysfs, bus: u32) -> Result<bool> {
    let path = format!("class/i2c-adapter/i2c-{}/device/name", bus);
    let attr = match sysfs.open_attribute(&path)? {
        Some(attr) => attr,
        None => return Ok(false),
    };
    let name = attr
        .read()
        .map_err(|e| DiscoveryError::AttributeRead(attr.path().display().to_string(), e))?;
    Ok(name.starts_with(ISA_ADAPTER_PREFIX))
}

/// `<bus>-<addr>`
fn parse_i2c(name: &str) -> Option<(u32, u32)> {
    let caps = I2C_NAME.captures(name)?;
    let bus = caps[1].parse().ok()?;
    let address = u32::from_str_radix(&caps[2], 16).ok()?;
    Some((bus, address))
}

/// `<driver>.<addr>`
fn parse_platform(name: &str) -> Option<u32> {
    PLATFORM_NAME.captures(name)?[1].parse().ok()
}

/// `<domain>:<bus>:<slot>.<fn>`
fn parse_pci(name: &str) -> Option<u32> {
    let caps = PCI_NAME.captures(name)?;
    let mut fields = [0u64; 4];
    for (field, cap) in fields.iter_mut().zip(caps.iter().skip(1)) {
        *field = u64::from_str_radix(cap?.as_str(), 16).ok()?;
    }
    let [domain, bus, slot, func] = fields;
    let address = (domain << 16) + (bus << 8) + (slot << 3) + func;
    u32::try_from(address).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sysfs::GenericDevice;
    use anyhow::Result;
    use std::fs;
    use tempfile::TempDir;

    /// A fake sysfs with one device at `devices/<kernel_name>`
    fn device(kernel_name: &str, name: Option<&str>) -> Result<(TempDir, GenericDevice)> {
        let tmp = TempDir::new()?;
        let path = tmp.path().join("devices").join(kernel_name);
        fs::create_dir_all(&path)?;
        if let Some(name) = name {
            fs::write(path.join("name"), name)?;
        }
        let dev = GenericDevice::new(path)?;
        Ok((tmp, dev))
    }

    fn adapter(tmp: &TempDir, bus: u32, name: &str) -> Result<()> {
        let dir = tmp
            .path()
            .join(format!("class/i2c-adapter/i2c-{}/device", bus));
        fs::create_dir_all(&dir)?;
        fs::write(dir.join("name"), name)?;
        Ok(())
    }

    fn chip(ident: Identification) -> ChipIdentity {
        match ident {
            Identification::Chip(chip) => chip,
            Identification::Skip(reason) => panic!("unexpected skip: {:?}", reason),
        }
    }

    #[test]
    fn patterns() {
        assert_eq!(parse_i2c("0-0048"), Some((0, 0x48)));
        assert_eq!(parse_i2c("12-002d"), Some((12, 0x2d)));
        assert_eq!(parse_i2c("it87.656"), None);
        assert_eq!(parse_i2c("0-0048x"), None);
        assert_eq!(parse_platform("it87.656"), Some(656));
        assert_eq!(parse_platform("coretemp.0"), Some(0));
        assert_eq!(parse_platform("0000:00:1f.3"), None);
        assert_eq!(parse_platform("dell_smm-hwmon"), None);
        assert_eq!(parse_pci("0000:00:1f.3"), Some((0x1f << 3) + 3));
        assert_eq!(parse_pci("0001:02:03.1"), Some((1 << 16) + (2 << 8) + (3 << 3) + 1));
        assert_eq!(parse_pci("0000:00:1f"), None);
    }

    #[test]
    fn legacy_isa_bus() -> Result<()> {
        let (tmp, dev) = device("9191-2c", Some("w83781d\n"))?;
        let sysfs = Sysfs::new(tmp.path());
        let chip = chip(identify(&sysfs, &dev, &dev)?);
        assert_eq!(chip.prefix(), "w83781d");
        assert_eq!(chip.bus(), Bus::Isa);
        assert_eq!(chip.bus().kind(), BusKind::Isa);
        assert_eq!(chip.address(), 0x2c);
        Ok(())
    }

    #[test]
    fn isa_adapter() -> Result<()> {
        let (tmp, dev) = device("0-0048", Some("lm78\n"))?;
        adapter(&tmp, 0, "ISA adapter\n")?;
        let sysfs = Sysfs::new(tmp.path());
        let chip = chip(identify(&sysfs, &dev, &dev)?);
        assert_eq!(chip.bus(), Bus::Isa);
        assert_eq!(chip.address(), 0x48);
        Ok(())
    }

    #[test]
    fn i2c_adapter() -> Result<()> {
        let (tmp, dev) = device("1-0048", Some("lm75\n"))?;
        adapter(&tmp, 1, "SMBus I801 adapter at 0400\n")?;
        let sysfs = Sysfs::new(tmp.path());
        let chip = chip(identify(&sysfs, &dev, &dev)?);
        assert_eq!(chip.bus(), Bus::I2c(1));
        assert_eq!(chip.bus().number(), 1);
        assert_eq!(chip.address(), 0x48);
        assert_eq!(chip.path(), dev.path());
        Ok(())
    }

    #[test]
    fn missing_adapter_is_i2c() -> Result<()> {
        let (tmp, dev) = device("3-002e", Some("adm1027\n"))?;
        let sysfs = Sysfs::new(tmp.path());
        let chip = chip(identify(&sysfs, &dev, &dev)?);
        assert_eq!(chip.bus(), Bus::I2c(3));
        assert_eq!(chip.address(), 0x2e);
        Ok(())
    }

    #[test]
    fn unreadable_adapter() -> Result<()> {
        let (tmp, dev) = device("0-0048", Some("lm75\n"))?;
        let dir = tmp.path().join("class/i2c-adapter/i2c-0/device");
        fs::create_dir_all(&dir)?;
        fs::write(dir.join("name"), [0xff, 0xfe, b'\n'])?;
        let sysfs = Sysfs::new(tmp.path());
        let err = identify(&sysfs, &dev, &dev).unwrap_err();
        assert!(matches!(err, DiscoveryError::AttributeRead(..)));
        assert!(err.is_parse());
        Ok(())
    }

    #[test]
    fn adapter_directory_is_absent() -> Result<()> {
        let (tmp, dev) = device("0-0048", Some("lm75\n"))?;
        fs::create_dir_all(tmp.path().join("class/i2c-adapter/i2c-0/device/name"))?;
        let sysfs = Sysfs::new(tmp.path());
        assert_eq!(chip(identify(&sysfs, &dev, &dev)?).bus(), Bus::I2c(0));
        Ok(())
    }

    #[test]
    fn platform_and_pci() -> Result<()> {
        let (tmp, dev) = device("it87.656", Some("it87\n"))?;
        let sysfs = Sysfs::new(tmp.path());
        let isa = chip(identify(&sysfs, &dev, &dev)?);
        assert_eq!(isa.bus(), Bus::Isa);
        assert_eq!(isa.address(), 656);

        let (tmp, dev) = device("0000:00:1f.3", Some("k8temp\n"))?;
        let sysfs = Sysfs::new(tmp.path());
        let pci = chip(identify(&sysfs, &dev, &dev)?);
        assert_eq!(pci.bus(), Bus::Pci);
        assert_eq!(pci.bus().number(), -5);
        assert_eq!(pci.address(), (0x1f << 3) + 3);
        Ok(())
    }

    #[test]
    fn skips() -> Result<()> {
        let (tmp, dev) = device("0-0049", Some("lm75 subclient\n"))?;
        let sysfs = Sysfs::new(tmp.path());
        assert_eq!(
            identify(&sysfs, &dev, &dev)?,
            Identification::Skip(SkipReason::Subclient)
        );

        let (tmp, dev) = device("0-004a", None)?;
        let sysfs = Sysfs::new(tmp.path());
        assert_eq!(
            identify(&sysfs, &dev, &dev)?,
            Identification::Skip(SkipReason::NoName)
        );
        Ok(())
    }

    #[test]
    fn unknown_name() -> Result<()> {
        let (tmp, dev) = device("dell_smm-hwmon", Some("dell_smm\n"))?;
        let sysfs = Sysfs::new(tmp.path());
        let err = identify(&sysfs, &dev, &dev).unwrap_err();
        assert!(err.is_parse());
        assert!(matches!(err, DiscoveryError::Parse(ref n) if n == "dell_smm-hwmon"));
        Ok(())
    }
}
