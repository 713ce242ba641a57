//! An interface to the Linux `/sys` filesystem, or sysfs.
//!
//! This is the only part of the crate that touches the filesystem. Everything
//! above it sees devices, attributes, and their text values.
//!
//! # Implementation Details
//!
//! Devices are found two ways, mirroring the two layouts the kernel has used
//! for hardware monitoring:
//!
//! - Through a *class*, `<sysfs>/class/<name>/<entry>`, where each entry
//!   links to its underlying device via a `device` symlink.
//! - Through a *bus*, `<sysfs>/bus/<name>/devices/<entry>`, where each entry
//!   is a symlink into `<sysfs>/devices`.
//!
//! Kernels older than 2.6.14 have no `hwmon` class, so the bus layout is the
//! only way to find chips there.
//!
//! See the [sysfs rules][1] for details
//!
//! [1]: https://www.kernel.org/doc/html/latest/admin-guide/sysfs-rules.html
use crate::util::{sysfs_mount, PROC_MOUNTS, SYSFS_ENV, SYSFS_PATH};
use std::{
    env,
    ffi::OsString,
    fs,
    io,
    path::{Path, PathBuf},
};
use tracing::debug;

pub mod device;

pub use self::device::{Access, Attribute, ClassDevice, Device, GenericDevice};

/// A mounted sysfs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sysfs {
    root: PathBuf,
}

impl Sysfs {
    /// Use the sysfs mounted at `root`
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Find where sysfs is mounted.
    ///
    /// In order, this checks the `SYSFS_PATH` environment variable, the first
    /// `sysfs` entry in `/proc/mounts`, and finally falls back to `/sys`.
    pub fn detect() -> Self {
        if let Some(root) = env::var_os(SYSFS_ENV).filter(|s| !s.is_empty()) {
            debug!(root = ?root, "Using sysfs from environment");
            return Self::new(root);
        }
        let root = fs::read_to_string(PROC_MOUNTS)
            .ok()
            .and_then(|mounts| sysfs_mount(&mounts).map(OsString::from))
            .unwrap_or_else(|| SYSFS_PATH.into());
        debug!(root = ?root, "Using sysfs");
        Self::new(root)
    }

    /// Mount point of this sysfs
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the devices of `class`, sorted by name.
    ///
    /// Returns [`None`] if the class doesn't exist on this system.
    ///
    /// # Errors
    ///
    /// - If `class` is not a single path component
    /// - If the class directory couldn't be read
    pub fn class_devices(&self, class: &str) -> io::Result<Option<Vec<ClassDevice>>> {
        let dir = match self.subdir(&["class", class])? {
            Some(d) => d,
            None => return Ok(None),
        };
        let mut devices = Vec::new();
        for entry in dir {
            let path = entry?.path();
            // Old kernels have real directories here, newer ones symlinks.
            if !path.is_dir() {
                continue;
            }
            devices.push(ClassDevice::new_unchecked(path));
        }
        devices.sort_unstable_by(|a, b| a.kernel_name().cmp(b.kernel_name()));
        Ok(Some(devices))
    }

    /// Get the devices on `bus`, sorted by name.
    ///
    /// Returns [`None`] if the bus doesn't exist on this system.
    ///
    /// # Errors
    ///
    /// - If `bus` is not a single path component
    /// - If the bus directory couldn't be read
    /// - If any device link couldn't be resolved
    pub fn bus_devices(&self, bus: &str) -> io::Result<Option<Vec<GenericDevice>>> {
        let dir = match self.subdir(&["bus", bus, "devices"])? {
            Some(d) => d,
            None => return Ok(None),
        };
        let mut devices = Vec::new();
        for entry in dir {
            let path = entry?.path();
            devices.push(GenericDevice::new_unchecked(fs::canonicalize(path)?));
        }
        devices.sort_unstable_by(|a, b| a.kernel_name().cmp(b.kernel_name()));
        devices.dedup_by(|a, b| a.path() == b.path());
        Ok(Some(devices))
    }

    /// Open the attribute at `path`, relative to the sysfs root.
    ///
    /// Returns [`None`] if there is no such attribute.
    pub fn open_attribute<P: AsRef<Path>>(&self, path: P) -> io::Result<Option<Attribute>> {
        Attribute::open(&self.root.join(path))
    }

    fn subdir(&self, parts: &[&str]) -> io::Result<Option<fs::ReadDir>> {
        if parts.iter().any(|p| p.is_empty() || p.contains('/')) {
            return Err(io::ErrorKind::InvalidInput.into());
        }
        let path = parts.iter().fold(self.root.clone(), |p, c| p.join(c));
        match path.read_dir() {
            Ok(dir) => Ok(Some(dir)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl Default for Sysfs {
    fn default() -> Self {
        Self::detect()
    }
}
