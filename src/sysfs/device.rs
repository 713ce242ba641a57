//! Devices and their attributes
//!
//! Within the kernel, every entry here is just a device with a directory of
//! attribute files. An attribute is a regular file holding a single value,
//! terminated by a newline.
use bitflags::bitflags;
use rustix::{
    fs::{cwd, statat, AtFlags, FileType, Mode},
    io::Errno,
};
use std::{
    ffi::OsStr,
    fmt::Debug,
    fs,
    io,
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

use self::imp::Sealed;
use crate::util::chop;

mod imp {
    use super::*;

    pub trait Sealed {}

    impl Sealed for GenericDevice {}
    impl Sealed for ClassDevice {}
}

bitflags! {
    /// What may be done with an [`Attribute`].
    ///
    /// Derived from the owner permission bits of the attribute file, which is
    /// how the kernel advertises whether an attribute has `show` and `store`
    /// methods.
    pub struct Access: u8 {
        /// Attribute can be read
        const READ = 1;

        /// Attribute can be written
        const WRITE = 1 << 1;
    }
}

/// A single sysfs attribute file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    name: String,
    path: PathBuf,
    access: Access,
}

impl Attribute {
    /// Open the attribute at `path`.
    ///
    /// Returns [`None`] if `path` doesn't exist or isn't a regular file.
    pub(crate) fn open(path: &Path) -> io::Result<Option<Self>> {
        let st = match statat(cwd(), path, AtFlags::empty()) {
            Ok(st) => st,
            Err(e) if e == Errno::NOENT || e == Errno::NOTDIR => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if FileType::from_raw_mode(st.st_mode as _) != FileType::RegularFile {
            return Ok(None);
        }
        let name = match path.file_name().and_then(OsStr::to_str) {
            Some(name) => name.to_owned(),
            None => return Ok(None),
        };
        let mode = Mode::from_bits_truncate(st.st_mode as _);
        let mut access = Access::empty();
        access.set(Access::READ, mode.contains(Mode::RUSR));
        access.set(Access::WRITE, mode.contains(Mode::WUSR));
        Ok(Some(Self {
            name,
            path: path.to_path_buf(),
            access,
        }))
    }

    /// Attribute name, the file name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Full path to the attribute
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the attribute can be read and/or written
    pub fn access(&self) -> Access {
        self.access
    }

    /// Read the raw value, trailing newline included.
    pub fn read(&self) -> io::Result<String> {
        fs::read_to_string(&self.path)
    }

    /// Read the value, with the trailing newline chopped.
    pub fn read_value(&self) -> io::Result<String> {
        let mut value = self.read()?;
        let len = chop(&value).len();
        value.truncate(len);
        Ok(value)
    }
}

/// A kernel "Device"
///
/// Exposes the attribute directory underlying every kernel device
pub trait Device: Sealed + Debug {
    /// Full path to the device
    ///
    /// # Example
    ///
    /// `/sys/devices/platform/it87.656`
    fn path(&self) -> &Path;

    /// Kernel name of the device.
    ///
    /// Identical to the last component of [`Device::path`]
    ///
    /// # Example
    ///
    /// `it87.656`, `0-0048`, `0000:00:18.3`
    fn kernel_name(&self) -> &str {
        self.path()
            .file_name()
            .and_then(OsStr::to_str)
            .unwrap_or_default()
    }

    /// The attribute called `name`, if this device has one.
    ///
    /// # Errors
    ///
    /// - If `name` is not a single path component
    /// - If the attribute exists but couldn't be inspected
    fn attribute(&self, name: &str) -> io::Result<Option<Attribute>> {
        if name.is_empty() || name.contains('/') {
            return Err(io::ErrorKind::InvalidInput.into());
        }
        Attribute::open(&self.path().join(name))
    }

    /// Every attribute of this device, sorted by name.
    ///
    /// Subdirectories and symlinks, such as `device`, `subsystem`, or
    /// `power`, are not attributes and are not included.
    fn attributes(&self) -> io::Result<Vec<Attribute>> {
        let mut v = Vec::new();
        for entry in WalkDir::new(self.path())
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            // Attributes can disappear while we're looking at them.
            if let Some(attr) = Attribute::open(entry.path())? {
                v.push(attr);
            }
        }
        Ok(v)
    }
}

/// A device under `<sysfs>/devices`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericDevice {
    path: PathBuf,
}

impl GenericDevice {
    /// Create a new [`Device`] from `path`, resolving symlinks.
    ///
    /// # Errors
    ///
    /// If `path` doesn't exist
    pub fn new<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        Ok(Self::new_unchecked(fs::canonicalize(path)?))
    }

    /// Create a new [`Device`] from `path', which must be canonical.
    pub(crate) fn new_unchecked<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl Device for GenericDevice {
    fn path(&self) -> &Path {
        &self.path
    }
}

/// An entry under `<sysfs>/class/<class>`
///
/// Class devices have their own attributes, and usually link to the
/// [`GenericDevice`] they were created for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDevice {
    path: PathBuf,
}

impl ClassDevice {
    pub(crate) fn new_unchecked<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// The underlying device, following the `device` link.
    ///
    /// Returns [`None`] if this class device has no underlying device.
    pub fn device(&self) -> io::Result<Option<GenericDevice>> {
        match fs::canonicalize(self.path.join("device")) {
            Ok(path) => Ok(Some(GenericDevice::new_unchecked(path))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl Device for ClassDevice {
    fn path(&self) -> &Path {
        &self.path
    }
}
