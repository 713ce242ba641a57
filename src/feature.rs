//! Dynamic feature tables
//!
//! Chips without a hand written definition are described by scanning their
//! attributes and classifying each by name.
//!
//! # Implementation
//!
//! Features are first placed in a sparse table, at a position computed from
//! their category, instance, and subfeature code. Walking that table in order
//! then gives a dense, sorted, feature list that doesn't depend on the order
//! the filesystem listed the attributes in.
use crate::{
    error::{text::*, Result},
    sysfs::{Access, Device},
};
use tracing::{trace, warn};

pub mod grammar;

use self::grammar::{Category, FeatureKind, MAX_SENSORS_PER_TYPE, MAX_SUB_FEATURES, TABLE_LEN};

/// Attribute name suffix of a sensor's main value
const INPUT_SUFFIX: &str = "_input";

/// What may be done with a features value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    ReadOnly,
    WriteOnly,
    ReadWrite,

    /// Neither readable nor writable
    NoRw,
}

impl From<Access> for Mode {
    fn from(access: Access) -> Self {
        match (access.contains(Access::READ), access.contains(Access::WRITE)) {
            (true, true) => Self::ReadWrite,
            (true, false) => Self::ReadOnly,
            (false, true) => Self::WriteOnly,
            (false, false) => Self::NoRw,
        }
    }
}

/// One physical quantity exposed by a chip
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SensorFeature {
    name: String,
    kind: FeatureKind,
    instance: u8,
    number: u32,
    mapping: Option<u32>,
    compute_mapping: Option<u32>,
    mode: Mode,
    scaling: u8,
}

impl SensorFeature {
    /// Feature name, the attribute name without any `_input` suffix.
    ///
    /// # Example
    ///
    /// `temp1`, `temp1_max`, `vid`
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> FeatureKind {
        self.kind
    }

    pub fn category(&self) -> Category {
        self.kind.category()
    }

    /// Subfeature code, `0` for main values.
    pub fn subfeature(&self) -> u8 {
        self.kind.code()
    }

    /// 0-based position within the category, ie `1` for `fan2`.
    pub fn instance(&self) -> u8 {
        self.instance
    }

    /// Unique, 1-based, number of this feature within its chip.
    pub fn number(&self) -> u32 {
        self.number
    }

    /// [`SensorFeature::number`] of the main feature this belongs to.
    ///
    /// [`None`] for main and misc features, and for features whose main
    /// feature the chip doesn't have.
    pub fn mapping(&self) -> Option<u32> {
        self.mapping
    }

    /// Like [`SensorFeature::mapping`], but [`None`] for raw features that
    /// don't take their main feature's scaling, such as alarms.
    pub fn compute_mapping(&self) -> Option<u32> {
        self.compute_mapping
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Raw values are divided by `10^scaling` to get physical units.
    pub fn scaling(&self) -> u8 {
        self.scaling
    }
}

/// Features of one chip family
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChipFeatureSet {
    prefix: String,
    features: Vec<SensorFeature>,
}

impl ChipFeatureSet {
    /// Create a feature set.
    ///
    /// This is how hand written chip definitions are made; `features` should
    /// already be numbered.
    pub fn new(prefix: impl Into<String>, features: Vec<SensorFeature>) -> Self {
        Self {
            prefix: prefix.into(),
            features,
        }
    }

    /// Chip family name, ie `lm75`
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Features, sorted by number
    pub fn features(&self) -> &[SensorFeature] {
        &self.features
    }

    /// Look up a feature by name
    pub fn feature(&self, name: &str) -> Option<&SensorFeature> {
        self.features.iter().find(|f| f.name == name)
    }
}

/// Why [`FeatureTable::insert`] didn't take an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejected {
    /// Not a sensor attribute
    Unknown,

    /// Sensor number too large for the table
    Capacity,

    /// Another attribute already classified the same way
    Duplicate,
}

#[derive(Debug, Clone)]
struct Entry {
    name: String,
    kind: FeatureKind,
    instance: u8,
    mode: Mode,
}

/// Sparse feature table, filled one attribute at a time
#[derive(Debug, Clone)]
pub struct FeatureTable {
    slots: Vec<Option<Entry>>,
}

impl FeatureTable {
    pub fn new() -> Self {
        let mut slots = Vec::new();
        slots.resize_with(TABLE_LEN, || None);
        Self { slots }
    }

    /// Classify attribute `name` and add it to the table.
    ///
    /// Returns the slot it was placed in. Rejections are logged, and never
    /// disturb features already in the table.
    pub fn insert(&mut self, name: &str, access: Access) -> Result<usize, Rejected> {
        let base = match name.strip_suffix(INPUT_SUFFIX) {
            Some(base) if !base.is_empty() => base,
            _ => name,
        };
        let (kind, n) = match grammar::parse(base) {
            Some(parsed) => parsed,
            None => {
                trace!(attribute = name, "Not a sensor feature");
                return Err(Rejected::Unknown);
            }
        };
        let instance = grammar::instance(kind.category(), n);
        if instance as usize >= MAX_SENSORS_PER_TYPE {
            warn!(feature = name, "{}", CAPACITY);
            return Err(Rejected::Capacity);
        }
        let slot = grammar::slot(kind, instance);
        if self.slots[slot].is_some() {
            warn!(feature = name, "{}", DUPLICATE);
            return Err(Rejected::Duplicate);
        }
        self.slots[slot] = Some(Entry {
            name: base.to_owned(),
            kind,
            instance: instance as u8,
            mode: access.into(),
        });
        Ok(slot)
    }

    /// Number of features in the table
    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Turn the table into the dense, numbered, feature list of `prefix`.
    ///
    /// Features are numbered from 1 in slot order. A main value always sits in
    /// the first slot of its sensor, so it is numbered before anything mapping
    /// to it.
    pub fn compact(self, prefix: impl Into<String>) -> ChipFeatureSet {
        let mut numbers: Vec<Option<u32>> = vec![None; self.slots.len()];
        let mut features = Vec::with_capacity(self.len());
        for (slot, entry) in self.slots.into_iter().enumerate() {
            let entry = match entry {
                Some(e) => e,
                None => continue,
            };
            let number = features.len() as u32 + 1;
            numbers[slot] = Some(number);
            let mapping = if entry.kind.is_main() || entry.kind.category() == Category::Misc {
                None
            } else {
                numbers[slot - slot % MAX_SUB_FEATURES]
            };
            let compute_mapping = mapping.filter(|_| entry.kind.computes());
            features.push(SensorFeature {
                name: entry.name,
                kind: entry.kind,
                instance: entry.instance,
                number,
                mapping,
                compute_mapping,
                mode: entry.mode,
                scaling: entry.kind.scaling(),
            });
        }
        ChipFeatureSet::new(prefix, features)
    }
}

impl Default for FeatureTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the feature set of the chip at `device` from its attributes.
///
/// The prefix is taken from the `name` attribute.
///
/// # Errors
///
/// - If the attributes couldn't be listed
/// - If the `name` attribute couldn't be read
pub fn classify(device: &dyn Device) -> Result<ChipFeatureSet> {
    let mut prefix = String::new();
    let mut table = FeatureTable::new();
    for attr in device.attributes()? {
        if attr.name() == "name" {
            prefix = attr.read_value()?;
            continue;
        }
        table.insert(attr.name(), attr.access()).ok();
    }
    Ok(table.compact(prefix))
}
