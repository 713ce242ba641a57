//! Naming grammar for hwmon attributes
//!
//! See the kernel [sysfs interface][1] for what these mean.
//!
//! [1]: https://www.kernel.org/doc/Documentation/hwmon/sysfs-interface
use std::fmt;

/// Maximum number of sensors of one category a chip can have.
pub const MAX_SENSORS_PER_TYPE: usize = 16;

/// Room for subfeature codes in each sensor.
pub const MAX_SUB_FEATURES: usize = 32;

/// Subfeature codes with this bit set don't inherit the main feature's
/// computed scaling.
pub const NO_COMPUTE: u8 = 0x10;

/// Feature category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    /// Voltage
    In,
    Fan,
    Temp,

    /// Chip-wide features, `vid` and `vrm`
    Misc,
}

impl Category {
    /// Position of this category's block in the feature table
    pub(crate) fn block(self) -> usize {
        match self {
            Self::In => 0,
            Self::Fan => 1,
            Self::Temp => 2,
            Self::Misc => 3,
        }
    }
}

/// Every feature the grammar knows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureKind {
    In,
    InMin,
    InMax,
    InAlarm,
    InMinAlarm,
    InMaxAlarm,

    Fan,
    FanMin,
    FanAlarm,
    FanFault,
    FanDiv,

    Temp,
    TempMax,
    TempMaxHyst,
    TempMin,
    TempCrit,
    TempCritHyst,
    TempAlarm,
    TempMaxAlarm,
    TempMinAlarm,
    TempCritAlarm,
    TempFault,
    TempType,
    TempOffset,

    /// CPU core voltage identification
    Vid,

    /// Voltage regulator module version
    Vrm,
}

impl FeatureKind {
    pub fn category(self) -> Category {
        use FeatureKind::*;
        match self {
            In | InMin | InMax | InAlarm | InMinAlarm | InMaxAlarm => Category::In,
            Fan | FanMin | FanAlarm | FanFault | FanDiv => Category::Fan,
            Temp | TempMax | TempMaxHyst | TempMin | TempCrit | TempCritHyst | TempAlarm
            | TempMaxAlarm | TempMinAlarm | TempCritAlarm | TempFault | TempType
            | TempOffset => Category::Temp,
            Vid | Vrm => Category::Misc,
        }
    }

    /// Subfeature code within the category.
    ///
    /// `0` is the main value, codes with [`NO_COMPUTE`] set are raw values.
    pub fn code(self) -> u8 {
        use FeatureKind::*;
        match self {
            In | Fan | Temp | Vid => 0,
            InMin | FanMin | TempMax | Vrm => 1,
            InMax | TempMaxHyst => 2,
            TempMin => 3,
            TempCrit => 4,
            TempCritHyst => 5,
            InAlarm | FanAlarm | TempAlarm => NO_COMPUTE,
            InMinAlarm | FanFault | TempMaxAlarm => NO_COMPUTE | 1,
            InMaxAlarm | FanDiv | TempMinAlarm => NO_COMPUTE | 2,
            TempCritAlarm => NO_COMPUTE | 3,
            TempFault => NO_COMPUTE | 4,
            TempType => NO_COMPUTE | 5,
            TempOffset => NO_COMPUTE | 6,
        }
    }

    /// Whether this is the main value of a sensor, the one its other
    /// features map to.
    pub fn is_main(self) -> bool {
        self.category() != Category::Misc && self.code() == 0
    }

    /// Whether this feature is scaled like its main feature
    pub fn computes(self) -> bool {
        self.code() & NO_COMPUTE == 0
    }

    /// Power of ten raw values are divided by.
    pub fn scaling(self) -> u8 {
        match (self.category(), self) {
            (Category::In | Category::Temp, k) if k.computes() => 3,
            (Category::Misc, FeatureKind::Vid) => 3,
            (Category::Misc, FeatureKind::Vrm) => 1,
            _ => 0,
        }
    }
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A sensor family, `<prefix><N>` and `<prefix><N>_<suffix>`
struct Family {
    prefix: &'static str,
    main: FeatureKind,
    subs: &'static [(&'static str, FeatureKind)],
}

const FAMILIES: &[Family] = &[
    Family {
        prefix: "in",
        main: FeatureKind::In,
        subs: &[
            ("min", FeatureKind::InMin),
            ("max", FeatureKind::InMax),
            ("alarm", FeatureKind::InAlarm),
            ("min_alarm", FeatureKind::InMinAlarm),
            ("max_alarm", FeatureKind::InMaxAlarm),
        ],
    },
    Family {
        prefix: "fan",
        main: FeatureKind::Fan,
        subs: &[
            ("min", FeatureKind::FanMin),
            ("alarm", FeatureKind::FanAlarm),
            ("fault", FeatureKind::FanFault),
            ("div", FeatureKind::FanDiv),
        ],
    },
    Family {
        prefix: "temp",
        main: FeatureKind::Temp,
        subs: &[
            ("max", FeatureKind::TempMax),
            ("max_hyst", FeatureKind::TempMaxHyst),
            ("min", FeatureKind::TempMin),
            ("crit", FeatureKind::TempCrit),
            ("crit_hyst", FeatureKind::TempCritHyst),
            ("alarm", FeatureKind::TempAlarm),
            ("max_alarm", FeatureKind::TempMaxAlarm),
            ("min_alarm", FeatureKind::TempMinAlarm),
            ("crit_alarm", FeatureKind::TempCritAlarm),
            ("fault", FeatureKind::TempFault),
            ("type", FeatureKind::TempType),
            ("offset", FeatureKind::TempOffset),
        ],
    },
];

/// Chip-wide features, matched literally
const MISC: &[(&str, FeatureKind)] = &[("vid", FeatureKind::Vid), ("vrm", FeatureKind::Vrm)];

/// Classify a feature base name, with any `_input` already removed.
///
/// Returns the kind and the number written in the name, `N` in `temp<N>`.
/// Misc features have no number and return `0`. Numbers too large to
/// represent saturate.
pub fn parse(base: &str) -> Option<(FeatureKind, u32)> {
    if let Some(&(_, kind)) = MISC.iter().find(|(name, _)| *name == base) {
        return Some((kind, 0));
    }
    FAMILIES.iter().find_map(|family| {
        let rest = base.strip_prefix(family.prefix)?;
        let digits = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_digit()).len();
        if digits == 0 {
            return None;
        }
        let (number, rest) = rest.split_at(digits);
        let number = number.parse().unwrap_or(u32::MAX);
        if rest.is_empty() {
            return Some((family.main, number));
        }
        let suffix = rest.strip_prefix('_')?;
        family
            .subs
            .iter()
            .find(|(name, _)| *name == suffix)
            .map(|&(_, kind)| (kind, number))
    })
}

/// 0-based instance of sensor number `n` of `category`.
///
/// Voltages are numbered from 0. Fans and temperatures are numbered from 1,
/// but some drivers number them from 0, so `0` and `1` both become
/// instance 0.
pub fn instance(category: Category, n: u32) -> u32 {
    match category {
        Category::In => n,
        Category::Fan | Category::Temp if n != 0 => n - 1,
        Category::Fan | Category::Temp => 0,
        Category::Misc => 0,
    }
}

/// Position of a feature in the sparse feature table.
///
/// `instance` must be below [`MAX_SENSORS_PER_TYPE`].
pub fn slot(kind: FeatureKind, instance: u32) -> usize {
    let category = kind.category();
    let instance = match category {
        Category::Misc => 0,
        _ => instance as usize,
    };
    category.block() * MAX_SENSORS_PER_TYPE * MAX_SUB_FEATURES
        + instance * MAX_SUB_FEATURES
        + usize::from(kind.code())
}

/// Size of the sparse feature table, one block per sensor category plus the
/// misc block.
pub const TABLE_LEN: usize = 3 * MAX_SENSORS_PER_TYPE * MAX_SUB_FEATURES + MAX_SUB_FEATURES;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names() {
        assert_eq!(parse("in0"), Some((FeatureKind::In, 0)));
        assert_eq!(parse("in7_max"), Some((FeatureKind::InMax, 7)));
        assert_eq!(parse("fan2_div"), Some((FeatureKind::FanDiv, 2)));
        assert_eq!(parse("temp1"), Some((FeatureKind::Temp, 1)));
        assert_eq!(parse("temp3_crit_hyst"), Some((FeatureKind::TempCritHyst, 3)));
        assert_eq!(parse("temp1_offset"), Some((FeatureKind::TempOffset, 1)));
        assert_eq!(parse("vid"), Some((FeatureKind::Vid, 0)));
        assert_eq!(parse("vrm"), Some((FeatureKind::Vrm, 0)));
        assert_eq!(
            parse("in99999999999999999999"),
            Some((FeatureKind::In, u32::MAX))
        );
    }

    #[test]
    fn unknown_names() {
        for name in [
            "name",
            "uevent",
            "alarms",
            "intrusion0_alarm",
            "in",
            "in_max",
            "temp1_label",
            "temp1max",
            "fan1_",
            "pwm1",
            "pwm1_enable",
            "vid0",
            "cpu0_vid",
        ] {
            assert_eq!(parse(name), None, "{}", name);
        }
    }

    #[test]
    fn codes_are_unique_per_category() {
        let kinds: Vec<_> = FAMILIES
            .iter()
            .flat_map(|f| std::iter::once(f.main).chain(f.subs.iter().map(|&(_, k)| k)))
            .chain(MISC.iter().map(|&(_, k)| k))
            .collect();
        for a in &kinds {
            assert!(usize::from(a.code()) < MAX_SUB_FEATURES);
            for b in &kinds {
                if a != b && a.category() == b.category() {
                    assert_ne!(a.code(), b.code(), "{} and {}", a, b);
                }
            }
        }
    }

    #[test]
    fn main_and_compute() {
        assert!(FeatureKind::Temp.is_main());
        assert!(!FeatureKind::TempMax.is_main());
        assert!(!FeatureKind::Vid.is_main());
        assert!(FeatureKind::TempMax.computes());
        assert!(!FeatureKind::TempAlarm.computes());
        assert!(!FeatureKind::FanDiv.computes());
        assert!(!FeatureKind::TempOffset.computes());
    }

    #[test]
    fn scaling() {
        assert_eq!(FeatureKind::In.scaling(), 3);
        assert_eq!(FeatureKind::InMin.scaling(), 3);
        assert_eq!(FeatureKind::Temp.scaling(), 3);
        assert_eq!(FeatureKind::TempCritHyst.scaling(), 3);
        assert_eq!(FeatureKind::Fan.scaling(), 0);
        assert_eq!(FeatureKind::FanMin.scaling(), 0);
        assert_eq!(FeatureKind::Vid.scaling(), 3);
        assert_eq!(FeatureKind::Vrm.scaling(), 1);
        assert_eq!(FeatureKind::InAlarm.scaling(), 0);
        assert_eq!(FeatureKind::TempFault.scaling(), 0);
    }

    /// Fans and temperatures numbered `0` and `1` land on the same instance.
    /// Drivers are inconsistent about numbering from 0 or 1, so this is kept.
    #[test]
    fn instances() {
        assert_eq!(instance(Category::In, 0), 0);
        assert_eq!(instance(Category::In, 5), 5);
        assert_eq!(instance(Category::Fan, 0), 0);
        assert_eq!(instance(Category::Fan, 1), 0);
        assert_eq!(instance(Category::Fan, 2), 1);
        assert_eq!(instance(Category::Temp, 0), 0);
        assert_eq!(instance(Category::Temp, 1), 0);
        assert_eq!(instance(Category::Temp, 17), 16);
        assert_eq!(instance(Category::Misc, 3), 0);
    }

    #[test]
    fn slots() {
        assert_eq!(slot(FeatureKind::In, 0), 0);
        assert_eq!(slot(FeatureKind::InMax, 1), 34);
        assert_eq!(slot(FeatureKind::Fan, 0), 512);
        assert_eq!(slot(FeatureKind::Temp, 0), 1024);
        assert_eq!(slot(FeatureKind::TempAlarm, 0), 1024 + 0x10);
        assert_eq!(slot(FeatureKind::Vid, 0), 1536);
        assert_eq!(slot(FeatureKind::Vrm, 0), 1537);
        assert_eq!(slot(FeatureKind::TempOffset, 15), TABLE_LEN - MAX_SUB_FEATURES - 32 + 0x16);
        assert!(slot(FeatureKind::Vrm, 0) < TABLE_LEN);
    }
}
