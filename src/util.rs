//! Utility functions

/// Technically Linux requires sysfs to be at `/sys`, calling it a system
/// configuration error otherwise.
///
/// But our upcoming distro is planning to experiment with filesystem layout
/// changes, including of `/sys`, so do this to allow easily changing it.
pub const SYSFS_PATH: &str = "/sys";

/// Mount table, used to find sysfs if it isn't at [`SYSFS_PATH`].
pub const PROC_MOUNTS: &str = "/proc/mounts";

/// Environment variable overriding the sysfs mount point.
pub const SYSFS_ENV: &str = "SYSFS_PATH";

/// Chop a single trailing newline, as sysfs terminates every value with one.
pub fn chop(value: &str) -> &str {
    value.strip_suffix('\n').unwrap_or(value)
}

/// Find the sysfs mount point in a `/proc/mounts` formatted table.
///
/// Returns the mount point of the first `sysfs` filesystem.
pub fn sysfs_mount(mounts: &str) -> Option<&str> {
    mounts.lines().find_map(|line| {
        let mut fields = line.split_whitespace();
        let _source = fields.next()?;
        let target = fields.next()?;
        let fstype = fields.next()?;
        (fstype == "sysfs").then_some(target)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chop_newline() {
        assert_eq!(chop("lm75\n"), "lm75");
        assert_eq!(chop("lm75"), "lm75");
        assert_eq!(chop("lm75\n\n"), "lm75\n");
        assert_eq!(chop(""), "");
    }

    #[test]
    fn mounts() {
        let table = "\
proc /proc proc rw,nosuid,nodev,noexec,relatime 0 0
sysfs /System/sys sysfs rw,nosuid,nodev,noexec,relatime 0 0
sysfs /sys sysfs rw 0 0
";
        assert_eq!(sysfs_mount(table), Some("/System/sys"));
        assert_eq!(sysfs_mount("proc /proc proc rw 0 0\n"), None);
        assert_eq!(sysfs_mount(""), None);
    }
}
