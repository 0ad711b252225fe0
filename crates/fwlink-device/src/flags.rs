//! Capability, internal and install flags.

use bitflags::bitflags;

bitflags! {
    /// Capability flags exposed to the host.
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DeviceFlags: u32 {
        /// Firmware can be written to the device
        const UPDATABLE              = 0b0000_0001;
        /// Device stays usable while new firmware is staged
        const USABLE_DURING_UPDATE   = 0b0000_0010;
        /// Device does not restart after a write; activation happens later
        const SKIPS_RESTART          = 0b0000_0100;
        /// Device is registered with the host
        const REGISTERED             = 0b0000_1000;
    }
}

bitflags! {
    /// Flags private to the plugin/host contract, never shown to users.
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct InternalFlags: u32 {
        /// After a write the host waits for a device with the same GUID to reappear
        const REPLUG_MATCH_GUID      = 0b0000_0001;
    }
}

bitflags! {
    /// Flags passed through from the update request to the device family.
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct InstallFlags: u32 {
        /// Ignore soft safety checks
        const FORCE                  = 0b0000_0001;
        /// Allow writing the version already installed
        const ALLOW_REINSTALL        = 0b0000_0010;
        /// Allow writing an older version
        const ALLOW_OLDER            = 0b0000_0100;
        /// Do not record the update in history
        const NO_HISTORY             = 0b0000_1000;
    }
}

impl InstallFlags {
    /// No install flags.
    pub const NONE: Self = Self::empty();
}

const DEVICE_FLAG_NAMES: [(DeviceFlags, &str); 4] = [
    (DeviceFlags::UPDATABLE, "updatable"),
    (DeviceFlags::USABLE_DURING_UPDATE, "usable-during-update"),
    (DeviceFlags::SKIPS_RESTART, "skips-restart-after-update"),
    (DeviceFlags::REGISTERED, "registered"),
];

impl std::fmt::Display for DeviceFlags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = DEVICE_FLAG_NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        if names.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", names.join(","))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_display() {
        let flags = DeviceFlags::UPDATABLE | DeviceFlags::SKIPS_RESTART;
        assert_eq!(flags.to_string(), "updatable,skips-restart-after-update");
        assert_eq!(DeviceFlags::empty().to_string(), "none");
    }

    #[test]
    fn test_install_flags_none() {
        assert!(InstallFlags::NONE.is_empty());
        assert_eq!(InstallFlags::default(), InstallFlags::NONE);
    }
}
