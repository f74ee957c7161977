use otaflash_transfer::SlotId;

/// Version and identity reported by the bootloader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootloaderInfo {
    /// Packed version word: major in the top byte, minor in the next.
    pub version: u32,
}

impl BootloaderInfo {
    pub fn major(&self) -> u8 {
        (self.version >> 24) as u8
    }

    pub fn minor(&self) -> u8 {
        (self.version >> 16) as u8
    }
}

impl std::fmt::Display for BootloaderInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major(), self.minor())
    }
}

/// Errors reported by the bootloader.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BootError {
    #[error("bootloader rejected request: {0}")]
    Rejected(String),

    #[error("bootloader unavailable")]
    Unavailable,
}

/// Control interface of the trusted bootloader.
///
/// On hardware the reboot calls do not return; host implementations
/// return after recording the request.
pub trait Bootloader {
    fn info(&self) -> BootloaderInfo;

    /// Marks the image in `slot` as the one to install on next boot.
    fn select_image_for_boot(&mut self, slot: SlotId) -> Result<(), BootError>;

    /// Reboots into the bootloader to verify and install the selected image.
    fn reboot_and_install(&mut self) -> Result<(), BootError>;

    /// Reboots into the standalone DFU loader.
    fn reboot_to_dfu(&mut self) -> Result<(), BootError>;
}

/// A bootloader request seen by [`RecordingBootloader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootCall {
    SelectImage(SlotId),
    RebootAndInstall,
    RebootToDfu,
}

/// Host bootloader that records requests instead of rebooting.
#[derive(Debug, Clone)]
pub struct RecordingBootloader {
    info: BootloaderInfo,
    calls: Vec<BootCall>,
    /// Makes `select_image_for_boot` fail.
    pub reject_select: bool,
}

impl RecordingBootloader {
    pub fn new(version: u32) -> Self {
        Self {
            info: BootloaderInfo { version },
            calls: Vec::new(),
            reject_select: false,
        }
    }

    pub fn calls(&self) -> &[BootCall] {
        &self.calls
    }

    /// True if an install reboot has been requested.
    pub fn install_requested(&self) -> bool {
        self.calls.contains(&BootCall::RebootAndInstall)
    }
}

impl Bootloader for RecordingBootloader {
    fn info(&self) -> BootloaderInfo {
        self.info
    }

    fn select_image_for_boot(&mut self, slot: SlotId) -> Result<(), BootError> {
        if self.reject_select {
            return Err(BootError::Rejected(format!("cannot select {slot}")));
        }
        self.calls.push(BootCall::SelectImage(slot));
        Ok(())
    }

    fn reboot_and_install(&mut self) -> Result<(), BootError> {
        self.calls.push(BootCall::RebootAndInstall);
        Ok(())
    }

    fn reboot_to_dfu(&mut self) -> Result<(), BootError> {
        self.calls.push(BootCall::RebootToDfu);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_decoding() {
        let info = BootloaderInfo {
            version: 0x0102_0304,
        };
        assert_eq!(info.major(), 1);
        assert_eq!(info.minor(), 2);
        assert_eq!(info.to_string(), "1.2");
    }

    #[test]
    fn records_calls_in_order() {
        let mut bl = RecordingBootloader::new(0);
        bl.select_image_for_boot(SlotId(0)).unwrap();
        bl.reboot_and_install().unwrap();
        assert_eq!(
            bl.calls(),
            &[BootCall::SelectImage(SlotId(0)), BootCall::RebootAndInstall]
        );
        assert!(bl.install_requested());
    }

    #[test]
    fn rejected_select_is_not_recorded() {
        let mut bl = RecordingBootloader::new(0);
        bl.reject_select = true;
        assert!(bl.select_image_for_boot(SlotId(0)).is_err());
        assert!(bl.calls().is_empty());
    }
}
