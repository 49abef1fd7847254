//! Linux sysfs GPIO driver (`/sys/class/gpio`)
//!
//! Channels are BCM pin numbers. The sysfs interface addresses lines by
//! global number, so each channel is offset by the base of the BCM pin
//! controller chip (0 on older kernels, 512 on 6.6 and later).

use super::{GpioDriver, Level};
use crate::error::{GateError, Result};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

/// Default sysfs GPIO root
pub const SYSFS_GPIO_ROOT: &str = "/sys/class/gpio";

/// Labels of the chips that own the BCM header pins
pub const BCM_CHIP_LABELS: &[&str] = &["pinctrl-bcm2835", "pinctrl-bcm2711", "pinctrl-rp1"];

/// Attempts at the first `direction` write after an export
const EXPORT_SETTLE_ATTEMPTS: u32 = 20;

/// Pause between those attempts while udev creates and chowns the line
const EXPORT_SETTLE_INTERVAL: Duration = Duration::from_millis(10);

/// GPIO driver backed by the sysfs interface
///
/// Channels are exported on setup and unexported on cleanup, after being
/// returned to inputs.
pub struct SysfsGpio {
    root: PathBuf,
    base: OnceLock<u32>,
    exported: Mutex<Vec<u32>>,
}

impl SysfsGpio {
    /// Create a driver rooted at `/sys/class/gpio`
    pub fn new() -> Self {
        Self::with_root(SYSFS_GPIO_ROOT)
    }

    /// Create a driver rooted at a custom directory
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            base: OnceLock::new(),
            exported: Mutex::new(Vec::new()),
        }
    }

    /// Get the sysfs root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Global line number of a BCM channel
    pub fn line(&self, channel: u32) -> u32 {
        *self.base.get_or_init(|| self.find_bcm_base()) + channel
    }

    /// Scan `gpiochip*` entries for the BCM pin controller
    fn find_bcm_base(&self) -> u32 {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!(root = %self.root.display(), error = %e, "Cannot list GPIO chips");
                return 0;
            }
        };

        for entry in entries.flatten() {
            let name = entry.file_name();
            if !name.to_string_lossy().starts_with("gpiochip") {
                continue;
            }

            let chip = entry.path();
            let label = match std::fs::read_to_string(chip.join("label")) {
                Ok(label) => label,
                Err(_) => continue,
            };
            if !BCM_CHIP_LABELS.contains(&label.trim()) {
                continue;
            }

            let base = std::fs::read_to_string(chip.join("base"))
                .map_err(|e| e.to_string())
                .and_then(|base| base.trim().parse::<u32>().map_err(|e| e.to_string()));
            match base {
                Ok(base) => {
                    tracing::debug!(chip = %chip.display(), base, "BCM GPIO chip found");
                    return base;
                }
                Err(e) => tracing::warn!(chip = %chip.display(), error = %e, "Unreadable GPIO chip base"),
            }
        }

        tracing::debug!(root = %self.root.display(), "No BCM GPIO chip label, using base 0");
        0
    }

    fn line_dir(&self, channel: u32) -> PathBuf {
        self.root.join(format!("gpio{}", self.line(channel)))
    }

    fn attr_error(channel: u32, path: &Path, value: &str, e: io::Error) -> GateError {
        GateError::Gpio {
            channel,
            reason: format!("write '{}' to {}: {}", value, path.display(), e),
        }
    }

    fn write_attr(&self, channel: u32, path: &Path, value: &str) -> Result<()> {
        std::fs::write(path, value).map_err(|e| Self::attr_error(channel, path, value, e))
    }

    /// Write to a freshly exported line, waiting for it to become writable
    fn write_attr_after_export(&self, channel: u32, path: &Path, value: &str) -> Result<()> {
        let mut attempt = 1;
        loop {
            match std::fs::write(path, value) {
                Ok(()) => return Ok(()),
                Err(e)
                    if attempt < EXPORT_SETTLE_ATTEMPTS
                        && matches!(
                            e.kind(),
                            io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied
                        ) =>
                {
                    tracing::debug!(channel, attempt, error = %e, "Exported line not ready");
                    attempt += 1;
                    std::thread::sleep(EXPORT_SETTLE_INTERVAL);
                }
                Err(e) => return Err(Self::attr_error(channel, path, value, e)),
            }
        }
    }
}

impl Default for SysfsGpio {
    fn default() -> Self {
        Self::new()
    }
}

impl GpioDriver for SysfsGpio {
    fn setup_output(&self, channel: u32, initial: Level) -> Result<()> {
        let line = self.line(channel);
        let dir = self.line_dir(channel);
        let direction = dir.join("direction");

        // "high"/"low" sets the direction and the initial level in one write
        if dir.exists() {
            self.write_attr(channel, &direction, initial.as_direction())?;
        } else {
            self.write_attr(channel, &self.root.join("export"), &line.to_string())?;
            self.write_attr_after_export(channel, &direction, initial.as_direction())?;
        }

        let mut exported = self.exported.lock().map_err(|e| GateError::Gpio {
            channel,
            reason: format!("Failed to acquire driver lock: {}", e),
        })?;
        if !exported.contains(&channel) {
            exported.push(channel);
        }

        tracing::debug!(channel, line, level = ?initial, "GPIO output configured");
        Ok(())
    }

    fn write(&self, channel: u32, level: Level) -> Result<()> {
        let path = self.line_dir(channel).join("value");
        self.write_attr(channel, &path, level.as_value())
    }

    fn cleanup(&self) -> Result<()> {
        let channels: Vec<u32> = {
            let mut exported = self.exported.lock().map_err(|e| GateError::Gpio {
                channel: 0,
                reason: format!("Failed to acquire driver lock: {}", e),
            })?;
            std::mem::take(&mut *exported)
        };

        let mut first_err = None;
        for channel in channels {
            let result = self
                .write_attr(channel, &self.line_dir(channel).join("direction"), "in")
                .and_then(|_| {
                    let line = self.line(channel).to_string();
                    self.write_attr(channel, &self.root.join("unexport"), &line)
                });

            if let Err(e) = result {
                tracing::warn!(channel, error = %e, "Failed to release GPIO channel");
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn name(&self) -> &str {
        "sysfs"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_root(channels: &[u32]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for ch in channels {
            std::fs::create_dir_all(dir.path().join(format!("gpio{}", ch))).unwrap();
        }
        dir
    }

    fn read(path: PathBuf) -> String {
        std::fs::read_to_string(path).unwrap()
    }

    #[test]
    fn test_setup_output_sets_initial_level() {
        let root = fake_root(&[24]);
        let gpio = SysfsGpio::with_root(root.path());

        gpio.setup_output(24, Level::High).unwrap();

        assert_eq!(read(root.path().join("gpio24/direction")), "high");
        // Channel directory already existed, so no export was written
        assert!(!root.path().join("export").exists());
    }

    #[test]
    fn test_setup_output_exports_missing_channel() {
        let root = fake_root(&[]);
        let gpio = SysfsGpio::with_root(root.path());

        // Nothing creates gpio25/ after the export, so the wait gives up
        let err = gpio.setup_output(25, Level::High).unwrap_err();
        assert_eq!(read(root.path().join("export")), "25");
        assert!(matches!(err, GateError::Gpio { channel: 25, .. }));
    }

    #[test]
    fn test_write_levels() {
        let root = fake_root(&[24]);
        let gpio = SysfsGpio::with_root(root.path());
        gpio.setup_output(24, Level::High).unwrap();

        gpio.write(24, Level::Low).unwrap();
        assert_eq!(read(root.path().join("gpio24/value")), "0");

        gpio.write(24, Level::High).unwrap();
        assert_eq!(read(root.path().join("gpio24/value")), "1");
    }

    #[test]
    fn test_cleanup_returns_channels_to_input() {
        let root = fake_root(&[24, 25]);
        let gpio = SysfsGpio::with_root(root.path());
        gpio.setup_output(24, Level::High).unwrap();
        gpio.setup_output(25, Level::High).unwrap();

        gpio.cleanup().unwrap();

        assert_eq!(read(root.path().join("gpio24/direction")), "in");
        assert_eq!(read(root.path().join("gpio25/direction")), "in");
        assert_eq!(read(root.path().join("unexport")), "25");

        // Second cleanup has nothing left to release
        gpio.cleanup().unwrap();
    }

    fn fake_chip(root: &Path, name: &str, label: &str, base: u32) {
        let chip = root.join(name);
        std::fs::create_dir_all(&chip).unwrap();
        std::fs::write(chip.join("label"), format!("{}\n", label)).unwrap();
        std::fs::write(chip.join("base"), format!("{}\n", base)).unwrap();
    }

    /// Stand-in for the kernel: create the line directory once it is exported
    fn spawn_kernel_export(root: &Path) -> std::thread::JoinHandle<()> {
        let root = root.to_path_buf();
        std::thread::spawn(move || {
            let export = root.join("export");
            for _ in 0..500 {
                let line = std::fs::read_to_string(&export).unwrap_or_default();
                if !line.trim().is_empty() {
                    std::fs::create_dir_all(root.join(format!("gpio{}", line.trim()))).unwrap();
                    return;
                }
                std::thread::sleep(Duration::from_millis(1));
            }
        })
    }

    #[test]
    fn test_line_without_chip_labels_is_bcm_number() {
        let root = fake_root(&[]);
        let gpio = SysfsGpio::with_root(root.path());
        assert_eq!(gpio.line(24), 24);
    }

    #[test]
    fn test_line_offset_by_bcm_chip_base() {
        let root = fake_root(&[]);
        fake_chip(root.path(), "gpiochip512", "pinctrl-bcm2711", 512);
        fake_chip(root.path(), "gpiochip570", "raspberrypi-exp-gpio", 570);
        let gpio = SysfsGpio::with_root(root.path());

        assert_eq!(gpio.line(24), 536);
        assert_eq!(gpio.line(25), 537);
    }

    #[test]
    fn test_setup_exports_global_line_and_waits_for_it() {
        let root = fake_root(&[]);
        fake_chip(root.path(), "gpiochip512", "pinctrl-bcm2711", 512);
        let kernel = spawn_kernel_export(root.path());
        let gpio = SysfsGpio::with_root(root.path());

        gpio.setup_output(24, Level::High).unwrap();
        kernel.join().unwrap();

        assert_eq!(read(root.path().join("export")), "536");
        assert_eq!(read(root.path().join("gpio536/direction")), "high");

        gpio.write(24, Level::Low).unwrap();
        assert_eq!(read(root.path().join("gpio536/value")), "0");

        gpio.cleanup().unwrap();
        assert_eq!(read(root.path().join("gpio536/direction")), "in");
        assert_eq!(read(root.path().join("unexport")), "536");
    }

    #[test]
    fn test_name() {
        assert_eq!(SysfsGpio::new().name(), "sysfs");
        assert_eq!(SysfsGpio::new().root(), Path::new(SYSFS_GPIO_ROOT));
    }
}
