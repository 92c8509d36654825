//! USB launcher driven through a hidraw node.
//!
//! Each command is one 8-byte output report. The device does not use report
//! ids, so every write is prefixed with a zero id byte.

use anyhow::Result;
use std::fs::{File, OpenOptions};
use std::io::Write;

use super::{LauncherCommand, LauncherTransport};
use crate::error::LauncherError;

#[derive(Clone, Debug)]
pub struct HidLauncherConfig {
    /// Device node, e.g. "/dev/hidraw0".
    pub device: String,
}

pub struct HidLauncher {
    device: String,
    file: File,
}

impl HidLauncher {
    pub fn open(config: HidLauncherConfig) -> Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .open(&config.device)
            .map_err(|err| LauncherError::unavailable("launcher", &config.device, err))?;
        log::info!("launcher opened on {}", config.device);
        Ok(Self {
            device: config.device,
            file,
        })
    }
}

fn output_report(command: LauncherCommand) -> [u8; 9] {
    let mut buf = [0u8; 9];
    buf[1..].copy_from_slice(&command.report());
    buf
}

impl LauncherTransport for HidLauncher {
    fn name(&self) -> &'static str {
        "hidraw"
    }

    fn send(&mut self, command: LauncherCommand) {
        if let Err(err) = self.file.write_all(&output_report(command)) {
            log::warn!(
                "launcher {}: failed to send {:?}: {}",
                self.device,
                command,
                err
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_carry_a_zero_report_id() {
        assert_eq!(
            output_report(LauncherCommand::Fire),
            [0, 0x10, 0, 0, 0, 0, 0, 0, 0]
        );
        assert_eq!(output_report(LauncherCommand::Stop)[1], 0x20);
    }

    #[test]
    fn missing_device_is_unavailable() {
        let err = HidLauncher::open(HidLauncherConfig {
            device: "/nonexistent/hidraw7".to_string(),
        })
        .err()
        .unwrap();
        assert!(matches!(
            err.downcast_ref::<LauncherError>(),
            Some(LauncherError::ResourceUnavailable { resource: "launcher", .. })
        ));
    }
}
