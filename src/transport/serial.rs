//! Serial link to the vehicle's motor controller.
//!
//! The controller reads single-byte commands at 9600 baud, 8N1. On Linux the
//! tty is switched to that mode through termios; elsewhere the device is used
//! as already configured.

use anyhow::Result;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::time::Duration;

use super::{VehicleCommand, VehicleTransport};
use crate::error::LauncherError;

#[derive(Clone, Debug)]
pub struct SerialVehicleConfig {
    /// Device node, e.g. "/dev/ttyACM0".
    pub port: String,
    /// Pause after opening while the controller resets.
    pub connect_settle: Duration,
}

pub struct SerialVehicle {
    port: String,
    file: File,
}

impl SerialVehicle {
    pub fn open(config: SerialVehicleConfig) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&config.port)
            .map_err(|err| LauncherError::unavailable("vehicle", &config.port, err))?;

        #[cfg(target_os = "linux")]
        configure_tty(&file)
            .map_err(|err| LauncherError::unavailable("vehicle", &config.port, err))?;

        log::info!("vehicle connected on {}", config.port);
        std::thread::sleep(config.connect_settle);

        Ok(Self {
            port: config.port,
            file,
        })
    }
}

impl VehicleTransport for SerialVehicle {
    fn name(&self) -> &'static str {
        "serial"
    }

    fn send(&mut self, command: VehicleCommand) {
        let written = self
            .file
            .write_all(&[command.code()])
            .and_then(|_| self.file.flush());
        if let Err(err) = written {
            log::warn!("vehicle {}: failed to send {:?}: {}", self.port, command, err);
        }
    }
}

#[cfg(target_os = "linux")]
fn configure_tty(file: &File) -> std::io::Result<()> {
    use std::os::unix::io::AsRawFd;

    let fd = file.as_raw_fd();
    // SAFETY: `termios` is plain old data and `fd` stays open for the
    // duration of these calls because `file` is borrowed.
    unsafe {
        let mut options: libc::termios = std::mem::zeroed();
        if libc::tcgetattr(fd, &mut options) != 0 {
            return Err(std::io::Error::last_os_error());
        }
        libc::cfsetispeed(&mut options, libc::B9600);
        libc::cfsetospeed(&mut options, libc::B9600);
        options.c_cflag &= !(libc::PARENB | libc::CSTOPB | libc::CSIZE);
        options.c_cflag |= libc::CS8;
        options.c_lflag |= libc::ICANON;
        if libc::tcsetattr(fd, libc::TCSANOW, &options) != 0 {
            return Err(std::io::Error::last_os_error());
        }
    }
    Ok(())
}
