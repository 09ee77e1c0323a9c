use log::{debug, warn};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::{AsRawFd, IntoRawFd};
use std::path::{Path, PathBuf};

use crate::config::{Direction, EdgeDetect, LineId};
use crate::error::AppError;
use crate::gpio::GpioBackend;

const SYSFS_READ_BUFFER: usize = 64;

/// Drives lines through the legacy `/sys/class/gpio` interface.
pub struct SysfsBackend {
    root: PathBuf,
}

impl SysfsBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn attr_path(&self, line: LineId, attr: &str) -> PathBuf {
        self.root.join(format!("gpio{line}")).join(attr)
    }

    // Only a failed open is an error; the write result is logged.
    fn write_attr(&self, path: &Path, text: &str) -> Result<(), AppError> {
        let mut file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(path)
            .map_err(|e| AppError::sysfs(path, e))?;

        match file.write(text.as_bytes()) {
            Ok(n) if n == text.len() => {}
            Ok(n) => warn!(
                "short write to {}: {n} of {} bytes",
                path.display(),
                text.len()
            ),
            Err(e) => warn!("write of '{text}' to {} failed: {e}", path.display()),
        }
        Ok(())
    }
}

impl GpioBackend for SysfsBackend {
    type Value = File;

    fn export(&self, line: LineId) -> Result<(), AppError> {
        self.write_attr(&self.root.join("export"), &line.to_string())
    }

    fn unexport(&self, line: LineId) -> Result<(), AppError> {
        self.write_attr(&self.root.join("unexport"), &line.to_string())
    }

    fn set_direction(&self, line: LineId, direction: Direction) -> Result<(), AppError> {
        self.write_attr(&self.attr_path(line, "direction"), direction.as_sysfs())
    }

    fn set_edge(&self, line: LineId, edge: EdgeDetect) -> Result<(), AppError> {
        self.write_attr(&self.attr_path(line, "edge"), edge.as_sysfs())
    }

    fn set_value(&self, line: LineId, value: bool) -> Result<(), AppError> {
        self.write_attr(
            &self.attr_path(line, "value"),
            if value { "1" } else { "0" },
        )
    }

    fn get_value(&self, line: LineId) -> Result<bool, AppError> {
        let path = self.attr_path(line, "value");
        let mut file = File::open(&path).map_err(|e| AppError::sysfs(&path, e))?;

        let mut buffer = [0u8; 1];
        let len = file
            .read(&mut buffer)
            .map_err(|e| AppError::sysfs(&path, e))?;
        if len == 0 {
            return Err(AppError::sysfs(
                &path,
                io::Error::new(io::ErrorKind::UnexpectedEof, "empty value file"),
            ));
        }
        Ok(buffer[0] != b'0')
    }

    fn open_value(&self, line: LineId, direction: Direction) -> Result<File, AppError> {
        let path = self.attr_path(line, "value");
        let mut options = OpenOptions::new();
        match direction {
            Direction::In => options.read(true).custom_flags(libc::O_NONBLOCK),
            Direction::Out => options.read(true).write(true),
        };
        options.open(&path).map_err(|e| AppError::sysfs(&path, e))
    }

    fn close_value(&self, line: LineId, value: File) -> Result<(), AppError> {
        let fd = value.into_raw_fd();
        if unsafe { libc::close(fd) } == -1 {
            return Err(AppError::sysfs(
                self.attr_path(line, "value"),
                io::Error::last_os_error(),
            ));
        }
        Ok(())
    }

    fn wait_edges(&self, watched: &[&File], timeout_ms: i32) -> Result<Vec<bool>, AppError> {
        let mut fds: Vec<libc::pollfd> = watched
            .iter()
            .map(|file| libc::pollfd {
                fd: file.as_raw_fd(),
                events: libc::POLLPRI | libc::POLLERR,
                revents: 0,
            })
            .collect();

        let rc = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, timeout_ms) };
        if rc < 0 {
            return Err(AppError::Poll(io::Error::last_os_error()));
        }

        Ok(fds
            .iter()
            .map(|fd| fd.revents & libc::POLLPRI != 0)
            .collect())
    }

    fn read_edge(&self, line: LineId, value: &mut File) -> Result<u8, AppError> {
        let path = || self.attr_path(line, "value");
        value
            .seek(SeekFrom::Start(0))
            .map_err(|e| AppError::sysfs(path(), e))?;

        let mut buffer = [0u8; SYSFS_READ_BUFFER];
        let len = value
            .read(&mut buffer)
            .map_err(|e| AppError::sysfs(path(), e))?;
        if len == 0 {
            return Err(AppError::sysfs(
                path(),
                io::Error::new(io::ErrorKind::UnexpectedEof, "empty value file"),
            ));
        }

        debug!(
            "GPIO {line} interrupt occurred, value={}, len={len}",
            buffer[0] as char
        );
        Ok(buffer[0])
    }
}
