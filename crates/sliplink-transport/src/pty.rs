use std::ffi::{CStr, OsStr};
use std::fs::{File, OpenOptions};
use std::os::fd::{AsRawFd, FromRawFd, RawFd};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{Result, TransportError};
use crate::stream::StreamLine;
use crate::traits::{RawReceiver, SerialLine};

/// Serial line backed by a pseudo-terminal.
///
/// The master side is driven by this process; another program attaches to
/// [`PtyLine::slave_path`] as if it were a serial port. Both sides are put in
/// raw mode so no byte is translated by the line discipline.
pub struct PtyLine {
    line: StreamLine<File>,
    slave_path: PathBuf,
    // Holding the slave open keeps reads on the master blocking instead of
    // failing with EIO while nobody is attached.
    _slave: File,
}

impl PtyLine {
    /// Allocate a new pseudo-terminal.
    pub fn open() -> Result<Self> {
        // SAFETY: posix_openpt has no pointer arguments; the returned descriptor
        // is checked before use and ownership moves into `master` immediately.
        let master_fd = unsafe { libc::posix_openpt(libc::O_RDWR | libc::O_NOCTTY) };
        if master_fd < 0 {
            return Err(last_os_error("posix_openpt"));
        }
        // SAFETY: `master_fd` is a freshly opened descriptor owned by nobody else.
        let master = unsafe { File::from_raw_fd(master_fd) };

        // SAFETY: `master_fd` is an open pty master for the lifetime of `master`.
        if unsafe { libc::grantpt(master_fd) } != 0 {
            return Err(last_os_error("grantpt"));
        }
        // SAFETY: as above.
        if unsafe { libc::unlockpt(master_fd) } != 0 {
            return Err(last_os_error("unlockpt"));
        }

        let slave_path = slave_name(master_fd)?;
        let slave = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NOCTTY)
            .open(&slave_path)
            .map_err(|source| TransportError::Pty {
                op: "open slave",
                source,
            })?;

        set_raw(master.as_raw_fd())?;
        set_raw(slave.as_raw_fd())?;

        info!(slave = %slave_path.display(), "opened pseudo-terminal line");

        let line = StreamLine::with_label(master, format!("pty:{}", slave_path.display()))?;
        Ok(Self {
            line,
            slave_path,
            _slave: slave,
        })
    }

    /// Device path another program should open to talk to this line.
    pub fn slave_path(&self) -> &Path {
        &self.slave_path
    }

    /// Whether the master side has stopped reading.
    pub fn is_closed(&self) -> bool {
        self.line.is_closed()
    }
}

impl SerialLine for PtyLine {
    fn register_receiver(&self, receiver: RawReceiver) {
        self.line.register_receiver(receiver);
    }

    fn send(&self, bytes: &[u8]) -> Result<()> {
        self.line.send(bytes)
    }
}

impl std::fmt::Debug for PtyLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PtyLine")
            .field("slave_path", &self.slave_path)
            .finish()
    }
}

fn slave_name(master_fd: RawFd) -> Result<PathBuf> {
    let mut name = [0 as libc::c_char; 128];
    // SAFETY: `name` is a writable buffer of the advertised length.
    let rc = unsafe { libc::ptsname_r(master_fd, name.as_mut_ptr(), name.len()) };
    if rc != 0 {
        return Err(TransportError::Pty {
            op: "ptsname_r",
            source: std::io::Error::from_raw_os_error(rc),
        });
    }
    // SAFETY: on success ptsname_r wrote a NUL-terminated string into `name`.
    let name = unsafe { CStr::from_ptr(name.as_ptr()) };
    Ok(PathBuf::from(OsStr::from_bytes(name.to_bytes())))
}

fn set_raw(fd: RawFd) -> Result<()> {
    let mut termios = std::mem::MaybeUninit::<libc::termios>::uninit();
    // SAFETY: `termios` is valid writable storage for one termios struct.
    if unsafe { libc::tcgetattr(fd, termios.as_mut_ptr()) } != 0 {
        return Err(last_os_error("tcgetattr"));
    }
    // SAFETY: tcgetattr succeeded and fully initialised the struct.
    let mut termios = unsafe { termios.assume_init() };
    // SAFETY: `termios` is a valid, initialised struct.
    unsafe { libc::cfmakeraw(&mut termios) };
    // SAFETY: `termios` is valid for reads for the duration of the call.
    if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &termios) } != 0 {
        return Err(last_os_error("tcsetattr"));
    }
    Ok(())
}

fn last_os_error(op: &'static str) -> TransportError {
    TransportError::Pty {
        op,
        source: std::io::Error::last_os_error(),
    }
}
