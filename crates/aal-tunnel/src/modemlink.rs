//! The serial link to the Iridium RUDICS modem, real or simulated.
//!
//! Mirrors `strata-agent`'s real/simulated hardware split: production runs
//! against [`RudicsSerialLink`], tests and local development run against
//! [`SimulatedModemLink`], a loopback TCP pair standing in for the serial
//! wire.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

/// A duplex connection to the modem, plus the dial-state operations the
/// tunnel needs. Implementors must support non-blocking-ish reads (a short
/// read timeout) so the modem-read worker can poll a stop flag.
pub trait ModemLink: Read + Write + Send {
    /// Attempts to dial the modem and bring the RUDICS link up. Returns
    /// `true` on success.
    fn dial(&mut self) -> bool;

    /// Tears the link down.
    fn hangup(&mut self);

    fn is_connected(&self) -> bool;

    /// The SIM's ICCID, or empty if the modem is not currently dialed up.
    fn iccid(&self) -> String;
}

/// The dial sequence's expected prompts, recovered from the original
/// fleet's modem configuration: wait for the modem to report its baud
/// rate, send `*` to begin a session, then expect the `CALLSIGN=>` prompt
/// before the link is considered up.
pub const DIAL_WAKE_PROMPT: &str = "BAUD RATE";
pub const DIAL_SESSION_BYTE: &[u8] = b"*";
pub const DIAL_READY_PROMPT: &str = "CALLSIGN=>";

pub struct RudicsSerialLink {
    port: Box<dyn serialport::SerialPort>,
    connected: bool,
    iccid: String,
}

impl RudicsSerialLink {
    pub fn open(path: &str, baud: u32, timeout: Duration) -> std::io::Result<Self> {
        let port = serialport::new(path, baud)
            .timeout(timeout)
            .open()
            .map_err(std::io::Error::other)?;
        Ok(Self {
            port,
            connected: false,
            iccid: String::new(),
        })
    }
}

impl Read for RudicsSerialLink {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.port.read(buf)
    }
}

impl Write for RudicsSerialLink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.port.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.port.flush()
    }
}

impl ModemLink for RudicsSerialLink {
    fn dial(&mut self) -> bool {
        if self.port.write_all(DIAL_SESSION_BYTE).is_err() {
            return false;
        }
        let mut buf = [0u8; 256];
        match self.port.read(&mut buf) {
            Ok(n) if String::from_utf8_lossy(&buf[..n]).contains(DIAL_READY_PROMPT) => {
                self.connected = true;
                true
            }
            _ => false,
        }
    }

    fn hangup(&mut self) {
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn iccid(&self) -> String {
        if self.connected {
            self.iccid.clone()
        } else {
            String::new()
        }
    }
}

/// A loopback TCP pair standing in for the serial wire, for tests and
/// simulated runs (`--simulate`).
pub struct SimulatedModemLink {
    stream: TcpStream,
    connected: bool,
    iccid: String,
}

impl SimulatedModemLink {
    /// Creates a connected pair; returns `(local, remote)` where `remote`
    /// represents the far end of the serial wire (the ground station or a
    /// test harness).
    pub fn pair(iccid: &str) -> std::io::Result<(Self, TcpStream)> {
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        let addr = listener.local_addr()?;
        let remote = TcpStream::connect(addr)?;
        let (local, _) = listener.accept()?;
        local.set_read_timeout(Some(Duration::from_millis(200)))?;
        Ok((
            Self {
                stream: local,
                connected: false,
                iccid: iccid.to_string(),
            },
            remote,
        ))
    }
}

impl Read for SimulatedModemLink {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Write for SimulatedModemLink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.stream.flush()
    }
}

impl ModemLink for SimulatedModemLink {
    fn dial(&mut self) -> bool {
        self.connected = true;
        true
    }

    fn hangup(&mut self) {
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn iccid(&self) -> String {
        if self.connected {
            self.iccid.clone()
        } else {
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulated_link_dials_up_and_reports_iccid() {
        let (mut link, _remote) = SimulatedModemLink::pair("89014103211118510720").unwrap();
        assert!(!link.is_connected());
        assert_eq!(link.iccid(), "");

        assert!(link.dial());
        assert!(link.is_connected());
        assert_eq!(link.iccid(), "89014103211118510720");

        link.hangup();
        assert!(!link.is_connected());
        assert_eq!(link.iccid(), "");
    }

    #[test]
    fn simulated_link_pumps_bytes_to_its_remote_end() {
        let (mut link, mut remote) = SimulatedModemLink::pair("x").unwrap();
        link.write_all(b"hello").unwrap();
        let mut buf = [0u8; 5];
        remote.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        remote.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");
    }
}
