//! Free-port discovery for the embedded server.
//!
//! A port is considered free when a client connection to it is refused.
//! Any other connection error means the probe itself is unreliable and
//! aborts startup.

use std::io;
use std::net::{IpAddr, SocketAddr, TcpStream};

use thiserror::Error;
use tracing::{debug, info};

use crate::config::ServerConfig;

/// Port discovery failure.
#[derive(Debug, Error)]
pub enum PortError {
    /// A probe failed with something other than a refused connection.
    #[error("couldn't find an available port to run the functional test server: probing port {port} failed: {source}")]
    Probe {
        /// Port being probed.
        port: u16,
        /// Underlying connection error.
        #[source]
        source: io::Error,
    },
    /// Every port in the scanned range is occupied.
    #[error("no free port in range {start}..{end}")]
    Exhausted {
        /// First port scanned.
        start: u16,
        /// End of the range (exclusive; 65536 when the range ends at the last port).
        end: u32,
    },
    /// The range runs past port 65535.
    #[error("port range {start}+{width} exceeds 65535")]
    RangeOverflow {
        /// First port of the range.
        start: u16,
        /// Requested range width.
        width: u16,
    },
}

/// Result of probing a single port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortStatus {
    /// Something accepted the connection.
    Occupied,
    /// The connection was refused.
    Free,
}

/// Probe `addr` by connecting to it as a client.
///
/// # Errors
///
/// Returns [`PortError::Probe`] for any connection error other than
/// `ConnectionRefused`.
pub fn probe(addr: SocketAddr) -> Result<PortStatus, PortError> {
    match TcpStream::connect(addr) {
        Ok(stream) => {
            drop(stream);
            debug!(%addr, "port occupied");
            Ok(PortStatus::Occupied)
        }
        Err(e) if e.kind() == io::ErrorKind::ConnectionRefused => {
            debug!(%addr, "port free");
            Ok(PortStatus::Free)
        }
        Err(source) => Err(PortError::Probe {
            port: addr.port(),
            source,
        }),
    }
}

/// One past the highest port number.
const PORT_LIMIT: u32 = 65_536;

/// Return the first free port in `start..start + width` on `ip`.
///
/// The range may end exactly at the last port: `start + width == 65536`.
///
/// # Errors
///
/// - [`PortError::RangeOverflow`] if the range runs past `u16::MAX`.
/// - [`PortError::Probe`] on the first probe that fails unexpectedly.
/// - [`PortError::Exhausted`] if every port is occupied.
pub fn find_free_port(ip: IpAddr, start: u16, width: u16) -> Result<u16, PortError> {
    let end = u32::from(start).saturating_add(u32::from(width));
    if end > PORT_LIMIT {
        return Err(PortError::RangeOverflow { start, width });
    }

    for port in (u32::from(start)..end).filter_map(|p| u16::try_from(p).ok()) {
        if probe(SocketAddr::new(ip, port))? == PortStatus::Free {
            return Ok(port);
        }
    }

    Err(PortError::Exhausted { start, end })
}

/// Choose the port for the embedded server.
///
/// A reserved port is used as-is; otherwise the configured range is scanned.
///
/// # Errors
///
/// Propagates [`find_free_port`] errors.
pub fn select_port(config: &ServerConfig) -> Result<u16, PortError> {
    if let Some(port) = config.reserved_port {
        info!(port, "using reserved port");
        return Ok(port);
    }

    let port = find_free_port(config.bind_address, config.default_port, config.scan_width)?;
    info!(port, "selected free port");
    Ok(port)
}
