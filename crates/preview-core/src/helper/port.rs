//! Free port negotiation for the helper process

use std::net::{Ipv4Addr, SocketAddrV4, TcpListener};

use crate::error::{PreviewError, PreviewResult};

fn try_bind(port: u16) -> Option<u16> {
    let listener = TcpListener::bind(SocketAddrV4::new(Ipv4Addr::LOCALHOST, port)).ok()?;
    let bound = listener.local_addr().ok()?.port();
    // Released on drop; the helper binds it again right after
    drop(listener);
    Some(bound)
}

/// Find a bindable loopback port.
///
/// Tries `start`, then `start + 1 ..= start + span`, then an OS-assigned
/// port. The probe bind is released before returning, so another process
/// may take the port before the helper does.
pub fn negotiate_port(start: u16, span: u16) -> PreviewResult<u16> {
    let last = start.saturating_add(span);
    for port in start..=last {
        if port == 0 {
            continue;
        }
        if let Some(bound) = try_bind(port) {
            tracing::debug!("Negotiated helper port {}", bound);
            return Ok(bound);
        }
        tracing::trace!("Port {} is busy", port);
    }

    match try_bind(0) {
        Some(bound) => {
            tracing::debug!("Ports {}..={} busy, using ephemeral port {}", start, last, bound);
            Ok(bound)
        }
        None => Err(PreviewError::PortExhausted { start }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skips_busy_port() {
        let held = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let busy = held.local_addr().unwrap().port();
        let port = negotiate_port(busy, 3).unwrap();
        assert_ne!(port, busy);
        assert!(port != 0);
    }

    #[test]
    fn test_ephemeral_when_range_busy() {
        let held = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let busy = held.local_addr().unwrap().port();
        let port = negotiate_port(busy, 0).unwrap();
        assert_ne!(port, busy);
    }
}
