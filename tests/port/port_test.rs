//! Coverage for free-port discovery.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener};

use webrig::config::ServerConfig;
use webrig::port::{find_free_port, probe, select_port, PortError, PortStatus};

const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

fn occupy() -> (TcpListener, u16) {
    let listener = TcpListener::bind((LOCALHOST, 0)).expect("bind ephemeral port");
    let port = listener.local_addr().expect("local addr").port();
    (listener, port)
}

#[test]
fn probe_sees_a_listener_as_occupied() {
    let (_listener, port) = occupy();
    let status = probe(SocketAddr::new(LOCALHOST, port)).expect("probe succeeds");
    assert_eq!(status, PortStatus::Occupied);
}

#[test]
fn probe_sees_a_closed_port_as_free() {
    let (listener, port) = occupy();
    drop(listener);
    let status = probe(SocketAddr::new(LOCALHOST, port)).expect("probe succeeds");
    assert_eq!(status, PortStatus::Free);
}

#[test]
fn scan_never_returns_an_occupied_port() {
    let (_listener, port) = occupy();
    match find_free_port(LOCALHOST, port, 2) {
        Ok(found) => assert_ne!(found, port),
        Err(PortError::Exhausted { start, .. }) => assert_eq!(start, port),
        Err(e) => panic!("unexpected probe failure: {e}"),
    }
}

#[test]
fn fully_occupied_range_is_exhausted() {
    let (_listener, port) = occupy();
    let err = find_free_port(LOCALHOST, port, 1).expect_err("only port is taken");
    match err {
        PortError::Exhausted { start, end } => {
            assert_eq!(start, port);
            assert_eq!(end, u32::from(port) + 1);
        }
        other => panic!("expected exhaustion, got {other}"),
    }
}

#[test]
fn range_past_max_port_is_rejected() {
    let err = find_free_port(LOCALHOST, 65_530, 10).expect_err("range overflows");
    assert!(matches!(
        err,
        PortError::RangeOverflow {
            start: 65_530,
            width: 10
        }
    ));
}

#[test]
fn range_may_end_at_the_last_port() {
    match find_free_port(LOCALHOST, 65_526, 10) {
        Ok(found) => assert!(found >= 65_526),
        Err(PortError::Exhausted { start, end }) => {
            assert_eq!(start, 65_526);
            assert_eq!(end, 65_536);
        }
        Err(e) => panic!("range ending at 65535 rejected: {e}"),
    }
}

#[test]
fn last_port_alone_is_a_valid_range() {
    let result = find_free_port(LOCALHOST, u16::MAX, 1);
    assert!(
        !matches!(result, Err(PortError::RangeOverflow { .. })),
        "{result:?}"
    );
}

#[test]
fn empty_range_is_exhausted_without_probing() {
    let err = find_free_port(LOCALHOST, 18_300, 0).expect_err("nothing to scan");
    assert!(matches!(
        err,
        PortError::Exhausted {
            start: 18_300,
            end: 18_300
        }
    ));
}

#[test]
fn reserved_port_skips_the_scan() {
    let (_listener, port) = occupy();
    let config = ServerConfig {
        reserved_port: Some(port),
        default_port: port,
        scan_width: 1,
        ..ServerConfig::default()
    };
    // The reserved port is occupied, so a scan would have been exhausted.
    assert_eq!(select_port(&config).expect("reserved port"), port);
}

#[test]
fn select_port_scans_from_the_default_port() {
    let (_listener, port) = occupy();
    let config = ServerConfig {
        default_port: port,
        scan_width: 1,
        ..ServerConfig::default()
    };
    assert!(matches!(
        select_port(&config),
        Err(PortError::Exhausted { .. })
    ));
}
