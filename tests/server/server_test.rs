//! Coverage for the pauseable embedded server.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::Router;
use webrig::browser::{BrowserError, WebClient};
use webrig::port::find_free_port;
use webrig::server::{PauseableServer, ServerError, ServerState};

const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// Router whose `/counter` returns how many times it has been hit.
fn counter_router() -> Router {
    let hits = Arc::new(AtomicUsize::new(0));
    Router::new()
        .route(
            "/counter",
            get(|State(hits): State<Arc<AtomicUsize>>| async move {
                let n = hits.fetch_add(1, Ordering::SeqCst).saturating_add(1);
                n.to_string()
            }),
        )
        .with_state(hits)
}

fn server_in(range_start: u16) -> PauseableServer {
    webrig::logging::init_test();
    let port = find_free_port(LOCALHOST, range_start, 20).expect("free port");
    PauseableServer::new(SocketAddr::new(LOCALHOST, port), counter_router(), 1)
        .expect("server builds")
}

fn hit(client: &WebClient, server: &PauseableServer) -> Result<String, BrowserError> {
    let url = format!("http://{}/counter", server.local_addr());
    client.get_page(&url).map(|page| page.text())
}

#[test]
fn new_server_is_paused_until_started() {
    let server = server_in(18_400);
    assert_eq!(server.state(), ServerState::Paused);
    assert!(!server.is_running());

    assert_eq!(server.start().expect("starts"), ServerState::Running);
    assert!(server.is_running());
    server.shutdown().expect("shuts down");
    assert_eq!(server.state(), ServerState::Paused);
}

#[test]
fn pause_refuses_connections_and_resume_keeps_state() {
    let server = server_in(18_420);
    let client = WebClient::new().expect("client");
    let port = server.port();

    server.start().expect("starts");
    assert_eq!(hit(&client, &server).expect("first hit"), "1");

    assert_eq!(server.pause(true).expect("pauses"), ServerState::Paused);
    let err = hit(&client, &server).expect_err("listener is closed");
    assert!(matches!(err, BrowserError::Request { .. }), "got {err}");

    assert_eq!(server.pause(false).expect("resumes"), ServerState::Running);
    assert_eq!(server.port(), port);
    assert_eq!(hit(&client, &server).expect("hit after resume"), "2");
}

#[test]
fn repeated_transitions_are_no_ops() {
    let server = server_in(18_440);
    let client = WebClient::new().expect("client");

    assert_eq!(server.pause(true).expect("pause while paused"), ServerState::Paused);
    server.start().expect("starts");
    assert_eq!(server.start().expect("start while running"), ServerState::Running);
    assert_eq!(server.pause(false).expect("resume while running"), ServerState::Running);
    assert_eq!(hit(&client, &server).expect("single listener serves"), "1");

    server.pause(true).expect("pauses");
    assert_eq!(server.pause(true).expect("pause twice"), ServerState::Paused);
}

#[test]
fn occupied_address_fails_to_bind() {
    let blocker = TcpListener::bind((LOCALHOST, 0)).expect("bind ephemeral port");
    let addr = blocker.local_addr().expect("local addr");
    let server = PauseableServer::new(addr, counter_router(), 1).expect("server builds");

    let err = server.start().expect_err("address in use");
    assert!(matches!(err, ServerError::Bind { addr: a, .. } if a == addr));
    assert_eq!(server.state(), ServerState::Paused);

    drop(blocker);
    assert_eq!(server.start().expect("binds once freed"), ServerState::Running);
}

#[test]
fn debug_output_shows_address_and_state() {
    let server = server_in(18_460);
    let shown = format!("{server:?}");
    assert!(shown.contains(&server.port().to_string()));
    assert!(shown.contains("Paused"));
}
