//! Coverage for the hosted web application context.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use axum::routing::get;
use axum::Router;
use webrig::browser::{BrowserError, WebClient};
use webrig::port::find_free_port;
use webrig::server::context::{ContextBuilder, DefaultContext, WebAppContext};
use webrig::server::PauseableServer;

const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

fn fixtures() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn serve(context: WebAppContext, range_start: u16) -> PauseableServer {
    webrig::logging::init_test();
    let port = find_free_port(LOCALHOST, range_start, 20).expect("free port");
    let server = PauseableServer::new(SocketAddr::new(LOCALHOST, port), context.into_router(), 1)
        .expect("server builds");
    server.start().expect("starts");
    server
}

fn url(server: &PauseableServer, path: &str) -> String {
    format!("http://localhost:{}{path}", server.port())
}

#[test]
fn main_resources_shadow_the_overlay() {
    let context = WebAppContext::new("/", fixtures().join("webapp"))
        .with_overlay(fixtures().join("webapp-overlay"));
    let server = serve(context, 18_500);
    let client = WebClient::new().expect("client");

    let index = client.get_page(&url(&server, "/")).expect("index");
    assert_eq!(index.title().as_deref(), Some("Webrig Test Shop"));

    let extra = client.get_page(&url(&server, "/extra.html")).expect("overlay page");
    assert!(extra.contains_text("Served from the test overlay."));

    let err = client
        .get_page(&url(&server, "/missing.html"))
        .expect_err("in neither directory");
    assert!(matches!(err, BrowserError::Status { status: 404, .. }), "got {err}");
}

#[test]
fn without_overlay_only_main_resources_are_served() {
    let server = serve(WebAppContext::new("/", fixtures().join("webapp")), 18_520);
    let client = WebClient::new().expect("client");

    let err = client
        .get_page(&url(&server, "/extra.html"))
        .expect_err("overlay not configured");
    assert!(matches!(err, BrowserError::Status { status: 404, .. }));
}

#[test]
fn application_is_mounted_at_the_context_path() {
    let server = serve(WebAppContext::new("shop-app/", fixtures().join("webapp")), 18_540);
    let client = WebClient::new().expect("client");

    let catalog = client
        .get_page(&url(&server, "/shop-app/shop/catalog.html"))
        .expect("catalog under context path");
    assert_eq!(catalog.title().as_deref(), Some("Catalog"));

    assert!(client.get_page(&url(&server, "/shop/catalog.html")).is_err());
}

#[test]
fn dynamic_routes_take_precedence_over_files() {
    let routes = Router::new()
        .route("/index.html", get(|| async { "generated index" }))
        .route("/health", get(|| async { "ok" }));
    let context = WebAppContext::new("/", fixtures().join("webapp")).with_routes(routes);
    let server = serve(context, 18_560);
    let client = WebClient::new().expect("client");

    let index = client.get_page(&url(&server, "/index.html")).expect("index");
    assert_eq!(index.text(), "generated index");
    let health = client.get_page(&url(&server, "/health")).expect("health");
    assert_eq!(health.text(), "ok");
    let catalog = client
        .get_page(&url(&server, "/shop/catalog.html"))
        .expect("static files still served");
    assert_eq!(catalog.title().as_deref(), Some("Catalog"));
}

#[test]
fn default_builder_reads_the_webapp_section() {
    let mut config = webrig::config::HarnessConfig::default();
    config.webapp.root = fixtures().join("webapp");
    config.webapp.overlay = fixtures().join("webapp-overlay");
    config.webapp.context_path = "/app/".to_string();

    let context = DefaultContext.build_context(&config).expect("context");
    assert_eq!(context.context_path(), "/app");
    assert_eq!(context.root(), fixtures().join("webapp").as_path());
    assert_eq!(
        context.overlay(),
        Some(fixtures().join("webapp-overlay").as_path())
    );
}
