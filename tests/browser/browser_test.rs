//! Coverage for the browser-emulation client against a live server.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, LazyLock};

use axum::extract::{Form as FormBody, Query};
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::HeaderMap;
use axum::response::{AppendHeaders, Html, IntoResponse};
use axum::routing::{get, post};
use axum::Router;
use webrig::assertions::{assert_text_present, assert_xpath_not_present, assert_xpath_present};
use webrig::browser::{BrowserError, WebClient, XPathValue};
use webrig::config::{BrowserConfig, HarnessConfig};
use webrig::fixture::{Container, FixtureScope};
use webrig::server::context::{ContextBuilder, WebAppContext};
use webrig::server::ServerError;

const ERROR_BANNER: &str = "You must correct the following errors before continuing";

/// Static shop plus a registration handler, a query echo and a cookie echo.
struct ShopContext;

impl ContextBuilder for ShopContext {
    fn build_context(&self, config: &HarnessConfig) -> Result<WebAppContext, ServerError> {
        let routes = Router::new()
            .route("/register", post(register))
            .route("/echo", get(echo))
            .route("/whoami", get(whoami));
        Ok(WebAppContext::from_config(&config.webapp)?.with_routes(routes))
    }
}

async fn register(FormBody(fields): FormBody<HashMap<String, String>>) -> impl IntoResponse {
    let user = fields.get("user").cloned().unwrap_or_default();
    if user.is_empty() {
        return (
            AppendHeaders([(SET_COOKIE, "user=; Path=/".to_string())]),
            Html(format!("<html><body><div class=\"errors\">{ERROR_BANNER}</div></body></html>")),
        );
    }

    let mut keys: Vec<&String> = fields.keys().collect();
    keys.sort();
    let items: String = keys
        .into_iter()
        .map(|k| format!("<li id=\"{k}\">{}</li>", fields[k]))
        .collect();
    (
        AppendHeaders([(SET_COOKIE, format!("user={user}; Path=/"))]),
        Html(format!(
            "<html><body><h1>Welcome, {user}</h1><ul id=\"fields\">{items}</ul></body></html>"
        )),
    )
}

async fn echo(Query(params): Query<HashMap<String, String>>) -> Html<String> {
    let q = params.get("q").cloned().unwrap_or_default();
    Html(format!("<html><body><p id=\"q\">{q}</p></body></html>"))
}

async fn whoami(headers: HeaderMap) -> String {
    let user = headers
        .get(COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|cookies| {
            cookies
                .split(';')
                .find_map(|c| c.trim().strip_prefix("user="))
                .map(str::to_string)
        })
        .filter(|u| !u.is_empty());
    user.unwrap_or_else(|| "anonymous".to_string())
}

static SCOPE: LazyLock<FixtureScope> = LazyLock::new(|| {
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures");
    let mut config = HarnessConfig::default();
    config.server.default_port = 18_700;
    config.server.scan_width = 20;
    config.webapp.root = fixtures.join("webapp");
    config.webapp.overlay = fixtures.join("webapp-overlay");
    FixtureScope::with_builder(config, ShopContext)
});

fn container() -> Arc<Container> {
    webrig::logging::init_test();
    SCOPE.setup().expect("fixture starts")
}

fn home(container: &Container, client: &WebClient) -> webrig::browser::Page {
    client
        .get_page(container.base_uri().as_str())
        .expect("home page")
}

#[test]
fn home_page_is_parsed() {
    let container = container();
    let client = container.web_client().expect("client");
    let page = home(&container, &client);

    assert_eq!(page.status(), 200);
    assert_eq!(page.url(), container.base_uri());
    assert_eq!(page.title().as_deref(), Some("Webrig Test Shop"));
    assert!(page
        .content_type()
        .is_some_and(|ct| ct.starts_with("text/html")));
    assert_eq!(page.xpath("//ul[@id='menu']/li").expect("xpath").len(), 6);
    assert_text_present(&page, "Welcome to the shop");
    assert!(!page.contains_text("never run"));
}

#[test]
fn served_pages_answer_full_xpath_expressions() {
    let container = container();
    let client = container.web_client().expect("client");
    let page = home(&container, &client);

    assert_eq!(page.xpath("//li[position() > 4]//a").expect("xpath").len(), 2);
    assert_eq!(
        page.evaluate_xpath("count(//ul[@id='menu']/li)").expect("evaluates"),
        XPathValue::Number(6.0)
    );
    assert_eq!(
        page.evaluate_xpath("string((//a)[2]/@href)").expect("evaluates"),
        XPathValue::String("register.html".to_string())
    );
    assert_xpath_present(&page, "//h1/following::a[translate(., 'CATLOG', 'catlog') = 'catalog']");
    assert_xpath_present(&page, "string-length(//h1) = 19");
    assert_xpath_not_present(&page, "//a[substring-before(@href, '.') = 'checkout']");
    assert_xpath_not_present(&page, "count(//li) > 6");
}

#[test]
fn clicking_a_link_follows_its_href() {
    let container = container();
    let client = container.web_client().expect("client");
    let page = home(&container, &client);

    let catalog = client.click_link(&page, "Catalog").expect("catalog");
    assert_eq!(
        catalog.url().as_str(),
        container.url("shop/catalog.html").expect("url").as_str()
    );
    assert_xpath_present(&catalog, "//table[@id='products']//td[@class='name' and text()='Teapot']");
    assert_xpath_not_present(&catalog, "//td[text()='Toaster']");

    let back = client.click_link(&catalog, "Home").expect("back home");
    assert_eq!(back.title().as_deref(), Some("Webrig Test Shop"));
}

#[test]
fn overlay_pages_are_reachable() {
    let container = container();
    let client = container.web_client().expect("client");
    let extras = client
        .click_link(&home(&container, &client), "Extras")
        .expect("extras");
    assert_xpath_present(&extras, "//p[@id='extra']");
}

#[test]
fn missing_link_names_the_text() {
    let container = container();
    let client = container.web_client().expect("client");
    let page = home(&container, &client);

    let err = client.click_link(&page, "Log out").expect_err("no such link");
    assert!(matches!(err, BrowserError::LinkNotFound { .. }));
    assert!(err.to_string().contains("'Log out'"));
}

#[test]
fn broken_link_reports_the_failed_navigation() {
    let container = container();
    let client = container.web_client().expect("client");
    let page = home(&container, &client);

    let err = client.click_link(&page, "Broken link").expect_err("404");
    match err {
        BrowserError::Click { text, source, .. } => {
            assert_eq!(text, "Broken link");
            assert!(matches!(*source, BrowserError::Status { status: 404, .. }));
        }
        other => panic!("expected click failure, got {other}"),
    }
}

#[test]
fn error_statuses_can_be_returned_as_pages() {
    let container = container();
    let client = WebClient::with_options(&BrowserConfig {
        fail_on_error_status: false,
        ..BrowserConfig::default()
    })
    .expect("client");
    let page = client
        .fetch(container.url("missing.html").expect("url"))
        .expect("404 page");
    assert_eq!(page.status(), 404);
}

#[test]
fn click_button_by_id() {
    let container = container();
    let client = container.web_client().expect("client");
    let page = home(&container, &client);

    let same = client.click_button(&page, "top").expect("fragment link");
    assert_eq!(same.url(), page.url());

    let err = client.click_button(&page, "logout").expect_err("no such id");
    assert!(matches!(err, BrowserError::ElementNotFound { .. }));
    assert!(err.to_string().contains("'logout'"));

    let err = client.click_button(&page, "welcome").expect_err("a heading");
    assert!(matches!(err, BrowserError::NotClickable { ref tag, .. } if tag == "h1"));
}

#[test]
fn form_submission_carries_values() {
    let container = container();
    let client = container.web_client().expect("client");
    let register = client
        .click_link(&home(&container, &client), "Register")
        .expect("register page");

    let mut form = register.form_by_name("register").expect("register form");
    form.set_value("user", "ada").expect("user");
    form.set_value("email", "ada@example.test").expect("email");
    form.set_checked("newsletter", "yes", true).expect("newsletter");

    let welcome = client.click_form_button(&form, "Save").expect("submitted");
    assert_text_present(&welcome, "Welcome, ada");
    assert_xpath_present(&welcome, "//li[@id='email' and text()='ada@example.test']");
    assert_xpath_present(&welcome, "//li[@id='newsletter' and text()='yes']");
    assert_xpath_present(&welcome, "//li[@id='plan' and text()='free']");
    assert_xpath_present(&welcome, "//li[@id='action' and text()='Save']");
    assert_xpath_not_present(&welcome, "//li[@id='cancel']");
    container.assert_error_text_not_present(&welcome);
}

#[test]
fn invalid_submission_shows_the_error_banner() {
    let container = container();
    let client = container.web_client().expect("client");
    let register = client
        .get_page(container.url("register.html").expect("url").as_str())
        .expect("register page");

    let failed = client.click_button(&register, "save").expect("submitted");
    container.assert_error_text_present(&failed);
    webrig::assertions::assert_error_text_present(&failed);
}

#[test]
fn button_elements_are_found_by_name() {
    let container = container();
    let client = container.web_client().expect("client");
    let register = client
        .get_page(container.url("register.html").expect("url").as_str())
        .expect("register page");
    let mut form = register.form_by_name("register").expect("form");
    form.set_value("user", "grace").expect("user");

    let page = client.click_form_button(&form, "cancel").expect("cancel button");
    assert_xpath_present(&page, "//li[@id='cancel' and text()='1']");
    assert_xpath_not_present(&page, "//li[@id='action']");
}

#[test]
fn edited_form_is_submitted_by_button_id() {
    let container = container();
    let client = container.web_client().expect("client");
    let register = client
        .get_page(container.url("register.html").expect("url").as_str())
        .expect("register page");
    let mut form = register.form_by_name("register").expect("form");
    form.set_value("user", "ada").expect("user");

    let welcome = client
        .click_form_button_by_id(&form, "save")
        .expect("submitted");
    assert_text_present(&welcome, "Welcome, ada");
    assert_xpath_present(&welcome, "//li[@id='action' and text()='Save']");
    container.assert_error_text_not_present(&welcome);

    let err = client
        .click_form_button_by_id(&form, "delete")
        .expect_err("no such id");
    assert!(matches!(err, BrowserError::ControlNotFound { .. }));
    assert!(err.to_string().contains("'delete'"));
}

#[test]
fn plain_buttons_leave_the_page_as_is() {
    let container = container();
    let client = container.web_client().expect("client");
    let register = client
        .get_page(container.url("register.html").expect("url").as_str())
        .expect("register page");
    let mut form = register.form_by_name("register").expect("form");
    form.set_value("user", "ada").expect("user");

    let same = client.click_form_button(&form, "Preview").expect("clicked");
    assert_eq!(same.url(), register.url());
    assert!(std::ptr::eq(same.document(), register.document()));
    assert_text_present(&same, "Fill in every field.");

    let same = client.click_button(&register, "preview").expect("clicked by id");
    assert_eq!(same.url(), register.url());
}

#[test]
fn missing_button_names_the_value() {
    let container = container();
    let client = container.web_client().expect("client");
    let register = client
        .get_page(container.url("register.html").expect("url").as_str())
        .expect("register page");
    let form = register.form_by_name("register").expect("form");

    let err = client.click_form_button(&form, "Delete").expect_err("no such button");
    assert!(matches!(err, BrowserError::ButtonNotFound { .. }));
    assert!(err.to_string().contains("'Delete'"));
}

#[test]
fn get_forms_submit_in_the_query_string() {
    let container = container();
    let client = container.web_client().expect("client");
    let search = client
        .click_link(&home(&container, &client), "Search")
        .expect("search page");
    let mut form = search.form_by_name("search").expect("search form by id");
    form.set_value("q", "green tea").expect("q");

    let results = client.click_form_button(&form, "Go").expect("submitted");
    assert_eq!(results.url().path(), "/echo");
    assert_xpath_present(&results, "//p[@id='q' and text()='green tea']");
}

#[test]
fn cookies_persist_per_client() {
    let container = container();
    let client = container.web_client().expect("client");
    let register = client
        .get_page(container.url("register.html").expect("url").as_str())
        .expect("register page");
    let mut form = register.form_by_name("register").expect("form");
    form.set_value("user", "linus").expect("user");
    client.submit(&form, None).expect("submitted");

    let whoami = container.url("whoami").expect("url");
    let same = client.fetch(whoami.clone()).expect("same client");
    assert_eq!(same.text(), "linus");

    let other = container.web_client().expect("second client");
    assert_eq!(other.fetch(whoami).expect("fresh client").text(), "anonymous");
}
