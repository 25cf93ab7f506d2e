//! Page assertions for functional tests.
//!
//! Every helper panics with a descriptive message on failure, reporting the
//! caller's location.

use crate::browser::Page;

/// Banner the application renders when a submitted form fails validation.
pub const DEFAULT_ERROR_TEXT: &str = "You must correct the following errors before continuing";

#[track_caller]
fn xpath_matches(page: &Page, xpath: &str) -> bool {
    match page.evaluate_xpath(xpath) {
        Ok(value) => value.is_present(),
        Err(e) => panic!("invalid XPath '{xpath}': {e}"),
    }
}

/// Assert that `xpath` selects at least one node of `page`.
///
/// A boolean expression such as `count(//tr) > 2` must be true; a number or
/// string result always counts as present.
///
/// # Panics
///
/// If nothing matches or `xpath` does not parse.
#[track_caller]
pub fn assert_xpath_present(page: &Page, xpath: &str) {
    assert!(xpath_matches(page, xpath), "XPath not present: {xpath}");
}

/// Assert that `xpath` selects nothing in `page`, or is a false boolean.
///
/// # Panics
///
/// If something matches or `xpath` does not parse.
#[track_caller]
pub fn assert_xpath_not_present(page: &Page, xpath: &str) {
    assert!(!xpath_matches(page, xpath), "XPath IS present: {xpath}");
}

/// Assert that the visible text of `page` contains `text`.
///
/// # Panics
///
/// If the text is absent.
#[track_caller]
pub fn assert_text_present(page: &Page, text: &str) {
    assert!(
        page.contains_text(text),
        "Text not present: '{text}' on page {page}"
    );
}

/// Assert that the visible text of `page` does not contain `text`.
///
/// # Panics
///
/// If the text is present.
#[track_caller]
pub fn assert_text_not_present(page: &Page, text: &str) {
    assert!(
        !page.contains_text(text),
        "Text IS present: '{text}' on page {page}"
    );
}

/// Assert that `page` shows the validation error banner.
///
/// # Panics
///
/// If [`DEFAULT_ERROR_TEXT`] is absent.
#[track_caller]
pub fn assert_error_text_present(page: &Page) {
    assert_text_present(page, DEFAULT_ERROR_TEXT);
}

/// Assert that `page` does not show the validation error banner.
///
/// # Panics
///
/// If [`DEFAULT_ERROR_TEXT`] is present.
#[track_caller]
pub fn assert_error_text_not_present(page: &Page) {
    assert_text_not_present(page, DEFAULT_ERROR_TEXT);
}
