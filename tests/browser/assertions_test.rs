//! Coverage for the page assertion helpers on parsed pages.

use url::Url;
use webrig::assertions::{
    assert_error_text_not_present, assert_error_text_present, assert_text_not_present,
    assert_text_present, assert_xpath_not_present, assert_xpath_present, DEFAULT_ERROR_TEXT,
};
use webrig::browser::Page;

fn page(body: &str) -> Page {
    let url = Url::parse("http://localhost:8180/form.html").expect("url");
    Page::parse(url, 200, Some("text/html".to_string()), body)
}

#[test]
fn banner_is_matched_across_markup_and_whitespace() {
    let page = page(
        "<div class=\"errors\">You must <b>correct</b> the following\n errors before continuing</div>",
    );
    assert_error_text_present(&page);
}

#[test]
fn text_assertions() {
    let page = page("<p>Order   placed</p><script>alert('Order failed')</script>");
    assert_text_present(&page, "Order placed");
    assert_text_not_present(&page, "Order failed");
    assert_error_text_not_present(&page);
}

#[test]
#[should_panic(expected = "Text IS present")]
fn unexpected_banner_fails() {
    assert_error_text_not_present(&page(&format!("<p>{DEFAULT_ERROR_TEXT}</p>")));
}

#[test]
#[should_panic(expected = "Text not present: 'Thank you'")]
fn missing_text_fails() {
    assert_text_present(&page("<p>Sorry</p>"), "Thank you");
}

#[test]
fn xpath_assertions_use_structure() {
    let page = page(
        "<form name='f'><input name='a' value='1'><input name='b' type='hidden'></form>",
    );
    assert_xpath_present(&page, "//form[@name='f']/input[@name='a']");
    assert_xpath_present(&page, "//input[@type='hidden' and @name='b']");
    assert_xpath_present(&page, "//input[2]");
    assert_xpath_not_present(&page, "//input[3]");
    assert_xpath_not_present(&page, "//select");
}

#[test]
#[should_panic(expected = "XPath not present: //select")]
fn missing_xpath_fails() {
    assert_xpath_present(&page("<p>x</p>"), "//select");
}

#[test]
#[should_panic(expected = "XPath IS present: //p")]
fn present_xpath_fails() {
    assert_xpath_not_present(&page("<p>x</p>"), "//p");
}
