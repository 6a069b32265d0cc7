use browsergate::core::sanitize::{RejectionCategory, Sanitizer};

fn strict() -> Sanitizer {
    Sanitizer::new(false)
}

#[test]
fn test_clean_inputs_pass() {
    let sanitizer = strict();
    assert!(sanitizer.screen("div#main > p.lead").is_ok());
    assert!(sanitizer.screen("button[type=submit]").is_ok());
    assert!(sanitizer.screen("ordinary search text").is_ok());
}

#[test]
fn test_inline_event_handler_rejected() {
    let err = strict().screen("a onclick=alert(1)").unwrap_err();
    assert_eq!(err.category, RejectionCategory::InlineEventHandler);

    let err = strict().screen("img onerror = steal()").unwrap_err();
    assert_eq!(err.category, RejectionCategory::InlineEventHandler);
}

#[test]
fn test_script_tag_rejected() {
    let err = strict().screen("<script>alert(1)</script>").unwrap_err();
    assert_eq!(err.category, RejectionCategory::ScriptTag);

    // Whitespace after the angle bracket must not slip through.
    let err = strict().screen("< script src=x>").unwrap_err();
    assert_eq!(err.category, RejectionCategory::ScriptTag);
}

#[test]
fn test_javascript_scheme_rejected() {
    let err = strict().screen("javascript:alert(document.cookie)").unwrap_err();
    assert_eq!(err.category, RejectionCategory::JavascriptScheme);

    let err = strict().screen("JaVaScRiPt : void(0)").unwrap_err();
    assert_eq!(err.category, RejectionCategory::JavascriptScheme);
}

#[test]
fn test_data_html_payload_rejected() {
    let err = strict()
        .screen("data:text/html,<h1>payload</h1>")
        .unwrap_err();
    assert_eq!(err.category, RejectionCategory::DataHtmlPayload);
}

#[test]
fn test_css_expression_rejected() {
    let err = strict()
        .screen("width: expression(alert(1))")
        .unwrap_err();
    assert_eq!(err.category, RejectionCategory::CssExpression);
}

#[test]
fn test_oversized_input_rejected() {
    let huge = "a".repeat(5000);
    let err = strict().screen(&huge).unwrap_err();
    assert_eq!(err.category, RejectionCategory::Oversized);
}

#[test]
fn test_url_normalization() {
    let sanitizer = strict();
    let normalized = sanitizer.normalize_url("https://example.com").unwrap();
    // The url crate adds the root path.
    assert_eq!(normalized, "https://example.com/");

    assert!(sanitizer.normalize_url("http://example.com/a?b=c").is_ok());
}

#[test]
fn test_url_scheme_gate() {
    let strict = strict();
    let err = strict.normalize_url("file:///etc/passwd").unwrap_err();
    assert_eq!(err.category, RejectionCategory::DisallowedScheme);
    let err = strict.normalize_url("ftp://host/file").unwrap_err();
    assert_eq!(err.category, RejectionCategory::DisallowedScheme);

    let relaxed = Sanitizer::new(true);
    assert!(relaxed.normalize_url("file:///tmp/page.html").is_ok());
    // javascript: is an injection, never an allowed scheme.
    let err = relaxed.normalize_url("javascript:alert(1)").unwrap_err();
    assert_eq!(err.category, RejectionCategory::JavascriptScheme);
}

#[test]
fn test_malformed_url_rejected() {
    let err = strict().normalize_url("not a url at all").unwrap_err();
    assert_eq!(err.category, RejectionCategory::MalformedUrl);
}
