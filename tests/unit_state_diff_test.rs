use browsergate::core::state_diff::StateDiff;
use browsergate::driver::DomSignature;

fn signature(url: &str, title: &str, count: u64, hash: u64) -> DomSignature {
    DomSignature {
        url: url.to_string(),
        title: title.to_string(),
        element_count: count,
        structure_hash: hash,
    }
}

#[test]
fn test_identical_snapshots_show_no_change() {
    let a = signature("https://example.com/", "Example", 12, 99);
    let diff = StateDiff::between(&a, &a.clone());
    assert!(!diff.url_changed);
    assert!(!diff.title_changed);
    assert!(!diff.dom_changed);
    assert!(!diff.changed());
}

#[test]
fn test_url_change_detected() {
    let before = signature("https://example.com/", "Example", 12, 99);
    let after = signature("https://example.com/next", "Example", 12, 99);
    let diff = StateDiff::between(&before, &after);
    assert!(diff.url_changed);
    assert!(!diff.title_changed);
    assert!(diff.changed());
    assert_eq!(diff.current_url, "https://example.com/next");
}

#[test]
fn test_structure_hash_change_detected() {
    let before = signature("https://example.com/", "Example", 12, 99);
    let after = signature("https://example.com/", "Example", 12, 100);
    let diff = StateDiff::between(&before, &after);
    assert!(!diff.url_changed);
    assert!(diff.dom_changed);
}

#[test]
fn test_element_count_change_detected() {
    let before = signature("https://example.com/", "Example", 12, 99);
    let after = signature("https://example.com/", "Example", 13, 99);
    let diff = StateDiff::between(&before, &after);
    assert!(diff.dom_changed);
    assert!(diff.changed());
}
