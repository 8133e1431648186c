use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        SortlastError::configuration("x")
            .to_string()
            .contains("configuration error:")
    );
    assert!(
        SortlastError::collective("x")
            .to_string()
            .contains("collective error:")
    );
    assert!(
        SortlastError::transfer("x")
            .to_string()
            .contains("transfer error:")
    );
    assert!(SortlastError::render("x").to_string().contains("render error:"));
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = SortlastError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}

#[test]
fn only_group_level_failures_are_fatal_for_group() {
    assert!(SortlastError::collective("tag").is_fatal_for_group());
    assert!(SortlastError::transfer("short").is_fatal_for_group());
    assert!(!SortlastError::configuration("tiles").is_fatal_for_group());
    assert!(!SortlastError::render("len").is_fatal_for_group());
}
