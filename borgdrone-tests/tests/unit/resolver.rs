//! Unit tests for target selection

use borgdrone::config::{parse_config, resolve_targets, ResolutionError, TargetSpec};
use rstest::rstest;
use test_utils::sample_config_yaml;

fn sorted_names(archive: &str, store: &str) -> Vec<String> {
    let config = parse_config(sample_config_yaml()).unwrap();
    let mut names: Vec<String> = resolve_targets(&config, archive, store)
        .unwrap()
        .into_iter()
        .map(|t| t.name.clone())
        .collect();
    names.sort();
    names
}

#[rstest]
#[case("", "", vec!["docs:usb", "photos:nas", "photos:usb"])]
#[case("photos", "", vec!["photos:nas", "photos:usb"])]
#[case("", "usb", vec!["docs:usb", "photos:usb"])]
#[case("docs", "usb", vec!["docs:usb"])]
fn test_filters(#[case] archive: &str, #[case] store: &str, #[case] expected: Vec<&str>) {
    assert_eq!(sorted_names(archive, store), expected);
}

#[test]
fn test_no_match_is_resolution_error() {
    let config = parse_config(sample_config_yaml()).unwrap();
    assert_eq!(
        resolve_targets(&config, "missing", "x").unwrap_err(),
        ResolutionError::NoMatchingTarget {
            archive: "missing".to_string(),
            store: "x".to_string()
        }
    );
}

#[test]
fn test_resolution_is_stable() {
    let config = parse_config(sample_config_yaml()).unwrap();
    let first = resolve_targets(&config, "", "").unwrap();
    let second = resolve_targets(&config, "", "").unwrap();
    assert_eq!(first, second);
}

#[rstest]
#[case("photos:usb", true)]
#[case(":usb", false)]
#[case("photos:", false)]
#[case(":", false)]
fn test_spec_single(#[case] input: &str, #[case] single: bool) {
    let spec: TargetSpec = input.parse().unwrap();
    assert_eq!(spec.is_single(), single);
    assert_eq!(spec.require_single().is_ok(), single);
}

#[rstest]
#[case("photos")]
#[case("a:b:c")]
#[case("")]
fn test_spec_rejects_malformed(#[case] input: &str) {
    assert!(matches!(
        input.parse::<TargetSpec>(),
        Err(ResolutionError::InvalidTargetSpec(_))
    ));
}
