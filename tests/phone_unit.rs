use edu_platform::api::phone::check;
use edu_platform::phone::{find_by_dial_code, find_by_iso, format_international, normalize, validate, PhoneError};

#[test]
fn us_number_is_formatted() {
    assert_eq!(validate("US", "(415) 555-0123").unwrap(), "+14155550123");
    assert_eq!(format_international("us", "415.555.0123").unwrap(), "+1 (415) 555-0123");
    assert_eq!(validate("US", "1 415 555 0123").unwrap(), "+14155550123");
}

#[test]
fn us_area_code_cannot_start_with_one() {
    assert!(matches!(validate("US", "123-555-0123"), Err(PhoneError::InvalidPattern(_))));
}

#[test]
fn trunk_zero_is_dropped() {
    assert_eq!(validate("GB", "07911 123456").unwrap(), "+447911123456");
    assert_eq!(validate("GB", "+44 7911 123456").unwrap(), "+447911123456");
}

#[test]
fn dial_code_must_match_country() {
    assert!(matches!(
        validate("GB", "+1 415 555 0123"),
        Err(PhoneError::DialCodeMismatch("GB"))
    ));
}

#[test]
fn length_is_checked() {
    assert!(matches!(
        validate("IN", "98765"),
        Err(PhoneError::InvalidLength { min: 10, max: 10, got: 5 })
    ));
    assert!(matches!(validate("IN", "5876543210"), Err(PhoneError::InvalidPattern(_))));
    assert_eq!(validate("IN", "9876543210").unwrap(), "+919876543210");
}

#[test]
fn normalize_rewrites_double_zero_prefix() {
    assert_eq!(normalize("0044 20 7946 0958").unwrap(), "+442079460958");
    assert!(matches!(normalize("  "), Err(PhoneError::Empty)));
    assert!(matches!(normalize("555-CALL"), Err(PhoneError::InvalidCharacters)));
}

#[test]
fn lookups_by_iso_and_dial_code() {
    assert_eq!(find_by_iso(" de ").map(|c| c.dial_code), Some("49"));
    assert!(find_by_iso("ZZ").is_none());
    assert_eq!(find_by_dial_code("+4930123456").map(|c| c.iso), Some("DE"));
    assert_eq!(find_by_dial_code("+14155550123").map(|c| c.iso), Some("US"));
}

#[test]
fn check_reports_errors_without_failing() {
    let good = check("US", "415 555 0123");
    assert!(good.valid);
    assert_eq!(good.e164.as_deref(), Some("+14155550123"));

    let bad = check("XX", "415 555 0123");
    assert!(!bad.valid);
    assert!(bad.error.is_some());
}

#[test]
fn bracketed_trunk_zero_is_dropped_after_dial_code() {
    assert_eq!(normalize("+44 (0)7911 123456").unwrap(), "+447911123456");
    assert_eq!(validate("GB", "+44 (0)7911 123456").unwrap(), "+447911123456");
    assert_eq!(validate("GB", "0044 (0)20 7946 0958").unwrap(), "+442079460958");
}

#[test]
fn gb_mobile_needs_ten_digits() {
    assert!(matches!(validate("GB", "0791 123456"), Err(PhoneError::InvalidPattern(_))));
    assert_eq!(validate("GB", "020 7946 095").unwrap(), "+44207946095");
}

#[test]
fn canada_follows_north_american_rules() {
    assert_eq!(validate("CA", "(604) 555-0199").unwrap(), "+16045550199");
    assert_eq!(format_international("CA", "+1 604 555 0199").unwrap(), "+1 (604) 555-0199");
    assert!(matches!(validate("CA", "604 155 0199"), Err(PhoneError::InvalidPattern(_))));
    assert!(matches!(validate("CA", "104 555 0199"), Err(PhoneError::InvalidPattern(_))));
}
