use backup_orchestrator::backup::calendar::{Date, TODAY_OVERRIDE_ENV};

// Kept in its own test binary since it changes the process environment
#[test]
fn test_today_override() {
    std::env::set_var(TODAY_OVERRIDE_ENV, "2024-02-29");
    assert_eq!(Date::today().unwrap(), Date::new(2024, 2, 29).unwrap());

    std::env::set_var(TODAY_OVERRIDE_ENV, "2023-02-29");
    let err = Date::today().unwrap_err();
    assert!(err.is_fatal());

    std::env::remove_var(TODAY_OVERRIDE_ENV);
    assert!(Date::today().is_ok());
}
