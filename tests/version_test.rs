#[test]
fn app_version_extends_package_version() {
    let version = env!("APP_VERSION");
    assert!(version.starts_with(env!("CARGO_PKG_VERSION")), "{}", version);
    if !version.contains("-nightly") {
        assert_eq!(version, env!("CARGO_PKG_VERSION"));
    }
}
