use app_config::AppConfig;

#[test]
fn test_load_default_config() {
    let cfg = AppConfig::load().unwrap();
    assert_eq!(cfg.db_port, 5432);
    assert_eq!(cfg.tax_rate_bps, 1000);
    assert_eq!(cfg.delivery_fee_cents, 500);
}
