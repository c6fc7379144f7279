use prtimer_config::EngineConfig;

#[test]
fn init_logging_uses_telemetry_settings_once() {
    let mut config = EngineConfig::default();
    config.telemetry.log_filter = "prtimer_engine=debug".to_string();

    assert!(prtimer_engine::init_logging(&config).is_ok());
    assert!(prtimer_engine::init_logging(&config).is_err());
}
