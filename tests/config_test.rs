use findata::Config;

// Env-var mutations are process-global, so the scenarios run inside one test
#[test]
fn test_config_without_keys_and_with_overrides() {
    for var in [
        "ALPHA_VANTAGE_API_KEY",
        "NEWS_API_KEY",
        "FRED_API_KEY",
        "ETHERSCAN_API_KEY",
        "GLASSNODE_API_KEY",
        "SEC_USER_AGENT",
        "FINDATA_HTTP_TIMEOUT_SECONDS",
    ] {
        std::env::remove_var(var);
    }

    // No keys at all is a valid configuration: keyless providers stay on
    let config = Config::load().expect("loads without any keys");
    assert!(config.apis.alpha_vantage_api_key.is_none());
    assert!(config.apis.news_api_key.is_none());
    assert!(config.apis.sec_user_agent.contains("findata"));
    assert_eq!(config.http.timeout_seconds, 15);

    let enabled = config.enabled_providers();
    assert!(enabled.contains(&"yahoo"));
    assert!(enabled.contains(&"sec_edgar"));
    assert!(!enabled.contains(&"alpha_vantage"));
    assert!(!enabled.contains(&"fred"));

    // Keys flip their providers on
    std::env::set_var("FRED_API_KEY", "test-key");
    std::env::set_var("SEC_USER_AGENT", "example-agent admin@example.com");
    let config = Config::load().expect("loads with keys");
    assert!(config.enabled_providers().contains(&"fred"));
    assert_eq!(config.apis.sec_user_agent, "example-agent admin@example.com");

    // A malformed timeout is a load error, not a silent default
    std::env::set_var("FINDATA_HTTP_TIMEOUT_SECONDS", "soon");
    let result = Config::load();
    assert!(result.is_err());
    let message = format!("{:#}", result.expect_err("invalid timeout"));
    assert!(message.contains("FINDATA_HTTP_TIMEOUT_SECONDS"));

    std::env::remove_var("FRED_API_KEY");
    std::env::remove_var("SEC_USER_AGENT");
    std::env::remove_var("FINDATA_HTTP_TIMEOUT_SECONDS");
}
