mod common;

use alpharag::application::fallback::{FailureKind, FallbackChain, ProviderRegistry};
use alpharag::config::AppConfig;
use alpharag::domain::error::{ConstructionError, ProviderError};
use alpharag::domain::ports::market_data_provider::DataProvider;
use alpharag::infrastructure::llm::llm_provider_registry;
use alpharag::infrastructure::providers::{data_provider_registry, MOCK_PROVIDER};
use common::{setup, StubData};
use std::sync::Arc;

#[tokio::test]
async fn test_unavailable_then_failing_then_mock() {
    let dir = tempfile::tempdir().unwrap();
    let a = StubData::new("a", false, false, 1.0);
    let b = StubData::new("b", true, true, 2.0);
    let app = setup(dir.path(), vec![a.clone(), b.clone()], vec![]);

    let outcome = app.current_price("RELIANCE").await;

    assert_eq!(outcome.provider_used, MOCK_PROVIDER);
    assert!(outcome.degraded);
    assert_eq!(a.calls(), 0, "unavailable provider must not be invoked");
    assert_eq!(b.calls(), 1);
    assert_eq!(outcome.attempts.len(), 2);
    assert_eq!(outcome.attempts[0].failure, FailureKind::Unavailable);
    assert!(matches!(outcome.attempts[1].failure, FailureKind::OperationFailed(_)));
    assert!((outcome.value.price - 2847.65).abs() < 1e-9);
}

#[tokio::test]
async fn test_first_success_short_circuits() {
    let dir = tempfile::tempdir().unwrap();
    let a = StubData::new("a", true, false, 10.0);
    let b = StubData::new("b", true, false, 20.0);
    let app = setup(dir.path(), vec![a.clone(), b.clone()], vec![]);

    let outcome = app.company_info("TCS").await;

    assert_eq!(outcome.provider_used, "a");
    assert!(!outcome.degraded);
    assert!(outcome.attempts.is_empty());
    assert_eq!(a.calls(), 1);
    assert_eq!(b.calls(), 0);
    assert_eq!(b.probes(), 0);
}

#[tokio::test]
async fn test_later_provider_used_when_earlier_fail() {
    let dir = tempfile::tempdir().unwrap();
    let a = StubData::new("a", true, true, 10.0);
    let b = StubData::new("b", true, false, 20.0);
    let app = setup(dir.path(), vec![a.clone(), b.clone()], vec![]);

    let outcome = app.historical_data("TCS", Default::default()).await;

    assert_eq!(outcome.provider_used, "b");
    assert_eq!(outcome.value[0].close, 20.0);
    assert_eq!(a.calls(), 1);
}

#[test]
fn test_build_rejects_empty_and_unknown_chains() {
    let config = AppConfig::default();
    let registry = data_provider_registry();

    let empty = FallbackChain::build(&[], &registry, &config, MOCK_PROVIDER);
    assert!(matches!(empty, Err(ConstructionError::EmptyChain)));

    let chain = vec!["yahoo".to_string(), "bloomberg".to_string()];
    let unknown = FallbackChain::build(&chain, &registry, &config, MOCK_PROVIDER);
    assert!(matches!(unknown, Err(ConstructionError::UnknownProvider(name)) if name == "bloomberg"));
}

#[test]
fn test_build_skips_providers_without_credentials() {
    let config = AppConfig::default();
    let chain = vec!["yahoo".to_string(), "alpha_vantage".to_string(), "upstox".to_string(), "mock".to_string()];
    let built = FallbackChain::build(&chain, &data_provider_registry(), &config, MOCK_PROVIDER).unwrap();
    assert_eq!(built.chain_names(), vec!["yahoo", "mock"]);

    let llm_chain = vec!["gemini".to_string(), "gpt".to_string(), "claude".to_string()];
    let built = FallbackChain::build(&llm_chain, &llm_provider_registry(), &config, "emergency_rules").unwrap();
    assert_eq!(built.chain_names(), vec!["emergency_rules"]);
}

#[test]
fn test_build_with_credentials_keeps_order() {
    let mut config = AppConfig::default();
    config.upstox.access_token = Some("token".into());
    config.alpha_vantage.api_key = Some("key".into());
    let chain = vec!["upstox".to_string(), "alpha_vantage".to_string(), "yahoo".to_string()];
    let built = FallbackChain::build(&chain, &data_provider_registry(), &config, MOCK_PROVIDER).unwrap();
    assert_eq!(built.chain_names(), vec!["upstox", "alpha_vantage", "yahoo", "mock"]);
    assert_eq!(built.descriptors().len(), 3);
}

#[test]
fn test_registry_factory_errors_are_skipped() {
    let registry: ProviderRegistry<dyn DataProvider, ()> = ProviderRegistry::new()
        .register("broken", |_: &()| Err(ProviderError::failed("broken", "no config")))
        .register("ok", |_: &()| Ok(StubData::new("ok", true, false, 1.0) as Arc<dyn DataProvider>));

    let chain = vec!["broken".to_string(), "ok".to_string()];
    let built = FallbackChain::build(&chain, &registry, &(), MOCK_PROVIDER).unwrap();
    assert_eq!(built.chain_names(), vec!["ok", "mock"]);
}

#[tokio::test]
async fn test_health_reports_every_tier() {
    let dir = tempfile::tempdir().unwrap();
    let a = StubData::new("a", false, false, 1.0);
    let app = setup(dir.path(), vec![a], vec![]);

    let report = app.health().await;
    assert_eq!(report.data_chain, vec!["a", "mock"]);
    assert_eq!(report.data_providers.len(), 2);
    assert!(!report.data_providers[0].healthy);
    assert!(report.data_providers[1].healthy);
    assert_eq!(report.llm_chain, vec!["emergency_rules"]);
}

#[test]
fn test_descriptors_report_settings_without_secrets() {
    let mut config = AppConfig::default();
    config.alpha_vantage.api_key = Some("av-secret".into());
    config.gpt.api_key = Some("sk-secret".into());

    let data = vec!["alpha_vantage".to_string(), "yahoo".to_string()];
    let built = FallbackChain::build(&data, &data_provider_registry(), &config, MOCK_PROVIDER).unwrap();
    let descriptors = built.descriptors();
    assert_eq!(descriptors[0].name, "alpha_vantage");
    assert_eq!(descriptors[0].config["base_url"], "https://www.alphavantage.co");
    assert_eq!(descriptors[0].config["min_interval"], "12s");
    assert_eq!(descriptors[1].config["base_url"], "https://query1.finance.yahoo.com");

    let llm = vec!["gpt".to_string()];
    let built = FallbackChain::build(&llm, &llm_provider_registry(), &config, "emergency_rules").unwrap();
    let gpt = &built.descriptors()[0];
    assert_eq!(gpt.config["model"], "gpt-4o-mini");
    assert_eq!(gpt.config["max_tokens"], "4000");

    for d in descriptors.iter().chain([gpt]) {
        assert!(d.config.values().all(|v| !v.contains("secret")), "{} leaks a key", d.name);
    }
}
