mod common;

use alpharag::domain::entities::market::HistoryPeriod;
use alpharag::infrastructure::providers::MOCK_PROVIDER;
use common::{setup, StubData};

#[tokio::test]
async fn test_live_quote_cached_until_ttl() {
    let dir = tempfile::tempdir().unwrap();
    let a = StubData::new("a", true, false, 101.5);
    let app = setup(dir.path(), vec![a.clone()], vec![]);

    let first = app.current_price("TCS").await;
    let second = app.current_price("tcs.ns").await;

    assert!(!first.cached);
    assert!(second.cached);
    assert_eq!(second.provider_used, "a");
    assert_eq!(second.value.price, 101.5);
    assert_eq!(a.calls(), 1);
}

#[tokio::test]
async fn test_mock_results_not_cached() {
    let dir = tempfile::tempdir().unwrap();
    let a = StubData::new("a", true, true, 1.0);
    let app = setup(dir.path(), vec![a.clone()], vec![]);

    let first = app.company_info("INFY").await;
    let second = app.company_info("INFY").await;

    assert_eq!(first.provider_used, MOCK_PROVIDER);
    assert!(!second.cached);
    assert_eq!(first.value.name, "Infosys Limited");
    assert_eq!(a.calls(), 2);
}

#[tokio::test]
async fn test_bulk_fetches_only_uncached() {
    let dir = tempfile::tempdir().unwrap();
    let a = StubData::new("a", true, false, 10.0);
    let app = setup(dir.path(), vec![a.clone()], vec![]);

    app.current_price("TCS").await;
    let quotes = app
        .current_prices(&["TCS".to_string(), "INFY".to_string(), "TCS".to_string()])
        .await;

    assert_eq!(quotes.len(), 2);
    assert!(quotes["TCS"].cached);
    assert!(!quotes["INFY"].cached);
    assert_eq!(a.calls(), 2);
}

#[tokio::test]
async fn test_history_cached_per_period() {
    let dir = tempfile::tempdir().unwrap();
    let a = StubData::new("a", true, false, 10.0);
    let app = setup(dir.path(), vec![a.clone()], vec![]);

    app.historical_data("TCS", HistoryPeriod::OneMonth).await;
    let again = app.historical_data("TCS", HistoryPeriod::OneMonth).await;
    let other = app.historical_data("TCS", HistoryPeriod::OneYear).await;

    assert!(again.cached);
    assert_eq!(again.provider_used, "a");
    assert!(!other.cached);
    assert_eq!(a.calls(), 2);
}

#[tokio::test]
async fn test_mock_history_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let app = setup(dir.path(), vec![], vec![]);

    let a = app.historical_data("NEWCO", HistoryPeriod::ThreeMonths).await;
    let b = app.historical_data("NEWCO", HistoryPeriod::ThreeMonths).await;

    assert!(a.degraded);
    assert_eq!(a.value, b.value);
}
