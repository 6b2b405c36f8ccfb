use alpharag::application::ingest_portfolio::PortfolioIngester;
use alpharag::domain::entities::holding::DropReason;
use alpharag::domain::error::IngestError;
use alpharag::domain::values::portfolio_schema::PortfolioSchema;
use chrono::NaiveDate;
use std::io::Write;
use std::path::Path;

fn write_csv(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(body.as_bytes()).unwrap();
    path
}

#[test]
fn test_manual_file_drops_bad_row() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(
        dir.path(),
        "manual.csv",
        "symbol,quantity,buy_price,purchase_date\nRELIANCE.NS,10,2500.0,2024-01-15\nBADROW,0,0,\n",
    );

    let loaded = PortfolioIngester::load(&path).unwrap();

    assert_eq!(loaded.schema, PortfolioSchema::Manual);
    assert_eq!(loaded.holdings.len(), 1);
    let h = &loaded.holdings[0];
    assert_eq!(h.symbol, "RELIANCE.NS");
    assert_eq!(h.quantity, 10.0);
    assert_eq!(h.buy_price, 2500.0);
    assert_eq!(h.purchase_date, NaiveDate::from_ymd_opt(2024, 1, 15));

    assert_eq!(loaded.dropped.len(), 1);
    assert_eq!(loaded.dropped[0].row, 2);
    assert_eq!(loaded.dropped[0].raw_symbol.as_deref(), Some("BADROW"));
    assert_eq!(loaded.dropped[0].reason, DropReason::NonPositiveQuantity(0.0));

    assert_eq!(loaded.summary.holding_count, 1);
    assert_eq!(loaded.summary.total_invested, 25_000.0);
    assert_eq!(loaded.summary.base_symbols, vec!["RELIANCE"]);
}

#[test]
fn test_broker_export_normalized() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(
        dir.path(),
        "holdings.csv",
        "\"Instrument\",\"Qty.\",\"Avg. cost\",\"LTP\",\"Invested\",\"Cur. val\",\"P&L\",\"Net chg.\",\"Day chg.\",\"\"\n\
         \"INFY\",\"12\",\"1,400.50\",\"1,532.25\",\"16806\",\"18387\",\"1581\",\"9.4\",\"0.2\",\"\"\n\
         \"M&M\",\"3\",\"1600\",\"1725.9\",\"4800\",\"5177.7\",\"377.7\",\"7.8\",\"-0.1\",\"\"\n\
         \"\",\"\",\"\",\"\",\"\",\"\",\"\",\"\",\"\",\"\"\n",
    );

    let loaded = PortfolioIngester::load(&path).unwrap();

    assert_eq!(loaded.schema, PortfolioSchema::Upstox);
    assert_eq!(loaded.summary.symbols, vec!["INFY.NS", "M&M.NS"]);
    assert_eq!(loaded.holdings[0].buy_price, 1400.5);
    assert_eq!(loaded.holdings[1].current_price, Some(1725.9));
    assert!(loaded.dropped.is_empty());
}

#[test]
fn test_reordered_headers_detect_same_schema() {
    let a = PortfolioIngester::load_from_reader("symbol,quantity,buy_price\nTCS,1,3000\n".as_bytes()).unwrap();
    let b = PortfolioIngester::load_from_reader("buy_price,symbol,quantity\n3000,TCS,1\n".as_bytes()).unwrap();
    assert_eq!(a.schema, b.schema);
    assert_eq!(a.holdings, b.holdings);
}

#[test]
fn test_flexible_manual_spellings() {
    let csv = "Stock,Shares,Cost\n\"₹ infy \",\"1,000\",\"₹1,500\"\nwipro,abc,400\nhdfcbank,5,-1\n";
    let loaded = PortfolioIngester::load_from_reader(csv.as_bytes());
    // "Stock/Shares/Cost" carry no manual indicator, so the table is rejected
    assert!(matches!(loaded, Err(IngestError::SchemaUnrecognized { .. })));

    let csv = "symbol,qty,buy_price\n\"₹ infy \",\"1,000\",\"₹1,500\"\nwipro,abc,400\nhdfcbank,5,-1\n";
    let loaded = PortfolioIngester::load_from_reader(csv.as_bytes()).unwrap();
    assert_eq!(loaded.holdings.len(), 1);
    assert_eq!(loaded.holdings[0].symbol, "INFY.NS");
    assert_eq!(loaded.holdings[0].quantity, 1000.0);
    assert_eq!(loaded.dropped[0].reason, DropReason::MissingQuantity);
    assert_eq!(loaded.dropped[1].reason, DropReason::NonPositivePrice(-1.0));
}

#[test]
fn test_zero_valid_rows_is_fatal() {
    let err = PortfolioIngester::load_from_reader("symbol,quantity,buy_price\nX,0,10\n,5,10\n".as_bytes()).unwrap_err();
    assert!(matches!(err, IngestError::EmptyAfterValidation { dropped: 2 }));
}

#[test]
fn test_missing_file_is_unreadable() {
    let dir = tempfile::tempdir().unwrap();
    let err = PortfolioIngester::load(&dir.path().join("nope.csv")).unwrap_err();
    assert!(matches!(err, IngestError::Unreadable { .. }));
}

#[test]
fn test_undecodable_row_is_dropped() {
    let mut body = b"symbol,quantity,buy_price\nRELIANCE.NS,10,2500\n".to_vec();
    body.extend_from_slice(b"SOCI\xE9TE,5,100\n");
    body.extend_from_slice(b"TCS,2,3000\n");

    let loaded = PortfolioIngester::load_from_reader(&body[..]).unwrap();

    assert_eq!(loaded.summary.symbols, vec!["RELIANCE.NS", "TCS.NS"]);
    assert_eq!(loaded.dropped.len(), 1);
    assert_eq!(loaded.dropped[0].row, 2);
    assert!(loaded.dropped[0].raw_symbol.is_none());
    assert!(matches!(loaded.dropped[0].reason, DropReason::Malformed(_)));
}
