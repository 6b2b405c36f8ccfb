//! Holdings ingestion for broker exports and hand-written files.

use crate::domain::entities::holding::{DropReason, DroppedRow, HoldingRow, LoadedPortfolio, PortfolioSummary};
use crate::domain::error::IngestError;
use crate::domain::values::portfolio_schema::PortfolioSchema;
use crate::domain::values::symbol::NormalizedSymbol;
use chrono::NaiveDate;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

const UPSTOX_INDICATORS: &[&str] = &["instrument", "qty.", "avg. cost", "ltp", "invested", "cur. val", "p&l"];
const MANUAL_INDICATORS: &[&str] = &["symbol", "quantity", "buy_price"];

/// Header spellings per logical field, tried in order.
struct FieldSpellings {
    symbol: &'static [&'static str],
    quantity: &'static [&'static str],
    buy_price: &'static [&'static str],
    current_price: &'static [&'static str],
    purchase_date: &'static [&'static str],
}

const UPSTOX_FIELDS: FieldSpellings = FieldSpellings {
    symbol: &["Instrument", "instrument"],
    quantity: &["Qty.", "Qty", "quantity"],
    buy_price: &["Avg. cost", "Avg cost", "avg_cost", "buy_price"],
    current_price: &["LTP", "ltp", "current_price"],
    purchase_date: &[],
};

const MANUAL_FIELDS: FieldSpellings = FieldSpellings {
    symbol: &["symbol", "instrument", "stock"],
    quantity: &["quantity", "qty", "shares"],
    buy_price: &["buy_price", "avg_cost", "cost", "price"],
    current_price: &["current_price", "ltp"],
    purchase_date: &["purchase_date", "date", "buy_date"],
};

/// Header positions for each logical field, resolved once per load.
#[derive(Debug, Default)]
struct ColumnMap {
    symbol: Option<usize>,
    quantity: Option<usize>,
    buy_price: Option<usize>,
    current_price: Option<usize>,
    purchase_date: Option<usize>,
}

/// Decides the table shape from its headers alone.
pub fn detect_schema<S: AsRef<str>>(headers: &[S]) -> PortfolioSchema {
    let columns: Vec<String> = headers
        .iter()
        .map(|h| h.as_ref().trim().trim_matches('"').to_lowercase())
        .collect();
    let matches = |indicators: &[&str]| {
        indicators
            .iter()
            .filter(|ind| columns.iter().any(|c| c.contains(*ind)))
            .count()
    };

    let upstox = matches(UPSTOX_INDICATORS);
    let manual = matches(MANUAL_INDICATORS);
    debug!(upstox, manual, "Schema indicator matches");

    if upstox >= 4 {
        PortfolioSchema::Upstox
    } else if manual >= 2 {
        PortfolioSchema::Manual
    } else if columns.len() >= 8 && columns.iter().any(|c| c.contains("instrument")) {
        PortfolioSchema::Upstox
    } else {
        PortfolioSchema::Unknown
    }
}

/// Exact spellings first (case-sensitive, then case-insensitive), then
/// substring containment.
fn resolve_column(headers: &[String], spellings: &[&str]) -> Option<usize> {
    spellings
        .iter()
        .find_map(|s| headers.iter().position(|h| h == s))
        .or_else(|| {
            spellings
                .iter()
                .find_map(|s| headers.iter().position(|h| h.eq_ignore_ascii_case(s)))
        })
        .or_else(|| {
            spellings.iter().find_map(|s| {
                let needle = s.to_lowercase();
                headers
                    .iter()
                    .position(|h| !h.is_empty() && h.to_lowercase().contains(&needle))
            })
        })
}

impl ColumnMap {
    fn resolve(headers: &[String], fields: &FieldSpellings) -> Self {
        Self {
            symbol: resolve_column(headers, fields.symbol),
            quantity: resolve_column(headers, fields.quantity),
            buy_price: resolve_column(headers, fields.buy_price),
            current_price: resolve_column(headers, fields.current_price),
            purchase_date: resolve_column(headers, fields.purchase_date),
        }
    }
}

/// Strips thousands separators, currency signs and whitespace.
pub fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, ',' | '₹' | '$' | '"') && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn field<'r>(record: &'r csv::StringRecord, column: Option<usize>) -> Option<&'r str> {
    column
        .and_then(|i| record.get(i))
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn parse_row(record: &csv::StringRecord, columns: &ColumnMap) -> Result<HoldingRow, (Option<String>, DropReason)> {
    let raw_symbol = field(record, columns.symbol).map(str::to_string);
    let Some(symbol) = raw_symbol.as_deref().and_then(NormalizedSymbol::parse) else {
        return Err((raw_symbol, DropReason::MissingSymbol));
    };

    let Some(quantity) = field(record, columns.quantity).and_then(parse_number) else {
        return Err((raw_symbol, DropReason::MissingQuantity));
    };
    let Some(buy_price) = field(record, columns.buy_price).and_then(parse_number) else {
        return Err((raw_symbol, DropReason::MissingPrice));
    };
    if quantity <= 0.0 {
        return Err((raw_symbol, DropReason::NonPositiveQuantity(quantity)));
    }
    if buy_price <= 0.0 {
        return Err((raw_symbol, DropReason::NonPositivePrice(buy_price)));
    }

    let current_price = field(record, columns.current_price)
        .and_then(parse_number)
        .filter(|p| *p > 0.0);
    let purchase_date = field(record, columns.purchase_date)
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());

    Ok(HoldingRow {
        symbol: symbol.symbol,
        quantity,
        buy_price,
        current_price,
        purchase_date,
    })
}

pub struct PortfolioIngester;

impl PortfolioIngester {
    pub fn load(path: &Path) -> Result<LoadedPortfolio, IngestError> {
        let file = File::open(path).map_err(|source| IngestError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "Loading portfolio");
        Self::load_from_reader(file)
    }

    pub fn load_from_reader<R: Read>(reader: R) -> Result<LoadedPortfolio, IngestError> {
        let mut csv = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = csv
            .headers()?
            .iter()
            .map(|h| h.trim().trim_matches('"').to_string())
            .collect();

        let schema = detect_schema(&headers[..]);
        let fields = match schema {
            PortfolioSchema::Upstox => &UPSTOX_FIELDS,
            PortfolioSchema::Manual => &MANUAL_FIELDS,
            PortfolioSchema::Unknown => {
                return Err(IngestError::SchemaUnrecognized { columns: headers });
            }
        };
        info!(schema = %schema, columns = ?headers, "Detected portfolio format");

        let columns = ColumnMap::resolve(&headers, fields);
        let mut holdings = Vec::new();
        let mut dropped = Vec::new();

        for (i, record) in csv.records().enumerate() {
            let row = i + 1;
            let record = match record {
                Ok(record) => record,
                Err(e) if matches!(e.kind(), csv::ErrorKind::Utf8 { .. }) => {
                    let reason = DropReason::Malformed(e.to_string());
                    warn!(row, reason = %reason, "Dropping portfolio row");
                    dropped.push(DroppedRow {
                        row,
                        raw_symbol: None,
                        reason,
                    });
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            if record.iter().all(|v| v.trim().is_empty()) {
                continue;
            }
            match parse_row(&record, &columns) {
                Ok(holding) => holdings.push(holding),
                Err((raw_symbol, reason)) => {
                    warn!(row, symbol = ?raw_symbol, reason = %reason, "Dropping portfolio row");
                    dropped.push(DroppedRow {
                        row,
                        raw_symbol,
                        reason,
                    });
                }
            }
        }

        if holdings.is_empty() {
            return Err(IngestError::EmptyAfterValidation {
                dropped: dropped.len(),
            });
        }

        let summary = PortfolioSummary::from_holdings(&holdings, schema);
        info!(
            holdings = summary.holding_count,
            dropped = dropped.len(),
            invested = summary.total_invested,
            "Portfolio loaded"
        );
        Ok(LoadedPortfolio {
            schema,
            columns: headers,
            holdings,
            dropped,
            summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_upstox_export() {
        let headers = ["Instrument", "Qty.", "Avg. cost", "LTP", "Invested", "Cur. val", "P&L", "Net chg.", "Day chg.", ""];
        assert_eq!(detect_schema(&headers), PortfolioSchema::Upstox);
    }

    #[test]
    fn test_detect_manual() {
        assert_eq!(detect_schema(&["symbol", "quantity", "buy_price", "purchase_date"]), PortfolioSchema::Manual);
        assert_eq!(detect_schema(&["Symbol", "Quantity"]), PortfolioSchema::Manual);
    }

    #[test]
    fn test_detect_wide_instrument_table() {
        let headers = ["Instrument name", "a", "b", "c", "d", "e", "f", "g"];
        assert_eq!(detect_schema(&headers), PortfolioSchema::Upstox);
    }

    #[test]
    fn test_detect_unknown() {
        assert_eq!(detect_schema(&["foo", "bar"]), PortfolioSchema::Unknown);
    }

    #[test]
    fn test_detection_is_order_independent() {
        let a = ["symbol", "quantity", "buy_price"];
        let b = ["buy_price", "symbol", "quantity"];
        assert_eq!(detect_schema(&a), detect_schema(&b));
    }

    #[test]
    fn test_parse_number_cleans_currency() {
        assert_eq!(parse_number("₹1,23,456.50"), Some(123456.5));
        assert_eq!(parse_number(" 10 "), Some(10.0));
        assert_eq!(parse_number("n/a"), None);
        assert_eq!(parse_number(""), None);
    }

    #[test]
    fn test_column_substring_fallback() {
        let headers = vec!["Stock Symbol".to_string(), "Qty held".to_string()];
        assert_eq!(resolve_column(&headers, MANUAL_FIELDS.symbol), Some(0));
        assert_eq!(resolve_column(&headers, MANUAL_FIELDS.quantity), Some(1));
        assert_eq!(resolve_column(&headers, MANUAL_FIELDS.purchase_date), None);
    }

    #[test]
    fn test_upstox_rows() {
        let csv = "\"Instrument\",\"Qty.\",\"Avg. cost\",\"LTP\",\"Invested\",\"Cur. val\",\"P&L\",\"Net chg.\",\"Day chg.\",\"\"\n\
                   \"TCS\",\"5\",\"3,500.00\",\"3,687.45\",\"17500\",\"18437.25\",\"937.25\",\"5.36\",\"0.4\",\"\"\n\
                   \"IDEA\",\"0\",\"12\",\"13\",\"0\",\"0\",\"0\",\"0\",\"0\",\"\"\n";
        let loaded = PortfolioIngester::load_from_reader(csv.as_bytes()).unwrap();
        assert_eq!(loaded.schema, PortfolioSchema::Upstox);
        assert_eq!(loaded.holdings.len(), 1);
        assert_eq!(loaded.holdings[0].symbol, "TCS.NS");
        assert_eq!(loaded.holdings[0].buy_price, 3500.0);
        assert_eq!(loaded.holdings[0].current_price, Some(3687.45));
        assert_eq!(loaded.dropped[0].reason, DropReason::NonPositiveQuantity(0.0));
    }

    #[test]
    fn test_unknown_schema_is_fatal() {
        let err = PortfolioIngester::load_from_reader("a,b\n1,2\n".as_bytes()).unwrap_err();
        assert!(matches!(err, IngestError::SchemaUnrecognized { .. }));
    }
}
