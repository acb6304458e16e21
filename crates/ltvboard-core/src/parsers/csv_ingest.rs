//! CSV ingestion: delimited text -> raw rows -> admitted records
//!
//! The header line is free-form; [`ColumnResolver`] decides which columns
//! mean what. Files carrying both an order number and an item code column
//! are read as line items, everything else as simple (date, customer,
//! amount) orders.

use crate::error::{CoreError, LoadReport};
use crate::models::{CustomerSummary, OrderRecord, RawRow};
use crate::parsers::columns::{ColumnResolver, ResolvedColumns, Role};
use crate::parsers::normalize::{DropReason, Normalized, RecordNormalizer};
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Which record shape a file was read as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputShape {
    /// One row per order: date, customer, amount
    Orders,
    /// One row per purchased item, grouped by order number
    LineItems,
}

/// Everything produced by ingesting one input
#[derive(Debug)]
pub struct IngestOutcome {
    pub shape: InputShape,
    pub columns: ResolvedColumns,
    /// Admitted records in input order
    pub records: Vec<OrderRecord>,
    pub report: LoadReport,
}

/// Rows read from one input
#[derive(Debug, Default)]
pub struct RawRows {
    pub rows: Vec<RawRow>,
    /// Rows holding at least one invalid UTF-8 sequence
    pub lossy_rows: usize,
}

/// CSV reader for order exports
pub struct CsvIngest;

impl CsvIngest {
    /// Read rows, trimming headers and values and skipping blank lines
    ///
    /// Fields are decoded as UTF-8; invalid sequences are replaced with
    /// U+FFFD so one bad byte costs at most the affected values, never the
    /// file.
    pub fn read_rows<R: Read>(reader: R) -> Result<RawRows, csv::Error> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = csv_reader
            .byte_headers()?
            .iter()
            .map(|h| {
                String::from_utf8_lossy(h)
                    .trim_start_matches('\u{feff}')
                    .trim()
                    .to_string()
            })
            .collect();

        let mut rows = Vec::new();
        let mut lossy_rows = 0usize;
        for result in csv_reader.byte_records() {
            let record = result?;
            if record.iter().all(|field| field.trim_ascii().is_empty()) {
                continue;
            }
            if std::str::from_utf8(record.as_slice()).is_err() {
                lossy_rows += 1;
            }

            let mut row = RawRow::new();
            for (idx, header) in headers.iter().enumerate() {
                if header.is_empty() {
                    continue;
                }
                let value = record.get(idx).map(String::from_utf8_lossy).unwrap_or_default();
                row.push(header.clone(), value.into_owned());
            }
            rows.push(row);
        }

        if lossy_rows > 0 {
            debug!(lossy_rows, "Rows with invalid UTF-8 decoded lossily");
        }
        Ok(RawRows { rows, lossy_rows })
    }

    /// Ingest CSV text
    pub fn ingest_str(text: &str) -> Result<IngestOutcome, csv::Error> {
        Self::ingest_bytes(text.as_bytes())
    }

    /// Ingest CSV bytes (a leading UTF-8 BOM is ignored)
    pub fn ingest_bytes(bytes: &[u8]) -> Result<IngestOutcome, csv::Error> {
        let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
        let raw = Self::read_rows(bytes)?;
        let mut outcome = Self::ingest_rows(&raw.rows);
        if raw.lossy_rows > 0 {
            outcome.report.add_warning(
                "csv",
                format!(
                    "{} rows contained invalid UTF-8; unreadable characters were replaced",
                    raw.lossy_rows
                ),
            );
        }
        Ok(outcome)
    }

    /// Ingest a CSV file from disk
    pub async fn ingest_file(path: &Path) -> Result<IngestOutcome, CoreError> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CoreError::FileNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                CoreError::FileRead {
                    path: path.to_path_buf(),
                    source: e,
                }
            }
        })?;

        let outcome = Self::ingest_bytes(&bytes).map_err(|e| CoreError::CsvParse {
            path: path.to_path_buf(),
            message: e.to_string(),
            source: e,
        })?;

        debug!(
            path = %path.display(),
            shape = ?outcome.shape,
            admitted = outcome.report.records_admitted,
            dropped = outcome.report.records_dropped,
            "CSV ingested"
        );
        Ok(outcome)
    }

    /// Normalize already-parsed rows
    ///
    /// Never fails: unusable rows are counted as dropped and an input with no
    /// usable rows simply yields no records.
    pub fn ingest_rows(rows: &[RawRow]) -> IngestOutcome {
        let columns = ColumnResolver::resolve(rows);
        let shape = if columns.is_resolved(Role::OrderId) && columns.is_resolved(Role::ItemCode) {
            InputShape::LineItems
        } else {
            InputShape::Orders
        };

        debug!(
            shape = ?shape,
            date = ?columns.get(Role::OrderDate),
            customer = ?columns.get(Role::CustomerId),
            amount = ?columns.get(Role::Amount),
            "Columns resolved"
        );

        let normalizer = RecordNormalizer::new(&columns);
        let mut report = LoadReport::new();
        let mut records = Vec::with_capacity(rows.len());
        let mut missing_dates = 0usize;
        let mut invalid_amounts = 0usize;

        for (idx, row) in rows.iter().enumerate() {
            report.rows_read += 1;

            let outcome = match shape {
                InputShape::Orders => match normalizer.normalize(row) {
                    Normalized::Admitted {
                        record,
                        synthesized_identity,
                    } => Ok((OrderRecord::Order(record), synthesized_identity)),
                    Normalized::Dropped(reason) => Err(reason),
                },
                InputShape::LineItems => match normalizer.normalize_line_item(row, idx) {
                    Normalized::Admitted {
                        record,
                        synthesized_identity,
                    } => Ok((OrderRecord::LineItem(record), synthesized_identity)),
                    Normalized::Dropped(reason) => Err(reason),
                },
            };

            match outcome {
                Ok((record, synthesized)) => {
                    report.records_admitted += 1;
                    if synthesized {
                        report.identities_synthesized += 1;
                    }
                    records.push(record);
                }
                Err(DropReason::MissingDate) => {
                    report.records_dropped += 1;
                    missing_dates += 1;
                }
                Err(DropReason::InvalidAmount) => {
                    report.records_dropped += 1;
                    invalid_amounts += 1;
                }
            }
        }

        if report.records_dropped > 0 {
            report.add_warning(
                "csv",
                format!(
                    "{} rows dropped ({} without date, {} without positive amount)",
                    report.records_dropped, missing_dates, invalid_amounts
                ),
            );
        }
        if report.identities_synthesized > 0 {
            report.add_warning(
                "csv",
                format!(
                    "{} rows had no customer column; identity derived from order number or date+amount",
                    report.identities_synthesized
                ),
            );
        }
        if records.is_empty() && !rows.is_empty() {
            let available: Vec<&str> = rows[0].headers().collect();
            warn!(columns = ?available, "No usable rows found in input");
            report.add_warning(
                "csv",
                format!("No usable rows; available columns: {}", available.join(", ")),
            );
        }

        IngestOutcome {
            shape,
            columns,
            records,
            report,
        }
    }
}

/// Read aggregate-only customer rows
///
/// Expected columns: customer_id, acquisition_date, last_purchase_date,
/// total_revenue, purchase_count.
pub fn read_customer_summaries<R: Read>(reader: R) -> Result<Vec<CustomerSummary>, csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    csv_reader.deserialize().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CanonicalOrderRecord;

    const SIMPLE_CSV: &str = "\
注文日,会員ID,合計金額,消費税
2024/01/10,A,\"¥1,000\",91
2024-02-10 09:30:00,A,2000円,182
01/15/2024,B,500,45
,C,100,9
2024-03-01,D,0,0
";

    #[test]
    fn test_ingest_simple_orders() {
        let outcome = CsvIngest::ingest_str(SIMPLE_CSV).unwrap();

        assert_eq!(outcome.shape, InputShape::Orders);
        assert_eq!(outcome.report.rows_read, 5);
        assert_eq!(outcome.report.records_admitted, 3);
        assert_eq!(outcome.report.records_dropped, 2);
        assert_eq!(outcome.columns.get(Role::Amount), Some("合計金額"));

        let first = match &outcome.records[0] {
            OrderRecord::Order(r) => r.clone(),
            other => panic!("unexpected record {:?}", other),
        };
        assert_eq!(
            (first.order_date.as_str(), first.customer_key.as_str(), first.amount),
            ("2024-01-10", "A", 1000.0)
        );
        assert_eq!(outcome.records[2].order_date(), "2024-01-15");
    }

    #[test]
    fn test_ingest_strips_bom_and_blank_lines() {
        let text = "\u{feff}date,customer_id,amount\n\n2024-01-10,X,100\n , , \n";
        let outcome = CsvIngest::ingest_str(text).unwrap();
        assert_eq!(outcome.columns.get(Role::OrderDate), Some("date"));
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.report.rows_read, 1);
    }

    #[test]
    fn test_ingest_line_items() {
        let text = "\
受注番号,注文日時,注文者名字,注文者名前,注文者メールアドレス,商品管理番号,商品名,単価
100-1,2024-01-10 10:00:00,山田,太郎,taro@example.com,tea-01,緑茶,1200
100-1,2024-01-10 10:00:00,山田,太郎,taro@example.com,cup-01,湯呑,800
100-2,2024-02-01 11:00:00,鈴木,花子,,tea-02,ほうじ茶,900
";
        let outcome = CsvIngest::ingest_str(text).unwrap();
        assert_eq!(outcome.shape, InputShape::LineItems);
        assert_eq!(outcome.records.len(), 3);
        assert_eq!(outcome.records[0].customer_key(), "taro@example.com");
        assert_eq!(outcome.records[2].customer_key(), "鈴木花子");
        assert_eq!(outcome.report.identities_synthesized, 0);
    }

    #[test]
    fn test_invalid_utf8_row_keeps_the_rest() {
        let mut bytes = b"date,customer,amount\n2024-01-10,A,1000\n2024-01-11,".to_vec();
        bytes.extend_from_slice(&[0xFF, 0xFE]);
        bytes.extend_from_slice(b",500\n2024-01-12,C,700\n");

        let raw = CsvIngest::read_rows(bytes.as_slice()).unwrap();
        assert_eq!(raw.rows.len(), 3);
        assert_eq!(raw.lossy_rows, 1);

        let outcome = CsvIngest::ingest_bytes(&bytes).unwrap();
        assert_eq!(outcome.report.records_admitted, 3);
        assert_eq!(outcome.report.records_dropped, 0);
        assert!(outcome
            .report
            .warnings()
            .any(|w| w.message.contains("invalid UTF-8")));
    }

    #[test]
    fn test_ingest_unrecognized_schema_yields_nothing() {
        let outcome = CsvIngest::ingest_str("foo,bar\n1,2\n3,4\n").unwrap();
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.report.records_dropped, 2);
        assert!(outcome.report.has_errors());
    }

    #[test]
    fn test_ingest_header_only() {
        let outcome = CsvIngest::ingest_str("date,amount\n").unwrap();
        assert!(outcome.records.is_empty());
        assert!(!outcome.report.has_errors());
    }

    #[test]
    fn test_extra_columns_preserved() {
        let outcome = CsvIngest::ingest_str(SIMPLE_CSV).unwrap();
        let OrderRecord::Order(CanonicalOrderRecord { extra, .. }) = &outcome.records[0] else {
            panic!("expected simple order");
        };
        assert_eq!(extra.get("消費税").map(String::as_str), Some("91"));
    }

    #[test]
    fn test_read_customer_summaries() {
        let text = "\
customer_id,acquisition_date,last_purchase_date,total_revenue,purchase_count
C1,2024-01-01,2024-03-01,3000,3
C2,2024-02-15,2024-02-15,800,1
";
        let summaries = read_customer_summaries(text.as_bytes()).unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].purchase_count, 3);
        assert_eq!(summaries[1].total_revenue, 800.0);
    }

    #[tokio::test]
    async fn test_ingest_missing_file() {
        let result = CsvIngest::ingest_file(Path::new("/nonexistent/orders.csv")).await;
        assert!(matches!(result, Err(CoreError::FileNotFound { .. })));
    }
}
