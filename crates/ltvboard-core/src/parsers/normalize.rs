//! Row normalization: dates, amounts, customer identity
//!
//! Turns a [`RawRow`] into a [`CanonicalOrderRecord`] or [`LineItemRecord`].
//! Rows without a date or with a non-positive/unparsable amount are
//! rejected, never defaulted.
//!
//! Identity caveat: when no customer column is usable the key is synthesized
//! from the order number, or from (date, amount). Two real customers who
//! spent the same amount on the same day then share one key. This is an
//! accepted approximation and is reported, not corrected.

use crate::models::{CanonicalOrderRecord, LineItemRecord, RawRow};
use crate::parsers::columns::{ResolvedColumns, Role};
use chrono::{DateTime, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

static ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid ISO date regex"));
static SLASH_YMD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4})/(\d{1,2})/(\d{1,2})(?:[ T].*)?$").expect("valid Y/M/D regex")
});
static ISO_DATETIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4}-\d{2}-\d{2})[ T]").expect("valid ISO datetime regex")
});
static SLASH_MDY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{4})(?:[ T].*)?$").expect("valid M/D/Y regex")
});
static LEADING_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(?:\d+(?:\.\d*)?|\.\d+)").expect("valid number regex")
});

/// Formats tried by the generic calendar parse, on the first whitespace token
/// and then on the whole string
const GENERIC_FORMATS: &[&str] = &[
    "%Y.%m.%d",
    "%Y年%m月%d日",
    "%Y%m%d",
    "%d.%m.%Y",
    "%d-%m-%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
];

/// Characters stripped from amount cells before parsing
const AMOUNT_NOISE: &[char] = &['¥', '￥', '円', '$', '€', '£', ',', '，'];

/// Normalize a date string to `YYYY-MM-DD`
///
/// Precedence: canonical, `YYYY/MM/DD[...]`, `YYYY-MM-DD HH:MM:SS`,
/// `MM/DD/YYYY[...]`, generic calendar formats. Anything else is returned
/// unchanged; such dates sort lexically downstream and are not corrected.
pub fn normalize_date(raw: &str) -> String {
    let s = raw.trim();

    if ISO_DATE.is_match(s) {
        return s.to_string();
    }

    if let Some(caps) = SLASH_YMD.captures(s) {
        return format!("{}-{:0>2}-{:0>2}", &caps[1], &caps[2], &caps[3]);
    }

    if let Some(caps) = ISO_DATETIME.captures(s) {
        return caps[1].to_string();
    }

    if let Some(caps) = SLASH_MDY.captures(s) {
        return format!("{}-{:0>2}-{:0>2}", &caps[3], &caps[1], &caps[2]);
    }

    if let Some(date) = parse_generic(s) {
        return date.format("%Y-%m-%d").to_string();
    }

    raw.to_string()
}

fn parse_generic(s: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.date_naive());
    }

    let first_token = s.split_whitespace().next().unwrap_or(s);
    [first_token, s].into_iter().find_map(|candidate| {
        GENERIC_FORMATS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(candidate, fmt).ok())
    })
}

/// Parse a normalized `YYYY-MM-DD` (extra trailing characters are ignored)
pub fn parse_iso_date(s: &str) -> Option<NaiveDate> {
    let head = s.get(..10)?;
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

/// Parse an amount cell: currency symbols, separators and whitespace are
/// stripped, then the leading number is read
///
/// Returns `None` when no number can be read. Sign is preserved so callers
/// can reject non-positive values.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && !AMOUNT_NOISE.contains(c))
        .collect();

    let number = LEADING_NUMBER.find(&cleaned)?;
    number
        .as_str()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Render an amount the way it appears in synthesized keys (`1000`, `12.5`)
pub fn format_amount(amount: f64) -> String {
    if amount.fract() == 0.0 && amount.abs() < 1e15 {
        format!("{}", amount as i64)
    } else {
        format!("{}", amount)
    }
}

/// Key used when no customer or order column is usable
pub fn synthesize_identity(order_date: &str, amount: f64) -> String {
    format!("ANONYMOUS-{}-{}", order_date, format_amount(amount))
}

/// Why a row was not admitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    MissingDate,
    InvalidAmount,
}

/// Result of normalizing one row
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized<T> {
    Admitted {
        record: T,
        /// Customer key was derived from order number or (date, amount)
        synthesized_identity: bool,
    },
    Dropped(DropReason),
}

/// Converts raw rows to admitted records using one file's resolved columns
pub struct RecordNormalizer<'a> {
    columns: &'a ResolvedColumns,
}

impl<'a> RecordNormalizer<'a> {
    pub fn new(columns: &'a ResolvedColumns) -> Self {
        Self { columns }
    }

    /// Simple path: (date, customer, amount)
    pub fn normalize(&self, row: &RawRow) -> Normalized<CanonicalOrderRecord> {
        let Some(raw_date) = self.columns.value(row, Role::OrderDate) else {
            return Normalized::Dropped(DropReason::MissingDate);
        };
        let amount = match self
            .columns
            .value(row, Role::Amount)
            .and_then(parse_amount)
        {
            Some(v) if v > 0.0 => v,
            _ => return Normalized::Dropped(DropReason::InvalidAmount),
        };
        let order_date = normalize_date(raw_date);

        let (customer_key, synthesized_identity) =
            match self.columns.value(row, Role::CustomerId) {
                Some(id) => (id.to_string(), false),
                None => match self.columns.value(row, Role::OrderId) {
                    Some(order_no) => (format!("ORDER-{}", order_no), true),
                    None => (synthesize_identity(&order_date, amount), true),
                },
            };

        let used: Vec<&str> = [Role::OrderDate, Role::CustomerId, Role::Amount]
            .into_iter()
            .filter_map(|role| self.columns.get(role))
            .collect();
        let extra = row
            .fields()
            .filter(|(h, _)| !used.contains(h))
            .map(|(h, v)| (h.to_string(), v.to_string()))
            .collect();

        Normalized::Admitted {
            record: CanonicalOrderRecord {
                order_date,
                customer_key: customer_key.trim().to_string(),
                amount,
                extra,
            },
            synthesized_identity,
        }
    }

    /// Richer path: one line item of a marketplace order export
    ///
    /// Rows without an order number get an id built from `row_index` and the
    /// row content, so each becomes its own order.
    pub fn normalize_line_item(
        &self,
        row: &RawRow,
        row_index: usize,
    ) -> Normalized<LineItemRecord> {
        let Some(raw_date) = self.columns.value(row, Role::OrderDate) else {
            return Normalized::Dropped(DropReason::MissingDate);
        };
        let price = match self
            .columns
            .value(row, Role::ItemPrice)
            .or_else(|| self.columns.value(row, Role::Amount))
            .and_then(parse_amount)
        {
            Some(v) if v > 0.0 => v,
            _ => return Normalized::Dropped(DropReason::InvalidAmount),
        };
        let order_date = normalize_date(raw_date);

        let email = self.columns.value(row, Role::Email).map(str::to_string);
        let last = self.columns.value(row, Role::LastName).unwrap_or("");
        let first = self.columns.value(row, Role::FirstName).unwrap_or("");
        let full_name = format!("{}{}", last, first);
        let customer_name = (!full_name.is_empty()).then_some(full_name);

        let known_identity = email
            .clone()
            .or_else(|| customer_name.clone())
            .or_else(|| self.columns.value(row, Role::CustomerId).map(str::to_string));

        // Without an order number the id must still differ between files,
        // so it carries the row content as well as the row position
        let order_id = match self.columns.value(row, Role::OrderId) {
            Some(id) => id.to_string(),
            None => format!(
                "ROW-{}|{}|{}|{}",
                row_index,
                order_date,
                known_identity.as_deref().unwrap_or(""),
                format_amount(price)
            ),
        };

        let (customer_key, synthesized_identity) = match known_identity {
            Some(key) => (key, false),
            None => (format!("ORDER-{}", order_id), true),
        };

        // Blank code: the line still counts as revenue but names no item
        let item_code = self
            .columns
            .value(row, Role::ItemCode)
            .unwrap_or_default()
            .to_string();
        let item_name = self
            .columns
            .value(row, Role::ItemName)
            .map(str::to_string)
            .unwrap_or_else(|| item_code.clone());

        Normalized::Admitted {
            record: LineItemRecord {
                order_id,
                order_date,
                customer_key,
                item_code,
                item_name,
                price,
                email,
                customer_name,
            },
            synthesized_identity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::columns::ColumnResolver;

    #[test]
    fn test_normalize_date_formats() {
        assert_eq!(normalize_date("2024-03-05"), "2024-03-05");
        assert_eq!(normalize_date("2024/03/05"), "2024-03-05");
        assert_eq!(normalize_date("2024/03/05 10:00:00"), "2024-03-05");
        assert_eq!(normalize_date("2024/3/5T10:00"), "2024-03-05");
        assert_eq!(normalize_date("2024-03-05 10:00:00"), "2024-03-05");
        assert_eq!(normalize_date("2024-03-05T10:00:00+09:00"), "2024-03-05");
        assert_eq!(normalize_date("03/05/2024"), "2024-03-05");
        assert_eq!(normalize_date("3/5/2024 10:00"), "2024-03-05");
    }

    #[test]
    fn test_normalize_date_generic_parse() {
        assert_eq!(normalize_date("2024年3月5日"), "2024-03-05");
        assert_eq!(normalize_date("2024.03.05 12:00"), "2024-03-05");
        assert_eq!(normalize_date("March 5, 2024"), "2024-03-05");
        assert_eq!(normalize_date("Tue, 5 Mar 2024 10:00:00 +0000"), "2024-03-05");
    }

    #[test]
    fn test_normalize_date_passthrough() {
        assert_eq!(normalize_date("last tuesday"), "last tuesday");
        assert_eq!(normalize_date("2024-13"), "2024-13");
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("¥12,345円"), Some(12345.0));
        assert_eq!(parse_amount(" $ 1,234.50 "), Some(1234.5));
        assert_eq!(parse_amount("980 円"), Some(980.0));
        assert_eq!(parse_amount("-100"), Some(-100.0));
        assert_eq!(parse_amount("1500JPY"), Some(1500.0));
        assert_eq!(parse_amount("abc"), None);
        assert_eq!(parse_amount(""), None);
    }

    #[test]
    fn test_parse_iso_date() {
        assert_eq!(
            parse_iso_date("2024-03-05"),
            NaiveDate::from_ymd_opt(2024, 3, 5)
        );
        assert_eq!(parse_iso_date("2024-02-30"), None);
        assert_eq!(parse_iso_date("bad"), None);
    }

    #[test]
    fn test_synthesize_identity() {
        assert_eq!(
            synthesize_identity("2024-01-10", 1000.0),
            "ANONYMOUS-2024-01-10-1000"
        );
        assert_eq!(
            synthesize_identity("2024-01-10", 12.5),
            "ANONYMOUS-2024-01-10-12.5"
        );
    }

    fn normalize_one(pairs: &[(&str, &str)]) -> Normalized<CanonicalOrderRecord> {
        let rows = vec![RawRow::from_pairs(pairs.iter().copied())];
        let columns = ColumnResolver::resolve(&rows);
        RecordNormalizer::new(&columns).normalize(&rows[0])
    }

    #[test]
    fn test_normalize_row_admitted() {
        let result = normalize_one(&[
            ("注文日", "2024/01/10"),
            ("会員ID", "A"),
            ("合計金額", "¥1,000"),
            ("備考", "gift"),
        ]);

        let Normalized::Admitted {
            record,
            synthesized_identity,
        } = result
        else {
            panic!("expected admitted row");
        };
        assert_eq!(record.order_date, "2024-01-10");
        assert_eq!(record.customer_key, "A");
        assert_eq!(record.amount, 1000.0);
        assert_eq!(record.extra.get("備考").map(String::as_str), Some("gift"));
        assert!(!synthesized_identity);
    }

    #[test]
    fn test_normalize_row_rejections() {
        assert_eq!(
            normalize_one(&[("date", ""), ("amount", "100")]),
            Normalized::Dropped(DropReason::MissingDate)
        );
        assert_eq!(
            normalize_one(&[("date", "2024-01-10"), ("amount", "0")]),
            Normalized::Dropped(DropReason::InvalidAmount)
        );
        assert_eq!(
            normalize_one(&[("date", "2024-01-10"), ("amount", "n/a")]),
            Normalized::Dropped(DropReason::InvalidAmount)
        );
    }

    #[test]
    fn test_identity_from_order_number() {
        let result = normalize_one(&[
            ("注文番号", "1001"),
            ("注文日", "2024-01-10"),
            ("金額", "500"),
        ]);
        let Normalized::Admitted {
            record,
            synthesized_identity,
        } = result
        else {
            panic!("expected admitted row");
        };
        assert_eq!(record.customer_key, "ORDER-1001");
        assert!(synthesized_identity);
    }

    #[test]
    fn test_identity_from_date_and_amount() {
        let result = normalize_one(&[("date", "01/10/2024"), ("amount", "500")]);
        let Normalized::Admitted { record, .. } = result else {
            panic!("expected admitted row");
        };
        assert_eq!(record.customer_key, "ANONYMOUS-2024-01-10-500");
    }

    #[test]
    fn test_line_item_without_order_number_keys_on_content() {
        let row = |date: &str, price: &str| {
            RawRow::from_pairs([
                ("受注番号", ""),
                ("注文日", date),
                ("会員ID", "A"),
                ("商品コード", "tea"),
                ("単価", price),
            ])
        };
        let first_file = vec![row("2024-01-10", "1000")];
        let second_file = vec![row("2024-03-01", "3000")];
        let columns = ColumnResolver::resolve(&first_file);
        let normalizer = RecordNormalizer::new(&columns);

        let id = |rows: &[RawRow]| match normalizer.normalize_line_item(&rows[0], 0) {
            Normalized::Admitted { record, .. } => record.order_id,
            other => panic!("expected admitted line item, got {:?}", other),
        };

        assert_eq!(id(&first_file), "ROW-0|2024-01-10|A|1000");
        assert_ne!(id(&first_file), id(&second_file));
        assert_eq!(id(&first_file), id(&first_file.clone()));
    }

    #[test]
    fn test_normalize_line_item_identity() {
        let rows = vec![
            RawRow::from_pairs([
                ("受注番号", "100-1"),
                ("注文日時", "2024-01-10 10:00:00"),
                ("注文者名字", "山田"),
                ("注文者名前", "太郎"),
                ("注文者メールアドレス", ""),
                ("商品管理番号", "tea-01"),
                ("商品名", "緑茶"),
                ("単価", "1,200"),
            ]),
            RawRow::from_pairs([
                ("受注番号", "100-2"),
                ("注文日時", "2024-01-11 10:00:00"),
                ("注文者名字", "鈴木"),
                ("注文者名前", "花子"),
                ("注文者メールアドレス", "hanako@example.com"),
                ("商品管理番号", "tea-02"),
                ("商品名", ""),
                ("単価", "800"),
            ]),
        ];
        let columns = ColumnResolver::resolve(&rows);
        let normalizer = RecordNormalizer::new(&columns);

        let Normalized::Admitted { record, .. } = normalizer.normalize_line_item(&rows[0], 0)
        else {
            panic!("expected admitted line item");
        };
        assert_eq!(record.customer_key, "山田太郎");
        assert_eq!(record.order_date, "2024-01-10");
        assert_eq!(record.price, 1200.0);
        assert_eq!(record.item_name, "緑茶");

        let Normalized::Admitted { record, .. } = normalizer.normalize_line_item(&rows[1], 1)
        else {
            panic!("expected admitted line item");
        };
        assert_eq!(record.customer_key, "hanako@example.com");
        assert_eq!(record.customer_name.as_deref(), Some("鈴木花子"));
        assert_eq!(record.item_name, "tea-02");
    }
}
