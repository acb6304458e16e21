//! Output formatting for CLI commands
//!
//! Every view renders either as a comfy-table (human) or as pretty JSON.

use ltvboard_core::analytics::{
    AnalyticsData, DailyPoint, GoldenRoute, ItemStats, LtvMetrics, MonthlyPoint, MonthlySeries,
    MonthlyStrategy, RfmCell, RfmGrid, Summary, YearlyPoint, FREQUENCY_LABELS, GRID_SIZE, RECENCY_LABELS,
};
use ltvboard_core::models::CustomerAggregate;
use ltvboard_core::error::{ErrorSeverity, LoadError};
use ltvboard_core::LoadReport;
use comfy_table::{Cell, CellAlignment, Color, ContentArrangement, Row, Table};
use serde::Serialize;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug)]
pub enum CliError {
    NoData,
    InvalidArgument { message: String },
    StoreUnreadable,
    ImportFailed { failed: usize, total: usize },
    Core(ltvboard_core::error::CoreError),
    Other(anyhow::Error),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::NoData => write!(
                f,
                "No data loaded. Import an order CSV first: ltvboard import <file.csv>"
            ),
            CliError::InvalidArgument { message } => write!(f, "{}", message),
            CliError::StoreUnreadable => write!(
                f,
                "The order store could not be read. Rebuild it with: ltvboard reset --yes"
            ),
            CliError::ImportFailed { failed, total } => {
                write!(f, "{} of {} files were not imported", failed, total)
            }
            CliError::Core(e) => write!(f, "{}", e),
            CliError::Other(e) => write!(f, "{:#}", e),
        }
    }
}

impl std::error::Error for CliError {}

impl From<ltvboard_core::error::CoreError> for CliError {
    fn from(e: ltvboard_core::error::CoreError) -> Self {
        CliError::Core(e)
    }
}

impl From<anyhow::Error> for CliError {
    fn from(e: anyhow::Error) -> Self {
        CliError::Other(e)
    }
}

// ============================================================================
// Argument Helpers
// ============================================================================

/// Parse an RFM cell address "R,F" (both 0-5)
pub fn parse_cell(s: &str) -> Result<(usize, usize), CliError> {
    let invalid = || CliError::InvalidArgument {
        message: format!(
            "Invalid cell '{}': expected R,F with both between 0 and {}",
            s,
            GRID_SIZE - 1
        ),
    };

    let (r, f) = s.split_once(',').ok_or_else(invalid)?;
    let r: usize = r.trim().parse().map_err(|_| invalid())?;
    let f: usize = f.trim().parse().map_err(|_| invalid())?;
    if r >= GRID_SIZE || f >= GRID_SIZE {
        return Err(invalid());
    }
    Ok((r, f))
}

// ============================================================================
// Formatters
// ============================================================================

fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "null".to_string())
}

fn new_table(headers: &[&str], no_color: bool) -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    if no_color {
        table.set_header(headers.to_vec());
    } else {
        table.set_header(
            headers
                .iter()
                .map(|h| Cell::new(h).fg(Color::Cyan))
                .collect::<Vec<_>>(),
        );
    }
    table
}

fn right(text: String) -> Cell {
    Cell::new(text).set_alignment(CellAlignment::Right)
}

#[derive(Serialize)]
struct SummaryView<'a> {
    summary: &'a Summary,
    metrics: &'a LtvMetrics,
    monthly_strategy: &'static str,
}

/// Headline figures and LTV metrics
pub fn format_summary(data: &AnalyticsData, json: bool) -> String {
    if json {
        return to_json(&SummaryView {
            summary: &data.summary,
            metrics: &data.metrics,
            monthly_strategy: data.monthly.strategy.label(),
        });
    }

    if data.is_empty() {
        return CliError::NoData.to_string();
    }

    let s = &data.summary;
    let m = &data.metrics;
    let range = s
        .date_range
        .as_ref()
        .map(|(first, last)| format!("{} .. {}", first, last))
        .unwrap_or_else(|| "-".to_string());

    let lines = [
        format!("Records:              {}", format_count(s.record_count)),
        format!("Customers:            {}", format_count(s.customer_count)),
        format!("Period:               {}", range),
        format!("Years:                {}", s.years.join(", ")),
        String::new(),
        format!("Total sales:          {}", format_yen(s.total_sales)),
        format!("Average LTV:          {}", format_yen(m.average_ltv)),
        format!("Median LTV:           {}", format_yen(m.median_ltv)),
        format!("Repeat rate:          {:.1}%", s.repeat_rate),
        format!("Avg purchase value:   {}", format_yen(m.average_purchase_value)),
        format!("Avg purchases/cust.:  {:.2}", m.average_purchase_frequency),
        format!("Avg lifespan:         {:.1} days", m.average_customer_lifespan),
        format!("Monthly series:       {}", data.monthly.strategy.label()),
    ];
    lines.join("\n")
}

pub fn format_monthly(series: &MonthlySeries, points: &[MonthlyPoint], json: bool, no_color: bool) -> String {
    if json {
        #[derive(Serialize)]
        struct View<'a> {
            strategy: &'a MonthlyStrategy,
            points: &'a [MonthlyPoint],
        }
        return to_json(&View {
            strategy: &series.strategy,
            points,
        });
    }

    if points.is_empty() {
        return "No monthly data.".to_string();
    }

    let mut table = new_table(&["Month", "Revenue", "Customers", "Repeat %", "Avg LTV"], no_color);
    for p in points {
        table.add_row(Row::from(vec![
            Cell::new(&p.month),
            right(format_yen(p.revenue)),
            right(format_count(p.customers)),
            right(format!("{:.1}", p.repeat_rate)),
            right(format_yen(p.avg_ltv)),
        ]));
    }

    let mut out = table.to_string();
    if series.strategy.is_approximation() {
        out.push_str("\nNote: purchase dates are synthesized from customer totals (approximate).");
    }
    out
}

pub fn format_daily(points: &[DailyPoint], json: bool, no_color: bool) -> String {
    if json {
        return to_json(points);
    }
    if points.is_empty() {
        return "No daily data.".to_string();
    }

    let mut table = new_table(&["Acquired", "Revenue", "Customers", "LTV"], no_color);
    for p in points {
        table.add_row(Row::from(vec![
            Cell::new(&p.date),
            right(format_yen(p.revenue)),
            right(format_count(p.customers)),
            right(format_yen(p.ltv)),
        ]));
    }
    table.to_string()
}

pub fn format_yearly(points: &[YearlyPoint], json: bool, no_color: bool) -> String {
    if json {
        return to_json(points);
    }
    if points.is_empty() {
        return "No yearly data.".to_string();
    }

    let mut table = new_table(&["Year", "Revenue", "Customers", "Avg LTV"], no_color);
    for p in points {
        table.add_row(Row::from(vec![
            Cell::new(&p.year),
            right(format_yen(p.revenue)),
            right(format_count(p.customers)),
            right(format_yen(p.avg_ltv)),
        ]));
    }
    table.to_string()
}

/// Recency rows x frequency columns, member counts in cells
pub fn format_rfm_grid(grid: &RfmGrid, json: bool, no_color: bool) -> String {
    if json {
        let counts = grid.counts();
        return to_json(&serde_json::json!({
            "anchor_date": grid.anchor_date,
            "recency_labels": RECENCY_LABELS,
            "frequency_labels": FREQUENCY_LABELS,
            "counts": counts,
        }));
    }

    let mut headers = vec!["Recency \\ Freq"];
    headers.extend(FREQUENCY_LABELS.iter());
    let mut table = new_table(&headers, no_color);

    for (r, row) in grid.cells.iter().enumerate() {
        let mut cells = vec![Cell::new(RECENCY_LABELS[r])];
        cells.extend(row.iter().map(|cell| {
            let count = cell.count();
            let text = if count == 0 { "-".to_string() } else { format_count(count) };
            right(text)
        }));
        table.add_row(Row::from(cells));
    }

    format!(
        "RFM grid (anchor {}, {} customers)\n{}",
        grid.anchor_date,
        format_count(grid.total()),
        table
    )
}

/// Member list for one RFM cell
pub fn format_rfm_cell(cell: &RfmCell, json: bool, no_color: bool) -> String {
    if json {
        return to_json(cell);
    }

    let title = format!(
        "Recency {} / Frequency {}: {} customers",
        cell.recency_label(),
        cell.frequency_label(),
        cell.count()
    );
    if cell.members.is_empty() {
        return title;
    }

    let mut table = new_table(&["Customer", "Email", "Purchases", "LTV"], no_color);
    for m in &cell.members {
        table.add_row(Row::from(vec![
            Cell::new(truncate(&m.display_name, 30)),
            Cell::new(m.email.as_deref().unwrap_or("-")),
            right(m.purchase_count.to_string()),
            right(format_yen(m.ltv)),
        ]));
    }
    format!("{}\n{}", title, table)
}

pub fn format_routes(routes: &[GoldenRoute], json: bool, no_color: bool) -> String {
    if json {
        return to_json(routes);
    }
    if routes.is_empty() {
        return "No golden routes (routes need item-level order data).".to_string();
    }

    let mut table = new_table(&["#", "Route", "Customers", "Avg LTV", "Total LTV"], no_color);
    for (idx, route) in routes.iter().enumerate() {
        table.add_row(Row::from(vec![
            right((idx + 1).to_string()),
            Cell::new(truncate(&route.route, 80)),
            right(format_count(route.count)),
            right(format_yen(route.avg_ltv)),
            right(format_yen(route.total_ltv)),
        ]));
    }
    table.to_string()
}

pub fn format_items(items: &[ItemStats], json: bool, no_color: bool) -> String {
    if json {
        return to_json(items);
    }
    if items.is_empty() {
        return "No item data (item ranking needs item-level order data).".to_string();
    }

    let mut table = new_table(
        &["Code", "Name", "Sold", "Sales", "Buyers", "Repeat %", "Avg LTV"],
        no_color,
    );
    for item in items {
        table.add_row(Row::from(vec![
            Cell::new(&item.code),
            Cell::new(truncate(&item.name, 40)),
            right(format_count(item.count)),
            right(format_yen(item.sales)),
            right(format_count(item.buyers)),
            right(format!("{:.1}", item.repeat_rate)),
            right(format_yen(item.avg_ltv)),
        ]));
    }
    table.to_string()
}

pub fn format_customers(customers: &[&CustomerAggregate], json: bool, no_color: bool) -> String {
    if json {
        return to_json(customers);
    }
    if customers.is_empty() {
        return CliError::NoData.to_string();
    }

    let mut table = new_table(
        &["Customer", "Purchases", "LTV", "First purchase", "Last purchase"],
        no_color,
    );
    for c in customers {
        table.add_row(Row::from(vec![
            Cell::new(truncate(c.display_name(), 30)),
            right(c.purchase_count.to_string()),
            right(format_yen(c.ltv())),
            Cell::new(&c.acquisition_date),
            Cell::new(&c.last_purchase_date),
        ]));
    }
    table.to_string()
}

/// Import/analyze outcome: counts then warnings
pub fn format_load_report(source: &str, report: &LoadReport) -> String {
    let mut lines = vec![format!(
        "{}: {} rows read, {} admitted, {} dropped",
        source, report.rows_read, report.records_admitted, report.records_dropped
    )];
    if report.identities_synthesized > 0 {
        lines.push(format!(
            "  {} customer identities synthesized",
            report.identities_synthesized
        ));
    }
    if report.records_over_limit > 0 {
        lines.push(format!(
            "  {} records over the store limit",
            report.records_over_limit
        ));
    }
    for error in &report.errors {
        lines.push(format_load_error(error));
    }
    let (warnings, errors, fatal) = report.error_count();
    if errors + fatal > 0 {
        lines.push(format!("  {} warnings, {} errors", warnings, errors + fatal));
    }
    lines.join("\n")
}

/// One report entry with its severity and hint
pub fn format_load_error(error: &LoadError) -> String {
    let level = match error.severity {
        ErrorSeverity::Warning => "warning",
        ErrorSeverity::Error => "error",
        ErrorSeverity::Fatal => "fatal",
    };
    let mut line = format!("  - {} [{}]: {}", level, error.source, error.message);
    if let Some(suggestion) = &error.suggestion {
        line.push_str(&format!("\n    hint: {}", suggestion));
    }
    line
}

// ============================================================================
// Utilities
// ============================================================================

/// Whole yen with thousands separators
pub fn format_yen(amount: f64) -> String {
    let rounded = amount.round();
    let sign = if rounded < 0.0 { "-" } else { "" };
    format!("{}¥{}", sign, group_digits(rounded.abs() as u64))
}

pub fn format_count(n: usize) -> String {
    group_digits(n as u64)
}

fn group_digits(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else if max == 0 {
        String::new()
    } else {
        s.chars().take(max - 1).collect::<String>() + "…"
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use ltvboard_core::models::{CanonicalOrderRecord, ItemMaster, OrderRecord};
    use ltvboard_core::AnalysisConfig;

    fn sample() -> AnalyticsData {
        let records = vec![
            OrderRecord::Order(CanonicalOrderRecord::new("2024-01-10", "A", 1000.0)),
            OrderRecord::Order(CanonicalOrderRecord::new("2024-02-10", "A", 2000.0)),
            OrderRecord::Order(CanonicalOrderRecord::new("2024-01-15", "B", 500.0)),
        ];
        AnalyticsData::compute(&records, &ItemMaster::new(), &AnalysisConfig::default())
    }

    #[test]
    fn test_parse_cell() {
        assert_eq!(parse_cell("0,5").unwrap(), (0, 5));
        assert_eq!(parse_cell(" 2 , 3 ").unwrap(), (2, 3));
        assert!(parse_cell("6,0").is_err());
        assert!(parse_cell("1").is_err());
        assert!(parse_cell("a,b").is_err());
    }

    #[test]
    fn test_format_yen() {
        assert_eq!(format_yen(0.0), "¥0");
        assert_eq!(format_yen(1750.0), "¥1,750");
        assert_eq!(format_yen(1234567.4), "¥1,234,567");
        assert_eq!(format_yen(-999.6), "-¥1,000");
    }

    #[test]
    fn test_truncate_multibyte() {
        assert_eq!(truncate("緑茶ティーバッグ", 4), "緑茶テ…");
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("short", 1), "…");
        assert_eq!(truncate("short", 0), "");
        assert_eq!(truncate("", 0), "");
    }

    #[test]
    fn test_summary_table_and_json() {
        let data = sample();
        let text = format_summary(&data, false);
        assert!(text.contains("¥3,500"));
        assert!(text.contains("¥1,750"));

        let json: serde_json::Value = serde_json::from_str(&format_summary(&data, true)).unwrap();
        assert_eq!(json["metrics"]["customer_count"], 2);
        assert_eq!(json["monthly_strategy"], "order-based");
    }

    #[test]
    fn test_load_report_shows_errors_with_hints() {
        let mut report = LoadReport::new();
        report.rows_read = 3;
        report.add_warning("csv", "1 rows dropped");
        report.add_error(
            LoadError::error("store", "3 records not imported").with_suggestion("ltvboard reset --yes"),
        );

        let text = format_load_report("orders.csv", &report);
        assert!(text.contains("warning [csv]: 1 rows dropped"));
        assert!(text.contains("error [store]: 3 records not imported"));
        assert!(text.contains("hint: ltvboard reset --yes"));
        assert!(text.contains("1 warnings, 1 errors"));
    }

    #[test]
    fn test_empty_views() {
        let data = AnalyticsData::empty(&AnalysisConfig::default());
        assert!(format_summary(&data, false).contains("No data loaded"));
        assert!(format_routes(&data.routes, false, true).starts_with("No golden routes"));
        assert_eq!(format_items(&data.items, true, true).trim(), "[]");
    }

    #[test]
    fn test_rfm_grid_renders_all_rows() {
        let data = sample();
        let text = format_rfm_grid(&data.rfm, false, true);
        for label in RECENCY_LABELS {
            assert!(text.contains(label));
        }

        let json: serde_json::Value =
            serde_json::from_str(&format_rfm_grid(&data.rfm, true, true)).unwrap();
        assert_eq!(json["counts"].as_array().unwrap().len(), GRID_SIZE);
    }

    #[test]
    fn test_monthly_table() {
        let data = sample();
        let text = format_monthly(&data.monthly, &data.monthly.points, false, true);
        assert!(text.contains("2024-01"));
        assert!(text.contains("¥1,500"));
        assert!(!text.contains("synthesized"));
    }
}
