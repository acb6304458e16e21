//! Export of derived views to CSV or JSON files

use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use crate::analytics::AnalyticsData;
use crate::error::CoreError;

/// Which view to export
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Customers,
    Monthly,
    Daily,
    Yearly,
    Routes,
    Items,
    Rfm,
}

impl ExportKind {
    pub const ALL: [ExportKind; 7] = [
        ExportKind::Customers,
        ExportKind::Monthly,
        ExportKind::Daily,
        ExportKind::Yearly,
        ExportKind::Routes,
        ExportKind::Items,
        ExportKind::Rfm,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExportKind::Customers => "customers",
            ExportKind::Monthly => "monthly",
            ExportKind::Daily => "daily",
            ExportKind::Yearly => "yearly",
            ExportKind::Routes => "routes",
            ExportKind::Items => "items",
            ExportKind::Rfm => "rfm",
        }
    }
}

impl FromStr for ExportKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.to_lowercase();
        match Self::ALL.iter().find(|k| k.as_str() == lower) {
            Some(kind) => Ok(*kind),
            None => {
                let valid: Vec<&str> = Self::ALL.iter().map(ExportKind::as_str).collect();
                bail!("Unknown export kind '{}' (expected one of: {})", s, valid.join(", "))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

/// Export one view to `path`, creating parent directories
///
/// # Examples
///
/// ```no_run
/// use ltvboard_core::analytics::AnalyticsData;
/// use ltvboard_core::config::AnalysisConfig;
/// use ltvboard_core::export::{export_view, ExportFormat, ExportKind};
/// use std::path::Path;
///
/// let data = AnalyticsData::empty(&AnalysisConfig::default());
/// export_view(&data, ExportKind::Monthly, ExportFormat::Csv, Path::new("monthly.csv")).unwrap();
/// ```
pub fn export_view(data: &AnalyticsData, kind: ExportKind, format: ExportFormat, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
    }

    let file = File::create(path).map_err(|source| CoreError::FileWrite {
        path: path.to_path_buf(),
        source,
    })?;
    let writer = BufWriter::new(file);

    match format {
        ExportFormat::Csv => write_csv(data, kind, writer),
        ExportFormat::Json => write_json(data, kind, writer),
    }
    .with_context(|| format!("Failed to export {} to {}", kind.as_str(), path.display()))
}

fn write_json<W: Write>(data: &AnalyticsData, kind: ExportKind, mut writer: W) -> Result<()> {
    match kind {
        ExportKind::Customers => serde_json::to_writer_pretty(&mut writer, &data.customers)?,
        ExportKind::Monthly => serde_json::to_writer_pretty(&mut writer, &data.monthly)?,
        ExportKind::Daily => serde_json::to_writer_pretty(&mut writer, &data.daily)?,
        ExportKind::Yearly => serde_json::to_writer_pretty(&mut writer, &data.yearly)?,
        ExportKind::Routes => serde_json::to_writer_pretty(&mut writer, &data.routes)?,
        ExportKind::Items => serde_json::to_writer_pretty(&mut writer, &data.items)?,
        ExportKind::Rfm => serde_json::to_writer_pretty(&mut writer, &rfm_rows(data))?,
    }
    writer.flush().context("Failed to flush JSON writer")?;
    Ok(())
}

fn write_csv<W: Write>(data: &AnalyticsData, kind: ExportKind, writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);

    match kind {
        ExportKind::Customers => {
            csv.write_record([
                "customer_key",
                "name",
                "email",
                "purchase_count",
                "total_revenue",
                "acquisition_date",
                "last_purchase_date",
            ])?;
            for c in &data.customers {
                csv.write_record([
                    c.customer_key.clone(),
                    c.name.clone().unwrap_or_default(),
                    c.email.clone().unwrap_or_default(),
                    c.purchase_count.to_string(),
                    c.total_revenue.to_string(),
                    c.acquisition_date.clone(),
                    c.last_purchase_date.clone(),
                ])?;
            }
        }
        ExportKind::Monthly => {
            for point in &data.monthly.points {
                csv.serialize(point)?;
            }
        }
        ExportKind::Daily => {
            for point in &data.daily {
                csv.serialize(point)?;
            }
        }
        ExportKind::Yearly => {
            for point in &data.yearly {
                csv.serialize(point)?;
            }
        }
        ExportKind::Routes => {
            csv.write_record(["rank", "route", "steps", "count", "total_ltv", "avg_ltv"])?;
            for (rank, route) in data.routes.iter().enumerate() {
                csv.write_record([
                    (rank + 1).to_string(),
                    route.route.clone(),
                    route.len().to_string(),
                    route.count.to_string(),
                    route.total_ltv.to_string(),
                    route.avg_ltv.to_string(),
                ])?;
            }
        }
        ExportKind::Items => {
            for item in &data.items {
                csv.serialize(item)?;
            }
        }
        ExportKind::Rfm => {
            for row in rfm_rows(data) {
                csv.serialize(row)?;
            }
        }
    }

    csv.flush().context("Failed to flush CSV writer")?;
    Ok(())
}

#[derive(Serialize)]
struct RfmRow {
    recency: &'static str,
    frequency: &'static str,
    customers: usize,
    total_ltv: f64,
}

fn rfm_rows(data: &AnalyticsData) -> Vec<RfmRow> {
    data.rfm
        .cells
        .iter()
        .flatten()
        .map(|cell| RfmRow {
            recency: cell.recency_label(),
            frequency: cell.frequency_label(),
            customers: cell.count(),
            total_ltv: cell.members.iter().map(|m| m.ltv).sum(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::models::{CanonicalOrderRecord, ItemMaster, OrderRecord};
    use tempfile::tempdir;

    fn sample_data() -> AnalyticsData {
        let records = vec![
            OrderRecord::Order(CanonicalOrderRecord::new("2024-01-10", "A", 1000.0)),
            OrderRecord::Order(CanonicalOrderRecord::new("2024-02-10", "A", 2000.0)),
            OrderRecord::Order(CanonicalOrderRecord::new("2024-01-15", "B", 500.0)),
        ];
        AnalyticsData::compute(&records, &ItemMaster::new(), &AnalysisConfig::default())
    }

    #[test]
    fn test_export_kind_parse() {
        assert_eq!("Monthly".parse::<ExportKind>().unwrap(), ExportKind::Monthly);
        let err = "weekly".parse::<ExportKind>().unwrap_err();
        assert!(err.to_string().contains("customers"));
    }

    #[test]
    fn test_export_customers_csv() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("customers.csv");
        export_view(&sample_data(), ExportKind::Customers, ExportFormat::Csv, &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("customer_key,name,email"));
        assert!(lines[1].starts_with("A,,,2,3000"));
    }

    #[test]
    fn test_export_monthly_csv_has_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("monthly.csv");
        export_view(&sample_data(), ExportKind::Monthly, ExportFormat::Csv, &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("month,revenue,customers,repeat_rate,avg_ltv"));
        assert_eq!(content.lines().count(), 3);
    }

    #[test]
    fn test_export_rfm_has_36_cells() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rfm.json");
        export_view(&sample_data(), ExportKind::Rfm, ExportFormat::Json, &path).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json.as_array().unwrap().len(), 36);
    }

    #[test]
    fn test_export_creates_nested_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a/b/routes.json");
        export_view(&sample_data(), ExportKind::Routes, ExportFormat::Json, &path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap().trim(), "[]");
    }
}
