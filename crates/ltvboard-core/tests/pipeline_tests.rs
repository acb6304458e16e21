//! End-to-end: CSV text on disk -> ingestion -> analytics

use ltvboard_core::analytics::{AnalyticsData, MonthlyStrategy};
use ltvboard_core::models::{CustomerAggregate, ItemMaster, OrderRecord};
use ltvboard_core::parsers::{read_customer_summaries, CsvIngest, InputShape};
use ltvboard_core::AnalysisConfig;
use std::io::Write;
use tempfile::NamedTempFile;

fn write_csv(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

const SHOP_EXPORT: &str = "\
注文日,会員ID,支払金額,ポイント利用額,送料
2024/01/10 10:22,A,\"¥1,000\",100,500
2024-02-10,A,2000円,0,0
01/15/2024,B,500,0,0
2024-03-01,C,,0,0
,D,800,0,0
";

const MARKETPLACE_EXPORT: &str = "\
受注番号,注文日時,注文者名字,注文者名前,注文者メールアドレス,商品管理番号,商品名,単価
100-1,2024-01-05 10:00:00,山田,太郎,taro@example.com,tea-01,緑茶,1200
100-1,2024-01-05 10:00:00,山田,太郎,taro@example.com,cup-01,湯呑,800
100-2,2024-02-05 09:00:00,山田,太郎,taro@example.com,cup-01,湯呑,800
100-3,2024-01-20 12:00:00,鈴木,花子,,tea-01,緑茶,1200
100-4,2024-03-01 12:00:00,鈴木,花子,,cup-01,湯呑,800
100-5,2024-03-02 08:00:00,佐藤,次郎,jiro@example.com,tea-02,ほうじ茶,900
";

#[tokio::test]
async fn test_shop_export_scenario() {
    let file = write_csv(SHOP_EXPORT);
    let outcome = CsvIngest::ingest_file(file.path()).await.unwrap();

    assert_eq!(outcome.shape, InputShape::Orders);
    assert_eq!(outcome.report.records_admitted, 3);
    assert_eq!(outcome.report.records_dropped, 2);

    let data = AnalyticsData::compute(&outcome.records, &ItemMaster::new(), &AnalysisConfig::default());
    assert_eq!(data.metrics.customer_count, 2);
    assert_eq!(data.metrics.total_ltv, 3500.0);
    assert_eq!(data.metrics.average_ltv, 1750.0);
    assert_eq!(data.metrics.median_ltv, 1750.0);
    assert_eq!(data.customer("A").unwrap().purchase_count, 2);
    assert_eq!(data.customer("B").unwrap().purchase_count, 1);
}

#[tokio::test]
async fn test_marketplace_export_routes_and_items() {
    let file = write_csv(MARKETPLACE_EXPORT);
    let outcome = CsvIngest::ingest_file(file.path()).await.unwrap();
    assert_eq!(outcome.shape, InputShape::LineItems);

    let admitted: f64 = outcome.records.iter().map(OrderRecord::amount).sum();

    let mut master = ItemMaster::new();
    master.upsert("tea-01", "Sencha");
    let data = AnalyticsData::compute(&outcome.records, &master, &AnalysisConfig::default());

    // Email when present, name otherwise
    let keys: Vec<&str> = data.customers.iter().map(|c| c.customer_key.as_str()).collect();
    assert_eq!(keys, vec!["jiro@example.com", "taro@example.com", "鈴木花子"]);

    let total: f64 = data.customers.iter().map(|c| c.total_revenue).sum();
    assert!((total - admitted).abs() < 1e-9);

    let shared = data
        .routes
        .iter()
        .find(|r| r.count == 2)
        .expect("taro and hanako share a route");
    assert_eq!(shared.route, "Sencha → cup-01");

    // cup-01 sold three times, tea-01 twice
    assert_eq!(data.items[0].code, "cup-01");
    assert_eq!(data.items[0].name, "湯呑");
    assert_eq!(data.items[0].buyers, 2);
    assert_eq!(data.items[1].name, "Sencha");
}

#[test]
fn test_unknown_layout_renders_as_no_data() {
    let outcome = CsvIngest::ingest_str("alpha,beta\nx,y\n").unwrap();
    let data = AnalyticsData::compute(&outcome.records, &ItemMaster::new(), &AnalysisConfig::default());

    assert!(data.is_empty());
    assert_eq!(data.metrics.average_ltv, 0.0);
    assert!(data.rfm.is_empty());
}

#[test]
fn test_summary_csv_drives_synthesized_months() {
    let csv = "\
customer_id,acquisition_date,last_purchase_date,total_revenue,purchase_count
C1,2024-01-01,2024-03-01,3000,3
C2,2024-02-15,2024-02-15,800,1
";
    let customers: Vec<CustomerAggregate> = read_customer_summaries(csv.as_bytes())
        .unwrap()
        .into_iter()
        .map(CustomerAggregate::from_summary)
        .collect();

    let data = AnalyticsData::from_customers(customers, &[], &ItemMaster::new(), &AnalysisConfig::default());

    assert_eq!(data.monthly.strategy, MonthlyStrategy::Synthesized);
    let feb = data
        .monthly
        .points
        .iter()
        .find(|p| p.month == "2024-02")
        .unwrap();
    assert_eq!(feb.revenue, 1800.0);
    assert_eq!(feb.customers, 2);
    assert_eq!(data.metrics.total_ltv, 3800.0);
}

#[tokio::test]
async fn test_file_with_invalid_utf8_row_still_imports() {
    let mut bytes = "注文日,会員ID,支払金額\n2024-01-10,A,1000\n".as_bytes().to_vec();
    bytes.extend_from_slice(b"2024-01-11,");
    bytes.push(0xFF);
    bytes.extend_from_slice(b",500\n2024-01-12,B,700\n");

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&bytes).unwrap();
    file.flush().unwrap();

    let outcome = CsvIngest::ingest_file(file.path()).await.unwrap();
    assert_eq!(outcome.report.records_admitted, 3);

    let data = AnalyticsData::compute(&outcome.records, &ItemMaster::new(), &AnalysisConfig::default());
    assert_eq!(data.metrics.total_ltv, 2200.0);
    assert!(data.customer("A").is_some());
    assert!(data.customer("B").is_some());
}
