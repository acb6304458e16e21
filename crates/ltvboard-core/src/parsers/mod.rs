//! Parsers for order exports

pub mod columns;
pub mod csv_ingest;
pub mod normalize;

pub use columns::{ColumnResolver, ResolvedColumns, Role, RoleStrategy};
pub use csv_ingest::{read_customer_summaries, CsvIngest, IngestOutcome, InputShape, RawRows};
pub use normalize::{
    format_amount, normalize_date, parse_amount, parse_iso_date, synthesize_identity, DropReason,
    Normalized, RecordNormalizer,
};
