//! Columnar output (Arrow/Parquet)
//!
//! Results are handed to plotting as Arrow record batches, one row per
//! group × metric:
//!
//! ```text
//! round_interval | echo_interval | payload_size | locality | peer | metric
//!   | unit | mean | std_dev | sample_count | record_count
//! ```
//!
//! Baseline rows leave both intervals null; protocol-level groups leave
//! `locality` and `peer` null. Undefined statistics are null, never zero.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, RecordBatch, StringArray, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use tracing::debug;

use crate::aggregate::ConfigGroup;
use crate::delivery::DeliveryRate;
use crate::overhead::BaselineOverhead;
use crate::record::Locality;
use crate::units::Unit;
use crate::Result;

/// Schema of the group statistics table.
#[must_use]
pub fn group_stats_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("round_interval", DataType::UInt64, true),
        Field::new("echo_interval", DataType::UInt64, true),
        Field::new("payload_size", DataType::UInt64, false),
        Field::new("locality", DataType::Utf8, true),
        Field::new("peer", DataType::Utf8, true),
        Field::new("metric", DataType::Utf8, false),
        Field::new("unit", DataType::Utf8, true),
        Field::new("mean", DataType::Float64, true),
        Field::new("std_dev", DataType::Float64, true),
        Field::new("sample_count", DataType::UInt64, false),
        Field::new("record_count", DataType::UInt64, false),
    ]))
}

/// Schema of the overhead table.
#[must_use]
pub fn overhead_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("payload_size", DataType::UInt64, false),
        Field::new("locality", DataType::Utf8, true),
        Field::new("throughput_overhead_pct", DataType::Float64, false),
        Field::new("latency_overhead_abs", DataType::Float64, false),
        Field::new("latency_unit", DataType::Utf8, false),
    ]))
}

/// Schema of the delivery table.
#[must_use]
pub fn delivery_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("round_interval", DataType::UInt64, true),
        Field::new("echo_interval", DataType::UInt64, true),
        Field::new("payload_size", DataType::UInt64, false),
        Field::new("received", DataType::UInt64, false),
        Field::new("expected", DataType::UInt64, false),
        Field::new("delivery_ratio", DataType::Float64, true),
        Field::new("artifacts", DataType::UInt64, false),
    ]))
}

fn count(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}

/// Long-format statistics table of `groups`, one row per group × metric.
///
/// # Errors
///
/// Returns `Arrow` if the batch cannot be assembled.
pub fn group_stats_batch(groups: &[ConfigGroup]) -> Result<RecordBatch> {
    let rows: Vec<_> = groups
        .iter()
        .flat_map(|group| group.metrics().map(move |(metric, stats)| (group, metric, stats)))
        .collect();

    let columns: Vec<ArrayRef> = vec![
        Arc::new(UInt64Array::from_iter(
            rows.iter().map(|(g, _, _)| g.key().configuration_key.round_interval()),
        )),
        Arc::new(UInt64Array::from_iter(
            rows.iter().map(|(g, _, _)| g.key().configuration_key.echo_interval()),
        )),
        Arc::new(UInt64Array::from_iter_values(
            rows.iter().map(|(g, _, _)| g.key().payload_size),
        )),
        Arc::new(StringArray::from_iter(
            rows.iter().map(|(g, _, _)| g.key().locality.map(Locality::as_str)),
        )),
        Arc::new(StringArray::from_iter(
            rows.iter().map(|(g, _, _)| g.key().peer.as_deref()),
        )),
        Arc::new(StringArray::from_iter_values(
            rows.iter().map(|(_, m, _)| m.name()),
        )),
        Arc::new(StringArray::from_iter(
            rows.iter().map(|(_, _, s)| s.unit().map(Unit::symbol)),
        )),
        Arc::new(Float64Array::from_iter(rows.iter().map(|(_, _, s)| s.mean()))),
        Arc::new(Float64Array::from_iter(rows.iter().map(|(_, _, s)| s.std_dev()))),
        Arc::new(UInt64Array::from_iter_values(
            rows.iter().map(|(_, _, s)| count(s.sample_count())),
        )),
        Arc::new(UInt64Array::from_iter_values(
            rows.iter().map(|(g, _, _)| count(g.record_count())),
        )),
    ];

    Ok(RecordBatch::try_new(group_stats_schema(), columns)?)
}

/// Overhead table, one row per aligned key.
///
/// # Errors
///
/// Returns `Arrow` if the batch cannot be assembled.
pub fn overhead_batch(rows: &[BaselineOverhead]) -> Result<RecordBatch> {
    let columns: Vec<ArrayRef> = vec![
        Arc::new(UInt64Array::from_iter_values(
            rows.iter().map(|r| r.key.payload_size),
        )),
        Arc::new(StringArray::from_iter(
            rows.iter().map(|r| r.key.locality.map(Locality::as_str)),
        )),
        Arc::new(Float64Array::from_iter_values(
            rows.iter().map(|r| r.throughput_overhead_pct),
        )),
        Arc::new(Float64Array::from_iter_values(
            rows.iter().map(|r| r.latency_overhead_abs),
        )),
        Arc::new(StringArray::from_iter_values(
            rows.iter().map(|r| r.latency_unit.symbol()),
        )),
    ];
    Ok(RecordBatch::try_new(overhead_schema(), columns)?)
}

/// Delivery table, one row per (configuration key, payload size).
///
/// # Errors
///
/// Returns `Arrow` if the batch cannot be assembled.
pub fn delivery_batch(rates: &[DeliveryRate]) -> Result<RecordBatch> {
    let columns: Vec<ArrayRef> = vec![
        Arc::new(UInt64Array::from_iter(
            rates.iter().map(|r| r.key().configuration_key.round_interval()),
        )),
        Arc::new(UInt64Array::from_iter(
            rates.iter().map(|r| r.key().configuration_key.echo_interval()),
        )),
        Arc::new(UInt64Array::from_iter_values(
            rates.iter().map(|r| r.key().payload_size),
        )),
        Arc::new(UInt64Array::from_iter_values(rates.iter().map(DeliveryRate::received))),
        Arc::new(UInt64Array::from_iter_values(rates.iter().map(DeliveryRate::expected))),
        Arc::new(Float64Array::from_iter(rates.iter().map(DeliveryRate::ratio))),
        Arc::new(UInt64Array::from_iter_values(
            rates.iter().map(|r| count(r.artifacts())),
        )),
    ];
    Ok(RecordBatch::try_new(delivery_schema(), columns)?)
}

/// Write `batch` as a Parquet file.
///
/// # Errors
///
/// Returns `Io` if the file cannot be created, `Parquet` if encoding fails.
pub fn write_parquet<P: AsRef<Path>>(path: P, batch: &RecordBatch) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
    writer.write(batch)?;
    writer.close()?;
    debug!(path = %path.display(), rows = batch.num_rows(), "wrote parquet");
    Ok(())
}

/// Read every record batch of a Parquet file.
///
/// # Errors
///
/// Returns `Io`, `Parquet` or `Arrow` if the file cannot be read or decoded.
pub fn read_parquet<P: AsRef<Path>>(path: P) -> Result<Vec<RecordBatch>> {
    let file = File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
    let mut batches = Vec::new();
    for batch in reader {
        batches.push(batch?);
    }
    Ok(batches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{aggregate, GroupKey};
    use crate::config_key::ConfigurationKey;
    use crate::overhead::compute_overhead;
    use crate::record::PairwiseLink;
    use arrow::array::Array;

    fn link_groups(key: ConfigurationKey, throughput: f64) -> Vec<ConfigGroup> {
        let links = vec![
            PairwiseLink::new("2-2", "2-1", 128, key, true, throughput, 1.0),
            PairwiseLink::new("3-1", "2-1", 128, key, false, throughput, 2.0),
        ];
        aggregate(&links, GroupKey::locality).unwrap()
    }

    #[test]
    fn test_group_stats_batch_shape() {
        let groups = link_groups(ConfigurationKey::protocol(50, 20), 10.0);
        let batch = group_stats_batch(&groups).unwrap();

        // two groups, two metrics each
        assert_eq!(batch.num_rows(), 4);
        assert_eq!(batch.num_columns(), 11);

        let rounds = batch
            .column(0)
            .as_any()
            .downcast_ref::<UInt64Array>()
            .unwrap();
        assert_eq!(rounds.value(0), 50);

        let std_dev = batch
            .column(8)
            .as_any()
            .downcast_ref::<Float64Array>()
            .unwrap();
        assert!(std_dev.is_null(0), "single sample std must be null");

        let peer = batch.column(4);
        assert_eq!(peer.null_count(), 4);
    }

    #[test]
    fn test_baseline_intervals_are_null() {
        let groups = link_groups(ConfigurationKey::Baseline, 10.0);
        let batch = group_stats_batch(&groups).unwrap();
        assert_eq!(batch.column(0).null_count(), batch.num_rows());
        assert_eq!(batch.column(1).null_count(), batch.num_rows());
    }

    #[test]
    fn test_overhead_batch_and_parquet() {
        let baseline = link_groups(ConfigurationKey::Baseline, 100.0);
        let treatment = link_groups(ConfigurationKey::protocol(50, 20), 80.0);
        let report = compute_overhead(&baseline, &treatment).unwrap();
        let batch = overhead_batch(&report.rows).unwrap();
        assert_eq!(batch.num_rows(), 2);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overhead.parquet");
        write_parquet(&path, &batch).unwrap();
        let back = read_parquet(&path).unwrap();
        assert_eq!(back.iter().map(RecordBatch::num_rows).sum::<usize>(), 2);

        let pct = back[0]
            .column(2)
            .as_any()
            .downcast_ref::<Float64Array>()
            .unwrap();
        assert!((pct.value(0) - 20.0).abs() < 1e-9);
    }
}
