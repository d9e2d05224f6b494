use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arrow::array::{
    Array, Float32Array, Float64Array, Int32Array, Int64Array, LargeStringArray, StringArray,
};
use arrow::datatypes::DataType;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use super::filter::{ColumnSelector, clean_header};
use super::model::{MissingPolicy, QuantTable};

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load a quantification table from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.tsv` / `.txt` – tab-delimited search-engine export (e.g. proteinGroups.txt)
/// * `.csv`          – the same layout, comma-delimited
/// * `.parquet`      – a Utf8 index column plus numeric value columns
pub fn load_file(path: &Path, selector: &ColumnSelector, missing: MissingPolicy) -> Result<QuantTable> {
    match Format::of(path)? {
        Format::Delimited(delim) => load_delimited(path, delim, selector, missing),
        Format::Parquet => load_parquet(path, selector, missing),
    }
}

/// All header names of a file, quotes stripped, in file order.
pub fn list_columns(path: &Path) -> Result<Vec<String>> {
    match Format::of(path)? {
        Format::Delimited(delim) => {
            let mut reader = delimited_reader(path, delim)?;
            let headers = reader.headers().context("reading header row")?;
            Ok(headers.iter().map(clean_header).collect())
        }
        Format::Parquet => {
            let file = std::fs::File::open(path).context("opening parquet file")?;
            let builder = ParquetRecordBatchReaderBuilder::try_new(file)
                .context("reading parquet metadata")?;
            Ok(builder
                .schema()
                .fields()
                .iter()
                .map(|f| f.name().clone())
                .collect())
        }
    }
}

enum Format {
    Delimited(u8),
    Parquet,
}

impl Format {
    fn of(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        match ext.as_str() {
            "tsv" | "txt" | "tab" => Ok(Format::Delimited(b'\t')),
            "csv" => Ok(Format::Delimited(b',')),
            "parquet" | "pq" => Ok(Format::Parquet),
            other => bail!("Unsupported file extension: .{other}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Delimited text loader
// ---------------------------------------------------------------------------

fn delimited_reader(path: &Path, delimiter: u8) -> Result<csv::Reader<std::fs::File>> {
    csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))
}

/// Header row with column names; one row per protein. Only the index
/// column and the columns picked by `selector` are read.
fn load_delimited(
    path: &Path,
    delimiter: u8,
    selector: &ColumnSelector,
    missing: MissingPolicy,
) -> Result<QuantTable> {
    let mut reader = delimited_reader(path, delimiter)?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading header row")?
        .iter()
        .map(clean_header)
        .collect();

    let index_idx = position(&headers, &selector.index)?;
    let columns = selector.select(&headers);
    if columns.is_empty() {
        bail!("No value columns match the column selection");
    }
    let value_idx: Vec<usize> = columns
        .iter()
        .map(|c| position(&headers, c))
        .collect::<Result<_>>()?;

    let mut rows = Vec::new();

    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("row {row_no}"))?;

        let protein = record.get(index_idx).unwrap_or("").trim().trim_matches('"');
        if protein.is_empty() {
            log::warn!("row {row_no}: empty '{}' value, skipped", selector.index);
            continue;
        }

        let values = value_idx
            .iter()
            .zip(&columns)
            .map(|(&i, col)| {
                parse_cell(record.get(i).unwrap_or(""))
                    .map(|v| missing.resolve(v))
                    .with_context(|| format!("row {row_no}, column '{col}'"))
            })
            .collect::<Result<Vec<f64>>>()?;

        rows.push((protein.to_string(), values));
    }

    QuantTable::from_rows(columns, rows)
}

fn position(headers: &[String], name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h == name)
        .with_context(|| format!("missing column '{name}'"))
}

/// Parse one abundance cell. Blank and not-a-number markers are missing.
fn parse_cell(s: &str) -> Result<Option<f64>> {
    let tok = s.trim().trim_matches('"');
    match tok {
        "" | "NaN" | "nan" | "NA" | "N/A" | "#N/A" | "null" => Ok(None),
        _ => {
            let v = tok
                .parse::<f64>()
                .with_context(|| format!("'{tok}' is not a number"))?;
            check_abundance(v)
        }
    }
}

/// Abundances are finite and non-negative, whatever the file format. A NaN
/// value is a missing cell.
fn check_abundance(v: f64) -> Result<Option<f64>> {
    if v.is_nan() {
        return Ok(None);
    }
    if v.is_infinite() {
        bail!("'{v}' is not a finite abundance");
    }
    if v < 0.0 {
        bail!("negative abundance {v}");
    }
    Ok(Some(v))
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet quantification table.
///
/// Expected schema:
/// - the index column (`selector.index`): Utf8 or LargeUtf8
/// - value columns: Float64, Float32, Int64 or Int32; nulls are missing
fn load_parquet(path: &Path, selector: &ColumnSelector, missing: MissingPolicy) -> Result<QuantTable> {
    read_parquet(path, selector, missing, PARQUET_BATCH_SIZE)
}

const PARQUET_BATCH_SIZE: usize = 1024;

fn read_parquet(
    path: &Path,
    selector: &ColumnSelector,
    missing: MissingPolicy,
    batch_size: usize,
) -> Result<QuantTable> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .context("reading parquet metadata")?
        .with_batch_size(batch_size);

    let headers: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let columns = selector.select(&headers);
    if columns.is_empty() {
        bail!("No value columns match the column selection");
    }

    let reader = builder.build().context("building parquet reader")?;
    let mut rows = Vec::new();
    // Row numbers in messages count from the start of the file.
    let mut offset = 0;

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();

        let index_idx = schema
            .index_of(&selector.index)
            .map_err(|_| anyhow::anyhow!("Parquet file missing '{}' column", selector.index))?;
        let value_cols: Vec<&Arc<dyn Array>> = columns
            .iter()
            .map(|c| {
                schema
                    .index_of(c)
                    .map(|i| batch.column(i))
                    .map_err(|_| anyhow::anyhow!("Parquet file missing '{c}' column"))
            })
            .collect::<Result<_>>()?;
        let index_col = batch.column(index_idx);

        for row in 0..batch.num_rows() {
            let row_no = offset + row;
            let Some(protein) =
                extract_string(index_col, row).with_context(|| format!("row {row_no}"))?
            else {
                log::warn!("parquet row {row_no}: null '{}' value, skipped", selector.index);
                continue;
            };

            let values = value_cols
                .iter()
                .zip(&columns)
                .map(|(col, name)| {
                    extract_f64(col, row)
                        .map(|v| missing.resolve(v))
                        .with_context(|| format!("row {row_no}, column '{name}'"))
                })
                .collect::<Result<Vec<f64>>>()?;

            rows.push((protein, values));
        }
        offset += batch.num_rows();
    }

    QuantTable::from_rows(columns, rows)
}

// -- Arrow helpers --

fn extract_string(col: &Arc<dyn Array>, row: usize) -> Result<Option<String>> {
    if col.is_null(row) {
        return Ok(None);
    }
    let any = col.as_any();
    if let Some(s) = any.downcast_ref::<StringArray>() {
        Ok(Some(s.value(row).to_string()))
    } else if let Some(s) = any.downcast_ref::<LargeStringArray>() {
        Ok(Some(s.value(row).to_string()))
    } else {
        bail!("index column is {:?}, expected Utf8", col.data_type())
    }
}

/// Read one numeric cell; `None` for null. Non-null values go through the
/// same check as text cells.
fn extract_f64(col: &Arc<dyn Array>, row: usize) -> Result<Option<f64>> {
    if col.is_null(row) {
        return Ok(None);
    }
    let any = col.as_any();
    let v = match col.data_type() {
        DataType::Float64 => any.downcast_ref::<Float64Array>().map(|a| a.value(row)),
        DataType::Float32 => any.downcast_ref::<Float32Array>().map(|a| a.value(row) as f64),
        DataType::Int64 => any.downcast_ref::<Int64Array>().map(|a| a.value(row) as f64),
        DataType::Int32 => any.downcast_ref::<Int32Array>().map(|a| a.value(row) as f64),
        other => bail!("value column is {other:?}, expected a numeric type"),
    };
    let v = v.with_context(|| format!("unexpected array layout for {:?}", col.data_type()))?;
    check_abundance(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use arrow::datatypes::{Field, Schema};
    use arrow::record_batch::RecordBatch;
    use parquet::arrow::ArrowWriter;

    const TSV: &str = "\
\"Proteins Unique Sequence ID\"\tAbundance: F1: 126, Sample, Hela\tAbundance: F1: 127N, Sample, Lung\tAbundance Count: F1: 126\tDescription
P1\t10.5\t40\t3\tkinase
P2\t\t2.0\t1\tligase
P3\tNaN\t7\t2\tother
";

    fn write_temp(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_list_columns() {
        let file = write_temp(".tsv", TSV);
        let cols = list_columns(file.path()).unwrap();
        assert_eq!(cols.len(), 5);
        assert_eq!(cols[0], "Proteins Unique Sequence ID");
    }

    #[test]
    fn test_load_tsv_zero_fill() {
        let file = write_temp(".txt", TSV);
        let table = load_file(file.path(), &ColumnSelector::default(), MissingPolicy::ZeroFill).unwrap();

        assert_eq!(table.proteins, vec!["P1", "P2", "P3"]);
        assert_eq!(table.columns.len(), 2);
        assert_eq!(table.values[0], vec![10.5, 40.0]);
        assert_eq!(table.values[1], vec![0.0, 2.0]);
        assert_eq!(table.values[2], vec![0.0, 7.0]);
    }

    #[test]
    fn test_load_tsv_keep_missing() {
        let file = write_temp(".tsv", TSV);
        let table =
            load_file(file.path(), &ColumnSelector::default(), MissingPolicy::KeepMissing).unwrap();
        assert!(table.values[1][0].is_nan());
        assert!(table.values[2][0].is_nan());
    }

    #[test]
    fn test_load_csv() {
        let file = write_temp(".csv", "id,a1,b1\nP1,1,2\nP2,3,\n");
        let selector = ColumnSelector {
            index: "id".to_string(),
            prefix: None,
            ..Default::default()
        };
        let table = load_file(file.path(), &selector, MissingPolicy::ZeroFill).unwrap();
        assert_eq!(table.columns, vec!["a1", "b1"]);
        assert_eq!(table.values[1], vec![3.0, 0.0]);
    }

    #[test]
    fn test_bad_cell_reported() {
        let file = write_temp(".csv", "id,a1\nP1,abc\n");
        let selector = ColumnSelector {
            index: "id".to_string(),
            prefix: None,
            ..Default::default()
        };
        let err = load_file(file.path(), &selector, MissingPolicy::ZeroFill).unwrap_err();
        assert!(format!("{err:#}").contains("not a number"));
    }

    #[test]
    fn test_missing_index_column() {
        let file = write_temp(".csv", "protein,a1\nP1,1\n");
        let selector = ColumnSelector {
            prefix: None,
            ..Default::default()
        };
        assert!(load_file(file.path(), &selector, MissingPolicy::ZeroFill).is_err());
    }

    #[test]
    fn test_unsupported_extension() {
        let file = write_temp(".xlsx", "");
        assert!(load_file(file.path(), &ColumnSelector::default(), MissingPolicy::ZeroFill).is_err());
    }

    fn write_parquet(batches: &[RecordBatch]) -> tempfile::NamedTempFile {
        let file = tempfile::Builder::new().suffix(".parquet").tempfile().unwrap();
        let mut writer =
            ArrowWriter::try_new(file.reopen().unwrap(), batches[0].schema(), None).unwrap();
        for batch in batches {
            writer.write(batch).unwrap();
        }
        writer.close().unwrap();
        file
    }

    fn float_batch(proteins: &[&str], values: Vec<Option<f64>>) -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("protein", DataType::Utf8, false),
            Field::new("Abundance: a1", DataType::Float64, true),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(proteins.to_vec())),
                Arc::new(Float64Array::from(values)),
            ],
        )
        .unwrap()
    }

    fn protein_selector() -> ColumnSelector {
        ColumnSelector {
            index: "protein".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_infinite_cell_rejected() {
        let selector = ColumnSelector {
            index: "id".to_string(),
            prefix: None,
            ..Default::default()
        };
        for cell in ["inf", "Infinity", "-inf"] {
            let file = write_temp(".tsv", &format!("id\tA_1\nP1\t{cell}\n"));
            let err = load_file(file.path(), &selector, MissingPolicy::ZeroFill).unwrap_err();
            assert!(format!("{err:#}").contains("not a finite abundance"), "{cell}: {err:#}");
        }
    }

    #[test]
    fn test_negative_cell_rejected() {
        let file = write_temp(".csv", "id,a1\nP1,-3\n");
        let selector = ColumnSelector {
            index: "id".to_string(),
            prefix: None,
            ..Default::default()
        };
        let err = load_file(file.path(), &selector, MissingPolicy::ZeroFill).unwrap_err();
        assert!(format!("{err:#}").contains("negative abundance"));
    }

    #[test]
    fn test_parquet_negative_rejected() {
        let file = write_parquet(&[float_batch(&["P1", "P2"], vec![Some(5.0), Some(-5.0)])]);
        let err = load_file(file.path(), &protein_selector(), MissingPolicy::ZeroFill).unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("negative abundance"), "{msg}");
        assert!(msg.contains("row 1"), "{msg}");
    }

    #[test]
    fn test_parquet_infinite_rejected() {
        let file = write_parquet(&[float_batch(&["P1"], vec![Some(f64::INFINITY)])]);
        let err = load_file(file.path(), &protein_selector(), MissingPolicy::KeepMissing).unwrap_err();
        assert!(format!("{err:#}").contains("not a finite abundance"));
    }

    #[test]
    fn test_parquet_nan_is_missing() {
        let file = write_parquet(&[float_batch(&["P1", "P2"], vec![Some(f64::NAN), Some(2.0)])]);
        let table = load_file(file.path(), &protein_selector(), MissingPolicy::ZeroFill).unwrap();
        assert_eq!(table.values, vec![vec![0.0], vec![2.0]]);
    }

    #[test]
    fn test_parquet_row_numbers_span_batches() {
        let good = write_parquet(&[
            float_batch(&["P1", "P2"], vec![Some(1.0), Some(2.0)]),
            float_batch(&["P3", "P4"], vec![Some(3.0), None]),
        ]);
        let table = read_parquet(good.path(), &protein_selector(), MissingPolicy::ZeroFill, 2).unwrap();
        assert_eq!(table.proteins, vec!["P1", "P2", "P3", "P4"]);

        let bad = write_parquet(&[
            float_batch(&["P1", "P2"], vec![Some(1.0), Some(2.0)]),
            float_batch(&["P3", "P4"], vec![Some(3.0), Some(-4.0)]),
        ]);
        let err = read_parquet(bad.path(), &protein_selector(), MissingPolicy::ZeroFill, 2)
            .unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("row 3, column 'Abundance: a1'"), "{msg}");
    }

    #[test]
    fn test_load_parquet() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("protein", DataType::Utf8, false),
            Field::new("Abundance: a1", DataType::Float64, true),
            Field::new("Abundance: b1", DataType::Int64, false),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(StringArray::from(vec!["P1", "P2"])),
                Arc::new(Float64Array::from(vec![Some(1.5), None])),
                Arc::new(Int64Array::from(vec![4, 8])),
            ],
        )
        .unwrap();

        let file = write_parquet(&[batch]);

        let selector = ColumnSelector {
            index: "protein".to_string(),
            ..Default::default()
        };
        let table = load_file(file.path(), &selector, MissingPolicy::ZeroFill).unwrap();
        assert_eq!(table.proteins, vec!["P1", "P2"]);
        assert_eq!(table.values, vec![vec![1.5, 4.0], vec![0.0, 8.0]]);

        let cols = list_columns(file.path()).unwrap();
        assert_eq!(cols, vec!["protein", "Abundance: a1", "Abundance: b1"]);
    }
}
