//! Writes a synthetic TMT quantification table (`sample_quant.tsv` and
//! `sample_quant.parquet`) for trying out the viewer.

use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

const INDEX: &str = "Proteins Unique Sequence ID";
const N_PROTEINS: usize = 600;
const N_UP: usize = 12;
const N_DOWN: usize = 12;

/// (TMT channel, cell type)
const CHANNELS: [(&str, &str); 11] = [
    ("126", "Carrier"),
    ("127N", "Hela"),
    ("127C", "Hela"),
    ("128N", "Hela"),
    ("128C", "Lung"),
    ("129N", "Lung"),
    ("129C", "Lung"),
    ("130N", "Liver"),
    ("130C", "Liver"),
    ("131N", "Liver"),
    ("131C", "Blank"),
];

/// SplitMix64; deterministic and good enough for test data.
struct SplitMix(u64);

impl SplitMix {
    fn next_u64(&mut self) -> u64 {
        self.0 = self.0.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    fn uniform(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn normal(&mut self) -> f64 {
        let u1 = self.uniform().max(1e-300);
        let u2 = self.uniform();
        (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
    }
}

fn column_name(label: &str, cell: &str) -> String {
    format!("Abundance: F1: {label}, Sample, {cell}")
}

/// Fold change applied to a protein in a given cell type.
fn effect(protein: usize, cell: &str) -> f64 {
    match (cell, protein) {
        ("Lung", p) if p < N_UP => 6.0,
        ("Liver", p) if (N_UP..N_UP + N_DOWN).contains(&p) => 0.15,
        ("Carrier", _) => 20.0,
        _ => 1.0,
    }
}

fn simulate(rng: &mut SplitMix) -> (Vec<String>, Vec<Vec<Option<f64>>>) {
    let mut proteins = Vec::with_capacity(N_PROTEINS);
    let mut columns: Vec<Vec<Option<f64>>> = vec![Vec::with_capacity(N_PROTEINS); CHANNELS.len()];

    for p in 0..N_PROTEINS {
        proteins.push(format!("PROT{p:04}"));
        let base = (10.0 + 1.5 * rng.normal()).exp();

        for (c, &(_, cell)) in CHANNELS.iter().enumerate() {
            if cell == "Blank" {
                columns[c].push(None);
                continue;
            }
            let value = base * effect(p, cell) * (0.15 * rng.normal()).exp();
            // low-abundance signal drops out more often
            let dropout = (1.0 - value.ln() / 14.0).clamp(0.02, 0.6);
            columns[c].push((rng.uniform() >= dropout).then_some(value.round()));
        }
    }

    (proteins, columns)
}

fn write_tsv(path: &str, proteins: &[String], columns: &[Vec<Option<f64>>]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(path)
        .with_context(|| format!("creating {path}"))?;

    let mut header = vec![INDEX.to_string()];
    header.extend(CHANNELS.iter().map(|(l, c)| column_name(l, c)));
    header.push("Description".to_string());
    writer.write_record(&header)?;

    for (i, protein) in proteins.iter().enumerate() {
        let mut record = vec![protein.clone()];
        record.extend(
            columns
                .iter()
                .map(|col| col[i].map(|v| v.to_string()).unwrap_or_default()),
        );
        record.push(format!("synthetic protein {i}"));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_parquet(path: &str, proteins: &[String], columns: &[Vec<Option<f64>>]) -> Result<()> {
    let mut fields = vec![Field::new(INDEX, DataType::Utf8, false)];
    fields.extend(
        CHANNELS
            .iter()
            .map(|(l, c)| Field::new(column_name(l, c), DataType::Float64, true)),
    );
    let schema = Arc::new(Schema::new(fields));

    let mut arrays: Vec<ArrayRef> = vec![Arc::new(StringArray::from(proteins.to_vec()))];
    arrays.extend(
        columns
            .iter()
            .map(|col| Arc::new(Float64Array::from(col.clone())) as ArrayRef),
    );
    let batch = RecordBatch::try_new(schema.clone(), arrays).context("building record batch")?;

    let file = std::fs::File::create(path).with_context(|| format!("creating {path}"))?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

fn main() -> Result<()> {
    let mut rng = SplitMix(42);
    let (proteins, columns) = simulate(&mut rng);

    write_tsv("sample_quant.tsv", &proteins, &columns)?;
    write_parquet("sample_quant.parquet", &proteins, &columns)?;

    println!(
        "Wrote {} proteins × {} channels ({} up in Lung, {} down in Liver) to sample_quant.tsv / .parquet",
        proteins.len(),
        CHANNELS.len(),
        N_UP,
        N_DOWN
    );
    Ok(())
}
