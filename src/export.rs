//! Export of weighted term sets.

use std::fs;
use std::path::Path;

use clap::ValueEnum;
use csv::WriterBuilder;
use log::info;
use serde::Serialize;

use crate::error::Result;
use crate::normalize::WeightedTermSet;

/// Supported export formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Txt,
    Csv,
    Tsv,
    Json,
}

/// Neutralises spreadsheet formula injection: cells starting with `=`, `+`,
/// `-`, `@`, tab or carriage return get a leading `'`.
pub fn csv_safe_cell(cell: String) -> String {
    match cell.chars().next() {
        Some('=' | '+' | '-' | '@' | '\t' | '\r') => format!("'{cell}"),
        _ => cell,
    }
}

#[derive(Serialize)]
struct Row<'a> {
    term: &'a str,
    variant: usize,
    tier: String,
    weight: f64,
}

/// Writes one row per entry: term, variant index, tier, weight.
pub fn export_terms(terms: &WeightedTermSet, path: &Path, format: ExportFormat) -> Result<()> {
    let rows: Vec<Row> = terms
        .iter()
        .map(|e| Row {
            term: &e.source_term,
            variant: e.variant_index,
            tier: e.tier.to_string(),
            weight: e.weight,
        })
        .collect();

    match format {
        ExportFormat::Txt => {
            let mut out = String::new();
            for r in &rows {
                out.push_str(&format!(
                    "Term: {:?}, Variant: {}, Tier: {}, Weight: {:.3}\n",
                    r.term, r.variant, r.tier, r.weight
                ));
            }
            fs::write(path, out)?;
        }
        ExportFormat::Csv | ExportFormat::Tsv => {
            let delimiter = if format == ExportFormat::Tsv { b'\t' } else { b',' };
            let mut wtr = WriterBuilder::new().delimiter(delimiter).from_path(path)?;
            wtr.write_record(["term", "variant", "tier", "weight"])?;
            for r in &rows {
                wtr.write_record([
                    csv_safe_cell(r.term.to_string()),
                    r.variant.to_string(),
                    r.tier.clone(),
                    format!("{:.3}", r.weight),
                ])?;
            }
            wtr.flush()?;
        }
        ExportFormat::Json => {
            let json = serde_json::to_string_pretty(&rows)?;
            fs::write(path, json)?;
        }
    }
    info!("Exported {} entries to {}", rows.len(), path.display());
    Ok(())
}
