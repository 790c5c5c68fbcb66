use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::classify::FailureClassifier;
use crate::classify::taxonomy;
use crate::extract::{ReportLayout, ReportRecord, pdf};

/// All `.pdf` files in `dir`, in directory listing order.
pub fn collect_pdf_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("reading report directory {}", dir.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
        {
            files.push(path);
        }
    }
    Ok(files)
}

/// One record per file, in input order. A file whose text cannot be read
/// still yields its row, with every field at the layout's fallback.
pub fn extract_files(files: &[PathBuf], layout: ReportLayout) -> Vec<ReportRecord> {
    let bar = progress_bar(files.len() as u64, "Processing PDFs");
    let mut records = Vec::with_capacity(files.len());

    for path in files {
        let label = layout.file_label(path);
        let record = match pdf::extract_text(path) {
            Ok(text) => layout.extract(&text, &label),
            Err(err) => {
                warn!(file = %path.display(), %err, "falling back to an empty record");
                layout.extract("", &label)
            }
        };
        records.push(record);
        bar.inc(1);
    }

    bar.finish_and_clear();
    records
}

pub fn write_records(records: &[ReportRecord], output: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(output)
        .with_context(|| format!("creating output table {}", output.display()))?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    info!(rows = records.len(), output = %output.display(), "extraction table written");
    Ok(())
}

pub fn read_records(input: &Path) -> Result<Vec<ReportRecord>> {
    let mut reader = csv::Reader::from_path(input)
        .with_context(|| format!("opening table {}", input.display()))?;
    let records = reader
        .deserialize()
        .collect::<Result<Vec<ReportRecord>, _>>()?;
    Ok(records)
}

/// Classify every row of the input table in order, appending the raw result
/// object and its extracted label, then log the label distribution.
pub async fn classify_table(
    input: &Path,
    output: &Path,
    classifier: &FailureClassifier,
    max_retries: u32,
) -> Result<()> {
    let mut reader = csv::Reader::from_path(input)
        .with_context(|| format!("opening input table {}", input.display()))?;
    let headers = reader.headers()?.clone();
    let subject_idx = headers
        .iter()
        .position(|h| h == "subject")
        .context("input table has no `subject` column")?;
    let description_idx = headers
        .iter()
        .position(|h| h == "description")
        .context("input table has no `description` column")?;

    let rows = reader
        .records()
        .collect::<Result<Vec<csv::StringRecord>, _>>()?;
    info!(rows = rows.len(), "starting classification");

    let mut writer = csv::Writer::from_path(output)
        .with_context(|| format!("creating output table {}", output.display()))?;
    let mut out_headers = headers.clone();
    out_headers.push_field("llm_classification");
    out_headers.push_field("failure_type");
    writer.write_record(&out_headers)?;

    let bar = progress_bar(rows.len() as u64, "Classifying reports");
    let mut distribution: BTreeMap<String, usize> = BTreeMap::new();

    for row in &rows {
        let subject = row.get(subject_idx).unwrap_or_default();
        let description = row.get(description_idx).unwrap_or_default();

        let result = classifier
            .classify_report(subject, description, max_retries)
            .await;
        let label = result
            .get("failure_type")
            .and_then(Value::as_str)
            .unwrap_or("Error")
            .to_string();
        if !label.contains("Error") && !taxonomy::is_known_labels(&label) {
            warn!(%label, "failure type outside the known category set");
        }
        *distribution.entry(label.clone()).or_default() += 1;

        let mut out = row.clone();
        out.push_field(&result.to_string());
        out.push_field(&label);
        writer.write_record(&out)?;
        bar.inc(1);
    }

    bar.finish_and_clear();
    writer.flush()?;
    info!(rows = rows.len(), output = %output.display(), "classification complete");

    for (label, count) in &distribution {
        info!(%label, count, "failure type count");
    }
    let errors: usize = distribution
        .iter()
        .filter(|(label, _)| label.contains("Error"))
        .map(|(_, count)| *count)
        .sum();
    if errors > 0 {
        warn!(errors, "reports had classification errors");
    }

    Ok(())
}

fn progress_bar(len: u64, message: &'static str) -> ProgressBar {
    let bar = ProgressBar::new(len);
    bar.set_style(
        ProgressStyle::with_template("{msg} [{bar:40}] {pos}/{len}")
            .unwrap()
            .progress_chars("=> "),
    );
    bar.set_message(message);
    bar
}
