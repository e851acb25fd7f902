//! Per-epoch training metrics as exchanged with the external trainer.

use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::info;

/// Metric names plus one row of values per epoch.
///
/// By convention the first two columns are the train and valid losses.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsLog {
    names: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl MetricsLog {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn epochs(&self) -> usize {
        self.rows.len()
    }

    /// Record the values of the next epoch, one per metric name
    pub fn push_epoch(&mut self, values: Vec<f64>) -> Result<()> {
        if values.len() != self.names.len() {
            bail!(
                "Expected {} metric values, got {}",
                self.names.len(),
                values.len()
            );
        }
        self.rows.push(values);
        Ok(())
    }

    /// Values of one metric across all epochs
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let index = self.names.iter().position(|n| n == name)?;
        Some(self.rows.iter().map(|row| row[index]).collect())
    }

    /// All metrics as column-major series, in name order
    pub fn series(&self) -> Vec<Vec<f64>> {
        (0..self.names.len())
            .map(|i| self.rows.iter().map(|row| row[i]).collect())
            .collect()
    }

    /// Write `epoch,<names...>` followed by one row per epoch, counting from 1
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;

        let mut header = vec!["epoch".to_string()];
        header.extend(self.names.iter().cloned());
        writer.write_record(&header)?;

        for (epoch, row) in self.rows.iter().enumerate() {
            let mut record = vec![(epoch + 1).to_string()];
            record.extend(row.iter().map(|v| v.to_string()));
            writer.write_record(&record)?;
        }
        writer.flush()?;

        info!("Metrics saved to {}", path.display());
        Ok(())
    }

    /// Read a file written by [`MetricsLog::write_csv`] (or any CSV whose
    /// first column is `epoch`)
    pub fn read_csv(path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;

        let headers = reader.headers()?.clone();
        let mut columns = headers.iter();
        match columns.next() {
            Some("epoch") => {}
            other => bail!(
                "{}: first column must be 'epoch', found {:?}",
                path.display(),
                other
            ),
        }
        let mut log = MetricsLog::new(columns);

        for (line, record) in reader.records().enumerate() {
            let record = record.with_context(|| format!("{}: bad row {}", path.display(), line + 1))?;
            let values = record
                .iter()
                .skip(1)
                .map(|field| field.trim().parse::<f64>())
                .collect::<std::result::Result<Vec<_>, _>>()
                .with_context(|| format!("{}: non-numeric value in row {}", path.display(), line + 1))?;
            log.push_epoch(values)?;
        }

        Ok(log)
    }
}
