use crate::error::Result;
use crate::models::Aggregate;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// `{name=min/mean/max, ...}` on one line
    #[default]
    Text,
    /// Pretty-printed object keyed by station
    Json,
}

/// Renders the final mapping for humans or tools.
pub struct ReportWriter {
    format: ReportFormat,
}

impl ReportWriter {
    pub fn new(format: ReportFormat) -> Self {
        Self { format }
    }

    pub fn render(&self, aggregate: &Aggregate) -> Result<String> {
        match self.format {
            ReportFormat::Text => Ok(render_text(aggregate)),
            ReportFormat::Json => Ok(serde_json::to_string_pretty(&aggregate.summaries())?),
        }
    }

    pub fn write_to<W: Write>(&self, aggregate: &Aggregate, mut writer: W) -> Result<()> {
        let report = self.render(aggregate)?;
        writeln!(writer, "{}", report)?;
        writer.flush()?;
        Ok(())
    }

    pub fn write_file(&self, aggregate: &Aggregate, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = File::create(path)?;
        self.write_to(aggregate, BufWriter::new(file))
    }
}

impl Default for ReportWriter {
    fn default() -> Self {
        Self::new(ReportFormat::default())
    }
}

fn render_text(aggregate: &Aggregate) -> String {
    let mut out = String::with_capacity(aggregate.len() * 32 + 2);
    out.push('{');
    for (i, (name, stats)) in aggregate.sorted().into_iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        // Writing into a String cannot fail
        let _ = write!(
            out,
            "{}={:.1}/{:.1}/{:.1}",
            String::from_utf8_lossy(name),
            stats.min_value(),
            stats.mean(),
            stats.max_value()
        );
    }
    out.push('}');
    out
}
