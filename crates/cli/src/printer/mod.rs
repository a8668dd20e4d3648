use std::io::{self, Write};

use anyhow::Result;
use chrono::{DateTime, Utc};

use sift_store::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Print records to stdout, newest first, in the chosen format.
pub fn print_records(records: &[Record], format: OutputFormat) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    for record in records {
        match format {
            OutputFormat::Human => writeln!(out, "{}", human_line(record))?,
            OutputFormat::Json => {
                serde_json::to_writer(&mut out, record)?;
                writeln!(out)?;
            }
        }
    }
    out.flush()?;
    Ok(())
}

fn human_line(record: &Record) -> String {
    let ts = DateTime::<Utc>::from_timestamp_millis(record.ts_ms)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S%.3f").to_string())
        .unwrap_or_else(|| record.ts_ms.to_string());

    format!(
        "{:>8}  {}  {:7}  {:16}  {}",
        record.seq,
        ts,
        format!("{:?}", record.level).to_uppercase(),
        record.source,
        record.message
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use sift_store::Level;

    #[test]
    fn human_line_contains_the_essentials() {
        let record = Record {
            seq: 7,
            ts_ms: 1_700_000_000_000,
            level: Level::Error,
            source: "billing-7f9c".into(),
            message: "connection reset".into(),
            extra: None,
        };

        let line = human_line(&record);
        assert!(line.contains("7"));
        assert!(line.contains("ERROR"));
        assert!(line.contains("billing-7f9c"));
        assert!(line.contains("connection reset"));
        assert!(line.contains("2023-11-14"), "{line}");
    }
}
