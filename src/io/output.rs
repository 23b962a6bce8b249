//! Report writers for the CLI.

use crate::planner::MethodReport;
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use colored::*;
use serde::{Deserialize, Serialize};
use std::io::Write;

/// What the JSON format actually emits: the reports plus a timestamp.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReportEnvelope {
    pub generated_at: DateTime<Utc>,
    pub reports: Vec<MethodReport>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Terminal,
}

pub trait OutputWriter {
    fn write_reports(&mut self, reports: &[MethodReport]) -> anyhow::Result<()>;
}

pub fn create_writer<W: Write + 'static>(format: OutputFormat, writer: W) -> Box<dyn OutputWriter> {
    match format {
        OutputFormat::Json => Box::new(JsonWriter::new(writer)),
        OutputFormat::Terminal => Box::new(TerminalWriter::new(writer)),
    }
}

pub struct JsonWriter<W: Write> {
    writer: W,
}

impl<W: Write> JsonWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: Write> OutputWriter for JsonWriter<W> {
    fn write_reports(&mut self, reports: &[MethodReport]) -> anyhow::Result<()> {
        let envelope = ReportEnvelope {
            generated_at: Utc::now(),
            reports: reports.to_vec(),
        };
        let json = serde_json::to_string_pretty(&envelope)?;
        self.writer.write_all(json.as_bytes())?;
        writeln!(self.writer)?;
        Ok(())
    }
}

pub struct TerminalWriter<W: Write> {
    writer: W,
}

impl<W: Write> TerminalWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    fn write_report(&mut self, report: &MethodReport) -> anyhow::Result<()> {
        if let Some(error) = &report.error {
            writeln!(
                self.writer,
                "{} {}",
                report.method.bold(),
                format!("failed: {}", error).red()
            )?;
            return Ok(());
        }

        let status = if report.over_threshold() {
            "over threshold".red()
        } else {
            "ok".green()
        };
        writeln!(
            self.writer,
            "{} CC {} -> {} (threshold {}) [{}]",
            report.method.bold(),
            report.complexity,
            report.residual_complexity,
            report.threshold,
            status
        )?;

        if report.extraction_count == 0 {
            writeln!(self.writer, "  no extractions needed")?;
        }
        for e in &report.extractions {
            writeln!(
                self.writer,
                "  extract [{}, {}): -{} CC, new method CC {}, {} LOC, {} params",
                e.start, e.end, e.reduction_of_cc, e.extracted_method_cc, e.extracted_loc,
                e.param_count
            )?;
        }
        if !report.certified {
            writeln!(
                self.writer,
                "  {}",
                "search budget hit; solution may not be optimal".yellow()
            )?;
        }
        writeln!(
            self.writer,
            "  cache: {} entries, {} hits, {} misses",
            report.cache_entries, report.cache_hits, report.cache_misses
        )?;
        Ok(())
    }
}

impl<W: Write> OutputWriter for TerminalWriter<W> {
    fn write_reports(&mut self, reports: &[MethodReport]) -> anyhow::Result<()> {
        for report in reports {
            self.write_report(report)?;
        }
        let over = reports.iter().filter(|r| r.over_threshold()).count();
        writeln!(
            self.writer,
            "{} methods, {} still over threshold",
            reports.len(),
            over
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_report() -> MethodReport {
        MethodReport {
            method: "process".to_string(),
            complexity: 7,
            threshold: 3,
            candidate_blocks: 3,
            feasible: true,
            certified: true,
            extraction_count: 1,
            fitness: Some(1.0),
            reduced_complexity: 5,
            residual_complexity: 2,
            extractions: vec![crate::planner::ExtractionReport {
                start: 70,
                end: 180,
                reduction_of_cc: 5,
                extracted_method_cc: 3,
                extracted_loc: 5,
                param_count: 1,
            }],
            stats: None,
            cache_entries: 6,
            cache_hits: 4,
            cache_misses: 6,
            error: None,
        }
    }

    #[test]
    fn test_json_roundtrips() {
        let mut buf = Vec::new();
        JsonWriter::new(&mut buf)
            .write_reports(&[sample_report()])
            .unwrap();
        let parsed: ReportEnvelope = serde_json::from_slice(&buf).unwrap();
        assert_eq!(parsed.reports.len(), 1);
        assert_eq!(parsed.reports[0].method, "process");
        assert_eq!(parsed.reports[0].residual_complexity, 2);
    }

    #[test]
    fn test_terminal_lists_extractions() {
        let mut buf = Vec::new();
        TerminalWriter::new(&mut buf)
            .write_reports(&[sample_report()])
            .unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("process"));
        assert!(text.contains("extract [70, 180)"));
        assert!(text.contains("1 methods, 0 still over threshold"));
    }

    #[test]
    fn test_terminal_reports_failures() {
        let report = MethodReport::failed("broken", &crate::errors::Error::model("two sinks"));
        let mut buf = Vec::new();
        TerminalWriter::new(&mut buf).write_reports(&[report]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("failed: "));
    }
}
