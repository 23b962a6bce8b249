pub mod output;

pub use output::{
    create_writer, JsonWriter, OutputFormat, OutputWriter, ReportEnvelope, TerminalWriter,
};

use anyhow::Result;
use std::fs;
use std::path::Path;

pub fn read_file(path: &Path) -> Result<String> {
    Ok(fs::read_to_string(path)?)
}

pub fn write_file(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content)?;
    Ok(())
}
