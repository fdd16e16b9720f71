use std::fs;
use std::io::{BufWriter, Write};

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::NamedTempFile;
use tracing::{info, instrument};

use crate::error::{Error, Result};
use crate::extraction::ExtractionResult;

const SECTION_RULE_WIDTH: usize = 50;
const ENTRY_RULE_WIDTH: usize = 80;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Written { path: Utf8PathBuf, entries: usize },
    NothingToWrite,
}

/// Writes extraction results as a plain-text report inside the output
/// directory.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    output_directory: Utf8PathBuf,
}

fn write_entry(out: &mut impl Write, result: &ExtractionResult) -> std::io::Result<()> {
    writeln!(out, "=== {} ===", result.source_name())?;
    writeln!(out, "Text Length: {} characters", result.length())?;
    writeln!(out, "{}", "-".repeat(SECTION_RULE_WIDTH))?;
    write!(out, "{}", result.text())?;
    write!(out, "\n\n{}\n\n", "=".repeat(ENTRY_RULE_WIDTH))
}

impl ReportWriter {
    pub fn new(output_directory: impl Into<Utf8PathBuf>) -> Self {
        Self {
            output_directory: output_directory.into(),
        }
    }

    pub fn output_directory(&self) -> &Utf8Path {
        &self.output_directory
    }

    /// Writes every non-empty result, in order, to `file_name`.
    ///
    /// The report is staged next to its destination and only moved into
    /// place once complete, so a failed run never leaves a partial file and
    /// an empty stream leaves no file at all.
    #[instrument(skip(self, results))]
    pub fn write<I>(&self, results: I, file_name: &str) -> Result<WriteOutcome>
    where
        I: IntoIterator<Item = ExtractionResult>,
    {
        let destination = self.destination(file_name)?;
        let write_failure = |source: std::io::Error| Error::WriteFailure {
            path: destination.clone(),
            source,
        };

        let mut results = results.into_iter().filter(|r| !r.is_empty()).peekable();
        if results.peek().is_none() {
            info!("no data to save");
            return Ok(WriteOutcome::NothingToWrite);
        }

        fs::create_dir_all(&self.output_directory).map_err(write_failure)?;
        let staged = NamedTempFile::new_in(&self.output_directory).map_err(write_failure)?;
        let mut out = BufWriter::new(staged);
        let mut entries = 0;
        for result in results {
            write_entry(&mut out, &result).map_err(write_failure)?;
            entries += 1;
        }

        let file = out
            .into_inner()
            .map_err(|e| write_failure(e.into_error()))?;
        file.as_file().sync_all().map_err(write_failure)?;
        file.persist(&destination)
            .map_err(|e| write_failure(e.error))?;

        info!("text data saved to {destination} ({entries} entries)");
        Ok(WriteOutcome::Written {
            path: destination,
            entries,
        })
    }

    fn destination(&self, file_name: &str) -> Result<Utf8PathBuf> {
        let plain = Utf8Path::new(file_name).file_name() == Some(file_name);
        if !plain {
            return Err(Error::InvalidReportName(file_name.to_string()));
        }
        Ok(self.output_directory.join(file_name))
    }
}
