//! Result rendering for text and JSON modes.

use crate::config::OutputFormat;
use crate::error::Result;
use std::io::Write;

/// Renders command results to stdout
#[derive(Debug, Clone, Copy)]
pub struct OutputWriter {
    pub format: OutputFormat,
    pub omit_newline: bool,
}

impl OutputWriter {
    pub fn new(format: OutputFormat, omit_newline: bool) -> Self {
        Self {
            format,
            omit_newline,
        }
    }

    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    pub fn render_bool(&self, value: bool) -> String {
        self.finish(value.to_string())
    }

    /// Node values are shown as (lossy) UTF-8.
    pub fn render_data(&self, data: &[u8]) -> Result<String> {
        let text = String::from_utf8_lossy(data);
        let body = match self.format {
            OutputFormat::Json => serde_json::to_string(&text)?,
            OutputFormat::Txt => text.into_owned(),
        };
        Ok(self.finish(body))
    }

    pub fn render_list(&self, items: &[String]) -> Result<String> {
        let body = match self.format {
            OutputFormat::Json => serde_json::to_string(items)?,
            OutputFormat::Txt => items.join("\n"),
        };
        Ok(self.finish(body))
    }

    pub fn render_path(&self, path: &str) -> Result<String> {
        let body = match self.format {
            OutputFormat::Json => serde_json::to_string(path)?,
            OutputFormat::Txt => path.to_string(),
        };
        Ok(self.finish(body))
    }

    fn finish(&self, mut body: String) -> String {
        if !(self.omit_newline && self.format == OutputFormat::Txt) {
            body.push('\n');
        }
        body
    }

    /// Write a rendered result to stdout
    pub fn emit(&self, rendered: &str) -> Result<()> {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        handle.write_all(rendered.as_bytes())?;
        handle.flush()?;
        Ok(())
    }
}
