//! Rendering seam between the pipeline and the caller's display layer.

use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::Path;

use crate::config::DisplayOptions;
use crate::errors::PipelineError;
use crate::record_set::RecordSet;
use crate::types::Row;

/// Shape of the final record set handed to a renderer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TableMeta {
    /// Lines in the file, header included.
    pub row_count: usize,
    /// Columns declared by the header.
    pub columns: usize,
}

/// Draws a final record set for display.
pub trait Renderer {
    /// Render `file` to `out` according to `options`.
    fn render(
        &mut self,
        file: &Path,
        options: &DisplayOptions,
        meta: &TableMeta,
        out: &mut dyn Write,
    ) -> Result<(), PipelineError>;
}

/// Minimal text renderer: padded columns, or one field per line in vertical mode.
#[derive(Clone, Debug)]
pub struct PlainRenderer {
    delimiter: u8,
}

impl PlainRenderer {
    /// Renderer reading files with `delimiter`.
    pub fn new(delimiter: u8) -> Self {
        Self { delimiter }
    }
}

impl Default for PlainRenderer {
    fn default() -> Self {
        Self::new(crate::constants::runner::DEFAULT_DELIMITER)
    }
}

impl Renderer for PlainRenderer {
    fn render(
        &mut self,
        file: &Path,
        options: &DisplayOptions,
        _meta: &TableMeta,
        out: &mut dyn Write,
    ) -> Result<(), PipelineError> {
        let set = RecordSet::read(file, self.delimiter).map_err(render_err)?;
        let header = match &options.header_override {
            Some(names) => names.split(',').map(|name| name.trim().to_string()).collect(),
            None => set.header.clone(),
        };
        let written = if options.vertical {
            write_vertical(&header, &set.rows, out)
        } else {
            write_table(&header, &set.rows, out)
        };
        written.map_err(render_err)
    }
}

/// Copy `file` to `out` byte for byte.
pub fn copy_raw(file: &Path, out: &mut dyn Write) -> Result<(), PipelineError> {
    let mut reader = BufReader::new(File::open(file).map_err(render_err)?);
    io::copy(&mut reader, out).map_err(render_err)?;
    Ok(())
}

fn render_err(err: io::Error) -> PipelineError {
    PipelineError::Render(err.to_string())
}

fn write_table(header: &Row, rows: &[Row], out: &mut dyn Write) -> io::Result<()> {
    let columns = rows.iter().map(Vec::len).chain([header.len()]).max().unwrap_or(0);
    let mut widths = vec![0usize; columns];
    for row in std::iter::once(header).chain(rows) {
        for (idx, field) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(field.chars().count());
        }
    }
    write_table_row(header, &widths, out)?;
    let rule: Vec<String> = widths.iter().map(|width| "-".repeat(*width)).collect();
    writeln!(out, "{}", rule.join("-+-"))?;
    for row in rows {
        write_table_row(row, &widths, out)?;
    }
    Ok(())
}

fn write_table_row(row: &Row, widths: &[usize], out: &mut dyn Write) -> io::Result<()> {
    let cells: Vec<String> = widths
        .iter()
        .enumerate()
        .map(|(idx, &width)| {
            let field = row.get(idx).map(String::as_str).unwrap_or("");
            format!("{field:<width$}")
        })
        .collect();
    writeln!(out, "{}", cells.join(" | ").trim_end())
}

fn write_vertical(header: &Row, rows: &[Row], out: &mut dyn Write) -> io::Result<()> {
    let width = header.iter().map(|name| name.chars().count()).max().unwrap_or(0);
    for (number, row) in rows.iter().enumerate() {
        writeln!(out, "*** {}. row ***", number + 1)?;
        for (idx, field) in row.iter().enumerate() {
            let name = header.get(idx).map(String::as_str).unwrap_or("");
            writeln!(out, "{name:>width$}: {field}")?;
        }
    }
    Ok(())
}
