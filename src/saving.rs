use crate::error::TrackerError;
use crate::table::CountsTable;
use log::info;
use rust_xlsxwriter::{Workbook, XlsxError};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Persist the whole counts table to `path`.
///
/// The format follows the extension, like the loader. The bytes go to a
/// temporary file in the same directory which then replaces `path`, so a
/// failed write leaves the previous file intact.
pub fn save_counts(table: &CountsTable, path: &Path) -> Result<(), TrackerError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase());

    let bytes = match extension.as_deref() {
        Some("csv") => to_csv(table).into_bytes(),
        Some("xlsx") => to_xlsx(table).map_err(|e| TrackerError::save(path, e))?,
        Some(ext) => {
            return Err(TrackerError::save(
                path,
                format!("unsupported file extension: {}", ext),
            ));
        }
        None => return Err(TrackerError::save(path, "file has no extension")),
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| TrackerError::save(path, e))?;
    tmp.write_all(&bytes)
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| TrackerError::save(path, e))?;
    tmp.persist(path)
        .map_err(|e| TrackerError::save(path, e.error))?;

    info!("saved {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

/// Convert the counts table to CSV
///
/// Header row is the identifying column then the boss columns. Empty cells
/// stay empty; fields containing commas, quotes or newlines are quoted.
pub fn to_csv(table: &CountsTable) -> String {
    let mut csv_content = String::new();

    let header = std::iter::once(table.id_header()).chain(table.bosses().iter().map(String::as_str));
    push_csv_line(&mut csv_content, header.map(escape_csv_field));

    for row in table.rows() {
        let fields = std::iter::once(escape_csv_field(&row.label)).chain(
            row.cells
                .iter()
                .map(|cell| cell.map(|v| v.to_string()).unwrap_or_default()),
        );
        push_csv_line(&mut csv_content, fields);
    }

    csv_content
}

/// Convert the counts table to XLSX bytes using rust_xlsxwriter.
pub fn to_xlsx(table: &CountsTable) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();

    worksheet.write_string(0, 0, table.id_header())?;
    for (c, boss) in table.bosses().iter().enumerate() {
        worksheet.write_string(0, (c + 1) as u16, boss.as_str())?;
    }

    for (r, row) in table.rows().iter().enumerate() {
        let xl_row = (r + 1) as u32;
        worksheet.write_string(xl_row, 0, row.label.as_str())?;
        for (c, cell) in row.cells.iter().enumerate() {
            if let Some(value) = cell {
                worksheet.write_number(xl_row, (c + 1) as u16, *value as f64)?;
            }
        }
    }

    workbook.save_to_buffer()
}

fn push_csv_line(out: &mut String, fields: impl Iterator<Item = String>) {
    for (i, field) in fields.enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&field);
    }
    out.push('\n');
}

fn escape_csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
