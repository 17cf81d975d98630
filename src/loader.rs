use crate::config::TrackerConfig;
use crate::error::TrackerError;
use crate::table::{CountsRow, CountsTable, ReferenceRow, ReferenceTable};
use log::{info, warn};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// A cell as read from either file format, before interpretation.
#[derive(Debug, Clone, PartialEq)]
pub enum RawCell {
    Empty,
    Number(f64),
    Text(String),
}

impl RawCell {
    fn as_text(&self) -> String {
        match self {
            RawCell::Empty => String::new(),
            RawCell::Number(n) if n.fract() == 0.0 => format!("{}", *n as i64),
            RawCell::Number(n) => n.to_string(),
            RawCell::Text(s) => s.trim().to_string(),
        }
    }
}

/// Header row plus data rows of the first sheet in a file.
#[derive(Debug, Clone, Default)]
pub struct RawSheet {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<RawCell>>,
}

/// Both tables, freshly read from disk.
#[derive(Debug, Clone)]
pub struct TrackerData {
    pub reference: ReferenceTable,
    pub counts: CountsTable,
}

/// Load the reference and counts tables named by `config`.
///
/// Both files are checked for existence first so a missing pair is reported
/// together. The alias fix is applied to the counts table before returning.
pub fn load_tracker_data(config: &TrackerConfig) -> Result<TrackerData, TrackerError> {
    let missing: Vec<_> = [&config.data_file, &config.meta_file]
        .into_iter()
        .filter(|path| !path.exists())
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(TrackerError::MissingFile { paths: missing });
    }

    let reference = load_reference(&config.meta_file, config)?;
    let mut counts = load_counts(&config.data_file, config)?;

    for (alias, canonical) in &config.aliases {
        if counts.boss_index(alias).is_none() {
            continue;
        }
        if counts.rename_boss(alias, canonical) {
            info!("renamed boss column '{}' to '{}'", alias, canonical);
        } else {
            warn!(
                "boss column '{}' not renamed: '{}' already exists",
                alias, canonical
            );
        }
    }

    Ok(TrackerData { reference, counts })
}

/// Read the counts table: identifying column plus one column per boss.
pub fn load_counts(path: &Path, config: &TrackerConfig) -> Result<CountsTable, TrackerError> {
    let sheet = load_sheet(path)?;

    let id_col = match sheet.headers.iter().position(|h| *h == config.id_column) {
        Some(idx) => idx,
        None if !sheet.headers.is_empty() => {
            warn!(
                "{}: no '{}' column, using '{}' as the identifying column",
                path.display(),
                config.id_column,
                sheet.headers[0]
            );
            0
        }
        None => return Err(TrackerError::load(path, "no header row")),
    };

    let mut bosses = Vec::new();
    let mut boss_cols = Vec::new();
    for (c, header) in sheet.headers.iter().enumerate() {
        if c == id_col {
            continue;
        }
        if header.is_empty() {
            return Err(TrackerError::load(
                path,
                format!("column {} has no header", c + 1),
            ));
        }
        if bosses.contains(header) {
            return Err(TrackerError::load(
                path,
                format!("duplicate boss column '{}'", header),
            ));
        }
        bosses.push(header.clone());
        boss_cols.push(c);
    }

    let mut rows = Vec::with_capacity(sheet.rows.len());
    for (r, raw) in sheet.rows.iter().enumerate() {
        let label = raw.get(id_col).map(RawCell::as_text).unwrap_or_default();
        let mut cells = Vec::with_capacity(boss_cols.len());
        for (b, &c) in boss_cols.iter().enumerate() {
            let cell = raw.get(c).unwrap_or(&RawCell::Empty);
            let count = parse_count(cell).map_err(|reason| {
                TrackerError::load(
                    path,
                    format!("row {}, column '{}': {}", r + 2, bosses[b], reason),
                )
            })?;
            cells.push(count);
        }
        rows.push(CountsRow::new(label, cells));
    }

    // Spreadsheet editors leave fully blank rows behind; they carry no data.
    while rows
        .last()
        .is_some_and(|row| row.label.is_empty() && row.cells.iter().all(Option::is_none))
    {
        rows.pop();
    }

    let header = sheet.headers[id_col].clone();
    CountsTable::new(header, bosses, rows, config.total_label.clone())
        .map_err(|reason| TrackerError::load(path, reason))
}

/// Read the reference table: (boss full name, material name) per row.
pub fn load_reference(path: &Path, config: &TrackerConfig) -> Result<ReferenceTable, TrackerError> {
    let sheet = load_sheet(path)?;

    let find = |name: &str| sheet.headers.iter().position(|h| h == name);
    let (boss_col, material_col) = match (
        find(&config.reference_boss_column),
        find(&config.reference_material_column),
    ) {
        (Some(b), Some(m)) => (b, m),
        _ if sheet.headers.len() >= 2 => {
            warn!(
                "{}: expected columns '{}' and '{}', using the first two columns",
                path.display(),
                config.reference_boss_column,
                config.reference_material_column
            );
            (0, 1)
        }
        _ => {
            return Err(TrackerError::load(
                path,
                format!(
                    "expected columns '{}' and '{}'",
                    config.reference_boss_column, config.reference_material_column
                ),
            ));
        }
    };

    let rows = sheet
        .rows
        .iter()
        .map(|raw| ReferenceRow {
            boss_full_name: raw.get(boss_col).map(RawCell::as_text).unwrap_or_default(),
            material: raw
                .get(material_col)
                .map(RawCell::as_text)
                .unwrap_or_default(),
        })
        .filter(|row| !(row.boss_full_name.is_empty() && row.material.is_empty()))
        .collect();

    Ok(ReferenceTable::new(rows))
}

/// Detect file type and read the first sheet
///
/// Dispatches on the extension: `.xlsx`/`.xlsm`/`.xls` go through calamine,
/// `.csv` through the quote-aware reader below. Only `.xlsx` and `.csv` can
/// be written back.
pub fn load_sheet(path: &Path) -> Result<RawSheet, TrackerError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase());

    match extension.as_deref() {
        Some("csv") => from_csv(path),
        Some("xlsx") | Some("xlsm") | Some("xls") => from_excel(path),
        Some(ext) => Err(TrackerError::load(
            path,
            format!("unsupported file extension: {}", ext),
        )),
        None => Err(TrackerError::load(path, "file has no extension")),
    }
}

fn from_excel(path: &Path) -> Result<RawSheet, TrackerError> {
    use calamine::{Data, Reader, open_workbook_auto};

    let mut workbook = open_workbook_auto(path).map_err(|e| TrackerError::load(path, e))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| TrackerError::load(path, "no sheets found in workbook"))?
        .map_err(|e| TrackerError::load(path, e))?;

    let mut rows = range.rows().map(|row| {
        row.iter()
            .map(|cell| match cell {
                Data::Empty => RawCell::Empty,
                Data::Int(i) => RawCell::Number(*i as f64),
                Data::Float(f) => RawCell::Number(*f),
                Data::String(s) if s.trim().is_empty() => RawCell::Empty,
                Data::String(s) => RawCell::Text(s.clone()),
                other => RawCell::Text(other.to_string()),
            })
            .collect::<Vec<_>>()
    });

    let headers = rows
        .next()
        .ok_or_else(|| TrackerError::load(path, "sheet is empty"))?
        .iter()
        .map(RawCell::as_text)
        .collect();

    Ok(RawSheet {
        headers,
        rows: rows.collect(),
    })
}

fn from_csv(path: &Path) -> Result<RawSheet, TrackerError> {
    let file = File::open(path).map_err(|e| TrackerError::load(path, e))?;
    let reader = BufReader::new(file);
    let lines: Vec<String> = reader
        .lines()
        .collect::<Result<_, _>>()
        .map_err(|e| TrackerError::load(path, e))?;

    let mut lines = lines.iter().filter(|line| !line.trim().is_empty());
    let header_line = lines
        .next()
        .ok_or_else(|| TrackerError::load(path, "CSV file is empty"))?;

    let headers = parse_csv_row(header_line.trim_start_matches('\u{feff}'))
        .into_iter()
        .map(|h| h.trim().to_string())
        .collect();

    let rows = lines
        .map(|line| {
            parse_csv_row(line)
                .into_iter()
                .map(|field| {
                    let field = field.trim();
                    if field.is_empty() {
                        RawCell::Empty
                    } else if let Ok(num) = field.parse::<f64>() {
                        RawCell::Number(num)
                    } else {
                        RawCell::Text(field.to_string())
                    }
                })
                .collect()
        })
        .collect();

    Ok(RawSheet { headers, rows })
}

// Parse a CSV row into a vector of strings
pub(crate) fn parse_csv_row(line: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut current_field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                if in_quotes && chars.peek() == Some(&'"') {
                    // Escaped quote inside a quoted field
                    current_field.push('"');
                    chars.next();
                } else {
                    in_quotes = !in_quotes;
                }
            }
            ',' if !in_quotes => {
                result.push(std::mem::take(&mut current_field));
            }
            _ => current_field.push(c),
        }
    }

    result.push(current_field);
    result
}

/// Interpret one counts cell: empty, or a non-negative whole number.
fn parse_count(cell: &RawCell) -> Result<Option<u32>, String> {
    let number = match cell {
        RawCell::Empty => return Ok(None),
        RawCell::Number(n) => *n,
        RawCell::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("expected a count, found '{}'", s))?,
    };

    if !number.is_finite() || number < 0.0 || number.fract() != 0.0 || number > u32::MAX as f64 {
        return Err(format!("expected a non-negative integer, found {}", number));
    }
    Ok(Some(number as u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_row_handles_quotes_and_commas() {
        let row = parse_csv_row(r#"总计,"a,b","say ""hi""",,3"#);
        assert_eq!(row, vec!["总计", "a,b", r#"say "hi""#, "", "3"]);
    }

    #[test]
    fn counts_accept_integral_floats_and_blanks() {
        assert_eq!(parse_count(&RawCell::Number(4.0)), Ok(Some(4)));
        assert_eq!(parse_count(&RawCell::Empty), Ok(None));
        assert_eq!(parse_count(&RawCell::Text(" 7 ".into())), Ok(Some(7)));
    }

    #[test]
    fn counts_reject_negative_fractional_and_text() {
        assert!(parse_count(&RawCell::Number(-1.0)).is_err());
        assert!(parse_count(&RawCell::Number(1.5)).is_err());
        assert!(parse_count(&RawCell::Text("abc".into())).is_err());
    }

    #[test]
    fn unsupported_extension_is_a_load_failure() {
        let err = load_sheet(Path::new("counts.ods")).unwrap_err();
        assert!(err.is_fatal());
    }
}
