//! In-memory forms of the two spreadsheet files.
//!
//! The counts table keeps one column per boss. Its first three data rows are
//! the material slots and a row labelled with the totals label holds the
//! derived per-boss sum. The reference table is a flat list of
//! (boss full name, material name) pairs, three per boss.

/// Number of material rows per boss.
pub const MATERIAL_SLOTS: usize = 3;

/// One data row of the counts table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountsRow {
    /// Value of the identifying column.
    pub label: String,
    /// One cell per boss column; `None` is an empty cell.
    pub cells: Vec<Option<u32>>,
}

impl CountsRow {
    pub fn new(label: impl Into<String>, cells: Vec<Option<u32>>) -> Self {
        CountsRow {
            label: label.into(),
            cells,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountsTable {
    id_header: String,
    bosses: Vec<String>,
    rows: Vec<CountsRow>,
    total_label: String,
}

impl CountsTable {
    /// Assemble a table, checking its shape.
    ///
    /// Rows shorter than the header are padded with empty cells; longer rows
    /// are an error. There must be at least three material rows ahead of the
    /// totals row.
    pub fn new(
        id_header: impl Into<String>,
        bosses: Vec<String>,
        mut rows: Vec<CountsRow>,
        total_label: impl Into<String>,
    ) -> Result<Self, String> {
        let total_label = total_label.into();

        for (r, row) in rows.iter_mut().enumerate() {
            if row.cells.len() > bosses.len() {
                return Err(format!(
                    "row {} has {} values but only {} boss columns",
                    r + 2,
                    row.cells.len(),
                    bosses.len()
                ));
            }
            row.cells.resize(bosses.len(), None);
        }

        let table = CountsTable {
            id_header: id_header.into(),
            bosses,
            rows,
            total_label,
        };

        match table.total_row_index() {
            Some(idx) if idx < MATERIAL_SLOTS => {
                return Err(format!(
                    "totals row '{}' found at data row {} but {} material rows must come first",
                    table.rows[idx].label,
                    idx + 1,
                    MATERIAL_SLOTS
                ));
            }
            None if table.rows.len() < MATERIAL_SLOTS => {
                return Err(format!(
                    "expected at least {} material rows, found {}",
                    MATERIAL_SLOTS,
                    table.rows.len()
                ));
            }
            _ => {}
        }

        Ok(table)
    }

    pub fn id_header(&self) -> &str {
        &self.id_header
    }

    /// Boss column headers in column order.
    pub fn bosses(&self) -> &[String] {
        &self.bosses
    }

    pub fn rows(&self) -> &[CountsRow] {
        &self.rows
    }

    pub fn boss_index(&self, boss: &str) -> Option<usize> {
        self.bosses.iter().position(|b| b == boss)
    }

    /// Rename a boss column. Returns false if `from` is absent or `to` is
    /// already taken.
    pub fn rename_boss(&mut self, from: &str, to: &str) -> bool {
        if self.boss_index(to).is_some() {
            return false;
        }
        match self.boss_index(from) {
            Some(col) => {
                self.bosses[col] = to.to_string();
                true
            }
            None => false,
        }
    }

    /// Locate the totals row by its label, never by position. The configured
    /// label matches exactly; the literal `total` matches case-insensitively.
    pub fn total_row_index(&self) -> Option<usize> {
        self.rows.iter().position(|row| {
            let label = row.label.trim();
            label == self.total_label || label.eq_ignore_ascii_case("total")
        })
    }

    /// Stored material count, an empty cell reads as zero.
    pub fn material(&self, col: usize, slot: usize) -> u32 {
        debug_assert!(slot < MATERIAL_SLOTS);
        self.rows[slot].cells[col].unwrap_or(0)
    }

    pub fn materials(&self, col: usize) -> [u32; MATERIAL_SLOTS] {
        std::array::from_fn(|slot| self.material(col, slot))
    }

    /// Sum of the three material rows for one boss.
    ///
    /// Saturates for display of whatever the file holds; mutations go
    /// through [`checked_sum`] before anything is written.
    pub fn material_sum(&self, col: usize) -> u32 {
        checked_sum(&self.materials(col)).unwrap_or(u32::MAX)
    }

    /// Value currently in the totals row, if there is one.
    pub fn stored_total(&self, col: usize) -> Option<u32> {
        self.total_row_index()
            .and_then(|idx| self.rows[idx].cells[col])
    }

    pub fn set_material(&mut self, col: usize, slot: usize, value: u32) {
        debug_assert!(slot < MATERIAL_SLOTS);
        self.rows[slot].cells[col] = Some(value);
    }

    /// Overwrite the boss's totals cell with the sum of its material rows.
    ///
    /// Returns the new total, or `None` when the table has no totals row.
    pub fn recompute_total(&mut self, col: usize) -> Option<u32> {
        let total = self.material_sum(col);
        let idx = self.total_row_index()?;
        self.rows[idx].cells[col] = Some(total);
        Some(total)
    }
}

/// Sum of a boss's material counts, `None` if it does not fit a `u32`.
pub fn checked_sum(materials: &[u32]) -> Option<u32> {
    materials.iter().try_fold(0u32, |acc, v| acc.checked_add(*v))
}

/// One row of the materials reference table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceRow {
    pub boss_full_name: String,
    pub material: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceTable {
    pub rows: Vec<ReferenceRow>,
}

impl ReferenceTable {
    pub fn new(rows: Vec<ReferenceRow>) -> Self {
        ReferenceTable { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The `i`-th run of three rows, if the table is long enough.
    pub fn group(&self, i: usize) -> Option<&[ReferenceRow]> {
        let start = i * MATERIAL_SLOTS;
        self.rows.get(start..start + MATERIAL_SLOTS)
    }
}
