//! Pairs each boss column with its display name and three material names.
//!
//! The files carry no join key: the `i`-th boss column takes the `i`-th run
//! of three reference rows. When the reference table runs out, the boss gets
//! placeholder names and a warning is raised.

use crate::error::TrackerWarning;
use crate::table::{CountsTable, MATERIAL_SLOTS, ReferenceTable};
use log::warn;
use serde::Serialize;

/// Placeholder material names for bosses the reference table does not cover.
pub const FALLBACK_MATERIALS: [&str; MATERIAL_SLOTS] = ["材料1", "材料2", "材料3"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BossInfo {
    /// Column header in the counts table.
    pub short_name: String,
    pub full_name: String,
    pub materials: [String; MATERIAL_SLOTS],
    /// True when the names are placeholders.
    pub fallback: bool,
}

#[derive(Debug, Clone, Default)]
pub struct BossMapping {
    entries: Vec<BossInfo>,
    warnings: Vec<TrackerWarning>,
}

impl BossMapping {
    /// Entry for a boss column, by its short name.
    pub fn get(&self, boss: &str) -> Option<&BossInfo> {
        self.entries.iter().find(|info| info.short_name == boss)
    }

    /// Entries in counts-table column order.
    pub fn entries(&self) -> &[BossInfo] {
        &self.entries
    }

    pub fn warnings(&self) -> &[TrackerWarning] {
        &self.warnings
    }
}

pub fn build_mapping(counts: &CountsTable, reference: &ReferenceTable) -> BossMapping {
    let bosses = counts.bosses();
    let mut warnings = Vec::new();

    if bosses.len() * MATERIAL_SLOTS > reference.len() {
        let warning = TrackerWarning::ReferenceTooShort {
            bosses: bosses.len(),
            rows: reference.len(),
        };
        warn!("{}", warning);
        warnings.push(warning);
    }

    let entries = bosses
        .iter()
        .enumerate()
        .map(|(i, boss)| match reference.group(i) {
            Some(group) => {
                let full_name = group[0].boss_full_name.clone();

                let mut names: Vec<String> = Vec::new();
                for row in group {
                    if !names.contains(&row.boss_full_name) {
                        names.push(row.boss_full_name.clone());
                    }
                }
                if names.len() > 1 {
                    let warning = TrackerWarning::ReferenceGroupMixed {
                        boss: boss.clone(),
                        names,
                    };
                    warn!("{}", warning);
                    warnings.push(warning);
                }

                BossInfo {
                    short_name: boss.clone(),
                    full_name,
                    materials: std::array::from_fn(|slot| group[slot].material.clone()),
                    fallback: false,
                }
            }
            None => BossInfo {
                short_name: boss.clone(),
                full_name: boss.clone(),
                materials: FALLBACK_MATERIALS.map(String::from),
                fallback: true,
            },
        })
        .collect();

    BossMapping { entries, warnings }
}
