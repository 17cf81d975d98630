//! Tracker operations: loot entry, inventory edits and the page snapshot.
//!
//! Every operation reloads both files, works on the fresh copy and writes
//! the counts table back at most once.

use crate::config::TrackerConfig;
use crate::error::{TrackerError, TrackerWarning};
use crate::loader::{TrackerData, load_tracker_data};
use crate::mapping::{BossInfo, BossMapping, FALLBACK_MATERIALS, build_mapping};
use crate::progress::WeeklyProgress;
use crate::recommend::{Recommendation, recommend};
use crate::saving::save_counts;
use crate::table::{CountsTable, MATERIAL_SLOTS, checked_sum};
use log::{info, warn};
use serde::Serialize;
use std::sync::Mutex;

/// Quantities received from one boss kill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LootEntry {
    pub boss: String,
    pub quantities: [u32; MATERIAL_SLOTS],
}

/// What a loot entry did to the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LootReceipt {
    pub boss: String,
    pub materials: [u32; MATERIAL_SLOTS],
    pub total: u32,
    /// The boss was already in the completion set before this entry.
    pub already_done: bool,
    /// False when the table has no totals row to update.
    pub total_row_updated: bool,
}

/// Direct overwrite of one material cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryEdit {
    pub boss: String,
    pub slot: usize,
    pub value: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedEdit {
    pub boss: String,
    pub slot: usize,
    /// Material name for display; the slot placeholder until the reference
    /// table names it.
    pub material: String,
    pub previous: u32,
    pub value: u32,
    pub total: u32,
}

/// Add a kill's loot to a boss column and refresh its total.
///
/// All-zero entries, unknown bosses and counts that would overflow are
/// rejected before anything changes.
pub fn apply_loot(counts: &mut CountsTable, entry: &LootEntry) -> Result<LootReceipt, TrackerError> {
    if entry.quantities.iter().all(|q| *q == 0) {
        return Err(TrackerError::EmptyLoot);
    }
    let col = counts
        .boss_index(&entry.boss)
        .ok_or_else(|| TrackerError::UnknownBoss(entry.boss.clone()))?;

    let current = counts.materials(col);
    let mut updated = current;
    for (slot, quantity) in entry.quantities.iter().enumerate() {
        updated[slot] = current[slot]
            .checked_add(*quantity)
            .ok_or_else(|| overflow(&entry.boss))?;
    }
    let total = checked_sum(&updated).ok_or_else(|| overflow(&entry.boss))?;

    for (slot, value) in updated.iter().enumerate() {
        counts.set_material(col, slot, *value);
    }

    let recomputed = counts.recompute_total(col);
    if recomputed.is_none() {
        warn!("no totals row; total for '{}' not written", entry.boss);
    }

    Ok(LootReceipt {
        boss: entry.boss.clone(),
        materials: updated,
        total,
        already_done: false,
        total_row_updated: recomputed.is_some(),
    })
}

fn overflow(boss: &str) -> TrackerError {
    TrackerError::CountOverflow {
        boss: boss.to_string(),
    }
}

/// Apply every edit whose value differs from the stored one.
///
/// The whole batch is validated before any cell is touched, including that
/// each edited boss's new total still fits. Totals are recomputed for each
/// boss that changed. Edits matching the stored value are dropped, so an
/// empty result means nothing needs saving.
pub fn apply_inventory_edits(
    counts: &mut CountsTable,
    edits: &[InventoryEdit],
) -> Result<Vec<AppliedEdit>, TrackerError> {
    let mut resolved = Vec::with_capacity(edits.len());
    let mut pending: Vec<(usize, [u32; MATERIAL_SLOTS])> = Vec::new();
    for edit in edits {
        let col = counts
            .boss_index(&edit.boss)
            .ok_or_else(|| TrackerError::UnknownBoss(edit.boss.clone()))?;
        if edit.slot >= MATERIAL_SLOTS {
            return Err(TrackerError::InvalidSlot(edit.slot));
        }
        match pending.iter_mut().find(|(c, _)| *c == col) {
            Some((_, materials)) => materials[edit.slot] = edit.value,
            None => {
                let mut materials = counts.materials(col);
                materials[edit.slot] = edit.value;
                pending.push((col, materials));
            }
        }
        resolved.push((col, edit));
    }
    if let Some((col, _)) = pending.iter().find(|(_, m)| checked_sum(m).is_none()) {
        return Err(overflow(&counts.bosses()[*col]));
    }

    let mut applied = Vec::new();
    let mut columns = Vec::new();
    for (col, edit) in resolved {
        let previous = counts.material(col, edit.slot);
        // An empty cell edited to 0 reads the same; leave it empty.
        if previous == edit.value {
            continue;
        }
        counts.set_material(col, edit.slot, edit.value);
        applied.push(AppliedEdit {
            boss: edit.boss.clone(),
            slot: edit.slot,
            material: FALLBACK_MATERIALS[edit.slot].to_string(),
            previous,
            value: edit.value,
            total: 0,
        });
        columns.push(col);
    }

    for (edit, col) in applied.iter_mut().zip(columns) {
        if counts.recompute_total(col).is_none() {
            warn!("no totals row; total for '{}' not written", edit.boss);
        }
        edit.total = counts.material_sum(col);
    }

    Ok(applied)
}

/// A loot entry as seen by the caller: the receipt, plus the save error if
/// writing the file failed after the in-memory update.
#[derive(Debug)]
pub struct LootReport {
    pub receipt: LootReceipt,
    pub save_error: Option<TrackerError>,
}

#[derive(Debug)]
pub struct EditReport {
    pub applied: Vec<AppliedEdit>,
    pub save_error: Option<TrackerError>,
}

/// Everything one page render needs.
#[derive(Debug, Clone, Serialize)]
pub struct TrackerSnapshot {
    pub bosses: Vec<BossSnapshot>,
    pub recommendations: Vec<Recommendation>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BossSnapshot {
    #[serde(flatten)]
    pub info: BossInfo,
    pub counts: [u32; MATERIAL_SLOTS],
    pub total: u32,
    pub done_this_week: bool,
}

impl TrackerSnapshot {
    fn build(data: &TrackerData, mapping: &BossMapping, progress: &WeeklyProgress) -> Self {
        let bosses = mapping
            .entries()
            .iter()
            .enumerate()
            .map(|(col, info)| BossSnapshot {
                info: info.clone(),
                counts: data.counts.materials(col),
                total: data.counts.material_sum(col),
                done_this_week: progress.is_done(&info.short_name),
            })
            .collect();

        TrackerSnapshot {
            bosses,
            recommendations: recommend(&data.counts, progress),
            warnings: mapping.warnings().iter().map(TrackerWarning::to_string).collect(),
        }
    }

    /// Selection default for the loot form: top recommendation, else the
    /// first column.
    pub fn default_boss(&self) -> Option<&str> {
        self.recommendations
            .first()
            .map(|rec| rec.boss.as_str())
            .or_else(|| self.bosses.first().map(|b| b.info.short_name.as_str()))
    }
}

/// File-backed front end to the operations above.
///
/// Load-modify-save cycles are serialised by an internal lock, so two
/// requests never interleave their writes.
#[derive(Debug)]
pub struct Tracker {
    config: TrackerConfig,
    io_lock: Mutex<()>,
}

impl Tracker {
    pub fn new(config: TrackerConfig) -> Self {
        Tracker {
            config,
            io_lock: Mutex::new(()),
        }
    }

    pub fn load(&self) -> Result<TrackerData, TrackerError> {
        let _guard = self.io_lock.lock().unwrap_or_else(|p| p.into_inner());
        load_tracker_data(&self.config)
    }

    /// Reload and build the view of the tables for one session.
    pub fn snapshot(&self, progress: &WeeklyProgress) -> Result<TrackerSnapshot, TrackerError> {
        let data = self.load()?;
        let mapping = build_mapping(&data.counts, &data.reference);
        Ok(TrackerSnapshot::build(&data, &mapping, progress))
    }

    /// Log a kill: update counts, save, and mark the boss done for the week.
    ///
    /// The boss is marked done even if the save fails.
    pub fn log_loot(
        &self,
        progress: &mut WeeklyProgress,
        entry: &LootEntry,
    ) -> Result<LootReport, TrackerError> {
        let _guard = self.io_lock.lock().unwrap_or_else(|p| p.into_inner());
        let mut data = load_tracker_data(&self.config)?;

        let mut receipt = apply_loot(&mut data.counts, entry)?;
        receipt.already_done = progress.is_done(&entry.boss);
        if receipt.already_done {
            warn!("'{}' already logged this week; adding anyway", entry.boss);
        }

        let save_error = save_counts(&data.counts, &self.config.data_file).err();
        progress.mark_done(&entry.boss);

        info!(
            "logged {:?} for '{}', total now {} ({}/{} this week)",
            entry.quantities,
            entry.boss,
            receipt.total,
            progress.count(),
            crate::progress::WEEKLY_QUOTA
        );

        Ok(LootReport { receipt, save_error })
    }

    /// Apply a batch of direct edits and save once if anything changed.
    pub fn edit_inventory(&self, edits: &[InventoryEdit]) -> Result<EditReport, TrackerError> {
        self.edit_with(|_| Ok(edits.to_vec()))
    }

    /// Like [`Tracker::edit_inventory`], addressed by `(column, slot, value)`
    /// as the inventory form posts them.
    ///
    /// Columns are resolved against the file as loaded under the lock, so
    /// the names and the save come from the same read.
    pub fn edit_cells(&self, cells: &[(usize, usize, u32)]) -> Result<EditReport, TrackerError> {
        self.edit_with(|counts| {
            cells
                .iter()
                .map(|&(col, slot, value)| {
                    counts
                        .bosses()
                        .get(col)
                        .map(|boss| InventoryEdit {
                            boss: boss.clone(),
                            slot,
                            value,
                        })
                        .ok_or_else(|| TrackerError::UnknownBoss(format!("#{}", col)))
                })
                .collect()
        })
    }

    fn edit_with(
        &self,
        resolve: impl FnOnce(&CountsTable) -> Result<Vec<InventoryEdit>, TrackerError>,
    ) -> Result<EditReport, TrackerError> {
        let _guard = self.io_lock.lock().unwrap_or_else(|p| p.into_inner());
        let mut data = load_tracker_data(&self.config)?;

        let edits = resolve(&data.counts)?;
        let mut applied = apply_inventory_edits(&mut data.counts, &edits)?;
        if applied.is_empty() {
            return Ok(EditReport {
                applied,
                save_error: None,
            });
        }

        let mapping = build_mapping(&data.counts, &data.reference);
        for edit in &mut applied {
            if let Some(info) = mapping.get(&edit.boss) {
                edit.material = info.materials[edit.slot].clone();
            }
            info!(
                "edited '{}' {}: {} -> {}",
                edit.boss, edit.material, edit.previous, edit.value
            );
        }

        let save_error = save_counts(&data.counts, &self.config.data_file).err();
        Ok(EditReport { applied, save_error })
    }
}
