//! HTML rendering of the tracker page.

use crate::progress::{WEEKLY_QUOTA, WeeklyProgress};
use crate::session::Notice;
use crate::tracker::TrackerSnapshot;
use handlebars::{Handlebars, RenderError, TemplateError};
use serde::Serialize;
use serde_json::json;

pub const PAGE_TITLE: &str = "原神周本材料管理系统";

const TRACKER_TEMPLATE: &str = "tracker";
const FATAL_TEMPLATE: &str = "fatal";

/// Form field name for one inventory cell: `slot_<column>_<slot>`.
pub fn slot_field(col: usize, slot: usize) -> String {
    format!("slot_{}_{}", col, slot)
}

/// Form field name for one loot quantity.
pub fn quantity_field(slot: usize) -> String {
    format!("q{}", slot)
}

#[derive(Debug, Serialize)]
pub struct PageView {
    title: &'static str,
    notices: Vec<Notice>,
    warnings: Vec<String>,
    progress: ProgressView,
    recommendations: Vec<RecommendationView>,
    loot: LootView,
    cards: Vec<CardView>,
}

#[derive(Debug, Serialize)]
struct ProgressView {
    done: usize,
    /// Bar fill, 0 to 100.
    percent: u32,
    quota: usize,
    complete: bool,
    started_at: String,
}

#[derive(Debug, Serialize)]
struct RecommendationView {
    rank: usize,
    boss: String,
    total: u32,
}

#[derive(Debug, Serialize)]
struct LootView {
    options: Vec<BossOption>,
    selected: String,
    selected_done: bool,
    full_name: String,
    inputs: Vec<QuantityInput>,
}

#[derive(Debug, Serialize)]
struct BossOption {
    name: String,
    full_name: String,
    /// Material names joined with `|` for the client-side label swap.
    materials: String,
    done: bool,
    selected: bool,
}

#[derive(Debug, Serialize)]
struct QuantityInput {
    name: String,
    label: String,
}

#[derive(Debug, Serialize)]
struct CardView {
    name: String,
    full_name: String,
    total: u32,
    slots: Vec<SlotView>,
}

#[derive(Debug, Serialize)]
struct SlotView {
    field: String,
    label: String,
    value: u32,
}

impl PageView {
    pub fn build(snapshot: &TrackerSnapshot, progress: &WeeklyProgress, notices: Vec<Notice>) -> Self {
        let selected = snapshot.default_boss().unwrap_or_default().to_string();
        let selected_boss = snapshot.bosses.iter().find(|b| b.info.short_name == selected);

        let options = snapshot
            .bosses
            .iter()
            .map(|boss| BossOption {
                name: boss.info.short_name.clone(),
                full_name: boss.info.full_name.clone(),
                materials: boss.info.materials.join("|"),
                done: boss.done_this_week,
                selected: boss.info.short_name == selected,
            })
            .collect();

        let inputs = (0..crate::table::MATERIAL_SLOTS)
            .map(|slot| QuantityInput {
                name: quantity_field(slot),
                label: selected_boss
                    .map(|b| b.info.materials[slot].clone())
                    .unwrap_or_default(),
            })
            .collect();

        let cards = snapshot
            .bosses
            .iter()
            .enumerate()
            .map(|(col, boss)| CardView {
                name: boss.info.short_name.clone(),
                full_name: boss.info.full_name.clone(),
                total: boss.total,
                slots: boss
                    .counts
                    .iter()
                    .enumerate()
                    .map(|(slot, value)| SlotView {
                        field: slot_field(col, slot),
                        label: boss.info.materials[slot].clone(),
                        value: *value,
                    })
                    .collect(),
            })
            .collect();

        PageView {
            title: PAGE_TITLE,
            notices,
            warnings: snapshot.warnings.clone(),
            progress: ProgressView {
                done: progress.count(),
                percent: (progress.fraction() * 100.0).round() as u32,
                quota: WEEKLY_QUOTA,
                complete: progress.is_complete(),
                started_at: progress.started_at().format("%Y-%m-%d %H:%M").to_string(),
            },
            recommendations: snapshot
                .recommendations
                .iter()
                .enumerate()
                .map(|(i, rec)| RecommendationView {
                    rank: i + 1,
                    boss: rec.boss.clone(),
                    total: rec.total,
                })
                .collect(),
            loot: LootView {
                options,
                selected_done: progress.is_done(&selected),
                selected,
                full_name: selected_boss
                    .map(|b| b.info.full_name.clone())
                    .unwrap_or_default(),
                inputs,
            },
            cards,
        }
    }
}

/// Handlebars registry with the page templates compiled in.
pub struct PageRenderer {
    registry: Handlebars<'static>,
}

impl PageRenderer {
    pub fn new() -> Result<Self, TemplateError> {
        let mut registry = Handlebars::new();
        registry.register_template_string(TRACKER_TEMPLATE, include_str!("./static/tracker.html"))?;
        registry.register_template_string(FATAL_TEMPLATE, include_str!("./static/fatal.html"))?;
        Ok(PageRenderer { registry })
    }

    pub fn render_tracker(&self, view: &PageView) -> Result<String, RenderError> {
        self.registry.render(TRACKER_TEMPLATE, view)
    }

    /// The page shown when the tables cannot be loaded: the message and nothing else.
    pub fn render_fatal(&self, message: &str) -> Result<String, RenderError> {
        self.registry.render(
            FATAL_TEMPLATE,
            &json!({ "title": PAGE_TITLE, "message": message }),
        )
    }
}
