use crate::progress::WeeklyProgress;
use crate::table::CountsTable;
use serde::Serialize;

/// How many bosses the recommendation panel shows.
pub const RECOMMENDATION_COUNT: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recommendation {
    pub boss: String,
    pub total: u32,
}

/// Bosses with the fewest materials that have not been logged this week.
///
/// Totals are summed from the material rows, not read from the totals row.
/// Ascending by total; ties keep column order.
pub fn recommend(counts: &CountsTable, progress: &WeeklyProgress) -> Vec<Recommendation> {
    let mut ranked: Vec<Recommendation> = counts
        .bosses()
        .iter()
        .enumerate()
        .map(|(col, boss)| Recommendation {
            boss: boss.clone(),
            total: counts.material_sum(col),
        })
        .collect();

    // sort_by_key is stable
    ranked.sort_by_key(|rec| rec.total);

    ranked
        .into_iter()
        .filter(|rec| !progress.is_done(&rec.boss))
        .take(RECOMMENDATION_COUNT)
        .collect()
}
