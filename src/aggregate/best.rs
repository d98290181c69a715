//! Best-record selection and normalization anchors

use rustc_hash::FxHashMap;

use super::fallback::Placement;
use super::tags::RowTag;
use crate::record::{ErrorCode, ResultRecord};

/// Mark the best record of every (row, category) group and set the
/// normalization anchors of every record.
///
/// The best record has the lowest effective accuracy among records whose
/// parameters stayed inside bounds; the first one wins ties. When no record
/// is eligible, nothing is marked and the accuracy anchor is the plain
/// minimum.
pub fn select_best(records: &mut [ResultRecord], placements: &[Placement]) {
    let mut groups: FxHashMap<(RowTag, String), Vec<usize>> = FxHashMap::default();
    let mut order: Vec<(RowTag, String)> = Vec::new();
    for p in placements {
        let key = (p.row().clone(), p.category().to_string());
        let members = groups.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            Vec::new()
        });
        if !members.contains(&p.record()) {
            members.push(p.record());
        }
    }

    for record in records.iter_mut() {
        record.set_best(false);
    }

    for key in &order {
        let mut members = groups[key].clone();
        members.sort_unstable();

        let mut best: Option<usize> = None;
        for &index in &members {
            let record = &records[index];
            if record.error_code() == ErrorCode::BoundsViolated {
                continue;
            }
            let better = best.map_or(true, |b| {
                record.effective_accuracy() < records[b].effective_accuracy()
            });
            if better {
                best = Some(index);
            }
        }

        let min_accuracy = best.map_or_else(
            || {
                members
                    .iter()
                    .map(|&i| records[i].effective_accuracy())
                    .fold(f64::INFINITY, f64::min)
            },
            |b| records[b].effective_accuracy(),
        );
        let min_runtime = members
            .iter()
            .map(|&i| records[i].runtime())
            .fold(f64::INFINITY, f64::min);

        for &index in &members {
            records[index].set_anchors(min_accuracy, min_runtime);
        }
        if let Some(b) = best {
            records[b].set_best(true);
        }
    }
}
