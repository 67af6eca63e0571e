use crate::record::VaccinationSeries;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// The persisted identity of a series row, as the storage layer sees it.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesRef {
    pub id: i64,
    pub disease_id: String,
}

/// The full-replacement diff: every incoming record lands in create or
/// update, every existing row not re-sent lands in delete.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcilePlan {
    pub create_disease_ids: Vec<String>,
    pub update_disease_ids: Vec<String>,
    pub delete_series_ids: Vec<i64>,
}

/// Match an incoming full vaccination-state payload against the persisted
/// series by disease id. Creates and updates come out in payload order,
/// deletes in storage order. The three sets partition the union of both
/// sides; a duplicated disease id in the payload is classified once.
pub fn reconcile_series(
    existing: &[SeriesRef],
    next_records: &[VaccinationSeries],
) -> ReconcilePlan {
    let existing_ids: HashSet<&str> = existing.iter().map(|row| row.disease_id.as_str()).collect();
    let mut incoming: HashSet<&str> = HashSet::new();
    let mut plan = ReconcilePlan::default();

    for record in next_records {
        if !incoming.insert(record.disease_id.as_str()) {
            continue;
        }
        if existing_ids.contains(record.disease_id.as_str()) {
            plan.update_disease_ids.push(record.disease_id.clone());
        } else {
            plan.create_disease_ids.push(record.disease_id.clone());
        }
    }
    for row in existing {
        if !incoming.contains(row.disease_id.as_str()) {
            plan.delete_series_ids.push(row.id);
        }
    }
    plan
}
