use crate::dates::{add_months, parse_iso_date};
use crate::record::{DueSource, NextDue, PlannedDose, VaccinationSeries};
use itertools::Itertools;
use jiff::civil::Date;
use log::warn;
use std::cmp::Ordering;

// Upper bound on repeat projection steps. A sane interval reaches the
// reference date in far fewer hops; hitting the cap means the stored data is
// garbage and the series simply has no computable due date.
const MAX_PROJECTION_STEPS: u32 = 600;

/// Compute the next due dose for a series relative to `reference`.
///
/// An explicitly planned dose on or after `reference` always wins over a
/// repeat projection: a user who re-scheduled by hand overrides the cadence.
/// With only a repeat rule, the latest completed dose is projected forward
/// interval by interval until the occurrence lands on or after `reference`,
/// however stale the data is. Returns `None` when neither source yields a
/// date.
pub fn resolve_next_due(series: &VaccinationSeries, reference: Date) -> Option<NextDue> {
    if let Some(dose) = next_planned_dose(&series.future_due_doses, reference) {
        return Some(NextDue {
            due_at: dose.due_at.clone(),
            kind: dose.kind,
            planned_dose_id: Some(dose.id.clone()),
            source: DueSource::Manual,
        });
    }

    let rule = series.repeat_every.as_ref()?;
    let last_completed = series
        .completed_doses
        .iter()
        .filter_map(|dose| parse_iso_date(&dose.completed_at))
        .max()?;
    // Tolerate junk intervals that never went through validation (imports).
    let step = i32::try_from(rule.step_months()).ok().filter(|s| *s > 0)?;

    let mut due = add_months(last_completed, step);
    let mut steps = 0u32;
    while due < reference {
        steps += 1;
        if steps > MAX_PROJECTION_STEPS {
            warn!(
                "repeat projection for {} gave up after {MAX_PROJECTION_STEPS} steps",
                series.disease_id
            );
            return None;
        }
        due = add_months(due, step);
    }
    Some(NextDue {
        due_at: due.to_string(),
        kind: rule.kind,
        planned_dose_id: None,
        source: DueSource::Repeat,
    })
}

// Normalize the planned doses (drop unparseable dates, first entry wins per
// id, ascending by due date) and pick the earliest one still ahead of the
// reference date.
fn next_planned_dose(doses: &[PlannedDose], reference: Date) -> Option<&PlannedDose> {
    doses
        .iter()
        .filter_map(|dose| parse_iso_date(&dose.due_at).map(|due| (dose, due)))
        .unique_by(|(dose, _)| dose.id.clone())
        .sorted_by_key(|(_, due)| *due)
        .find(|(_, due)| *due >= reference)
        .map(|(dose, _)| dose)
}

/// Order a collection for display: earliest next due first, series without a
/// computable due date after all dated ones, original order preserved among
/// equals.
pub fn sort_by_next_due(series: &[VaccinationSeries], reference: Date) -> Vec<VaccinationSeries> {
    let mut keyed: Vec<(Option<Date>, VaccinationSeries)> = series
        .iter()
        .map(|s| (next_due_date(s, reference), s.clone()))
        .collect();
    keyed.sort_by(|(a, _), (b, _)| match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    keyed.into_iter().map(|(_, s)| s).collect()
}

/// True when the series' next due date falls within one calendar year of
/// `reference`, both endpoints included.
pub fn due_within_year(series: &VaccinationSeries, reference: Date) -> bool {
    match next_due_date(series, reference) {
        Some(due) => due >= reference && due <= add_months(reference, 12),
        None => false,
    }
}

fn next_due_date(series: &VaccinationSeries, reference: Date) -> Option<Date> {
    resolve_next_due(series, reference).and_then(|next| parse_iso_date(&next.due_at))
}
