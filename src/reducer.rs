use crate::record::{
    CompletedDose, DoseCompletion, DoseKind, PlannedDose, PlannedDoseInput, RepeatRule,
    RepeatRuleInput, SeriesSubmission, VaccinationSeries,
};
use crate::validate::{validate_dose_completion, validate_series_submission, ErrorCode};
use crate::dates::parse_iso_date;
use jiff::{tz::TimeZone, Timestamp};
use uuid::Uuid;

/// Source of fresh dose ids. Injectable so reducers stay deterministic under
/// test; production callers use [`UuidSource`].
pub trait IdSource {
    fn next_id(&mut self) -> String;
}

#[derive(Debug, Default)]
pub struct UuidSource;

impl IdSource for UuidSource {
    fn next_id(&mut self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Record or edit a series from a submission form.
///
/// First submission for a disease creates the series with a single completed
/// dose. A resubmission edits the record: the chronologically latest
/// completed dose takes the submitted values in place (history length does
/// not grow), and the scheduling fields are replaced wholesale by whatever
/// the form carries now. Returns a new collection; the input is untouched.
pub fn submit_series(
    records: &[VaccinationSeries],
    input: &SeriesSubmission,
    ids: &mut dyn IdSource,
    now: Timestamp,
) -> Result<Vec<VaccinationSeries>, ErrorCode> {
    let today = now.to_zoned(TimeZone::UTC).date();
    validate_series_submission(input, today)?;

    let future = planned_from_input(&input.future_due_doses, ids);
    let repeat = input.repeat_every.as_ref().map(rule_from_input);

    let mut next = records.to_vec();
    match next
        .iter_mut()
        .find(|record| record.disease_id == input.disease_id)
    {
        Some(record) => {
            match record.completed_doses.last_mut() {
                Some(latest) => {
                    latest.completed_at = input.completed_at.clone();
                    latest.kind = submitted_kind(&input.completed_dose_kind);
                    latest.trade_name = input.trade_name.clone();
                    latest.batch_number = input.batch_number.clone();
                }
                None => record.completed_doses.push(completed_from_input(input, ids)),
            }
            record.future_due_doses = future;
            record.repeat_every = repeat;
            record.sort_completed();
            record.updated_at = now.to_string();
        }
        None => next.push(VaccinationSeries {
            disease_id: input.disease_id.clone(),
            completed_doses: vec![completed_from_input(input, ids)],
            future_due_doses: future,
            repeat_every: repeat,
            updated_at: now.to_string(),
        }),
    }
    Ok(next)
}

/// Record that a dose was administered, appending to the series' history.
///
/// Requires the target series to exist already. When the completion fulfils
/// a planned dose, that dose is removed by id — never by date, so a second
/// planned dose sharing the same due date survives.
pub fn complete_dose(
    records: &[VaccinationSeries],
    input: &DoseCompletion,
    ids: &mut dyn IdSource,
    now: Timestamp,
) -> Result<Vec<VaccinationSeries>, ErrorCode> {
    let today = now.to_zoned(TimeZone::UTC).date();
    validate_dose_completion(input, today)?;

    let mut next = records.to_vec();
    let record = next
        .iter_mut()
        .find(|record| record.disease_id == input.disease_id)
        .ok_or(ErrorCode::DiseaseRequired)?;

    record.completed_doses.push(CompletedDose {
        id: ids.next_id(),
        completed_at: input.completed_at.clone(),
        kind: submitted_kind(&input.kind),
        trade_name: input.trade_name.clone(),
        batch_number: input.batch_number.clone(),
    });
    record.sort_completed();
    if let Some(planned_id) = &input.planned_dose_id {
        record
            .future_due_doses
            .retain(|dose| &dose.id != planned_id);
    }
    record.updated_at = now.to_string();
    Ok(next)
}

// A kind that fails to parse after validation passed is a bug in the caller,
// not user input; fail loudly.
fn submitted_kind(raw: &str) -> DoseKind {
    DoseKind::parse(raw).expect("dose kind was checked during validation")
}

fn completed_from_input(input: &SeriesSubmission, ids: &mut dyn IdSource) -> CompletedDose {
    CompletedDose {
        id: ids.next_id(),
        completed_at: input.completed_at.clone(),
        kind: submitted_kind(&input.completed_dose_kind),
        trade_name: input.trade_name.clone(),
        batch_number: input.batch_number.clone(),
    }
}

fn rule_from_input(input: &RepeatRuleInput) -> RepeatRule {
    RepeatRule {
        interval: input.interval,
        unit: crate::record::RepeatUnit::parse(&input.unit)
            .expect("repeat unit was checked during validation"),
        kind: submitted_kind(&input.kind),
    }
}

fn planned_from_input(inputs: &[PlannedDoseInput], ids: &mut dyn IdSource) -> Vec<PlannedDose> {
    let mut doses: Vec<PlannedDose> = inputs
        .iter()
        .map(|dose| PlannedDose {
            id: if dose.id.is_empty() {
                ids.next_id()
            } else {
                dose.id.clone()
            },
            due_at: dose.due_at.clone(),
            kind: submitted_kind(&dose.kind),
        })
        .collect();
    doses.sort_by_key(|dose| parse_iso_date(&dose.due_at));
    doses
}
