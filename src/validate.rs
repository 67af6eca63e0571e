use crate::dates::parse_iso_date;
use crate::record::{DoseCompletion, DoseKind, RepeatUnit, SeriesSubmission};
use jiff::civil::Date;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// The complete error vocabulary surfaced to callers. Everything except
/// `SyncConflict` is computed locally by the validators; `SyncConflict` is
/// raised at the persistence boundary when an optimistic-concurrency token
/// no longer matches.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Error, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    #[error("a disease must be selected")]
    DiseaseRequired,
    #[error("a valid completion date is required")]
    CompletedRequired,
    #[error("the completion date lies in the future")]
    CompletedInFuture,
    #[error("unknown dose kind")]
    DoseKindInvalid,
    #[error("a planned date is not a valid calendar date")]
    FutureDatesInvalid,
    #[error("planned dates must be unique")]
    FutureDatesDuplicate,
    #[error("a planned date lies before the completed dose")]
    FutureDateBeforeCompleted,
    #[error("planned dates and a repeat rule cannot be combined")]
    ScheduleConflict,
    #[error("the repeat interval must be a positive number of months or years")]
    RepeatIntervalInvalid,
    #[error("this record changed on the server; refresh and retry")]
    SyncConflict,
}

impl ErrorCode {
    /// The stable wire code, matching the serde rename.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DiseaseRequired => "disease_required",
            Self::CompletedRequired => "completed_required",
            Self::CompletedInFuture => "completed_in_future",
            Self::DoseKindInvalid => "dose_kind_invalid",
            Self::FutureDatesInvalid => "future_dates_invalid",
            Self::FutureDatesDuplicate => "future_dates_duplicate",
            Self::FutureDateBeforeCompleted => "future_date_before_completed",
            Self::ScheduleConflict => "schedule_conflict",
            Self::RepeatIntervalInvalid => "repeat_interval_invalid",
            Self::SyncConflict => "sync_conflict",
        }
    }
}

/// Check a series submission against the business rules, first failure wins.
///
/// `today` is passed in rather than read from the system clock so callers
/// (and tests) control what "in the future" means.
pub fn validate_series_submission(input: &SeriesSubmission, today: Date) -> Result<(), ErrorCode> {
    if input.disease_id.trim().is_empty() {
        return Err(ErrorCode::DiseaseRequired);
    }
    if input.completed_at.trim().is_empty() {
        return Err(ErrorCode::CompletedRequired);
    }
    let completed = parse_iso_date(&input.completed_at).ok_or(ErrorCode::CompletedRequired)?;
    if completed > today {
        return Err(ErrorCode::CompletedInFuture);
    }
    DoseKind::parse(&input.completed_dose_kind).ok_or(ErrorCode::DoseKindInvalid)?;

    for dose in &input.future_due_doses {
        parse_iso_date(&dose.due_at).ok_or(ErrorCode::FutureDatesInvalid)?;
    }
    for dose in &input.future_due_doses {
        DoseKind::parse(&dose.kind).ok_or(ErrorCode::DoseKindInvalid)?;
    }
    let mut seen = HashSet::new();
    for dose in &input.future_due_doses {
        if !seen.insert(dose.due_at.as_str()) {
            return Err(ErrorCode::FutureDatesDuplicate);
        }
    }
    for dose in &input.future_due_doses {
        // Dates were parsed above; a planned dose may not predate the
        // completed dose being recorded.
        if parse_iso_date(&dose.due_at).is_some_and(|due| due < completed) {
            return Err(ErrorCode::FutureDateBeforeCompleted);
        }
    }

    if !input.future_due_doses.is_empty() && input.repeat_every.is_some() {
        return Err(ErrorCode::ScheduleConflict);
    }
    if let Some(rule) = &input.repeat_every {
        DoseKind::parse(&rule.kind).ok_or(ErrorCode::DoseKindInvalid)?;
        if rule.interval <= 0 {
            return Err(ErrorCode::RepeatIntervalInvalid);
        }
        RepeatUnit::parse(&rule.unit).ok_or(ErrorCode::RepeatIntervalInvalid)?;
    }
    Ok(())
}

/// Check a dose-completion payload. Simpler than a full submission since it
/// never touches the scheduling fields.
pub fn validate_dose_completion(input: &DoseCompletion, today: Date) -> Result<(), ErrorCode> {
    if input.disease_id.trim().is_empty() {
        return Err(ErrorCode::DiseaseRequired);
    }
    if input.completed_at.trim().is_empty() {
        return Err(ErrorCode::CompletedRequired);
    }
    let completed = parse_iso_date(&input.completed_at).ok_or(ErrorCode::CompletedRequired)?;
    if completed > today {
        return Err(ErrorCode::CompletedInFuture);
    }
    DoseKind::parse(&input.kind).ok_or(ErrorCode::DoseKindInvalid)?;
    Ok(())
}
