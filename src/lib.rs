#![warn(clippy::all, rust_2018_idioms)]

//! The scheduling and validation core of a personal vaccination-record
//! tracker: pure validators and reducers over immutable series snapshots, a
//! next-due-date resolver, the bulk-replacement reconciliation diff, and an
//! in-memory series store honoring the optimistic-concurrency contract.

mod dates;
mod reconcile;
mod record;
mod reducer;
mod schedule;
mod store;
mod validate;

pub use dates::{
    add_months, add_months_to_iso_date, is_iso_date_value, parse_iso_date, today_iso_date,
    today_utc,
};
pub use reconcile::{reconcile_series, ReconcilePlan, SeriesRef};
pub use record::{
    CompletedDose, DoseCompletion, DoseKind, DueSource, NextDue, PlannedDose, PlannedDoseInput,
    RepeatRule, RepeatRuleInput, RepeatUnit, SeriesSubmission, VaccinationSeries,
};
pub use reducer::{complete_dose, submit_series, IdSource, UuidSource};
pub use schedule::{due_within_year, resolve_next_due, sort_by_next_due};
pub use store::{SeriesRow, SeriesStore, StoreError};
pub use validate::{validate_dose_completion, validate_series_submission, ErrorCode};
