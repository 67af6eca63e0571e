use crate::dates;
use serde::{Deserialize, Serialize};
use std::fmt;

// What a dose was for: the next dose of a primary series, or a periodic
// revaccination. Stored records carry the parsed enum; form input carries the
// raw string so an unknown kind surfaces as a validation code instead of a
// deserialization failure.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DoseKind {
    #[default]
    NextDose,
    Revaccination,
}

impl DoseKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "nextDose" => Some(Self::NextDose),
            "revaccination" => Some(Self::Revaccination),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NextDose => "nextDose",
            Self::Revaccination => "revaccination",
        }
    }
}

impl fmt::Display for DoseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatUnit {
    Months,
    Years,
}

impl RepeatUnit {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "months" => Some(Self::Months),
            "years" => Some(Self::Years),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Months => "months",
            Self::Years => "years",
        }
    }
}

impl fmt::Display for RepeatUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A periodic recurrence used instead of explicitly planned dates.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepeatRule {
    pub interval: i64,
    pub unit: RepeatUnit,
    pub kind: DoseKind,
}

impl RepeatRule {
    // The projection step in whole months.
    pub fn step_months(&self) -> i64 {
        match self.unit {
            RepeatUnit::Months => self.interval,
            RepeatUnit::Years => self.interval * 12,
        }
    }
}

impl fmt::Display for RepeatRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "every {} {}", self.interval, self.unit)
    }
}

/// An administered dose. Immutable history, except that the chronologically
/// latest dose of a series is replaced in place by the edit-record flow.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompletedDose {
    pub id: String,
    pub completed_at: String,
    pub kind: DoseKind,
    pub trade_name: Option<String>,
    pub batch_number: Option<String>,
}

/// A future dose scheduled explicitly; removed once fulfilled (matched by id)
/// or when the schedule switches to a repeat rule.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlannedDose {
    pub id: String,
    pub due_at: String,
    pub kind: DoseKind,
}

/// One vaccination series per disease. `updated_at` is the server-assigned
/// optimistic-concurrency token, bumped on every mutation.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VaccinationSeries {
    pub disease_id: String,
    pub completed_doses: Vec<CompletedDose>,
    pub future_due_doses: Vec<PlannedDose>,
    pub repeat_every: Option<RepeatRule>,
    pub updated_at: String,
}

impl VaccinationSeries {
    // Note: always keep the doses sorted by completion date, not entry time.
    // Unparseable dates (possible in imported payloads) sort first so they
    // never masquerade as the latest dose.
    pub fn sort_completed(&mut self) {
        self.completed_doses
            .sort_by_key(|dose| dates::parse_iso_date(&dose.completed_at));
    }

    pub fn latest_completed(&self) -> Option<&CompletedDose> {
        self.completed_doses.last()
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DueSource {
    Manual,
    Repeat,
}

/// The next dose a series calls for, derived on demand and never stored.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NextDue {
    pub due_at: String,
    pub kind: DoseKind,
    pub planned_dose_id: Option<String>,
    pub source: DueSource,
}

/// The submit-series form payload. Kind and unit fields stay raw strings
/// until validation has vouched for them.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SeriesSubmission {
    pub disease_id: String,
    pub completed_at: String,
    pub completed_dose_kind: String,
    pub trade_name: Option<String>,
    pub batch_number: Option<String>,
    pub future_due_doses: Vec<PlannedDoseInput>,
    pub repeat_every: Option<RepeatRuleInput>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlannedDoseInput {
    pub id: String,
    pub due_at: String,
    pub kind: String,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RepeatRuleInput {
    pub interval: i64,
    pub unit: String,
    pub kind: String,
}

/// The complete-a-dose form payload, independent of scheduling fields.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DoseCompletion {
    pub disease_id: String,
    pub completed_at: String,
    pub kind: String,
    pub trade_name: Option<String>,
    pub batch_number: Option<String>,
    pub planned_dose_id: Option<String>,
}
