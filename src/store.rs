use crate::reconcile::{reconcile_series, ReconcilePlan, SeriesRef};
use crate::record::VaccinationSeries;
use crate::validate::ErrorCode;
use anyhow::{Context, Result};
use jiff::Timestamp;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("series for {disease_id} changed since it was read")]
    StaleWrite { disease_id: String },
    #[error("no series stored for {disease_id}")]
    UnknownSeries { disease_id: String },
}

impl StoreError {
    /// The wire code a caller should surface for this failure.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::StaleWrite { .. } => ErrorCode::SyncConflict,
            Self::UnknownSeries { .. } => ErrorCode::DiseaseRequired,
        }
    }
}

/// A persisted series with its stable row id.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesRow {
    pub id: i64,
    pub record: VaccinationSeries,
}

// The on-disk shape; the clock stays out of it.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
struct StoreSnapshot {
    members: BTreeMap<String, Vec<SeriesRow>>,
    next_row_id: i64,
}

/// In-memory stand-in for the persistence collaborator: series rows keyed by
/// (member, disease) with `updated_at` acting as the optimistic-concurrency
/// token. Every mutation must present the token from the snapshot it was
/// computed against; a mismatch is rejected as a stale write instead of
/// silently overwriting.
pub struct SeriesStore {
    members: BTreeMap<String, Vec<SeriesRow>>,
    next_row_id: i64,
    clock: fn() -> Timestamp,
}

impl Default for SeriesStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SeriesStore {
    pub fn new() -> Self {
        Self::with_clock(Timestamp::now)
    }

    // The clock is injectable so tests get stable tokens.
    pub fn with_clock(clock: fn() -> Timestamp) -> Self {
        Self {
            members: BTreeMap::new(),
            next_row_id: 1,
            clock,
        }
    }

    pub fn members(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(String::as_str)
    }

    pub fn remove_member(&mut self, member: &str) -> bool {
        self.members.remove(member).is_some()
    }

    pub fn member_series(&self, member: &str) -> &[SeriesRow] {
        self.members.get(member).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn series(&self, member: &str, disease_id: &str) -> Option<&VaccinationSeries> {
        self.member_series(member)
            .iter()
            .find(|row| row.record.disease_id == disease_id)
            .map(|row| &row.record)
    }

    /// Create or update one series. `expected_updated_at` is `None` for a
    /// create and the last-seen token for an update; any mismatch with the
    /// stored state is a stale write. On success the freshly assigned token
    /// is returned for the caller to merge back into its snapshot.
    pub fn put_series(
        &mut self,
        member: &str,
        mut record: VaccinationSeries,
        expected_updated_at: Option<&str>,
    ) -> Result<String, StoreError> {
        let stamp = (self.clock)().to_string();
        let rows = self.members.entry(member.to_owned()).or_default();
        match rows
            .iter_mut()
            .find(|row| row.record.disease_id == record.disease_id)
        {
            Some(row) => {
                if expected_updated_at != Some(row.record.updated_at.as_str()) {
                    return Err(StoreError::StaleWrite {
                        disease_id: record.disease_id,
                    });
                }
                record.updated_at = stamp.clone();
                row.record = record;
            }
            None => {
                if expected_updated_at.is_some() {
                    return Err(StoreError::StaleWrite {
                        disease_id: record.disease_id,
                    });
                }
                record.updated_at = stamp.clone();
                let id = self.next_row_id;
                self.next_row_id += 1;
                debug!("creating series row {id} for {member}");
                rows.push(SeriesRow { id, record });
            }
        }
        Ok(stamp)
    }

    pub fn delete_series(
        &mut self,
        member: &str,
        disease_id: &str,
        expected_updated_at: Option<&str>,
    ) -> Result<(), StoreError> {
        let rows = self.members.entry(member.to_owned()).or_default();
        let position = rows
            .iter()
            .position(|row| row.record.disease_id == disease_id)
            .ok_or_else(|| StoreError::UnknownSeries {
                disease_id: disease_id.to_owned(),
            })?;
        if expected_updated_at != Some(rows[position].record.updated_at.as_str()) {
            return Err(StoreError::StaleWrite {
                disease_id: disease_id.to_owned(),
            });
        }
        rows.remove(position);
        Ok(())
    }

    /// Replace a member's entire vaccination state in one go: reconcile the
    /// payload against the stored rows, apply deletes first, then update
    /// matched rows (row id kept stable, dose rows replaced wholesale so the
    /// payload's dose ids round-trip), then create the rest. Returns the plan
    /// that was applied.
    pub fn replace_member_series(
        &mut self,
        member: &str,
        next_records: Vec<VaccinationSeries>,
    ) -> ReconcilePlan {
        let stamp = (self.clock)().to_string();
        let refs: Vec<SeriesRef> = self
            .member_series(member)
            .iter()
            .map(|row| SeriesRef {
                id: row.id,
                disease_id: row.record.disease_id.clone(),
            })
            .collect();
        let plan = reconcile_series(&refs, &next_records);
        debug!(
            "replacing series for {member}: {} new, {} updated, {} deleted",
            plan.create_disease_ids.len(),
            plan.update_disease_ids.len(),
            plan.delete_series_ids.len()
        );

        let rows = self.members.entry(member.to_owned()).or_default();
        rows.retain(|row| !plan.delete_series_ids.contains(&row.id));
        for mut record in next_records {
            record.updated_at = stamp.clone();
            match rows
                .iter_mut()
                .find(|row| row.record.disease_id == record.disease_id)
            {
                Some(row) => row.record = record,
                None => {
                    let id = self.next_row_id;
                    self.next_row_id += 1;
                    rows.push(SeriesRow { id, record });
                }
            }
        }
        plan
    }

    /// Serialize a member's records to RON for download/backup.
    pub fn export_member(&self, member: &str) -> Result<String> {
        let records: Vec<&VaccinationSeries> = self
            .member_series(member)
            .iter()
            .map(|row| &row.record)
            .collect();
        ron::ser::to_string_pretty(&records, ron::ser::PrettyConfig::default())
            .context("serializing member records")
    }

    /// Import a previously exported payload, replacing the member's state
    /// through reconciliation.
    pub fn import_member(&mut self, member: &str, data: &str) -> Result<ReconcilePlan> {
        let records: Vec<VaccinationSeries> =
            ron::from_str(data).context("parsing member records")?;
        Ok(self.replace_member_series(member, records))
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        let snapshot = StoreSnapshot {
            members: self.members.clone(),
            next_row_id: self.next_row_id,
        };
        let data = ron::ser::to_string_pretty(&snapshot, ron::ser::PrettyConfig::default())
            .context("serializing store")?;
        fs::write(path, data).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let data =
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let snapshot: StoreSnapshot = ron::from_str(&data).context("parsing store")?;
        Ok(Self {
            members: snapshot.members,
            next_row_id: snapshot.next_row_id,
            clock: Timestamp::now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{CompletedDose, PlannedDose};
    use anyhow::Result;

    fn test_clock() -> Timestamp {
        Timestamp::from_second(1_748_779_200).expect("a valid timestamp")
    }

    fn store() -> SeriesStore {
        let _ = env_logger::builder().is_test(true).try_init();
        SeriesStore::with_clock(test_clock)
    }

    fn series(disease: &str) -> VaccinationSeries {
        VaccinationSeries {
            disease_id: disease.to_owned(),
            completed_doses: vec![CompletedDose {
                id: format!("{disease}-d1"),
                completed_at: "2024-01-10".to_owned(),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_create_and_read_back() -> Result<()> {
        let mut store = store();
        let token = store.put_series("alice", series("measles"), None)?;
        let stored = store.series("alice", "measles").unwrap();
        assert_eq!(token, stored.updated_at);
        assert_eq!(1, store.member_series("alice").len());
        Ok(())
    }

    #[test]
    fn test_update_requires_current_token() -> Result<()> {
        let mut store = store();
        let token = store.put_series("alice", series("measles"), None)?;

        // Wrong token is a stale write surfaced as sync_conflict.
        let result = store.put_series("alice", series("measles"), Some("not-the-token"));
        let err = result.unwrap_err();
        assert!(matches!(err, StoreError::StaleWrite { .. }));
        assert_eq!(ErrorCode::SyncConflict, err.error_code());

        // A second create against an existing row is stale too.
        assert!(store.put_series("alice", series("measles"), None).is_err());

        // The captured token is accepted.
        store.put_series("alice", series("measles"), Some(&token))?;
        Ok(())
    }

    #[test]
    fn test_create_with_token_is_stale() {
        let mut store = store();
        let result = store.put_series("alice", series("measles"), Some("ghost"));
        assert!(matches!(result, Err(StoreError::StaleWrite { .. })));
    }

    #[test]
    fn test_delete_checks_token() -> Result<()> {
        let mut store = store();
        let token = store.put_series("alice", series("measles"), None)?;
        assert!(store.delete_series("alice", "measles", None).is_err());
        store.delete_series("alice", "measles", Some(&token))?;
        assert_eq!(None, store.series("alice", "measles"));
        assert!(matches!(
            store.delete_series("alice", "measles", Some(&token)),
            Err(StoreError::UnknownSeries { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_members_are_isolated() -> Result<()> {
        let mut store = store();
        store.put_series("alice", series("measles"), None)?;
        store.put_series("bob", series("measles"), None)?;
        assert_eq!(vec!["alice", "bob"], store.members().collect::<Vec<_>>());
        assert!(store.remove_member("bob"));
        assert_eq!(None, store.series("bob", "measles"));
        assert!(store.series("alice", "measles").is_some());
        Ok(())
    }

    #[test]
    fn test_replace_member_series() -> Result<()> {
        let mut store = store();
        store.put_series("alice", series("measles"), None)?;
        store.put_series("alice", series("flu"), None)?;
        let measles_row_id = store.member_series("alice")[0].id;

        let mut updated_measles = series("measles");
        updated_measles.future_due_doses = vec![PlannedDose {
            id: "p1".to_owned(),
            due_at: "2026-01-10".to_owned(),
            ..Default::default()
        }];
        let plan =
            store.replace_member_series("alice", vec![updated_measles, series("tetanus")]);

        assert_eq!(vec!["tetanus".to_owned()], plan.create_disease_ids);
        assert_eq!(vec!["measles".to_owned()], plan.update_disease_ids);
        assert_eq!(1, plan.delete_series_ids.len());

        // The flu row is gone, the measles row kept its id, tetanus is new.
        assert_eq!(None, store.series("alice", "flu"));
        let rows = store.member_series("alice");
        let measles = rows
            .iter()
            .find(|row| row.record.disease_id == "measles")
            .unwrap();
        assert_eq!(measles_row_id, measles.id);
        assert_eq!(1, measles.record.future_due_doses.len());
        assert!(store.series("alice", "tetanus").is_some());
        Ok(())
    }

    #[test]
    fn test_export_import_round_trip() -> Result<()> {
        let mut store = store();
        store.put_series("alice", series("measles"), None)?;
        store.put_series("alice", series("hpv"), None)?;
        let data = store.export_member("alice")?;

        let mut other = SeriesStore::with_clock(test_clock);
        let plan = other.import_member("alice", &data)?;
        assert_eq!(2, plan.create_disease_ids.len());

        // Dose identity survives the round trip.
        let dose_id = &other.series("alice", "measles").unwrap().completed_doses[0].id;
        assert_eq!("measles-d1", dose_id);
        Ok(())
    }

    #[test]
    fn test_import_rejects_garbage() {
        let mut store = store();
        assert!(store.import_member("alice", "not ron at all").is_err());
    }

    #[test]
    fn test_save_and_load() -> Result<()> {
        let mut store = store();
        store.put_series("alice", series("measles"), None)?;
        let path = std::env::temp_dir().join("vaccination_tracker_store_test.ron");
        store.save_to_path(&path)?;

        let loaded = SeriesStore::load_from_path(&path)?;
        fs::remove_file(&path)?;
        assert_eq!(
            store.member_series("alice"),
            loaded.member_series("alice")
        );
        Ok(())
    }
}
