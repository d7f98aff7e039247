//! Per-(invoice, offset) dispatch records.
//!
//! The ledger is the de-duplication set of the scheduler. Every state change
//! goes through a single map entry, so concurrent dispatches of different pairs
//! never contend and the same pair can never be claimed twice.

use chrono::{NaiveDate, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashSet;
use uuid::Uuid;

use crate::models::{DispatchState, ReminderKey, ReminderRecord};

#[derive(Debug, Default)]
pub struct ReminderLedger {
    records: DashMap<ReminderKey, ReminderRecord>,
}

impl ReminderLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move a pair to `Dispatching`.
    ///
    /// A pair whose recorded due date differs from `due_date` starts over. A
    /// `Pending` or unknown pair is claimed; a `Failed` pair only when
    /// `retry_failed` is set. Otherwise the blocking state is returned.
    pub fn claim(
        &self,
        key: ReminderKey,
        due_date: NaiveDate,
        retry_failed: bool,
    ) -> Result<(), DispatchState> {
        match self.records.entry(key) {
            Entry::Occupied(mut entry) => {
                let record = entry.get_mut();
                if record.due_date != due_date {
                    record.reset(due_date);
                }
                match record.state {
                    DispatchState::Pending => {}
                    DispatchState::Failed if retry_failed => {}
                    blocking => return Err(blocking),
                }
                record.state = DispatchState::Dispatching;
                record.updated_at = Utc::now();
                Ok(())
            }
            Entry::Vacant(entry) => {
                entry.insert(ReminderRecord::new(key, due_date, DispatchState::Dispatching));
                Ok(())
            }
        }
    }

    /// Record a pair that comes due in a later cycle.
    pub fn defer(&self, key: ReminderKey, due_date: NaiveDate) {
        match self.records.entry(key) {
            Entry::Occupied(mut entry) => {
                if entry.get().due_date != due_date {
                    entry.get_mut().reset(due_date);
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(ReminderRecord::new(key, due_date, DispatchState::Pending));
            }
        }
    }

    /// Return a claimed pair to `Pending` without counting it as a failure.
    pub fn release(&self, key: ReminderKey) {
        if let Some(mut record) = self.records.get_mut(&key) {
            if record.state == DispatchState::Dispatching {
                record.state = DispatchState::Pending;
                record.updated_at = Utc::now();
            }
        }
    }

    pub fn mark_acked(&self, key: ReminderKey, attempts: u32) {
        self.finish(key, DispatchState::Acked, attempts, None);
    }

    pub fn mark_failed(&self, key: ReminderKey, attempts: u32, error: String) {
        self.finish(key, DispatchState::Failed, attempts, Some(error));
    }

    fn finish(&self, key: ReminderKey, state: DispatchState, attempts: u32, error: Option<String>) {
        if let Some(mut record) = self.records.get_mut(&key) {
            record.state = state;
            record.attempts = attempts;
            record.last_error = error;
            record.updated_at = Utc::now();
        }
    }

    /// Drop records that no longer belong to a live due-date cycle: the due
    /// date has passed, or the invoice was due inside the scanned window but
    /// the scan no longer returned it (paid, cancelled or moved). Pairs being
    /// dispatched are kept.
    pub fn prune(&self, today: NaiveDate, window_end: NaiveDate, scanned: &HashSet<Uuid>) -> usize {
        let before = self.records.len();
        self.records.retain(|key, record| {
            if record.state == DispatchState::Dispatching {
                return true;
            }
            if record.due_date < today {
                return false;
            }
            let in_window = record.due_date <= window_end;
            !(in_window && !scanned.contains(&key.invoice_id))
        });
        before.saturating_sub(self.records.len())
    }

    pub fn get(&self, key: &ReminderKey) -> Option<ReminderRecord> {
        self.records.get(key).map(|r| r.value().clone())
    }

    /// All records, ordered by trigger time then invoice.
    pub fn snapshot(&self) -> Vec<ReminderRecord> {
        let mut records: Vec<ReminderRecord> =
            self.records.iter().map(|r| r.value().clone()).collect();
        records.sort_by(|a, b| {
            a.trigger_at
                .cmp(&b.trigger_at)
                .then_with(|| a.invoice_id.cmp(&b.invoice_id))
        });
        records
    }
}
