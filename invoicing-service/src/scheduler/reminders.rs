//! Due-date reminder scheduler.
//!
//! Each cycle scans payable invoices due within the lookahead window, works
//! out which (invoice, offset) pairs come due before the next cycle, and
//! dispatches them concurrently. The ledger guarantees a pair is delivered at
//! most once per due date; a pair whose delivery fails terminally stays
//! `Failed` until a caller explicitly asks for it again.

use chrono::{Days, NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::error::InvoicingError;
use crate::models::{
    reminder::format_trigger, ActivityEvent, CycleReport, DispatchState, Invoice, ReminderKey,
    ReminderOffset, ReminderRecord, ScheduleOutcome, ScheduleStatus,
};
use crate::scheduler::ledger::ReminderLedger;
use crate::scheduler::scanner::DueInvoiceScanner;
use crate::services::activity::ActivityPublisher;
use crate::services::customers::CustomerDirectory;
use crate::services::dispatcher::NotificationDispatcher;
use crate::services::metrics::{REMINDERS_TOTAL, SCHEDULER_CYCLE_DURATION};
use crate::services::store::InvoiceStore;
use crate::services::templates;

const SECONDS_PER_DAY: u64 = 86_400;

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    /// Time between cycles.
    pub cadence: Duration,
    /// How far ahead of today the scan looks for due dates.
    pub lookahead_days: u32,
    /// Upper bound on concurrent dispatches within a cycle.
    pub max_concurrent_dispatches: usize,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            cadence: Duration::from_secs(SECONDS_PER_DAY),
            lookahead_days: 14,
            max_concurrent_dispatches: 8,
        }
    }
}

impl SchedulerSettings {
    /// Cadence in whole days, rounded up, at least one.
    pub fn cadence_days(&self) -> u64 {
        self.cadence.as_secs().div_ceil(SECONDS_PER_DAY).max(1)
    }
}

/// Where a trigger date falls relative to the current cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerWindow {
    /// The trigger date passed before this cycle. Never sent late.
    Missed,
    /// The trigger date falls before the next cycle runs.
    Due,
    /// A later cycle will handle it.
    Later,
}

pub fn classify(trigger_date: NaiveDate, today: NaiveDate, cadence_days: u64) -> TriggerWindow {
    let next_cycle = today
        .checked_add_days(Days::new(cadence_days.max(1)))
        .unwrap_or(NaiveDate::MAX);

    if trigger_date < today {
        TriggerWindow::Missed
    } else if trigger_date < next_cycle {
        TriggerWindow::Due
    } else {
        TriggerWindow::Later
    }
}

/// One schedule point of an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedReminder {
    pub key: ReminderKey,
    pub due_date: NaiveDate,
    pub trigger_date: NaiveDate,
    pub window: TriggerWindow,
}

/// Every reminder offset of `invoice` classified against `today`.
pub fn plan(invoice: &Invoice, today: NaiveDate, cadence_days: u64) -> Vec<PlannedReminder> {
    ReminderOffset::ALL
        .iter()
        .map(|offset| {
            let trigger_date = offset.trigger_date(invoice.due_date);
            PlannedReminder {
                key: ReminderKey::new(invoice.invoice_id, *offset),
                due_date: invoice.due_date,
                trigger_date,
                window: classify(trigger_date, today, cadence_days),
            }
        })
        .collect()
}

enum JobOutcome {
    Acked,
    Failed,
    DirectoryFailure,
}

pub struct ReminderScheduler {
    store: Arc<dyn InvoiceStore>,
    scanner: DueInvoiceScanner,
    customers: Arc<dyn CustomerDirectory>,
    dispatcher: Arc<NotificationDispatcher>,
    activity: Arc<dyn ActivityPublisher>,
    ledger: ReminderLedger,
    settings: SchedulerSettings,
}

impl ReminderScheduler {
    pub fn new(
        store: Arc<dyn InvoiceStore>,
        customers: Arc<dyn CustomerDirectory>,
        dispatcher: Arc<NotificationDispatcher>,
        activity: Arc<dyn ActivityPublisher>,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            scanner: DueInvoiceScanner::new(Arc::clone(&store)),
            store,
            customers,
            dispatcher,
            activity,
            ledger: ReminderLedger::new(),
            settings,
        }
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    /// Records of every tracked pair, including failed ones.
    pub fn list_reminders(&self) -> Vec<ReminderRecord> {
        self.ledger.snapshot()
    }

    pub fn reminder(&self, invoice_id: Uuid, offset: ReminderOffset) -> Option<ReminderRecord> {
        self.ledger.get(&ReminderKey::new(invoice_id, offset))
    }

    /// Run one cycle for the current UTC date.
    pub async fn run_cycle(&self) -> Result<CycleReport, InvoicingError> {
        self.run_cycle_at(Utc::now().date_naive()).await
    }

    /// Run one cycle as if today were `today`.
    #[instrument(skip(self))]
    pub async fn run_cycle_at(&self, today: NaiveDate) -> Result<CycleReport, InvoicingError> {
        let timer = SCHEDULER_CYCLE_DURATION.start_timer();
        let cadence_days = self.settings.cadence_days();

        let invoices = self.scanner.scan(today, self.settings.lookahead_days).await?;
        let scanned: HashSet<Uuid> = invoices.iter().map(|inv| inv.invoice_id).collect();
        let window_end = DueInvoiceScanner::window_end(today, self.settings.lookahead_days);
        self.ledger.prune(today, window_end, &scanned);

        let mut report = CycleReport {
            invoices_scanned: invoices.len(),
            ..CycleReport::default()
        };
        let mut jobs: Vec<(ReminderKey, Invoice)> = Vec::new();

        for invoice in &invoices {
            for planned in plan(invoice, today, cadence_days) {
                match planned.window {
                    TriggerWindow::Missed => report.missed += 1,
                    TriggerWindow::Later => {
                        self.ledger.defer(planned.key, planned.due_date);
                        report.deferred += 1;
                    }
                    TriggerWindow::Due => {
                        if self.ledger.claim(planned.key, planned.due_date, false).is_ok() {
                            jobs.push((planned.key, invoice.clone()));
                        }
                    }
                }
            }
        }

        report.dispatched = jobs.len();

        let outcomes: Vec<JobOutcome> = stream::iter(jobs)
            .map(|(key, invoice)| self.deliver(key, invoice, None))
            .buffer_unordered(self.settings.max_concurrent_dispatches.max(1))
            .collect()
            .await;

        for outcome in outcomes {
            match outcome {
                JobOutcome::Acked => report.acked += 1,
                JobOutcome::Failed => report.failed += 1,
                JobOutcome::DirectoryFailure => report.directory_failures += 1,
            }
        }

        timer.observe_duration();

        info!(
            today = %today,
            invoices_scanned = report.invoices_scanned,
            dispatched = report.dispatched,
            acked = report.acked,
            failed = report.failed,
            deferred = report.deferred,
            missed = report.missed,
            directory_failures = report.directory_failures,
            "Reminder cycle finished"
        );

        Ok(report)
    }

    /// Deliver one claimed pair and record the outcome in the ledger. With no
    /// explicit recipient the customer's address is looked up first.
    async fn deliver(
        &self,
        key: ReminderKey,
        invoice: Invoice,
        recipient: Option<String>,
    ) -> JobOutcome {
        let offset_label = key.offset.to_string();

        let recipient = match recipient {
            Some(recipient) => recipient,
            None => match self.customers.email_for_customer(invoice.customer_id).await {
                Ok(email) => email,
                Err(e) => {
                    warn!(
                        invoice_id = %key.invoice_id,
                        offset_days = key.offset.days(),
                        error = %e,
                        "Customer lookup failed, reminder left pending"
                    );
                    self.ledger.release(key);
                    REMINDERS_TOTAL
                        .with_label_values(&[offset_label.as_str(), "directory_failure"])
                        .inc();
                    return JobOutcome::DirectoryFailure;
                }
            },
        };

        let message = templates::reminder_message(&invoice, key.offset);
        match self
            .dispatcher
            .send(&recipient, templates::REMINDER_SUBJECT, &message)
            .await
        {
            Ok(receipt) => {
                self.ledger.mark_acked(key, receipt.attempts);
                REMINDERS_TOTAL
                    .with_label_values(&[offset_label.as_str(), "acked"])
                    .inc();
                info!(
                    invoice_id = %key.invoice_id,
                    offset_days = key.offset.days(),
                    attempts = receipt.attempts,
                    "Reminder delivered"
                );
                self.activity
                    .publish(ActivityEvent::ReminderSent {
                        invoice_id: key.invoice_id,
                        offset_days: key.offset,
                        recipient,
                    })
                    .await;
                JobOutcome::Acked
            }
            Err(e) => {
                let attempts = match &e {
                    InvoicingError::TerminalDispatchFailure { attempts, .. } => *attempts,
                    _ => 0,
                };
                self.ledger.mark_failed(key, attempts, e.to_string());
                REMINDERS_TOTAL
                    .with_label_values(&[offset_label.as_str(), "failed"])
                    .inc();
                error!(
                    invoice_id = %key.invoice_id,
                    offset_days = key.offset.days(),
                    attempts = attempts,
                    error = %e,
                    "Reminder delivery failed"
                );
                self.activity
                    .publish(ActivityEvent::ReminderFailed {
                        invoice_id: key.invoice_id,
                        offset_days: key.offset,
                        attempts,
                        error: e.to_string(),
                    })
                    .await;
                JobOutcome::Failed
            }
        }
    }

    /// Send one reminder now, outside the periodic cycle.
    ///
    /// A pair already delivered for the invoice's current due date is not sent
    /// again, and a pair being dispatched is left alone. A failed pair is
    /// retried.
    #[instrument(skip(self, customer_email), fields(invoice_id = %invoice_id, offset_days = offset_days))]
    pub async fn schedule_one(
        &self,
        invoice_id: Uuid,
        customer_email: &str,
        offset_days: i64,
    ) -> Result<ScheduleOutcome, InvoicingError> {
        let offset = ReminderOffset::try_from(offset_days)?;
        if customer_email.trim().is_empty() {
            return Err(InvoicingError::InvalidRequest(
                "customer_email is required".to_string(),
            ));
        }

        let invoice = self
            .store
            .get_by_id(invoice_id)
            .await?
            .ok_or_else(|| InvoicingError::NotFound(format!("Invoice {}", invoice_id)))?;

        if !invoice.status.is_payable() {
            return Err(InvoicingError::InvalidRequest(format!(
                "invoice is {} and takes no reminders",
                invoice.status.as_str()
            )));
        }

        let key = ReminderKey::new(invoice_id, offset);
        let trigger_at = format_trigger(offset.trigger_date(invoice.due_date));
        let outcome = |status, attempts| ScheduleOutcome {
            invoice_id,
            offset_days: offset,
            status,
            trigger_at: trigger_at.clone(),
            attempts,
        };

        match self.ledger.claim(key, invoice.due_date, true) {
            Err(DispatchState::Dispatching) => return Ok(outcome(ScheduleStatus::InFlight, 0)),
            Err(_) => {
                let attempts = self.ledger.get(&key).map(|r| r.attempts).unwrap_or(0);
                return Ok(outcome(ScheduleStatus::AlreadySent, attempts));
            }
            Ok(()) => {}
        }

        match self
            .deliver(key, invoice, Some(customer_email.to_string()))
            .await
        {
            JobOutcome::Acked => {
                let attempts = self.ledger.get(&key).map(|r| r.attempts).unwrap_or(1);
                Ok(outcome(ScheduleStatus::Sent, attempts))
            }
            _ => {
                let record = self.ledger.get(&key);
                Err(InvoicingError::TerminalDispatchFailure {
                    recipient: customer_email.to_string(),
                    attempts: record.as_ref().map(|r| r.attempts).unwrap_or(0),
                    last_error: record
                        .and_then(|r| r.last_error)
                        .unwrap_or_else(|| "delivery failed".to_string()),
                })
            }
        }
    }

    /// Run cycles on the configured cadence until `shutdown` is cancelled.
    ///
    /// The first cycle starts immediately. Cancellation stops new cycles; a
    /// cycle already running finishes its dispatches before the task exits.
    pub fn spawn(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(self.settings.cadence.max(Duration::from_secs(1)));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!(
                cadence_secs = self.settings.cadence.as_secs(),
                lookahead_days = self.settings.lookahead_days,
                "Reminder scheduler started"
            );

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = self.run_cycle().await {
                            error!(error = %e, "Reminder cycle failed");
                        }
                    }
                }
            }

            info!("Reminder scheduler stopped");
        })
    }
}
