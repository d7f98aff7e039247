//! E-mail subjects and bodies.

use chrono::NaiveDate;

use crate::models::{Invoice, ReminderOffset};

pub const INVOICE_SUBJECT: &str = "Your Invoice";
pub const REMINDER_SUBJECT: &str = "Invoice Payment Reminder";

/// Render minor units as `major.minor` with two decimals.
pub fn format_amount(minor_units: i64) -> String {
    let sign = if minor_units < 0 { "-" } else { "" };
    let abs = minor_units.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn invoice_message(invoice: &Invoice) -> String {
    let mut body = format!(
        "Invoice {} for {} {} is due on {}.",
        invoice.invoice_number,
        format_amount(invoice.total),
        invoice.currency,
        format_date(invoice.due_date)
    );
    if !invoice.note.is_empty() {
        body.push_str("\n\n");
        body.push_str(&invoice.note);
    }
    body
}

pub fn reminder_message(invoice: &Invoice, offset: ReminderOffset) -> String {
    let days = offset.days();
    format!(
        "Reminder: Your invoice {} is due on {} ({} day{} from now). Please ensure payment of {} {} is made.",
        invoice.invoice_number,
        format_date(invoice.due_date),
        days,
        if days == 1 { "" } else { "s" },
        format_amount(invoice.total),
        invoice.currency
    )
}
