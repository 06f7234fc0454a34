//! Merge-tag substitution for campaign subjects and bodies.
//!
//! Rendering is pure, total and literal: known tags are replaced with the
//! recipient's data, anything else (including unknown `{{...}}` tokens) is
//! left verbatim. Templates are trusted internal content, so no escaping is
//! applied.

use chrono::NaiveDate;

use crate::domain::Recipient;

/// A recipient's personalized subject and body, ready for dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub subject: String,
    pub body: String,
}

pub fn render(template: &str, recipient: &Recipient) -> String {
    let full_name = format!("{} {}", recipient.first_name, recipient.last_name)
        .trim()
        .to_string();

    template
        .replace("{{first_name}}", &recipient.first_name)
        .replace("{{last_name}}", &recipient.last_name)
        .replace("{{full_name}}", &full_name)
        .replace("{{email}}", recipient.email.as_ref())
        .replace("{{membership_level}}", recipient.tier_id.as_ref())
        .replace("{{renewal_date}}", &format_date(recipient.renewal_date))
        .replace("{{join_date}}", &format_date(recipient.join_date))
}

pub fn render_message(subject: &str, body: &str, recipient: &Recipient) -> RenderedMessage {
    RenderedMessage {
        subject: render(subject, recipient),
        body: render(body, recipient),
    }
}

// "January 15, 2026", not ISO. Existing templates rely on this shape.
fn format_date(date: NaiveDate) -> String {
    date.format("%B %-d, %Y").to_string()
}
