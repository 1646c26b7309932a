use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;

/// Turns an ISO-8601 timestamp into the string painted next to an agent name.
pub trait TimestampFormatter {
    fn format(&self, iso: &str) -> String;
}

impl<F> TimestampFormatter for F
where
    F: Fn(&str) -> String,
{
    fn format(&self, iso: &str) -> String {
        self(iso)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTimestampFormatter;

impl TimestampFormatter for DefaultTimestampFormatter {
    fn format(&self, iso: &str) -> String {
        format_timestamp(iso)
    }
}

/// Formats RFC 3339 input as `YYYY-MM-DD HH:MM`; anything else is returned as given.
pub fn format_timestamp(iso: &str) -> String {
    let trimmed = iso.trim();
    let Ok(parsed) = OffsetDateTime::parse(trimmed, &Rfc3339) else {
        return trimmed.to_string();
    };
    let layout = format_description!("[year]-[month]-[day] [hour]:[minute]");
    parsed
        .format(&layout)
        .unwrap_or_else(|_| trimmed.to_string())
}
