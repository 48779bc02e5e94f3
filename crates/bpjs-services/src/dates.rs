//! Date handling for APOL request bodies.
//!
//! The gateway wants `YYYY-MM-DD HH:MM:SS`. Browser date pickers send
//! `YYYY-MM-DDTHH:MM`, some callers send a bare date.

use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, UtcOffset};
use tracing::warn;

const DATETIME: &[time::format_description::BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
const DATE: &[time::format_description::BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]");

/// Normalizes a caller-supplied date or datetime to the gateway format.
///
/// Input that cannot be parsed is returned unchanged.
pub fn format_upstream_datetime(input: &str) -> String {
    let mut candidate = input.trim().replacen('T', " ", 1);
    if candidate.len() == 16 {
        candidate.push_str(":00");
    }

    // Drop fractional seconds or a zone suffix
    if candidate.len() > 19 && candidate.is_char_boundary(19) {
        candidate.truncate(19);
    }

    if let Ok(datetime) = PrimitiveDateTime::parse(&candidate, DATETIME)
        && let Ok(formatted) = datetime.format(DATETIME)
    {
        return formatted;
    }

    if let Ok(date) = Date::parse(&candidate, DATE)
        && let Ok(formatted) = date.midnight().format(DATETIME)
    {
        return formatted;
    }

    warn!(input, "Unparseable date, sending as is");
    input.to_string()
}

/// Current wall-clock time at `offset` in the gateway format.
pub fn now_upstream(offset: UtcOffset) -> String {
    OffsetDateTime::now_utc()
        .to_offset(offset)
        .format(DATETIME)
        .unwrap_or_default()
}
