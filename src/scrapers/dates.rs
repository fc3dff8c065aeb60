//! Listing date parsing for the different source formats.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

const TODAY_PREFIX: &str = "Heute, ";
const YESTERDAY_PREFIX: &str = "Gestern, ";

/// Absolute Kleinanzeigen layouts, tried in order. `%d`/`%m` also accept
/// unpadded values, so these cover `2.1.2006` as well.
const DATE_LAYOUTS: &[&str] = &["%d.%m.%Y"];
const DATETIME_LAYOUTS: &[&str] = &["%d.%m.%Y, %H:%M"];

/// Enter-date layouts of the form-search API.
const ENTER_DATE_LAYOUTS: &[&str] = &["%Y-%m-%d", "%d-%m-%Y", "%d/%m/%Y"];
const ENTER_DATETIME_LAYOUTS: &[&str] = &["%Y-%m-%d %H:%M:%S"];

/// Parse a classifieds listing date.
///
/// Handles `Heute, HH:MM` and `Gestern, HH:MM` relative to `now`, and
/// day-first absolute dates with an optional `, HH:MM` suffix. Relative
/// times are wall-clock times in `now`'s offset. Absolute dates are taken as
/// written and stored as UTC, so `01.02.2023` stays on the 1st of February.
/// Returns `None` rather than guessing.
pub fn parse_listing_date(text: &str, now: DateTime<FixedOffset>) -> Option<DateTime<Utc>> {
    let text = text.trim();
    let offset = *now.offset();

    if let Some(time) = text.strip_prefix(TODAY_PREFIX) {
        let time = NaiveTime::parse_from_str(time.trim(), "%H:%M").ok()?;
        return offset
            .from_local_datetime(&now.date_naive().and_time(time))
            .single()
            .map(|d| d.with_timezone(&Utc));
    }

    if let Some(time) = text.strip_prefix(YESTERDAY_PREFIX) {
        let time = NaiveTime::parse_from_str(time.trim(), "%H:%M").ok()?;
        let yesterday = now.date_naive().pred_opt()?;
        return offset
            .from_local_datetime(&yesterday.and_time(time))
            .single()
            .map(|d| d.with_timezone(&Utc));
    }

    if !text.contains('.') {
        return None;
    }

    parse_naive(text, DATE_LAYOUTS, DATETIME_LAYOUTS).map(|naive| naive.and_utc())
}

/// Parse a form-search `enterDate` as UTC.
pub fn parse_enter_date(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    parse_naive(text, ENTER_DATE_LAYOUTS, ENTER_DATETIME_LAYOUTS).map(|naive| naive.and_utc())
}

/// First layout that parses wins; date-only layouts are tried first.
fn parse_naive(text: &str, date_layouts: &[&str], datetime_layouts: &[&str]) -> Option<NaiveDateTime> {
    date_layouts
        .iter()
        .find_map(|layout| NaiveDate::parse_from_str(text, layout).ok())
        .map(|date| date.and_time(NaiveTime::default()))
        .or_else(|| {
            datetime_layouts
                .iter()
                .find_map(|layout| NaiveDateTime::parse_from_str(text, layout).ok())
        })
}
