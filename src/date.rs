//! Day-first date parsing for section titles.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

static NUMERIC_DMY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})[/.\-](\d{1,2})[/.\-](\d{4}|\d{2})\b").unwrap());
static NUMERIC_YMD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{4})[/.\-](\d{1,2})[/.\-](\d{1,2})\b").unwrap());
static DAY_MONTH_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{1,2})(?:st|nd|rd|th)?[\s\-]+([a-z]{3,9})\.?,?[\s\-]+(\d{4}|\d{2})\b").unwrap()
});
static MONTH_DAY_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b([a-z]{3,9})\.?\s+(\d{1,2})(?:st|nd|rd|th)?,?\s+(\d{4})\b").unwrap()
});
static MONTH_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([a-z]{3,9})\.?,?[\s\-]+(\d{4})\b").unwrap());
static NUMERIC_MONTH_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[^\d/.\-])(\d{1,2})[/\-](\d{4})\b").unwrap());

fn month_number(name: &str) -> Option<u32> {
    const MONTHS: [&str; 12] = [
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ];
    if name == "sept" {
        return Some(9);
    }
    let prefix = name.get(..3)?;
    let idx = MONTHS.iter().position(|m| *m == prefix)?;
    let full = [
        "january", "february", "march", "april", "may", "june", "july", "august", "september",
        "october", "november", "december",
    ][idx];
    // either the abbreviation or a prefix of the full name
    if name.len() == 3 || full.starts_with(name) {
        Some(idx as u32 + 1)
    } else {
        None
    }
}

/// Two-digit years below 70 are read as 20xx, the rest as 19xx.
fn full_year(year: &str) -> Option<i32> {
    let value: i32 = year.parse().ok()?;
    Some(match year.len() {
        2 if value < 70 => 2000 + value,
        2 => 1900 + value,
        _ => value,
    })
}

fn ymd(year: &str, month: u32, day: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(full_year(year)?, month, day.parse().ok()?)
}

/// Find the first date in `text`, preferring day-first readings.
///
/// `03/04/2021` is 3 April 2021. Month-year forms resolve to the first day
/// of the month. Times and surrounding words are ignored.
pub fn parse_day_first(text: &str) -> Option<NaiveDate> {
    let text = text.to_lowercase();

    if let Some(caps) = NUMERIC_YMD.captures(&text) {
        if let Some(date) = ymd(&caps[1], caps[2].parse().ok()?, &caps[3]) {
            return Some(date);
        }
    }
    if let Some(caps) = NUMERIC_DMY.captures(&text) {
        let (first, second) = (&caps[1], &caps[2]);
        let day_first = ymd(&caps[3], second.parse().ok()?, first);
        // month-first only when the day-first reading is impossible
        if let Some(date) = day_first.or_else(|| ymd(&caps[3], first.parse().ok()?, second)) {
            return Some(date);
        }
    }
    if let Some(caps) = DAY_MONTH_YEAR.captures(&text) {
        if let Some(month) = month_number(&caps[2]) {
            if let Some(date) = ymd(&caps[3], month, &caps[1]) {
                return Some(date);
            }
        }
    }
    if let Some(caps) = MONTH_DAY_YEAR.captures(&text) {
        if let Some(month) = month_number(&caps[1]) {
            if let Some(date) = ymd(&caps[3], month, &caps[2]) {
                return Some(date);
            }
        }
    }
    for caps in MONTH_YEAR.captures_iter(&text) {
        if let Some(month) = month_number(&caps[1]) {
            if let Some(date) = ymd(&caps[2], month, "1") {
                return Some(date);
            }
        }
    }
    if let Some(caps) = NUMERIC_MONTH_YEAR.captures(&text) {
        return ymd(&caps[2], caps[1].parse().ok()?, "1");
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[test]
    fn numeric_dates_are_day_first() {
        assert_eq!(parse_day_first("03/04/2021"), date(2021, 4, 3));
        assert_eq!(parse_day_first("12-03-21"), date(2021, 3, 12));
        assert_eq!(parse_day_first("2021-03-12"), date(2021, 3, 12));
        // 25 cannot be a month, so the month-first reading applies
        assert_eq!(parse_day_first("04/25/2021"), date(2021, 4, 25));
    }

    #[test]
    fn month_names_and_partial_dates() {
        assert_eq!(parse_day_first("3 Apr 2021"), date(2021, 4, 3));
        assert_eq!(parse_day_first("April 3rd 2021"), date(2021, 4, 3));
        assert_eq!(parse_day_first("Jan 2020"), date(2020, 1, 1));
        assert_eq!(parse_day_first("1/2020"), date(2020, 1, 1));
    }

    #[test]
    fn surrounding_text_and_times_are_ignored() {
        assert_eq!(parse_day_first("\n12/03/2021 10:30"), date(2021, 3, 12));
        assert_eq!(parse_day_first("Clinic review 5 March 1999:"), date(1999, 3, 5));
    }

    #[test]
    fn two_digit_years_pivot() {
        assert_eq!(parse_day_first("01/02/69"), date(2069, 2, 1));
        assert_eq!(parse_day_first("01/02/70"), date(1970, 2, 1));
    }

    #[test]
    fn unparsable_text_is_none() {
        assert_eq!(parse_day_first("history of presenting illness"), None);
        assert_eq!(parse_day_first("31/02/2021"), None);
    }
}
