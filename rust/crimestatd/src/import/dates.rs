use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];
const MONTH_NAMES: [&str; 12] = [
    "january", "february", "march", "april", "may", "june", "july", "august", "september",
    "october", "november", "december",
];

/// Excel serial day numbers count from 1899-12-30. Only values in this range
/// (1954..2119) are treated as serials, so plain years or counts are not.
const EXCEL_SERIAL_RANGE: std::ops::RangeInclusive<i64> = 20_000..=80_000;

/// Reads a month header cell. Accepts what government exports are seen to use:
/// SpreadsheetML `DateTime` values, ISO dates, Australian `dd/mm/yyyy`,
/// `Jan-15`, `Jan-2015`, `Jan 2015`, `January 2015` and Excel serial numbers.
pub fn parse_header_date(text: &str) -> Option<NaiveDate> {
    let s = text.trim();
    if s.is_empty() {
        return None;
    }
    let date = parse_iso(s)
        .or_else(|| NaiveDate::parse_from_str(s, "%d/%m/%Y").ok())
        .or_else(|| parse_month_year(s))
        .or_else(|| parse_excel_serial(s))?;
    if (1900..=9999).contains(&date.year()) {
        Some(date)
    } else {
        None
    }
}

fn parse_iso(s: &str) -> Option<NaiveDate> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|dt| dt.date())
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").map(|dt| dt.date()))
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .ok()
}

fn parse_month_year(s: &str) -> Option<NaiveDate> {
    let parts: Vec<&str> = s
        .split(|c: char| c == '-' || c == ' ')
        .filter(|p| !p.is_empty())
        .collect();
    let [month, year] = parts.as_slice() else {
        return None;
    };

    let month_lc = month.to_ascii_lowercase();
    let idx = MONTHS
        .iter()
        .position(|m| *m == month_lc)
        .or_else(|| MONTH_NAMES.iter().position(|m| *m == month_lc))?;

    if !year.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let year: i32 = match year.len() {
        // Same pivot as strptime's %y: 69-99 are the 1900s.
        2 => {
            let yy: i32 = year.parse().ok()?;
            if yy >= 69 {
                1900 + yy
            } else {
                2000 + yy
            }
        }
        4 => year.parse().ok()?,
        _ => return None,
    };
    NaiveDate::from_ymd_opt(year, idx as u32 + 1, 1)
}

fn parse_excel_serial(s: &str) -> Option<NaiveDate> {
    let serial = s.parse::<f64>().ok()?;
    if !serial.is_finite() || serial.fract() != 0.0 {
        return None;
    }
    let serial = serial as i64;
    if !EXCEL_SERIAL_RANGE.contains(&serial) {
        return None;
    }
    NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_signed(Duration::days(serial))
}
