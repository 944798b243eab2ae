use crate::domain::period::{CalendarWindow, Granularity, LabeledWindow, PeriodLabel, MAX_YEAR};
use crate::utils::error::{Result, SeriesError};

/// 解析 `MM-YYYY` 標籤並建立整月視窗，月份一律補成兩位數
pub fn build_month_window(label: &str) -> Result<LabeledWindow> {
    let (year, month) = parse_month_label(label)?;
    let window = CalendarWindow::month(year, month)
        .ok_or_else(|| SeriesError::invalid_period(label, "not a calendar month"))?;
    Ok(LabeledWindow {
        window,
        label: PeriodLabel::Month { year, month },
    })
}

/// 解析 `YYYY` 標籤並建立整年視窗
pub fn build_year_window(label: &str) -> Result<LabeledWindow> {
    let year = parse_year(label, label.trim())?;
    let window = CalendarWindow::year(year)
        .ok_or_else(|| SeriesError::invalid_period(label, "not a calendar year"))?;
    Ok(LabeledWindow {
        window,
        label: PeriodLabel::Year { year },
    })
}

/// Builds the window for a label of the given granularity.
pub fn build_window(label: &str, granularity: Granularity) -> Result<LabeledWindow> {
    match granularity {
        Granularity::Month => build_month_window(label),
        Granularity::Year => build_year_window(label),
    }
}

pub(crate) fn parse_month_label(label: &str) -> Result<(i32, u32)> {
    let (month_part, year_part) = label
        .trim()
        .split_once('-')
        .ok_or_else(|| SeriesError::invalid_period(label, "expected MM-YYYY"))?;
    let month = parse_month(label, month_part)?;
    let year = parse_year(label, year_part)?;
    Ok((year, month))
}

pub(crate) fn parse_year(label: &str, part: &str) -> Result<i32> {
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(SeriesError::invalid_period(
            label,
            format!("year '{}' is not a positive integer", part),
        ));
    }
    match part.parse::<i32>() {
        Ok(year) if (1..=MAX_YEAR).contains(&year) => Ok(year),
        Ok(0) => Err(SeriesError::invalid_period(
            label,
            format!("year '{}' is not a positive integer", part),
        )),
        _ => Err(SeriesError::invalid_period(
            label,
            format!("year '{}' is outside 1-{}", part, MAX_YEAR),
        )),
    }
}

fn parse_month(label: &str, part: &str) -> Result<u32> {
    if part.is_empty() || part.len() > 2 || !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(SeriesError::invalid_period(
            label,
            format!("month '{}' is not numeric", part),
        ));
    }
    let month: u32 = part
        .parse()
        .map_err(|_| SeriesError::invalid_period(label, format!("month '{}' is not numeric", part)))?;
    if !(1..=12).contains(&month) {
        return Err(SeriesError::invalid_period(
            label,
            format!("month {} is outside 1-12", month),
        ));
    }
    Ok(month)
}
