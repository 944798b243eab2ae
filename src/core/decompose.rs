use crate::core::calendar::{parse_month_label, parse_year};
use crate::domain::period::{CalendarWindow, Granularity, LabeledWindow, PeriodLabel};
use crate::utils::error::{Result, SeriesError};
use std::iter::FusedIterator;

/// 月份序列：起始年剩餘月份、中間完整年份、結束年前段月份，依序接續。
/// 每次呼叫 `decompose_months` 都產生獨立的迭代器，可重複取用。
#[derive(Debug, Clone)]
pub struct MonthRange {
    year: i32,
    month: u32,
    remaining: usize,
}

impl Iterator for MonthRange {
    type Item = LabeledWindow;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let (year, month) = (self.year, self.month);
        let window = CalendarWindow::month(year, month)?;
        self.remaining -= 1;
        if month == 12 {
            self.year = year.saturating_add(1);
            self.month = 1;
        } else {
            self.month = month + 1;
        }
        Some(LabeledWindow {
            window,
            label: PeriodLabel::Month { year, month },
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for MonthRange {}
impl FusedIterator for MonthRange {}

#[derive(Debug, Clone)]
pub struct YearRange {
    year: i32,
    remaining: usize,
}

impl Iterator for YearRange {
    type Item = LabeledWindow;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let year = self.year;
        let window = CalendarWindow::year(year)?;
        self.remaining -= 1;
        self.year = year.saturating_add(1);
        Some(LabeledWindow {
            window,
            label: PeriodLabel::Year { year },
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for YearRange {}
impl FusedIterator for YearRange {}

/// 依粒度分派的視窗序列
#[derive(Debug, Clone)]
pub enum Windows {
    Months(MonthRange),
    Years(YearRange),
    Single(std::option::IntoIter<LabeledWindow>),
}

impl Windows {
    pub fn single(window: LabeledWindow) -> Self {
        Windows::Single(Some(window).into_iter())
    }
}

impl Iterator for Windows {
    type Item = LabeledWindow;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Windows::Months(range) => range.next(),
            Windows::Years(range) => range.next(),
            Windows::Single(one) => one.next(),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self {
            Windows::Months(range) => range.size_hint(),
            Windows::Years(range) => range.size_hint(),
            Windows::Single(one) => one.size_hint(),
        }
    }
}

impl ExactSizeIterator for Windows {}
impl FusedIterator for Windows {}

/// Every month from `start` to `end` inclusive, both `MM-YYYY`.
pub fn decompose_months(start: &str, end: &str) -> Result<MonthRange> {
    let (start_year, start_month) = parse_month_label(start)?;
    let (end_year, end_month) = parse_month_label(end)?;
    if (start_year, start_month) > (end_year, end_month) {
        return Err(reversed(start, end));
    }
    let months = (i64::from(end_year) - i64::from(start_year)) * 12
        + i64::from(end_month)
        - i64::from(start_month)
        + 1;
    Ok(MonthRange {
        year: start_year,
        month: start_month,
        remaining: months as usize,
    })
}

/// Every year from `start` to `end` inclusive, both `YYYY`.
pub fn decompose_years(start: &str, end: &str) -> Result<YearRange> {
    let start_year = parse_year(start, start.trim())?;
    let end_year = parse_year(end, end.trim())?;
    if start_year > end_year {
        return Err(reversed(start, end));
    }
    Ok(YearRange {
        year: start_year,
        remaining: (i64::from(end_year) - i64::from(start_year) + 1) as usize,
    })
}

pub fn decompose(start: &str, end: &str, granularity: Granularity) -> Result<Windows> {
    match granularity {
        Granularity::Month => decompose_months(start, end).map(Windows::Months),
        Granularity::Year => decompose_years(start, end).map(Windows::Years),
    }
}

fn reversed(start: &str, end: &str) -> SeriesError {
    SeriesError::ReversedRange {
        start: start.trim().to_string(),
        end: end.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels<I: Iterator<Item = LabeledWindow>>(iter: I) -> Vec<String> {
        iter.map(|w| w.label.to_string()).collect()
    }

    fn assert_contiguous(windows: &[LabeledWindow]) {
        for pair in windows.windows(2) {
            assert!(pair[0].label < pair[1].label);
            assert!(pair[0].window.end() < pair[1].window.start());
            assert_eq!(pair[0].window.next_start(), pair[1].window.start());
        }
    }

    #[test]
    fn test_cross_year_months() {
        let got = labels(decompose_months("10-2013", "02-2014").unwrap());
        assert_eq!(got, vec!["10-2013", "11-2013", "12-2013", "01-2014", "02-2014"]);
    }

    #[test]
    fn test_same_year_months() {
        let got = labels(decompose_months("03-2015", "06-2015").unwrap());
        assert_eq!(got, vec!["03-2015", "04-2015", "05-2015", "06-2015"]);
    }

    #[test]
    fn test_intervening_full_years() {
        let windows: Vec<_> = decompose_months("11-2012", "02-2015").unwrap().collect();
        assert_eq!(windows.len(), 2 + 12 + 12 + 2);
        assert_eq!(windows[2].label.to_string(), "01-2013");
        assert_eq!(windows[25].label.to_string(), "12-2014");
        assert_eq!(windows[27].label.to_string(), "02-2015");
        assert_contiguous(&windows);
    }

    #[test]
    fn test_month_counts_and_gapless_coverage() {
        let starts = ["01-2010", "07-2011", "12-2012", "02-2016"];
        let ends = ["12-2012", "02-2016", "03-2016", "01-2020"];
        for start in starts {
            for end in ends {
                let (sy, sm) = parse_month_label(start).unwrap();
                let (ey, em) = parse_month_label(end).unwrap();
                if (sy, sm) > (ey, em) {
                    continue;
                }
                let expected = ((ey - sy) * 12 + em as i32 - sm as i32 + 1) as usize;
                let range = decompose_months(start, end).unwrap();
                assert_eq!(range.len(), expected);
                let windows: Vec<_> = range.collect();
                assert_eq!(windows.len(), expected);
                assert_contiguous(&windows);
                let total_days: u32 = windows.iter().map(|w| w.window.days()).sum();
                let span_days: u32 = (sy..=ey)
                    .map(|y| CalendarWindow::year(y).unwrap().days())
                    .sum::<u32>()
                    - (1..sm)
                        .map(|m| CalendarWindow::month(sy, m).unwrap().days())
                        .sum::<u32>()
                    - (em + 1..=12)
                        .map(|m| CalendarWindow::month(ey, m).unwrap().days())
                        .sum::<u32>();
                assert_eq!(total_days, span_days);
            }
        }
    }

    #[test]
    fn test_year_decomposition() {
        let windows: Vec<_> = decompose_years("2010", "2015").unwrap().collect();
        assert_eq!(windows.len(), 2015 - 2010 + 1);
        assert_eq!(windows[0].label.to_string(), "2010");
        assert_eq!(windows[5].label.to_string(), "2015");
        assert_contiguous(&windows);
    }

    #[test]
    fn test_decomposition_is_restartable() {
        let first: Vec<_> = decompose_months("10-2013", "02-2014").unwrap().collect();
        let second: Vec<_> = decompose_months("10-2013", "02-2014").unwrap().collect();
        assert_eq!(first, second);

        let mut range = decompose_years("2001", "2003").unwrap();
        let copy = range.clone();
        range.next();
        assert_eq!(range.count(), 2);
        assert_eq!(copy.count(), 3);
    }

    #[test]
    fn test_reversed_range_is_rejected() {
        assert!(matches!(
            decompose_months("03-2014", "02-2014"),
            Err(SeriesError::ReversedRange { .. })
        ));
        assert!(matches!(
            decompose_years("2015", "2014"),
            Err(SeriesError::ReversedRange { .. })
        ));
    }

    #[test]
    fn test_malformed_labels_are_rejected() {
        assert!(matches!(
            decompose_months("13-2013", "02-2014"),
            Err(SeriesError::InvalidPeriod { .. })
        ));
        assert!(matches!(
            decompose_years("2014", "twenty"),
            Err(SeriesError::InvalidPeriod { .. })
        ));
    }

    #[test]
    fn test_windows_dispatch_and_single() {
        let windows = decompose("2014", "2016", Granularity::Year).unwrap();
        assert_eq!(windows.len(), 3);
        let single = Windows::single(crate::core::calendar::build_month_window("04-2014").unwrap());
        assert_eq!(labels(single), vec!["04-2014"]);
    }
}
