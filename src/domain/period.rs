use chrono::NaiveDate;
use serde::{Serialize, Serializer};
use std::fmt;

/// 時間粒度：整月或整年
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Granularity {
    Month,
    Year,
}

impl Granularity {
    /// 依日期字串判斷粒度，含 `-` 視為月份
    pub fn detect(date: &str) -> Self {
        if date.contains('-') {
            Granularity::Month
        } else {
            Granularity::Year
        }
    }

    /// 輸出表格中附加的標籤欄位名稱
    pub fn column_name(&self) -> &'static str {
        match self {
            Granularity::Month => "Month",
            Granularity::Year => "Year",
        }
    }
}

/// 單一時間區段的標籤，`MM-YYYY` 或 `YYYY`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PeriodLabel {
    Month { year: i32, month: u32 },
    Year { year: i32 },
}

impl PeriodLabel {
    pub fn granularity(&self) -> Granularity {
        match self {
            PeriodLabel::Month { .. } => Granularity::Month,
            PeriodLabel::Year { .. } => Granularity::Year,
        }
    }

    pub fn year(&self) -> i32 {
        match *self {
            PeriodLabel::Month { year, .. } | PeriodLabel::Year { year } => year,
        }
    }

    /// 輸出檔名，例如 `04-2014.csv`
    pub fn file_name(&self) -> String {
        format!("{}.csv", self)
    }
}

impl fmt::Display for PeriodLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeriodLabel::Month { year, month } => write!(f, "{:02}-{:04}", month, year),
            PeriodLabel::Year { year } => write!(f, "{:04}", year),
        }
    }
}

impl Serialize for PeriodLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// 支援的最大年份，與 chrono 可表示的四位數年份一致
pub const MAX_YEAR: i32 = 9999;

/// Simplified leap-year rule: every year divisible by 4, century years included.
/// 1900 and 2100 are therefore treated as leap years. Kept deliberately; swap this
/// function to move to the full Gregorian rule.
pub fn is_leap_year(year: i32) -> bool {
    year % 4 == 0
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        2 if is_leap_year(year) => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

/// 日曆日期，順序即時間先後
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CalendarDate {
    year: i32,
    month: u32,
    day: u32,
}

impl CalendarDate {
    pub fn new(year: i32, month: u32, day: u32) -> Option<Self> {
        if !(1..=MAX_YEAR).contains(&year) || !(1..=12).contains(&month) {
            return None;
        }
        if day == 0 || day > days_in_month(year, month) {
            return None;
        }
        Some(Self { year, month, day })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn day(&self) -> u32 {
        self.day
    }

    pub fn next_day(&self) -> Self {
        if self.day < days_in_month(self.year, self.month) {
            Self {
                day: self.day + 1,
                ..*self
            }
        } else if self.month < 12 {
            Self {
                year: self.year,
                month: self.month + 1,
                day: 1,
            }
        } else {
            Self {
                year: self.year + 1,
                month: 1,
                day: 1,
            }
        }
    }

    /// Gregorian equivalent; `None` for dates such as 1900-02-29 that only exist
    /// under the simplified leap rule.
    pub fn to_naive_date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)
    }
}

impl fmt::Display for CalendarDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

impl Serialize for CalendarDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// 對齊整月或整年的日期區間，`start` 與 `end` 皆包含在內
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct CalendarWindow {
    start: CalendarDate,
    end: CalendarDate,
}

impl CalendarWindow {
    pub fn month(year: i32, month: u32) -> Option<Self> {
        let start = CalendarDate::new(year, month, 1)?;
        let end = CalendarDate::new(year, month, days_in_month(year, month))?;
        Some(Self { start, end })
    }

    pub fn year(year: i32) -> Option<Self> {
        let start = CalendarDate::new(year, 1, 1)?;
        let end = CalendarDate::new(year, 12, 31)?;
        Some(Self { start, end })
    }

    pub fn start(&self) -> CalendarDate {
        self.start
    }

    pub fn end(&self) -> CalendarDate {
        self.end
    }

    /// First day after the window; the exclusive bound for half-open queries.
    pub fn next_start(&self) -> CalendarDate {
        self.end.next_day()
    }

    pub fn contains(&self, date: CalendarDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn days(&self) -> u32 {
        let mut count = 0;
        let mut year = self.start.year;
        let mut month = self.start.month;
        loop {
            count += days_in_month(year, month);
            if (year, month) == (self.end.year, self.end.month) {
                break;
            }
            if month == 12 {
                year += 1;
                month = 1;
            } else {
                month += 1;
            }
        }
        count
    }
}

impl fmt::Display for CalendarWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

/// 視窗與其標籤的組合
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct LabeledWindow {
    pub window: CalendarWindow,
    pub label: PeriodLabel,
}
