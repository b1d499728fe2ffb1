/// Period keying for repeat statistics
///
/// Derives the four bucket keys ('total', 'YYYY', 'YYYY-MM', 'YYYY-MM-DD')
/// a repeat event is filed under, and parses the user-facing period type names.
use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::RankError;

/// Key of the all-time bucket.
pub const TOTAL_KEY: &str = "total";

/// The four period types a ranking can be asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodKind {
    Total,
    Year,
    Month,
    Day,
}

impl PeriodKind {
    pub const ALL: [PeriodKind; 4] = [
        PeriodKind::Total,
        PeriodKind::Year,
        PeriodKind::Month,
        PeriodKind::Day,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Total => "total",
            Self::Year => "year",
            Self::Month => "month",
            Self::Day => "day",
        }
    }

    /// Parse a period type name as typed by a user.
    ///
    /// An empty argument means `total`. Anything other than the four type
    /// names is rejected, including already-derived keys such as "2025".
    pub fn parse(input: &str) -> Result<Self, RankError> {
        match input.trim() {
            "" | "total" => Ok(Self::Total),
            "year" => Ok(Self::Year),
            "month" => Ok(Self::Month),
            "day" => Ok(Self::Day),
            other => Err(RankError::InvalidPeriod(other.to_string())),
        }
    }
}

impl fmt::Display for PeriodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Check a period type name without deriving anything from it.
pub fn is_valid_period_type(input: &str) -> bool {
    PeriodKind::ALL.iter().any(|kind| kind.as_str() == input)
}

/// The four bucket keys active at one moment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodKeys {
    pub total: String,
    pub year: String,
    pub month: String,
    pub day: String,
}

impl PeriodKeys {
    /// Keys for a calendar date.
    pub fn for_date(date: NaiveDate) -> Self {
        PeriodKeys {
            total: TOTAL_KEY.to_string(),
            year: format!("{:04}", date.year()),
            month: format!("{:04}-{:02}", date.year(), date.month()),
            day: format!("{:04}-{:02}-{:02}", date.year(), date.month(), date.day()),
        }
    }

    /// Keys for the local wall-clock date.
    pub fn now() -> Self {
        Self::for_date(Local::now().date_naive())
    }

    pub fn get(&self, kind: PeriodKind) -> &str {
        match kind {
            PeriodKind::Total => &self.total,
            PeriodKind::Year => &self.year,
            PeriodKind::Month => &self.month,
            PeriodKind::Day => &self.day,
        }
    }

    /// All four keys, coarsest first.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        [
            self.total.as_str(),
            self.year.as_str(),
            self.month.as_str(),
            self.day.as_str(),
        ]
        .into_iter()
    }
}

/// Last calendar day covered by a stored period key, or None for `total`
/// and year keys (which are never pruned).
///
/// Used by pruning to decide whether a day or month bucket has closed.
pub fn period_end(key: &str) -> Option<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(key, "%Y-%m-%d") {
        return Some(date);
    }

    let (year_str, month_str) = key.split_once('-')?;
    let year = year_str.parse::<i32>().ok()?;
    let month = month_str.parse::<u32>().ok()?;
    if !(1..=12).contains(&month) {
        return None;
    }
    let next_month_start = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    next_month_start.pred_opt()
}
