use crate::config::MIN_READABLE_YEAR;
use chrono::{DateTime, Datelike, Duration, Local, Months, NaiveDate, NaiveDateTime, TimeZone};
use clap::ValueEnum;
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeFrameError {
    #[error("time frame '{0}' is not implemented")]
    NotImplemented(TimeFrame),
    #[error("time frame '{0}' falls outside the representable calendar")]
    OutOfRange(TimeFrame),
}

/// Named span of calendar time used to bound a history query.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, ValueEnum)]
pub enum TimeFrame {
    #[value(name = "ytd")]
    Ytd,
    #[value(name = "1d")]
    Day,
    #[value(name = "1w")]
    Week,
    #[value(name = "1y")]
    Year1,
    #[value(name = "3y")]
    Year3,
    #[value(name = "5y")]
    Year5,
    #[value(name = "max")]
    Max,
    #[value(name = "custom")]
    Custom,
}

/// Bar width requested from the provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleInterval {
    FiveMinutes,
    OneHour,
    OneDay,
    OneWeek,
}

impl SampleInterval {
    pub fn as_yahoo_str(self) -> &'static str {
        match self {
            Self::FiveMinutes => "5m",
            Self::OneHour => "1h",
            Self::OneDay => "1d",
            Self::OneWeek => "1wk",
        }
    }

    pub fn step(self) -> Duration {
        match self {
            Self::FiveMinutes => Duration::minutes(5),
            Self::OneHour => Duration::hours(1),
            Self::OneDay => Duration::days(1),
            Self::OneWeek => Duration::weeks(1),
        }
    }
}

/// Concrete calendar bounds of a query. `end` is the instant the frame was resolved.
#[derive(Clone, Debug)]
pub struct DateRange<Tz: TimeZone> {
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
}

/// First wall-clock time at or after `start`, in quarter-hour steps, that exists
/// locally. Covers days whose midnight falls inside a DST gap.
fn first_valid_local<T>(
    start: NaiveDateTime,
    to_local: impl Fn(&NaiveDateTime) -> Option<T>,
) -> Option<T> {
    (0..24 * 4)
        .map(|quarter| start + Duration::minutes(15 * quarter))
        .find_map(|t| to_local(&t))
}

impl TimeFrame {
    /// Frames offered in the UI; `Custom` has no resolver yet.
    pub const SELECTABLE: [TimeFrame; 7] = [
        TimeFrame::Ytd,
        TimeFrame::Day,
        TimeFrame::Week,
        TimeFrame::Year1,
        TimeFrame::Year3,
        TimeFrame::Year5,
        TimeFrame::Max,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Ytd => "YTD",
            Self::Day => "1D",
            Self::Week => "1W",
            Self::Year1 => "1Y",
            Self::Year3 => "3Y",
            Self::Year5 => "5Y",
            Self::Max => "Max",
            Self::Custom => "Custom",
        }
    }

    pub fn interval(self) -> SampleInterval {
        match self {
            Self::Day => SampleInterval::FiveMinutes,
            Self::Week => SampleInterval::OneHour,
            Self::Max => SampleInterval::OneWeek,
            Self::Ytd | Self::Year1 | Self::Year3 | Self::Year5 | Self::Custom => {
                SampleInterval::OneDay
            }
        }
    }

    /// Resolves against the system clock in its local timezone.
    pub fn resolve(self) -> Result<DateRange<Local>, TimeFrameError> {
        self.resolve_at(Local::now())
    }

    /// Resolves relative to `now`, which becomes the range end.
    pub fn resolve_at<Tz: TimeZone>(self, now: DateTime<Tz>) -> Result<DateRange<Tz>, TimeFrameError> {
        let tz = now.timezone();
        let start = match self {
            Self::Ytd => NaiveDate::from_ymd_opt(now.year(), 1, 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .and_then(|naive| first_valid_local(naive, |t| tz.from_local_datetime(t).earliest())),
            Self::Day => now
                .date_naive()
                .and_hms_opt(0, 0, 0)
                .and_then(|naive| first_valid_local(naive, |t| tz.from_local_datetime(t).earliest())),
            Self::Week => Some(now.clone() - Duration::days(7)),
            Self::Year1 => now.clone().checked_sub_months(Months::new(12)),
            Self::Year3 => now.clone().checked_sub_months(Months::new(36)),
            Self::Year5 => now.clone().checked_sub_months(Months::new(60)),
            Self::Max => NaiveDate::from_ymd_opt(MIN_READABLE_YEAR, 1, 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|naive| tz.from_utc_datetime(&naive)),
            Self::Custom => return Err(TimeFrameError::NotImplemented(self)),
        };

        let start = start.ok_or(TimeFrameError::OutOfRange(self))?;
        Ok(DateRange { start, end: now })
    }
}

impl std::fmt::Display for TimeFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
