//! Year histograms and filtered document search.

use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use serde::Serialize;

use crate::db::DocumentQuery;
use crate::error::{ServiceError, ServiceResult};

/// Number of buckets in a year histogram
pub const HISTOGRAM_BUCKETS: usize = 10;

/// Half-open year range `[start, end)`.
///
/// Bounds are `i64` so buckets over the full `i32` year range cannot overflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YearRange {
    pub label: String,
    pub start: i64,
    pub end: i64,
}

impl YearRange {
    fn new(start: i64, end: i64) -> Self {
        Self {
            label: format!("{}-{}", start, end),
            start,
            end,
        }
    }

    pub fn contains(&self, year: i32) -> bool {
        let year = i64::from(year);
        self.start <= year && year < self.end
    }
}

/// Documents and pictures counted per year range
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearHistogram {
    pub ranges: Vec<YearRange>,
    pub doc_counts: Vec<usize>,
    pub image_counts: Vec<usize>,
}

impl YearHistogram {
    /// Bin document years and picture years (each picture carries its
    /// document's year) into ten equal-width buckets spanning the min and max
    /// of both.
    ///
    /// The width is `(max - min) / 10` rounded down, at least 1, so the top
    /// buckets can stop short of `max`; years past the last bucket are not
    /// counted. Returns `None` when there are no years at all.
    pub fn build(doc_years: &[i32], picture_years: &[i32]) -> Option<Self> {
        let all = doc_years.iter().chain(picture_years);
        let min = i64::from(*all.clone().min()?);
        let max = i64::from(*all.max()?);

        let width = ((max - min) / HISTOGRAM_BUCKETS as i64).max(1);
        let ranges: Vec<YearRange> = (0..HISTOGRAM_BUCKETS as i64)
            .map(|i| YearRange::new(min + i * width, min + (i + 1) * width))
            .collect();

        let count = |years: &[i32]| {
            let mut counts = vec![0; HISTOGRAM_BUCKETS];
            for &year in years {
                if let Some(bucket) = ranges.iter().position(|r| r.contains(year)) {
                    counts[bucket] += 1;
                }
            }
            counts
        };

        Some(Self {
            doc_counts: count(doc_years),
            image_counts: count(picture_years),
            ranges,
        })
    }
}

/// Search criteria as supplied by a caller; every field is optional
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    pub name: Option<String>,
    pub year: Option<i32>,
    /// First upload day, inclusive
    pub upload_date_start: Option<NaiveDate>,
    /// Last upload day, inclusive
    pub upload_date_end: Option<NaiveDate>,
    pub document_id: Option<String>,
}

impl SearchFilter {
    /// Parse the raw string parameters of a search request.
    /// Empty strings count as absent.
    pub fn parse(
        name: Option<&str>,
        year: Option<&str>,
        upload_date_start: Option<&str>,
        upload_date_end: Option<&str>,
        document_id: Option<&str>,
    ) -> ServiceResult<Self> {
        let year = present(year)
            .map(|y| {
                y.parse::<i32>().map_err(|_| ServiceError::InvalidInput {
                    message: format!("Invalid year: {}", y),
                })
            })
            .transpose()?;

        Ok(Self {
            name: present(name).map(String::from),
            year,
            upload_date_start: present(upload_date_start).map(parse_day).transpose()?,
            upload_date_end: present(upload_date_end).map(parse_day).transpose()?,
            document_id: present(document_id).map(String::from),
        })
    }

    /// Translate into a store query scoped to `account_id`.
    ///
    /// The start day begins at 00:00 UTC; the end day is shifted forward one
    /// day and used as an exclusive bound, so the whole end day matches.
    pub fn to_query(&self, account_id: &str) -> DocumentQuery {
        DocumentQuery {
            account_id: account_id.to_string(),
            name_contains: self.name.clone(),
            year: self.year,
            uploaded_from: self.upload_date_start.map(start_of_day),
            uploaded_before: self
                .upload_date_end
                .and_then(|day| day.checked_add_days(Days::new(1)))
                .map(start_of_day),
            document_id: self.document_id.clone(),
        }
    }
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

fn parse_day(value: &str) -> ServiceResult<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| ServiceError::InvalidInput {
        message: format!("Invalid date (expected YYYY-MM-DD): {}", value),
    })
}

fn start_of_day(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(NaiveTime::MIN).and_utc()
}

/// One matching document with the descriptions of its pictures
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub id: String,
    pub name: String,
    pub year: i32,
    pub uploaded_at: DateTime<Utc>,
    pub descriptions: Vec<String>,
}
