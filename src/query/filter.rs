//! Abstract filter spec and its translation into the store's filter DSL

use crate::error::{Result, ReviewLensError};
use crate::store::{Condition, StoreFilter};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Payload key holding the 1-5 star rating
pub const RATING_KEY: &str = "rating";
/// Payload key holding the review creation time (epoch seconds)
pub const CREATE_TIME_KEY: &str = "createTime";

/// Filter extracted from the user's question
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<RatingFilter>,

    #[serde(rename = "createTime", default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<TimeFilter>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RatingFilter {
    #[serde(rename = "$in", default, skip_serializing_if = "Option::is_none")]
    pub any_of: Option<Vec<i64>>,

    #[serde(rename = "$gte", default, skip_serializing_if = "Option::is_none")]
    pub gte: Option<f64>,

    #[serde(rename = "$lte", default, skip_serializing_if = "Option::is_none")]
    pub lte: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeFilter {
    /// ISO-8601 lower bound
    #[serde(rename = "$gte", default, skip_serializing_if = "Option::is_none")]
    pub gte: Option<String>,
}

impl FilterSpec {
    /// Spec with only a rating set
    pub fn ratings(values: impl Into<Vec<i64>>) -> Self {
        Self {
            rating: Some(RatingFilter {
                any_of: Some(values.into()),
                ..Default::default()
            }),
            create_time: None,
        }
    }

    /// True when neither field is present
    pub fn is_empty(&self) -> bool {
        self.rating.is_none() && self.create_time.is_none()
    }
}

/// Converts [`FilterSpec`] into a [`StoreFilter`]
///
/// Each field contributes at most one condition (first matching rule); the
/// conditions are ANDed. Returns `None` when nothing is recognized, never an
/// empty `must` list.
pub struct FilterTranslator;

impl FilterTranslator {
    pub fn translate(spec: Option<&FilterSpec>) -> Result<Option<StoreFilter>> {
        let Some(spec) = spec else {
            return Ok(None);
        };

        let mut must = Vec::new();

        if let Some(rating) = &spec.rating {
            if let Some(condition) = Self::translate_rating(rating)? {
                must.push(condition);
            }
        }

        if let Some(time) = &spec.create_time {
            if let Some(gte) = &time.gte {
                let epoch = iso8601_to_epoch_seconds(gte)?;
                must.push(Condition::range(CREATE_TIME_KEY, Some(epoch), None));
            }
        }

        if must.is_empty() {
            Ok(None)
        } else {
            Ok(Some(StoreFilter { must }))
        }
    }

    fn translate_rating(rating: &RatingFilter) -> Result<Option<Condition>> {
        if let Some(values) = &rating.any_of {
            if values.is_empty() {
                return Err(ReviewLensError::FilterTranslation(
                    "rating.$in must list at least one rating".to_string(),
                ));
            }
            if let Some(bad) = values.iter().find(|v| !(1..=5).contains(*v)) {
                return Err(ReviewLensError::FilterTranslation(format!(
                    "rating {} is outside 1-5",
                    bad
                )));
            }
            return Ok(Some(Condition::match_any(RATING_KEY, values.clone())));
        }

        if rating.gte.is_none() && rating.lte.is_none() {
            return Ok(None);
        }

        for bound in [rating.gte, rating.lte].into_iter().flatten() {
            if !(1.0..=5.0).contains(&bound) {
                return Err(ReviewLensError::FilterTranslation(format!(
                    "rating bound {} is outside 1-5",
                    bound
                )));
            }
        }
        if let (Some(gte), Some(lte)) = (rating.gte, rating.lte) {
            if gte > lte {
                return Err(ReviewLensError::FilterTranslation(format!(
                    "rating range is empty: $gte {} > $lte {}",
                    gte, lte
                )));
            }
        }

        Ok(Some(Condition::range(RATING_KEY, rating.gte, rating.lte)))
    }
}

/// Parse an ISO-8601 timestamp into epoch seconds.
///
/// Accepts RFC 3339 (`Z` or numeric offset) plus naive date-times and bare
/// dates, which are read as UTC.
pub fn iso8601_to_epoch_seconds(value: &str) -> Result<f64> {
    let value = value.trim();

    let utc: DateTime<Utc> = if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        dt.with_timezone(&Utc)
    } else if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        naive.and_utc()
    } else if let Some(midnight) = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        midnight.and_utc()
    } else {
        return Err(ReviewLensError::FilterTranslation(format!(
            "invalid ISO-8601 timestamp: '{}'",
            value
        )));
    };

    Ok(utc.timestamp() as f64 + f64::from(utc.timestamp_subsec_nanos()) / 1e9)
}
