//! Review statistics: counts per rating over fixed look-back periods

use crate::error::{Result, ReviewLensError};
use crate::query::{CREATE_TIME_KEY, RATING_KEY};
use crate::store::{Condition, StoreFilter, VectorStore};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

pub const RATINGS: [i64; 5] = [1, 2, 3, 4, 5];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatsPeriod {
    Week,
    Month,
    Year,
}

impl StatsPeriod {
    pub const ALL: [StatsPeriod; 3] = [StatsPeriod::Week, StatsPeriod::Month, StatsPeriod::Year];

    pub fn days(self) -> i64 {
        match self {
            StatsPeriod::Week => 7,
            StatsPeriod::Month => 30,
            StatsPeriod::Year => 365,
        }
    }
}

/// Count of reviews per period and rating
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewStats {
    pub generated_at: DateTime<Utc>,
    pub counts: BTreeMap<StatsPeriod, BTreeMap<i64, u64>>,
}

impl ReviewStats {
    pub fn count(&self, period: StatsPeriod, rating: i64) -> Option<u64> {
        self.counts.get(&period)?.get(&rating).copied()
    }

    pub fn total(&self, period: StatsPeriod) -> u64 {
        self.counts
            .get(&period)
            .map(|by_rating| by_rating.values().sum())
            .unwrap_or(0)
    }
}

/// Runs the 15 count queries with bounded concurrency
///
/// All-or-nothing: if any count fails the whole collection fails; partial
/// results are never zero-filled.
pub struct ReviewStatsCollector {
    store: Arc<dyn VectorStore>,
    max_concurrent: usize,
}

impl ReviewStatsCollector {
    pub fn new(store: Arc<dyn VectorStore>, max_concurrent: usize) -> Self {
        Self {
            store,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Counts relative to `now`
    pub async fn collect(&self, now: DateTime<Utc>) -> Result<ReviewStats> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut tasks = JoinSet::new();

        for period in StatsPeriod::ALL {
            let since = (now - Duration::days(period.days())).timestamp() as f64;
            for rating in RATINGS {
                let store = self.store.clone();
                let semaphore = semaphore.clone();
                tasks.spawn(async move {
                    let _permit = semaphore.acquire_owned().await.map_err(|e| {
                        ReviewLensError::Other(anyhow::anyhow!("Stats semaphore closed: {}", e))
                    })?;
                    let filter = StoreFilter {
                        must: vec![
                            Condition::match_value(RATING_KEY, rating),
                            Condition::range(CREATE_TIME_KEY, Some(since), None),
                        ],
                    };
                    let count = store.count(Some(&filter)).await?;
                    debug!(?period, rating, count, "Counted reviews");
                    Ok::<_, ReviewLensError>((period, rating, count))
                });
            }
        }

        let mut counts: BTreeMap<StatsPeriod, BTreeMap<i64, u64>> = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            let result = joined.map_err(|e| {
                ReviewLensError::Other(anyhow::anyhow!("Stats task failed: {}", e))
            })?;
            match result {
                Ok((period, rating, count)) => {
                    counts.entry(period).or_default().insert(rating, count);
                }
                Err(e) => {
                    warn!("Review stats query failed, aborting the rest: {}", e);
                    tasks.abort_all();
                    return Err(e);
                }
            }
        }

        info!("Review stats collected");
        Ok(ReviewStats {
            generated_at: now,
            counts,
        })
    }
}
