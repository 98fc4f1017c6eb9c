use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::model::Observation;

/// Persistence boundary for weather observations.
///
/// Station lookup is by case-insensitive substring containment of the city
/// name in the station name. The engine treats this as an opaque store; a
/// real deployment can plug a database-backed implementation in here.
#[async_trait]
pub trait WeatherStore: Send + Sync {
    /// Most recent observation whose station name contains `station_fragment`.
    async fn latest(&self, station_fragment: &str) -> Result<Option<Observation>>;

    /// Observation with `observed_at <= cutoff` that is closest to `cutoff`
    /// by absolute time difference.
    async fn closest_at_or_before(
        &self,
        station_fragment: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<Option<Observation>>;

    /// Persist a batch of observations. Duplicates are never collapsed.
    async fn append(&self, batch: Vec<Observation>) -> Result<()>;
}

/// In-memory [`WeatherStore`] used by the CLI and tests.
///
/// Rows are kept in insertion order, retained indefinitely, and assigned
/// sequential ids on append.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: RwLock<Vec<Observation>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }
}

fn matches_station(observation: &Observation, station_fragment: &str) -> bool {
    observation
        .station_name
        .to_lowercase()
        .contains(&station_fragment.to_lowercase())
}

#[async_trait]
impl WeatherStore for MemoryStore {
    async fn latest(&self, station_fragment: &str) -> Result<Option<Observation>> {
        let rows = self.rows.read().await;
        Ok(rows
            .iter()
            .filter(|o| matches_station(o, station_fragment))
            .max_by_key(|o| o.observed_at)
            .cloned())
    }

    async fn closest_at_or_before(
        &self,
        station_fragment: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<Option<Observation>> {
        let rows = self.rows.read().await;
        let mut candidates: Vec<&Observation> = rows
            .iter()
            .filter(|o| matches_station(o, station_fragment) && o.observed_at <= cutoff)
            .collect();

        // Rank by |cutoff - observed_at|; scanning in ascending time order
        // means an equal delta resolves to the earlier observation.
        candidates.sort_by_key(|o| o.observed_at);
        Ok(candidates
            .into_iter()
            .min_by_key(|o| (cutoff - o.observed_at).num_milliseconds().abs())
            .cloned())
    }

    async fn append(&self, batch: Vec<Observation>) -> Result<()> {
        let mut rows = self.rows.write().await;
        for mut observation in batch {
            observation.id = rows.len() as u64 + 1;
            rows.push(observation);
        }
        Ok(())
    }
}
