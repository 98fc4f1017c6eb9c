use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, info, warn};
use xmltree::Element;

use crate::{model::Observation, store::WeatherStore};

/// Observations feed of the Estonian Environment Agency weather portal.
pub const DEFAULT_FEED_URL: &str = "https://www.ilmateenistus.ee/ilma_andmed/xml/observations.php";

/// Stations whose observations are kept, one per supported city. Matching
/// against the feed is by exact station name.
const STATIONS: [&str; 3] = ["Tallinn-Harku", "Tartu-Tõravere", "Pärnu"];

/// Persisted text fields are capped at this many characters.
const MAX_FIELD_LEN: usize = 128;

/// Time source used to stamp observations; injectable so tests can pin it.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Error)]
enum IngestError {
    #[error("failed to fetch weather feed: {0}")]
    Fetch(#[from] reqwest::Error),
    #[error("failed to parse weather feed: {0}")]
    Parse(#[from] xmltree::ParseError),
    #[error("failed to store observations: {0}")]
    Store(anyhow::Error),
}

/// Fetches the weather feed and persists observations for the configured
/// stations.
///
/// Every cycle stands alone: failures are logged and swallowed, nothing is
/// retried, and a batch is only persisted once it parsed in full.
pub struct WeatherIngestor {
    http: Client,
    store: Arc<dyn WeatherStore>,
    clock: Arc<dyn Clock>,
    feed_url: String,
}

impl WeatherIngestor {
    pub fn new(store: Arc<dyn WeatherStore>) -> Self {
        Self::with_feed_url(store, DEFAULT_FEED_URL.to_string())
    }

    pub fn with_feed_url(store: Arc<dyn WeatherStore>, feed_url: String) -> Self {
        Self {
            http: Client::new(),
            store,
            clock: Arc::new(SystemClock),
            feed_url,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Run one fetch-parse-persist cycle. Never fails; a broken cycle leaves
    /// the store untouched until the next one.
    pub async fn run(&self) {
        match self.try_run().await {
            Ok(0) => debug!("weather feed contained no configured stations"),
            Ok(count) => info!(count, "stored weather observations"),
            Err(error) => warn!(%error, "weather ingestion cycle failed"),
        }
    }

    async fn try_run(&self) -> Result<usize, IngestError> {
        let body = self
            .http
            .get(&self.feed_url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        self.ingest_body(&body).await
    }

    async fn ingest_body(&self, body: &str) -> Result<usize, IngestError> {
        let observations = parse_feed(body, self.clock.now())?;
        let count = observations.len();
        // An empty batch is not persisted at all.
        if count > 0 {
            self.store.append(observations).await.map_err(IngestError::Store)?;
        }
        Ok(count)
    }
}

/// Extract observations for the configured stations from a feed document.
fn parse_feed(
    body: &str,
    observed_at: DateTime<Utc>,
) -> Result<Vec<Observation>, xmltree::ParseError> {
    let root = Element::parse(body.as_bytes())?;

    Ok(root
        .children
        .iter()
        .filter_map(xmltree::XMLNode::as_element)
        .filter(|element| element.name == "station")
        .filter_map(|element| station_observation(element, observed_at))
        .collect())
}

fn station_observation(station: &Element, observed_at: DateTime<Utc>) -> Option<Observation> {
    let name = child_text(station, "name")?;
    if !STATIONS.contains(&name.as_str()) {
        return None;
    }

    Some(Observation {
        // Assigned by the store on append.
        id: 0,
        station_name: truncate(name),
        wmo_code: truncate(child_text(station, "wmocode").unwrap_or_default()),
        // Missing or unparseable readings fall back to 1.0 °C and 0.0 m/s.
        temperature: parse_reading(station, "airtemperature", 1.0),
        wind_speed: parse_reading(station, "windspeed", 0.0),
        phenomenon: truncate(
            child_text(station, "phenomenon").unwrap_or_else(|| "None".to_string()),
        ),
        observed_at,
    })
}

/// Text of a child element; `Some("")` when the element exists but is empty.
fn child_text(station: &Element, name: &str) -> Option<String> {
    station
        .get_child(name)
        .map(|element| element.get_text().map(|text| text.trim().to_string()).unwrap_or_default())
}

fn parse_reading(station: &Element, name: &str, default: f64) -> f64 {
    child_text(station, name)
        .and_then(|text| text.parse().ok())
        .unwrap_or(default)
}

fn truncate(text: String) -> String {
    if text.chars().count() <= MAX_FIELD_LEN {
        text
    } else {
        text.chars().take(MAX_FIELD_LEN).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::Mutex;

    /// Store stub that records every append call it receives.
    #[derive(Debug, Default)]
    struct RecordingStore {
        batches: Mutex<Vec<Vec<Observation>>>,
    }

    impl RecordingStore {
        fn batch_count(&self) -> usize {
            self.batches.lock().unwrap().len()
        }

        fn row_count(&self) -> usize {
            self.batches.lock().unwrap().iter().map(Vec::len).sum()
        }
    }

    #[async_trait]
    impl WeatherStore for RecordingStore {
        async fn latest(&self, _station_fragment: &str) -> Result<Option<Observation>> {
            Ok(None)
        }

        async fn closest_at_or_before(
            &self,
            _station_fragment: &str,
            _cutoff: DateTime<Utc>,
        ) -> Result<Option<Observation>> {
            Ok(None)
        }

        async fn append(&self, batch: Vec<Observation>) -> Result<()> {
            self.batches.lock().unwrap().push(batch);
            Ok(())
        }
    }

    #[derive(Debug)]
    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<observations timestamp="1742151600">
  <station>
    <name>Tallinn-Harku</name>
    <wmocode>26038</wmocode>
    <airtemperature>-2.3</airtemperature>
    <windspeed>4.7</windspeed>
    <phenomenon>Light snow shower</phenomenon>
  </station>
  <station>
    <name>Kuressaare linn</name>
    <wmocode>26231</wmocode>
    <airtemperature>1.1</airtemperature>
    <windspeed>2.0</windspeed>
    <phenomenon></phenomenon>
  </station>
  <station>
    <name>Pärnu</name>
    <wmocode>41803</wmocode>
    <airtemperature>not-a-number</airtemperature>
    <phenomenon>Rain</phenomenon>
  </station>
  <station>
    <name>Tartu-Tõravere</name>
    <wmocode>26242</wmocode>
    <airtemperature>0.8</airtemperature>
    <windspeed>3.4</windspeed>
  </station>
</observations>"#;

    fn stamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 16, 19, 15, 0).unwrap()
    }

    fn ingestor(store: Arc<RecordingStore>) -> WeatherIngestor {
        WeatherIngestor::new(store).with_clock(Arc::new(FixedClock(stamp())))
    }

    #[test]
    fn parse_feed_keeps_only_configured_stations() {
        let observations = parse_feed(FEED, stamp()).unwrap();

        let names: Vec<&str> = observations.iter().map(|o| o.station_name.as_str()).collect();
        assert_eq!(names, vec!["Tallinn-Harku", "Pärnu", "Tartu-Tõravere"]);
        assert!(observations.iter().all(|o| o.observed_at == stamp()));
    }

    #[test]
    fn parse_feed_reads_station_fields() {
        let observations = parse_feed(FEED, stamp()).unwrap();
        let tallinn = &observations[0];

        assert_eq!(tallinn.wmo_code, "26038");
        assert_eq!(tallinn.temperature, -2.3);
        assert_eq!(tallinn.wind_speed, 4.7);
        assert_eq!(tallinn.phenomenon, "Light snow shower");
    }

    #[test]
    fn parse_feed_substitutes_defaults_for_missing_fields() {
        let observations = parse_feed(FEED, stamp()).unwrap();

        let parnu = &observations[1];
        assert_eq!(parnu.temperature, 1.0);
        assert_eq!(parnu.wind_speed, 0.0);

        let tartu = &observations[2];
        assert_eq!(tartu.phenomenon, "None");
    }

    #[test]
    fn parse_feed_rejects_malformed_xml() {
        assert!(parse_feed("<observations><station>", stamp()).is_err());
    }

    #[test]
    fn long_fields_are_truncated() {
        let feed = format!(
            "<observations><station><name>Pärnu</name><phenomenon>{}</phenomenon></station></observations>",
            "x".repeat(300)
        );
        let observations = parse_feed(&feed, stamp()).unwrap();
        assert_eq!(observations[0].phenomenon.chars().count(), 128);
    }

    #[tokio::test]
    async fn no_recognized_stations_means_no_store_call() {
        let store = Arc::new(RecordingStore::default());
        let ingestor = ingestor(Arc::clone(&store));

        let feed = "<observations><station><name>Kuressaare linn</name></station></observations>";
        let count = ingestor.ingest_body(feed).await.unwrap();

        assert_eq!(count, 0);
        assert_eq!(store.batch_count(), 0);
    }

    #[tokio::test]
    async fn matched_stations_are_persisted_in_one_batch() {
        let store = Arc::new(RecordingStore::default());
        let ingestor = ingestor(Arc::clone(&store));

        let count = ingestor.ingest_body(FEED).await.unwrap();

        assert_eq!(count, 3);
        assert_eq!(store.batch_count(), 1);
        assert_eq!(store.row_count(), 3);
    }

    #[tokio::test]
    async fn repeated_ingestion_appends_duplicates() {
        let store = Arc::new(RecordingStore::default());
        let ingestor = ingestor(Arc::clone(&store));

        ingestor.ingest_body(FEED).await.unwrap();
        ingestor.ingest_body(FEED).await.unwrap();

        assert_eq!(store.batch_count(), 2);
        assert_eq!(store.row_count(), 6);
    }

    #[tokio::test]
    async fn malformed_body_persists_nothing() {
        let store = Arc::new(RecordingStore::default());
        let ingestor = ingestor(Arc::clone(&store));

        let result = ingestor.ingest_body("not xml at all").await;

        assert!(matches!(result, Err(IngestError::Parse(_))));
        assert_eq!(store.batch_count(), 0);
    }
}
