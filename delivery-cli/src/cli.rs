use std::sync::Arc;

use anyhow::{Result, anyhow};
use chrono::{DateTime, NaiveDateTime, Timelike, Utc};
use clap::{Parser, Subcommand};
use delivery_core::{
    City, Config, FEE_FORBIDDEN, FEE_NO_DATA, FeeCalculator, MemoryStore, VehicleType,
    WeatherIngestor, WeatherStore,
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "delivery", version, about = "Delivery fee service CLI")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Calculate the delivery fee for a city and vehicle type.
    Fee {
        /// City name: "tallinn", "tartu" or "pärnu".
        city: String,

        /// Vehicle type: "car", "scooter" or "bike".
        vehicle: String,

        /// Optional date/time (RFC 3339 or "YYYY-MM-DDTHH:MM:SS", UTC);
        /// if absent, the latest observation is used.
        #[arg(long)]
        time: Option<String>,
    },

    /// Fetch the weather feed once and store the observations.
    Ingest,

    /// Poll the weather feed, ingesting on the configured minute of the hour.
    Watch,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let config = Config::load()?;
        let store: Arc<dyn WeatherStore> = Arc::new(MemoryStore::new());
        let ingestor = WeatherIngestor::with_feed_url(Arc::clone(&store), config.feed_url.clone());

        match self.command {
            Command::Fee { city, vehicle, time } => {
                // Validate everything before the engine is involved.
                let city = City::try_from(city.as_str())?;
                let vehicle = VehicleType::try_from(vehicle.as_str())?;
                let when = time.as_deref().map(parse_time).transpose()?;

                // The per-process store starts empty, so pull the feed once
                // to give the query an observation to work with.
                ingestor.run().await;

                let calculator = FeeCalculator::new(store);
                let fee = calculator.calculate(city, vehicle, when).await?;

                if fee == FEE_FORBIDDEN {
                    return Err(anyhow!("Usage of selected vehicle type is forbidden"));
                }
                if fee == FEE_NO_DATA {
                    return Err(anyhow!("No weather information provided on selected time"));
                }
                println!("Total fee for {vehicle} delivery in {city}: {fee}");
            }
            Command::Ingest => {
                ingestor.run().await;
            }
            Command::Watch => {
                watch(&ingestor, config.trigger_minute).await;
            }
        }

        Ok(())
    }
}

/// Wake once a minute and run an ingestion cycle when the trigger minute
/// comes around. Runs until the process is stopped.
async fn watch(ingestor: &WeatherIngestor, trigger_minute: u32) {
    let mut tick = tokio::time::interval(std::time::Duration::from_secs(60));
    loop {
        tick.tick().await;
        if Utc::now().minute() == trigger_minute {
            ingestor.run().await;
        }
    }
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Ok(naive.and_utc());
    }
    Err(anyhow!("Invalid time format."))
}
