use crate::config::toml_config::EtlConfig;
use crate::domain::model::GaugeStation;
use crate::domain::ports::{Pipeline, Storage};
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashSet;
use std::time::Duration;

/// Where the station list comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StationsMode {
    /// Live observation service.
    Fetch,
    /// Hand-curated list taken from the web visor, for when the live
    /// endpoint is down or renames its fields again.
    Seed,
}

/// Result of the transform stage: the station set plus whether the
/// basin filter produced anything. An empty filter result degrades to
/// the full list written to a debug file for manual inspection.
pub struct StationsOutput {
    pub stations: Vec<GaugeStation>,
    pub basin_filtered: bool,
}

pub struct StationsPipeline<S: Storage> {
    storage: S,
    config: EtlConfig,
    client: Client,
    mode: StationsMode,
}

impl<S: Storage> StationsPipeline<S> {
    pub fn new(storage: S, config: EtlConfig, mode: StationsMode) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.download.timeout_secs))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            storage,
            config,
            client,
            mode,
        }
    }

    /// The service has shipped the station array under either of these
    /// keys over the years.
    const LIST_KEYS: [&'static str; 2] = ["listaAforos", "listUltimosAforos"];

    fn parse_station(entry: &serde_json::Value) -> Option<GaugeStation> {
        let station_id = entry
            .get("idEstacion")
            .and_then(|v| v.as_i64().or_else(|| v.as_str()?.trim().parse().ok()))?;
        let name = entry.get("nomeEstacion")?.as_str()?.trim().to_string();
        let lat = Self::parse_coordinate(entry.get("lat")?)?;
        let lon = Self::parse_coordinate(entry.get("lon")?)?;

        Some(GaugeStation {
            station_id,
            name,
            river: entry
                .get("rio")
                .and_then(|v| v.as_str())
                .map(|s| s.trim().to_string()),
            lat,
            lon,
            municipality: entry
                .get("concello")
                .and_then(|v| v.as_str())
                .map(|s| s.trim().to_string()),
            province: entry
                .get("provincia")
                .and_then(|v| v.as_str())
                .map(|s| s.trim().to_string()),
        })
    }

    /// Coordinates arrive as numbers or as decimal-comma strings.
    fn parse_coordinate(value: &serde_json::Value) -> Option<f64> {
        value
            .as_f64()
            .or_else(|| crate::utils::parse::parse_decimal(value.as_str()?))
    }

    fn matches_basin(&self, station: &GaugeStation) -> bool {
        let keywords = &self.config.sources.basin_keywords;
        let hit = |text: &str| {
            let lower = text.to_lowercase();
            keywords.iter().any(|k| lower.contains(&k.to_lowercase()))
        };
        hit(&station.name)
            || station.municipality.as_deref().map(hit).unwrap_or(false)
    }

    fn to_csv(stations: &[GaugeStation]) -> Result<Vec<u8>> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b';')
            .from_writer(vec![]);
        for station in stations {
            writer.serialize(station)?;
        }
        writer
            .into_inner()
            .map_err(|e| EtlError::processing(format!("CSV buffer error: {}", e)))
    }

    /// The twelve stations of the Ulla/Umia/Sar basins, positions
    /// verified by hand against the official visor.
    pub fn curated_stations() -> Vec<GaugeStation> {
        let raw: [(i64, &str, &str, f64, f64, &str); 12] = [
            (140490, "o_con", "rio do con", 42.5925, -8.7627, "Vilagarcia de arousa"),
            (140445, "bermana_umia", "bermana", 42.6038, -8.64592, "Vilagarcia de arousa"),
            (140440, "umia_caldas", "Umia", 42.6029, -8.64249, "Caldas de Reis"),
            (140470, "Baixo_umia", "Umia", 42.5154, -8.76556, "Ribadumia"),
            (140545, "ulla_padron", "ulla", 42.7313, -8.62795, "Padron"),
            (140570, "sar_padron", "sar", 42.7457, -8.65923, "Padron"),
            (140540, "ulla_teo", "ulla", 42.7595, -8.54767, "teo"),
            (140560, "sar_ames", "sar", 42.8220, -8.65198, "bertamirans"),
            (140555, "sar_bertamirans", "sar", 42.8564, -8.64814, "bertamirans"),
            (140548, "sar_santiago", "sar", 42.8770, -8.52871, "santiago"),
            (140530, "deza", "deza", 42.7771, -8.33756, "touro"),
            (140520, "ulla_touro", "ulla", 42.8241, -8.27212, "touro"),
        ];

        raw.iter()
            .map(|(id, name, river, lat, lon, municipality)| GaugeStation {
                station_id: *id,
                name: name.to_string(),
                river: Some(river.to_string()),
                lat: *lat,
                lon: *lon,
                municipality: Some(municipality.to_string()),
                province: None,
            })
            .collect()
    }

    async fn fetch_live(&self) -> Result<Vec<GaugeStation>> {
        let endpoint = &self.config.sources.aforos_endpoint;
        tracing::info!("📡 Connecting to {}", endpoint);

        let response = self.client.get(endpoint).send().await?;
        let body: serde_json::Value = response.error_for_status()?.json().await?;

        let entries = Self::LIST_KEYS
            .iter()
            .find_map(|key| {
                body.get(*key)
                    .and_then(|v| v.as_array())
                    .filter(|list| !list.is_empty())
            })
            .ok_or_else(|| {
                let seen: Vec<String> = body
                    .as_object()
                    .map(|o| o.keys().cloned().collect())
                    .unwrap_or_default();
                EtlError::processing(format!(
                    "Station list empty or missing; JSON keys seen: {:?}",
                    seen
                ))
            })?;

        let mut seen_ids = HashSet::new();
        let mut stations = Vec::new();
        let mut skipped = 0usize;
        for entry in entries {
            match Self::parse_station(entry) {
                Some(station) if seen_ids.insert(station.station_id) => stations.push(station),
                Some(_) => {} // duplicate id
                None => skipped += 1,
            }
        }

        if skipped > 0 {
            tracing::warn!("Skipped {} station entries with missing id/name/coordinates", skipped);
        }
        tracing::info!("✅ Downloaded {} active stations", stations.len());

        Ok(stations)
    }
}

#[async_trait]
impl<S: Storage> Pipeline for StationsPipeline<S> {
    type Raw = GaugeStation;
    type Output = StationsOutput;

    async fn extract(&self) -> Result<Vec<GaugeStation>> {
        match self.mode {
            StationsMode::Fetch => self.fetch_live().await,
            StationsMode::Seed => {
                tracing::info!("🌱 Seeding curated station list");
                Ok(Self::curated_stations())
            }
        }
    }

    async fn transform(&self, data: Vec<GaugeStation>) -> Result<StationsOutput> {
        // The curated list is already basin-scoped.
        if self.mode == StationsMode::Seed {
            return Ok(StationsOutput {
                stations: data,
                basin_filtered: true,
            });
        }

        let matched: Vec<GaugeStation> = data
            .iter()
            .filter(|s| self.matches_basin(s))
            .cloned()
            .collect();

        tracing::info!("💧 Stations matching the Arousa basin: {}", matched.len());

        if matched.is_empty() {
            tracing::warn!(
                "Basin filter matched nothing; writing the full list for manual review"
            );
            return Ok(StationsOutput {
                stations: data,
                basin_filtered: false,
            });
        }

        for station in &matched {
            tracing::debug!("  {} {}", station.station_id, station.name);
        }

        Ok(StationsOutput {
            stations: matched,
            basin_filtered: true,
        })
    }

    async fn load(&self, result: StationsOutput) -> Result<String> {
        let path = if result.basin_filtered {
            self.config.paths.stations_file.to_string_lossy().to_string()
        } else {
            // Same directory, debug name, so the next run is not fed
            // an unfiltered station list by accident.
            self.config
                .paths
                .stations_file
                .with_file_name("aforos_TODAS_debug.csv")
                .to_string_lossy()
                .to_string()
        };

        let csv_bytes = Self::to_csv(&result.stations)?;
        self.storage.write_file(&path, &csv_bytes).await?;

        tracing::info!("💾 Wrote {} stations to {}", result.stations.len(), path);
        Ok(path)
    }

    fn name(&self) -> &str {
        match self.mode {
            StationsMode::Fetch => "stations-fetch",
            StationsMode::Seed => "stations-seed",
        }
    }
}
