use crate::config::toml_config::EtlConfig;
use crate::domain::model::GaugeStation;
use crate::geo::geojson::{BoundingBox, FeatureCollection};
use crate::geo::rivers::detect_name_property;
use crate::utils::error::{EtlError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// One station as it appears in the coverage report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationCoverage {
    pub station_id: i64,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

/// Cross-check of the gauging network against the filtered river layer:
/// does every station sit inside the study area, and how much of the
/// network is actually covered?
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageReport {
    /// Study area: min_lon, min_lat, max_lon, max_lat.
    pub bbox: [f64; 4],
    pub river_segments_total: usize,
    pub river_segments_in_bbox: usize,
    pub segments_per_river: BTreeMap<String, usize>,
    /// Tight box around the clipped network, for map framing.
    pub network_bbox: Option<[f64; 4]>,
    pub stations_inside: Vec<StationCoverage>,
    pub stations_outside: Vec<StationCoverage>,
    pub generated_at: String,
}

pub fn build_report(
    rivers: &FeatureCollection,
    stations: &[GaugeStation],
    bbox: BoundingBox,
) -> Result<CoverageReport> {
    let name_property = detect_name_property(rivers)?;

    let clipped: Vec<_> = rivers
        .features
        .iter()
        .filter(|f| bbox.touches(f))
        .collect();

    let mut segments_per_river: BTreeMap<String, usize> = BTreeMap::new();
    let mut positions: Vec<(f64, f64)> = Vec::new();
    for feature in &clipped {
        let river = feature
            .property_str(&name_property)
            .unwrap_or("(unnamed)")
            .trim()
            .to_uppercase();
        *segments_per_river.entry(river).or_insert(0) += 1;
        positions.extend(
            feature
                .vertices()
                .into_iter()
                .filter(|(lon, lat)| bbox.contains(*lon, *lat)),
        );
    }

    let (mut inside, mut outside) = (Vec::new(), Vec::new());
    for station in stations {
        let entry = StationCoverage {
            station_id: station.station_id,
            name: station.name.clone(),
            lat: station.lat,
            lon: station.lon,
        };
        if bbox.contains(station.lon, station.lat) {
            inside.push(entry);
        } else {
            outside.push(entry);
        }
    }

    Ok(CoverageReport {
        bbox: bbox.as_corners(),
        river_segments_total: rivers.features.len(),
        river_segments_in_bbox: clipped.len(),
        segments_per_river,
        network_bbox: BoundingBox::enclosing(&positions).map(|b| b.as_corners()),
        stations_inside: inside,
        stations_outside: outside,
        generated_at: chrono::Local::now().naive_local().to_string(),
    })
}

fn read_stations(path: &std::path::Path) -> Result<Vec<GaugeStation>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .from_path(path)?;

    let mut stations = Vec::new();
    for row in reader.deserialize::<GaugeStation>() {
        match row {
            Ok(station) => stations.push(station),
            Err(e) => tracing::warn!("Skipping malformed station row: {}", e),
        }
    }
    Ok(stations)
}

/// Loads the filtered river layer and the station list, and writes the
/// coverage report next to the other processed outputs.
pub fn run(config: &EtlConfig) -> Result<PathBuf> {
    let rivers_path = &config.paths.rivers_output;
    tracing::info!("🗺️ Loading layers...");

    if !rivers_path.exists() {
        return Err(EtlError::processing(format!(
            "Missing river layer {}; run the rivers filter first",
            rivers_path.display()
        )));
    }
    let rivers = FeatureCollection::from_slice(&std::fs::read(rivers_path)?)?;

    let stations = read_stations(&config.paths.stations_file)?;
    tracing::info!("✅ Stations loaded: {}", stations.len());

    let bbox = BoundingBox::from_corners(config.sources.coverage_bbox);
    let report = build_report(&rivers, &stations, bbox)?;

    if !report.stations_outside.is_empty() {
        tracing::warn!(
            "{} station(s) fall outside the study area: {:?}",
            report.stations_outside.len(),
            report
                .stations_outside
                .iter()
                .map(|s| s.name.as_str())
                .collect::<Vec<_>>()
        );
    }

    let output = &config.paths.coverage_report;
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(output, serde_json::to_vec_pretty(&report)?)?;
    tracing::info!("🖼️ Coverage report saved to {}", output.display());

    Ok(output.clone())
}
