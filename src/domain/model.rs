use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Serializes timestamps the way the downstream CSV consumers expect
/// (`YYYY-MM-DD HH:MM:SS`, empty cell when missing).
pub mod csv_datetime {
    use chrono::NaiveDateTime;
    use serde::{self, Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S>(value: &Option<NaiveDateTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(dt) => serializer.serialize_str(&dt.format(FORMAT).to_string()),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        if raw.is_empty() {
            return Ok(None);
        }
        NaiveDateTime::parse_from_str(&raw, FORMAT)
            .map(Some)
            .map_err(serde::de::Error::custom)
    }
}

/// A river-flow gauging station as published by the observation service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GaugeStation {
    #[serde(rename = "idEstacion")]
    pub station_id: i64,
    #[serde(rename = "nomeEstacion")]
    pub name: String,
    #[serde(rename = "rio")]
    pub river: Option<String>,
    pub lat: f64,
    pub lon: f64,
    #[serde(rename = "concello")]
    pub municipality: Option<String>,
    #[serde(rename = "provincia")]
    pub province: Option<String>,
}

/// Geographic position of a fixed sampling station.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

/// Station id → position, persisted as a JSON side file so campaigns can
/// correct positions without touching code.
pub type StationCoordinates = BTreeMap<String, Coordinate>;

/// One depth level of a CTD vertical cast, already normalized.
/// Field order is the column order of the consolidated CSV.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CtdRecord {
    #[serde(rename = "estacion_id")]
    pub station_id: Option<String>,
    #[serde(rename = "estacion_nombre")]
    pub station_name: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    #[serde(rename = "fecha_hora", with = "csv_datetime")]
    pub timestamp: Option<NaiveDateTime>,
    #[serde(rename = "profundidad")]
    pub depth: Option<f64>,
    #[serde(rename = "salinidad")]
    pub salinity: Option<f64>,
    #[serde(rename = "qc_salinidad")]
    pub qc_salinity: Option<f64>,
    #[serde(rename = "temperatura")]
    pub temperature: Option<f64>,
    #[serde(rename = "qc_temperatura")]
    pub qc_temperature: Option<f64>,
    #[serde(rename = "presion_db")]
    pub pressure_db: Option<f64>,
    pub ph: Option<f64>,
    #[serde(rename = "oxigeno_ml_l")]
    pub oxygen_ml_l: Option<f64>,
    #[serde(rename = "transmitancia")]
    pub transmittance: Option<f64>,
    #[serde(rename = "irradiancia")]
    pub irradiance: Option<f64>,
    #[serde(rename = "fluorescencia_uv")]
    pub uv_fluorescence: Option<f64>,
    #[serde(rename = "fluorescencia")]
    pub fluorescence: Option<f64>,
    #[serde(rename = "densidad")]
    pub density: Option<f64>,
    #[serde(rename = "temperatura_its68")]
    pub temperature_its68: Option<f64>,
    #[serde(rename = "conductividad")]
    pub conductivity: Option<f64>,
    #[serde(rename = "qc_oxigeno")]
    pub qc_oxygen: Option<f64>,
    #[serde(rename = "qc_fluorescencia")]
    pub qc_fluorescence: Option<f64>,
    #[serde(rename = "origen_archivo")]
    pub source_file: String,
    #[serde(rename = "fecha_procesamiento", with = "csv_datetime")]
    pub processed_at: Option<NaiveDateTime>,
}

impl CtdRecord {
    pub fn empty(source_file: &str) -> Self {
        Self {
            station_id: None,
            station_name: None,
            lat: None,
            lon: None,
            timestamp: None,
            depth: None,
            salinity: None,
            qc_salinity: None,
            temperature: None,
            qc_temperature: None,
            pressure_db: None,
            ph: None,
            oxygen_ml_l: None,
            transmittance: None,
            irradiance: None,
            uv_fluorescence: None,
            fluorescence: None,
            density: None,
            temperature_its68: None,
            conductivity: None,
            qc_oxygen: None,
            qc_fluorescence: None,
            source_file: source_file.to_string(),
            processed_at: None,
        }
    }

    /// A record is complete when every core measurement field is present.
    pub fn is_complete(&self) -> bool {
        self.station_id.is_some()
            && self.lat.is_some()
            && self.lon.is_some()
            && self.timestamp.is_some()
            && self.depth.is_some()
            && self.salinity.is_some()
            && self.temperature.is_some()
    }
}

/// One mooring observation with the strict eight-variable schema.
/// Columns that the source file lacks stay empty, never absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MooringRecord {
    #[serde(rename = "estacion")]
    pub station: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(rename = "fecha_hora", with = "csv_datetime")]
    pub timestamp: Option<NaiveDateTime>,
    #[serde(rename = "salinidad_1_5m")]
    pub salinity_1_5m: Option<f64>,
    #[serde(rename = "qc_salinidad_1_5m")]
    pub qc_salinity_1_5m: Option<f64>,
    #[serde(rename = "temperatura_1_5m")]
    pub temperature_1_5m: Option<f64>,
    #[serde(rename = "qc_temperatura_1_5m")]
    pub qc_temperature_1_5m: Option<f64>,
    #[serde(rename = "salinidad_3m")]
    pub salinity_3m: Option<f64>,
    #[serde(rename = "qc_salinidad_3m")]
    pub qc_salinity_3m: Option<f64>,
    #[serde(rename = "temperatura_3m")]
    pub temperature_3m: Option<f64>,
    #[serde(rename = "qc_temperatura_3m")]
    pub qc_temperature_3m: Option<f64>,
}

/// Quality metrics for a consolidated CTD dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CtdQualityReport {
    pub total_records: usize,
    pub complete_records: usize,
    pub complete_pct: f64,
    pub nulls_per_column: BTreeMap<String, usize>,
    pub temperature_outliers: usize,
    pub salinity_outliers: usize,
    pub depth_outliers: usize,
    pub stations: Vec<String>,
    pub files_processed: usize,
    pub files_failed: Vec<String>,
}

/// Per-station completeness inside a mooring quality report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationQuality {
    pub records: usize,
    /// Column → completeness percentage, formatted to one decimal.
    pub completeness: BTreeMap<String, String>,
}

/// Quality metrics for the unified mooring dataset, written as JSON
/// next to the CSV output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MooringQualityReport {
    pub total_records: usize,
    pub temporal_range: TemporalRange,
    pub per_station: BTreeMap<String, StationQuality>,
    pub duplicates_removed: usize,
    pub files_processed: usize,
    pub processed_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemporalRange {
    pub start: Option<String>,
    pub end: Option<String>,
}

/// Outcome counters for a bulk download run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DownloadStats {
    pub already_valid: usize,
    pub downloaded: usize,
    pub unavailable: usize,
    pub errors: usize,
    pub repaired: usize,
}

impl DownloadStats {
    pub fn summary(&self) -> String {
        format!(
            "valid before: {}, downloaded: {}, repaired: {}, unavailable: {}, errors: {}",
            self.already_valid, self.downloaded, self.repaired, self.unavailable, self.errors
        )
    }
}

/// What environment initialization actually did.
#[derive(Debug, Clone)]
pub struct EnvReport {
    pub env_file: Option<std::path::PathBuf>,
    pub applied_overrides: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample_record() -> CtdRecord {
        let mut r = CtdRecord::empty("c1_2021.txt");
        r.station_id = Some("A0".to_string());
        r.lat = Some(42.5181);
        r.lon = Some(-8.9818);
        r.timestamp = NaiveDate::from_ymd_opt(2021, 11, 3).unwrap().and_hms_opt(14, 30, 0);
        r.depth = Some(5.0);
        r.salinity = Some(35.2);
        r.temperature = Some(14.8);
        r
    }

    #[test]
    fn test_ctd_record_completeness() {
        let complete = sample_record();
        assert!(complete.is_complete());

        let mut missing_coords = sample_record();
        missing_coords.lat = None;
        assert!(!missing_coords.is_complete());

        assert!(!CtdRecord::empty("x.txt").is_complete());
    }

    #[test]
    fn test_ctd_record_csv_headers_match_consumer_schema() {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b';')
            .from_writer(vec![]);
        writer.serialize(sample_record()).unwrap();
        let out = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        let header = out.lines().next().unwrap();

        assert!(header.starts_with(
            "estacion_id;estacion_nombre;lat;lon;fecha_hora;profundidad;salinidad;qc_salinidad"
        ));
        assert!(header.ends_with("origen_archivo;fecha_procesamiento"));
    }

    #[test]
    fn test_csv_datetime_round_trip() {
        let record = sample_record();
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b';')
            .from_writer(vec![]);
        writer.serialize(&record).unwrap();
        let out = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        assert!(out.contains("2021-11-03 14:30:00"));
    }
}
