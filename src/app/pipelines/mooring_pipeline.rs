use crate::config::toml_config::EtlConfig;
use crate::domain::model::{
    Coordinate, MooringQualityReport, MooringRecord, StationQuality, TemporalRange,
};
use crate::domain::ports::{Pipeline, Storage};
use crate::utils::error::{EtlError, Result};
use crate::utils::parse::{decode_latin1, parse_decimal};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::collections::{BTreeMap, HashMap};

const OUTPUT_FILE: &str = "intecmar_master_unificado.csv";
const REPORT_FILE: &str = "reporte_calidad.json";
const TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M";

/// The eight variable columns of the strict output schema.
const VARIABLE_COLUMNS: [&str; 8] = [
    "salinidad_1_5m",
    "qc_salinidad_1_5m",
    "temperatura_1_5m",
    "qc_temperatura_1_5m",
    "salinidad_3m",
    "qc_salinidad_3m",
    "temperatura_3m",
    "qc_temperatura_3m",
];

/// One raw platform export. Kept as bytes because the provider ships
/// Latin-1, not UTF-8.
pub struct MooringFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

pub struct MooringDataset {
    pub records: Vec<MooringRecord>,
    pub report: MooringQualityReport,
}

pub struct MooringPipeline<S: Storage> {
    storage: S,
    config: EtlConfig,
}

impl<S: Storage> MooringPipeline<S> {
    pub fn new(storage: S, config: EtlConfig) -> Self {
        Self { storage, config }
    }

    /// The two continuous platforms in the estuary (WGS84).
    fn known_stations() -> Vec<(&'static str, Coordinate)> {
        vec![
            ("ribeira", Coordinate { lat: 42.551633, lon: -8.946442 }),
            ("cortegada", Coordinate { lat: 42.627583, lon: -8.782314 }),
        ]
    }

    fn station_for_filename(filename: &str) -> Option<(&'static str, Coordinate)> {
        let lower = filename.to_lowercase();
        Self::known_stations()
            .into_iter()
            .find(|(name, _)| lower.contains(name))
    }

    /// Extracts a standard depth label from a column name. Semantic
    /// matching comes first: every flavour of "surface" is unified to
    /// `1_5m` even when the header claims 1 m, so all platforms share
    /// one schema. Numeric matching is the fallback.
    pub fn extract_depth_label(column: &str) -> Option<String> {
        let c = column.to_lowercase();

        if c.contains("superficial") {
            return Some("1_5m".to_string());
        }
        if c.contains("inferior") || c.contains("fondo") {
            return Some("3m".to_string());
        }

        let re = regex::Regex::new(r"(\d+)[.,]?(\d*)\s*m").expect("static pattern");
        let caps = re.captures(&c)?;
        let whole = caps.get(1)?.as_str();
        let frac = caps.get(2).map(|m| m.as_str()).unwrap_or("");

        if frac.is_empty() || frac == "0" {
            Some(format!("{}m", whole))
        } else {
            Some(format!("{}_{}m", whole, frac))
        }
    }

    /// Maps raw headers to canonical column names. Data columns are
    /// matched by meaning; a `Validación` column is strictly positional
    /// and names the QC flag of the column immediately to its left,
    /// only when that column was itself mapped.
    pub fn normalize_columns(headers: &[String]) -> Vec<Option<String>> {
        let mut canonical: Vec<Option<String>> = vec![None; headers.len()];

        for (i, column) in headers.iter().enumerate() {
            let c = column.to_lowercase();

            if c.contains("data") || c.contains("fecha") {
                canonical[i] = Some("fecha_hora".to_string());
                continue;
            }

            let is_qc = c.contains("validacion") || c.contains("validación");
            if is_qc {
                if i > 0 {
                    if let Some(base) = canonical[i - 1].clone() {
                        canonical[i] = Some(format!("qc_{}", base));
                    }
                }
                continue;
            }

            if let Some(depth) = Self::extract_depth_label(column) {
                if c.contains("salinidade") || c.contains("salinidad") {
                    canonical[i] = Some(format!("salinidad_{}", depth));
                } else if c.contains("temperatura") {
                    canonical[i] = Some(format!("temperatura_{}", depth));
                }
            }
        }

        canonical
    }

    fn assign(record: &mut MooringRecord, column: &str, value: Option<f64>) {
        match column {
            "salinidad_1_5m" => record.salinity_1_5m = value,
            "qc_salinidad_1_5m" => record.qc_salinity_1_5m = value,
            "temperatura_1_5m" => record.temperature_1_5m = value,
            "qc_temperatura_1_5m" => record.qc_temperature_1_5m = value,
            "salinidad_3m" => record.salinity_3m = value,
            "qc_salinidad_3m" => record.qc_salinity_3m = value,
            "temperatura_3m" => record.temperature_3m = value,
            "qc_temperatura_3m" => record.qc_temperature_3m = value,
            // Columns outside the strict schema are dropped.
            _ => {}
        }
    }

    fn field(record: &MooringRecord, column: &str) -> Option<f64> {
        match column {
            "salinidad_1_5m" => record.salinity_1_5m,
            "qc_salinidad_1_5m" => record.qc_salinity_1_5m,
            "temperatura_1_5m" => record.temperature_1_5m,
            "qc_temperatura_1_5m" => record.qc_temperature_1_5m,
            "salinidad_3m" => record.salinity_3m,
            "qc_salinidad_3m" => record.qc_salinity_3m,
            "temperatura_3m" => record.temperature_3m,
            "qc_temperatura_3m" => record.qc_temperature_3m,
            _ => None,
        }
    }

    fn process_file(&self, file: &MooringFile) -> Result<Vec<MooringRecord>> {
        let Some((station, position)) = Self::station_for_filename(&file.filename) else {
            tracing::warn!(
                "Skipping {}: filename does not match any known platform",
                file.filename
            );
            return Ok(Vec::new());
        };

        let content = decode_latin1(&file.bytes);
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b';')
            .flexible(true)
            .from_reader(content.as_bytes());

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        let canonical = Self::normalize_columns(&headers);

        let timestamp_idx = canonical
            .iter()
            .position(|c| c.as_deref() == Some("fecha_hora"))
            .ok_or_else(|| {
                EtlError::processing(format!(
                    "{}: no timestamp column detected (headers: {:?})",
                    file.filename, headers
                ))
            })?;

        let mut records = Vec::new();
        let mut dropped_dates = 0usize;

        for row in reader.records() {
            let row = match row {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!("{}: skipping malformed row: {}", file.filename, e);
                    continue;
                }
            };

            let timestamp = row
                .get(timestamp_idx)
                .and_then(|cell| NaiveDateTime::parse_from_str(cell.trim(), TIMESTAMP_FORMAT).ok());

            // Rows without a valid timestamp are useless downstream.
            let Some(timestamp) = timestamp else {
                dropped_dates += 1;
                continue;
            };

            let mut record = MooringRecord {
                station: station.to_string(),
                lat: position.lat,
                lon: position.lon,
                timestamp: Some(timestamp),
                salinity_1_5m: None,
                qc_salinity_1_5m: None,
                temperature_1_5m: None,
                qc_temperature_1_5m: None,
                salinity_3m: None,
                qc_salinity_3m: None,
                temperature_3m: None,
                qc_temperature_3m: None,
            };

            for (idx, column) in canonical.iter().enumerate() {
                let (Some(column), Some(cell)) = (column, row.get(idx)) else {
                    continue;
                };
                if column == "fecha_hora" {
                    continue;
                }
                Self::assign(&mut record, column, parse_decimal(cell));
            }

            records.push(record);
        }

        if dropped_dates > 0 {
            tracing::warn!(
                "{}: dropped {} rows with invalid timestamps",
                file.filename,
                dropped_dates
            );
        }

        self.validate_ranges(&records, station);

        tracing::info!("[OK] Processed {}: {} rows", file.filename, records.len());
        Ok(records)
    }

    /// Flags physically impossible values. They stay in the dataset;
    /// the QC columns carry the provider's own verdict.
    fn validate_ranges(&self, records: &[MooringRecord], station: &str) {
        let quality = &self.config.quality;
        let bounds_for = |column: &str| {
            if column.starts_with("qc_") {
                None
            } else if column.starts_with("salinidad") {
                Some((quality.mooring_salinity[0], quality.mooring_salinity[1]))
            } else {
                Some((quality.mooring_temperature[0], quality.mooring_temperature[1]))
            }
        };

        for column in VARIABLE_COLUMNS {
            let Some((min, max)) = bounds_for(column) else { continue };
            let invalid = records
                .iter()
                .filter(|r| {
                    matches!(Self::field(r, column), Some(v) if v < min || v > max)
                })
                .count();
            if invalid > 0 {
                tracing::warn!(
                    "{} - {}: {} values out of range [{}, {}]",
                    station,
                    column,
                    invalid,
                    min,
                    max
                );
            }
        }
    }

    fn build_report(
        &self,
        records: &[MooringRecord],
        duplicates_removed: usize,
        files_processed: usize,
    ) -> MooringQualityReport {
        let mut per_station: BTreeMap<String, StationQuality> = BTreeMap::new();

        for (station, _) in Self::known_stations() {
            let station_records: Vec<&MooringRecord> =
                records.iter().filter(|r| r.station == station).collect();
            if station_records.is_empty() {
                continue;
            }

            let mut completeness = BTreeMap::new();
            for column in VARIABLE_COLUMNS {
                let present = station_records
                    .iter()
                    .filter(|r| Self::field(r, column).is_some())
                    .count();
                let pct = present as f64 / station_records.len() as f64 * 100.0;
                completeness.insert(column.to_string(), format!("{:.1}%", pct));
            }

            per_station.insert(
                station.to_string(),
                StationQuality {
                    records: station_records.len(),
                    completeness,
                },
            );
        }

        let timestamps: Vec<NaiveDateTime> =
            records.iter().filter_map(|r| r.timestamp).collect();

        MooringQualityReport {
            total_records: records.len(),
            temporal_range: TemporalRange {
                start: timestamps.iter().min().map(|t| t.to_string()),
                end: timestamps.iter().max().map(|t| t.to_string()),
            },
            per_station,
            duplicates_removed,
            files_processed,
            processed_at: chrono::Local::now().naive_local().to_string(),
        }
    }

    fn to_csv(records: &[MooringRecord]) -> Result<Vec<u8>> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b';')
            .from_writer(vec![]);
        for record in records {
            writer.serialize(record)?;
        }
        writer
            .into_inner()
            .map_err(|e| EtlError::processing(format!("CSV buffer error: {}", e)))
    }
}

#[async_trait]
impl<S: Storage> Pipeline for MooringPipeline<S> {
    type Raw = MooringFile;
    type Output = MooringDataset;

    async fn extract(&self) -> Result<Vec<MooringFile>> {
        let input_dir = &self.config.paths.mooring_input;
        let files = crate::config::cli::list_files_with_extension(input_dir, "csv")?;

        tracing::info!("Found {} CSV files in {}", files.len(), input_dir.display());
        if files.is_empty() {
            return Err(EtlError::processing(format!(
                "No mooring files found in {}",
                input_dir.display()
            )));
        }

        let mut result = Vec::with_capacity(files.len());
        for path in files {
            let bytes = self.storage.read_file(&path.to_string_lossy()).await?;
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.to_string_lossy().into_owned());
            result.push(MooringFile { filename, bytes });
        }
        Ok(result)
    }

    async fn transform(&self, data: Vec<MooringFile>) -> Result<MooringDataset> {
        let files_total = data.len();
        let mut all_records: Vec<MooringRecord> = Vec::new();
        let mut files_processed = 0usize;

        for file in &data {
            match self.process_file(file) {
                Ok(records) if !records.is_empty() => {
                    files_processed += 1;
                    all_records.extend(records);
                }
                Ok(_) => {}
                Err(e) => tracing::error!("Error processing {}: {}", file.filename, e),
            }
        }

        if all_records.is_empty() {
            return Err(EtlError::processing(
                "No mooring file was processed successfully",
            ));
        }

        tracing::info!("Unifying {} records from {}/{} files", all_records.len(), files_processed, files_total);

        // Duplicate (station, timestamp) pairs appear when exports
        // overlap; the most recent export wins.
        let before = all_records.len();
        let mut unique: HashMap<(String, Option<NaiveDateTime>), MooringRecord> = HashMap::new();
        for record in all_records {
            unique.insert((record.station.clone(), record.timestamp), record);
        }
        let mut records: Vec<MooringRecord> = unique.into_values().collect();
        let duplicates_removed = before - records.len();
        if duplicates_removed > 0 {
            tracing::warn!("Removed {} duplicated records", duplicates_removed);
        }

        records.sort_by(|a, b| {
            (a.station.clone(), a.timestamp).cmp(&(b.station.clone(), b.timestamp))
        });

        let report = self.build_report(&records, duplicates_removed, files_processed);

        Ok(MooringDataset { records, report })
    }

    async fn load(&self, result: MooringDataset) -> Result<String> {
        let interim = &self.config.paths.interim;
        let csv_path = interim.join(OUTPUT_FILE).to_string_lossy().to_string();
        let report_path = interim.join(REPORT_FILE).to_string_lossy().to_string();

        let csv_bytes = Self::to_csv(&result.records)?;
        self.storage.write_file(&csv_path, &csv_bytes).await?;

        let report_bytes = serde_json::to_vec_pretty(&result.report)?;
        self.storage.write_file(&report_path, &report_bytes).await?;

        tracing::info!("OK Data saved to: {}", csv_path);
        tracing::info!("OK Quality report saved to: {}", report_path);
        tracing::info!("Total records: {}", result.report.total_records);
        for (station, quality) in &result.report.per_station {
            tracing::info!("  {}: {} records", station.to_uppercase(), quality.records);
        }

        Ok(csv_path)
    }

    fn name(&self) -> &str {
        "mooring"
    }
}
