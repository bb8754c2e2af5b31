use crate::config::toml_config::EtlConfig;
use crate::domain::model::{Coordinate, CtdQualityReport, CtdRecord, StationCoordinates};
use crate::domain::ports::{Pipeline, Storage};
use crate::utils::error::{EtlError, Result};
use crate::utils::parse::{parse_dayfirst_datetime, parse_decimal};
use crate::utils::validation::count_out_of_range;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::Write;

const OUTPUT_FILE: &str = "ctd_arousa_historico_unificado.csv";
const REPORT_FILE: &str = "ctd_reporte_calidad.json";

/// One raw campaign export, as read from disk.
pub struct CtdFile {
    pub filename: String,
    pub content: String,
}

/// Consolidated dataset plus its quality metrics.
pub struct CtdDataset {
    pub records: Vec<CtdRecord>,
    pub report: CtdQualityReport,
}

/// Columns the campaign exports carry. The instrument writes generic
/// `VAR_n`/`CODVAL_n` names; the mapping below is fixed by the cast
/// configuration used across all campaigns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum CtdColumn {
    StationId,
    StationName,
    Timestamp,
    Temperature,
    Salinity,
    PressureDb,
    Ph,
    Oxygen,
    Transmittance,
    Irradiance,
    UvFluorescence,
    Fluorescence,
    Density,
    Depth,
    TemperatureIts68,
    Conductivity,
    QcTemperature,
    QcSalinity,
    QcOxygen,
    QcFluorescence,
}

impl CtdColumn {
    /// Accent-proof header matching: exports arrive with and without
    /// the tilde in `Código`.
    fn from_header(header: &str) -> Option<Self> {
        let h = header.trim().to_lowercase();
        let mapped = match h.as_str() {
            "data" => Self::Timestamp,
            "var_0" => Self::Temperature,
            "var_1" => Self::Salinity,
            "var_2" => Self::PressureDb,
            "var_3" => Self::Ph,
            "var_4" => Self::Oxygen,
            "var_5" => Self::Transmittance,
            "var_6" => Self::Irradiance,
            "var_7" => Self::UvFluorescence,
            "var_8" => Self::Fluorescence,
            "var_9" => Self::Density,
            "var_10" => Self::Depth,
            "var_11" => Self::TemperatureIts68,
            "var_12" => Self::Conductivity,
            "codval_0" => Self::QcTemperature,
            "codval_1" => Self::QcSalinity,
            "codval_4" => Self::QcOxygen,
            "codval_8" => Self::QcFluorescence,
            _ if h.contains("odigo") || h.contains("ódigo") => Self::StationId,
            _ if h.contains("stacion") => Self::StationName,
            _ => return None,
        };
        Some(mapped)
    }

    fn expected() -> &'static [CtdColumn] {
        &[
            Self::StationId,
            Self::StationName,
            Self::Timestamp,
            Self::Temperature,
            Self::Salinity,
            Self::Depth,
            Self::QcTemperature,
            Self::QcSalinity,
        ]
    }
}

pub struct CtdPipeline<S: Storage> {
    storage: S,
    config: EtlConfig,
}

impl<S: Storage> CtdPipeline<S> {
    pub fn new(storage: S, config: EtlConfig) -> Self {
        Self { storage, config }
    }

    /// Default station positions for the Ría de Arousa sampling grid,
    /// written to the coordinates file on first run so campaigns can
    /// correct them without a rebuild.
    fn default_coordinates() -> StationCoordinates {
        let raw: [(&str, f64, f64); 11] = [
            ("A0", 42.5181, -8.9818),
            ("A1", 42.5932, -8.9329),
            ("A2", 42.6074, -8.8893),
            ("A3", 42.6465, -8.8413),
            ("A4", 42.5681, -8.8894),
            ("A5", 42.5623, -8.8042),
            ("A6", 42.5991, -8.7765),
            ("A7", 42.4832, -8.8724),
            ("A8", 42.4865, -8.9371),
            ("A9", 42.5221, -9.0065),
            ("AC", 42.5505, -8.9102),
        ];
        raw.iter()
            .map(|(id, lat, lon)| (id.to_string(), Coordinate { lat: *lat, lon: *lon }))
            .collect()
    }

    /// Loads station coordinates from the JSON side file, creating it
    /// with the defaults when absent.
    async fn load_coordinates(&self) -> StationCoordinates {
        let path = self.config.paths.coordinates_file.to_string_lossy().to_string();

        match self.storage.read_file(&path).await {
            Ok(bytes) => match serde_json::from_slice::<StationCoordinates>(&bytes) {
                Ok(coords) => {
                    tracing::info!("Station coordinates loaded from {}", path);
                    coords
                }
                Err(e) => {
                    tracing::error!(
                        "Error parsing coordinates file {}: {}. Using defaults.",
                        path,
                        e
                    );
                    Self::default_coordinates()
                }
            },
            Err(_) => {
                let defaults = Self::default_coordinates();
                match serde_json::to_vec_pretty(&defaults) {
                    Ok(bytes) => {
                        if let Err(e) = self.storage.write_file(&path, &bytes).await {
                            tracing::warn!("Could not create coordinates file {}: {}", path, e);
                        } else {
                            tracing::warn!(
                                "Coordinates file not found. Created {} with defaults.",
                                path
                            );
                        }
                    }
                    Err(e) => tracing::warn!("Could not serialize default coordinates: {}", e),
                }
                defaults
            }
        }
    }

    /// Finds the line where the tabular data header starts. Exports
    /// carry a free-form preamble of varying length, so the search is
    /// layered:
    /// 1. a line naming the id and station columns (accent-proof);
    /// 2. a `VAR_0`/`VAR_1` definition line confirmed by data below it;
    /// 3. the line right before the first `A0`/`A1` data row.
    pub fn detect_data_start(content: &str) -> Option<usize> {
        let lines: Vec<&str> = content.lines().collect();

        for (i, line) in lines.iter().enumerate() {
            let lower = line.to_lowercase();
            if (lower.contains("odigo") || lower.contains("ódigo")) && lower.contains("stacion") {
                tracing::debug!("Header found by column names at line {}", i);
                return Some(i);
            }
            if lower.contains("var_0") && lower.contains("var_1") {
                if let Some(next) = lines.get(i + 1) {
                    if next.contains("A0") {
                        return Some(i);
                    }
                }
            }
        }

        for (i, line) in lines.iter().enumerate() {
            let trimmed = line.trim_start();
            if trimmed.starts_with("A0") || trimmed.starts_with("A1") {
                tracing::warn!("Header deduced from first data row at line {}", i);
                return Some(i.saturating_sub(1));
            }
        }

        None
    }

    /// Parses a single export. `None` cells, garbage numerics and
    /// unparseable timestamps become nulls; the counts are logged.
    fn process_file(&self, file: &CtdFile, coords: &StationCoordinates) -> Result<Vec<CtdRecord>> {
        tracing::info!("Processing: {}", file.filename);

        let start_line = Self::detect_data_start(&file.content).ok_or_else(|| {
            EtlError::processing(format!(
                "No data header found in {}; review the file manually",
                file.filename
            ))
        })?;

        let table: String = file
            .content
            .lines()
            .skip(start_line)
            .collect::<Vec<_>>()
            .join("\n");

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .flexible(true)
            .from_reader(table.as_bytes());

        let headers = reader.headers()?.clone();
        let mut columns: HashMap<usize, CtdColumn> = HashMap::new();
        for (idx, header) in headers.iter().enumerate() {
            if let Some(column) = CtdColumn::from_header(header) {
                columns.insert(idx, column);
            }
        }

        let found: BTreeSet<CtdColumn> = columns.values().copied().collect();
        let missing: Vec<CtdColumn> = CtdColumn::expected()
            .iter()
            .filter(|c| !found.contains(*c))
            .copied()
            .collect();
        if !missing.is_empty() {
            tracing::warn!("{}: expected columns not found: {:?}", file.filename, missing);
        }

        // Uppercased lookup so "a0 " still resolves.
        let coords_by_id: HashMap<String, Coordinate> = coords
            .iter()
            .map(|(id, c)| (id.trim().to_uppercase(), *c))
            .collect();

        let processed_at = chrono::Local::now().naive_local();
        let mut records = Vec::new();
        let mut bad_numeric = 0usize;
        let mut bad_dates = 0usize;
        let mut without_coords: BTreeSet<String> = BTreeSet::new();

        for row in reader.records() {
            let row = match row {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!("{}: skipping malformed row: {}", file.filename, e);
                    continue;
                }
            };

            let mut record = CtdRecord::empty(&file.filename);
            record.processed_at = Some(processed_at);

            for (idx, column) in &columns {
                let Some(cell) = row.get(*idx) else { continue };

                match column {
                    CtdColumn::StationId => {
                        let id = cell.trim();
                        if !id.is_empty() {
                            record.station_id = Some(id.to_string());
                        }
                    }
                    CtdColumn::StationName => {
                        let name = cell.trim();
                        if !name.is_empty() {
                            record.station_name = Some(name.to_string());
                        }
                    }
                    CtdColumn::Timestamp => {
                        record.timestamp = parse_dayfirst_datetime(cell);
                        if record.timestamp.is_none() && !cell.trim().is_empty() {
                            bad_dates += 1;
                        }
                    }
                    numeric => {
                        let value = parse_decimal(cell);
                        if value.is_none() && !cell.trim().is_empty() {
                            bad_numeric += 1;
                        }
                        match numeric {
                            CtdColumn::Temperature => record.temperature = value,
                            CtdColumn::Salinity => record.salinity = value,
                            CtdColumn::PressureDb => record.pressure_db = value,
                            CtdColumn::Ph => record.ph = value,
                            CtdColumn::Oxygen => record.oxygen_ml_l = value,
                            CtdColumn::Transmittance => record.transmittance = value,
                            CtdColumn::Irradiance => record.irradiance = value,
                            CtdColumn::UvFluorescence => record.uv_fluorescence = value,
                            CtdColumn::Fluorescence => record.fluorescence = value,
                            CtdColumn::Density => record.density = value,
                            CtdColumn::Depth => record.depth = value,
                            CtdColumn::TemperatureIts68 => record.temperature_its68 = value,
                            CtdColumn::Conductivity => record.conductivity = value,
                            CtdColumn::QcTemperature => record.qc_temperature = value,
                            CtdColumn::QcSalinity => record.qc_salinity = value,
                            CtdColumn::QcOxygen => record.qc_oxygen = value,
                            CtdColumn::QcFluorescence => record.qc_fluorescence = value,
                            _ => unreachable!("id/name/timestamp handled above"),
                        }
                    }
                }
            }

            // Geographic enrichment by station id.
            if let Some(id) = &record.station_id {
                match coords_by_id.get(&id.to_uppercase()) {
                    Some(c) => {
                        record.lat = Some(c.lat);
                        record.lon = Some(c.lon);
                    }
                    None => {
                        without_coords.insert(id.clone());
                    }
                }
            }

            records.push(record);
        }

        if bad_numeric > 0 {
            tracing::warn!(
                "{}: {} non-numeric values converted to null",
                file.filename,
                bad_numeric
            );
        }
        if bad_dates > 0 {
            tracing::warn!("{}: {} invalid timestamps", file.filename, bad_dates);
        }
        if !without_coords.is_empty() {
            tracing::warn!(
                "{}: stations without coordinates: {:?}",
                file.filename,
                without_coords
            );
        }

        tracing::info!("{}: {} records read", file.filename, records.len());
        Ok(records)
    }

    fn build_report(
        &self,
        records: &[CtdRecord],
        files_processed: usize,
        files_failed: Vec<String>,
    ) -> CtdQualityReport {
        let total = records.len();
        let complete = records.iter().filter(|r| r.is_complete()).count();

        let mut nulls: BTreeMap<String, usize> = BTreeMap::new();
        let mut count_null = |name: &str, missing: usize| {
            nulls.insert(name.to_string(), missing);
        };
        count_null(
            "estacion_id",
            records.iter().filter(|r| r.station_id.is_none()).count(),
        );
        count_null("lat", records.iter().filter(|r| r.lat.is_none()).count());
        count_null("lon", records.iter().filter(|r| r.lon.is_none()).count());
        count_null(
            "fecha_hora",
            records.iter().filter(|r| r.timestamp.is_none()).count(),
        );
        count_null(
            "profundidad",
            records.iter().filter(|r| r.depth.is_none()).count(),
        );
        count_null(
            "salinidad",
            records.iter().filter(|r| r.salinity.is_none()).count(),
        );
        count_null(
            "temperatura",
            records.iter().filter(|r| r.temperature.is_none()).count(),
        );

        let quality = &self.config.quality;
        let temperature_outliers = count_out_of_range(
            records.iter().map(|r| r.temperature),
            quality.ctd_temperature[0],
            quality.ctd_temperature[1],
        );
        let salinity_outliers = count_out_of_range(
            records.iter().map(|r| r.salinity),
            quality.ctd_salinity[0],
            quality.ctd_salinity[1],
        );
        let depth_outliers =
            count_out_of_range(records.iter().map(|r| r.depth), 0.0, quality.max_depth_m);

        let stations: BTreeSet<String> =
            records.iter().filter_map(|r| r.station_id.clone()).collect();

        CtdQualityReport {
            total_records: total,
            complete_records: complete,
            complete_pct: if total > 0 {
                complete as f64 / total as f64 * 100.0
            } else {
                0.0
            },
            nulls_per_column: nulls,
            temperature_outliers,
            salinity_outliers,
            depth_outliers,
            stations: stations.into_iter().collect(),
            files_processed,
            files_failed,
        }
    }

    fn to_csv(records: &[CtdRecord]) -> Result<Vec<u8>> {
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

    fn build_archive(csv_bytes: &[u8], report_bytes: &[u8]) -> Result<Vec<u8>> {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));

        zip.start_file::<_, ()>(OUTPUT_FILE, zip::write::FileOptions::default())?;
        zip.write_all(csv_bytes)?;

        zip.start_file::<_, ()>(REPORT_FILE, zip::write::FileOptions::default())?;
        zip.write_all(report_bytes)?;

        let cursor = zip.finish()?;
        Ok(cursor.into_inner())
    }
}

#[async_trait]
impl<S: Storage> Pipeline for CtdPipeline<S> {
    type Raw = CtdFile;
    type Output = CtdDataset;

    async fn extract(&self) -> Result<Vec<CtdFile>> {
        let input_dir = &self.config.paths.ctd_input;
        let files = crate::config::cli::list_files_with_extension(input_dir, "txt")?;

        tracing::info!("Found {} .txt files in {}", files.len(), input_dir.display());
        if files.is_empty() {
            return Err(EtlError::processing(format!(
                "No CTD files found in {}",
                input_dir.display()
            )));
        }

        let mut result = Vec::with_capacity(files.len());
        for path in files {
            let bytes = self.storage.read_file(&path.to_string_lossy()).await?;
            let content = String::from_utf8_lossy(&bytes).into_owned();
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.to_string_lossy().into_owned());
            result.push(CtdFile { filename, content });
        }
        Ok(result)
    }

    async fn transform(&self, data: Vec<CtdFile>) -> Result<CtdDataset> {
        let coords = self.load_coordinates().await;

        let total_files = data.len();
        let mut records: Vec<CtdRecord> = Vec::new();
        let mut files_failed: Vec<String> = Vec::new();

        for (i, file) in data.iter().enumerate() {
            tracing::info!("[{}/{}] Processing file...", i + 1, total_files);
            match self.process_file(file, &coords) {
                Ok(file_records) if !file_records.is_empty() => records.extend(file_records),
                Ok(_) => {
                    tracing::warn!("{} produced no records", file.filename);
                    files_failed.push(file.filename.clone());
                }
                Err(e) => {
                    tracing::error!("{} failed: {}", file.filename, e);
                    files_failed.push(file.filename.clone());
                }
            }
        }

        if records.is_empty() {
            return Err(EtlError::processing(
                "No CTD file was processed successfully",
            ));
        }

        // Chronological order, stations grouped inside each cast time;
        // rows without a timestamp sink to the end.
        records.sort_by(|a, b| {
            let key_a = (a.timestamp.is_none(), a.timestamp, a.station_id.clone());
            let key_b = (b.timestamp.is_none(), b.timestamp, b.station_id.clone());
            key_a.cmp(&key_b)
        });

        let files_processed = total_files - files_failed.len();
        let report = self.build_report(&records, files_processed, files_failed);

        tracing::info!("Consolidated records: {}", report.total_records);
        tracing::info!(
            "Complete records: {} ({:.1}%)",
            report.complete_records,
            report.complete_pct
        );
        if !report.files_failed.is_empty() {
            tracing::warn!("Failed files: {:?}", report.files_failed);
        }

        Ok(CtdDataset { records, report })
    }

    async fn load(&self, result: CtdDataset) -> Result<String> {
        let csv_bytes = Self::to_csv(&result.records)?;
        let report_bytes = serde_json::to_vec_pretty(&result.report)?;

        let interim = &self.config.paths.interim;
        let csv_path = interim.join(OUTPUT_FILE).to_string_lossy().to_string();
        let report_path = interim.join(REPORT_FILE).to_string_lossy().to_string();

        self.storage.write_file(&csv_path, &csv_bytes).await?;
        self.storage.write_file(&report_path, &report_bytes).await?;

        if self.config.load.compress {
            let archive = Self::build_archive(&csv_bytes, &report_bytes)?;
            let archive_path = interim
                .join(&self.config.load.archive_name)
                .to_string_lossy()
                .to_string();
            self.storage.write_file(&archive_path, &archive).await?;
            tracing::info!("Archive written to {}", archive_path);
        }

        tracing::info!("✅ CTD processing completed");
        tracing::info!("📁 Output saved to: {}", csv_path);
        Ok(csv_path)
    }

    fn name(&self) -> &str {
        "ctd"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::pipelines::test_support::MockStorage;

    const SAMPLE: &str = "\
INTECMAR - Rede de observacion\n\
Campana: C1\n\
Código\tEstacion\tData\tVAR_0\tVAR_1\tVAR_10\tCODVAL_0\tCODVAL_1\n\
A0\tRia Arousa 0\t03/11/2021 10:00\t14,8\t35,2\t5,0\t1\t1\n\
A1\tRia Arousa 1\t03/11/2021 11:00\t15,1\tgarbage\t7,5\t1\t1\n\
AX\tUnknown\t03/11/2021 12:00\t15,0\t34,0\t10,0\t1\t1\n";

    fn pipeline() -> (CtdPipeline<MockStorage>, MockStorage) {
        let storage = MockStorage::new();
        let config = EtlConfig::default();
        (CtdPipeline::new(storage.clone(), config), storage)
    }

    #[test]
    fn test_detect_header_by_column_names() {
        assert_eq!(CtdPipeline::<MockStorage>::detect_data_start(SAMPLE), Some(2));
    }

    #[test]
    fn test_detect_header_without_accents() {
        let content = "preamble\nCodigo\tEstacion\tData\nA0\tX\t01/01/2022 00:00\n";
        assert_eq!(
            CtdPipeline::<MockStorage>::detect_data_start(content),
            Some(1)
        );
    }

    #[test]
    fn test_detect_header_by_var_line() {
        let content = "junk\nVAR_0\tVAR_1\tVAR_2\nA0\t14,0\t35,0\n";
        assert_eq!(
            CtdPipeline::<MockStorage>::detect_data_start(content),
            Some(1)
        );
    }

    #[test]
    fn test_detect_header_from_first_data_row() {
        let content = "some\tcols\nA0\t14,0\t35,0\n";
        assert_eq!(
            CtdPipeline::<MockStorage>::detect_data_start(content),
            Some(0)
        );
    }

    #[test]
    fn test_detect_header_failure() {
        assert_eq!(
            CtdPipeline::<MockStorage>::detect_data_start("no tabular data here\nat all\n"),
            None
        );
    }

    #[tokio::test]
    async fn test_process_file_maps_and_enriches() {
        let (pipeline, _) = pipeline();
        let coords = CtdPipeline::<MockStorage>::default_coordinates();

        let file = CtdFile {
            filename: "c1_2021.txt".to_string(),
            content: SAMPLE.to_string(),
        };

        let records = pipeline.process_file(&file, &coords).unwrap();
        assert_eq!(records.len(), 3);

        let first = &records[0];
        assert_eq!(first.station_id.as_deref(), Some("A0"));
        assert_eq!(first.station_name.as_deref(), Some("Ria Arousa 0"));
        assert_eq!(first.temperature, Some(14.8));
        assert_eq!(first.salinity, Some(35.2));
        assert_eq!(first.depth, Some(5.0));
        assert_eq!(first.lat, Some(42.5181));
        assert_eq!(first.source_file, "c1_2021.txt");
        assert!(first.timestamp.is_some());

        // Garbage numerics become nulls, the row survives.
        assert_eq!(records[1].salinity, None);
        assert_eq!(records[1].temperature, Some(15.1));

        // Unknown station: no coordinates.
        assert_eq!(records[2].lat, None);
    }

    #[tokio::test]
    async fn test_transform_consolidates_and_reports() {
        let (pipeline, _) = pipeline();

        let files = vec![
            CtdFile {
                filename: "b.txt".to_string(),
                content: SAMPLE.to_string(),
            },
            CtdFile {
                filename: "broken.txt".to_string(),
                content: "nothing tabular\n".to_string(),
            },
        ];

        let dataset = pipeline.transform(files).await.unwrap();

        assert_eq!(dataset.records.len(), 3);
        assert_eq!(dataset.report.files_processed, 1);
        assert_eq!(dataset.report.files_failed, vec!["broken.txt".to_string()]);
        assert_eq!(dataset.report.total_records, 3);
        // A0 is complete; A1 lacks salinity; AX lacks coordinates.
        assert_eq!(dataset.report.complete_records, 1);
        assert_eq!(dataset.report.nulls_per_column["salinidad"], 1);
        assert_eq!(dataset.report.nulls_per_column["lat"], 1);
        // Sorted by timestamp.
        assert!(dataset.records[0].timestamp <= dataset.records[1].timestamp);
    }

    #[tokio::test]
    async fn test_transform_all_failed_is_an_error() {
        let (pipeline, _) = pipeline();
        let files = vec![CtdFile {
            filename: "broken.txt".to_string(),
            content: "nope\n".to_string(),
        }];

        assert!(pipeline.transform(files).await.is_err());
    }

    #[tokio::test]
    async fn test_load_writes_csv_and_report() {
        let (pipeline, storage) = pipeline();

        let files = vec![CtdFile {
            filename: "a.txt".to_string(),
            content: SAMPLE.to_string(),
        }];
        let dataset = pipeline.transform(files).await.unwrap();
        let path = pipeline.load(dataset).await.unwrap();

        assert!(path.ends_with(OUTPUT_FILE));
        let csv = String::from_utf8(storage.get_file(&path).await.unwrap()).unwrap();
        assert!(csv.starts_with("estacion_id;estacion_nombre;lat;lon;fecha_hora"));
        assert!(csv.contains("A0;Ria Arousa 0;42.5181;-8.9818;2021-11-03 10:00:00"));

        let report_path = path.replace(OUTPUT_FILE, REPORT_FILE);
        let report: CtdQualityReport =
            serde_json::from_slice(&storage.get_file(&report_path).await.unwrap()).unwrap();
        assert_eq!(report.total_records, 3);
    }

    #[tokio::test]
    async fn test_compress_option_bundles_outputs() {
        let storage = MockStorage::new();
        let mut config = EtlConfig::default();
        config.load.compress = true;
        let pipeline = CtdPipeline::new(storage.clone(), config);

        let files = vec![CtdFile {
            filename: "a.txt".to_string(),
            content: SAMPLE.to_string(),
        }];
        let dataset = pipeline.transform(files).await.unwrap();
        pipeline.load(dataset).await.unwrap();

        let archive_path = format!("data/interim/{}", "etl_outputs.zip");
        let archive_bytes = storage.get_file(&archive_path).await.unwrap();

        let mut archive =
            zip::ZipArchive::new(std::io::Cursor::new(archive_bytes)).unwrap();
        let mut names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec![OUTPUT_FILE.to_string(), REPORT_FILE.to_string()]);
    }

    #[tokio::test]
    async fn test_missing_coordinates_file_creates_defaults() {
        let (pipeline, storage) = pipeline();

        let coords = pipeline.load_coordinates().await;
        assert_eq!(coords.len(), 11);
        assert!(coords.contains_key("AC"));

        // The defaults were persisted for the next run.
        let path = "config/coordenadas_ctd.json";
        let stored: StationCoordinates =
            serde_json::from_slice(&storage.get_file(path).await.unwrap()).unwrap();
        assert_eq!(stored.len(), 11);
    }
}
