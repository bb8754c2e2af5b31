use crate::utils::error::{EtlError, Result};
use crate::utils::retry::RetryPolicy;
use crate::utils::validation::{self, Validate};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Project-wide configuration, loadable from a TOML file. Every section
/// is optional; the defaults reproduce the campaign layout the notebooks
/// already rely on.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EtlConfig {
    pub pipeline: PipelineInfo,
    pub paths: PathsConfig,
    pub quality: QualityConfig,
    pub download: DownloadConfig,
    pub sources: SourcesConfig,
    pub load: LoadConfig,
    /// Variables exported into the process environment during
    /// initialization, before any pipeline runs.
    pub environment: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineInfo {
    pub name: String,
    pub description: String,
}

impl Default for PipelineInfo {
    fn default() -> Self {
        Self {
            name: "arousa-etl".to_string(),
            description: "Ría de Arousa hydrographic ETL".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub ctd_input: PathBuf,
    pub mooring_input: PathBuf,
    pub interim: PathBuf,
    pub processed: PathBuf,
    pub coordinates_file: PathBuf,
    pub rivers_input: PathBuf,
    pub rivers_output: PathBuf,
    pub stations_file: PathBuf,
    pub coverage_report: PathBuf,
    /// Optional explicit .env location; otherwise searched upward from
    /// the working directory.
    pub env_file: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            ctd_input: "data/raw/c1".into(),
            mooring_input: "data/raw/c2".into(),
            interim: "data/interim".into(),
            processed: "data/processed".into(),
            coordinates_file: "config/coordenadas_ctd.json".into(),
            rivers_input: "data/raw/hidrografia/rios.geojson".into(),
            rivers_output: "data/processed/red_fluvial_arousa.geojson".into(),
            stations_file: "data/raw/aforos_meta_raw.csv".into(),
            coverage_report: "data/processed/cobertura_arousa.json".into(),
            env_file: None,
        }
    }
}

/// Physically plausible ranges; values outside are counted as outliers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    pub max_depth_m: f64,
    /// CTD casts, open-estuary water.
    pub ctd_salinity: [f64; 2],
    pub ctd_temperature: [f64; 2],
    /// Moorings sit in shallow coastal water; tighter bounds.
    pub mooring_salinity: [f64; 2],
    pub mooring_temperature: [f64; 2],
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            max_depth_m: 500.0,
            ctd_salinity: [0.0, 50.0],
            ctd_temperature: [-2.0, 40.0],
            mooring_salinity: [0.0, 40.0],
            mooring_temperature: [-5.0, 35.0],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    pub start_date: NaiveDate,
    /// Defaults to today when absent.
    pub end_date: Option<NaiveDate>,
    pub base_url: String,
    pub output_dir: PathBuf,
    pub retry: RetryPolicy,
    pub timeout_secs: u64,
    /// Pause between consecutive downloads, to stay polite with the
    /// THREDDS server.
    pub request_delay_secs: f64,
    /// Files smaller than this are treated as truncated.
    pub min_file_size: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            start_date: NaiveDate::from_ymd_opt(2021, 9, 1).expect("valid campaign start date"),
            end_date: None,
            base_url: "https://mandeo.meteogalicia.es/thredds/dodsC/modelos/WRF_ARW_1KM_HIST_Novo"
                .to_string(),
            output_dir: "data/raw/b3/wrf_prec".into(),
            retry: RetryPolicy::default(),
            timeout_secs: 60,
            request_delay_secs: 0.5,
            min_file_size: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub aforos_endpoint: String,
    /// Station name / municipality keywords bounding the contributing
    /// basin of the estuary.
    pub basin_keywords: Vec<String>,
    /// River names kept when filtering the hydrographic network.
    pub river_keywords: Vec<String>,
    /// min_lon, min_lat, max_lon, max_lat of the study area.
    pub coverage_bbox: [f64; 4],
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            aforos_endpoint:
                "https://servizos.meteogalicia.gal/mgrss/observacion/ultimoAforos.action"
                    .to_string(),
            basin_keywords: ["Ulla", "Umia", "Sar", "Teo", "Padron", "Caldas", "Catoira", "Valga"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            river_keywords: ["ULLA", "UMIA", "SAR"].iter().map(|s| s.to_string()).collect(),
            coverage_bbox: [-9.0, 42.45, -8.0, 42.90],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    /// When set, pipelines also bundle their CSV + report into a zip.
    pub compress: bool,
    pub archive_name: String,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            compress: false,
            archive_name: "etl_outputs.zip".to_string(),
        }
    }
}

impl EtlConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EtlError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| EtlError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR_NAME}` placeholders with process environment
    /// values; unknown variables are left verbatim.
    fn substitute_env_vars(content: &str) -> String {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").expect("static pattern");

        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .to_string()
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_url("download.base_url", &self.download.base_url)?;
        validation::validate_url("sources.aforos_endpoint", &self.sources.aforos_endpoint)?;

        validation::validate_path(
            "paths.interim",
            self.paths.interim.to_str().unwrap_or_default(),
        )?;
        validation::validate_path(
            "paths.processed",
            self.paths.processed.to_str().unwrap_or_default(),
        )?;

        validation::validate_positive_number(
            "download.retry.max_attempts",
            self.download.retry.max_attempts as usize,
            1,
        )?;
        validation::validate_positive_number(
            "download.min_file_size",
            self.download.min_file_size as usize,
            1,
        )?;

        if let Some(end) = self.download.end_date {
            if self.download.start_date > end {
                return Err(EtlError::InvalidConfigValueError {
                    field: "download.start_date".to_string(),
                    value: self.download.start_date.to_string(),
                    reason: format!("start date is after end date {}", end),
                });
            }
        }

        validation::validate_bounds(
            "quality.ctd_salinity",
            self.quality.ctd_salinity[0],
            self.quality.ctd_salinity[1],
        )?;
        validation::validate_bounds(
            "quality.ctd_temperature",
            self.quality.ctd_temperature[0],
            self.quality.ctd_temperature[1],
        )?;
        validation::validate_bounds(
            "quality.mooring_salinity",
            self.quality.mooring_salinity[0],
            self.quality.mooring_salinity[1],
        )?;
        validation::validate_bounds(
            "quality.mooring_temperature",
            self.quality.mooring_temperature[0],
            self.quality.mooring_temperature[1],
        )?;

        let [min_lon, min_lat, max_lon, max_lat] = self.sources.coverage_bbox;
        if min_lon >= max_lon || min_lat >= max_lat {
            return Err(EtlError::InvalidConfigValueError {
                field: "sources.coverage_bbox".to_string(),
                value: format!("{:?}", self.sources.coverage_bbox),
                reason: "expected [min_lon, min_lat, max_lon, max_lat]".to_string(),
            });
        }

        Ok(())
    }

    /// Effective end of the download window.
    pub fn download_end_date(&self) -> NaiveDate {
        self.download
            .end_date
            .unwrap_or_else(|| chrono::Local::now().date_naive())
    }
}

impl Validate for EtlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_are_valid() {
        let config = EtlConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.download.min_file_size, 1000);
        assert_eq!(config.quality.max_depth_m, 500.0);
        assert!(config.sources.basin_keywords.contains(&"Umia".to_string()));
    }

    #[test]
    fn test_parse_partial_toml() {
        let toml_content = r#"
[pipeline]
name = "test-etl"
description = "Test"

[download]
start_date = "2022-01-01"
end_date = "2022-01-31"
min_file_size = 500

[quality]
max_depth_m = 100.0
"#;

        let config = EtlConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.pipeline.name, "test-etl");
        assert_eq!(
            config.download.start_date,
            NaiveDate::from_ymd_opt(2022, 1, 1).unwrap()
        );
        assert_eq!(config.download.min_file_size, 500);
        assert_eq!(config.quality.max_depth_m, 100.0);
        // Untouched sections keep their defaults.
        assert_eq!(config.quality.ctd_salinity, [0.0, 50.0]);
        assert!(config.download.base_url.contains("thredds"));
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("TEST_AROUSA_ENDPOINT", "https://test.api.com/aforos");

        let toml_content = r#"
[sources]
aforos_endpoint = "${TEST_AROUSA_ENDPOINT}"
"#;

        let config = EtlConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.sources.aforos_endpoint, "https://test.api.com/aforos");

        std::env::remove_var("TEST_AROUSA_ENDPOINT");
    }

    #[test]
    fn test_unknown_env_var_left_verbatim() {
        let substituted =
            EtlConfig::substitute_env_vars("endpoint = \"${DEFINITELY_NOT_SET_VAR}\"");
        assert_eq!(substituted, "endpoint = \"${DEFINITELY_NOT_SET_VAR}\"");
    }

    #[test]
    fn test_invalid_date_range_rejected() {
        let toml_content = r#"
[download]
start_date = "2022-12-31"
end_date = "2022-01-01"
"#;

        let config = EtlConfig::from_toml_str(toml_content).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_incoherent_quality_range_rejected() {
        let toml_content = r#"
[quality]
ctd_salinity = [50.0, 0.0]
"#;

        let config = EtlConfig::from_toml_str(toml_content).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();

        let toml_content = r#"
[pipeline]
name = "file-test"
description = "File test"
"#;

        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = EtlConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.pipeline.name, "file-test");
    }
}
