use crate::config::toml_config::EtlConfig;
use crate::domain::model::DownloadStats;
use crate::utils::error::{EtlError, Result};
use crate::utils::retry::retry_with_backoff;
use chrono::NaiveDate;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Bulk downloader for the daily precipitation grids published on the
/// THREDDS server. Idempotent: re-runs skip files that are already on
/// disk and intact, and replace truncated or corrupt ones.
pub struct BulkDownloader {
    config: EtlConfig,
    client: Client,
    cancel: Arc<AtomicBool>,
}

impl BulkDownloader {
    pub fn new(config: EtlConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.download.timeout_secs))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            config,
            client,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Shared flag; setting it stops the run after the in-flight date.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    /// OPeNDAP dataset URL for one day.
    fn dataset_url(&self, date: NaiveDate) -> String {
        let date_str = date.format("%Y%m%d");
        format!(
            "{}/{}/wrf_arw_det_history_d02_{}_0000.nc4",
            self.config.download.base_url, date_str, date_str
        )
    }

    /// The same dataset over plain HTTP, for HEAD probes and the actual
    /// byte transfer.
    fn file_url(url: &str) -> String {
        url.replace("dodsC", "fileServer")
    }

    fn target_path(&self, date: NaiveDate) -> PathBuf {
        self.config
            .download
            .output_dir
            .join(date.format("%Y").to_string())
            .join(format!("WRF_1km_prec_{}.nc", date.format("%Y%m%d")))
    }

    /// NetCDF files start with the classic `CDF` magic or, for
    /// NetCDF-4, the HDF5 signature.
    pub fn is_netcdf_magic(prefix: &[u8]) -> bool {
        prefix.starts_with(b"CDF\x01")
            || prefix.starts_with(b"CDF\x02")
            || prefix.starts_with(&[0x89, b'H', b'D', b'F'])
    }

    /// A file on disk is reusable when it is big enough and carries a
    /// NetCDF signature.
    fn validate_local_file(&self, path: &Path) -> bool {
        let Ok(metadata) = std::fs::metadata(path) else {
            return false;
        };
        if metadata.len() <= self.config.download.min_file_size {
            return false;
        }

        let mut prefix = [0u8; 8];
        match std::fs::File::open(path).and_then(|mut f| f.read(&mut prefix)) {
            Ok(n) if n >= 4 => Self::is_netcdf_magic(&prefix[..n]),
            _ => false,
        }
    }

    /// HEAD probe. `Some(true)` = present, `Some(false)` = 404,
    /// `None` = transient trouble worth counting as an error.
    async fn check_remote_exists(&self, url: &str) -> Option<bool> {
        let probe = Self::file_url(url);

        match self.client.head(&probe).send().await {
            Ok(response) => match response.status().as_u16() {
                404 => Some(false),
                200 => Some(true),
                status => {
                    tracing::warn!("Status {} probing {}", status, probe);
                    None
                }
            },
            Err(e) => {
                tracing::warn!("Connection error probing {}: {}", probe, e);
                None
            }
        }
    }

    /// Fetches one day and writes it to `path`. Partial files never
    /// survive a failure.
    async fn download_file(&self, url: &str, path: &Path) -> Result<()> {
        let file_url = Self::file_url(url);

        let result: Result<()> = async {
            let response = self.client.get(&file_url).send().await?;
            let bytes = response.error_for_status()?.bytes().await?;

            if bytes.len() as u64 <= self.config.download.min_file_size {
                return Err(EtlError::processing(format!(
                    "Truncated response ({} bytes) from {}",
                    bytes.len(),
                    file_url
                )));
            }
            if !Self::is_netcdf_magic(&bytes) {
                return Err(EtlError::processing(format!(
                    "Response from {} is not a NetCDF file",
                    file_url
                )));
            }

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, &bytes)?;

            tracing::info!(
                "Downloaded: {} ({:.1} KB)",
                path.file_name().unwrap_or_default().to_string_lossy(),
                bytes.len() as f64 / 1024.0
            );
            Ok(())
        }
        .await;

        if result.is_err() && path.exists() {
            let _ = std::fs::remove_file(path);
            tracing::debug!("Removed partial file {}", path.display());
        }

        result
    }

    pub async fn run(&self, start: NaiveDate, end: NaiveDate) -> Result<DownloadStats> {
        if start > end {
            return Err(EtlError::InvalidConfigValueError {
                field: "download.start_date".to_string(),
                value: start.to_string(),
                reason: format!("start date is after end date {}", end),
            });
        }

        let dates: Vec<NaiveDate> = start.iter_days().take_while(|d| *d <= end).collect();

        tracing::info!("Starting bulk download: {} to {} ({} days)", start, end, dates.len());
        tracing::info!("Destination: {}", self.config.download.output_dir.display());

        // Stop after the in-flight date on Ctrl-C; stats still get
        // reported.
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received; finishing current file...");
                cancel.store(true, Ordering::SeqCst);
            }
        });

        let progress = ProgressBar::new(dates.len() as u64);
        progress.set_style(
            ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );

        let mut stats = DownloadStats::default();
        let pacing = Duration::from_secs_f64(self.config.download.request_delay_secs);

        for date in dates {
            if self.cancel.load(Ordering::SeqCst) {
                tracing::warn!("Download interrupted by user");
                break;
            }

            progress.set_message(date.format("%Y%m%d").to_string());
            let path = self.target_path(date);

            if path.exists() {
                if self.validate_local_file(&path) {
                    stats.already_valid += 1;
                    tracing::debug!("Skipping {} (already valid)", date);
                    progress.inc(1);
                    continue;
                }
                tracing::warn!("Invalid local file detected: {}", path.display());
                let _ = std::fs::remove_file(&path);
                stats.repaired += 1;
            }

            let url = self.dataset_url(date);
            match self.check_remote_exists(&url).await {
                Some(false) => {
                    tracing::debug!("{}: not published (404)", date);
                    stats.unavailable += 1;
                    progress.inc(1);
                    continue;
                }
                None => {
                    stats.errors += 1;
                    progress.inc(1);
                    continue;
                }
                Some(true) => {}
            }

            let attempt = retry_with_backoff(&self.config.download.retry, || {
                self.download_file(&url, &path)
            })
            .await;

            match attempt {
                Ok(()) => stats.downloaded += 1,
                Err(e) => {
                    tracing::error!("{}: download failed: {}", date, e);
                    stats.errors += 1;
                }
            }

            progress.inc(1);
            tokio::time::sleep(pacing).await;
        }

        progress.finish_and_clear();
        tracing::info!("Download summary: {}", stats.summary());
        Ok(stats)
    }
}
