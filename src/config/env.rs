use crate::config::toml_config::EtlConfig;
use crate::domain::model::EnvReport;
use crate::utils::error::Result;

/// One-time environment bootstrap. Must run before any pipeline touches
/// the database or external services.
///
/// Loads secrets from a `.env` file (explicit path, else searched upward
/// from the working directory) and exports the `[environment]` table of
/// the TOML config into the process. Variables already present in the
/// process environment always win over file values, and a missing env
/// file is a warning, never a failure.
pub fn init_environment(config: &EtlConfig) -> Result<EnvReport> {
    let env_file = match &config.paths.env_file {
        Some(path) => match dotenvy::from_path(path) {
            Ok(()) => Some(path.clone()),
            Err(e) => {
                tracing::warn!("⚠️ Could not load env file {}: {}", path.display(), e);
                None
            }
        },
        None => match dotenvy::dotenv() {
            Ok(found) => Some(found),
            Err(_) => None,
        },
    };

    match &env_file {
        Some(path) => tracing::info!("✅ Environment variables loaded from {}", path.display()),
        None => tracing::warn!("⚠️ No .env file found; relying on the process environment"),
    }

    let mut applied_overrides = 0;
    if let Some(vars) = &config.environment {
        for (key, value) in vars {
            std::env::set_var(key, value);
            applied_overrides += 1;
        }
        if applied_overrides > 0 {
            tracing::info!(
                "✅ Applied {} environment override(s) from configuration",
                applied_overrides
            );
        }
    }

    Ok(EnvReport {
        env_file,
        applied_overrides,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_missing_env_file_is_not_fatal() {
        let mut config = EtlConfig::default();
        config.paths.env_file = Some("/definitely/not/here/.env".into());

        let report = init_environment(&config).unwrap();
        assert!(report.env_file.is_none());
    }

    #[test]
    fn test_config_environment_table_is_exported() {
        let mut config = EtlConfig::default();
        let mut vars = HashMap::new();
        vars.insert("AROUSA_TEST_OVERRIDE".to_string(), "on".to_string());
        config.environment = Some(vars);

        let report = init_environment(&config).unwrap();

        assert_eq!(report.applied_overrides, 1);
        assert_eq!(std::env::var("AROUSA_TEST_OVERRIDE").unwrap(), "on");
        std::env::remove_var("AROUSA_TEST_OVERRIDE");
    }

    #[test]
    fn test_existing_process_variables_win_over_env_file() {
        std::env::set_var("AROUSA_PRESET_VAR", "process");

        let dir = tempfile::tempdir().unwrap();
        let env_path = dir.path().join(".env");
        let mut file = std::fs::File::create(&env_path).unwrap();
        writeln!(file, "AROUSA_PRESET_VAR=file").unwrap();
        writeln!(file, "AROUSA_FILE_ONLY_VAR=file").unwrap();

        let mut config = EtlConfig::default();
        config.paths.env_file = Some(env_path.clone());

        let report = init_environment(&config).unwrap();

        assert_eq!(report.env_file, Some(env_path));
        assert_eq!(std::env::var("AROUSA_PRESET_VAR").unwrap(), "process");
        assert_eq!(std::env::var("AROUSA_FILE_ONLY_VAR").unwrap(), "file");

        std::env::remove_var("AROUSA_PRESET_VAR");
        std::env::remove_var("AROUSA_FILE_ONLY_VAR");
    }
}
