use commsift::cache::fingerprint;
use commsift::cli::{Cli, Commands, ConfigAction};
use commsift::config::Config;
use commsift::error::{CommsiftError, Result};
use commsift::ingest::{detect, IngestionCoordinator, InputFile};
use commsift::logging::init_logging;
use commsift::runner::AnalysisRunner;
use serde::Serialize;
use std::path::{Path, PathBuf};

fn main() -> Result<()> {
    let cli = Cli::parse_args();

    let config_path = resolve_config_path(cli.config.clone())?;

    // Config commands must work even when the file on disk is broken
    let config = match &cli.command {
        Commands::Config { .. } => Config::default(),
        Commands::Analyze { profile, .. } => load_config(&config_path, profile.clone())?,
        _ => load_config(&config_path, None)?,
    };

    let data_dir = config.data_dir()?;
    let _guard = init_logging(&config.logging, &data_dir, cli.verbose)?;

    if !matches!(cli.command, Commands::Config { .. }) {
        if let Some(notice) = missing_config_notice(&config_path) {
            tracing::warn!("{}", notice);
        }
    }

    match cli.command {
        Commands::Analyze {
            files,
            case,
            no_cache,
            output,
            profile: _,
        } => {
            cmd_analyze(&config, &files, &case, !no_cache, output.as_deref())?;
        }
        Commands::Detect { files } => {
            cmd_detect(&files);
        }
        Commands::Ingest { files, output } => {
            cmd_ingest(&config, &files, output.as_deref())?;
        }
        Commands::Fingerprint { files } => {
            cmd_fingerprint(&config, &files)?;
        }
        Commands::Config { action } => {
            cmd_config(config_path, action)?;
        }
    }

    Ok(())
}

fn cmd_analyze(
    config: &Config,
    paths: &[PathBuf],
    case: &str,
    use_cache: bool,
    output: Option<&Path>,
) -> Result<()> {
    let files = read_files(paths)?;
    let runner = AnalysisRunner::from_config(config)?;
    let run = runner.analyze(case, &files, use_cache);

    if let Some(error) = run.analysis.error_message() {
        tracing::error!("Analysis of case {} failed: {}", case, error);
    }

    emit(&run, output)
}

fn cmd_detect(paths: &[PathBuf]) {
    for path in paths {
        let name = display_name(path);
        let kind = detect(&name);
        println!("{}\t{}\t{}", name, kind, kind.platform());
    }
}

fn cmd_ingest(config: &Config, paths: &[PathBuf], output: Option<&Path>) -> Result<()> {
    let files = read_files(paths)?;
    let grouped = IngestionCoordinator::new(&config.parsing).ingest(&files);
    emit(&grouped, output)
}

fn cmd_fingerprint(config: &Config, paths: &[PathBuf]) -> Result<()> {
    let files = read_files(paths)?;
    let (key, files_meta) = fingerprint(&files);

    let runner = AnalysisRunner::from_config(config)?;
    let cached = runner
        .cache()
        .map(|cache| cache.lookup(&key).is_some())
        .unwrap_or(false);

    emit(
        &serde_json::json!({
            "key": key,
            "files": files_meta,
            "cached": cached,
        }),
        None,
    )
}

fn cmd_config(config_path: PathBuf, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            if let Some(notice) = missing_config_notice(&config_path) {
                tracing::warn!("{}", notice);
            }
            let config = load_config(&config_path, None)?;
            let json = serde_json::to_string_pretty(&config).map_err(|e| CommsiftError::Json {
                source: e,
                context: "Failed to serialize config".to_string(),
            })?;
            println!("{}", json);
        }
        ConfigAction::Validate { file } => {
            let path = file.unwrap_or(config_path);
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
            println!("  Cache file: {}", config.cache_path()?.display());
        }
        ConfigAction::Init { force } => {
            if config_path.exists() && !force {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                println!("Use --force to overwrite");
                return Ok(());
            }

            Config::default().save(&config_path)?;
            println!("✓ Configuration initialized at: {}", config_path.display());
        }
    }

    Ok(())
}

fn resolve_config_path(config_path: Option<PathBuf>) -> Result<PathBuf> {
    match config_path {
        Some(path) => Ok(path),
        None => Config::default_path(),
    }
}

/// Warning text for a config path with no file behind it
fn missing_config_notice(path: &Path) -> Option<String> {
    if path.exists() {
        return None;
    }
    Some(format!(
        "Config file {} not found, using defaults. Run 'commsift config init' to create one.",
        path.display()
    ))
}

/// Load the config, or defaults when the file is missing
///
/// Runs before logging is installed; the caller reports a missing file afterwards.
fn load_config(path: &Path, profile: Option<String>) -> Result<Config> {
    let mut config = Config::load_or_default(path)?;

    if let Some(profile) = profile {
        config.apply_profile(&profile)?;
    }

    Ok(config)
}

fn read_files(paths: &[PathBuf]) -> Result<Vec<InputFile>> {
    paths.iter().map(|p| InputFile::from_path(p)).collect()
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn emit<T: Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(|e| CommsiftError::Json {
        source: e,
        context: "Failed to serialize output".to_string(),
    })?;

    match output {
        Some(path) => {
            std::fs::write(path, json).map_err(|e| CommsiftError::Io {
                source: e,
                context: format!("Failed to write output file: {:?}", path),
            })?;
            println!("✓ Wrote {}", path.display());
        }
        None => println!("{}", json),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_config_notice() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");

        let notice = missing_config_notice(&path).unwrap();
        assert!(notice.contains("not found"));
        assert!(notice.contains("config.toml"));

        Config::default().save(&path).unwrap();
        assert!(missing_config_notice(&path).is_none());
    }

    #[test]
    fn test_load_config_missing_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = load_config(&temp_dir.path().join("absent.toml"), None).unwrap();
        assert_eq!(config.storage.cache_file, "analysis_cache.json");
    }
}
