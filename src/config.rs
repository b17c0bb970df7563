use anyhow::{anyhow, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

/// Which shape of format catalog `/get-video-info` returns.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CatalogStyle {
    /// Full display catalog: resolution, size, bitrate, codecs, sorted by height.
    #[default]
    Full,
    /// Quality-label catalog: id, quality and container only, deduplicated.
    Simple,
}

/// How `/download` fulfills a request.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DownloadMode {
    /// Resolve and return a direct media URL; no bytes pass through us.
    #[default]
    DirectUrl,
    /// Download into a scratch directory and stream the file back.
    Materialize,
}

/// The structure of our configuration file (config.toml).
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    /// Cookie file handed to the extractor for authenticated sites, if any.
    pub cookie_file: Option<String>,
    pub catalog_style: CatalogStyle,
    pub download_mode: DownloadMode,
    /// HLS/m3u8 manifest formats are kept by default.
    pub include_hls_manifest: bool,
    /// DASH manifests are skipped by default.
    pub include_dash_manifest: bool,
    /// Format preference order handed to the extractor.
    pub format_sort: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            cookie_file: None,
            catalog_style: CatalogStyle::default(),
            download_mode: DownloadMode::default(),
            include_hls_manifest: true,
            include_dash_manifest: false,
            format_sort: ["res", "fps", "codec", "size", "br", "asr"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// Returns the cross-platform path to the configuration file, creating the
/// directory if needed.
async fn get_config_path() -> Result<PathBuf> {
    let project_dirs = ProjectDirs::from("com", "vidgrab", "vidgrab")
        .ok_or_else(|| anyhow!("Could not find a valid home directory to store config"))?;

    let config_dir = project_dirs.config_dir();
    fs::create_dir_all(config_dir).await?;

    Ok(config_dir.join("config.toml"))
}

/// Loads the configuration from the file, or creates a default one if it
/// doesn't exist.
pub async fn load_config() -> Result<Config> {
    let config_path = get_config_path().await?;

    if !config_path.exists() {
        tracing::info!(
            "No config file found. Creating a default one at: {}",
            config_path.display()
        );
        let default_config = Config::default();
        save_config(&default_config).await?;
        return Ok(default_config);
    }

    let config_content = fs::read_to_string(&config_path).await?;
    let config: Config = toml::from_str(&config_content)
        .map_err(|e| anyhow!("Failed to parse config file at {}: {}", config_path.display(), e))?;

    Ok(config)
}

/// Saves the provided configuration object to the file.
pub async fn save_config(config: &Config) -> Result<()> {
    let config_path = get_config_path().await?;
    let toml_string = toml::to_string_pretty(config)?;
    fs::write(config_path, toml_string).await?;
    Ok(())
}
