//! Downloading remote images into the local cache directory.

use std::env;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use chrono::Utc;
use log::info;
use reqwest::Url;

use crate::error::{Error, Result};

pub const CACHE_DIR_VAR: &str = "WALLPAPER_CACHE_DIR";

/// Fetches a URL into a directory and returns the local path.
pub trait Fetch {
    fn fetch(&self, url: &str, dir: &Path) -> Result<PathBuf>;
}

/// Blocking HTTP(S) download with reqwest.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpFetcher;

impl Fetch for HttpFetcher {
    fn fetch(&self, url: &str, dir: &Path) -> Result<PathBuf> {
        let parsed = Url::parse(url).map_err(|_| Error::InvalidUrl(url.to_string()))?;
        let target = dir.join(cache_file_name(&parsed));

        info!("Downloading {} to {}", url, target.display());

        let mut response = reqwest::blocking::get(parsed)?;
        if !response.status().is_success() {
            return Err(Error::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        fs::create_dir_all(dir)?;
        let mut file = File::create(&target)?;
        response.copy_to(&mut file)?;

        Ok(target)
    }
}

/// Last path segment of the URL, or a timestamped name when it has none.
///
/// Separators and drive markers are replaced so the name always joins as a
/// plain file inside the cache directory.
pub fn cache_file_name(url: &Url) -> String {
    url.path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(|name| name.replace(|c: char| c == ':' || c == '\\' || c == '/', "_"))
        .filter(|name| !name.trim_matches('.').is_empty())
        .unwrap_or_else(|| format!("wallpaper-{}.img", Utc::now().format("%Y%m%d%H%M%S")))
}

/// `WALLPAPER_CACHE_DIR`, else the user cache directory, else the temp dir.
///
/// Windows always uses the temp dir so the elevated relaunch, which may run
/// under another profile, can still read the file.
pub fn default_cache_dir() -> PathBuf {
    if let Some(dir) = env::var_os(CACHE_DIR_VAR) {
        return PathBuf::from(dir);
    }
    if cfg!(windows) {
        return env::temp_dir();
    }
    dirs::cache_dir()
        .map(|dir| dir.join("desktop-wallpaper"))
        .unwrap_or_else(env::temp_dir)
}
