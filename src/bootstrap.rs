//! Locating the page the content surface boots from
//!
//! The bundled bootstrap page is copied into a writable cache directory so
//! the surface can load sibling resources from there. If staging fails the
//! surface is pointed at the bundled copy directly.

use crate::content::Platform;
use crate::error::{MailframeError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use url::Url;

pub const STAGED_FILE_NAME: &str = "messageBody.html";

/// Android packs the page as a raw resource instead of a plain file
pub const ANDROID_RESOURCE_URI: &str = "file:///android_res/raw/mailframe_index.html";

pub trait DocumentStager {
    /// Stage the page and return the URI to load it from
    fn stage(&self) -> Result<String>;

    /// Where the unstaged page ships
    fn bundled_path(&self) -> &Path;
}

/// Copies the bundled page into a cache directory
#[derive(Debug, Clone)]
pub struct FsStager {
    source: PathBuf,
    cache_dir: PathBuf,
}

impl FsStager {
    pub fn new(source: impl Into<PathBuf>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            cache_dir: cache_dir.into(),
        }
    }

    pub fn target_path(&self) -> PathBuf {
        self.cache_dir.join(STAGED_FILE_NAME)
    }
}

fn file_uri(path: &Path) -> Result<String> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    Url::from_file_path(&absolute)
        .map(|url| url.to_string())
        .map_err(|_| MailframeError::config(format!("{} cannot be expressed as a file URI", absolute.display())))
}

impl DocumentStager for FsStager {
    fn stage(&self) -> Result<String> {
        let target = self.target_path();
        if target.exists() {
            fs::remove_file(&target)?;
        }
        fs::copy(&self.source, &target)?;
        debug!("Staged {} to {}", self.source.display(), target.display());
        file_uri(&target)
    }

    fn bundled_path(&self) -> &Path {
        &self.source
    }
}

/// URI used when staging is not possible
pub fn fallback_uri(platform: Platform, bundled: &Path) -> String {
    match platform {
        Platform::Android => ANDROID_RESOURCE_URI.to_string(),
        _ => file_uri(bundled).unwrap_or_else(|_| "about:blank".to_string()),
    }
}

/// Stage the bootstrap page, falling back to the platform default on failure
pub fn resolve_document_uri(stager: &dyn DocumentStager, platform: Platform) -> String {
    match stager.stage() {
        Ok(uri) => uri,
        Err(e) => {
            let fallback = fallback_uri(platform, stager.bundled_path());
            warn!("Staging bootstrap page failed ({}), loading {}", e, fallback);
            fallback
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_stage_replaces_previous_copy() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("index.html");
        fs::write(&source, "<html>v2</html>").unwrap();
        let cache = dir.path().join("cache");
        fs::create_dir(&cache).unwrap();
        fs::write(cache.join(STAGED_FILE_NAME), "<html>v1</html>").unwrap();

        let stager = FsStager::new(&source, &cache);
        let uri = resolve_document_uri(&stager, Platform::Ios);
        assert!(uri.starts_with("file://"));
        assert!(uri.ends_with("/cache/messageBody.html"));
        assert_eq!(fs::read_to_string(stager.target_path()).unwrap(), "<html>v2</html>");
    }

    #[test]
    fn test_missing_source_falls_back_per_platform() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("missing.html");
        let stager = FsStager::new(&source, dir.path());

        assert_eq!(resolve_document_uri(&stager, Platform::Android), ANDROID_RESOURCE_URI);
        let ios = resolve_document_uri(&stager, Platform::Ios);
        assert!(ios.starts_with("file://"));
        assert!(ios.ends_with("/missing.html"));
    }
}
