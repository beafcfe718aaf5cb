//! FieldSense Raster - Raster engine port and adapters
//!
//! This crate defines the `RasterEngine` port the analysis pipeline talks to,
//! along with an in-process engine over pixel grids and an HTTP client for a
//! remote engine.

pub mod local;
pub mod ports;
pub mod remote;
pub mod spatial;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use fieldsense_core::error::{FieldsenseError, Result};

pub use local::{GridSpec, LocalRasterEngine, Raster, RasterBand, Scene};
pub use ports::RasterEngine;
pub use remote::HttpRasterEngine;

/// Build the engine named by `engine_url`.
///
/// * `None` gives an empty in-process engine
/// * `file://<path>` gives an in-process engine over a JSON scene catalog
/// * `http://` / `https://` gives a remote engine client
pub fn connect(engine_url: Option<&str>, timeout: Duration) -> Result<Arc<dyn RasterEngine>> {
    match engine_url {
        None => Ok(Arc::new(LocalRasterEngine::new())),
        Some(url) if url.starts_with("http://") || url.starts_with("https://") => {
            Ok(Arc::new(HttpRasterEngine::new(url, timeout)?))
        }
        Some(url) => match url.strip_prefix("file://") {
            Some(path) => Ok(Arc::new(LocalRasterEngine::from_catalog_file(PathBuf::from(path))?)),
            None => Err(FieldsenseError::ConfigInvalid {
                key: "engine_url".to_string(),
                reason: format!(
                    "unsupported engine url '{}': expected http(s):// or file://",
                    url
                ),
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_defaults_to_local() {
        let engine = connect(None, Duration::from_secs(5)).unwrap();
        assert_eq!(engine.name(), "local");
    }

    #[test]
    fn test_connect_http() {
        let engine = connect(Some("http://engine.internal:8080"), Duration::from_secs(5)).unwrap();
        assert_eq!(engine.name(), "http");
    }

    #[test]
    fn test_connect_rejects_unknown_scheme() {
        assert!(connect(Some("ftp://engine"), Duration::from_secs(5)).is_err());
    }
}
