//! Remote dictionary download.

use crate::import::{ImportError, ImportResult, ImportSource};
use log::{error, info};
use std::time::{Duration, Instant};

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);

/// Downloads a dictionary ZIP and returns it as an in-memory source.
///
/// The archive is not validated here; pass the result to
/// [`crate::import::import_dictionary`].
pub async fn fetch_remote(url: &str) -> ImportResult<ImportSource> {
    let started_at = Instant::now();
    info!("event=dictionary_download module=import status=start");

    let client = reqwest::Client::builder()
        .timeout(DOWNLOAD_TIMEOUT)
        .build()?;
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        error!(
            "event=dictionary_download module=import status=error duration_ms={} http_status={}",
            started_at.elapsed().as_millis(),
            status.as_u16()
        );
        return Err(ImportError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let bytes = response.bytes().await?.to_vec();
    info!(
        "event=dictionary_download module=import status=ok duration_ms={} bytes={}",
        started_at.elapsed().as_millis(),
        bytes.len()
    );

    Ok(ImportSource::ZipBytes {
        label: format!("remote:{url}"),
        bytes,
    })
}
