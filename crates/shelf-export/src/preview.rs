//! Upload of a zipped site to a preview service.

use std::time::Duration;

use ureq::Agent;

use crate::ExportError;

/// POST `archive` to `upload_url` and return the preview URL the service
/// answers with.
///
/// Blocking; call from `spawn_blocking` inside a runtime.
pub fn upload_preview(upload_url: &str, archive: &[u8]) -> Result<String, ExportError> {
    let agent: Agent = Agent::config_builder()
        .timeout_global(Some(Duration::from_secs(120)))
        .http_status_as_error(false)
        .build()
        .into();

    tracing::info!(url = upload_url, bytes = archive.len(), "Uploading preview");
    let response = agent
        .post(upload_url)
        .header("Content-Type", "application/zip")
        .send(archive)?;

    let status = response.status().as_u16();
    let mut body = response.into_body();

    if status >= 400 {
        let error_body = body
            .read_to_string()
            .unwrap_or_else(|_| "(unable to read error body)".to_owned());
        return Err(ExportError::Upload {
            status,
            body: error_body,
        });
    }

    let url = body.read_to_string()?.trim().to_owned();
    if url.is_empty() {
        return Err(ExportError::Upload {
            status,
            body: "empty response".to_owned(),
        });
    }
    Ok(url)
}
