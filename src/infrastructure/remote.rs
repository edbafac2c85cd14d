use std::time::Duration;

use reqwest::{Client, StatusCode, Url};

use crate::domain::errors::RemoteError;

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        RemoteError::Transport(e.to_string())
    }
}

/// Shared client for one remote service; `timeout` bounds every request.
pub fn build_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder().timeout(timeout).build()
}

/// Appends `segments` to `base_url`, each percent-encoded as exactly one path
/// segment. An identifier that cannot stand alone as a segment (empty, `.` or
/// `..`) names no remote resource.
pub(crate) fn segment_url(base_url: &str, segments: &[&str]) -> Result<Url, RemoteError> {
    if segments
        .iter()
        .any(|segment| matches!(*segment, "" | "." | ".."))
    {
        return Err(RemoteError::NotFound);
    }
    let mut url = Url::parse(base_url)
        .map_err(|e| RemoteError::Transport(format!("invalid base url '{base_url}': {e}")))?;
    url.path_segments_mut()
        .map_err(|_| RemoteError::Transport(format!("base url '{base_url}' cannot carry a path")))?
        .pop_if_empty()
        .extend(segments);
    url.set_query(None);
    Ok(url)
}

/// Maps a non-success status that carries no extra payload.
pub(crate) fn status_error(status: StatusCode, body: &str) -> RemoteError {
    match status {
        StatusCode::NOT_FOUND => RemoteError::NotFound,
        other => RemoteError::Transport(format!("unexpected status {other}: {body}")),
    }
}
