use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub(crate) enum HttpError {
    #[error("HTTP status {status}{detail}")]
    Status { status: u16, detail: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("i/o error")]
    Io(#[from] io::Error),
}

/// Blocking HTTP client shared by the feed fetch and the episode downloads.
pub(crate) struct HttpClient {
    agent: ureq::Agent,
}

impl HttpClient {
    pub(crate) fn new(connect_timeout: Duration, read_timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(connect_timeout)
            .timeout_read(read_timeout)
            .timeout_write(read_timeout)
            .build();
        Self { agent }
    }

    fn get(&self, url: &str) -> Result<ureq::Response, HttpError> {
        debug!(url, "GET");
        match self.agent.get(url).call() {
            Ok(response) => Ok(response),
            Err(ureq::Error::Status(status, response)) => {
                let response_body = response.into_string().ok().unwrap_or_default();
                Err(HttpError::Status {
                    status,
                    detail: status_detail(&response_body),
                })
            }
            Err(ureq::Error::Transport(err)) => Err(HttpError::Transport(err.to_string())),
        }
    }

    pub(crate) fn get_bytes(&self, url: &str) -> Result<Vec<u8>, HttpError> {
        let response = self.get(url)?;
        let mut body = Vec::new();
        io::copy(&mut response.into_reader(), &mut body)?;
        Ok(body)
    }

    /// Streams `url` into `dest`. The body lands in a `.part` sibling first and
    /// only takes the final name once complete; a failed transfer leaves
    /// nothing behind.
    pub(crate) fn download_to(&self, url: &str, dest: &Path) -> Result<u64, HttpError> {
        let response = self.get(url)?;
        let staging = part_path(dest);
        let result = write_body(response, &staging).and_then(|written| {
            fs::rename(&staging, dest)?;
            Ok(written)
        });
        if result.is_err() {
            let _ = fs::remove_file(&staging);
        }
        result
    }
}

fn write_body(response: ureq::Response, staging: &Path) -> Result<u64, HttpError> {
    let mut file = BufWriter::new(File::create(staging)?);
    let written = io::copy(&mut response.into_reader(), &mut file)?;
    file.flush()?;
    Ok(written)
}

fn part_path(dest: &Path) -> PathBuf {
    let mut staging = dest.as_os_str().to_owned();
    staging.push(".part");
    PathBuf::from(staging)
}

fn status_detail(body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        String::new()
    } else {
        let truncated = body.chars().take(240).collect::<String>();
        format!(" ({truncated})")
    }
}
