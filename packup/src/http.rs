//! This module provides various HTTP(S) request utilities, everything is based on
//! async reqwest with tokio.

use std::future::Future;
use std::time::Duration;

use once_cell::sync::OnceCell;
use reqwest::{Client, ClientBuilder, StatusCode};

use crate::download::CancelToken;


/// The user agent to be used on each HTTP request.
pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Connection timeout applied to each attempt, a task's overall wall clock is only
/// bounded by the length of its source list.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout between two reads of the body of an in-flight transfer.
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Get a new client builder for async HTTP(S) requests.
pub fn builder() -> ClientBuilder {
    Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(CONNECT_TIMEOUT)
        .read_timeout(READ_TIMEOUT)
}

/// Return the singleton instance for the HTTP client used internally by packup.
pub fn client() -> reqwest::Result<Client> {
    static INSTANCE: OnceCell<Client> = OnceCell::new();
    let inst = INSTANCE.get_or_try_init(|| {
        builder().build()
    })?;
    Ok(inst.clone())
}

/// Run the given future to completion on a fresh single-threaded runtime. The
/// crate exposes a blocking API, every async section funnels through here, so
/// callers must not already be inside a Tokio runtime.
pub(crate) fn block_on<F: Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("building the blocking runtime cannot fail")
        .block_on(future)
}

/// An error while requesting a remote document.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// A transport-level error, such as connection or read failure.
    #[error("network: {error} @ {url}")]
    Network {
        #[source]
        error: reqwest::Error,
        url: Box<str>,
    },
    /// The server answered with an unexpected status code.
    #[error("status: {code} @ {url}")]
    Status {
        code: u16,
        url: Box<str>,
    },
    /// The body could not be decoded into the expected JSON schema.
    #[error("json: {error} @ {url}")]
    Json {
        #[source]
        error: serde_path_to_error::Error<serde_json::Error>,
        url: Box<str>,
    },
    /// The transfer has been aborted by a cancellation request.
    #[error("cancelled")]
    Cancelled,
}

impl Error {

    /// Stable key for the locale collaborator to map this error to a user-facing
    /// message, distinct from the technical cause.
    pub fn locale_key(&self) -> &'static str {
        match self {
            Error::Network { .. } => "error.http.network",
            Error::Status { .. } => "error.http.status",
            Error::Json { .. } => "error.http.json",
            Error::Cancelled => "error.cancelled",
        }
    }

}

/// Type alias for a result with the HTTP error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Request the full body of the document at the given URL, expecting a 200 status
/// code. The transfer is aborted between two chunks if cancellation is requested.
pub(crate) async fn get_bytes(client: &Client, url: &str, cancel: &CancelToken) -> Result<Vec<u8>> {

    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    let mut res = client.get(url).send().await
        .map_err(|error| Error::Network { error, url: url.into() })?;

    if res.status() != StatusCode::OK {
        return Err(Error::Status { code: res.status().as_u16(), url: url.into() });
    }

    let mut body = Vec::new();
    while let Some(chunk) = res.chunk().await.map_err(|error| Error::Network { error, url: url.into() })? {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        body.extend_from_slice(&chunk);
    }

    Ok(body)

}

/// Request and deserialize the JSON document at the given URL, expecting a 200 status.
pub(crate) async fn get_json<T: serde::de::DeserializeOwned>(client: &Client, url: &str, cancel: &CancelToken) -> Result<T> {
    let body = get_bytes(client, url, cancel).await?;
    let mut deserializer = serde_json::Deserializer::from_slice(&body);
    serde_path_to_error::deserialize(&mut deserializer)
        .map_err(|error| Error::Json { error, url: url.into() })
}
