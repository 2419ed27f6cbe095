//! Package manifest resolution: turning the modpack descriptor into a complete
//! version manifest, fetching or repairing the embedded copy when needed.

pub mod serde;

use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::Path;

use crate::download::CancelToken;
use crate::http;
use crate::path::tmp_sibling;
use crate::sources::{self, Properties};


/// Resolve the version manifest of the given package manifest.
///
/// The embedded copy is used when present, otherwise the release list is searched
/// for the target game version and the per-version document is fetched. An embedded
/// copy with an empty downloads mapping (written by old launchers) is repaired by
/// copying the downloads and asset index from a freshly fetched document, keeping
/// every other field untouched, the library list in particular. The resolved
/// manifest is finally written atomically to the given version file.
pub fn resolve(
    package: &serde::PackageManifest,
    props: &dyn Properties,
    version_file: &Path,
    cancel: &CancelToken,
) -> Result<serde::VersionManifest> {

    let mut manifest = match &package.version_manifest {
        Some(manifest) => manifest.clone(),
        None => fetch_for_game_version(&package.game_version, props, cancel)?,
    };

    if manifest.downloads.is_empty() {
        let fresh = fetch_for_game_version(&package.game_version, props, cancel)?;
        manifest.downloads = fresh.downloads;
        manifest.asset_index = fresh.asset_index;
    }

    write_manifest(&manifest, version_file)?;

    Ok(manifest)

}

/// Fetch the release list, trying every configured source in order.
pub fn fetch_release_list(props: &dyn Properties, cancel: &CancelToken) -> Result<serde::ReleaseList> {
    let list_sources = sources::source_list(props,
        sources::VERSION_MANIFEST_URL,
        Some(sources::CUSTOM_VERSION_MANIFEST_URL),
        str::to_string);
    fetch_json_fallback(&list_sources, sources::VERSION_MANIFEST_URL, cancel)
}

/// Fetch the version manifest of the given game version by searching the release
/// list for a matching entry and then requesting the per-version document.
pub fn fetch_for_game_version(
    game_version: &str,
    props: &dyn Properties,
    cancel: &CancelToken,
) -> Result<serde::VersionManifest> {

    let releases = fetch_release_list(props, cancel)?;

    let entry = releases.versions.iter()
        .find(|entry| entry.id == game_version)
        .ok_or_else(|| Error::ManifestNotFound { game_version: game_version.to_string() })?;

    let version_sources = version_sources(&entry.download.url, game_version, props);
    fetch_json_fallback(&version_sources, sources::CUSTOM_VERSIONS_SOURCE, cancel)

}

/// Build the source list of the per-version JSON document, the primary being the
/// URL carried by the matched release entry and the custom origin deriving from
/// `customVersionsSource` with a `<gameVersion>.json` suffix.
pub fn version_sources(entry_url: &str, game_version: &str, props: &dyn Properties) -> Vec<Box<str>> {
    sources::source_list_with(props,
        Some(entry_url),
        Some(sources::CUSTOM_VERSIONS_SOURCE),
        |base| sources::suffix_join(base, &format!("{game_version}.json")))
}

/// Fetch and deserialize a JSON document from the first source that answers, the
/// last observed error is propagated when every source failed.
pub(crate) fn fetch_json_fallback<T: ::serde::de::DeserializeOwned>(
    source_list: &[Box<str>],
    key: &str,
    cancel: &CancelToken,
) -> Result<T> {

    if source_list.is_empty() {
        return Err(Error::NoSources { key: key.into() });
    }

    let client = http::client()?;

    http::block_on(async {

        let mut last_error = None;
        for url in source_list {
            match http::get_json(&client, url, cancel).await {
                Ok(value) => return Ok(value),
                Err(error @ http::Error::Cancelled) => return Err(Error::Http(error)),
                Err(error) => last_error = Some(error),
            }
        }

        // Safe because the source list is not empty.
        Err(Error::Http(last_error.unwrap()))

    })

}

/// Same as [`fetch_json_fallback`] but keeping the raw body, used by the mirror
/// builder which republishes the documents as fetched.
pub(crate) fn fetch_bytes_fallback(
    source_list: &[Box<str>],
    key: &str,
    cancel: &CancelToken,
) -> Result<Vec<u8>> {

    if source_list.is_empty() {
        return Err(Error::NoSources { key: key.into() });
    }

    let client = http::client()?;

    http::block_on(async {

        let mut last_error = None;
        for url in source_list {
            match http::get_bytes(&client, url, cancel).await {
                Ok(body) => return Ok(body),
                Err(error @ http::Error::Cancelled) => return Err(Error::Http(error)),
                Err(error) => last_error = Some(error),
            }
        }

        Err(Error::Http(last_error.unwrap()))

    })

}

/// Write the resolved manifest as pretty JSON, atomically: the document goes to a
/// sibling temporary file that is renamed over the target on success.
pub fn write_manifest(manifest: &serde::VersionManifest, file: &Path) -> Result<()> {

    if let Some(parent) = file.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| Error::new_io_file(e, parent.to_path_buf()))?;
    }

    let tmp_file = tmp_sibling(file);
    let writer = File::create(&tmp_file)
        .map_err(|e| Error::new_io_file(e, tmp_file.clone()))
        .map(BufWriter::new)?;

    if let Err(e) = serde_json::to_writer_pretty(writer, manifest) {
        let _ = fs::remove_file(&tmp_file);
        return Err(Error::new_io_file(io::Error::from(e), tmp_file));
    }

    fs::rename(&tmp_file, file)
        .map_err(|e| Error::new_io_file(e, file.to_path_buf()))

}

/// The resolution of a package manifest failed.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// No release entry matches the requested game version.
    #[error("manifest not found: {game_version}")]
    ManifestNotFound {
        game_version: String,
    },
    /// The source list built for the given property key is empty.
    #[error("no sources: {key}")]
    NoSources {
        key: Box<str>,
    },
    /// The last error observed after trying every source.
    #[error("http: {0}")]
    Http(#[from] http::Error),
    /// A standalone reqwest error, the client could not be initialized.
    #[error("reqwest: {error}")]
    Reqwest {
        #[from]
        error: reqwest::Error,
    },
    /// A generic system's IO error with optional file source.
    #[error("io: {error} @ {file:?}")]
    Io {
        #[source]
        error: io::Error,
        file: Option<Box<Path>>,
    },
}

/// Type alias for a result with the manifest error type.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {

    #[inline]
    pub fn new_io_file(error: io::Error, file: impl Into<Box<Path>>) -> Self {
        Self::Io { error, file: Some(file.into()) }
    }

    /// Stable key for the locale collaborator to map this error to a user-facing
    /// message, distinct from the technical cause.
    pub fn locale_key(&self) -> &'static str {
        match self {
            Error::ManifestNotFound { .. } => "error.manifest.not_found",
            Error::NoSources { .. } => "error.manifest.no_sources",
            Error::Http(e) => e.locale_key(),
            Error::Reqwest { .. } => "error.http.network",
            Error::Io { .. } => "error.io",
        }
    }

}
