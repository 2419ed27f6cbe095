//! Batch mirror builder: walks the same dependency graph as the updater to
//! populate a local mirror tree from the real (primary) origins.
//!
//! Layout of the output directory: `version_manifest.json`, `versions/<id>.json`,
//! `versions/<id>-client.jar`, `libraries/<artifact.path>`,
//! `indexes/<assetId>.json` and `assets/<hash[0:2]>/<hash>`.

use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::Path;
use std::time::Duration;

use indexmap::IndexSet;

use crate::download::{self, Batch, CancelToken, Pool, Role};
use crate::install::applicable_artifacts;
use crate::manifest::{self, serde::{AssetIndex, VersionManifest}};
use crate::path::tmp_sibling;
use crate::sources::{self, Properties};


/// Fixed worker pool size of the mirror builder.
const MIRROR_CONCURRENCY: usize = 8;

/// Per-worker inter-request delay of the mirror builder, applied at issue time.
const MIRROR_DELAY: Duration = Duration::from_millis(50);

/// Explicit context owning the worker pool, the deduplication set and the
/// cancellation token shared by every version mirrored through it.
#[derive(Debug, Clone)]
pub struct MirrorContext {
    pool: Pool,
}

impl Default for MirrorContext {
    fn default() -> Self {
        Self::new()
    }
}

impl MirrorContext {

    pub fn new() -> Self {
        Self {
            pool: Pool::new(MIRROR_CONCURRENCY).with_delay(MIRROR_DELAY),
        }
    }

    #[inline]
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.pool = self.pool.with_cancel(cancel);
        self
    }

    #[inline]
    pub fn cancel_token(&self) -> &CancelToken {
        self.pool.cancel_token()
    }

}

/// Build a mirror of the given version ids into the output directory.
///
/// The release list is fetched once and its failure is fatal, every other
/// individual failure (missing version, unreachable artifact) is logged and the
/// mirror continues.
pub fn build(
    ctx: &MirrorContext,
    props: &dyn Properties,
    version_ids: &[String],
    output: &Path,
    mut handler: impl download::Handler,
) -> Result<()> {

    let cancel = ctx.pool.cancel_token().clone();

    let list_sources = sources::source_list(props,
        sources::VERSION_MANIFEST_URL,
        Some(sources::CUSTOM_VERSION_MANIFEST_URL),
        str::to_string);

    let list_body = manifest::fetch_bytes_fallback(&list_sources, sources::VERSION_MANIFEST_URL, &cancel)?;

    let mut deserializer = serde_json::Deserializer::from_slice(&list_body);
    let releases: manifest::serde::ReleaseList = serde_path_to_error::deserialize(&mut deserializer)
        .map_err(|error| Error::Json { error })?;

    write_atomic(&output.join("version_manifest.json"), &list_body)?;

    for id in version_ids {

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let Some(entry) = releases.versions.iter().find(|entry| &entry.id == id) else {
            log::error!("version not found in release list: {id}");
            continue;
        };

        let version_sources = manifest::version_sources(&entry.download.url, id, props);
        let version_body = match manifest::fetch_bytes_fallback(&version_sources, sources::CUSTOM_VERSIONS_SOURCE, &cancel) {
            Ok(body) => body,
            Err(e) => {
                if cancel.is_cancelled() {
                    return Err(Error::Cancelled);
                }
                log::error!("failed to fetch version document of {id}: {e}");
                continue;
            }
        };

        let mut deserializer = serde_json::Deserializer::from_slice(&version_body);
        let version_manifest: VersionManifest = match serde_path_to_error::deserialize(&mut deserializer) {
            Ok(obj) => obj,
            Err(e) => {
                log::error!("invalid version document of {id}: {e}");
                continue;
            }
        };

        write_atomic(&output.join("versions").join(format!("{id}.json")), &version_body)?;

        build_version(ctx, props, &version_manifest, output, &mut handler)?;

    }

    Ok(())

}

/// Mirror the content of a single resolved version: client JAR, libraries, asset
/// index and asset objects, every source being the real (primary) origin.
fn build_version(
    ctx: &MirrorContext,
    props: &dyn Properties,
    version_manifest: &VersionManifest,
    output: &Path,
    handler: &mut dyn download::Handler,
) -> Result<()> {

    let id = &version_manifest.id;
    let mut batch = Batch::new();

    if let Some(client) = version_manifest.downloads.get("client") {
        batch.push([client.url.as_str()], output.join("versions").join(format!("{id}-client.jar")))
            .set_expected_size(client.size)
            .set_expected_sha1(client.sha1.map(|hash| hash.0))
            .set_role(Role::Jar);
    } else {
        log::warn!("version {id} has no client download");
    }

    let Some(libraries_root) = props.get_property(sources::LIBRARIES_SOURCE) else {
        return Err(Error::NoSources { key: sources::LIBRARIES_SOURCE.into() });
    };

    // The mirror carries the platform-applicable subset, like the updater, no
    // package features are involved here.
    let features = IndexSet::new();

    for library in &version_manifest.libraries {
        for (artifact, _natives) in applicable_artifacts(library, &features) {

            let Some(path) = artifact.path.as_deref() else {
                continue;
            };

            if artifact.download.url.is_empty() {
                continue;
            }

            batch.push([sources::suffix_join(libraries_root, path)], output.join("libraries").join(path))
                .set_expected_size(artifact.download.size)
                .set_expected_sha1(artifact.download.sha1.map(|hash| hash.0))
                .set_role(Role::Library);

        }
    }

    if let Some(asset_index) = mirror_asset_index(ctx, version_manifest, output, handler)? {

        let Some(assets_root) = props.get_property(sources::ASSETS_SOURCE) else {
            return Err(Error::NoSources { key: sources::ASSETS_SOURCE.into() });
        };

        for object in asset_index.objects.values() {

            let name = object.hash.to_string();

            batch.push(
                    [sources::suffix_join(assets_root, &object.hash.object_path())],
                    output.join("assets").join(&name[..2]).join(&name))
                .set_expected_size(Some(object.size))
                .set_expected_sha1(Some(object.hash.0))
                .set_role(Role::Asset);

        }

    }

    if batch.is_empty() {
        return Ok(());
    }

    let result = batch.download(&ctx.pool, &mut *handler)?;

    for error in result.iter_errors() {
        if let download::EntryErrorKind::Cancelled = error.kind() {
            return Err(Error::Cancelled);
        }
        log::error!("failed to mirror artifact: {error}");
    }

    Ok(())

}

/// Mirror the asset index of a version and return its parsed body, so the object
/// tasks can be planned, none if the version has no assets or if the index could
/// not be fetched.
fn mirror_asset_index(
    ctx: &MirrorContext,
    version_manifest: &VersionManifest,
    output: &Path,
    handler: &mut dyn download::Handler,
) -> Result<Option<AssetIndex>> {

    let Some(index) = &version_manifest.asset_index else {
        return Ok(None);
    };

    let asset_id = version_manifest.asset_id.as_deref()
        .unwrap_or(&version_manifest.id);

    let file = output.join("indexes").join(format!("{asset_id}.json"));

    let mut batch = Batch::new();
    batch.push([index.url.as_str()], file.clone())
        .set_expected_size(index.size)
        .set_expected_sha1(index.sha1.map(|hash| hash.0))
        .set_role(Role::Index);

    let result = batch.download(&ctx.pool, &mut *handler)?;

    if let Err(result) = result.into_result() {
        if ctx.pool.cancel_token().is_cancelled() {
            return Err(Error::Cancelled);
        }
        for error in result.iter_errors() {
            log::error!("failed to mirror asset index {asset_id}: {error}");
        }
        return Ok(None);
    }

    let reader = File::open(&file)
        .map_err(|e| Error::new_io_file(e, file.clone()))
        .map(BufReader::new)?;

    let mut deserializer = serde_json::Deserializer::from_reader(reader);
    match serde_path_to_error::deserialize(&mut deserializer) {
        Ok(obj) => Ok(Some(obj)),
        Err(e) => {
            log::error!("invalid asset index {asset_id}: {e}");
            Ok(None)
        }
    }

}

/// Write the given document atomically: a sibling temporary file renamed over the
/// target on success.
fn write_atomic(file: &Path, body: &[u8]) -> Result<()> {

    if let Some(parent) = file.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| Error::new_io_file(e, parent.to_path_buf()))?;
    }

    let tmp_file = tmp_sibling(file);

    fs::write(&tmp_file, body)
        .map_err(|e| Error::new_io_file(e, tmp_file.clone()))?;

    fs::rename(&tmp_file, file)
        .map_err(|e| Error::new_io_file(e, file.to_path_buf()))

}

/// The mirror builder could not proceed.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Error while fetching the release list or a version document, the release
    /// list failure is the fatal one.
    #[error("manifest: {0}")]
    Manifest(#[from] manifest::Error),
    /// The primary origin for the given property key is not configured.
    #[error("no sources: {key}")]
    NoSources {
        key: Box<str>,
    },
    /// The release list body could not be decoded.
    #[error("json: {error}")]
    Json {
        #[source]
        error: serde_path_to_error::Error<serde_json::Error>,
    },
    /// The mirror has been aborted by a cancellation request.
    #[error("cancelled")]
    Cancelled,
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

/// Type alias for a result with the mirror error type.
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
            Error::Manifest(e) => e.locale_key(),
            Error::NoSources { .. } => "error.mirror.no_sources",
            Error::Json { .. } => "error.http.json",
            Error::Cancelled => "error.cancelled",
            Error::Reqwest { .. } => "error.http.network",
            Error::Io { .. } => "error.io",
        }
    }

}
