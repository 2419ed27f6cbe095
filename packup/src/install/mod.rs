//! Instance update orchestration: planning the downloads described by a resolved
//! version manifest and executing them to bring an instance into an installed,
//! launch-ready state.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::env;

use indexmap::IndexSet;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::download::{self, Batch, CancelToken, EntryErrorKind, Pool, Role};
use crate::manifest::{self, serde::{AssetIndex, Library, LibraryDownload, PackageManifest, Rule, RuleOs, RuleAction, VersionManifest}};
use crate::progress::{INDETERMINATE, ProgressCell, ProgressFilter};
use crate::sources::{self, Properties};


/// Fraction of the overall progress covered by the download phase, the remaining
/// range is covered by the install phase.
const DOWNLOAD_PROGRESS_RANGE: f64 = 0.98;

/// The persistent record of a local instance, the updater mutates it and commits
/// it through the [`InstanceStore`] collaborator.
#[derive(serde::Deserialize, serde::Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub name: String,
    #[serde(default)]
    pub title: String,
    /// Directory holding the instance's own content (overlay files, resolved
    /// version manifest, extracted natives).
    pub content_dir: PathBuf,
    /// The installed modpack release tag, empty before the first update.
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub installed: bool,
    #[serde(default)]
    pub update_pending: bool,
    /// True once a manifest has been read for this instance.
    #[serde(default)]
    pub local: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest_url: Option<String>,
}

impl Instance {

    pub fn new(name: impl Into<String>, content_dir: impl Into<PathBuf>) -> Self {
        let name = name.into();
        Self {
            title: name.clone(),
            name,
            content_dir: content_dir.into(),
            version: String::new(),
            installed: false,
            update_pending: false,
            local: false,
            manifest_url: None,
        }
    }

    /// Path of the resolved version manifest of this instance.
    pub fn version_file(&self) -> PathBuf {
        self.content_dir.join("version.json")
    }

}

/// Persistence collaborator committing instance records to the launcher's store.
pub trait InstanceStore {
    fn commit(&mut self, instance: &Instance) -> io::Result<()>;
}

/// Blanket implementation that does not persist anything.
impl InstanceStore for () {
    fn commit(&mut self, _instance: &Instance) -> io::Result<()> {
        Ok(())
    }
}

/// Overlay installer collaborator, it reads the package manifest and materializes
/// the modpack's own files before the engine content is downloaded, its finalizer
/// flushes caches and on-disk bookkeeping once everything else succeeded.
pub trait PackageInstaller {

    fn install_package(&mut self, package: &PackageManifest, content_dir: &Path) -> io::Result<()> {
        let _ = (package, content_dir);
        Ok(())
    }

    fn complete(&mut self) -> io::Result<()> {
        Ok(())
    }

}

/// Blanket implementation that installs nothing.
impl PackageInstaller for () { }

/// Handler for events happening when updating.
pub trait Handler: download::Handler {

    /// Handle an event from the updater.
    fn handle_update_event(&mut self, event: Event) {
        let _ = event;
    }

    fn as_update_dyn(&mut self) -> &mut dyn Handler
    where Self: Sized {
        self
    }

}

/// Blanket implementation that does nothing.
impl Handler for () { }

impl<H: Handler + ?Sized> Handler for &'_ mut H {
    fn handle_update_event(&mut self, event: Event) {
        (*self).handle_update_event(event)
    }
}

/// An event produced by the updater that can be handled by the update handler.
#[derive(Debug)]
#[non_exhaustive]
pub enum Event<'a> {
    /// The instance is already installed with no applicable update, nothing to do.
    UpToDate {},
    /// The version manifest of the given game version will be resolved.
    ManifestResolving {
        game_version: &'a str,
    },
    /// The version manifest has been resolved and written to the instance.
    ManifestResolved {
        id: &'a str,
    },
    /// Planned resources will be downloaded.
    ResourcesDownloading {},
    /// Planned resources have been successfully downloaded.
    ResourcesDownloaded {},
    /// Native libraries have been extracted to the given directory.
    NativesExtracted {
        dir: &'a Path,
    },
    /// The resolved manifest has been published to the shared versions pool.
    ManifestPublished {
        file: &'a Path,
    },
    /// The final instance record has been committed to the store.
    InstanceCommitted {},
}

/// Outcome of an update call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The instance was already installed with no pending update.
    UpToDate,
    /// The instance has been brought up to date and committed.
    Updated,
}

/// The instance updater, this object is just the configuration of the updater and
/// an update will not mutate it: directories to install into, pool size and the
/// offline toggle.
#[derive(Debug, Clone)]
pub struct Updater {
    versions_dir: PathBuf,
    libraries_dir: PathBuf,
    assets_dir: PathBuf,
    concurrency: usize,
    online: bool,
    cancel: CancelToken,
    progress: ProgressCell,
}

impl Updater {

    /// Create a new updater with default configuration and the given launcher
    /// directory, under which the shared versions, libraries and assets pools are
    /// derived.
    pub fn new(launcher_dir: impl Into<PathBuf>) -> Self {

        let launcher_dir = launcher_dir.into();

        Self {
            versions_dir: launcher_dir.join("versions"),
            libraries_dir: launcher_dir.join("libraries"),
            assets_dir: launcher_dir.join("assets"),
            concurrency: 4,
            online: true,
            cancel: CancelToken::new(),
            progress: ProgressCell::new(),
        }

    }

    /// Same as [`Self::new`] but using the default launcher directory on your
    /// system, returning none if there is no default directory on your system.
    #[inline]
    pub fn new_with_default() -> Option<Self> {
        Some(Self::new(default_launcher_dir()?))
    }

    /// The directory where version manifests and client JAR files are shared.
    #[inline]
    pub fn versions_dir(&mut self, versions_dir: impl Into<PathBuf>) -> &mut Self {
        self.versions_dir = versions_dir.into();
        self
    }

    /// The directory where library archives are shared.
    #[inline]
    pub fn libraries_dir(&mut self, libraries_dir: impl Into<PathBuf>) -> &mut Self {
        self.libraries_dir = libraries_dir.into();
        self
    }

    /// The directory where asset indexes and objects are shared.
    #[inline]
    pub fn assets_dir(&mut self, assets_dir: impl Into<PathBuf>) -> &mut Self {
        self.assets_dir = assets_dir.into();
        self
    }

    /// Number of parallel download workers, small by default for interactive use.
    #[inline]
    pub fn concurrency(&mut self, concurrency: usize) -> &mut Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// When disabled, an instance requiring an update fails before any I/O.
    #[inline]
    pub fn online(&mut self, online: bool) -> &mut Self {
        self.online = online;
        self
    }

    /// Token used to cooperatively cancel an ongoing update.
    #[inline]
    pub fn cancel(&mut self, cancel: CancelToken) -> &mut Self {
        self.cancel = cancel;
        self
    }

    /// Return the observable progress cell of this updater, frontends read
    /// snapshots of it while an update is running.
    #[inline]
    pub fn progress(&self) -> ProgressCell {
        self.progress.clone()
    }

    /// Bring the given instance up to date with the given package manifest.
    ///
    /// When the instance is already installed and has no pending update this is a
    /// no-op. An instance requiring an update without manifest origin, or while
    /// offline, fails before any I/O. On success the instance record is updated
    /// and committed: the directory on disk is then consistent with the record.
    pub fn update(
        &self,
        instance: &mut Instance,
        package: &PackageManifest,
        props: &dyn Properties,
        store: &mut dyn InstanceStore,
        installer: &mut dyn PackageInstaller,
        mut handler: impl Handler,
    ) -> Result<Outcome> {

        // Update decision, before any I/O.
        let update_required = !instance.installed;

        if !update_required && !instance.update_pending {
            handler.handle_update_event(Event::UpToDate {});
            return Ok(Outcome::UpToDate);
        }

        if instance.manifest_url.is_none() {
            if update_required {
                return Err(Error::UpdateRequiredNoManifest);
            }
            // A pending update without origin cannot proceed, not an error.
            handler.handle_update_event(Event::UpToDate {});
            return Ok(Outcome::UpToDate);
        }

        // Only an instance that is not yet installed requires the network up
        // front, a pending update on an installed instance still attempts.
        if update_required && !self.online {
            return Err(Error::UpdateRequiredOffline);
        }

        let mut handler = InternalHandler {
            inner: &mut handler,
            filter: ProgressFilter::new(self.progress.clone(), 0.0, DOWNLOAD_PROGRESS_RANGE),
            status: "status.download",
        };

        // The manifest has been read for this instance, it is local from now on.
        instance.local = true;
        store.commit(instance).map_err(Error::new_io)?;

        // Overlay content goes first, it is synchronous and independent from the
        // engine content planned below.
        installer.install_package(package, &instance.content_dir).map_err(Error::new_io)?;

        // High-level manifest fields are applied to the record right away, the
        // installed/pending flags only flip at the final commit.
        instance.version = package.version.clone();

        self.progress.set(INDETERMINATE, "status.resolve");
        handler.handle_update_event(Event::ManifestResolving { game_version: &package.game_version });

        let version_manifest = manifest::resolve(package, props, &instance.version_file(), &self.cancel)?;

        handler.handle_update_event(Event::ManifestResolved { id: &version_manifest.id });

        // Planning, the asset index body is fetched up front because it is the
        // input of the asset objects sub-plan.
        let pool = Pool::new(self.concurrency).with_cancel(self.cancel.clone());

        let mut batch = Batch::new();
        let mut natives = Vec::new();

        self.plan_client(&version_manifest, props, &mut batch)?;
        self.plan_libraries(package, &version_manifest, props, &mut batch, &mut natives)?;

        if let Some(asset_index) = self.fetch_asset_index(&version_manifest, props, &pool, &mut handler)? {
            self.plan_assets(&asset_index, props, &mut batch)?;
        }

        handler.handle_update_event(Event::ResourcesDownloading {});

        if !batch.is_empty() {
            let result = batch.download(&pool, &mut handler)?;
            if let Err(result) = result.into_result() {
                return Err(self.batch_error(result));
            }
        }

        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        handler.handle_update_event(Event::ResourcesDownloaded {});

        // Install phase: deferred actions registered while planning.
        let install_progress = ProgressFilter::new(self.progress.clone(), DOWNLOAD_PROGRESS_RANGE, 1.0);
        install_progress.set(0.0, "status.install");

        self.extract_natives(&natives, &instance.content_dir, &mut handler)?;

        // Late install phase: launcher-facing state.
        self.publish_manifest(&version_manifest, &mut handler)?;
        install_progress.set(1.0, "status.install");

        installer.complete().map_err(Error::new_io)?;

        // Final commit, never reached on cancellation so no partial state is
        // committed to the record.
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        instance.version = package.version.clone();
        instance.installed = true;
        instance.update_pending = false;
        instance.local = true;
        store.commit(instance).map_err(Error::new_io)?;

        handler.handle_update_event(Event::InstanceCommitted {});

        Ok(Outcome::Updated)

    }

    /// Plan the client JAR download into the shared versions pool.
    fn plan_client(
        &self,
        version_manifest: &VersionManifest,
        props: &dyn Properties,
        batch: &mut Batch,
    ) -> Result<()> {

        let Some(client) = version_manifest.downloads.get("client") else {
            return Err(Error::ClientNotFound);
        };

        let id = &version_manifest.id;
        let file = self.versions_dir.join(format!("{id}-client.jar"));

        let source_list = sources::source_list_with(props,
            Some(&client.url),
            Some(sources::CUSTOM_VERSIONS_SOURCE),
            |base| sources::suffix_join(base, &format!("{id}-client.jar")));

        batch.push(source_list, file)
            .set_expected_size(client.size)
            .set_expected_sha1(client.sha1.map(|hash| hash.0))
            .set_role(Role::Jar);

        Ok(())

    }

    /// Plan the platform-applicable library artifacts into the shared libraries
    /// pool, collecting natives archives for the install phase.
    fn plan_libraries(
        &self,
        package: &PackageManifest,
        version_manifest: &VersionManifest,
        props: &dyn Properties,
        batch: &mut Batch,
        natives: &mut Vec<PathBuf>,
    ) -> Result<()> {

        let roots = sources::source_list(props,
            sources::LIBRARIES_SOURCE,
            Some(sources::CUSTOM_LIBRARIES_SOURCE),
            str::to_string);

        for library in &version_manifest.libraries {
            for (artifact, is_natives) in applicable_artifacts(library, &package.features) {

                let Some(path) = artifact.path.as_deref() else {
                    continue;
                };

                // Libraries with empty URLs have been seen in the wild, these have
                // no downloadable source.
                if artifact.download.url.is_empty() {
                    continue;
                }

                // NOTE: Unsafe path joining.
                let file = self.libraries_dir.join(path);

                let mut source_list = sources::rebased(&roots, path);

                // The per-manifest libraries origin takes precedence over every
                // other source.
                if let Some(base) = package.libraries_url.as_deref() {
                    source_list.insert(0, sources::suffix_join(base, path).into_boxed_str());
                }

                if source_list.is_empty() {
                    return Err(Error::NoSources { key: sources::LIBRARIES_SOURCE.into() });
                }

                batch.push(source_list, file.clone())
                    .set_expected_size(artifact.download.size)
                    .set_expected_sha1(artifact.download.sha1.map(|hash| hash.0))
                    .set_role(Role::Library);

                if is_natives {
                    natives.push(file);
                }

            }
        }

        Ok(())

    }

    /// Download and parse the asset index, if the version has one. This runs before
    /// the main batch because the index body is the input of the objects sub-plan.
    fn fetch_asset_index<H: Handler>(
        &self,
        version_manifest: &VersionManifest,
        props: &dyn Properties,
        pool: &Pool,
        handler: &mut H,
    ) -> Result<Option<AssetIndex>> {

        let Some(index) = &version_manifest.asset_index else {
            return Ok(None);
        };

        let asset_id = version_manifest.asset_id.as_deref()
            .unwrap_or(&version_manifest.id);

        let file = self.assets_dir
            .join("indexes")
            .join(format!("{asset_id}.json"));

        let source_list = sources::source_list_with(props,
            Some(&index.url),
            Some(sources::CUSTOM_ASSET_INDEXES_SOURCE),
            |base| sources::suffix_join(base, &format!("{asset_id}.json")));

        let mut batch = Batch::new();
        batch.push(source_list, file.clone())
            .set_expected_size(index.size)
            .set_expected_sha1(index.sha1.map(|hash| hash.0))
            .set_role(Role::Index);

        let result = batch.download(pool, &mut *handler)?;
        if let Err(result) = result.into_result() {
            return Err(self.batch_error(result));
        }

        let reader = File::open(&file)
            .map_err(|e| Error::new_io_file(e, file.clone()))
            .map(BufReader::new)?;

        let mut deserializer = serde_json::Deserializer::from_reader(reader);
        let asset_index: AssetIndex = match serde_path_to_error::deserialize(&mut deserializer) {
            Ok(obj) => obj,
            Err(e) => return Err(Error::new_json_file(e, file)),
        };

        Ok(Some(asset_index))

    }

    /// Plan every object of the asset index into the shared objects pool.
    fn plan_assets(
        &self,
        asset_index: &AssetIndex,
        props: &dyn Properties,
        batch: &mut Batch,
    ) -> Result<()> {

        if asset_index.objects.is_empty() {
            return Ok(());
        }

        let roots = sources::source_list(props,
            sources::ASSETS_SOURCE,
            Some(sources::CUSTOM_ASSETS_SOURCE),
            str::to_string);

        if roots.is_empty() {
            return Err(Error::NoSources { key: sources::ASSETS_SOURCE.into() });
        }

        let objects_dir = self.assets_dir.join("objects");
        let mut unique_hashes = HashSet::new();

        for object in asset_index.objects.values() {

            // Some assets are represented with multiple files, but we don't want
            // to download a file multiple time so we abort here.
            if !unique_hashes.insert(object.hash) {
                continue;
            }

            let name = object.hash.to_string();
            let file = objects_dir
                .join(&name[..2])
                .join(&name);

            batch.push(sources::rebased(&roots, &object.hash.object_path()), file)
                .set_expected_size(Some(object.size))
                .set_expected_sha1(Some(object.hash.0))
                .set_role(Role::Asset);

        }

        Ok(())

    }

    /// Install phase: extract shared objects (.so, .dll, .dylib) from the natives
    /// library archives into the instance's natives directory.
    fn extract_natives<H: Handler>(
        &self,
        natives: &[PathBuf],
        content_dir: &Path,
        handler: &mut H,
    ) -> Result<()> {

        if natives.is_empty() {
            return Ok(());
        }

        let natives_dir = content_dir.join("natives");
        fs::create_dir_all(&natives_dir)
            .map_err(|e| Error::new_io_file(e, natives_dir.clone()))?;

        for src_file in natives {

            let src_reader = File::open(src_file)
                .map_err(|e| Error::new_io_file(e, src_file.clone()))
                .map(BufReader::new)?;

            let mut archive = ZipArchive::new(src_reader)
                .map_err(|e| Error::new_zip_file(e, src_file.clone()))?;

            for i in 0..archive.len() {

                let mut file = archive.by_index(i).unwrap();
                let Some(file_path) = file.enclosed_name() else {
                    continue;
                };
                let Some(file_ext) = file_path.extension() else {
                    continue;
                };

                if !matches!(file_ext.as_encoded_bytes(), b"so" | b"dll" | b"dylib") {
                    continue;
                }

                // Unwrapping because file should have a name if it has extension.
                let file_name = file_path.file_name().unwrap();
                let dst_file = natives_dir.join(file_name);

                let mut dst_writer = File::create(&dst_file)
                    .map_err(|e| Error::new_io_file(e, dst_file.clone()))?;

                io::copy(&mut file, &mut dst_writer)
                    .map_err(Error::new_io)?;

            }

        }

        handler.handle_update_event(Event::NativesExtracted { dir: &natives_dir });

        Ok(())

    }

    /// Late install phase: publish the resolved manifest into the shared versions
    /// pool, next to the client JAR.
    fn publish_manifest<H: Handler>(
        &self,
        version_manifest: &VersionManifest,
        handler: &mut H,
    ) -> Result<()> {

        let file = self.versions_dir.join(format!("{}.json", version_manifest.id));
        manifest::write_manifest(version_manifest, &file)?;

        handler.handle_update_event(Event::ManifestPublished { file: &file });

        Ok(())

    }

    /// Turn an errored batch result into the update error, cancellation wins over
    /// the first artifact failure.
    fn batch_error(&self, result: download::BatchResult) -> Error {
        if self.cancel.is_cancelled() {
            return Error::Cancelled;
        }
        match result.into_first_error() {
            Some(error) => Error::from(error),
            // Unreachable, the result is only passed here when it has errors.
            None => Error::Cancelled,
        }
    }

}

/// Internal handler wrapping the user handler to feed the progress cell from the
/// raw download progress.
struct InternalHandler<'a, H: Handler> {
    inner: &'a mut H,
    filter: ProgressFilter,
    status: &'static str,
}

impl<H: Handler> download::Handler for InternalHandler<'_, H> {
    fn handle_download_progress(&mut self, count: u32, total_count: u32, size: u64, total_size: u64) {
        if total_size != 0 {
            self.filter.set(size as f64 / total_size as f64, self.status);
        }
        self.inner.handle_download_progress(count, total_count, size, total_size)
    }
}

impl<H: Handler> Handler for InternalHandler<'_, H> {
    fn handle_update_event(&mut self, event: Event) {
        self.inner.handle_update_event(event)
    }
}

/// Return the platform-applicable artifacts of the given library, pairing each
/// artifact with a flag telling if it is a natives archive that should be
/// extracted during the install phase.
pub fn applicable_artifacts<'a>(
    library: &'a Library,
    features: &IndexSet<String>,
) -> Vec<(&'a LibraryDownload, bool)> {

    // A library with no rules is applicable on every platform.
    if let Some(rules) = &library.rules {
        if !check_rules(rules, features) {
            return Vec::new();
        }
    }

    let mut artifacts = Vec::new();

    if let Some(artifact) = &library.downloads.artifact {
        artifacts.push((artifact, false));
    }

    if let Some(natives) = &library.natives {
        if let (Some(os_name), Some(os_bits)) = (os_name(), os_bits()) {
            if let Some(classifier) = natives.get(os_name) {

                // If we find an arch replacement pattern, we must replace it with
                // the target architecture bit-ness (32, 64).
                let classifier = if classifier.contains("${arch}") {
                    classifier.replace("${arch}", os_bits)
                } else {
                    classifier.clone()
                };

                if let Some(artifact) = library.downloads.classifiers.get(&classifier) {
                    artifacts.push((artifact, true));
                }

            }
        }
    }

    artifacts

}

/// Resolve the given rules and return true if allowed.
pub(crate) fn check_rules(rules: &[Rule], features: &IndexSet<String>) -> bool {

    // Initially disallowed...
    let mut allowed = false;

    for rule in rules {
        match check_rule(rule, features) {
            Some(RuleAction::Allow) => allowed = true,
            Some(RuleAction::Disallow) => allowed = false,
            None => (),
        }
    }

    allowed

}

/// Resolve a single rule and return its action if the rule matches the platform
/// and the enabled features.
fn check_rule(rule: &Rule, features: &IndexSet<String>) -> Option<RuleAction> {

    if !check_rule_os(&rule.os) {
        return None;
    }

    for (feature, feature_expected) in &rule.features {
        if features.contains(feature) != *feature_expected {
            return None;
        }
    }

    Some(rule.action)

}

/// Resolve OS rules and return true if the OS is matching the rule.
fn check_rule_os(rule_os: &RuleOs) -> bool {

    if let (Some(name), Some(os_name)) = (&rule_os.name, os_name()) {
        if name != os_name {
            return false;
        }
    }

    if let (Some(arch), Some(os_arch)) = (&rule_os.arch, os_arch()) {
        if arch != os_arch {
            return false;
        }
    }

    if let (Some(version), Some(os_version)) = (&rule_os.version, os_version()) {
        if !version.is_match(os_version) {
            return false;
        }
    }

    true

}

/// The updater could not proceed to the update of an instance.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The instance requires an update but carries no manifest origin.
    #[error("update required but instance has no manifest url")]
    UpdateRequiredNoManifest,
    /// The instance requires an update but the updater is offline.
    #[error("update required but updater is offline")]
    UpdateRequiredOffline,
    /// The resolved manifest carries no client download information.
    #[error("client not found")]
    ClientNotFound,
    /// The source list built for the given property key is empty.
    #[error("no sources: {key}")]
    NoSources {
        key: Box<str>,
    },
    /// Error from the manifest resolver.
    #[error("manifest: {0}")]
    Manifest(#[from] manifest::Error),
    /// A single artifact exhausted every source of its list, this is fatal to the
    /// whole update, the kind is the last error observed for this artifact.
    #[error("artifact fetch failed: {file:?}: {kind}")]
    ArtifactFetchFailed {
        file: Box<Path>,
        #[source]
        kind: EntryErrorKind,
    },
    /// The update has been aborted by a cancellation request, no state has been
    /// committed to the instance record.
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
    /// A JSON deserialization error with a file source.
    #[error("json: {error} @ {file:?}")]
    Json {
        #[source]
        error: serde_path_to_error::Error<serde_json::Error>,
        file: Box<Path>,
    },
    /// A Zip error with a file source, this can happen when extracting natives.
    #[error("zip: {error} @ {file:?}")]
    Zip {
        #[source]
        error: ZipError,
        file: Box<Path>,
    },
}

/// Type alias for a result with the updater error type.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {

    #[inline]
    pub fn new_io(error: io::Error) -> Self {
        Self::Io { error, file: None }
    }

    #[inline]
    pub fn new_io_file(error: io::Error, file: impl Into<Box<Path>>) -> Self {
        Self::Io { error, file: Some(file.into()) }
    }

    #[inline]
    pub fn new_json_file(error: serde_path_to_error::Error<serde_json::Error>, file: impl Into<Box<Path>>) -> Self {
        Self::Json { error, file: file.into() }
    }

    #[inline]
    pub fn new_zip_file(error: ZipError, file: impl Into<Box<Path>>) -> Self {
        Self::Zip { error, file: file.into() }
    }

    /// Stable key for the locale collaborator to map this error to a user-facing
    /// message, distinct from the technical cause.
    pub fn locale_key(&self) -> &'static str {
        match self {
            Error::UpdateRequiredNoManifest => "error.update.no_manifest",
            Error::UpdateRequiredOffline => "error.update.offline",
            Error::ClientNotFound => "error.update.client_not_found",
            Error::NoSources { .. } => "error.update.no_sources",
            Error::Manifest(e) => e.locale_key(),
            Error::ArtifactFetchFailed { .. } => "error.update.artifact_fetch_failed",
            Error::Cancelled => "error.cancelled",
            Error::Reqwest { .. } => "error.http.network",
            Error::Io { .. } => "error.io",
            Error::Json { .. } => "error.http.json",
            Error::Zip { .. } => "error.update.zip",
        }
    }

}

impl From<download::EntryError> for Error {
    fn from(value: download::EntryError) -> Self {
        let (file, kind) = value.into_parts();
        match kind {
            EntryErrorKind::Cancelled => Self::Cancelled,
            kind => Self::ArtifactFetchFailed { file, kind },
        }
    }
}

/// Return the default launcher directory on this system.
pub fn default_launcher_dir() -> Option<PathBuf> {
    if cfg!(target_os = "windows") {
        dirs::data_dir().map(|dir| dir.join("Packup"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir().map(|dir| dir.join("packup"))
    } else {
        dirs::home_dir().map(|dir| dir.join(".packup"))
    }
}

/// Return the default OS name for rules.
/// Returning none if the OS is not known.
#[inline]
fn os_name() -> Option<&'static str> {
    Some(match env::consts::OS {
        "windows" => "windows",
        "linux" => "linux",
        "macos" => "osx",
        "freebsd" => "freebsd",
        "openbsd" => "openbsd",
        "netbsd" => "netbsd",
        _ => return None
    })
}

/// Return the default OS system architecture name for rules.
#[inline]
fn os_arch() -> Option<&'static str> {
    Some(match env::consts::ARCH {
        "x86" => "x86",
        "x86_64" => "x86_64",
        "arm" => "arm32",
        "aarch64" => "arm64",
        _ => return None
    })
}

/// Return the architecture bit-ness for the natives classifier replacement.
#[inline]
fn os_bits() -> Option<&'static str> {
    Some(match env::consts::ARCH {
        "x86" | "arm" => "32",
        "x86_64" | "aarch64" => "64",
        _ => return None
    })
}

/// Return the default OS version name for rules.
#[inline]
fn os_version() -> Option<&'static str> {

    static VERSION: LazyLock<Option<String>> = LazyLock::new(|| {
        use os_info::Version;
        match os_info::get().version() {
            Version::Unknown => None,
            version => Some(version.to_string())
        }
    });

    VERSION.as_deref()

}

#[cfg(test)]
mod tests {

    use indexmap::IndexMap;

    use crate::hash::Sha1Hash;
    use crate::manifest::serde::{Download, LibraryDownloads};

    use super::*;

    fn package(manifest_url: Option<&str>) -> PackageManifest {
        PackageManifest {
            version: "1.0.0".to_string(),
            game_version: "1.20.1".to_string(),
            manifest_url: manifest_url.map(str::to_string),
            libraries_url: None,
            version_manifest: None,
            features: IndexSet::new(),
            files: Vec::new(),
        }
    }

    #[test]
    fn installed_instance_is_up_to_date() {

        let updater = Updater::new("/tmp/packup-test");
        let mut instance = Instance::new("test", "/tmp/packup-test/instances/test");
        instance.installed = true;

        let outcome = updater.update(&mut instance, &package(None),
            &sources::default_properties(), &mut (), &mut (), ()).unwrap();

        assert_eq!(outcome, Outcome::UpToDate);

    }

    #[test]
    fn pending_update_without_manifest_is_up_to_date() {

        let updater = Updater::new("/tmp/packup-test");
        let mut instance = Instance::new("test", "/tmp/packup-test/instances/test");
        instance.installed = true;
        instance.update_pending = true;

        let outcome = updater.update(&mut instance, &package(None),
            &sources::default_properties(), &mut (), &mut (), ()).unwrap();

        assert_eq!(outcome, Outcome::UpToDate);

    }

    #[test]
    fn update_required_without_manifest_is_an_error() {

        let updater = Updater::new("/tmp/packup-test");
        let mut instance = Instance::new("test", "/tmp/packup-test/instances/test");

        let error = updater.update(&mut instance, &package(None),
            &sources::default_properties(), &mut (), &mut (), ()).unwrap_err();

        assert!(matches!(error, Error::UpdateRequiredNoManifest));

    }

    #[test]
    fn update_required_offline_is_an_error() {

        let mut updater = Updater::new("/tmp/packup-test");
        updater.online(false);

        let mut instance = Instance::new("test", "/tmp/packup-test/instances/test");
        instance.manifest_url = Some("https://packs.example.com/test.json".to_string());

        let error = updater.update(&mut instance, &package(None),
            &sources::default_properties(), &mut (), &mut (), ()).unwrap_err();

        assert!(matches!(error, Error::UpdateRequiredOffline));

    }

    #[test]
    fn pending_update_while_offline_still_attempts() {

        let mut updater = Updater::new("/tmp/packup-test");
        updater.online(false);

        let mut instance = Instance::new("test", "/tmp/packup-test/instances/test");
        instance.installed = true;
        instance.update_pending = true;
        instance.manifest_url = Some("https://packs.example.com/test.json".to_string());

        // Empty properties: the attempt reaches resolution and fails on the
        // missing origins, not on the offline gate.
        let props = IndexMap::<String, String>::new();
        let error = updater.update(&mut instance, &package(None),
            &props, &mut (), &mut (), ()).unwrap_err();

        assert!(matches!(error, Error::Manifest(manifest::Error::NoSources { .. })));

    }

    fn version_manifest() -> VersionManifest {
        VersionManifest {
            id: "1.20.1".to_string(),
            asset_id: None,
            asset_index: None,
            downloads: IndexMap::from([
                ("client".to_string(), Download {
                    url: "https://meta.example.com/1.20.1-client.jar".to_string(),
                    size: Some(12),
                    sha1: Some(Sha1Hash([0x11; 20])),
                }),
            ]),
            libraries: vec![
                Library {
                    name: "com.example:alpha:1.0".to_string(),
                    downloads: LibraryDownloads {
                        artifact: Some(LibraryDownload {
                            path: Some("com/example/alpha/1.0/alpha-1.0.jar".to_string()),
                            download: Download {
                                url: "https://libraries.example.com/com/example/alpha/1.0/alpha-1.0.jar".to_string(),
                                size: Some(34),
                                sha1: Some(Sha1Hash([0x22; 20])),
                            },
                        }),
                        classifiers: Default::default(),
                    },
                    natives: None,
                    rules: None,
                },
            ],
        }
    }

    #[test]
    fn planning_is_deterministic() {

        let updater = Updater::new("/tmp/packup-test");
        let package = package(Some("https://packs.example.com/test.json"));
        let version_manifest = version_manifest();
        let props = sources::default_properties();

        let mut plans = Vec::new();
        for _ in 0..2 {
            let mut batch = Batch::new();
            let mut natives = Vec::new();
            updater.plan_client(&version_manifest, &props, &mut batch).unwrap();
            updater.plan_libraries(&package, &version_manifest, &props, &mut batch, &mut natives).unwrap();
            plans.push(batch);
        }

        let (a, b) = (&plans[0], &plans[1]);
        assert_eq!(a.len(), b.len());
        for (ea, eb) in a.iter().zip(b.iter()) {
            assert_eq!(ea.sources(), eb.sources());
            assert_eq!(ea.file(), eb.file());
            assert_eq!(ea.expected_size(), eb.expected_size());
            assert_eq!(ea.expected_sha1(), eb.expected_sha1());
            assert_eq!(ea.role(), eb.role());
        }

    }

    #[test]
    fn client_sources_include_custom_mirror() {

        let updater = Updater::new("/tmp/packup-test");
        let version_manifest = version_manifest();

        let mut props = sources::default_properties();
        props.insert(sources::CUSTOM_VERSIONS_SOURCE.to_string(), "https://mirror.example.com/versions/".to_string());

        let mut batch = Batch::new();
        updater.plan_client(&version_manifest, &props, &mut batch).unwrap();

        assert_eq!(batch.len(), 1);
        let entry = batch.entry(0);
        assert_eq!(&*entry.sources()[0], "https://meta.example.com/1.20.1-client.jar");
        assert_eq!(&*entry.sources()[1], "https://mirror.example.com/versions/1.20.1-client.jar");
        assert_eq!(entry.role(), Role::Jar);

    }

    #[test]
    fn manifest_libraries_url_is_prepended() {

        let updater = Updater::new("/tmp/packup-test");
        let mut package = package(Some("https://packs.example.com/test.json"));
        package.libraries_url = Some("https://packs.example.com/libraries/".to_string());
        let version_manifest = version_manifest();

        let mut batch = Batch::new();
        let mut natives = Vec::new();
        updater.plan_libraries(&package, &version_manifest, &sources::default_properties(), &mut batch, &mut natives).unwrap();

        assert_eq!(batch.len(), 1);
        let entry = batch.entry(0);
        assert_eq!(&*entry.sources()[0], "https://packs.example.com/libraries/com/example/alpha/1.0/alpha-1.0.jar");
        assert_eq!(&*entry.sources()[1], "https://libraries.minecraft.net/com/example/alpha/1.0/alpha-1.0.jar");
        assert!(natives.is_empty());

    }

}
