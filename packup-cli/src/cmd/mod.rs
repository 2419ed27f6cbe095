//! Commands implementation.

use std::fs::{self, File};
use std::io::{self, BufReader, Write as _};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use indexmap::IndexMap;

use packup::download::{self, CancelToken};
use packup::install::{self, Instance, InstanceStore, Updater};
use packup::manifest::serde::PackageManifest;
use packup::mirror::{self, MirrorContext};
use packup::session::Session;
use packup::sources;

use crate::parse::{Cli, Cmd, MirrorArgs, Property, UpdateArgs};


pub fn main(cli: Cli) -> ExitCode {

    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        })
        .parse_default_env()
        .init();

    // A first Ctrl-C requests cooperative cancellation, workers terminate their
    // current transfer and temporary files are cleaned up.
    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        let _ = ctrlc::set_handler(move || cancel.cancel());
    }

    let res = match cli.cmd {
        Cmd::Update(args) => update(args, cancel),
        Cmd::Mirror(args) => mirror(args, cancel),
    };

    match res {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }

}

/// Built-in properties with the command line overrides applied on top.
fn properties(overrides: &[Property]) -> IndexMap<String, String> {
    let mut props = sources::default_properties();
    for property in overrides {
        props.insert(property.key.clone(), property.value.clone());
    }
    props
}

fn update(args: UpdateArgs, cancel: CancelToken) -> Result<(), String> {

    let package = read_package_manifest(&args.manifest)?;

    let mut updater = match args.launcher_dir {
        Some(dir) => Updater::new(dir),
        None => Updater::new_with_default()
            .ok_or_else(|| "no default launcher directory on your system".to_string())?,
    };

    updater.online(!args.offline).cancel(cancel);

    // The instance record lives next to the instance content.
    let record_file = args.dir.join("instance.json");
    let mut instance = load_instance(&record_file, &args.dir)?;

    if instance.manifest_url.is_none() {
        instance.manifest_url = package.manifest_url.clone();
    }

    // An installed instance with a different release tag has a pending update.
    if instance.installed && instance.version != package.version {
        instance.update_pending = true;
    }

    let mut store = JsonFileStore {
        file: record_file,
    };

    let props = properties(&args.properties);
    let outcome = updater.update(&mut instance, &package, &props, &mut store, &mut (), CliHandler::default())
        .map_err(|e| e.to_string())?;

    match outcome {
        install::Outcome::UpToDate => println!("up to date ({})", instance.version),
        install::Outcome::Updated => println!("updated to {}", instance.version),
    }

    if let Some(username) = args.username {
        let session = Session::offline(username);
        println!("session: {} uuid={} type={}", session.username(), session.uuid(), session.user_type());
    }

    Ok(())

}

fn mirror(args: MirrorArgs, cancel: CancelToken) -> Result<(), String> {

    let ctx = MirrorContext::new().with_cancel(cancel);
    let props = properties(&args.properties);

    mirror::build(&ctx, &props, &args.versions, &args.output, CliHandler::default())
        .map_err(|e| e.to_string())?;

    println!("mirror complete: {}", args.output.display());

    Ok(())

}

fn read_package_manifest(file: &Path) -> Result<PackageManifest, String> {

    let reader = File::open(file)
        .map_err(|e| format!("cannot read package manifest {}: {e}", file.display()))
        .map(BufReader::new)?;

    serde_json::from_reader(reader)
        .map_err(|e| format!("invalid package manifest {}: {e}", file.display()))

}

fn load_instance(file: &Path, dir: &Path) -> Result<Instance, String> {
    match File::open(file) {
        Ok(reader) => serde_json::from_reader(BufReader::new(reader))
            .map_err(|e| format!("invalid instance record {}: {e}", file.display())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            let name = dir.file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "instance".to_string());
            Ok(Instance::new(name, dir))
        }
        Err(e) => Err(format!("cannot read instance record {}: {e}", file.display())),
    }
}

/// Instance store persisting the record as pretty JSON next to the instance.
struct JsonFileStore {
    file: PathBuf,
}

impl InstanceStore for JsonFileStore {
    fn commit(&mut self, instance: &Instance) -> io::Result<()> {
        if let Some(parent) = self.file.parent() {
            fs::create_dir_all(parent)?;
        }
        let writer = File::create(&self.file)?;
        serde_json::to_writer_pretty(writer, instance).map_err(io::Error::from)
    }
}

/// Handler printing download progress and the main update milestones.
#[derive(Debug, Default)]
struct CliHandler {
    last_percent: u64,
}

impl download::Handler for CliHandler {

    fn handle_download_progress(&mut self, count: u32, total_count: u32, size: u64, total_size: u64) {

        if total_count == 0 || total_size == 0 {
            return;
        }

        let percent = size * 100 / total_size;
        if percent != self.last_percent || count == total_count {
            self.last_percent = percent;
            print!("\rdownloading.. {percent:3}% ({count}/{total_count})");
            if count == total_count {
                println!();
            } else {
                let _ = io::stdout().flush();
            }
        }

    }

}

impl install::Handler for CliHandler {

    fn handle_update_event(&mut self, event: install::Event) {
        match event {
            install::Event::ManifestResolving { game_version } =>
                println!("resolving version manifest for {game_version}.."),
            install::Event::ManifestResolved { id } =>
                println!("resolved {id}"),
            install::Event::NativesExtracted { dir } =>
                log::info!("natives extracted to {}", dir.display()),
            install::Event::ManifestPublished { file } =>
                log::info!("manifest published to {}", file.display()),
            _ => (),
        }
    }

}
