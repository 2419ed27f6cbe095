//! Implementation of the command line parser, using clap struct derivation.

use std::path::PathBuf;
use std::str::FromStr;

use clap::{Args, Parser, Subcommand};


/// Command line utility for bringing modpack instances into an installed,
/// launch-ready state and for building local content mirrors.
#[derive(Debug, Parser)]
#[command(name = "packup", version, author, disable_help_subcommand = true, max_term_width = 140)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Cmd,
    /// Enable verbose output, the more -v argument you put, the more verbose the
    /// launcher will be.
    #[arg(short, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Debug, Subcommand)]
pub enum Cmd {
    Update(UpdateArgs),
    Mirror(MirrorArgs),
}

// ================= //
//  UPDATE COMMAND   //
// ================= //

/// Update an instance.
///
/// This command reads a package manifest describing the target game version and
/// the overlay content, then fetches, verifies and materializes everything the
/// instance needs to be launch-ready: the client JAR, the library archives and
/// the asset objects. Files already present with the expected hash are skipped,
/// so running this command on an installed instance downloads nothing.
#[derive(Debug, Args)]
pub struct UpdateArgs {
    /// Path to the package manifest file of the modpack.
    pub manifest: PathBuf,
    /// The instance directory to bring up to date.
    #[arg(long)]
    pub dir: PathBuf,
    /// Directory of the shared versions, libraries and assets pools.
    ///
    /// This defaults to the standard launcher directory on your system.
    #[arg(long)]
    pub launcher_dir: Option<PathBuf>,
    /// Don't touch the network, an instance requiring an update will fail.
    #[arg(long)]
    pub offline: bool,
    /// Username of the offline session to derive and print after the update.
    #[arg(short, long)]
    pub username: Option<String>,
    /// Override a configuration property (<key>=<value>), such as
    /// 'customLibrariesSource' or 'customSourcesFirst'.
    ///
    /// This argument can be specified multiple times.
    #[arg(short = 'P', long = "property", name = "KEY=VALUE")]
    pub properties: Vec<Property>,
}

// ================= //
//  MIRROR COMMAND   //
// ================= //

/// Build a local mirror tree.
///
/// This command fetches the release list once and then, for each requested
/// version, walks the same dependency graph as the updater (client JAR,
/// libraries, asset index and asset objects) to populate the output directory
/// with the real origin content. Individual artifact failures are logged and the
/// mirror continues, a release list failure is fatal.
#[derive(Debug, Args)]
pub struct MirrorArgs {
    /// Comma-separated list of version ids to mirror.
    #[arg(long, value_delimiter = ',', required = true)]
    pub versions: Vec<String>,
    /// The mirror output directory.
    #[arg(long)]
    pub output: PathBuf,
    /// Override a configuration property (<key>=<value>).
    ///
    /// This argument can be specified multiple times.
    #[arg(short = 'P', long = "property", name = "KEY=VALUE")]
    pub properties: Vec<Property>,
}

/// A single `<key>=<value>` property override.
#[derive(Debug, Clone)]
pub struct Property {
    pub key: String,
    pub value: String,
}

impl FromStr for Property {

    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {

        let Some((key, value)) = s.split_once('=') else {
            return Err(format!("invalid property syntax, expecting <key>=<value>"));
        };

        Ok(Self {
            key: key.to_string(),
            value: value.to_string(),
        })

    }

}
