use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "woc", about = "World of Code: sharded archive lookups", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Scan archive directories and print a profile descriptor
    Detect(DetectArgs),
    /// Check every file of a profile against its recorded size and digest
    Verify(ProfileArgs),
    /// Read keys from stdin and print `key;value;...` for each
    GetValues(GetValuesArgs),
    /// Read object hashes from stdin and print their content
    ShowContent(ShowContentArgs),
    /// Print the number of keys in a map or object store
    Count(NameArgs),
    /// Print every key of a map or object store
    AllKeys(NameArgs),
}

#[derive(Args)]
pub struct DetectArgs {
    /// Archive directories to scan
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
    /// Only keep maps of this version
    #[arg(long = "map-version")]
    pub map_version: Option<String>,
    /// Preset file merged into the descriptor
    #[arg(long)]
    pub preset: Option<PathBuf>,
    /// Write the descriptor here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Keep versions with missing shards
    #[arg(long)]
    pub no_skip_missing: bool,
    /// Record a sampled digest of every file
    #[arg(long)]
    pub with_digest: bool,
}

#[derive(Args)]
pub struct ProfileArgs {
    /// Profile descriptor; searched in the default locations when omitted
    #[arg(short, long)]
    pub profile: Option<PathBuf>,
}

#[derive(Args)]
pub struct QueryArgs {
    #[command(flatten)]
    pub profile: ProfileArgs,
    /// Consult only this map version (repeat for several)
    #[arg(long = "map-version")]
    pub map_version: Vec<String>,
    /// Ignore overflow files
    #[arg(long)]
    pub ignore_large: bool,
    /// Fail on unknown names and malformed keys instead of printing nothing
    #[arg(long)]
    pub strict: bool,
}

#[derive(Args)]
pub struct GetValuesArgs {
    /// Map name, e.g. c2p
    pub name: String,
    #[command(flatten)]
    pub query: QueryArgs,
}

#[derive(Args)]
pub struct ShowContentArgs {
    /// Object kind: commit, tree, blob or tag
    pub kind: String,
    /// Commit output layout: 0 to 9; 3 is the raw object, 7 its base64
    #[arg(default_value_t = 0)]
    pub layout: u8,
    #[command(flatten)]
    pub query: QueryArgs,
}

#[derive(Args)]
pub struct NameArgs {
    /// Map or object store name, e.g. c2p or commit
    pub name: String,
    #[command(flatten)]
    pub query: QueryArgs,
}
