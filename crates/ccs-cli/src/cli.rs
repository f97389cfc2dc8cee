use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "ccs",
    about = "ccsync: mirror storefront admin content to local files and back",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file
    #[arg(long, global = true, default_value = "ccs.toml")]
    pub config: PathBuf,

    /// Admin server URL, e.g. http://localhost:9080
    #[arg(long, global = true)]
    pub node: Option<String>,

    #[arg(long, global = true)]
    pub username: Option<String>,

    #[arg(long, global = true, env = "CCS_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    #[arg(long, global = true, env = "CCS_APPLICATION_KEY", hide_env_values = true)]
    pub application_key: Option<String>,

    /// Mirror root directory
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Work in this locale only
    #[arg(long, global = true)]
    pub locale: Option<String>,

    /// Work in every locale the server knows
    #[arg(long, global = true)]
    pub all_locales: bool,

    /// Target a server other than the one the mirror came from
    #[arg(long, global = true)]
    pub transfer: bool,

    #[arg(long, global = true)]
    pub grab_concurrency: Option<usize>,

    #[arg(long, global = true)]
    pub put_concurrency: Option<usize>,

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
    /// Download content from the server into the mirror
    Grab(GrabArgs),
    /// Upload files or directories to the server
    Put(PutArgs),
    /// Upload the whole mirror
    PutAll,
    /// Delete a directory's artifacts on the server and locally
    Delete(DeleteArgs),
    /// List the server's locales and the working set
    Locales,
    /// List the operations the server supports
    Operations(OperationsArgs),
}

#[derive(Args)]
pub struct GrabArgs {
    /// Grab every configured kind
    #[arg(long, conflicts_with_all = ["kind", "path"])]
    pub all: bool,
    /// Grab one kind
    #[arg(long, conflicts_with = "path")]
    pub kind: Option<String>,
    /// A kind directory, artifact directory or file inside the mirror
    pub path: Option<PathBuf>,
}

#[derive(Args)]
pub struct PutArgs {
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
}

#[derive(Args)]
pub struct DeleteArgs {
    pub path: PathBuf,
}

#[derive(Args)]
pub struct OperationsArgs {
    /// Only report whether these operations exist
    #[arg(long, num_args = 1..)]
    pub probe: Vec<String>,
}
