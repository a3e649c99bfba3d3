use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Computes the managed assemblies an entry assembly needs at runtime.
#[derive(Debug, Parser)]
#[clap(version)]
pub struct CliArgs {
    #[clap(subcommand)]
    pub cmd: Command,
    /// Extension of module files in platform directories [default: dll]
    #[clap(long, global = true)]
    pub module_extension: Option<String>,
    /// Extension of debug-symbol files next to modules [default: pdb]
    #[clap(long, global = true)]
    pub symbols_extension: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Lists the files needed to run the entry module, modules first, then symbols
    Resolve {
        #[clap(flatten)]
        inputs: ResolveInputs,
        /// Writes the list to this file instead of standard output
        #[clap(short, long)]
        output: Option<PathBuf>,
    },
    /// Writes a startup manifest for the entry module
    Manifest {
        #[clap(flatten)]
        inputs: ResolveInputs,
        #[clap(short, long, default_value = "boot.json")]
        output: PathBuf,
        /// Marks the application as trimmed by a linker
        #[clap(long)]
        linker_enabled: bool,
    },
    /// Prints the declared name, version and references of a module
    Inspect { path: PathBuf },
}

#[derive(Debug, Args)]
pub struct ResolveInputs {
    /// The entry module
    pub entry: PathBuf,
    /// Application module the entry module may depend on, can be repeated
    #[clap(short, long = "reference")]
    pub references: Vec<PathBuf>,
    /// Directory of platform modules, preferred over application modules, can be repeated
    #[clap(short, long = "platform-dir")]
    pub platform_dirs: Vec<PathBuf>,
}
