use std::error::Error;

use assembly_closure::{
    cli::{
        args::{CliArgs, Command},
        command_handlers::{build_closure, do_inspect, do_manifest, do_resolve},
    },
    config::ClosureConfig,
};
use clap::Parser;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli_args: CliArgs = CliArgs::parse();
    let config = ClosureConfig::load()?;

    match cli_args.cmd {
        Command::Resolve { inputs, output } => {
            let closure = build_closure(
                cli_args.module_extension,
                cli_args.symbols_extension,
                &inputs.platform_dirs,
                config,
            )?;
            do_resolve(&closure, &inputs, output.as_deref())
        }
        Command::Manifest {
            inputs,
            output,
            linker_enabled,
        } => {
            let closure = build_closure(
                cli_args.module_extension,
                cli_args.symbols_extension,
                &inputs.platform_dirs,
                config,
            )?;
            do_manifest(&closure, &inputs, &output, linker_enabled)
        }
        Command::Inspect { path } => {
            let closure = build_closure(
                cli_args.module_extension,
                cli_args.symbols_extension,
                &[],
                config,
            )?;
            do_inspect(&closure, &path)
        }
    }
}
