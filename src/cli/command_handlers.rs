use log::info;

use crate::{
    api::{AssemblyClosure, ModuleInfo},
    cli::args::ResolveInputs,
    config::ClosureConfig,
};
use std::{
    error::Error,
    fmt::Write,
    path::{Path, PathBuf},
};

/// Builds the resolver from command line flags, falling back to configuration.
/// The configured platform directory is searched after the ones given on the command line.
pub fn build_closure(
    module_extension: Option<String>,
    symbols_extension: Option<String>,
    platform_dirs: &[PathBuf],
    config: ClosureConfig,
) -> Result<AssemblyClosure, Box<dyn Error>> {
    let mut builder = AssemblyClosure::builder().platform_directories(platform_dirs);
    if let Some(dir) = config.platform_dir {
        builder = builder.platform_directory(dir);
    }
    if let Some(extension) = module_extension.or(config.module_extension) {
        builder = builder.module_extension(extension);
    }
    if let Some(extension) = symbols_extension.or(config.symbols_extension) {
        builder = builder.symbols_extension(extension);
    }
    builder.try_build()
}

/// Handler to resolve command
pub fn do_resolve(
    closure: &AssemblyClosure,
    inputs: &ResolveInputs,
    output: Option<&Path>,
) -> Result<(), Box<dyn Error>> {
    let resolved = closure.resolve(&inputs.entry, &inputs.references)?;
    let text = render_paths(resolved.paths());

    match output {
        Some(output) => {
            std::fs::write(output, text)?;
            info!("Wrote closure to {}", output.display());
        }
        None => print!("{text}"),
    }
    Ok(())
}

/// Handler to manifest command
pub fn do_manifest(
    closure: &AssemblyClosure,
    inputs: &ResolveInputs,
    output: &Path,
    linker_enabled: bool,
) -> Result<(), Box<dyn Error>> {
    let manifest = closure.manifest(&inputs.entry, &inputs.references, linker_enabled)?;
    manifest.write(output)?;
    info!("Wrote manifest to {}", output.display());
    Ok(())
}

/// Handler to inspect command
pub fn do_inspect(closure: &AssemblyClosure, path: &Path) -> Result<(), Box<dyn Error>> {
    let module = closure.inspect(path)?;
    print!("{}", render_module(&module));
    Ok(())
}

fn render_paths<'a>(paths: impl Iterator<Item = &'a Path>) -> String {
    paths.fold(String::new(), |mut text, path| {
        let _ = writeln!(text, "{}", path.display());
        text
    })
}

fn render_module(module: &ModuleInfo) -> String {
    let mut text = format!("{} {}\n", module.header.name, module.header.version);
    for reference in &module.references {
        let _ = writeln!(text, "  {reference}");
    }
    text
}
