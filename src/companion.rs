//! Debug-symbol files shipped next to modules.

use std::path::{Path, PathBuf};

use log::trace;

use crate::model::ModuleDescriptor;

/// Path the debug symbols of `module` would have: same base name, `extension` instead.
pub fn companion_path(module: &Path, extension: &str) -> PathBuf {
    module.with_extension(extension)
}

/// Companion files that exist on disk, in the order of their owning modules.
pub fn find_companions<'a, I>(modules: I, extension: &str) -> Vec<PathBuf>
where
    I: IntoIterator<Item = &'a ModuleDescriptor>,
{
    modules
        .into_iter()
        .filter_map(|module| {
            let candidate = companion_path(module.path(), extension);
            if candidate != module.path() && candidate.is_file() {
                trace!("Found symbols {} for {}", candidate.display(), module.name());
                Some(candidate)
            } else {
                None
            }
        })
        .collect()
}
