use crate::{
    catalog::Catalog,
    model::{ModuleDescriptor, ModuleName},
};

/// Outcome of looking a name up. Unresolved names are expected and are not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution<'a> {
    Resolved(&'a ModuleDescriptor, Lookup),
    Unresolved,
}

/// Where a name can be found, in order of preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Entry,
    Platform,
    Application,
}

pub(super) const LOOKUP_CHAIN: [Lookup; 3] = [Lookup::Entry, Lookup::Platform, Lookup::Application];

pub(super) struct Sources<'a> {
    pub entry: &'a ModuleDescriptor,
    pub platform: &'a Catalog,
    pub application: &'a Catalog,
}

impl<'a> Sources<'a> {
    pub fn resolve(&self, name: &ModuleName) -> Resolution<'a> {
        LOOKUP_CHAIN
            .iter()
            .find_map(|lookup| {
                self.find(*lookup, name)
                    .map(|module| Resolution::Resolved(module, *lookup))
            })
            .unwrap_or(Resolution::Unresolved)
    }

    fn find(&self, lookup: Lookup, name: &ModuleName) -> Option<&'a ModuleDescriptor> {
        match lookup {
            Lookup::Entry => Some(self.entry).filter(|entry| entry.name() == name),
            Lookup::Platform => self.platform.find(name),
            Lookup::Application => self.application.find(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    use pretty_assertions::assert_eq;

    fn module(name: &str, path: &str) -> ModuleDescriptor {
        ModuleDescriptor::new(ModuleName::from(name), PathBuf::from(path))
    }

    #[test]
    fn preference_order() {
        let entry = module("App", "bin/App.dll");
        let platform = Catalog::from(vec![
            module("App", "platform/App.dll"),
            module("Widgets", "platform/Widgets.dll"),
        ]);
        let application = Catalog::from(vec![
            module("Widgets", "bin/Widgets.dll"),
            module("Extras", "bin/Extras.dll"),
        ]);
        let sources = Sources {
            entry: &entry,
            platform: &platform,
            application: &application,
        };

        assert_eq!(
            sources.resolve(&ModuleName::from("App")),
            Resolution::Resolved(&entry, Lookup::Entry)
        );
        assert_eq!(
            sources.resolve(&ModuleName::from("Widgets")),
            Resolution::Resolved(&platform.modules()[1], Lookup::Platform)
        );
        assert_eq!(
            sources.resolve(&ModuleName::from("Extras")),
            Resolution::Resolved(&application.modules()[1], Lookup::Application)
        );
        assert_eq!(
            sources.resolve(&ModuleName::from("Ghost")),
            Resolution::Unresolved
        );
    }
}
