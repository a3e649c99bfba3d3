pub mod catalog;
pub mod cli;
pub mod companion;
pub mod config;
pub mod metadata;
pub mod model;
pub mod resolver;

mod api;

pub use api::{AssemblyClosure, AssemblyClosureBuilder, ModuleInfo};
