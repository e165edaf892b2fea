#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use cli::{CliConfig, Command, DispatchArgs};
pub use toml_config::{
    CalendlyLinks, EmailSettings, FieldLimits, PipelineSettings, SplitSettings, StoreSettings,
};
