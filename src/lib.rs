pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::{HttpEmailTransport, HttpTableStore, LocalStore};
pub use app::pipelines::{
    execute_dispatch, execute_split, DispatchPipeline, DispatchReport, DispatchRequest,
    SplitPipeline,
};
pub use config::PipelineSettings;
pub use crate::core::{dispatcher::EmailDispatcher, splitter::RoundSplitter};
pub use utils::error::{PipelineError, Result};
