use crate::app::pipelines::DispatchRequest;
use crate::config::PipelineSettings;
use crate::utils::error::Result;
use clap::{Args, Parser, Subcommand};
use std::path::Path;

#[derive(Debug, Clone, Parser)]
#[command(name = "interview-etl")]
#[command(about = "Split candidate interview rounds and send interview invitation emails")]
pub struct CliConfig {
    /// Path to TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Use a local directory of JSON tables instead of the HTTP table store
    #[arg(long, global = true)]
    pub store_dir: Option<String>,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Emit JSON log lines")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Explode the raw candidate table into one record per interview round
    Split,
    /// Send one interview invitation and record the outcome
    Dispatch(DispatchArgs),
}

#[derive(Debug, Clone, Args)]
pub struct DispatchArgs {
    #[arg(long)]
    pub email: String,

    #[arg(long)]
    pub name: String,

    #[arg(long)]
    pub round: String,

    #[arg(long)]
    pub calendly: String,

    #[arg(long)]
    pub record_id: String,
}

impl From<DispatchArgs> for DispatchRequest {
    fn from(args: DispatchArgs) -> Self {
        Self {
            email: args.email,
            name: args.name,
            round: args.round,
            calendly: args.calendly,
            record_id: args.record_id,
        }
    }
}

impl CliConfig {
    /// 沒有指定設定檔時使用預設值
    pub fn load_settings(&self) -> Result<PipelineSettings> {
        match &self.config {
            Some(path) => PipelineSettings::from_file(Path::new(path)),
            None => Ok(PipelineSettings::default()),
        }
    }
}
