use anyhow::Context;
use clap::Parser;
use interview_etl::config::{CliConfig, Command, EmailSettings};
use interview_etl::domain::model::ProcessingSummary;
use interview_etl::utils::error::truncate_message;
use interview_etl::utils::logger;
use interview_etl::utils::validation::{sanitize, MAX_RECORD_ID_LENGTH};
use interview_etl::{
    execute_dispatch, execute_split, DispatchReport, DispatchRequest, HttpTableStore, LocalStore,
    PipelineSettings,
};

#[tokio::main]
async fn main() {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.json_logs {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting interview-etl");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    let settings = cli
        .load_settings()
        .with_context(|| format!("failed to load configuration {:?}", cli.config));

    let success = match settings {
        Ok(settings) => run_command(&cli, &settings).await,
        Err(e) => report_load_failure(&cli.command, &e),
    };

    if !success {
        std::process::exit(1);
    }
}

async fn run_command(cli: &CliConfig, settings: &PipelineSettings) -> bool {
    match (&cli.command, &cli.store_dir) {
        (Command::Split, Some(dir)) => print_summary(execute_split(LocalStore::new(dir), settings).await),
        (Command::Split, None) => {
            print_summary(execute_split(HttpTableStore::new(&settings.store), settings).await)
        }
        (Command::Dispatch(args), Some(dir)) => {
            let request = DispatchRequest::from(args.clone());
            print_report(execute_dispatch(LocalStore::new(dir), settings, &request).await)
        }
        (Command::Dispatch(args), None) => {
            let request = DispatchRequest::from(args.clone());
            print_report(
                execute_dispatch(HttpTableStore::new(&settings.store), settings, &request).await,
            )
        }
    }
}

/// 設定檔讀不到或無法解析時，仍輸出與一般失敗相同格式的狀態行
fn report_load_failure(command: &Command, error: &anyhow::Error) -> bool {
    let message = truncate_message(
        &format!("{:#}", error),
        EmailSettings::default().max_error_length,
    );
    tracing::error!("❌ {}", message);

    match command {
        Command::Split => print_summary(ProcessingSummary::fatal(message)),
        Command::Dispatch(args) => print_report(DispatchReport::failure(
            sanitize(&args.record_id, MAX_RECORD_ID_LENGTH),
            message,
        )),
    }
}

fn print_summary(summary: ProcessingSummary) -> bool {
    for error in &summary.errors {
        tracing::warn!("{}", error);
    }
    println!("{}", summary.status_line());
    summary.success
}

fn print_report(report: DispatchReport) -> bool {
    println!("{}", report.status_line());
    report.success
}
