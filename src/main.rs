use clap::Parser;
use simplelog::{ConfigBuilder, LevelFilter, WriteLogger};
use std::fs::File;
use std::process::ExitCode;
use std::sync::Arc;

use tuidoist::core::config::{self, CliOverrides, EnvOverrides};
use tuidoist::core::query::TimeBasis;
use tuidoist::core::workspace::{Workspace, resolve_time_basis};
use tuidoist::remote::{ErrorKind, TaskService, TodoistClient};

#[derive(Parser)]
#[command(name = "tuidoist", about = "Terminal client for Todoist")]
struct Args {
    /// Initial filter: today, this_week, overdue, all, history or a saved filter name
    #[arg(short, long)]
    filter: Option<String>,

    /// Date basis: local, service or a fixed offset such as +05:30
    #[arg(short, long)]
    timezone: Option<String>,
}

fn fail(message: impl std::fmt::Display) -> ExitCode {
    log::error!("{}", message);
    eprintln!("tuidoist: {message}");
    ExitCode::FAILURE
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    dotenv::dotenv().ok();

    // Initialize file logger - writes to tuidoist.log in current directory
    let log_config = ConfigBuilder::new().set_time_format_rfc3339().build();

    if let Ok(log_file) = File::create("tuidoist.log") {
        let _ = WriteLogger::init(LevelFilter::Debug, log_config, log_file);
    }

    log::info!("tuidoist starting up");

    let file_config = match config::load_config() {
        Ok(c) => c,
        Err(e) => return fail(e),
    };
    let cli = CliOverrides {
        filter: args.filter,
        timezone: args.timezone,
    };
    let resolved = match config::resolve(&file_config, &EnvOverrides::from_env(), &cli) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };

    let client = match TodoistClient::new(resolved.token.clone(), resolved.client_options()) {
        Ok(c) => Arc::new(c),
        Err(e) => return fail(e),
    };

    let basis = match resolve_time_basis(client.as_ref(), resolved.timezone).await {
        Ok(basis) => basis,
        Err(e) if matches!(e.kind(), ErrorKind::Authentication | ErrorKind::DeprecatedEndpoint) => {
            return fail(e);
        }
        Err(e) => {
            log::warn!("Could not read account timezone ({}), using local time", e);
            TimeBasis::Local
        }
    };

    let service: Arc<dyn TaskService> = client;
    let workspace = Arc::new(Workspace::new(service, resolved.cache_ttl, basis));

    match tuidoist::tui::run(workspace, resolved.default_filter) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(e),
    }
}
