use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use fleetwatch_core::{
    config::DEFAULT_LOCAL_OFFSET_HOURS,
    shift::{parse_date, parse_time},
    CronSchedule, Recurrence, ReportWindow, ReportingConfig, ScheduleSpec, StatusAggregator,
    StatusCategory, StatusHistory,
};
use tokio::net::TcpListener;
use tokio::signal::ctrl_c;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod backup_runner;
mod config;
mod db;
mod error;
mod mail_runner;
mod mailer;
mod reports;
mod routes;
mod scheduler;
mod state;

#[cfg(test)]
mod test_support;
#[cfg(test)]
mod backup_runner_tests;
#[cfg(test)]
mod reports_tests;

use config::{BackupConfig, ServerConfig, SmtpConfig};
use db::Database;
use state::AppState;

#[derive(Debug, Parser)]
#[command(name = "fleetwatchd")]
#[command(about = "Robot controller fleet monitoring backend")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(long, env = "FLEETWATCH_PORT", default_value_t = 5000)]
    port: u16,

    #[arg(long, env = "FLEETWATCH_DATABASE", default_value = "./data/fleetwatch.db")]
    database: PathBuf,

    /// Hours added to UTC to get controller-local wall time, within -23..=23.
    #[arg(
        long,
        env = "FLEETWATCH_UTC_OFFSET_HOURS",
        default_value_t = DEFAULT_LOCAL_OFFSET_HOURS,
        allow_hyphen_values = true,
        value_parser = clap::value_parser!(i32).range(-23..=23)
    )]
    utc_offset_hours: i32,

    #[arg(long, env = "FLEETWATCH_REPORT_DIR", default_value = "./data/reports")]
    report_dir: PathBuf,

    #[arg(long, env = "FLEETWATCH_SMTP_HOST")]
    smtp_host: Option<String>,

    #[arg(long, env = "FLEETWATCH_SMTP_PORT", default_value_t = 587)]
    smtp_port: u16,

    #[arg(long, env = "FLEETWATCH_SMTP_USER")]
    smtp_user: Option<String>,

    #[arg(long, env = "FLEETWATCH_SMTP_PASSWORD", hide_env_values = true)]
    smtp_password: Option<String>,

    #[arg(long, env = "FLEETWATCH_SMTP_FROM", default_value = "fleetwatch@localhost")]
    smtp_from: String,

    #[arg(long, env = "FLEETWATCH_SMTP_STARTTLS", default_value_t = true, action = ArgAction::Set)]
    smtp_starttls: bool,

    #[arg(long, env = "FLEETWATCH_BACKUP_SOURCE", default_value = "./data/controllers")]
    backup_source: PathBuf,

    #[arg(long, env = "FLEETWATCH_BACKUP_ROOT", default_value = "./data/backups")]
    backup_root: PathBuf,

    #[arg(long, env = "FLEETWATCH_BACKUP_RETRIES", default_value_t = 3)]
    backup_retries: u32,

    #[arg(long, env = "FLEETWATCH_BACKUP_RETRY_DELAY_SECS", default_value_t = 300)]
    backup_retry_delay_secs: u64,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run migrations, start the schedulers and serve the HTTP API.
    Serve,
    /// Apply pending migrations and exit.
    Migrate,
    /// Compute one controller's status history and print it.
    Status {
        #[arg(long)]
        controller_id: i64,
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        days: Option<u32>,
        #[arg(long)]
        shift_id: Option<i64>,
        #[arg(long, value_enum, default_value = "human")]
        format: OutputFormat,
    },
    /// Print the cron expression a schedule translates to and its next fire times.
    Cron {
        #[arg(long)]
        date: String,
        #[arg(long)]
        time: String,
        #[arg(long)]
        repeat: Option<String>,
        #[arg(long, default_value_t = 5)]
        count: usize,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Human,
    Json,
}

impl Cli {
    fn server_config(&self) -> ServerConfig {
        let smtp = self.smtp_host.as_ref().map(|host| SmtpConfig {
            host: host.clone(),
            port: self.smtp_port,
            username: self.smtp_user.clone(),
            password: self.smtp_password.clone(),
            from: self.smtp_from.clone(),
            starttls: self.smtp_starttls,
        });

        ServerConfig {
            port: self.port,
            database_path: self.database.clone(),
            report_dir: self.report_dir.clone(),
            reporting: ReportingConfig::new(self.utc_offset_hours),
            smtp,
            backup: BackupConfig {
                source_root: self.backup_source.clone(),
                backup_root: self.backup_root.clone(),
                retry: ServerConfig::backup_retry(self.backup_retries, self.backup_retry_delay_secs),
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();
    let config = cli.server_config();

    match cli.command {
        Command::Serve => serve(config).await?,
        Command::Migrate => {
            let db = Database::new(config.database_path.clone())?;
            info!(path = %db.path().display(), "migrations applied");
        }
        Command::Status {
            controller_id,
            date,
            days,
            shift_id,
            format,
        } => {
            let db = Database::new(config.database_path.clone())?;
            let history =
                compute_status(&db, &config.reporting, controller_id, date, days, shift_id).await?;
            print_history(controller_id, &history, format)?;
        }
        Command::Cron {
            date,
            time,
            repeat,
            count,
        } => print_cron(&config.reporting, &date, &time, repeat.as_deref(), count)?,
    }

    Ok(())
}

async fn serve(config: ServerConfig) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let state = AppState::open(config)?;
    state.start_schedulers().await?;

    let app = routes::create_router(state.clone());
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.shutdown();
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("received ctrl-c, shutting down"),
            Err(err) => {
                error!(error = %err, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("received terminate signal, shutting down");
            }
            Err(err) => {
                error!(error = %err, "failed to install terminate handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn compute_status(
    db: &Database,
    reporting: &ReportingConfig,
    controller_id: i64,
    date: Option<String>,
    days: Option<u32>,
    shift_id: Option<i64>,
) -> Result<StatusHistory> {
    let date = date.as_deref().map(parse_date).transpose()?;
    let shift = match shift_id {
        Some(id) => Some(
            db.get_shift(id)
                .await?
                .with_context(|| format!("shift {id} not found"))?
                .window(),
        ),
        None => None,
    };

    let window = ReportWindow::resolve(date, days, shift, reporting.local_today(Utc::now()), reporting)?;
    let snapshots = db.fetch_snapshots(controller_id, &window, reporting).await?;
    Ok(StatusAggregator::new(reporting.clone()).aggregate(&snapshots))
}

fn print_history(controller_id: i64, history: &StatusHistory, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(history)?),
        OutputFormat::Human => {
            println!("=== Controller {controller_id} ===");
            for category in StatusCategory::ALL {
                println!(
                    "{:<14} {:>10.2} min",
                    category.as_str(),
                    history.status_durations.get(category)
                );
            }
            println!("Operating rate: {:.2}%", history.operating_rate);
            println!("Records:        {}", history.total_records);
        }
    }
    Ok(())
}

fn print_cron(
    reporting: &ReportingConfig,
    date: &str,
    time: &str,
    repeat: Option<&str>,
    count: usize,
) -> Result<()> {
    let (date, time) = (parse_date(date)?, parse_time(time)?);
    let spec = match repeat {
        Some(value) => ScheduleSpec::recurring(date, time, value.parse::<Recurrence>()?),
        None => ScheduleSpec::one_time(date, time),
    };

    let expression = spec.cron_expression();
    let schedule = CronSchedule::parse(&expression)?;
    let offset = reporting.fixed_offset();

    println!("cron: {expression}");
    for fire in schedule.upcoming(Utc::now(), offset, count) {
        println!("  {}", fire.with_timezone(&offset).format("%Y-%m-%d %H:%M %:z"));
    }
    Ok(())
}
