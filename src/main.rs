#![forbid(unsafe_code)]

mod autostart;
mod clock;
mod config;
mod constants;
mod error;
mod events;
mod ipc;
mod model;
mod scheduler;
mod shell;
mod store;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::FmtSubscriber;

use autostart::{StartupTask, XdgAutostart};
use clock::SystemClock;
use config::Config;
use ipc::{Client, Request, Response, StatusSnapshot};
use model::{AppTheme, ColorTheme, Gender, NotificationLevel};
use scheduler::ReminderScheduler;
use shell::{App, ToastAction};
use store::JsonFileStore;

#[derive(Parser, Debug)]
#[command(name = "waterly", version, about = "Daily water intake tracker with drink reminders")]
struct Cli {
    /// Use this config file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the background daemon
    Daemon,
    /// Show today's progress and all settings
    Status,
    /// Log a drink (one glass unless --ml is given)
    Drink {
        #[arg(long)]
        ml: Option<i32>,
    },
    /// Overwrite today's amount
    Amount { ml: i32 },
    /// Daily target
    Target { ml: i32 },
    /// Glass size
    Glass { ml: i32 },
    /// Minutes between reminders
    Interval { minutes: i32 },
    /// Minutes a postponed reminder waits
    Delay { minutes: i32 },
    Notifications { level: NotificationLevel },
    Theme { theme: ColorTheme },
    /// Report the desktop theme
    SystemTheme { theme: AppTheme },
    /// Update body information
    Body {
        #[arg(long)]
        gender: Option<Gender>,
        #[arg(long)]
        age: Option<u32>,
        /// Kilograms
        #[arg(long)]
        weight: Option<f32>,
        /// Metres
        #[arg(long)]
        height: Option<f32>,
    },
    /// Start with the desktop session
    Autostart { state: Toggle },
    /// Answer a reminder notification
    Toast { action: ToastAction },
    /// Run the reminder watchdog once
    Tick,
    Suspend,
    Resume,
    /// Stream state changes from the daemon
    Watch,
    /// Stop the daemon
    Stop,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy)]
enum Toggle {
    On,
    Off,
}

impl Command {
    /// `None` for `daemon`, which is not a client command
    fn into_request(self) -> Option<Request> {
        let request = match self {
            Command::Status => Request::Status,
            Command::Drink { ml } => Request::Drink { ml },
            Command::Amount { ml } => Request::SetAmount(ml),
            Command::Target { ml } => Request::SetTarget(ml),
            Command::Glass { ml } => Request::SetGlassSize(ml),
            Command::Interval { minutes } => Request::SetReminderInterval(minutes),
            Command::Delay { minutes } => Request::SetReminderDelay(minutes),
            Command::Notifications { level } => Request::SetNotificationLevel(level),
            Command::Theme { theme } => Request::SetColorTheme(theme),
            Command::SystemTheme { theme } => Request::SetSystemTheme(theme),
            Command::Body {
                gender,
                age,
                weight,
                height,
            } => Request::SetBody {
                gender,
                age,
                weight,
                height,
            },
            Command::Autostart { state } => Request::SetAutoStartup(matches!(state, Toggle::On)),
            Command::Toast { action } => Request::Toast(action),
            Command::Tick => Request::WatchdogTick,
            Command::Suspend => Request::Suspend,
            Command::Resume => Request::Resume,
            Command::Watch => Request::Subscribe,
            Command::Stop => Request::Shutdown,
            Command::Daemon => return None,
        };
        Some(request)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    // LOG_LEVEL wins over the config file
    let log_level = match std::env::var("LOG_LEVEL") {
        Ok(level) => config::parse_level(&level),
        Err(_) => config.trace_level(),
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    debug!(config = ?config, "Configuration loaded");

    let Some(request) = cli.command.into_request() else {
        return shell::daemon::run(&config);
    };

    match request {
        Request::Subscribe => watch(&config),
        Request::Shutdown => {
            let mut client = connect(&config).context("Daemon is not running")?;
            print_response(client.request(Request::Shutdown)?)
        }
        request => {
            let response = match connect(&config) {
                Ok(mut client) => client.request(request)?,
                Err(e) => {
                    debug!(error = ?e, "No daemon, applying request offline");
                    run_offline(&config, request)
                }
            };
            print_response(response)
        }
    }
}

fn connect(config: &Config) -> Result<Client> {
    Client::connect_to(&config.socket_path()?)
}

/// Apply one request directly against the state file
fn run_offline(config: &Config, request: Request) -> Response {
    let clock = Arc::new(SystemClock);
    let startup_task = XdgAutostart::for_current_user().map(|task| Box::new(task) as Box<dyn StartupTask>);
    let mut app = App::new(
        config,
        Arc::new(JsonFileStore::open(config.state_path())),
        clock.clone(),
        Box::new(ReminderScheduler::new(clock)),
        startup_task,
        model::settings::detect_system_theme(),
    );
    app.load();
    app.handle_request(request)
}

fn watch(config: &Config) -> Result<()> {
    let mut client = connect(config).context("Daemon is not running")?;
    match client.request(Request::Subscribe)? {
        Response::Ready => info!("Watching for changes, Ctrl+C to stop"),
        other => bail!("Unexpected response to subscribe: {other:?}"),
    }

    loop {
        match client.recv_response()? {
            Response::Event(event) => println!("{}", serde_json::to_string(&event)?),
            other => debug!(response = ?other, "Ignoring non-event message"),
        }
    }
}

fn print_response(response: Response) -> Result<()> {
    match response {
        Response::Status(status) => print_status(&status),
        Response::Ready | Response::Pong => {}
        Response::Event(event) => println!("{}", serde_json::to_string(&event)?),
        Response::Error(message) => bail!(message),
    }
    Ok(())
}

/// Share of the target reached, in percent
fn progress_percent(amount_ml: i32, target_ml: i32) -> i64 {
    if target_ml > 0 {
        i64::from(amount_ml) * 100 / i64::from(target_ml)
    } else {
        0
    }
}

fn print_status(status: &StatusSnapshot) {
    let percent = progress_percent(status.amount_ml, status.target_ml);
    println!(
        "Today:          {} / {} ml ({}%)",
        status.amount_ml, status.target_ml, percent
    );
    println!("Glass:          {} ml", status.glass_size_ml);
    println!(
        "Reminders:      every {} min, postpone {} min ({:?})",
        status.reminder_interval_minutes, status.reminder_delay_minutes, status.notification_level
    );
    match status.next_reminder {
        Some(at) => println!("Next reminder:  {}", at.with_timezone(&chrono::Local).format("%H:%M")),
        None => println!("Next reminder:  none"),
    }
    println!("Theme:          {:?} ({:?})", status.color_theme, status.applied_theme);
    println!(
        "Autostart:      {} ({})",
        if status.auto_startup_enabled { "on" } else { "off" },
        status.auto_startup_description
    );
    println!(
        "Body:           {:?}, {} y, {:.1} kg, {:.2} m",
        status.gender, status.age, status.weight_kg, status.height_m
    );
    println!("BMI:            {:.1} ({:?})", status.bmi, status.health_status);
    println!("Suggested goal: {} ml", status.recommended_target_ml);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_percent_handles_extremes() {
        assert_eq!(progress_percent(500, 2000), 25);
        assert_eq!(progress_percent(i32::MAX, 1), i64::from(i32::MAX) * 100);
        assert_eq!(progress_percent(i32::MIN, 10_000), i64::from(i32::MIN) / 100);
        assert_eq!(progress_percent(1000, 0), 0);
    }

    #[test]
    fn test_toast_action_parses_from_cli() {
        let cli = Cli::try_parse_from(["waterly", "toast", "postpone"]).unwrap();
        assert!(matches!(
            cli.command.into_request(),
            Some(Request::Toast(ToastAction::Postpone))
        ));
        assert!(Cli::try_parse_from(["waterly", "toast", "snooze"]).is_err());
    }
}
