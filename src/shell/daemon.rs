//! Background daemon
//!
//! The main loop owns the [`App`]. IPC connections, the watchdog ticker and
//! the signal listener each run on their own thread and only talk to the
//! loop through [`Command`]s.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::io::{ErrorKind, Read};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::{App, BackgroundTask};
use crate::autostart::{StartupTask, XdgAutostart};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::constants;
use crate::events::EventBus;
use crate::ipc::{self, Client, Request, Response, Server};
use crate::model::settings::detect_system_theme;
use crate::scheduler::ReminderScheduler;
use crate::store::JsonFileStore;

/// Work for the main loop
pub enum Command {
    /// Client request; the answer goes back on `reply`
    Request {
        request: Request,
        reply: Sender<Response>,
    },
    Background(BackgroundTask),
    Resume,
    Shutdown,
}

pub fn run(config: &Config) -> Result<()> {
    let store = Arc::new(JsonFileStore::open(config.state_path()));
    info!(state = %store.path().display(), "Using state file");
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let scheduler = Box::new(ReminderScheduler::new(clock.clone()));
    let startup_task = XdgAutostart::for_current_user().map(|task| Box::new(task) as Box<dyn StartupTask>);

    let mut app = App::new(
        config,
        store,
        clock.clone(),
        scheduler,
        startup_task,
        detect_system_theme(),
    );
    app.load();

    let socket_path = config.socket_path()?;
    let server = Server::bind_to(socket_path.clone())?;
    info!(socket = ?socket_path, "Daemon listening");

    let (tx, rx) = mpsc::channel();
    spawn_ipc_listener(server, app.events().clone(), tx.clone());
    spawn_watchdog(
        Duration::from_secs(config.watchdog_interval_minutes.max(1) * 60),
        tx.clone(),
    );
    #[cfg(unix)]
    spawn_signal_listener(tx.clone())?;
    drop(tx);

    run_loop(&mut app, &rx, clock.as_ref());

    // The listener thread is still blocked in accept and keeps the server alive
    if let Err(e) = std::fs::remove_file(&socket_path) {
        debug!(error = %e, "Socket already gone");
    }
    info!("Daemon stopped");
    Ok(())
}

/// Process commands until shutdown, firing reminders as they come due
pub fn run_loop(app: &mut App, commands: &Receiver<Command>, clock: &dyn Clock) {
    loop {
        let wait = wait_until(app.next_reminder(), clock.now());
        match commands.recv_timeout(wait) {
            Ok(Command::Request {
                request: Request::Shutdown,
                reply,
            }) => {
                info!("Received shutdown request via IPC");
                app.suspend();
                reply.send(Response::Ready).ok();
                break;
            }
            Ok(Command::Request { request, reply }) => {
                debug!(request = ?request, "Handling request");
                let response = app.handle_request(request);
                if reply.send(response).is_err() {
                    warn!("Client went away before the reply was sent");
                }
            }
            Ok(Command::Background(task)) => app.handle_background(task),
            Ok(Command::Resume) => app.resume(),
            Ok(Command::Shutdown) => {
                app.suspend();
                break;
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                warn!("All command senders gone, stopping");
                app.suspend();
                break;
            }
        }
        app.fire_due_reminders();
    }
}

fn wait_until(next: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Duration {
    let idle = Duration::from_secs(constants::watchdog::IDLE_WAIT_SECS);
    match next {
        Some(at) => (at - now).to_std().unwrap_or(Duration::ZERO).min(idle),
        None => idle,
    }
}

/// Accept connections; each one gets its own thread
fn spawn_ipc_listener(server: Server, events: EventBus, commands: Sender<Command>) {
    thread::spawn(move || {
        info!(socket = ?server.path(), "IPC listener started");
        loop {
            match server.accept() {
                Ok(client) => {
                    let events = events.clone();
                    let commands = commands.clone();
                    thread::spawn(move || {
                        if let Err(e) = handle_connection(client, &events, &commands) {
                            debug!(error = ?e, "IPC connection closed");
                        }
                    });
                }
                Err(e) => {
                    error!(error = ?e, "IPC listener thread crashed");
                    break;
                }
            }
        }
    });
}

fn handle_connection(mut client: Client, events: &EventBus, commands: &Sender<Command>) -> Result<()> {
    loop {
        let request: Request = ipc::read_message(&mut client.stream)?;

        if request == Request::Subscribe {
            return stream_events(client, events);
        }

        let (reply_tx, reply_rx) = mpsc::channel();
        commands
            .send(Command::Request {
                request,
                reply: reply_tx,
            })
            .context("Daemon main loop is gone")?;
        let response = reply_rx.recv().context("Daemon dropped the request")?;
        ipc::write_message(&mut client.stream, &response)?;
    }
}

/// Push events to a subscribed client until it hangs up
fn stream_events(mut client: Client, events: &EventBus) -> Result<()> {
    // Subscribe before acknowledging so nothing published after Ready is missed
    let mut subscription = events.subscribe();
    ipc::write_message(&mut client.stream, &Response::Ready)?;
    info!("Client subscribed to events");

    client
        .stream
        .set_read_timeout(Some(Duration::from_millis(constants::ipc::WATCH_POLL_MILLIS)))
        .context("Failed to set read timeout on watch connection")?;

    let mut buf = [0u8; 64];
    loop {
        for event in subscription.drain() {
            ipc::write_message(&mut client.stream, &Response::Event(event))?;
        }

        // A subscribed client never sends anything; EOF means it left
        match client.stream.read(&mut buf) {
            Ok(0) => {
                info!("Watch client disconnected");
                return Ok(());
            }
            Ok(_) => {}
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted) => {}
            Err(e) => return Err(e).context("Watch connection failed"),
        }
    }
}

fn spawn_watchdog(period: Duration, commands: Sender<Command>) {
    thread::spawn(move || {
        info!(period_secs = period.as_secs(), "Reminder watchdog started");
        loop {
            thread::sleep(period);
            if commands
                .send(Command::Background(BackgroundTask::ReminderWatchdog))
                .is_err()
            {
                break;
            }
        }
    });
}

/// SIGINT/SIGTERM stop the daemon, SIGCONT means we were resumed
#[cfg(unix)]
fn spawn_signal_listener(commands: Sender<Command>) -> Result<()> {
    use signal_hook::consts::{SIGCONT, SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals =
        Signals::new([SIGINT, SIGTERM, SIGCONT]).context("Failed to register signal handlers")?;

    thread::spawn(move || {
        for signal in signals.forever() {
            let command = match signal {
                SIGCONT => Command::Resume,
                _ => {
                    info!(signal, "Received termination signal");
                    Command::Shutdown
                }
            };
            if commands.send(command).is_err() {
                break;
            }
        }
    });
    Ok(())
}
