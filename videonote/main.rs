use clap::Parser;
use flexi_logger::{Cleanup, Criterion, Duplicate, FileSpec, Logger, Naming};
use log::{error, info};
use std::path::PathBuf;
use std::process;
use tokio::{fs, sync::watch, task};
use videonote::bilibili::Bilibili;
use videonote::player::DefaultHost;
use videonote::router::CommandRouter;
use videonote::settings::{config_dir, default_settings_path};
use videonote::store::ResumeStore;
use videonote::{dbus, server, session, App, Resolver};

#[derive(Parser)]
#[command(
    name = "videonote",
    about = "Video note player daemon, controlled with vnt.",
    version
)]
struct Args {
    #[arg(short = 'c', long = "config", help = "Settings file to use")]
    config: Option<PathBuf>,
    #[arg(short = 'p', long = "port", help = "Preferred port of the local media server")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), App> {
    let args = Args::parse();

    let log_dir = config_dir()?.join("logs");
    fs::create_dir_all(&log_dir).await?;

    // Logger setup
    let _logger = Logger::try_with_env_or_str("info")?
        .log_to_file(FileSpec::default().directory(&log_dir))
        .rotate(
            Criterion::Size(1_000_000),
            Naming::Timestamps,
            Cleanup::KeepLogFiles(3),
        )
        .duplicate_to_stderr(Duplicate::Warn)
        .start()?;

    let settings_path = match args.config {
        Some(path) => path,
        None => default_settings_path()?,
    };
    let store = ResumeStore::load(&settings_path).await?;
    info!("Settings loaded from {}", settings_path.display());

    let preferred_port = args.port.unwrap_or(store.settings().port);
    let port = server::ensure_started(preferred_port).await.map_err(|e| {
        error!("Cannot start the local media server: {e}");
        e
    })?;

    let bilibili = Bilibili::new(store.settings().request_timeout())?;
    let resolver = Resolver::new(port, bilibili);
    let router = CommandRouter::new(store, port);
    let (session, session_task) = session::spawn(router, resolver, Box::new(DefaultHost));

    let (stop_sender, stop_receiver) = watch::channel(());

    task::spawn({
        let session = session.clone();
        let stop_sender = stop_sender.clone();
        async move {
            if let Err(e) = dbus::run_dbus_server(session, stop_sender.clone()).await {
                error!("DBus server error: {e}");
                let _ = stop_sender.send(());
            }
        }
    });

    task::spawn({
        let stop_sender = stop_sender.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupted");
                let _ = stop_sender.send(());
            }
        }
    });

    wait_for_stop_signal(stop_receiver).await;

    if let Err(e) = session.shutdown().await {
        error!("Failed to stop session cleanly: {e}");
    }
    if let Err(e) = session_task.await {
        error!("Session task failed: {e}");
    }
    server::stop().await;
    info!("videonote stopped");
    process::exit(0);
}

async fn wait_for_stop_signal(mut stop_receiver: watch::Receiver<()>) {
    if stop_receiver.changed().await.is_err() {
        error!("Stop signal channel closed");
    }
}
