use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::{fs, process::Command};
use videonote::bilibili::Bilibili;
use videonote::note::{format_timestamp, parse_timestamp, VideoNote};
use videonote::settings::{default_settings_path, Settings};
use videonote::{classify, App, Resolver, SourceKind};
use zbus::{proxy, Connection};

type StdResult<T> = std::result::Result<T, App>;

const INVALID_URL: &str =
    "Invalid video URL: the link is not a local file, a bilibili page or a playable web video.";
const NO_ACTIVE_VIDEO: &str =
    "No active video: open a video with `vnt play <url>` before taking a timestamp.";
const NOT_RUNNING: &str = "videonote is not running, start it with `vnt start`";

#[proxy(
    interface = "org.videonote.Player",
    default_service = "org.videonote.Player",
    default_path = "/org/videonote/Player"
)]
trait VideoPlayer {
    async fn test_connection(&self) -> zbus::Result<()>;
    async fn play(&self, url: &str) -> zbus::Result<()>;
    async fn play_at(&self, url: &str, seconds: f64) -> zbus::Result<()>;
    async fn seek(&self, offset: f64) -> zbus::Result<()>;
    async fn seek_to(&self, seconds: f64) -> zbus::Result<()>;
    async fn toggle(&self) -> zbus::Result<()>;
    async fn stamp(&self) -> zbus::Result<String>;
    async fn open_file(&self, path: &str) -> zbus::Result<()>;
    async fn add_subtitles(&self, paths: &[String]) -> zbus::Result<()>;
    async fn snapshot(&self) -> zbus::Result<()>;
    async fn close(&self) -> zbus::Result<()>;
    async fn clear_source(&self) -> zbus::Result<()>;
    async fn last_notice(&self) -> zbus::Result<String>;
    async fn stop(&self) -> zbus::Result<()>;
}

#[derive(Parser)]
#[command(name = "vnt", about = "Control the videonote player.", version)]
struct Cli {
    #[arg(short = 'c', long = "config", help = "Settings file to read")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Start videonote")]
    Start,

    #[command(about = "Stop videonote")]
    Stop,

    #[command(about = "Play a local file, bilibili page or web video")]
    Play(PlayCommand),

    #[command(about = "Jump to a timestamp (mm:ss or hh:mm:ss)")]
    Goto { ts: String },

    #[command(about = "Seek by a number of seconds, negative to go back")]
    Seek {
        #[arg(allow_hyphen_values = true)]
        seconds: f64,
    },

    #[command(about = "Seek forward by the configured amount")]
    Forward,

    #[command(about = "Seek backward by the configured amount")]
    Backward,

    #[command(about = "Play or pause")]
    Toggle,

    #[command(about = "Print a video-note block for the current position")]
    Stamp,

    #[command(about = "Print a video-note block for a url and start playing it")]
    Note(NoteCommand),

    #[command(about = "Open a local media file")]
    Open { path: PathBuf },

    #[command(about = "Attach subtitle files to the current video")]
    Subtitles {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    #[command(about = "Capture a snapshot of the current frame")]
    Snapshot,

    #[command(about = "Close the player")]
    Close,

    #[command(about = "Unload the current video")]
    Clear,

    #[command(about = "Show the last notice reported by the player")]
    Notice,

    #[command(about = "Show how a url would be handled")]
    Check { url: String },

    #[command(about = "Resolve a url to its playable form without playing it")]
    Resolve { url: String },
}

#[derive(Parser)]
struct PlayCommand {
    url: String,
    #[arg(short = 't', long = "ts", help = "Start at this timestamp")]
    ts: Option<String>,
}

#[derive(Parser)]
struct NoteCommand {
    url: String,
    #[arg(short = 't', long = "title", help = "Title stored in the block")]
    title: Option<String>,
}

#[tokio::main]
async fn main() -> StdResult<()> {
    let cli = Cli::parse();
    let settings_path = match &cli.config {
        Some(path) => path.clone(),
        None => default_settings_path()?,
    };
    let settings = Settings::load(&settings_path).await?;

    match cli.command {
        Commands::Check { url } => {
            check_url(&url);
            Ok(())
        }
        Commands::Resolve { url } => resolve_url(&url, &settings).await,
        command => {
            let connection = Connection::session().await?;
            let proxy = VideoPlayerProxy::new(&connection).await?;
            handle_command(command, cli.config.as_deref(), &settings, &proxy).await
        }
    }
}

async fn handle_command(
    command: Commands,
    config: Option<&Path>,
    settings: &Settings,
    proxy: &VideoPlayerProxy<'_>,
) -> StdResult<()> {
    if let Commands::Start = command {
        return start_videonote(config, proxy).await;
    }
    if !is_videonote_running(proxy).await {
        eprintln!("{NOT_RUNNING}");
        return Ok(());
    }

    match command {
        Commands::Stop => {
            proxy.stop().await?;
            println!("videonote stopped");
        }
        Commands::Play(play_cmd) => handle_play_command(play_cmd, proxy).await?,
        Commands::Goto { ts } => {
            let seconds = parse_timestamp(&ts)
                .ok_or_else(|| App::InvalidInput(format!("Not a timestamp: {ts}")))?;
            proxy.seek_to(seconds_f64(seconds)).await?;
        }
        Commands::Seek { seconds } => proxy.seek(seconds).await?,
        Commands::Forward => proxy.seek(f64::from(settings.forward_seek)).await?,
        Commands::Backward => proxy.seek(-f64::from(settings.forward_seek)).await?,
        Commands::Toggle => proxy.toggle().await?,
        Commands::Stamp => handle_stamp_command(proxy).await?,
        Commands::Note(note_cmd) => handle_note_command(note_cmd, settings, proxy).await?,
        Commands::Open { path } => {
            let path = absolute_path(&path).await?;
            proxy.open_file(&path).await?;
            println!("Opening {path}");
        }
        Commands::Subtitles { paths } => {
            let mut absolute = Vec::with_capacity(paths.len());
            for path in &paths {
                absolute.push(absolute_path(path).await?);
            }
            proxy.add_subtitles(&absolute).await?;
            println!("Added {} subtitle file(s)", absolute.len());
        }
        Commands::Snapshot => proxy.snapshot().await?,
        Commands::Close => proxy.close().await?,
        Commands::Clear => proxy.clear_source().await?,
        Commands::Notice => {
            let notice = proxy.last_notice().await?;
            if notice.is_empty() {
                println!("No notices");
            } else {
                println!("{notice}");
            }
        }
        Commands::Start | Commands::Check { .. } | Commands::Resolve { .. } => {}
    }
    Ok(())
}

async fn handle_play_command(play_cmd: PlayCommand, proxy: &VideoPlayerProxy<'_>) -> StdResult<()> {
    if classify(&play_cmd.url) == SourceKind::Invalid {
        eprintln!("{INVALID_URL}");
        return Ok(());
    }
    match play_cmd.ts.as_deref().and_then(parse_timestamp) {
        Some(seconds) => proxy.play_at(&play_cmd.url, seconds_f64(seconds)).await?,
        None => proxy.play(&play_cmd.url).await?,
    }
    println!("Playing {}", play_cmd.url);
    Ok(())
}

async fn handle_stamp_command(proxy: &VideoPlayerProxy<'_>) -> StdResult<()> {
    let stamp: Value = serde_json::from_str(&proxy.stamp().await?)
        .map_err(|e| App::InvalidInput(format!("Unreadable stamp: {e}")))?;
    let display_url = stamp["playItem"]["displayUrl"].as_str();
    let seconds = stamp["seconds"].as_f64();
    match (display_url, seconds) {
        (Some(url), Some(seconds)) => {
            let note = VideoNote {
                url: Some(url.to_string()),
                title: None,
                ts: Some(format_timestamp(seconds)),
            };
            print!("{}", note.render());
        }
        _ => eprintln!("{NO_ACTIVE_VIDEO}"),
    }
    Ok(())
}

async fn handle_note_command(
    note_cmd: NoteCommand,
    settings: &Settings,
    proxy: &VideoPlayerProxy<'_>,
) -> StdResult<()> {
    if classify(&note_cmd.url) == SourceKind::Invalid {
        eprintln!("{INVALID_URL}");
        return Ok(());
    }
    proxy.play(&note_cmd.url).await?;
    if let Some(heading) = &settings.note_title {
        println!("{heading}");
    }
    let note = VideoNote {
        url: Some(note_cmd.url),
        title: note_cmd.title,
        ts: None,
    };
    print!("{}", note.render());
    Ok(())
}

fn check_url(url: &str) {
    match classify(url) {
        SourceKind::LocalFile => println!("local file"),
        SourceKind::Platform => println!("bilibili page"),
        SourceKind::GenericUrl => println!("web video, plays as {}", videonote::clean(url)),
        SourceKind::Invalid => eprintln!("{INVALID_URL}"),
    }
}

async fn resolve_url(url: &str, settings: &Settings) -> StdResult<()> {
    let bilibili = Bilibili::new(settings.request_timeout())?;
    let resolver = Resolver::new(settings.port, bilibili);
    let item = resolver.resolve(url).await?;
    let json = serde_json::to_string_pretty(&item)
        .map_err(|e| App::InvalidInput(format!("Cannot print item: {e}")))?;
    println!("{json}");
    Ok(())
}

async fn is_videonote_running(proxy: &VideoPlayerProxy<'_>) -> bool {
    proxy.test_connection().await.is_ok()
}

async fn absolute_path(path: &Path) -> StdResult<String> {
    let path = fs::canonicalize(path)
        .await
        .map_err(|e| App::FileAccess(format!("{}: {e}", path.display())))?;
    Ok(path.to_string_lossy().into_owned())
}

#[allow(clippy::cast_precision_loss)]
fn seconds_f64(seconds: u64) -> f64 {
    seconds as f64
}

async fn start_videonote(config: Option<&Path>, proxy: &VideoPlayerProxy<'_>) -> StdResult<()> {
    if is_videonote_running(proxy).await {
        println!("videonote is already running");
        return Ok(());
    }

    let current_exe_path = std::env::current_exe()?;
    let exe_dir = current_exe_path.parent().ok_or_else(|| {
        App::InvalidInput("Failed to get the directory of the executable".to_string())
    })?;
    let daemon_path = exe_dir.join("videonote");

    if !daemon_path.exists() {
        return Err(App::InvalidInput(
            "videonote executable not found in the same directory".to_string(),
        ));
    }

    let child = daemon_command(&daemon_path, config).await?.spawn()?;
    println!("videonote started, process ID: {:?}", child.id());
    Ok(())
}

/// The daemon reads the same settings file as this invocation.
async fn daemon_command(daemon_path: &Path, config: Option<&Path>) -> StdResult<Command> {
    let mut command = Command::new(daemon_path);
    if let Some(config) = config {
        let config = match fs::canonicalize(config).await {
            Ok(path) => path,
            Err(_) => std::env::current_dir()?.join(config),
        };
        command.arg("--config").arg(config);
    }
    Ok(command)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;

    #[tokio::test]
    async fn start_forwards_the_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("settings.toml");
        std::fs::write(&config, "port = 6100\n").unwrap();

        let command = daemon_command(Path::new("/opt/videonote"), Some(&config))
            .await
            .unwrap();

        let args: Vec<&OsStr> = command.as_std().get_args().collect();
        let expected = std::fs::canonicalize(&config).unwrap();
        assert_eq!(args, [OsStr::new("--config"), expected.as_os_str()]);
    }

    #[tokio::test]
    async fn start_without_config_passes_nothing() {
        let command = daemon_command(Path::new("/opt/videonote"), None).await.unwrap();
        assert_eq!(command.as_std().get_args().count(), 0);
    }
}
