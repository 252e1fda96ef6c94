use flexi_logger::FlexiLoggerError;
use std::io;
use thiserror::Error;
use tokio::sync::mpsc::error::SendError;
use tokio::sync::oneshot::error::RecvError;
use zbus::Error as ZbusError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum App {
    #[error("Invalid video source: {0}")]
    InvalidSource(String),

    #[error("Resolution error: {0}")]
    Resolution(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Local server bind error: {0}")]
    ServerBind(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("File access error: {0}")]
    FileAccess(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("TOML parsing error: {0}")]
    TomlParsing(String),

    #[error("Logger initialization error: {0}")]
    Logger(String),

    #[error("Channel send error: {0}")]
    Send(String),

    #[error("Player error: {0}")]
    Player(String),

    #[error("ZBus error: {0}")]
    Zbus(String),
}

impl From<reqwest::Error> for App {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            App::Timeout(error.to_string())
        } else {
            App::Resolution(error.to_string())
        }
    }
}

impl From<io::Error> for App {
    fn from(error: io::Error) -> Self {
        App::Io(error.to_string())
    }
}

impl From<toml::de::Error> for App {
    fn from(error: toml::de::Error) -> Self {
        App::TomlParsing(error.to_string())
    }
}

impl From<toml::ser::Error> for App {
    fn from(error: toml::ser::Error) -> Self {
        App::TomlParsing(error.to_string())
    }
}

impl From<FlexiLoggerError> for App {
    fn from(error: FlexiLoggerError) -> Self {
        App::Logger(error.to_string())
    }
}

impl<T> From<SendError<T>> for App {
    fn from(error: SendError<T>) -> Self {
        App::Send(error.to_string())
    }
}

impl From<RecvError> for App {
    fn from(error: RecvError) -> Self {
        App::Send(error.to_string())
    }
}

impl From<ZbusError> for App {
    fn from(error: ZbusError) -> Self {
        App::Zbus(error.to_string())
    }
}

impl From<App> for zbus::fdo::Error {
    fn from(error: App) -> Self {
        zbus::fdo::Error::Failed(error.to_string())
    }
}
