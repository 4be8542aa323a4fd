//! HTTP service that resolves YouTube video metadata and delivers the audio
//! track as MP3, either streamed through an encoder or as a direct upstream URL.

pub mod auth;
pub mod config;
pub mod delivery;
pub mod duration;
pub mod error;
pub mod metadata;
mod process;
pub mod request;
pub mod retry;
pub mod routes;
pub mod source;
pub mod state;
pub mod transcode;

pub use config::Config;
pub use error::{ApiError, ErrorKind};
pub use routes::router;
pub use state::AppState;
