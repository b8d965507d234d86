mod client;
mod config;
mod types;
mod utils;

pub use client::RemoteSigner;
pub use config::RemoteSignerConfig;
pub use types::{SendCallRequest, SendCallResponse};
