// mcs-api: Async Rust client for the MCS media-control-system REST API

pub mod client;
pub mod error;
pub mod models;
pub mod session;
pub mod transport;

mod channels;
mod layouts;
mod outputs;

pub use client::{API_PREFIX, McsClient, base_url};
pub use error::Error;
pub use models::{
    AudioRoute, Channel, Document, Labeled, Layout, MuxAudio, Muxing, Output, OutputInput, Tile,
};
pub use session::{Credentials, EXPIRY_SKEW_SECS, Session, SessionManager};
pub use transport::{TlsMode, TransportConfig};

pub use reqwest::Method;
