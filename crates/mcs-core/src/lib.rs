// mcs-core: Command scheduling, session lifecycle and state caching between mcs-api and consumers.

pub mod command;
pub mod config;
pub mod controller;
pub mod error;
pub mod poller;
pub mod scheduler;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::{Command, CommandResult, PRIMARY_AUDIO_ROUTE};
pub use config::{ControllerConfig, PollingConfig, QueueConfig, TlsVerification};
pub use controller::{ConnectionState, Controller};
pub use error::CoreError;
pub use poller::PollState;
pub use scheduler::{CommandScheduler, ScheduleOptions};
pub use store::{Choice, ChoiceSet, DeviceSnapshot, OutputSummary, StateStore};

// Re-export wire model types at the crate root for ergonomics.
pub use mcs_api::{AudioRoute, Channel, Document, Layout, Method, Output, Tile};
