// ── Controller abstraction ──
//
// Full lifecycle management for one MCS device connection. Handles
// authentication, the command scheduler, background polling, and the
// reactive state cache behind a small collaborator-facing surface.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use mcs_api::transport::{TlsMode, TransportConfig};
use mcs_api::{Credentials, Document, Layout, McsClient, Method, Output};
use serde_json::Value;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::command::{Command, CommandResult, with_audio_channel, with_layout, with_tile_channel};
use crate::config::{ControllerConfig, TlsVerification};
use crate::error::CoreError;
use crate::poller::{PollState, Poller};
use crate::scheduler::{CommandScheduler, ScheduleOptions};
use crate::store::{ChoiceSet, DeviceSnapshot, StateStore};

// ── ConnectionState ──────────────────────────────────────────────

/// Connection status observable by consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Ok,
    BadConfig { reason: String },
    ConnectionFailure { reason: String },
}

// ── Controller ───────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<ControllerInner>`. Owns one device session,
/// one command queue and one poller.
#[derive(Clone)]
pub struct Controller {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    config: ControllerConfig,
    store: Arc<StateStore>,
    poller: Poller,
    connection_state: watch::Sender<ConnectionState>,
    client: ArcSwapOption<McsClient>,
    scheduler: ArcSwapOption<CommandScheduler>,
}

impl Controller {
    /// Create a new Controller from configuration. Does NOT connect --
    /// call [`connect()`](Self::connect) to authenticate and start background tasks.
    pub fn new(config: ControllerConfig) -> Self {
        Self::build(config, None)
    }

    /// Create a Controller around an already-built client.
    ///
    /// `connect()` uses this client instead of deriving one from the
    /// configured host, port and TLS settings.
    pub fn from_client(config: ControllerConfig, client: McsClient) -> Self {
        Self::build(config, Some(Arc::new(client)))
    }

    fn build(config: ControllerConfig, client: Option<Arc<McsClient>>) -> Self {
        let (connection_state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(ControllerInner {
                config,
                store: Arc::new(StateStore::new()),
                poller: Poller::new(),
                connection_state,
                client: ArcSwapOption::new(client),
                scheduler: ArcSwapOption::empty(),
            }),
        }
    }

    /// Access the controller configuration.
    pub fn config(&self) -> &ControllerConfig {
        &self.inner.config
    }

    /// Access the underlying StateStore.
    pub fn store(&self) -> &Arc<StateStore> {
        &self.inner.store
    }

    fn client(&self) -> Result<Arc<McsClient>, CoreError> {
        self.inner.client.load_full().ok_or(CoreError::Disconnected)
    }

    // ── Connection lifecycle ─────────────────────────────────────

    /// Connect to the device.
    ///
    /// Validates the configuration, logs in, performs an initial state
    /// refresh, and starts the command scheduler and (when enabled) the
    /// poller.
    pub async fn connect(&self) -> Result<(), CoreError> {
        self.set_state(ConnectionState::Connecting);
        let config = &self.inner.config;

        if let Err(e) = config.validate() {
            return Err(self.fail(e));
        }

        let client = match self.inner.client.load_full() {
            Some(client) => client,
            None => {
                let client = Arc::new(build_client(config).map_err(|e| self.fail(e))?);
                self.inner.client.store(Some(Arc::clone(&client)));
                client
            }
        };
        debug!(base_url = %client.base_url(), "connecting");

        if let Err(e) = client.session().login().await {
            return Err(self.fail(e.into()));
        }
        debug!("session authentication successful");

        if let Err(e) = self.refresh_state().await {
            return Err(self.fail(e));
        }

        let running = self
            .inner
            .scheduler
            .load_full()
            .is_some_and(|s| s.is_running());
        if !running {
            let scheduler = CommandScheduler::spawn(CancellationToken::new());
            self.inner.scheduler.store(Some(Arc::new(scheduler)));
        }

        if config.polling.enabled {
            self.start_polling(config.polling.interval);
        }

        self.set_state(ConnectionState::Ok);
        info!(
            outputs = self.inner.store.output_count(),
            layouts = self.inner.store.layout_count(),
            channels = self.inner.store.channel_count(),
            "connected to device"
        );
        Ok(())
    }

    /// Disconnect from the device.
    ///
    /// Stops polling, shuts down the scheduler (queued commands fail with
    /// `Disconnected`), drops the session and the cached state.
    pub async fn disconnect(&self) {
        self.inner.poller.stop();

        if let Some(scheduler) = self.inner.scheduler.swap(None) {
            scheduler.shutdown().await;
        }

        if let Some(client) = self.inner.client.load_full() {
            client.session().clear();
        }

        self.inner.store.clear();
        self.set_state(ConnectionState::Disconnected);
        debug!("disconnected");
    }

    /// Fetch outputs, layouts and channels and replace the cached state.
    ///
    /// Returns `true` when the derived choice lists changed.
    pub async fn refresh_state(&self) -> Result<bool, CoreError> {
        let client = self.client()?;

        let (outputs, layouts, channels) = tokio::try_join!(
            client.list_outputs(),
            client.list_layouts(),
            client.list_channels(),
        )?;

        let changed = self.inner.store.apply_snapshot(outputs, layouts, channels);
        if changed {
            debug!("choices changed");
        }

        debug!(
            outputs = self.inner.store.output_count(),
            layouts = self.inner.store.layout_count(),
            channels = self.inner.store.channel_count(),
            "state refresh complete"
        );
        Ok(changed)
    }

    // ── Polling ──────────────────────────────────────────────────

    /// Poll device state every `interval`, replacing any running poller.
    ///
    /// The first failure halts polling and marks the connection as failed.
    pub fn start_polling(&self, interval: Duration) {
        let weak = Arc::downgrade(&self.inner);
        self.inner.poller.start(interval, move || {
            let weak = weak.clone();
            async move {
                let inner = weak.upgrade().ok_or(CoreError::Disconnected)?;
                let controller = Controller { inner };
                match controller.refresh_state().await {
                    Ok(_) => Ok(()),
                    Err(e) => {
                        controller.set_state(ConnectionState::ConnectionFailure {
                            reason: format!("Polling failed: {e}"),
                        });
                        Err(CoreError::PollingFailed {
                            message: e.to_string(),
                        })
                    }
                }
            }
        });
    }

    /// Stop polling. Idempotent.
    pub fn stop_polling(&self) {
        self.inner.poller.stop();
    }

    pub fn poll_state(&self) -> PollState {
        self.inner.poller.state()
    }

    pub fn subscribe_poll_state(&self) -> watch::Receiver<PollState> {
        self.inner.poller.subscribe()
    }

    // ── Command execution ────────────────────────────────────────

    /// Run `operation` in the device's command queue.
    pub async fn schedule_command<T, F, Fut>(
        &self,
        options: ScheduleOptions,
        operation: F,
    ) -> Result<T, CoreError>
    where
        T: Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, CoreError>> + Send + 'static,
    {
        let scheduler = self
            .inner
            .scheduler
            .load_full()
            .ok_or(CoreError::Disconnected)?;
        scheduler.schedule(options, operation).await
    }

    /// Execute a device command.
    ///
    /// The target is re-read from the device inside the command's scheduler
    /// slot, so the PUT always builds on current state.
    pub async fn execute(&self, cmd: Command) -> Result<CommandResult, CoreError> {
        let client = self.client()?;
        let store = Arc::clone(&self.inner.store);
        let options = self.inner.config.queue.schedule_options(cmd.tag());
        let tag = cmd.tag();
        let target = cmd.target().to_owned();

        let result = self
            .schedule_command(options, move || async move {
                run_command(&client, &store, &cmd).await
            })
            .await;

        if let Err(ref e) = result {
            warn!(tag, uuid = %target, error = %e, "command failed");
        }
        result
    }

    /// Authenticated JSON request outside the command queue.
    pub async fn request_json(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, CoreError> {
        let client = self.client()?;
        Ok(client.request(method, path, body).await?)
    }

    // ── One-shot convenience ─────────────────────────────────────

    /// One-shot: connect, run closure, disconnect.
    ///
    /// Optimized for CLI: disables polling since we only need a single
    /// request-response cycle.
    pub async fn oneshot<F, Fut, T>(config: ControllerConfig, f: F) -> Result<T, CoreError>
    where
        F: FnOnce(Controller) -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let mut cfg = config;
        cfg.polling.enabled = false;

        let controller = Controller::new(cfg);
        controller.connect().await?;
        let result = f(controller.clone()).await;
        controller.disconnect().await;
        result
    }

    // ── State observation ────────────────────────────────────────

    pub fn connection_state(&self) -> ConnectionState {
        self.inner.connection_state.borrow().clone()
    }

    /// Subscribe to connection state changes.
    pub fn subscribe_connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection_state.subscribe()
    }

    // ── Snapshot accessors (delegate to StateStore) ──────────────

    pub fn snapshot(&self) -> Arc<DeviceSnapshot> {
        self.inner.store.snapshot()
    }

    pub fn choices(&self) -> Arc<ChoiceSet> {
        self.inner.store.choices()
    }

    pub fn subscribe_choices(&self) -> watch::Receiver<Arc<ChoiceSet>> {
        self.inner.store.subscribe_choices()
    }

    // ── Internals ────────────────────────────────────────────────

    fn set_state(&self, state: ConnectionState) {
        let previous = self.inner.connection_state.send_replace(state.clone());
        if previous != state {
            match &state {
                ConnectionState::BadConfig { reason }
                | ConnectionState::ConnectionFailure { reason } => {
                    warn!(?state, %reason, "connection state changed");
                }
                _ => debug!(?state, "connection state changed"),
            }
        }
    }

    /// Record a connect-time failure in the connection state.
    fn fail(&self, err: CoreError) -> CoreError {
        let reason = err.to_string();
        let state = match &err {
            CoreError::BadConfig { .. } => ConnectionState::BadConfig { reason },
            _ => ConnectionState::ConnectionFailure { reason },
        };
        self.set_state(state);
        err
    }
}

// ── Command routing ──────────────────────────────────────────────

/// Read the target, apply the mutation to a copy, write the copy back.
async fn run_command(
    client: &McsClient,
    store: &StateStore,
    cmd: &Command,
) -> Result<CommandResult, CoreError> {
    match cmd {
        Command::ApplyLayout { output, layout } => {
            let current = fetch_output(client, output).await?;
            let next = with_layout(&current, layout)?;

            info!(
                tag = cmd.tag(),
                output = %display_name(current.model.label.as_deref(), output),
                layout = %store.layout_label(layout).unwrap_or_else(|| layout.clone()),
                "applying layout"
            );
            write_output(client, &next).await?;
            Ok(CommandResult::Output(next.model))
        }

        Command::SetAudioChannel {
            output,
            channel,
            audio_index,
        } => {
            let current = fetch_output(client, output).await?;
            let next = with_audio_channel(&current, channel, *audio_index)?;

            info!(
                tag = cmd.tag(),
                output = %display_name(current.model.label.as_deref(), output),
                channel = %store.channel_label(channel).unwrap_or_else(|| channel.clone()),
                audio_index,
                "setting audio channel"
            );
            write_output(client, &next).await?;
            Ok(CommandResult::Output(next.model))
        }

        Command::SetLayoutTile {
            layout,
            tile,
            channel,
        } => {
            let current = fetch_layout(client, layout).await?;
            let next = with_tile_channel(&current, *tile, channel)?;

            info!(
                tag = cmd.tag(),
                layout = %display_name(current.model.label.as_deref(), layout),
                tile,
                channel = %store.channel_label(channel).unwrap_or_else(|| channel.clone()),
                "modifying layout tile"
            );
            write_layout(client, &next).await?;
            Ok(CommandResult::Layout(next.model))
        }
    }
}

async fn fetch_output(client: &McsClient, uuid: &str) -> Result<Document<Output>, CoreError> {
    client
        .get_output(uuid)
        .await
        .map_err(|e| CoreError::from(e).or_not_found("output", uuid))
}

async fn fetch_layout(client: &McsClient, uuid: &str) -> Result<Document<Layout>, CoreError> {
    client
        .get_layout(uuid)
        .await
        .map_err(|e| CoreError::from(e).or_not_found("layout", uuid))
}

async fn write_output(client: &McsClient, output: &Document<Output>) -> Result<(), CoreError> {
    client
        .put_output(output)
        .await
        .map_err(|e| CoreError::from(e).or_not_found("output", &output.model.uuid))
}

async fn write_layout(client: &McsClient, layout: &Document<Layout>) -> Result<(), CoreError> {
    client
        .put_layout(layout)
        .await
        .map_err(|e| CoreError::from(e).or_not_found("layout", &layout.model.uuid))
}

fn display_name<'a>(label: Option<&'a str>, uuid: &'a str) -> &'a str {
    label.filter(|l| !l.is_empty()).unwrap_or(uuid)
}

// ── Helpers ──────────────────────────────────────────────────────

/// Build an [`McsClient`] from the controller configuration.
fn build_client(config: &ControllerConfig) -> Result<McsClient, CoreError> {
    let transport = TransportConfig {
        tls: tls_to_transport(&config.tls),
        timeout: config.timeout,
    };
    let credentials = Credentials {
        username: config.username.clone(),
        password: config.password.clone(),
    };
    Ok(McsClient::new(config.base_url()?, credentials, &transport)?)
}

fn tls_to_transport(tls: &TlsVerification) -> TlsMode {
    match tls {
        TlsVerification::SystemDefaults => TlsMode::System,
        TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
        TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
    }
}
