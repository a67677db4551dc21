//! Device context: everything the control loop owns.
//!
//! [`DeviceContext`] bundles the sensor, the server connection, the status
//! sink, the lifecycle hooks and the disconnect button, plus the little
//! state the loop carries between ticks (scan mode, session, button edge).
//! There is no process-wide state; a reboot builds a fresh context.
//!
//! # Lifecycle
//!
//! ```text
//! start():  sensor bring-up ─> link_up ─> connect (retry forever) ─> greeting
//! run():    tick ─> tick ─> ... ─> RunExit::Reboot | RunExit::Shutdown
//! ```

use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use fingerlink_core::constants::{
    CAPTURE_POLL_INTERVAL_MS, DEFAULT_STORE_CAPACITY, FINGER_REMOVAL_POLL_MS,
    FINGER_REMOVAL_SETTLE_MS, RESULT_HOLD_MS, SCAN_RESULT_HOLD_MS, SENSOR_BAUD_RATE,
    SENSOR_PRESENCE_RETRY_MS, TICK_INTERVAL_MS,
};
use fingerlink_network::{
    ConnectionError, ConnectionManager, ConnectionState, Connector, TcpConnector,
};
use fingerlink_sensor::{SensorDevice, SensorError, SensorOutcome};

use crate::enrollment::EnrollTiming;
use crate::lifecycle::{ButtonInput, EdgeDetector, LifecycleHooks, NoButton, NoopHooks};
use crate::poll::{Cancelled, pause};
use crate::status::{NullSink, StatusSink, StatusText, texts};

/// Device behaviour settings.
///
/// # Example
///
/// ```
/// use fingerlink_device::DeviceConfig;
///
/// let config = DeviceConfig {
///     enroll_attempts: Some(3),
///     ..DeviceConfig::default()
/// };
/// assert!(config.reconnect_on_loss);
/// assert_eq!(config.store_capacity, 127);
/// ```
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Number of template slots in the sensor store.
    pub store_capacity: u16,

    /// Baud rate of the sensor channel.
    pub baud_rate: u32,

    /// Delay between sensor presence checks during bring-up.
    pub presence_retry: Duration,

    /// Delay between image polls while waiting for a finger.
    pub capture_poll_interval: Duration,

    /// Pause after asking the user to lift the finger.
    pub removal_settle: Duration,

    /// Delay between finger removal checks.
    pub removal_poll_interval: Duration,

    /// Pause at the end of every tick.
    pub tick_interval: Duration,

    /// How long enrollment results and "logged" messages stay visible.
    pub result_hold: Duration,

    /// How long an attendance result stays visible.
    pub scan_result_hold: Duration,

    /// Full enrollment attempts per request; `None` retries until success.
    pub enroll_attempts: Option<u32>,

    /// Wipe the sensor store during bring-up.
    pub clear_store_on_start: bool,

    /// Reconnect when the server link drops by itself.
    pub reconnect_on_loss: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            store_capacity: DEFAULT_STORE_CAPACITY,
            baud_rate: SENSOR_BAUD_RATE,
            presence_retry: Duration::from_millis(SENSOR_PRESENCE_RETRY_MS),
            capture_poll_interval: Duration::from_millis(CAPTURE_POLL_INTERVAL_MS),
            removal_settle: Duration::from_millis(FINGER_REMOVAL_SETTLE_MS),
            removal_poll_interval: Duration::from_millis(FINGER_REMOVAL_POLL_MS),
            tick_interval: Duration::from_millis(TICK_INTERVAL_MS),
            result_hold: Duration::from_millis(RESULT_HOLD_MS),
            scan_result_hold: Duration::from_millis(SCAN_RESULT_HOLD_MS),
            enroll_attempts: None,
            clear_store_on_start: false,
            reconnect_on_loss: true,
        }
    }
}

impl DeviceConfig {
    pub(crate) fn enroll_timing(&self) -> EnrollTiming {
        EnrollTiming {
            capture_poll_interval: self.capture_poll_interval,
            removal_settle: self.removal_settle,
            removal_poll_interval: self.removal_poll_interval,
        }
    }
}

/// What the sensor is currently used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanMode {
    #[default]
    Identify,
    Enroll,
}

impl ScanMode {
    /// Idle banner for this mode.
    pub fn banner(&self) -> StatusText {
        match self {
            ScanMode::Identify => texts::SCAN_BANNER,
            ScanMode::Enroll => texts::ENROLL_BANNER,
        }
    }
}

/// Server session as the device sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Session {
    /// `start` has not completed yet.
    NotStarted,

    /// A session is wanted; a lost link is re-established.
    Active,

    /// Closed on purpose; stays closed until reboot.
    Closed,
}

/// Why [`DeviceContext::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunExit {
    /// The server asked for a restart; run the startup sequence again.
    Reboot,

    /// The cancellation token fired.
    Shutdown,
}

/// Errors that stop the device.
///
/// Sensor outcomes and server hiccups are handled inside the loop and
/// never show up here.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("Sensor error: {0}")]
    Sensor(#[from] SensorError),

    #[error("Connection error: {0}")]
    Connection(ConnectionError),

    #[error("Cancelled")]
    Cancelled,
}

impl From<Cancelled> for DeviceError {
    fn from(_: Cancelled) -> Self {
        Self::Cancelled
    }
}

impl From<ConnectionError> for DeviceError {
    fn from(error: ConnectionError) -> Self {
        match error {
            ConnectionError::Cancelled => Self::Cancelled,
            other => Self::Connection(other),
        }
    }
}

/// Result of one control loop tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Continue,
    Reboot,
}

/// Owner of all device resources and loop state.
pub struct DeviceContext<S: SensorDevice, C: Connector = TcpConnector> {
    pub(crate) config: DeviceConfig,
    pub(crate) sensor: S,
    pub(crate) connection: ConnectionManager<C>,
    pub(crate) status: Box<dyn StatusSink + Send>,
    pub(crate) hooks: Box<dyn LifecycleHooks + Send>,
    pub(crate) button: Box<dyn ButtonInput + Send>,
    pub(crate) button_edge: EdgeDetector,
    pub(crate) mode: ScanMode,
    pub(crate) session: Session,
    pub(crate) cancel: CancellationToken,
}

impl<S: SensorDevice, C: Connector> DeviceContext<S, C> {
    /// Create a context with a silent status sink, no-op hooks and no button.
    pub fn new(config: DeviceConfig, sensor: S, connection: ConnectionManager<C>) -> Self {
        Self {
            config,
            sensor,
            connection,
            status: Box::new(NullSink),
            hooks: Box::new(NoopHooks),
            button: Box::new(NoButton),
            button_edge: EdgeDetector::default(),
            mode: ScanMode::default(),
            session: Session::NotStarted,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_status(mut self, status: impl StatusSink + Send + 'static) -> Self {
        self.status = Box::new(status);
        self
    }

    pub fn with_hooks(mut self, hooks: impl LifecycleHooks + Send + 'static) -> Self {
        self.hooks = Box::new(hooks);
        self
    }

    pub fn with_button(mut self, button: impl ButtonInput + Send + 'static) -> Self {
        self.button = Box::new(button);
        self
    }

    /// Token that stops every wait of this context.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn mode(&self) -> ScanMode {
        self.mode
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Whether the session was closed on purpose (disconnect or reboot).
    pub fn is_session_closed(&self) -> bool {
        self.session == Session::Closed
    }

    pub fn sensor(&self) -> &S {
        &self.sensor
    }

    /// Give the sensor back, e.g. to build a fresh context after a reboot.
    pub fn into_sensor(self) -> S {
        self.sensor
    }

    /// Open the sensor channel and wait until the module answers.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel cannot be opened or the wait is
    /// cancelled.
    pub async fn init_sensor(&mut self) -> Result<(), DeviceError> {
        info!(baud = self.config.baud_rate, "Starting fingerprint scanner");
        self.sensor.begin_channel(self.config.baud_rate).await?;

        let mut checks = 0u32;
        while !self.sensor.verify_presence().await {
            checks += 1;
            warn!(checks, "Scanner not found, retrying");
            pause(self.config.presence_retry, &self.cancel).await?;
        }
        info!("Scanner found");

        if self.config.clear_store_on_start {
            match self.sensor.clear_store().await {
                SensorOutcome::Ok => info!("Sensor store cleared"),
                outcome => warn!(%outcome, "Could not clear sensor store"),
            }
        }
        Ok(())
    }

    /// Bring the device up: sensor, network link, server session.
    ///
    /// Blocks until the server accepts a connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the sensor channel fails or the context is
    /// cancelled.
    pub async fn start(&mut self) -> Result<(), DeviceError> {
        info!("Starting client");
        self.status.show(texts::CLIENT_START);
        self.init_sensor().await?;

        self.status.show(texts::CONN_WIFI);
        self.hooks.link_up();
        self.status.show(texts::CONN_WIFI_DONE);

        self.connect_to_server().await?;
        self.session = Session::Active;
        self.status.show(texts::SCAN_READY);
        Ok(())
    }

    /// Run ticks until a reboot is requested or the context is cancelled.
    ///
    /// On cancellation the server is notified before returning.
    ///
    /// # Errors
    ///
    /// Returns an error only for failures the loop cannot recover from.
    pub async fn run(&mut self) -> Result<RunExit, DeviceError> {
        loop {
            match self.tick().await {
                Ok(Tick::Continue) => {}
                Ok(Tick::Reboot) => return Ok(RunExit::Reboot),
                Err(DeviceError::Cancelled) => {
                    info!("Shutting down");
                    self.connection.disconnect().await;
                    return Ok(RunExit::Shutdown);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Connect with unbounded retry. Shows one message before and one
    /// after, however many attempts it takes.
    pub(crate) async fn connect_to_server(&mut self) -> Result<(), DeviceError> {
        self.status.show(texts::CONN_SERVER);
        let attempts = self.connection.connect(&self.cancel).await?;
        info!(attempts, "Connected to server");
        self.status.show(texts::CONN_SERVER_DONE);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::RecordingSink;
    use fingerlink_network::ConnectionConfig;
    use fingerlink_sensor::mock::{MockSensor, MockSensorHandle, SensorCall};

    fn context(config: DeviceConfig) -> (DeviceContext<MockSensor>, MockSensorHandle) {
        let (sensor, handle) = MockSensor::new();
        let connection = ConnectionManager::new(ConnectionConfig::default());
        (DeviceContext::new(config, sensor, connection), handle)
    }

    #[test]
    fn test_scan_mode_banner() {
        assert_eq!(ScanMode::default(), ScanMode::Identify);
        assert_eq!(ScanMode::Identify.banner(), texts::SCAN_BANNER);
        assert_eq!(ScanMode::Enroll.banner(), texts::ENROLL_BANNER);
    }

    #[tokio::test(start_paused = true)]
    async fn test_init_sensor_waits_for_presence() {
        let (mut device, handle) = context(DeviceConfig::default());
        handle.set_absent_checks(3);

        let started = tokio::time::Instant::now();
        device.init_sensor().await.unwrap();

        assert_eq!(started.elapsed(), Duration::from_millis(150));
        assert_eq!(handle.calls()[0], SensorCall::BeginChannel(57_600));
        assert_eq!(handle.call_count(SensorCall::VerifyPresence), 4);
        assert_eq!(handle.call_count(SensorCall::ClearStore), 0);
    }

    #[tokio::test]
    async fn test_init_sensor_surfaces_channel_failure() {
        let (mut device, handle) = context(DeviceConfig::default());
        handle.fail_channel("serial port busy");

        let result = device.init_sensor().await;

        assert!(matches!(
            result,
            Err(DeviceError::Sensor(SensorError::InitializationFailed { .. }))
        ));
        assert_eq!(handle.call_count(SensorCall::VerifyPresence), 0);
    }

    #[tokio::test]
    async fn test_init_sensor_clears_store_when_configured() {
        let config = DeviceConfig {
            clear_store_on_start: true,
            ..DeviceConfig::default()
        };
        let (mut device, handle) = context(config);
        handle.store_print(fingerlink_core::FingerId::new(3).unwrap(), 9);

        device.init_sensor().await.unwrap();
        assert_eq!(handle.stored_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_init_sensor_cancelled() {
        let (device, handle) = context(DeviceConfig::default());
        let cancel = CancellationToken::new();
        let mut device = device.with_cancel(cancel.clone()).with_status(RecordingSink::new());
        handle.set_absent_checks(u32::MAX);
        cancel.cancel();

        assert!(matches!(device.init_sensor().await, Err(DeviceError::Cancelled)));
    }

    #[test]
    fn test_connection_cancel_maps_to_cancelled() {
        assert!(matches!(
            DeviceError::from(ConnectionError::Cancelled),
            DeviceError::Cancelled
        ));
        assert!(matches!(
            DeviceError::from(ConnectionError::NotConnected),
            DeviceError::Connection(_)
        ));
    }
}
