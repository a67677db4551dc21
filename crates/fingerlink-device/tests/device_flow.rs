//! End-to-end tests of the control loop.
//!
//! The device talks to an in-memory "server" over duplex streams handed
//! out by a scripted connector, and uses the mock sensor. Tokio's paused
//! clock stands in for the capture and hold delays.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, duplex};
use tokio_util::sync::CancellationToken;

use fingerlink_core::constants::MSG_GREETING;
use fingerlink_core::{FingerId, FingerMatch};
use fingerlink_device::status::texts;
use fingerlink_device::{
    DeviceConfig, DeviceContext, LifecycleHooks, RecordingSink, RunExit, Tick,
};
use fingerlink_network::{ConnectionConfig, ConnectionManager, ConnectionState, Connector};
use fingerlink_protocol::ServerCommand;
use fingerlink_sensor::SensorOutcome;
use fingerlink_sensor::mock::{MockSensor, MockSensorHandle, SensorCall, SensorOp};

const ENROLL_REQUEST: &[u8] = b"enroll\n7\nJane\nQ\nDoe\n30\nF\n5551234\n1 Main St\n";

/// Hands out pre-built streams; `None` entries are refused attempts.
struct ScriptedConnector {
    script: VecDeque<Option<DuplexStream>>,
}

impl Connector for ScriptedConnector {
    type Stream = DuplexStream;

    async fn connect(&mut self, _addr: &str) -> io::Result<DuplexStream> {
        self.script
            .pop_front()
            .flatten()
            .ok_or_else(|| io::Error::from(io::ErrorKind::ConnectionRefused))
    }
}

#[derive(Clone, Default)]
struct RecordingHooks(Arc<Mutex<Vec<&'static str>>>);

impl RecordingHooks {
    fn calls(&self) -> Vec<&'static str> {
        self.0.lock().unwrap().clone()
    }
}

impl LifecycleHooks for RecordingHooks {
    fn link_up(&mut self) {
        self.0.lock().unwrap().push("link_up");
    }

    fn link_down(&mut self) {
        self.0.lock().unwrap().push("link_down");
    }

    fn restart(&mut self) {
        self.0.lock().unwrap().push("restart");
    }
}

type Device = DeviceContext<MockSensor, ScriptedConnector>;

struct Harness {
    device: Device,
    sensor: MockSensorHandle,
    status: RecordingSink,
    hooks: RecordingHooks,
}

fn harness(config: DeviceConfig, streams: Vec<Option<DuplexStream>>) -> Harness {
    let (sensor, handle) = MockSensor::new();
    let connection = ConnectionManager::with_connector(
        ConnectionConfig {
            server_addr: "server.test:5050".to_string(),
            ..ConnectionConfig::default()
        },
        ScriptedConnector {
            script: streams.into(),
        },
    );
    let status = RecordingSink::new();
    let hooks = RecordingHooks::default();

    let device = DeviceContext::new(config, sensor, connection)
        .with_status(status.clone())
        .with_hooks(hooks.clone());

    Harness {
        device,
        sensor: handle,
        status,
        hooks,
    }
}

/// A started device and the server end of its stream, greeting consumed.
async fn started(config: DeviceConfig) -> (Harness, BufReader<DuplexStream>) {
    let (client_io, server_io) = duplex(4096);
    let mut h = harness(config, vec![Some(client_io)]);
    h.device.start().await.unwrap();

    let mut server = BufReader::new(server_io);
    assert_eq!(read_lines(&mut server, 1).await, vec![MSG_GREETING]);
    (h, server)
}

async fn read_lines(server: &mut BufReader<DuplexStream>, count: usize) -> Vec<String> {
    let mut lines = Vec::with_capacity(count);
    for _ in 0..count {
        let mut line = String::new();
        server.read_line(&mut line).await.unwrap();
        lines.push(line.trim_end_matches('\n').to_string());
    }
    lines
}

/// Nothing arrives within a short window.
async fn assert_silent(server: &mut BufReader<DuplexStream>) {
    let mut line = String::new();
    let read = tokio::time::timeout(Duration::from_millis(200), server.read_line(&mut line)).await;
    assert!(read.is_err(), "unexpected line: {line:?}");
}

#[tokio::test(start_paused = true)]
async fn test_startup_retries_connect_with_single_connected_message() {
    let (client_io, server_io) = duplex(4096);
    let mut h = harness(DeviceConfig::default(), vec![None, None, Some(client_io)]);

    h.device.start().await.unwrap();

    assert_eq!(h.device.connection_state(), ConnectionState::Connected);
    assert_eq!(h.status.count(texts::CONN_SERVER_DONE), 1);
    assert_eq!(h.status.messages()[0], (texts::CLIENT_START.0.to_string(), String::new()));
    assert_eq!(h.hooks.calls(), vec!["link_up"]);

    let mut server = BufReader::new(server_io);
    assert_eq!(read_lines(&mut server, 1).await, vec![MSG_GREETING]);
}

#[tokio::test(start_paused = true)]
async fn test_enroll_command_full_exchange() {
    let (mut h, mut server) = started(DeviceConfig::default()).await;
    h.sensor.place_finger(77);
    h.sensor.push_outcomes(
        SensorOp::AcquireImage,
        [
            SensorOutcome::Ok,       // first capture
            SensorOutcome::NoFinger, // finger lifted
            SensorOutcome::Ok,       // second capture
            SensorOutcome::NoFinger, // identification cycle
        ],
    );
    server.get_mut().write_all(ENROLL_REQUEST).await.unwrap();
    server.get_mut().write_all(b"OK\n").await.unwrap();

    assert_eq!(h.device.tick().await.unwrap(), Tick::Continue);

    assert_eq!(
        read_lines(&mut server, 9).await,
        vec!["enrollFinger", "Jane", "Q", "Doe", "30", "F", "5551234", "1 Main St", "7"]
    );
    assert_eq!(h.sensor.stored_print(FingerId::new(7).unwrap()), Some(77));
    assert_eq!(h.status.count(texts::ENROLLMENT_MODE), 1);
    assert_eq!(h.status.count(texts::WAITING_FEEDBACK), 1);
    assert_eq!(h.status.count(texts::ENROLL_SUCCESS), 1);
}

#[tokio::test(start_paused = true)]
async fn test_enroll_rejected_by_server() {
    let (mut h, mut server) = started(DeviceConfig::default()).await;
    h.sensor.place_finger(77);
    h.sensor.push_outcomes(
        SensorOp::AcquireImage,
        [SensorOutcome::Ok, SensorOutcome::NoFinger, SensorOutcome::Ok, SensorOutcome::NoFinger],
    );
    server.get_mut().write_all(ENROLL_REQUEST).await.unwrap();
    server.get_mut().write_all(b"DUPLICATE\n").await.unwrap();

    h.device.tick().await.unwrap();

    assert_eq!(read_lines(&mut server, 9).await.last().map(String::as_str), Some("7"));
    assert_eq!(h.status.count(texts::ENROLL_FAIL), 1);
    assert_eq!(h.status.count(texts::ENROLL_SUCCESS), 0);
}

#[tokio::test(start_paused = true)]
async fn test_enroll_retries_until_success_by_default() {
    let (mut h, mut server) = started(DeviceConfig::default()).await;
    h.sensor.place_finger(5);
    h.sensor.push_outcomes(
        SensorOp::AcquireImage,
        [
            SensorOutcome::Ok,
            SensorOutcome::NoFinger,
            SensorOutcome::Ok,
            SensorOutcome::Ok,
            SensorOutcome::NoFinger,
            SensorOutcome::Ok,
            SensorOutcome::NoFinger,
        ],
    );
    h.sensor.push_outcome(SensorOp::CreateModel, SensorOutcome::EnrollMismatch);
    server.get_mut().write_all(ENROLL_REQUEST).await.unwrap();
    server.get_mut().write_all(b"OK\n").await.unwrap();

    h.device.tick().await.unwrap();

    assert_eq!(h.sensor.call_count(SensorCall::CreateModel), 2);
    assert_eq!(h.status.count(texts::PRINTS_DID_NOT_MATCH), 1);
    assert_eq!(h.status.count(texts::ENROLL_SUCCESS), 1);
    assert_eq!(read_lines(&mut server, 9).await[8], "7");
}

#[tokio::test(start_paused = true)]
async fn test_enroll_gives_up_after_configured_attempts() {
    let config = DeviceConfig {
        enroll_attempts: Some(2),
        ..DeviceConfig::default()
    };
    let (mut h, mut server) = started(config).await;
    h.sensor.place_finger(5);
    h.sensor.push_outcomes(
        SensorOp::AcquireImage,
        [
            SensorOutcome::Ok,
            SensorOutcome::NoFinger,
            SensorOutcome::Ok,
            SensorOutcome::Ok,
            SensorOutcome::NoFinger,
            SensorOutcome::Ok,
            SensorOutcome::NoFinger,
        ],
    );
    h.sensor.push_outcomes(
        SensorOp::CreateModel,
        [SensorOutcome::EnrollMismatch, SensorOutcome::EnrollMismatch],
    );
    server.get_mut().write_all(ENROLL_REQUEST).await.unwrap();

    h.device.tick().await.unwrap();

    assert_eq!(read_lines(&mut server, 1).await, vec!["enrollFinger"]);
    assert_silent(&mut server).await;
    assert_eq!(h.sensor.stored_count(), 0);
    assert_eq!(h.status.count(texts::ENROLL_FAIL), 1);
}

#[tokio::test(start_paused = true)]
async fn test_enroll_with_invalid_id_is_rejected_before_capture() {
    let (mut h, mut server) = started(DeviceConfig::default()).await;
    server
        .get_mut()
        .write_all(b"enroll\n500\nJane\nQ\nDoe\n30\nF\n5551234\n1 Main St\n")
        .await
        .unwrap();

    h.device.tick().await.unwrap();

    assert_silent(&mut server).await;
    assert_eq!(h.status.count(texts::INVALID_ID), 1);
    assert_eq!(h.sensor.call_count(SensorCall::StoreModel(FingerId::new(1).unwrap())), 0);
    // Only the identification cycle touched the sensor.
    assert_eq!(h.sensor.call_count(SensorCall::AcquireImage), 1);
}

#[tokio::test(start_paused = true)]
async fn test_enroll_request_cut_short_by_timeout() {
    let (mut h, mut server) = started(DeviceConfig::default()).await;
    server.get_mut().write_all(b"enroll\n7\nJane\n").await.unwrap();

    h.device.tick().await.unwrap();

    assert_silent(&mut server).await;
    assert_eq!(h.status.count(texts::ENROLL_FAIL), 1);
    assert_eq!(h.device.connection_state(), ConnectionState::Connected);
}

#[tokio::test(start_paused = true)]
async fn test_enroll_field_with_carriage_return_rejected_before_capture() {
    let (mut h, mut server) = started(DeviceConfig::default()).await;
    h.sensor.place_finger(77);
    server
        .get_mut()
        .write_all(b"enroll\n7\nJa\rne\nQ\nDoe\n30\nF\n555\n1 Main\n")
        .await
        .unwrap();

    h.device.tick().await.unwrap();

    // Only the identification cycle touched the sensor.
    assert_eq!(h.sensor.call_count(SensorCall::CreateModel), 0);
    assert_eq!(h.sensor.call_count(SensorCall::StoreModel(FingerId::new(7).unwrap())), 0);
    assert_eq!(h.status.count(texts::ENROLL_FAIL), 1);
    assert_eq!(h.status.count(texts::INVALID_ID), 0);
    assert_eq!(h.status.count(texts::WAITING_FEEDBACK), 0);
}

#[tokio::test(start_paused = true)]
async fn test_enroll_echo_failure_shows_enroll_fail() {
    let (mut h, mut server) = started(DeviceConfig::default()).await;
    h.sensor.place_finger(77);
    h.sensor.push_outcomes(
        SensorOp::AcquireImage,
        [SensorOutcome::Ok, SensorOutcome::NoFinger, SensorOutcome::Ok],
    );
    server.get_mut().write_all(ENROLL_REQUEST).await.unwrap();

    // The server hangs up right after the acknowledgement.
    let server_task = tokio::spawn(async move {
        let lines = read_lines(&mut server, 1).await;
        drop(server);
        lines
    });

    h.device.tick().await.unwrap();

    assert_eq!(server_task.await.unwrap(), vec!["enrollFinger"]);
    assert_eq!(h.sensor.stored_print(FingerId::new(7).unwrap()), Some(77));
    assert_eq!(h.status.count(texts::ENROLL_FAIL), 1);
    assert_eq!(h.status.count(texts::WAITING_FEEDBACK), 0);
    assert_eq!(h.device.connection_state(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_identification_match_logs_attendance() {
    let (mut h, server) = started(DeviceConfig::default()).await;
    let id = FingerId::new(42).unwrap();
    h.sensor.place_finger(3);
    h.sensor.push_search(Ok(FingerMatch::new(id, 120)));

    let server_task = tokio::spawn(async move {
        let mut server = server;
        let mut seen = Vec::new();
        loop {
            let mut line = String::new();
            if server.read_line(&mut line).await.unwrap() == 0 {
                return seen;
            }
            let line = line.trim_end().to_string();
            if line == "42" {
                server.get_mut().write_all(b"OK\nAlice\n").await.unwrap();
            }
            seen.push(line);
        }
    });

    h.device.tick().await.unwrap();
    drop(h.device);

    assert_eq!(server_task.await.unwrap(), vec!["scanFinger", "42"]);
    assert_eq!(h.status.count(texts::LOGGED), 1);
    assert_eq!(
        h.status.messages().last().map(|(_, bottom)| bottom.clone()),
        Some(texts::SCAN_BANNER.1.to_string())
    );
    assert!(
        h.status
            .messages()
            .contains(&(texts::WELCOME.to_string(), "Alice".to_string()))
    );
}

#[tokio::test(start_paused = true)]
async fn test_identification_without_feedback_times_out() {
    let (mut h, mut server) = started(DeviceConfig::default()).await;
    h.sensor.place_finger(3);
    h.sensor.push_search(Ok(FingerMatch::new(FingerId::new(8).unwrap(), 60)));

    h.device.tick().await.unwrap();

    assert_eq!(read_lines(&mut server, 2).await, vec!["scanFinger", "8"]);
    assert_eq!(h.status.count(texts::LOGGING_FAILED), 1);
    assert_eq!(h.device.connection_state(), ConnectionState::Connected);
}

#[tokio::test(start_paused = true)]
async fn test_identification_not_found_sends_nothing() {
    let (mut h, mut server) = started(DeviceConfig::default()).await;
    h.sensor.place_finger(3);

    assert_eq!(h.device.tick().await.unwrap(), Tick::Continue);

    assert_silent(&mut server).await;
    assert_eq!(h.sensor.call_count(SensorCall::Search), 1);
    assert_eq!(h.status.count(texts::NO_MATCH), 1);
}

#[tokio::test(start_paused = true)]
async fn test_empty_glass_only_shows_banner() {
    let (mut h, mut server) = started(DeviceConfig::default()).await;
    h.status.clear();

    h.device.tick().await.unwrap();
    h.device.tick().await.unwrap();

    assert_silent(&mut server).await;
    assert_eq!(h.status.count(texts::SCAN_BANNER), 2);
    assert_eq!(h.status.messages().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_command_closes_session() {
    let (mut h, mut server) = started(DeviceConfig::default()).await;
    server.get_mut().write_all(b"disconnect\n").await.unwrap();

    h.device.tick().await.unwrap();

    assert_eq!(read_lines(&mut server, 1).await, vec!["disconnect"]);
    let mut rest = String::new();
    assert_eq!(server.read_line(&mut rest).await.unwrap(), 0);

    assert!(h.device.is_session_closed());
    assert_eq!(h.status.last(), Some((texts::DISCONNECTED.0.into(), texts::DISCONNECTED.1.into())));

    // No reconnect and no scanning afterwards.
    h.sensor.clear_calls();
    h.device.tick().await.unwrap();
    assert_eq!(h.device.connection_state(), ConnectionState::Disconnected);
    assert!(h.sensor.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_reboot_command() {
    let (mut h, mut server) = started(DeviceConfig::default()).await;
    server.get_mut().write_all(b"reboot\n").await.unwrap();

    assert_eq!(h.device.tick().await.unwrap(), Tick::Reboot);

    assert_eq!(read_lines(&mut server, 1).await, vec!["disconnect"]);
    assert_eq!(h.hooks.calls(), vec!["link_up", "link_down", "restart"]);
    assert_eq!(h.device.connection_state(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_run_returns_reboot() {
    let (mut h, mut server) = started(DeviceConfig::default()).await;
    server.get_mut().write_all(b"reboot\n").await.unwrap();

    assert_eq!(h.device.run().await.unwrap(), RunExit::Reboot);
}

#[tokio::test(start_paused = true)]
async fn test_unrecognized_line_is_ignored() {
    let (mut h, mut server) = started(DeviceConfig::default()).await;
    server.get_mut().write_all(b"Enroll\n").await.unwrap();

    assert_eq!(h.device.tick().await.unwrap(), Tick::Continue);

    assert_silent(&mut server).await;
    assert_eq!(h.device.connection_state(), ConnectionState::Connected);
    assert_eq!(h.status.count(texts::ENROLLMENT_MODE), 0);
}

#[tokio::test(start_paused = true)]
async fn test_dispatch_unrecognized_directly() {
    let (mut h, _server) = started(DeviceConfig::default()).await;
    let tick = h
        .device
        .dispatch(ServerCommand::Unrecognized("status?".into()))
        .await
        .unwrap();
    assert_eq!(tick, Tick::Continue);
}

#[tokio::test(start_paused = true)]
async fn test_link_loss_reconnects() {
    let (first_client, first_server) = duplex(4096);
    let (second_client, second_server) = duplex(4096);
    let mut h = harness(
        DeviceConfig::default(),
        vec![Some(first_client), Some(second_client)],
    );
    h.device.start().await.unwrap();
    drop(first_server);

    // Loss is noticed while polling for a command.
    h.device.tick().await.unwrap();
    assert_eq!(h.device.connection_state(), ConnectionState::Disconnected);

    h.device.tick().await.unwrap();
    assert_eq!(h.device.connection_state(), ConnectionState::Connected);
    assert_eq!(h.status.count(texts::CONN_SERVER_DONE), 2);

    let mut server = BufReader::new(second_server);
    assert_eq!(read_lines(&mut server, 1).await, vec![MSG_GREETING]);
}

#[tokio::test(start_paused = true)]
async fn test_link_loss_without_reconnect() {
    let config = DeviceConfig {
        reconnect_on_loss: false,
        ..DeviceConfig::default()
    };
    let (mut h, server) = started(config).await;
    drop(server);

    h.device.tick().await.unwrap();
    h.device.tick().await.unwrap();

    assert!(h.device.is_session_closed());
    assert_eq!(h.status.count(texts::DISCONNECTED), 1);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_button_press() {
    let pressed = Arc::new(AtomicBool::new(false));
    let (client_io, server_io) = duplex(4096);
    let h = harness(DeviceConfig::default(), vec![Some(client_io)]);
    let level = Arc::clone(&pressed);
    let mut device = h.device.with_button(move || level.load(Ordering::SeqCst));
    device.start().await.unwrap();

    let mut server = BufReader::new(server_io);
    read_lines(&mut server, 1).await;

    device.tick().await.unwrap();
    assert_eq!(device.connection_state(), ConnectionState::Connected);

    pressed.store(true, Ordering::SeqCst);
    device.tick().await.unwrap();
    assert!(device.is_session_closed());
    assert_eq!(read_lines(&mut server, 1).await, vec!["disconnect"]);

    // Holding the button does nothing more.
    device.tick().await.unwrap();
    assert_eq!(h.status.count(texts::DISCONNECTED), 1);
}

#[tokio::test(start_paused = true)]
async fn test_run_shuts_down_on_cancel() {
    let cancel = CancellationToken::new();
    let (client_io, server_io) = duplex(4096);
    let h = harness(DeviceConfig::default(), vec![Some(client_io)]);
    let mut device = h.device.with_cancel(cancel.clone());
    device.start().await.unwrap();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    assert_eq!(device.run().await.unwrap(), RunExit::Shutdown);

    let mut server = BufReader::new(server_io);
    assert_eq!(
        read_lines(&mut server, 2).await,
        vec![MSG_GREETING.to_string(), "disconnect".to_string()]
    );
}
