//! Command dispatcher: one control loop tick.
//!
//! Every tick does, in order:
//!
//! 1. sample the disconnect button
//! 2. re-establish a dropped link (when configured)
//! 3. handle at most one pending server command
//! 4. run one identification cycle and show the idle banner
//! 5. sleep for the tick interval
//!
//! Commands are matched exactly (`disconnect`, `reboot`, `enroll`); any
//! other line is logged and ignored. Enrollment runs to completion before
//! the next command is read.

use tracing::{debug, info, warn};

use fingerlink_core::{
    EnrollmentRecord, Error, FingerId, FingerMatch, IdentificationResult,
    constants::ENROLL_REQUEST_LINES,
};
use fingerlink_network::Connector;
use fingerlink_protocol::{Feedback, Outbound, ServerCommand, parse_enrollment};
use fingerlink_sensor::SensorDevice;

use crate::context::{DeviceContext, DeviceError, ScanMode, Session, Tick};
use crate::enrollment::{EnrollError, EnrollmentMachine};
use crate::identification::identify;
use crate::poll::pause;
use crate::status::texts;

impl<S: SensorDevice, C: Connector> DeviceContext<S, C> {
    /// Run one control loop tick.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::Cancelled`] once the context is cancelled.
    pub async fn tick(&mut self) -> Result<Tick, DeviceError> {
        if self.cancel.is_cancelled() {
            return Err(DeviceError::Cancelled);
        }

        let level = self.button.is_pressed();
        if self.button_edge.update(level) {
            info!("Disconnect button pressed");
            self.close_session().await;
        }

        if self.session == Session::Active && !self.connection.is_connected() {
            if self.config.reconnect_on_loss {
                warn!("Server link lost, reconnecting");
                self.connect_to_server().await?;
            } else {
                warn!("Server link lost");
                self.session = Session::Closed;
                self.status.show(texts::DISCONNECTED);
            }
        }

        if self.connection.is_connected() {
            match self.connection.poll_line() {
                Ok(Some(line)) => {
                    let command = ServerCommand::parse(&line);
                    if self.dispatch(command).await? == Tick::Reboot {
                        return Ok(Tick::Reboot);
                    }
                }
                Ok(None) => {}
                Err(e) => warn!("Failed to read command: {}", e),
            }
        }

        if self.connection.is_connected() {
            self.scan_cycle().await?;
            self.status.show(self.mode.banner());
        }

        pause(self.config.tick_interval, &self.cancel).await?;
        Ok(Tick::Continue)
    }

    /// Act on one server command.
    pub async fn dispatch(&mut self, command: ServerCommand) -> Result<Tick, DeviceError> {
        debug!(%command, "Dispatching server command");
        match command {
            ServerCommand::Disconnect => self.close_session().await,
            ServerCommand::Reboot => {
                self.reboot().await;
                return Ok(Tick::Reboot);
            }
            ServerCommand::Enroll => self.handle_enroll().await?,
            ServerCommand::Unrecognized(line) => {
                debug!(line = %line, "Ignoring unrecognized line");
            }
        }
        Ok(Tick::Continue)
    }

    /// Close the server session on purpose. The device stays idle until
    /// reboot. Idempotent.
    pub async fn close_session(&mut self) {
        if self.session == Session::Closed && !self.connection.is_connected() {
            return;
        }
        info!("Disconnecting from server");
        self.connection.disconnect().await;
        self.session = Session::Closed;
        self.status.show(texts::DISCONNECTED);
    }

    async fn reboot(&mut self) {
        info!("Reboot requested");
        self.connection.disconnect().await;
        self.session = Session::Closed;
        self.hooks.link_down();
        self.hooks.restart();
    }

    /// Read the request, enroll the finger, echo the record, await feedback.
    async fn handle_enroll(&mut self) -> Result<(), DeviceError> {
        self.mode = ScanMode::Enroll;
        info!("Ready to enroll a fingerprint");
        self.status.show(texts::ENROLLMENT_MODE);

        let mut lines = Vec::with_capacity(ENROLL_REQUEST_LINES);
        while lines.len() < ENROLL_REQUEST_LINES {
            match self.await_line().await? {
                Some(line) => lines.push(line),
                None => {
                    warn!(received = lines.len(), "Enrollment request incomplete");
                    self.status.show(texts::ENROLL_FAIL);
                    return Ok(());
                }
            }
        }

        let record = match parse_enrollment(lines, self.config.store_capacity) {
            Ok(record) => record,
            Err(e) => {
                warn!("Rejecting enrollment request: {}", e);
                let text = match e {
                    Error::InvalidFingerId(_) | Error::FingerIdOutOfRange { .. } => {
                        texts::INVALID_ID
                    }
                    _ => texts::ENROLL_FAIL,
                };
                self.status.show(text);
                return Ok(());
            }
        };

        if let Err(e) = self.connection.send(Outbound::EnrollFinger).await {
            warn!("Could not acknowledge enrollment: {}", e);
            self.status.show(texts::ENROLL_FAIL);
            return Ok(());
        }

        if !self.enroll_until_done(record.id).await? {
            self.status.show(texts::ENROLL_FAIL);
            pause(self.config.result_hold, &self.cancel).await?;
            return Ok(());
        }

        self.report_enrollment(record).await
    }

    /// Run full enrollment attempts until one succeeds or the configured
    /// attempts run out. Returns whether the finger was stored.
    async fn enroll_until_done(&mut self, id: FingerId) -> Result<bool, DeviceError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let mut machine = EnrollmentMachine::with_timing(id, self.config.enroll_timing());

            match machine
                .run(&mut self.sensor, self.status.as_mut(), &self.cancel)
                .await
            {
                Ok(()) => {
                    info!(id = %id, attempt, "Enrollment complete");
                    return Ok(true);
                }
                Err(EnrollError::Cancelled) => return Err(DeviceError::Cancelled),
                Err(e) => warn!(id = %id, attempt, "Enrollment attempt failed: {}", e),
            }

            if self.config.enroll_attempts.is_some_and(|max| attempt >= max) {
                warn!(id = %id, attempt, "Giving up on enrollment");
                return Ok(false);
            }
        }
    }

    async fn report_enrollment(&mut self, record: EnrollmentRecord) -> Result<(), DeviceError> {
        let id = record.id;
        if let Err(e) = self.connection.send(Outbound::EnrollmentEcho(record)).await {
            warn!(id = %id, "Could not send enrollment record: {}", e);
            self.status.show(texts::ENROLL_FAIL);
            pause(self.config.result_hold, &self.cancel).await?;
            return Ok(());
        }

        self.status.show(texts::WAITING_FEEDBACK);
        match self.await_feedback().await? {
            Feedback::Accepted => {
                info!(id = %id, "Enrollment accepted by server");
                self.status.show(texts::ENROLL_SUCCESS);
            }
            feedback => {
                warn!(id = %id, ?feedback, "Enrollment rejected by server");
                self.status.show(texts::ENROLL_FAIL);
            }
        }

        pause(self.config.result_hold, &self.cancel).await?;
        Ok(())
    }

    async fn scan_cycle(&mut self) -> Result<(), DeviceError> {
        self.mode = ScanMode::Identify;
        match identify(&mut self.sensor, self.status.as_mut()).await {
            Ok(IdentificationResult::Match(found)) => self.report_scan(found).await,
            Ok(IdentificationResult::NoMatch) => Ok(()),
            Err(outcome) => {
                debug!(%outcome, "Identification cycle ended");
                Ok(())
            }
        }
    }

    /// Report a match and show the attendee's name on success.
    async fn report_scan(&mut self, found: FingerMatch) -> Result<(), DeviceError> {
        info!(id = %found.id, confidence = %found.confidence, "Reporting scan");
        if let Err(e) = self.connection.send(Outbound::ScanFinger(found.id)).await {
            warn!(id = %found.id, "Could not report scan: {}", e);
            return Ok(());
        }
        self.status.show(texts::LOGGING_ATTENDANCE);

        match self.await_feedback().await? {
            Feedback::Accepted => {
                self.status.show(texts::LOGGED);
                let name = self.await_line().await?.unwrap_or_default();
                pause(self.config.result_hold, &self.cancel).await?;
                self.status.show(texts::CLEAR);
                self.status.notify(texts::WELCOME, &name);
                info!(id = %found.id, name = %name, "Attendance logged");
            }
            feedback => {
                warn!(id = %found.id, ?feedback, "Attendance not logged");
                self.status.show(texts::LOGGING_FAILED);
            }
        }

        pause(self.config.scan_result_hold, &self.cancel).await?;
        Ok(())
    }

    async fn await_feedback(&mut self) -> Result<Feedback, DeviceError> {
        let reply = self.await_line().await?;
        Ok(Feedback::from_reply(reply.as_deref()))
    }

    /// Wait for one server line. `None` on timeout or a lost link.
    async fn await_line(&mut self) -> Result<Option<String>, DeviceError> {
        let received = tokio::select! {
            _ = self.cancel.cancelled() => return Err(DeviceError::Cancelled),
            received = self.connection.recv_feedback() => received,
        };

        match received {
            Ok(line) => Ok(Some(line)),
            Err(e) => {
                warn!("No reply from server: {}", e);
                Ok(None)
            }
        }
    }
}
