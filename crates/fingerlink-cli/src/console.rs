//! Desktop stand-ins for the panel and the finger.

use std::io::BufRead;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use fingerlink_device::LcdDisplay;
use fingerlink_device::status::StatusSink;
use fingerlink_sensor::mock::MockSensorHandle;

/// LCD that prints every frame to stdout.
#[derive(Debug, Default)]
pub struct ConsoleLcd {
    lcd: LcdDisplay,
}

impl StatusSink for ConsoleLcd {
    fn notify(&mut self, primary: &str, secondary: &str) {
        self.lcd.notify(primary, secondary);
        println!("+{}+", "-".repeat(self.lcd.frame()[0].len()));
        for row in self.lcd.frame() {
            println!("|{row}|");
        }
        println!("+{}+", "-".repeat(self.lcd.frame()[0].len()));
    }
}

/// One stdin instruction for the simulated finger.
#[derive(Debug, PartialEq, Eq)]
pub enum FingerCommand {
    Place(u32),
    Lift,
    Quit,
}

impl FingerCommand {
    pub fn parse(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        match (words.next()?, words.next()) {
            ("place", Some(print)) => print.parse().ok().map(Self::Place),
            ("lift", None) => Some(Self::Lift),
            ("quit", None) => Some(Self::Quit),
            _ => None,
        }
    }
}

/// Drive the mock sensor from stdin until EOF or `quit`.
///
/// Blocks; run it on its own thread so a pending read never holds up
/// runtime shutdown.
pub fn drive_finger(sensor: MockSensorHandle, cancel: CancellationToken) {
    for line in std::io::stdin().lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("Failed to read stdin: {}", e);
                return;
            }
        };

        match FingerCommand::parse(&line) {
            Some(FingerCommand::Place(print)) => {
                info!(print, "Finger placed");
                sensor.place_finger(print);
            }
            Some(FingerCommand::Lift) => {
                info!("Finger lifted");
                sensor.lift_finger();
            }
            Some(FingerCommand::Quit) => {
                cancel.cancel();
                return;
            }
            None => warn!(line = %line, "Expected `place <print>`, `lift` or `quit`"),
        }
    }
}
