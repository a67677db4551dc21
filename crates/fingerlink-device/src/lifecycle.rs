//! Lifecycle hooks and the disconnect button.
//!
//! The device does not manage its network link or its own restart; it
//! calls out to [`LifecycleHooks`] at the right moments. The physical
//! disconnect button is read through [`ButtonInput`] and debounced into
//! press events by [`EdgeDetector`].

use tracing::debug;

/// Platform actions around the server session.
///
/// All methods default to no-ops.
pub trait LifecycleHooks {
    /// Bring the network link up before connecting.
    fn link_up(&mut self) {}

    /// Take the network link down before a restart.
    fn link_down(&mut self) {}

    /// Restart the device.
    fn restart(&mut self) {}
}

/// Hooks that do nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl LifecycleHooks for NoopHooks {}

/// A digital input sampled once per tick.
pub trait ButtonInput {
    /// Current level: `true` while held down.
    fn is_pressed(&mut self) -> bool;
}

/// A button that is never pressed.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoButton;

impl ButtonInput for NoButton {
    fn is_pressed(&mut self) -> bool {
        false
    }
}

impl<F: FnMut() -> bool> ButtonInput for F {
    fn is_pressed(&mut self) -> bool {
        self()
    }
}

/// Turns a level input into press events.
///
/// A press is reported once, on the sample where the input goes from
/// released to pressed. Holding the button reports nothing more.
///
/// # Examples
///
/// ```
/// use fingerlink_device::lifecycle::EdgeDetector;
///
/// let mut edge = EdgeDetector::default();
/// assert!(!edge.update(false));
/// assert!(edge.update(true));
/// assert!(!edge.update(true));
/// assert!(!edge.update(false));
/// assert!(edge.update(true));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct EdgeDetector {
    last: bool,
}

impl EdgeDetector {
    /// Feed one sample; `true` on a rising edge.
    pub fn update(&mut self, level: bool) -> bool {
        let pressed = level && !self.last;
        self.last = level;
        if pressed {
            debug!("Button pressed");
        }
        pressed
    }
}
