//! Busy/ready notification around long-running fits.

use tracing::info;

/// Receives busy and ready notifications.
///
/// Purely a side effect for user interfaces; it never affects scheduling.
pub trait BusyIndicator {
    /// A long-running operation started.
    fn busy(&self, label: &str);
    /// The operation finished, successfully or not.
    fn ready(&self);
}

/// Ignores notifications.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBusyIndicator;

impl BusyIndicator for NoBusyIndicator {
    fn busy(&self, _label: &str) {}
    fn ready(&self) {}
}

/// Reports notifications as `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingBusyIndicator;

impl BusyIndicator for TracingBusyIndicator {
    fn busy(&self, label: &str) {
        info!(organ = label, "Transforming organ, this may take a minute");
    }

    fn ready(&self) {
        info!("Transformation is done");
    }
}

/// Raises busy on creation and ready on drop.
#[must_use = "the indicator returns to ready as soon as the guard is dropped"]
pub struct BusyGuard<'a> {
    indicator: &'a dyn BusyIndicator,
}

impl<'a> BusyGuard<'a> {
    /// Signals busy until the guard is dropped.
    pub fn new(indicator: &'a dyn BusyIndicator, label: &str) -> Self {
        indicator.busy(label);
        Self { indicator }
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.indicator.ready();
    }
}
