#![forbid(unsafe_code)]

//! Tracing capture for assertions on log output.
//!
//! [`capture`] scopes a subscriber to the calling thread, which misses
//! events from console threads. Tests that need those install the layer
//! process-wide with [`install_global`]; keep such tests in their own
//! integration-test binary.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;

/// One recorded event.
#[derive(Debug, Clone)]
pub struct CapturedEvent {
    pub level: tracing::Level,
    pub target: String,
    pub message: Option<String>,
    pub fields: HashMap<String, String>,
    pub thread: Option<String>,
}

/// Shared view of the captured events.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl EventLog {
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Events whose target is `target` or nested below it.
    pub fn for_target(&self, target: &str) -> Vec<CapturedEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.target == target || e.target.starts_with(&format!("{target}::")))
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

/// Layer recording every event into an [`EventLog`].
#[derive(Debug, Clone, Default)]
pub struct CaptureLayer {
    log: EventLog,
}

impl CaptureLayer {
    pub fn new() -> (Self, EventLog) {
        let layer = Self::default();
        let log = layer.log.clone();
        (layer, log)
    }
}

struct FieldVisitor(Vec<(String, String)>);

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.0.push((field.name().to_string(), format!("{value:?}")));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.0.push((field.name().to_string(), value.to_string()));
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.0.push((field.name().to_string(), value.to_string()));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.0.push((field.name().to_string(), value.to_string()));
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.0.push((field.name().to_string(), value.to_string()));
    }
}

impl<S> tracing_subscriber::Layer<S> for CaptureLayer
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        let mut visitor = FieldVisitor(Vec::new());
        event.record(&mut visitor);
        let fields: HashMap<String, String> = visitor.0.into_iter().collect();

        self.log
            .events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(CapturedEvent {
                level: *event.metadata().level(),
                target: event.metadata().target().to_string(),
                message: fields.get("message").cloned(),
                fields,
                thread: std::thread::current().name().map(str::to_owned),
            });
    }
}

/// Run `f` with a capturing subscriber on the current thread.
pub fn capture<F, R>(f: F) -> (R, Vec<CapturedEvent>)
where
    F: FnOnce() -> R,
{
    let (layer, log) = CaptureLayer::new();
    let subscriber = tracing_subscriber::registry().with(layer);
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, log.events())
}

/// Install a capturing subscriber for the whole process.
///
/// The first call installs it; later calls return the same log. Returns
/// `None` if some other global subscriber was installed first.
pub fn install_global() -> Option<EventLog> {
    static GLOBAL: OnceLock<Option<EventLog>> = OnceLock::new();
    GLOBAL
        .get_or_init(|| {
            let (layer, log) = CaptureLayer::new();
            let subscriber = tracing_subscriber::registry().with(layer);
            tracing::subscriber::set_global_default(subscriber)
                .ok()
                .map(|()| log)
        })
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_target_level_and_fields() {
        let ((), events) = capture(|| {
            tracing::debug!(target: "replkit.completion", path = "math", "lookup failed");
            tracing::info!(target: "replkit.host", "other");
        });
        assert_eq!(events.len(), 2);
        let first = &events[0];
        assert_eq!(first.level, tracing::Level::DEBUG);
        assert_eq!(first.target, "replkit.completion");
        assert_eq!(first.message.as_deref(), Some("lookup failed"));
        assert_eq!(first.fields.get("path").map(String::as_str), Some("math"));
    }

    #[test]
    fn log_filters_by_target() {
        let (layer, log) = CaptureLayer::new();
        let subscriber = tracing_subscriber::registry().with(layer);
        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(target: "replkit.console", "a");
            tracing::warn!(target: "replkit.console.keys", "b");
            tracing::warn!(target: "replkit.consoles", "c");
        });
        assert_eq!(log.for_target("replkit.console").len(), 1);
        log.clear();
        assert!(log.events().is_empty());
    }
}
