// Logging setup: console, daily error file, and an in-memory ring of recent errors

use std::collections::VecDeque;
use std::fmt::{self, Write as _};
use std::path::Path;
use std::sync::{Arc, Mutex};

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

/// How many recent errors are kept for `/errors`
pub const ERROR_RING_CAPACITY: usize = 50;

/// Keeps the last [`ERROR_RING_CAPACITY`] ERROR-level events
#[derive(Clone, Default)]
pub struct ErrorRing {
    entries: Arc<Mutex<VecDeque<String>>>,
}

impl ErrorRing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: String) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if entries.len() == ERROR_RING_CAPACITY {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Oldest first
    pub fn recent(&self) -> Vec<String> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.iter().cloned().collect()
    }
}

impl fmt::Debug for ErrorRing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorRing")
            .field("len", &self.recent().len())
            .finish()
    }
}

impl<S: Subscriber> Layer<S> for ErrorRing {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() != Level::ERROR {
            return;
        }
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        self.push(format!(
            "[{}] {}: {}",
            chrono::Utc::now().format("%Y-%m-%d %H:%M:%S"),
            event.metadata().target(),
            visitor.0
        ));
    }
}

#[derive(Default)]
struct MessageVisitor(String);

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.0, "{:?}", value);
        } else {
            let _ = write!(self.0, " {}={:?}", field.name(), value);
        }
    }
}

/// Install the global subscriber. Keep the guard alive for the whole
/// process or the file writer stops flushing.
pub fn init(log_dir: &Path) -> (ErrorRing, WorkerGuard) {
    let ring = ErrorRing::new();

    let file_appender = tracing_appender::rolling::daily(log_dir, "errors.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "nami_rs=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer)
                .with_filter(LevelFilter::ERROR),
        )
        .with(ring.clone())
        .init();

    (ring, guard)
}

/// Log panics instead of letting them vanish with the task
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic payload".to_string());
        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_else(|| "unknown location".to_string());

        tracing::error!("Uncaught panic at {}: {}", location, payload);
    }));
}
