//! The one metric spec names explicitly: `outbox_queue_size`, a
//! backpressure gauge the dispatcher refreshes every poll.

use prometheus::{Gauge, Registry};

pub struct Metrics {
    registry: Registry,
    outbox_queue_size: Gauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();
        let outbox_queue_size = Gauge::new(
            "outbox_queue_size",
            "Number of PENDING rows currently sitting in the outbox",
        )
        .expect("metric name/help are static and valid");
        registry
            .register(Box::new(outbox_queue_size.clone()))
            .expect("metric is registered exactly once");

        Self {
            registry,
            outbox_queue_size,
        }
    }

    pub fn set_outbox_queue_size(&self, count: i64) {
        self.outbox_queue_size.set(count as f64);
    }

    pub fn outbox_queue_size(&self) -> f64 {
        self.outbox_queue_size.get()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
