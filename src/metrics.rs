//! Prometheus counters for the detector process

use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, TextEncoder};

fn counter(name: &str, help: &str) -> IntCounter {
    let c = IntCounter::new(name, help).expect("valid metric definition");
    // A duplicate name leaves the counter working but unexported.
    let _ = prometheus::register(Box::new(c.clone()));
    c
}

pub static SAMPLES_TOTAL: Lazy<IntCounter> =
    Lazy::new(|| counter("freqwatch_samples_total", "Total samples classified"));

pub static ANOMALIES_TOTAL: Lazy<IntCounter> =
    Lazy::new(|| counter("freqwatch_anomalies_total", "Total anomalies detected"));

pub static REJECTED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    counter(
        "freqwatch_rejected_samples_total",
        "Total non-finite or out-of-range samples rejected",
    )
});

pub static PERSISTED_TOTAL: Lazy<IntCounter> =
    Lazy::new(|| counter("freqwatch_persisted_total", "Total anomaly records persisted"));

pub static PERSIST_FAILURES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    counter(
        "freqwatch_persist_failures_total",
        "Total anomaly records dropped after a store failure",
    )
});

pub static RECONNECTS_TOTAL: Lazy<IntCounter> =
    Lazy::new(|| counter("freqwatch_reconnects_total", "Total stream reconnect attempts"));

/// Touch every metric so it is exported before its first increment
pub fn init() {
    let _ = &*SAMPLES_TOTAL;
    let _ = &*ANOMALIES_TOTAL;
    let _ = &*REJECTED_TOTAL;
    let _ = &*PERSISTED_TOTAL;
    let _ = &*PERSIST_FAILURES_TOTAL;
    let _ = &*RECONNECTS_TOTAL;
}

/// Text exposition of the default registry
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        return format!("# encode error: {}\n", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_lists_counters() {
        init();
        SAMPLES_TOTAL.inc();
        let text = render();
        assert!(text.contains("freqwatch_samples_total"));
        assert!(text.contains("freqwatch_persist_failures_total"));
    }
}
