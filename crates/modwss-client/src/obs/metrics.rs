//! Minimal metrics registry for the client.
//!
//! No external metrics crate is used; this module provides counter and
//! histogram types with dynamic labels backed by `DashMap`. Labels are
//! flattened into sorted key vectors to keep deterministic ordering. Histogram
//! buckets are fixed in milliseconds; a handshake spans a network round trip
//! and, for device login, up to the whole wait ceiling.

use dashmap::DashMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Helper to escape label values.
fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn label_key(labels: &[(&str, &str)]) -> Vec<(String, String)> {
    let mut key: Vec<(String, String)> = labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    key.sort();
    key
}

fn label_str(key: &[(String, String)]) -> String {
    key.iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
        .collect::<Vec<_>>()
        .join(",")
}

#[derive(Default)]
pub struct CounterVec {
    map: DashMap<Vec<(String, String)>, AtomicU64>,
}

impl CounterVec {
    /// Increment by 1.
    pub fn inc(&self, labels: &[(&str, &str)]) {
        self.add(labels, 1);
    }

    /// Increment by an arbitrary value.
    pub fn add(&self, labels: &[(&str, &str)], v: u64) {
        let counter = self
            .map
            .entry(label_key(labels))
            .or_insert_with(|| AtomicU64::new(0));
        counter.fetch_add(v, Ordering::Relaxed);
    }

    /// Current value for an exact label set (0 if never touched).
    pub fn get(&self, labels: &[(&str, &str)]) -> u64 {
        self.map
            .get(&label_key(labels))
            .map_or(0, |c| c.load(Ordering::Relaxed))
    }

    /// Render in Prometheus text exposition format.
    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# TYPE {} counter", name);
        for r in self.map.iter() {
            let val = r.value().load(Ordering::Relaxed);
            let _ = writeln!(out, "{}{{{}}} {}", name, label_str(r.key()), val);
        }
    }
}

// 10ms, 50ms, 100ms, 500ms, 1s, 5s, 30s, 60s, 5min, 15min
const BUCKETS_MILLIS: [u64; 10] = [
    10, 50, 100, 500, 1_000, 5_000, 30_000, 60_000, 300_000, 900_000,
];

#[derive(Default)]
struct AtomicHistogram {
    count: AtomicU64,
    sum: AtomicU64,
    buckets: [AtomicU64; 10],
}

#[derive(Default)]
pub struct HistogramVec {
    map: DashMap<Vec<(String, String)>, AtomicHistogram>,
}

impl HistogramVec {
    /// Observe a duration and increment cumulative buckets (millisecond scale).
    pub fn observe(&self, labels: &[(&str, &str)], duration: Duration) {
        let hist = self.map.entry(label_key(labels)).or_default();
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);

        hist.count.fetch_add(1, Ordering::Relaxed);
        hist.sum.fetch_add(millis, Ordering::Relaxed);

        for (i, &b) in BUCKETS_MILLIS.iter().enumerate() {
            if millis <= b {
                hist.buckets[i].fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Render in Prometheus text exposition format (unit: milliseconds).
    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# TYPE {} histogram", name);
        for r in self.map.iter() {
            let hist = r.value();
            let labels = label_str(r.key());
            let prefix = if labels.is_empty() {
                String::new()
            } else {
                format!("{},", labels)
            };

            for (i, &le) in BUCKETS_MILLIS.iter().enumerate() {
                let count = hist.buckets[i].load(Ordering::Relaxed);
                let _ = writeln!(out, "{}_bucket{{{}le=\"{}\"}} {}", name, prefix, le, count);
            }
            let count = hist.count.load(Ordering::Relaxed);
            let _ = writeln!(out, "{}_bucket{{{}le=\"+Inf\"}} {}", name, prefix, count);

            let sum = hist.sum.load(Ordering::Relaxed);
            let _ = writeln!(out, "{}_sum{{{}}} {}", name, labels, sum);
            let _ = writeln!(out, "{}_count{{{}}} {}", name, labels, count);
        }
    }
}

#[derive(Default)]
pub struct WssMetrics {
    pub frames_sent: CounterVec,
    pub envelopes_routed: CounterVec,
    pub waits: CounterVec,
    pub disconnects: CounterVec,
    pub handshake_duration: HistogramVec,
}

impl WssMetrics {
    /// Render all registered metrics plus any extra gauge lines provided by callers.
    pub fn render(&self, extra: &[(&str, u64)]) -> String {
        let mut out = String::new();
        self.frames_sent.render("modwss_frames_sent_total", &mut out);
        self.envelopes_routed.render("modwss_envelopes_routed_total", &mut out);
        self.waits.render("modwss_waits_total", &mut out);
        self.disconnects.render("modwss_unexpected_disconnects_total", &mut out);
        self.handshake_duration.render("modwss_handshake_duration_millis", &mut out);

        for (k, v) in extra {
            let _ = writeln!(out, "# TYPE {} gauge\n{} {}", k, k, v);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_sort_labels() {
        let m = WssMetrics::default();
        m.waits.inc(&[("result", "ok"), ("operation", "a")]);
        m.waits.inc(&[("operation", "a"), ("result", "ok")]);
        assert_eq!(m.waits.get(&[("result", "ok"), ("operation", "a")]), 2);

        let text = m.render(&[("modwss_pending_waits", 3)]);
        assert!(text.contains("modwss_waits_total{operation=\"a\",result=\"ok\"} 2"));
        assert!(text.contains("modwss_pending_waits 3"));
    }

    #[test]
    fn histogram_is_cumulative() {
        let h = HistogramVec::default();
        h.observe(&[("operation", "x")], Duration::from_millis(70));
        let mut out = String::new();
        h.render("t", &mut out);
        assert!(out.contains("t_bucket{operation=\"x\",le=\"50\"} 0"));
        assert!(out.contains("t_bucket{operation=\"x\",le=\"100\"} 1"));
        assert!(out.contains("t_bucket{operation=\"x\",le=\"+Inf\"} 1"));
        assert!(out.contains("t_sum{operation=\"x\"} 70"));
    }
}
