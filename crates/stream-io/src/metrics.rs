//! Prometheus metrics for the reading pipeline.
//!
//! Counters cover generation, delivery and consumption. The same registry is
//! served over HTTP when a metrics address is configured.

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder};
use std::sync::LazyLock;
use std::thread;
use tiny_http::{Response, Server};

/// Global metrics registry
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Generation Metrics
// ============================================================================

/// Readings produced by the generator and queued for delivery
pub static READINGS_GENERATED: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new(
        "iotstream_readings_generated_total",
        "Readings produced by the generator",
    )
    .unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

// ============================================================================
// Delivery Metrics
// ============================================================================

/// Readings accepted by the configured sink
pub static DELIVERIES_SUCCEEDED: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new(
        "iotstream_deliveries_succeeded_total",
        "Readings accepted by the sink",
    )
    .unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

/// Readings the sink rejected or failed to accept
pub static DELIVERIES_FAILED: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new(
        "iotstream_deliveries_failed_total",
        "Readings the sink failed to accept (dropped)",
    )
    .unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

/// Deliveries currently awaiting a sink response
pub static DELIVERIES_IN_FLIGHT: LazyLock<IntGauge> = LazyLock::new(|| {
    let gauge = IntGauge::new(
        "iotstream_deliveries_in_flight",
        "Deliveries currently awaiting a sink response",
    )
    .unwrap();
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

/// Delivery latency distribution in seconds
pub static DELIVERY_LATENCY_SECONDS: LazyLock<Histogram> = LazyLock::new(|| {
    let histogram = Histogram::with_opts(
        HistogramOpts::new(
            "iotstream_delivery_latency_seconds",
            "Time from dispatch to sink acknowledgement",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0]),
    )
    .unwrap();
    REGISTRY.register(Box::new(histogram.clone())).unwrap();
    histogram
});

// ============================================================================
// Consumer Metrics
// ============================================================================

/// Messages taken off the broker
pub static MESSAGES_CONSUMED: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new(
        "iotstream_messages_consumed_total",
        "Messages received from the broker",
    )
    .unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

// ============================================================================
// Metrics HTTP Server
// ============================================================================

/// Start the metrics HTTP server on the given address.
/// Returns a join handle for the server thread.
pub fn serve_metrics(bind_addr: String) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let server = match Server::http(&bind_addr) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!("Failed to start metrics server on {}: {}", bind_addr, e);
                return;
            }
        };

        tracing::info!("Metrics server listening on http://{}/metrics", bind_addr);

        for request in server.incoming_requests() {
            match request.url() {
                "/metrics" => {
                    let _ = request.respond(metrics_response());
                }
                "/health" => {
                    let _ = request.respond(Response::from_string("OK"));
                }
                "/ready" => {
                    // Ready once the generator has produced something
                    if READINGS_GENERATED.get() > 0 {
                        let _ = request.respond(Response::from_string("Ready"));
                    } else {
                        let _ = request
                            .respond(Response::from_string("Not Ready").with_status_code(503));
                    }
                }
                _ => {
                    let _ =
                        request.respond(Response::from_string("Not Found").with_status_code(404));
                }
            }
        }
    })
}

fn metrics_response() -> Response<std::io::Cursor<Vec<u8>>> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        tracing::warn!("Failed to encode metrics: {}", e);
        return Response::from_data(b"Internal Server Error".to_vec()).with_status_code(500);
    }
    let response = Response::from_data(buffer);
    match tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"text/plain; version=0.0.4"[..]) {
        Ok(header) => response.with_header(header),
        Err(()) => response,
    }
}

/// Initialize all metrics (forces lazy initialization)
pub fn init_metrics() {
    let _ = READINGS_GENERATED.get();
    let _ = DELIVERIES_SUCCEEDED.get();
    let _ = DELIVERIES_FAILED.get();
    let _ = DELIVERIES_IN_FLIGHT.get();
    let _ = DELIVERY_LATENCY_SECONDS.get_sample_count();
    let _ = MESSAGES_CONSUMED.get();
}
