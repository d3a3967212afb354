use opentelemetry::{
    global,
    metrics::{Counter, Histogram, Meter},
};
use std::sync::LazyLock;

pub static METER: LazyLock<Meter> = LazyLock::new(|| global::meter("fleet-reports"));

// --- Fleet backend gateway ---

pub static GATEWAY_REQUESTS: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("fleet.gateway.requests")
        .with_description("Number of calls issued to the fleet backend")
        .with_unit("{request}")
        .build()
});

pub static GATEWAY_DURATION: LazyLock<Histogram<f64>> = LazyLock::new(|| {
    METER
        .f64_histogram("fleet.gateway.duration")
        .with_description("Duration of fleet backend calls in seconds")
        .with_unit("s")
        .build()
});

pub static GATEWAY_ERRORS: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("fleet.gateway.errors")
        .with_description("Number of failed fleet backend calls")
        .with_unit("{error}")
        .build()
});

// --- Reports ---

pub static REPORT_QUERY_DURATION: LazyLock<Histogram<f64>> = LazyLock::new(|| {
    METER
        .f64_histogram("report.query.duration")
        .with_description("Report query duration in seconds")
        .with_unit("s")
        .build()
});

pub static REPORT_ROWS: LazyLock<Histogram<f64>> = LazyLock::new(|| {
    METER
        .f64_histogram("report.rows")
        .with_description("Number of rows received per report query")
        .with_unit("{row}")
        .build()
});

pub static REPORT_STALE_DROPPED: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("report.stale_responses.dropped")
        .with_description("Report responses discarded because a newer query was issued")
        .with_unit("{response}")
        .build()
});

pub static EXPORTS_RENDERED: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("report.exports.rendered")
        .with_description("Number of report exports rendered")
        .with_unit("{export}")
        .build()
});

pub static EXPORT_SIZE: LazyLock<Histogram<f64>> = LazyLock::new(|| {
    METER
        .f64_histogram("report.export.size")
        .with_description("Size of rendered report exports")
        .with_unit("By")
        .build()
});

// --- HTTP Metrics ---

pub static HTTP_REQUESTS_TOTAL: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("http.requests.total")
        .with_description("Total number of HTTP requests")
        .with_unit("{request}")
        .build()
});

pub static HTTP_REQUEST_DURATION: LazyLock<Histogram<f64>> = LazyLock::new(|| {
    METER
        .f64_histogram("http.request.duration")
        .with_description("HTTP request duration in milliseconds")
        .with_unit("ms")
        .with_boundaries(vec![
            1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0,
        ])
        .build()
});
