use opentelemetry::{
    global,
    metrics::{Counter, Histogram, Meter},
};
use std::sync::LazyLock;

pub static METER: LazyLock<Meter> = LazyLock::new(|| global::meter("civic-report-desk"));

// --- GenAI client metrics ---

pub static GEN_AI_TOKEN_USAGE: LazyLock<Histogram<f64>> = LazyLock::new(|| {
    METER
        .f64_histogram("gen_ai.client.token.usage")
        .with_description("Number of tokens used per LLM call")
        .with_unit("{token}")
        .build()
});

pub static GEN_AI_OPERATION_DURATION: LazyLock<Histogram<f64>> = LazyLock::new(|| {
    METER
        .f64_histogram("gen_ai.client.operation.duration")
        .with_description("Duration of LLM operations in seconds")
        .with_unit("s")
        .build()
});

pub static GEN_AI_ERROR_COUNT: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("gen_ai.client.error.count")
        .with_description("Number of LLM call errors")
        .with_unit("{error}")
        .build()
});

// --- Vision ---

pub static VISION_DURATION: LazyLock<Histogram<f64>> = LazyLock::new(|| {
    METER
        .f64_histogram("vision.label_detection.duration")
        .with_description("Duration of label detection calls in seconds")
        .with_unit("s")
        .build()
});

pub static VISION_LABELS: LazyLock<Histogram<f64>> = LazyLock::new(|| {
    METER
        .f64_histogram("vision.labels")
        .with_description("Number of labels returned per image")
        .with_unit("{label}")
        .build()
});

// --- Domain Metrics ---

pub static REPORT_DRAFTS: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("report.drafts")
        .with_description("Drafted reports, split by refusal")
        .with_unit("{draft}")
        .build()
});

pub static AUTHORITY_RESOLUTIONS: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("report.authority.resolutions")
        .with_description("Authority email lookups, split by hit or miss")
        .with_unit("{lookup}")
        .build()
});

pub static PDF_EXPORTS: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("report.pdf.exports")
        .with_description("Number of PDF documents rendered")
        .with_unit("{document}")
        .build()
});

pub static PDF_PAGES: LazyLock<Histogram<f64>> = LazyLock::new(|| {
    METER
        .f64_histogram("report.pdf.pages")
        .with_description("Pages per rendered PDF")
        .with_unit("{page}")
        .build()
});

pub static MAIL_DELIVERIES: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("report.mail.deliveries")
        .with_description("Mail submissions, split by outcome")
        .with_unit("{message}")
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
            30000.0,
        ])
        .build()
});
