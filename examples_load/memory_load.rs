use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

use tracing_sentry_sink::init::{init_tracing_with_config, LayerConfig};
use tracing_sentry_sink::memory_client::MemoryClient;
use tracing_sentry_sink::ErrorReportingSink;

fn main() {
    let client = MemoryClient::new();
    let sink = Arc::new(ErrorReportingSink::with_client(client.clone()));

    let layer_config = LayerConfig {
        enable_stdout: false,
        ..LayerConfig::default()
    };
    init_tracing_with_config(Arc::clone(&sink), layer_config).expect("install subscriber");

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        if i % 10 == 0 {
            error!(iteration = i, "load test error");
        } else {
            info!(iteration = i, "load test step");
        }
    }

    let elapsed = start.elapsed();
    println!("wrote {} events in {:?} (~{:.0} ev/s), {:?}",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64(),
        sink.stats()
    );
    println!(
        "reports accepted: {}, kept in memory: {}",
        client.report_count(),
        client.reports().len()
    );
}
