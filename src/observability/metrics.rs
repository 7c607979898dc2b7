//! Metrics collection and exposition.
//!
//! # Metrics
//! - `ext_authz_checks_total` (counter): checks by version, verdict, RPC code
//! - `ext_authz_check_duration_seconds` (histogram): time to verdict, sleeps included
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - Labels are static strings, never request data

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder};

use crate::check::verdict::{rpc_code_name, Verdict};
use crate::protocol::ProtocolVersion;

pub const CHECKS_TOTAL: &str = "ext_authz_checks_total";
pub const CHECK_DURATION_SECONDS: &str = "ext_authz_check_duration_seconds";

const DURATION_BUCKETS: [f64; 12] = [
    0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 60.0,
];

/// Install the Prometheus exporter listening on `addr`.
///
/// Must be called from within a tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Full(CHECK_DURATION_SECONDS.to_string()),
            &DURATION_BUCKETS,
        )?
        .install()?;

    ::metrics::describe_counter!(CHECKS_TOTAL, "Check calls answered");
    ::metrics::describe_histogram!(
        CHECK_DURATION_SECONDS,
        ::metrics::Unit::Seconds,
        "Time from receiving a check call to its verdict"
    );
    tracing::info!(address = %addr, "Prometheus exporter listening");
    Ok(())
}

/// Record one answered check call.
pub fn record_check(version: ProtocolVersion, verdict: &Verdict, started: Instant) {
    ::metrics::counter!(
        CHECKS_TOTAL,
        "version" => version.as_str(),
        "verdict" => verdict.label(),
        "code" => rpc_code_name(verdict.rpc_code())
    )
    .increment(1);
    ::metrics::histogram!(CHECK_DURATION_SECONDS, "version" => version.as_str())
        .record(started.elapsed().as_secs_f64());
}
