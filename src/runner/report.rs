use crate::metrics::RunSummary;
use crate::registration::RegistrationOutcome;

fn percent_x100(value: u64) -> String {
    format!("{}.{:02}", value / 100, value % 100)
}

pub(crate) fn summary_lines(summary: &RunSummary, label: &str) -> Vec<String> {
    vec![
        format!("Label: {}", label),
        format!("Duration: {}ms", summary.duration_ms),
        format!("Total Samples: {}", summary.total),
        format!(
            "Successful: {} ({}%)",
            summary.successful,
            percent_x100(summary.success_rate_x100())
        ),
        format!("Rejected: {}", summary.rejected),
        format!("Transport Errors: {}", summary.transport_errors),
        format!("Timeouts: {}", summary.timeouts),
        format!("Configuration Errors: {}", summary.configuration_errors),
        format!("Throughput: {} samples/s", percent_x100(summary.throughput_x100())),
        format!(
            "Min/Avg/Max Latency: {}ms / {}ms / {}ms",
            summary.min_latency_ms, summary.avg_latency_ms, summary.max_latency_ms
        ),
        format!(
            "P50/P90/P99 Latency: {}ms / {}ms / {}ms",
            summary.p50_latency_ms, summary.p90_latency_ms, summary.p99_latency_ms
        ),
    ]
}

pub(crate) fn outcome_lines(outcome: &RegistrationOutcome) -> Vec<String> {
    let mut lines = vec![
        format!("Status: {}", outcome.status().as_str()),
        format!("Kind: {}", outcome.kind().as_str()),
        format!("Response Code: {}", outcome.response_code()),
        format!("Message: {}", outcome.message()),
        format!("Elapsed: {}ms", outcome.elapsed_ms()),
    ];
    if let Some(endpoint) = outcome.endpoint() {
        lines.push(format!("Endpoint: {}", endpoint));
    }
    if let Some(id) = outcome.registration_id() {
        lines.push(format!("Registration Id: {}", id));
    }
    lines
}

pub(crate) fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{}", line);
    }
}
