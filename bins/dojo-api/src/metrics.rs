// Prometheus counters for runs and submissions

use lazy_static::lazy_static;
use prometheus::{register_int_counter_vec, Encoder, IntCounterVec, TextEncoder};

lazy_static! {
    pub static ref RUNS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "dojo_runs_total",
        "Interactive runs by language and outcome",
        &["language", "outcome"]
    )
    .expect("dojo_runs_total registers once");
    pub static ref SUBMISSIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "dojo_submissions_total",
        "Submissions by language and outcome",
        &["language", "outcome"]
    )
    .expect("dojo_submissions_total registers once");
}

pub fn record_run(language: &str, outcome: &str) {
    RUNS_TOTAL.with_label_values(&[language, outcome]).inc();
}

pub fn record_submission(language: &str, outcome: &str) {
    SUBMISSIONS_TOTAL.with_label_values(&[language, outcome]).inc();
}

/// Render every registered metric in the text exposition format
pub fn render() -> Result<String, prometheus::Error> {
    // Touch the statics so both families are exported before the first request
    lazy_static::initialize(&RUNS_TOTAL);
    lazy_static::initialize(&SUBMISSIONS_TOTAL);

    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
