//! Call and tool counters
//!
//! Recording goes through the `metrics` facade and is a no-op until a
//! recorder is installed with [`init_metrics`].

use metrics::{counter, describe_counter};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use crate::domain::call::EndReason;
use crate::domain::tool::{ToolName, ToolOutcome};

/// Install the Prometheus recorder for this process
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    describe_counter!("outbound_calls_total", "Total number of outbound calls started");
    describe_counter!(
        "outbound_calls_ended_total",
        "Total number of outbound calls ended, by end reason"
    );
    describe_counter!(
        "outbound_tool_invocations_total",
        "Total number of tool invocations, by tool and outcome"
    );

    Ok(handle)
}

pub fn record_call_started() {
    counter!("outbound_calls_total").increment(1);
}

pub fn record_call_ended(reason: &EndReason) {
    counter!("outbound_calls_ended_total", "reason" => reason.as_str()).increment(1);
}

pub fn record_tool_invocation(tool: ToolName, outcome: &ToolOutcome) {
    counter!(
        "outbound_tool_invocations_total",
        "tool" => tool.as_str(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
}
