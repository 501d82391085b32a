use outbound_caller::application::{CallLifecycleController, OutboundAgent, ToolDispatcher};
use outbound_caller::config::Config;
use outbound_caller::domain::dial_info::{DialInfoResolver, JobMetadata};
use outbound_caller::infrastructure::metrics::init_metrics;
use outbound_caller::infrastructure::simulated::{ScriptStep, SimulatedTelephony};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Local overrides for development, like the trunk id
    dotenvy::from_filename(".env.local").ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("outbound_caller=info".parse()?))
        .init();

    info!("Starting outbound caller");

    // Load configuration
    let config = Config::load()?;
    info!("Configuration loaded: {:?}", config);
    info!("Agent {} placing calls for {}", config.agent.name, config.agent.company);

    let metrics = init_metrics()?;

    // Job metadata: first argument, else JOB_METADATA
    let metadata = JobMetadata::from(
        std::env::args()
            .nth(1)
            .or_else(|| std::env::var("JOB_METADATA").ok()),
    );
    let resolution = DialInfoResolver::new(config.dial.defaults()).resolve(&metadata);
    if resolution.ambiguous {
        warn!("Job metadata matched several phone numbers, using the first one");
    }
    info!(
        "Dial info resolved from {:?} metadata, defaulted fields: {:?}",
        resolution.source, resolution.defaulted
    );

    let telephony = SimulatedTelephony::new(config.agent.room_name());
    let session = telephony
        .session()
        .with_reply_delay(Duration::from_millis(200))
        .with_script(demo_script());
    let provider = telephony.provider().answer_after(Duration::from_millis(500));

    let controller = CallLifecycleController::new(
        &config.sip,
        resolution.dial_info,
        Arc::new(telephony.room()),
        Arc::new(provider),
        Arc::new(session),
    );
    let dispatcher = ToolDispatcher::new(Arc::clone(&controller), &config.agent);
    let agent = OutboundAgent::profile(
        controller.dial_info().prospect_name(),
        &config.agent,
        dispatcher,
    );

    let reason = controller.run(agent).await?;
    info!("Call {} finished: {:?}", controller.call_id(), reason);

    for event in telephony.journal().events() {
        debug!("{:?}", event);
    }
    info!("Metrics snapshot:\n{}", metrics.render());

    Ok(())
}

/// Conversation played by the simulated callee once it joins
fn demo_script() -> Vec<ScriptStep> {
    vec![
        ScriptStep::Say("Hi, I'm calling from Futurense Technologies. Do you have a minute to talk?".to_string()),
        ScriptStep::Pause(Duration::from_millis(300)),
        ScriptStep::Invoke {
            tool: "look_up_availability".to_string(),
            arguments: json!({ "date": "tomorrow" }),
        },
        ScriptStep::Invoke {
            tool: "confirm_appointment".to_string(),
            arguments: json!({ "date": "tomorrow", "time": "2pm" }),
        },
        ScriptStep::Say("Thank you, someone from our team will reach out. Goodbye!".to_string()),
        ScriptStep::Invoke {
            tool: "end_call".to_string(),
            arguments: json!({}),
        },
    ]
}
