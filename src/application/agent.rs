//! Sales agent persona handed to the conversation session

use std::sync::Arc;

use crate::config::AgentConfig;
use crate::domain::telephony::AgentProfile;
use crate::domain::tool::{ToolInvoker, ToolName};

/// Instructions for the turn announcing a transfer
pub const TRANSFER_ANNOUNCEMENT: &str = "let the user know you'll be transferring them";

/// Instructions for the apology after a failed transfer
pub const TRANSFER_APOLOGY: &str = "there was an error transferring the call.";

/// Builds the script and tool surface of the outbound sales agent
pub struct OutboundAgent;

impl OutboundAgent {
    pub fn instructions(prospect_name: &str, config: &AgentConfig) -> String {
        format!(
            r#"You're a sales rep for {company}. You're calling {name} about the {program}.

Follow this conversation structure:
1) Introduce yourself by saying "Hi, I'm calling from {company}. Do you have a minute to talk?" (STOP)
2) After they respond, say "I see that you're interested in our {program}" (STOP)
3) After they respond, ask "Where did you study from?" (STOP)
4) After they respond, ask about their graduation percentage/CGPA (STOP)
5) Thank them and say someone will reach out, then end the call

Additional guidelines:
- Speak one dialogue at a time. Speak less and listen more.
- Talk at a slightly fast pace like a typical sales call.
- If the user expresses disinterest or negativity, politely apologize and end the call.
- If the user wants to be transferred to a human agent, use the transfer_call tool.

Your interface with the user will be voice. Be conversational but concise."#,
            company = config.company,
            name = prospect_name,
            program = config.program,
        )
    }

    pub fn profile(
        prospect_name: &str,
        config: &AgentConfig,
        invoker: Arc<dyn ToolInvoker>,
    ) -> AgentProfile {
        AgentProfile {
            instructions: Self::instructions(prospect_name, config),
            tools: ToolName::ALL.iter().map(ToolName::spec).collect(),
            invoker,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_instructions_mention_prospect_and_company() {
        let config = Config::default();
        let instructions = OutboundAgent::instructions("Asha", &config.agent);

        assert!(instructions.contains("You're calling Asha"));
        assert!(instructions.contains("Futurense Technologies"));
        assert!(instructions.contains("transfer_call"));
    }
}
