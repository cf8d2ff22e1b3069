//! The capabilities exposed to the junior over the realtime session.
//!
//! These are the only levers the front agent has on the orchestration layer.
//! Argument structs derive `JsonSchema` so the session registration and the
//! call-site parsing share one definition.

use schemars::JsonSchema;
use serde::Deserialize;

pub const REQUEST_NEXT_STAGE: &str = "request_next_stage";
pub const CONSULT_SENIOR: &str = "consult_senior";

pub const REQUEST_NEXT_STAGE_DESCRIPTION: &str = "Call this when you believe the \
current interview stage's goals are fully met. A senior interviewer reviews the \
transcript and decides whether to move on; keep the conversation going naturally \
until new instructions arrive.";

pub const CONSULT_SENIOR_DESCRIPTION: &str = "Privately ask the senior interviewer \
a question without requesting a stage change, for example when the candidate asks \
something outside your brief. Keep talking while you wait for guidance.";

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RequestNextStageArgs {
    #[schemars(description = "Why you believe the current stage's goals are satisfied")]
    pub reason: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ConsultSeniorArgs {
    #[schemars(description = "The question to put to the senior interviewer")]
    pub question: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemars::schema_for;

    #[test]
    fn argument_schemas_declare_their_fields() {
        let schema = serde_json::to_value(schema_for!(RequestNextStageArgs)).unwrap();
        assert_eq!(schema["properties"]["reason"]["type"], "string");
        assert!(schema["required"]
            .as_array()
            .unwrap()
            .contains(&serde_json::json!("reason")));

        let schema = serde_json::to_value(schema_for!(ConsultSeniorArgs)).unwrap();
        assert_eq!(schema["properties"]["question"]["type"], "string");
    }

    #[test]
    fn arguments_parse_from_call_payloads() {
        let args: RequestNextStageArgs =
            serde_json::from_str(r#"{"reason":"intro covered name, role, and motivation"}"#)
                .unwrap();
        assert!(args.reason.contains("motivation"));

        assert!(serde_json::from_str::<RequestNextStageArgs>("{}").is_err());
    }
}
