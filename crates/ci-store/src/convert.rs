use ci_types::{
    ActivityKind, Agent, BatchClassification, BatchKind, BatchStatus, ObservationCategory,
    ObservationOrigin, ObservationStatus, ParentSessionReason, ResolutionKind,
};

pub fn batch_status_str(s: BatchStatus) -> &'static str {
    match s {
        BatchStatus::Active => "active",
        BatchStatus::Completed => "completed",
        BatchStatus::Processed => "processed",
    }
}

pub fn batch_status_from_str(s: &str) -> BatchStatus {
    match s {
        "active" => BatchStatus::Active,
        "processed" => BatchStatus::Processed,
        _ => BatchStatus::Completed,
    }
}

pub fn batch_kind_str(k: BatchKind) -> &'static str {
    match k {
        BatchKind::UserPrompt => "user_prompt",
        BatchKind::AgentNotification => "agent_notification",
        BatchKind::System => "system",
        BatchKind::Plan => "plan",
        BatchKind::DerivedPlan => "derived_plan",
    }
}

pub fn batch_kind_from_str(s: &str) -> BatchKind {
    match s {
        "agent_notification" => BatchKind::AgentNotification,
        "system" => BatchKind::System,
        "plan" => BatchKind::Plan,
        "derived_plan" => BatchKind::DerivedPlan,
        _ => BatchKind::UserPrompt,
    }
}

pub fn batch_classification_str(c: BatchClassification) -> &'static str {
    c.as_str()
}

pub fn batch_classification_from_str(s: &str) -> Option<BatchClassification> {
    BatchClassification::parse(s)
}

pub fn activity_kind_str(k: ActivityKind) -> &'static str {
    match k {
        ActivityKind::ToolUse => "tool_use",
        ActivityKind::ToolUseFailure => "tool_use_failure",
        ActivityKind::AssistantMessage => "assistant_message",
        ActivityKind::PlanProposed => "plan_proposed",
    }
}

pub fn activity_kind_from_str(s: &str) -> ActivityKind {
    match s {
        "tool_use_failure" => ActivityKind::ToolUseFailure,
        "assistant_message" => ActivityKind::AssistantMessage,
        "plan_proposed" => ActivityKind::PlanProposed,
        _ => ActivityKind::ToolUse,
    }
}

pub fn observation_status_str(s: ObservationStatus) -> &'static str {
    match s {
        ObservationStatus::Active => "active",
        ObservationStatus::Resolved => "resolved",
        ObservationStatus::Superseded => "superseded",
    }
}

pub fn observation_status_from_str(s: &str) -> ObservationStatus {
    match s {
        "resolved" => ObservationStatus::Resolved,
        "superseded" => ObservationStatus::Superseded,
        _ => ObservationStatus::Active,
    }
}

pub fn observation_category_str(c: &ObservationCategory) -> String {
    match c {
        ObservationCategory::Decision => "decision".to_string(),
        ObservationCategory::Convention => "convention".to_string(),
        ObservationCategory::Gotcha => "gotcha".to_string(),
        ObservationCategory::Preference => "preference".to_string(),
        ObservationCategory::Todo => "todo".to_string(),
        ObservationCategory::Other(s) => format!("other:{s}"),
    }
}

pub fn observation_category_from_str(s: &str) -> ObservationCategory {
    match s {
        "decision" => ObservationCategory::Decision,
        "convention" => ObservationCategory::Convention,
        "gotcha" => ObservationCategory::Gotcha,
        "preference" => ObservationCategory::Preference,
        "todo" => ObservationCategory::Todo,
        other => ObservationCategory::Other(other.strip_prefix("other:").unwrap_or(other).to_string()),
    }
}

pub fn observation_origin_str(o: ObservationOrigin) -> &'static str {
    match o {
        ObservationOrigin::AutoExtracted => "auto_extracted",
        ObservationOrigin::AgentCreated => "agent_created",
    }
}

pub fn observation_origin_from_str(s: &str) -> ObservationOrigin {
    match s {
        "agent_created" => ObservationOrigin::AgentCreated,
        _ => ObservationOrigin::AutoExtracted,
    }
}

pub fn resolution_kind_str(k: ResolutionKind) -> &'static str {
    match k {
        ResolutionKind::Resolve => "resolve",
        ResolutionKind::Supersede => "supersede",
        ResolutionKind::Reactivate => "reactivate",
    }
}

pub fn resolution_kind_from_str(s: &str) -> ResolutionKind {
    match s {
        "supersede" => ResolutionKind::Supersede,
        "reactivate" => ResolutionKind::Reactivate,
        _ => ResolutionKind::Resolve,
    }
}

pub fn parent_session_reason_str(r: ParentSessionReason) -> &'static str {
    match r {
        ParentSessionReason::Clear => "clear",
        ParentSessionReason::Compact => "compact",
        ParentSessionReason::Inferred => "inferred",
    }
}

pub fn parent_session_reason_from_str(s: &str) -> ParentSessionReason {
    match s {
        "clear" => ParentSessionReason::Clear,
        "compact" => ParentSessionReason::Compact,
        _ => ParentSessionReason::Inferred,
    }
}

pub fn agent_str(a: Agent) -> &'static str {
    a.as_str()
}

pub fn agent_from_str(s: &str) -> Agent {
    Agent::from_str_loose(s)
}

pub fn string_list_to_json(list: &[String]) -> String {
    serde_json::to_string(list).unwrap_or_else(|_| "[]".to_string())
}

pub fn json_to_string_list(s: &str) -> Vec<String> {
    serde_json::from_str(s).unwrap_or_default()
}
