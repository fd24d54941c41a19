//! Prompt composition for participant turns and the closing report.
//!
//! Every prompt here is a pure function of its inputs. Resuming a conversation
//! relies on this: the prompt that produced a recorded turn can be rebuilt from
//! the transcript alone.

use crate::persona::AgentDescriptor;
use crate::state::TurnRecord;
use minijinja::Environment;
use serde::Serialize;

/// Instruction appended to every turn prompt.
pub const IN_CHARACTER_INSTRUCTION: &str = "Respond to this in character, in your own words. \
Keep it to a few sentences and address the other participants directly.";

/// Builds the system instruction a participant's session carries for the whole
/// conversation: name, persona, topic and rules, one per line in that order.
///
/// The name, topic and rules lines are labelled (`Your name is ...`,
/// `Discussion topic: ...`, `Rules: ...`) so the model can tell them apart; the
/// persona text is passed through as written.
pub fn system_instruction(agent: &AgentDescriptor, topic: &str, global_rules: &str) -> String {
    [
        format!("Your name is {}.", agent.display_name),
        agent.persona_text.clone(),
        format!("Discussion topic: {topic}"),
        format!("Rules: {global_rules}"),
    ]
    .join("\n")
}

/// The synthetic opening line used when nobody has spoken yet.
pub fn kickoff_message(first: &AgentDescriptor, topic: &str) -> String {
    format!(
        "The discussion is starting. {}, please open the discussion on the topic \"{}\".",
        first.display_name, topic
    )
}

/// Builds the prompt sent to the next speaker.
///
/// Only the most recent turn is quoted; each participant's session already
/// holds its own earlier exchanges.
pub fn turn_prompt(prior: Option<&TurnRecord>, first: &AgentDescriptor, topic: &str) -> String {
    let message = match prior {
        Some(turn) => turn.render(),
        None => kickoff_message(first, topic),
    };
    format!("{message}\n\n{IN_CHARACTER_INSTRUCTION}")
}

const REPORT_TEMPLATE: &str = r##"# Discussion Report Task

You are an experienced facilitator. Read the transcript of the discussion below and write a report on it.

## Topic
{{ topic }}

## Participants
{% for name in participants %}- {{ name }}
{% endfor %}
## Transcript

{{ transcript }}

---

Write the report in Markdown using exactly these four sections:

## 1. Topic
Restate the topic of the discussion in one or two sentences.

## 2. Key Claims
For each participant, list their main claims as bullet points.

## 3. Summary
A narrative summary of how the discussion developed.

## 4. Conclusion
The conclusion the discussion reached, and any open issues that remain.
"##;

/// Request for the closing report, rendered with the report template.
#[derive(Debug, Serialize)]
pub struct SummaryRequest {
    pub topic: String,
    pub participants: Vec<String>,
    pub transcript: String,
}

impl SummaryRequest {
    pub fn new(topic: &str, agents: &[AgentDescriptor], turns: &[TurnRecord]) -> Self {
        Self {
            topic: topic.to_string(),
            participants: agents.iter().map(|a| a.display_name.clone()).collect(),
            transcript: render_transcript(turns),
        }
    }

    pub fn to_prompt(&self) -> Result<String, minijinja::Error> {
        let mut env = Environment::new();
        env.add_template("report", REPORT_TEMPLATE)?;
        env.get_template("report")?.render(self)
    }
}

/// Renders the transcript for the report: `【name】` headers, blank line between turns.
pub fn render_transcript(turns: &[TurnRecord]) -> String {
    turns
        .iter()
        .map(TurnRecord::render_for_report)
        .collect::<Vec<_>>()
        .join("\n\n")
}
