//! `llm-roundtable` - command line driver.
//!
//! Every invocation is a fresh process: it loads the persisted conversation
//! state, performs one transition (or, with `run`, keeps stepping), and saves
//! the state again.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use llm_roundtable::backend::GeminiBackend;
use llm_roundtable::config::{Credential, RoundtableConfig};
use llm_roundtable::observability::{self, ObservabilityConfig};
use llm_roundtable::storage::{JsonFileStore, StateStore};
use llm_roundtable::{ConversationState, Orchestrator, Phase, StepOutcome, TurnRecord};
use std::path::{Path, PathBuf};
use tracing::Level;

#[derive(Parser)]
#[command(name = "llm-roundtable", version, about = "Multi-persona LLM roundtable")]
struct Cli {
    /// File holding the conversation state between invocations
    #[arg(long, env = "ROUNDTABLE_STATE", default_value = "roundtable-state.json")]
    state: PathBuf,

    /// Gemini API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Log level for roundtable events
    #[arg(long, default_value = "warn")]
    log_level: Level,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start a new conversation (replaces any stored one)
    Start {
        /// JSON configuration file
        #[arg(long)]
        config: Option<PathBuf>,
        /// Discussion topic
        #[arg(long)]
        topic: Option<String>,
        /// Number of stock personas to seat (2-4)
        #[arg(long)]
        participants: Option<usize>,
        /// Number of turns before the closing report
        #[arg(long)]
        turns: Option<usize>,
        /// Model identifier
        #[arg(long)]
        model: Option<String>,
    },
    /// Advance the stored conversation by one step
    Step,
    /// Keep stepping until the report is ready or a step fails
    Run {
        /// JSON configuration file supplying `pace_secs`
        #[arg(long)]
        config: Option<PathBuf>,
        /// Seconds to pause between steps (overrides the configuration)
        #[arg(long)]
        pace: Option<f64>,
    },
    /// Print the transcript and report
    Show,
    /// Discard the stored conversation
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    observability::init(ObservabilityConfig {
        level: cli.log_level,
        ..Default::default()
    })
    .map_err(|err| anyhow::anyhow!("failed to initialise logging: {err}"))?;

    let store = JsonFileStore::new(&cli.state);
    let credential = cli.api_key.clone().map(Credential::new);

    match cli.command {
        Command::Start {
            config,
            topic,
            participants,
            turns,
            model,
        } => {
            let mut settings = settings(config.as_deref())?;
            if let Some(topic) = topic {
                settings.topic = topic;
            }
            if let Some(participants) = participants {
                settings.participants = participants;
            }
            if let Some(turns) = turns {
                settings.max_turns = turns;
            }
            if let Some(model) = model {
                settings.model_id = model;
            }

            let mut orchestrator = Orchestrator::new(backend(credential.as_ref()));
            let state = orchestrator
                .start(settings.to_start_request(credential))
                .await?;
            store.save(&state)?;

            println!("Topic: {}", state.topic());
            for agent in state.agents() {
                println!("  {}", agent.label());
            }
            println!("Started ({} turns).", state.max_turns());
        }
        Command::Step => {
            let state = store.load()?;
            let mut orchestrator = Orchestrator::new(backend(credential.as_ref()));
            advance(&mut orchestrator, &store, &state).await?;
        }
        Command::Run { config, pace } => {
            let mut settings = settings(config.as_deref())?;
            if let Some(pace) = pace {
                settings.pace_secs = pace;
            }
            let pace = settings.pace();
            let mut state = store.load()?;
            if state.phase() == Phase::Idle {
                bail!("no conversation in progress; run `start` first");
            }
            let mut orchestrator = Orchestrator::new(backend(credential.as_ref()));
            while !state.is_done() {
                state = advance(&mut orchestrator, &store, &state).await?;
                if !state.is_done() {
                    tokio::time::sleep(pace).await;
                }
            }
        }
        Command::Show => show(&store.load()?),
        Command::Reset => {
            let state = store.load()?;
            let mut orchestrator = Orchestrator::new(backend(credential.as_ref()));
            let idle = orchestrator.reset(state);
            store.save(&idle)?;
            println!("Conversation reset.");
        }
    }

    Ok(())
}

fn settings(path: Option<&Path>) -> Result<RoundtableConfig> {
    RoundtableConfig::load_or_default(path).with_context(|| match path {
        Some(path) => format!("reading {}", path.display()),
        None => "loading default configuration".to_string(),
    })
}

fn backend(credential: Option<&Credential>) -> GeminiBackend {
    GeminiBackend::new(credential.map(Credential::expose).unwrap_or_default())
}

/// Performs one step and persists the result. On failure the stored state is
/// left as it was.
async fn advance(
    orchestrator: &mut Orchestrator<GeminiBackend>,
    store: &JsonFileStore,
    state: &ConversationState,
) -> Result<ConversationState> {
    let step = match orchestrator.step(state).await {
        Ok(step) => step,
        Err(err) => {
            if err.as_backend().is_some_and(|e| e.is_retryable()) {
                eprintln!("Step failed ({err}); run the command again to retry.");
            }
            return Err(err.into());
        }
    };
    store.save(&step.state)?;

    match &step.outcome {
        StepOutcome::NotStarted => println!("No conversation in progress; run `start` first."),
        StepOutcome::TurnAppended(turn) => {
            print_turn(turn);
            println!("[{}]", step.state.progress());
            if step.state.phase() == Phase::Summarizing {
                println!("All turns are in; the next step writes the report.");
            }
        }
        StepOutcome::SummaryReady | StepOutcome::AlreadyDone => {
            if let Some(summary) = step.state.summary() {
                println!("{summary}");
            }
        }
    }
    Ok(step.state)
}

fn print_turn(turn: &TurnRecord) {
    if turn.icon.is_empty() {
        println!("{}", turn.display_name);
    } else {
        println!("{} {}", turn.icon, turn.display_name);
    }
    println!("{}\n", turn.text);
}

fn show(state: &ConversationState) {
    if state.phase() == Phase::Idle {
        println!("No conversation in progress.");
        return;
    }
    println!("Topic: {}", state.topic());
    println!("Phase: {} [{}]\n", state.phase(), state.progress());
    for turn in state.turns() {
        print_turn(turn);
    }
    if let Some(summary) = state.summary() {
        println!("---\n{summary}");
    }
}
