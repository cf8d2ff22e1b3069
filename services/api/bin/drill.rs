//! Offline Interview Drill
//!
//! A text rehearsal of the interview loop for prompt work: you play the
//! candidate on stdin, the junior replies over chat completions, and the
//! senior reviews every exchange and drives the stage machine exactly as it
//! would on a live call. No telephony or audio involved.

use anyhow::Context;
use async_openai::config::OpenAIConfig;
use clap::Parser;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use viva_api::config::Config;
use viva_core::{
    junior::JuniorAgent,
    llm::OpenAICompatibleClient,
    machine::{Applied, InterviewMachine, SessionEvent},
    senior::{ReviewRequest, SeniorAgent},
    stage::Stage,
    transcript::Speaker,
};

#[derive(Parser, Debug)]
#[command(about = "Text rehearsal of the interview loop; you play the candidate")]
struct Args {
    /// Chat model for both roles (overrides CHAT_MODEL).
    #[arg(long)]
    model: Option<String>,

    /// Stage to start from, e.g. WELCOME or TECHNICAL_PROBE.
    #[arg(long, default_value = "WELCOME")]
    stage: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = Config::from_env().context("Failed to load configuration")?;

    // Keep the rehearsal transcript readable; only surface real problems.
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .without_time()
        .init();

    let model = args.model.unwrap_or(config.chat_model);
    let chat = Arc::new(OpenAICompatibleClient::new(
        OpenAIConfig::new().with_api_key(config.openai_api_key.clone()),
        model.clone(),
    ));
    let junior = JuniorAgent::new(chat.clone());
    let senior = SeniorAgent::new(chat);

    let mut machine = InterviewMachine::new();
    let start = Stage::parse(&args.stage);
    while machine.stage() != start {
        machine.apply(SessionEvent::ForceAdvance);
    }

    println!(
        "Interview drill: stage {}, model {model}. Type 'exit' to stop.",
        machine.stage()
    );

    // The junior opens, exactly as on a live call.
    let opening = junior.reply(machine.instruction(), machine.transcript()).await;
    println!("\ninterviewer: {opening}");
    machine.apply(SessionEvent::Utterance {
        speaker: Speaker::Interviewer,
        text: opening,
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("\ncandidate: ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("exit") {
            break;
        }

        machine.apply(SessionEvent::Utterance {
            speaker: Speaker::Candidate,
            text: line.to_string(),
        });

        let utterance = junior.reply(machine.instruction(), machine.transcript()).await;
        println!("\ninterviewer: {utterance}");
        machine.apply(SessionEvent::Utterance {
            speaker: Speaker::Interviewer,
            text: utterance,
        });

        // Every exchange gets an oversight pass here; on a live call the
        // junior has to ask for one.
        let verdict = senior
            .analyze(&ReviewRequest::for_stage(machine.stage(), machine.transcript()))
            .await;
        println!("  [senior] {}", verdict.critique);
        match machine.apply(SessionEvent::Oversight(verdict)) {
            Applied::StageChanged { from, to } => println!("  [stage] {from} -> {to}"),
            Applied::InstructionRefreshed { stage } => {
                println!("  [stage] {stage}: instruction refreshed")
            }
            Applied::Concluded { stage } => println!("  [stage] concluded at {stage}"),
            Applied::Unchanged => {}
        }

        if machine.is_concluded() {
            let closing = junior.reply(machine.instruction(), machine.transcript()).await;
            println!("\ninterviewer: {closing}");
            machine.apply(SessionEvent::Utterance {
                speaker: Speaker::Interviewer,
                text: closing,
            });
            break;
        }
    }

    println!(
        "\nDrill over at stage {} after {} turns.",
        machine.stage(),
        machine.transcript().len()
    );
    Ok(())
}
