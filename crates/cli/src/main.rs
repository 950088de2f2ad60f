use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use optimizer_agents::{ChatConfig, ChatEntry, EntryKind, OptimizerChat};
use optimizer_core::{
    route_message, role_title, ConversationState, Role, RoleContext, SectionName, UserSession,
};
use optimizer_observability::{init_tracing, AppMetrics};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[derive(Debug, Parser)]
#[command(name = "optimizer")]
#[command(about = "Optimizer chat CLI")]
struct Cli {
    /// Delay before the comparison route shows scenario C.
    #[arg(long, env = "OPTIMIZER_COMPARISON_DELAY_MS")]
    comparison_delay_ms: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Chat {
        #[arg(long)]
        crisis: bool,
    },
    Route {
        text: String,
        #[arg(long)]
        crisis: bool,
        #[arg(long, value_delimiter = ',')]
        shown: Vec<String>,
    },
    Session {
        #[command(subcommand)]
        command: SessionCommand,
    },
}

#[derive(Debug, Subcommand)]
enum SessionCommand {
    Title {
        #[arg(long)]
        role: String,
        #[arg(long)]
        context: Option<String>,
    },
    Landing {
        #[arg(long)]
        role: String,
        #[arg(long, default_value_t = 0)]
        login_age_secs: i64,
        #[arg(long)]
        no_redirect: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("optimizer_cli");
    let cli = Cli::parse();

    let mut config = ChatConfig::from_env();
    if let Some(delay) = cli.comparison_delay_ms {
        config = config.with_comparison_delay(Duration::from_millis(delay));
    }

    match cli.command {
        Command::Chat { crisis } => run_chat(config, crisis).await?,
        Command::Route {
            text,
            crisis,
            shown,
        } => {
            let mut state = ConversationState {
                crisis_triggered: crisis,
                ..ConversationState::default()
            };
            for name in &shown {
                let section = SectionName::parse(name)
                    .ok_or_else(|| anyhow!("unknown section `{name}`"))?;
                state.mark_shown(section);
            }

            let decision = route_message(&text, &state, &config.router);
            println!("{}", serde_json::to_string_pretty(&decision)?);
        }
        Command::Session { command } => match command {
            SessionCommand::Title { role, context } => {
                let role = Role::parse(&role).context("invalid --role value")?;
                let context = context
                    .as_deref()
                    .map(|value| {
                        RoleContext::parse(value)
                            .ok_or_else(|| anyhow!("invalid --context `{value}`"))
                    })
                    .transpose()?;
                println!("{}", role_title(role, context));
            }
            SessionCommand::Landing {
                role,
                login_age_secs,
                no_redirect,
            } => {
                Role::parse(&role).context("invalid --role value")?;
                let now = Utc::now();
                let session = UserSession {
                    name: "cli".to_string(),
                    role,
                    login_time: Some(now - chrono::Duration::seconds(login_age_secs)),
                    permissions: None,
                };
                let landing = session.resolve_landing(now, !no_redirect);
                println!("{}", serde_json::to_string_pretty(&landing)?);
            }
        },
    }

    Ok(())
}

async fn run_chat(config: ChatConfig, crisis: bool) -> Result<()> {
    let chat = OptimizerChat::new(config, AppMetrics::shared());
    let conversation_id = chat.open_conversation_with(if crisis {
        ConversationState::in_crisis()
    } else {
        ConversationState::new()
    });

    println!("Optimizer chat. type '/crisis' to trigger crisis mode, 'exit' to quit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let message = line.trim();
        if message.eq_ignore_ascii_case("exit") || message.eq_ignore_ascii_case("quit") {
            break;
        }
        if message.is_empty() {
            continue;
        }
        if message == "/crisis" {
            chat.trigger_crisis(&conversation_id)?;
            println!("\n[crisis mode enabled]\n");
            continue;
        }

        let sent_at = Utc::now();
        let outcome = chat.send_message(&conversation_id, message).await?;
        for entry in &outcome.entries {
            print_entry(entry);
        }

        if let Some(deferred) = outcome.decision.deferred {
            let chat = chat.clone();
            let conversation_id = conversation_id.clone();
            let section = deferred.action.section();
            tokio::spawn(async move {
                tokio::time::sleep(deferred.delay + Duration::from_millis(20)).await;
                let Ok(snapshot) = chat.snapshot(&conversation_id) else {
                    return;
                };
                snapshot
                    .transcript
                    .iter()
                    .filter(|entry| entry.at >= sent_at)
                    .filter(|entry| entry.section.as_ref().map(|view| view.section) == section)
                    .for_each(print_entry);
            });
        }
    }

    Ok(())
}

fn print_entry(entry: &ChatEntry) {
    match entry.kind {
        EntryKind::User => {}
        EntryKind::System => println!("\n{}\n", entry.text),
        EntryKind::Section => {
            println!("\n{}\n", entry.text);
            if let Some(view) = &entry.section {
                for action in &view.suggested_actions {
                    println!("  -> {}", action.label);
                }
            }
        }
    }
}
