//! Composition root: load configuration, open the store, and drive one
//! game over standard input/output.
//!
//! The real player UI is an external collaborator speaking the transport
//! contract in [`fateloom_engine::ui`]; this binary wires that contract
//! to a terminal loop so the engine runs standalone.

use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

use fateloom_engine::ui::UiMessage;
use fateloom_engine::{Engine, EngineConfig, EngineDeps, EngineError, UiOutput};
use fateloom_types::game::GameConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = EngineConfig::load().context("loading configuration")?;
    let chunk_capacity = config.ui.chunk_queue_capacity;
    let deps = Arc::new(
        EngineDeps::bootstrap(config)
            .await
            .context("bootstrapping engine")?,
    );
    let engine = Arc::new(Engine::new(deps));

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    let mut stdout = tokio::io::stdout();

    stdout.write_all(b"Name your character: ").await?;
    stdout.flush().await?;
    let player_name = lines
        .next_line()
        .await?
        .unwrap_or_else(|| String::from("Wanderer"));

    let session = engine
        .create_game(GameConfig {
            player_name: player_name.trim().to_owned(),
            system_type: fateloom_types::enums::SystemType::SystemIntegration,
            difficulty: fateloom_types::enums::Difficulty::default(),
            world_settings: fateloom_types::game::WorldSettings::default(),
            backstory: String::new(),
        })
        .await
        .context("creating game")?;

    let (ui, mut receiver) = UiOutput::bounded(chunk_capacity);

    // The output drainer: pulls from the bounded queue and writes to the
    // terminal in order.
    let drainer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(message) = receiver.recv().await {
            let rendered = match message {
                UiMessage::Chunk(chunk) => chunk,
                UiMessage::Notification(text) => format!("\n[{text}]\n"),
                UiMessage::TurnComplete => String::from("\n> "),
            };
            if stdout.write_all(rendered.as_bytes()).await.is_err() {
                break;
            }
            let _ = stdout.flush().await;
        }
    });

    ui.emit_notification(format!(
        "Welcome, {}. The system is watching.",
        session.game.player_name
    ))
    .await;
    ui.emit(UiMessage::TurnComplete).await;

    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if matches!(input, "quit" | "exit") {
            break;
        }
        match engine.run_turn(&session, input, &ui).await {
            Ok(_report) => {}
            Err(EngineError::Busy(_)) => {
                ui.emit_notification(String::from("The system is still resolving your last act."))
                    .await;
            }
            Err(e) => {
                tracing::error!(error = %e, "turn failed");
                ui.emit_notification(format!("Something went wrong: {e}")).await;
                ui.emit(UiMessage::TurnComplete).await;
            }
        }
    }

    engine.drain_planner(&session).await;
    drop(ui);
    let _ = drainer.await;
    Ok(())
}
