//! Offline interactive demo: spawns an in-process `rtd-gateway` server
//! bound to the deterministic mock generator trio, opens a WebSocket
//! client against it, and drives a multi-turn conversation from stdin.
//!
//! Grounded on `original_source/scripts/interactive_demo.py` — same
//! session-then-stream shape, same per-turn token/audio/video tally,
//! swapped from `httpx`+`websockets` to an in-process axum server plus
//! `tokio-tungstenite` (session creation itself calls the registry
//! directly rather than round-tripping through `POST /v1/sessions`,
//! since both client and server share a process here).

use std::io::Write;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use rtd_domain::config::Config;
use rtd_domain::{CharacterControl, EmotionControl, EmotionLabel, InboundEvent, OutboundEvent, TurnControl};
use rtd_generator::{MockAvatarGenerator, MockLlmGenerator, MockTtsGenerator};
use rtd_gateway::AppState;
use rtd_orchestrator::GeneratorSet;
use tokio_tungstenite::tungstenite::Message;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("warn"))
        .init();

    let generators = Arc::new(GeneratorSet::Split {
        llm: Arc::new(MockLlmGenerator),
        tts: Arc::new(MockTtsGenerator),
        avatar: Arc::new(MockAvatarGenerator),
    });
    let state = AppState::new(Arc::new(Config::default()), generators);

    let session_id = {
        let session = state.registry.create("demo".into(), "casual", state.config.drift.window);
        session.lock().id.clone()
    };

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = rtd_gateway::router(state);
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "demo server exited");
        }
    });

    println!("==================================================");
    println!("rtd-demo — offline interactive session");
    println!("Type your message and press Enter. Type 'quit' to exit.");
    println!("==================================================\n");

    let ws_url = format!("ws://{addr}/v1/sessions/{session_id}/stream");
    let (ws_stream, _) = tokio_tungstenite::connect_async(ws_url).await?;
    let (mut write, mut read) = ws_stream.split();

    let stdin = std::io::stdin();
    let mut turn_num = 0usize;
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if matches!(text, "quit" | "exit" | "q") {
            println!("Goodbye!");
            break;
        }

        turn_num += 1;
        let event = InboundEvent::UserText {
            text: text.to_string(),
            control: Some(TurnControl::new(
                EmotionControl::new(EmotionLabel::Happy, 0.6, 0.2, 0.1)
                    .expect("demo emotion control is within range"),
                CharacterControl::default(),
            )),
        };
        write.send(Message::Text(serde_json::to_string(&event)?)).await?;

        print!("[Avatar]: ");
        std::io::stdout().flush()?;
        let mut audio_chunks = 0usize;
        let mut video_frames = 0usize;
        while let Some(msg) = read.next().await {
            let Message::Text(text) = msg? else { continue };
            let event: OutboundEvent = serde_json::from_str(&text)?;
            match event {
                OutboundEvent::TextDelta { token } => {
                    print!("{token}");
                    std::io::stdout().flush()?;
                }
                OutboundEvent::AudioChunk { .. } => audio_chunks += 1,
                OutboundEvent::VideoFrame { .. } => video_frames += 1,
                OutboundEvent::TurnComplete { .. } => break,
                OutboundEvent::Error { code, message } => {
                    println!("\n[error {code}]: {message}");
                    break;
                }
            }
        }
        println!(
            "\n  -> turn {turn_num}: {audio_chunks} audio chunk(s), {video_frames} video frame(s)\n"
        );
    }

    Ok(())
}
