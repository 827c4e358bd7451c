use std::io::Write;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::info;

use viva_coach::visualizer::{Visualizer, VisualizerInputs};
use viva_coach::{
    AppState, Config, CpalAudio, ExamSession, GeminiLive, SessionState, TranscriptRole,
};

#[derive(Parser)]
#[command(name = "viva-coach", about = "Speaking-exam practice with a live AI examiner")]
struct Cli {
    /// Config file (without extension)
    #[arg(long, default_value = "config/viva-coach")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP control plane
    Serve,
    /// Run an interactive session in this terminal
    Run,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;
    info!("{} v0.1.0", cfg.service.name);

    // Missing key is not fatal here; it surfaces as a connection
    // failure when a session starts.
    let api_key = std::env::var("GEMINI_API_KEY").unwrap_or_default();

    let session = ExamSession::new(
        cfg.session_config(api_key),
        Arc::new(GeminiLive::new()),
        Arc::new(CpalAudio),
    );

    match cli.command {
        Command::Serve => serve(&cfg, session).await,
        Command::Run => run_interactive(session).await,
    }
}

async fn serve(cfg: &Config, session: ExamSession) -> Result<()> {
    let app = viva_coach::create_router(AppState::new(session));
    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    info!("HTTP server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn run_interactive(session: ExamSession) -> Result<()> {
    session.start().await?;
    info!("Ctrl-C ends the test");

    let examiner_frame = Arc::new(Mutex::new(Vec::new()));
    let candidate_frame = Arc::new(Mutex::new(Vec::new()));

    let (examiner_inputs, viz_examiner) =
        spawn_panel(session.output_analyser(), Arc::clone(&examiner_frame));
    let (candidate_inputs, viz_candidate) =
        spawn_panel(session.input_analyser(), Arc::clone(&candidate_frame));

    let mut redraw = tokio::time::interval(std::time::Duration::from_millis(100));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = redraw.tick() => {
                let active = session.state() == SessionState::Active;
                examiner_inputs.send_modify(|inputs| inputs.active = active);
                candidate_inputs.send_modify(|inputs| inputs.active = active);
                draw_screen(&session, &examiner_frame, &candidate_frame);
            }
        }
    }

    viz_examiner.stop();
    viz_candidate.stop();
    session.stop().await;
    println!("\nSession ended.");
    Ok(())
}

fn spawn_panel(
    analyser: Arc<viva_coach::Analyser>,
    latest: Arc<Mutex<Vec<String>>>,
) -> (watch::Sender<VisualizerInputs>, Visualizer) {
    let (tx, rx) = watch::channel(VisualizerInputs {
        analyser: Some(analyser),
        active: false,
    });
    let viz = Visualizer::spawn(rx, 64, 5, 30, move |frame| {
        if let Ok(mut guard) = latest.lock() {
            *guard = frame;
        }
    });
    (tx, viz)
}

fn draw_screen(
    session: &ExamSession,
    examiner_frame: &Arc<Mutex<Vec<String>>>,
    candidate_frame: &Arc<Mutex<Vec<String>>>,
) {
    let mut out = String::from("\x1b[2J\x1b[H");

    let stats = session.stats();
    out.push_str(&format!(
        "viva-coach [{}]   {:.0}s, {} blocks out, {} chunks in\n",
        stats.state.as_str(),
        stats.duration_secs,
        stats.blocks_sent,
        stats.chunks_scheduled,
    ));
    if let Some(error) = session.error_message() {
        out.push_str(&format!("! {}\n", error));
    }

    for (label, frame) in [("examiner", examiner_frame), ("you", candidate_frame)] {
        out.push_str(&format!("\n[{}]\n", label));
        if let Ok(rows) = frame.lock() {
            for row in rows.iter() {
                out.push_str(row);
                out.push('\n');
            }
        }
    }

    out.push_str("\ntranscript:\n");
    let transcript = session.transcript();
    for item in transcript.iter().rev().take(6).rev() {
        let who = match item.role {
            TranscriptRole::User => "you",
            TranscriptRole::Examiner => "examiner",
        };
        out.push_str(&format!("  {:>8}: {}\n", who, item.text.trim()));
    }

    print!("{}", out);
    let _ = std::io::stdout().flush();
}
