//! Vibe
//!
//! Interactive memory-augmented assistant on stdin/stdout.

use std::io::Write;

use tokio::io::BufReader;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vibe_memory::{
    bootstrap::bootstrap,
    config::Config,
    console::Console,
    conversation::{run_repl, Assistant},
    embedding::Embedder,
    memory::MemoryStore,
    storage::{open_index, EnsureOutcome},
    GeminiChat,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so they never interleave with the conversation
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let console = Console::new();
    print!("{}", console.initializing());

    let mut assistant = match initialize(&console).await {
        Ok(assistant) => assistant,
        Err(e) => {
            print!("{}", console.error(&e.to_string()));
            return Ok(());
        }
    };

    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    run_repl(&mut assistant, stdin, &mut stdout, console).await?;

    Ok(())
}

async fn initialize(console: &Console) -> vibe_memory::Result<Assistant> {
    let config = Config::from_env()?;
    config.validate()?;

    let index = open_index(&config).await?;
    print!(
        "{}",
        console.success(&format!("{} initialized.", index.provider_name()))
    );

    let embedder = Embedder::from_config(&config)?;
    let store = MemoryStore::new(&config, embedder, index);

    print!(
        "{}",
        console.info(&format!("Checking index '{}'...", config.index_name))
    );
    std::io::stdout().flush()?;

    let report = bootstrap(&store).await?;
    match report.outcome {
        EnsureOutcome::Created => print!(
            "{}",
            console.success(&format!(
                "Index '{}' created. Seeded {} initial facts.",
                config.index_name, report.seeded
            ))
        ),
        EnsureOutcome::Existing => print!(
            "{}",
            console.info(&format!("Index '{}' already exists.", config.index_name))
        ),
    }

    let chat = GeminiChat::new(&config)?;
    Ok(Assistant::new(store, &chat))
}
