//! The conversation loop: one turn at a time, fully sequential.
//!
//! ```text
//! AwaitingInput -> Retrieving -> Composing -> Generating -> Extracting
//!      ^                                                        |
//!      +-------------------------- Persisting <-----------------+
//! AwaitingInput -> Exit   (on "exit" / "quit")
//! ```
//!
//! A failure while retrieving or generating ends that turn only; the loop
//! goes back to waiting for input. A failure persisting one fact is logged
//! and the remaining facts are still attempted.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::chat::{ChatProvider, ChatSession};
use crate::console::Console;
use crate::error::{Error, Result};
use crate::extractor::{extract, Extraction};
use crate::memory::MemoryStore;
use crate::prompt::system_instructions;
use crate::retrieval::compose;

/// Where the loop currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    AwaitingInput,
    Retrieving,
    Composing,
    Generating,
    Extracting,
    Persisting,
    Exit,
}

/// How a line of input is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// Empty or whitespace-only: no-op
    Blank,
    /// `exit` or `quit`, any case
    Exit,
    Query,
}

pub fn classify_input(line: &str) -> InputKind {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        InputKind::Blank
    } else if trimmed.eq_ignore_ascii_case("exit") || trimmed.eq_ignore_ascii_case("quit") {
        InputKind::Exit
    } else {
        InputKind::Query
    }
}

/// Result of persisting one turn's facts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistReport {
    /// Texts of facts whose upsert succeeded, in order
    pub saved: Vec<String>,
    /// Facts whose embedding or upsert failed
    pub failed: Vec<String>,
    /// Blank facts that were not sent to the embedder
    pub skipped: usize,
}

impl PersistReport {
    pub fn attempted(&self) -> usize {
        self.saved.len() + self.failed.len()
    }
}

/// Everything that happened in one turn
#[derive(Debug)]
pub enum TurnOutcome {
    /// Blank input; nothing happened
    Skipped,
    /// The user asked to leave
    Exit,
    /// A reply was produced; persistence may have partially failed
    Reply {
        display_text: String,
        persisted: PersistReport,
    },
    /// Retrieval or generation failed; the session continues
    Failed(Error),
}

/// Memory-augmented assistant bound to one chat session
pub struct Assistant {
    store: MemoryStore,
    session: Box<dyn ChatSession>,
    state: TurnState,
}

impl Assistant {
    /// Start a chat session primed with the memory-aware system instructions
    pub fn new(store: MemoryStore, provider: &dyn ChatProvider) -> Self {
        let session = provider.start_session(&system_instructions());
        Self::with_session(store, session)
    }

    pub fn with_session(store: MemoryStore, session: Box<dyn ChatSession>) -> Self {
        Self {
            store,
            session,
            state: TurnState::AwaitingInput,
        }
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    pub fn session(&self) -> &dyn ChatSession {
        self.session.as_ref()
    }

    /// Retrieve, compose, generate and extract for one query
    pub async fn respond(&mut self, query: &str) -> Result<Extraction> {
        let result = self.respond_inner(query).await;
        if result.is_err() {
            self.state = TurnState::AwaitingInput;
        }
        result
    }

    async fn respond_inner(&mut self, query: &str) -> Result<Extraction> {
        self.state = TurnState::Retrieving;
        let retrieved = self.store.recall(query).await?;

        self.state = TurnState::Composing;
        let prompt = compose(&retrieved, query);
        debug!("Composed prompt with {} memories", retrieved.len());

        self.state = TurnState::Generating;
        let response = self.session.send(&prompt).await?;

        self.state = TurnState::Extracting;
        Ok(extract(&response))
    }

    /// Embed and upsert each fact in order. Never fails as a whole.
    pub async fn persist(&mut self, facts: &[String]) -> PersistReport {
        self.state = TurnState::Persisting;
        let mut report = PersistReport::default();

        for fact in facts {
            if fact.trim().is_empty() {
                warn!("Skipping blank memory");
                report.skipped += 1;
                continue;
            }
            match self.store.remember(fact).await {
                Ok(memory) => {
                    info!("Saved memory {}", memory.id);
                    report.saved.push(fact.clone());
                }
                Err(e) => {
                    warn!("Failed to save memory {:?}: {}", fact, e);
                    report.failed.push(fact.clone());
                }
            }
        }

        self.state = TurnState::AwaitingInput;
        report
    }

    /// Run one full turn for a line of input
    pub async fn handle_input(&mut self, line: &str) -> TurnOutcome {
        match classify_input(line) {
            InputKind::Blank => TurnOutcome::Skipped,
            InputKind::Exit => {
                self.state = TurnState::Exit;
                TurnOutcome::Exit
            }
            InputKind::Query => match self.respond(line).await {
                Ok(extraction) => {
                    let persisted = self.persist(&extraction.new_facts).await;
                    TurnOutcome::Reply {
                        display_text: extraction.display_text,
                        persisted,
                    }
                }
                Err(e) => {
                    warn!("Turn failed: {}", e);
                    TurnOutcome::Failed(e)
                }
            },
        }
    }
}

/// Interactive read-eval-print loop. Returns when the user exits or input
/// ends. Input that is not valid UTF-8 is decoded lossily.
pub async fn run_repl<R, W>(
    assistant: &mut Assistant,
    mut reader: R,
    writer: &mut W,
    console: Console,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = Vec::new();
    writer.write_all(console.welcome().as_bytes()).await?;

    loop {
        writer.write_all(console.user_prompt().as_bytes()).await?;
        writer.flush().await?;

        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            writer.write_all(b"\n").await?;
            break;
        }
        let line = decode_line(&buf);

        match classify_input(&line) {
            InputKind::Blank => continue,
            InputKind::Exit => break,
            InputKind::Query => {}
        }

        let extraction = match assistant.respond(&line).await {
            Ok(extraction) => extraction,
            Err(e) => {
                warn!("Turn failed: {}", e);
                writer.write_all(console.error(&e.to_string()).as_bytes()).await?;
                continue;
            }
        };

        writer
            .write_all(console.reply(&extraction.display_text).as_bytes())
            .await?;

        let facts = extraction.new_facts;
        if !facts.is_empty() {
            let note = format!("\nSaving {} new memories...", facts.len());
            writer.write_all(console.note(&note).as_bytes()).await?;
        }
        writer.flush().await?;

        // Always runs so the turn ends back in AwaitingInput
        let report = assistant.persist(&facts).await;
        if facts.is_empty() {
            continue;
        }

        let summary = if report.failed.is_empty() {
            "Memories saved.\n".to_string()
        } else {
            format!(
                "Saved {} of {} memories; {} failed.\n",
                report.saved.len(),
                report.attempted(),
                report.failed.len()
            )
        };
        writer.write_all(console.note(&summary).as_bytes()).await?;
    }

    assistant.state = TurnState::Exit;
    writer.write_all(console.farewell().as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// One input line without its terminator
fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}
