//! Chat turns and the message transcript.
//!
//! One turn: select context for the question, build the grounded prompt,
//! call the LLM, relay frames to the caller, then persist the user question
//! and the assistant answer (with its sources) under the conversation id.

use anyhow::{Context, Result};
use docqa_core::{ContextBundle, SourceRef};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use std::io::Write;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::app::App;
use crate::llm::LlmError;
use crate::models::{format_ts_iso, Message, Role};
use crate::prompt;
use crate::relay::RelayFrame;
use crate::retrieve;

/// Frames buffered between the relay task and the client.
const FRAME_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub document_ids: Vec<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message must not be empty")]
    EmptyMessage,
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// A streaming turn in progress. `frames` starts with the sources frame and
/// ends with [`RelayFrame::Done`].
pub struct ChatTurn {
    pub conversation_id: String,
    pub bundle: ContextBundle,
    pub frames: mpsc::Receiver<RelayFrame>,
}

/// A completed non-streaming turn.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatAnswer {
    pub conversation_id: String,
    pub answer: String,
    pub sources: Vec<SourceRef>,
}

struct Prepared {
    conversation_id: String,
    question: String,
    bundle: ContextBundle,
}

async fn prepare(app: &App, req: ChatRequest) -> Result<Prepared, ChatError> {
    let question = req.message.trim().to_string();
    if question.is_empty() {
        return Err(ChatError::EmptyMessage);
    }
    let conversation_id = req
        .conversation_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let bundle = retrieve::build_context(app, &question, &req.document_ids).await?;
    Ok(Prepared {
        conversation_id,
        question,
        bundle,
    })
}

/// Start a streaming turn. Fails before any frame is produced if the LLM
/// endpoint rejects the request.
pub async fn start_turn(app: &App, req: ChatRequest) -> Result<ChatTurn, ChatError> {
    let Prepared {
        conversation_id,
        question,
        bundle,
    } = prepare(app, req).await?;

    let messages = prompt::build_messages(&bundle, &question);
    tracing::info!(
        conversation_id = %conversation_id,
        model = app.llm.model(),
        chunks = bundle.chunks.len(),
        "starting streamed answer"
    );
    let mut tokens = app.llm.stream(&messages).await?;
    append_message(&app.pool, &conversation_id, Role::User, &question, &[]).await?;

    let (tx, rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
    let app = app.clone();
    let sources = bundle.sources.clone();
    let conv = conversation_id.clone();

    tokio::spawn(async move {
        let mut client_gone = tx.send(RelayFrame::Sources(sources.clone())).await.is_err();
        let mut answer = String::new();

        while let Some(item) = tokens.recv().await {
            match item {
                Ok(token) => {
                    answer.push_str(&token);
                    if !client_gone && tx.send(RelayFrame::Delta(token)).await.is_err() {
                        client_gone = true;
                    }
                }
                Err(e) => {
                    tracing::warn!(conversation_id = %conv, "LLM stream failed: {}", e);
                    let _ = tx.send(RelayFrame::Error(e.to_string())).await;
                    break;
                }
            }
        }

        if !answer.is_empty() {
            if let Err(e) =
                append_message(&app.pool, &conv, Role::Assistant, &answer, &sources).await
            {
                tracing::error!(conversation_id = %conv, "failed to persist answer: {:#}", e);
            }
        }
        let _ = tx.send(RelayFrame::Done).await;
    });

    Ok(ChatTurn {
        conversation_id,
        bundle,
        frames: rx,
    })
}

/// Run a turn without streaming and persist both messages.
pub async fn answer(app: &App, req: ChatRequest) -> Result<ChatAnswer, ChatError> {
    let Prepared {
        conversation_id,
        question,
        bundle,
    } = prepare(app, req).await?;

    let messages = prompt::build_messages(&bundle, &question);
    tracing::info!(
        conversation_id = %conversation_id,
        model = app.llm.model(),
        chunks = bundle.chunks.len(),
        "requesting answer"
    );
    let answer = app.llm.complete(&messages).await?;

    append_message(&app.pool, &conversation_id, Role::User, &question, &[]).await?;
    append_message(
        &app.pool,
        &conversation_id,
        Role::Assistant,
        &answer,
        &bundle.sources,
    )
    .await?;

    Ok(ChatAnswer {
        conversation_id,
        answer,
        sources: bundle.sources,
    })
}

pub async fn append_message(
    pool: &SqlitePool,
    conversation_id: &str,
    role: Role,
    content: &str,
    sources: &[SourceRef],
) -> Result<Message> {
    let id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now().timestamp();
    sqlx::query(
        "INSERT INTO messages (id, conversation_id, role, content, sources_json, created_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(conversation_id)
    .bind(role.as_str())
    .bind(content)
    .bind(serde_json::to_string(sources)?)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(Message {
        id,
        conversation_id: conversation_id.to_string(),
        role,
        content: content.to_string(),
        sources: sources.to_vec(),
        created_at: format_ts_iso(now),
    })
}

/// Transcript of a conversation in insertion order.
pub async fn list_messages(pool: &SqlitePool, conversation_id: &str) -> Result<Vec<Message>> {
    let rows = sqlx::query(
        "SELECT id, conversation_id, role, content, sources_json, created_at FROM messages WHERE conversation_id = ? ORDER BY created_at ASC, rowid ASC",
    )
    .bind(conversation_id)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| -> Result<Message> {
            let id: String = row.get("id");
            let role: String = row.get("role");
            let sources_json: String = row.get("sources_json");
            let created_at: i64 = row.get("created_at");
            let sources = serde_json::from_str(&sources_json)
                .with_context(|| format!("corrupt sources for message {}", id))?;
            Ok(Message {
                id,
                conversation_id: row.get("conversation_id"),
                role: role.parse()?,
                content: row.get("content"),
                sources,
                created_at: format_ts_iso(created_at),
            })
        })
        .collect()
}

/// CLI entry point for `docqa ask`.
pub async fn run_ask(app: &App, req: ChatRequest, stream: bool) -> Result<()> {
    if !stream {
        let reply = answer(app, req).await?;
        println!("{}", reply.answer);
        print_sources(&reply.sources);
        eprintln!("conversation: {}", reply.conversation_id);
        return Ok(());
    }

    let mut turn = start_turn(app, req).await?;
    let mut stdout = std::io::stdout();
    let mut failure = None;

    while let Some(frame) = turn.frames.recv().await {
        match frame {
            RelayFrame::Sources(_) => {}
            RelayFrame::Delta(token) => {
                print!("{}", token);
                stdout.flush()?;
            }
            RelayFrame::Error(message) => failure = Some(message),
            RelayFrame::Done => break,
        }
    }
    println!();

    if let Some(message) = failure {
        anyhow::bail!("answer stream failed: {}", message);
    }
    print_sources(&turn.bundle.sources);
    eprintln!("conversation: {}", turn.conversation_id);
    Ok(())
}

fn print_sources(sources: &[SourceRef]) {
    if sources.is_empty() {
        return;
    }
    println!();
    println!("Sources:");
    for (i, source) in sources.iter().enumerate() {
        println!(
            "  [{}] {} (chunk {})",
            i + 1,
            source.document_name,
            source.chunk_index
        );
    }
}
