//! `quill chat` — interactive terminal client.
//!
//! Talks to a running gateway over HTTP and mirrors what a frontend does:
//! keeps the visible history locally, sends it with each turn, repoints
//! its conversation id from the `x-conversation-id` response header, and
//! renders the streamed answer with a coarse repaint interval instead of
//! one write per delta.

use std::io::Write;
use std::time::Duration;

use futures_util::StreamExt;
use serde::Deserialize;
use tokio::time::Instant;

use crate::api::chat::{CONVERSATION_ID_HEADER, SOURCES_HEADER};

/// Minimum interval between stdout flushes while streaming. Deltas that
/// arrive faster than this are batched into one write.
const RENDER_INTERVAL: Duration = Duration::from_millis(50);

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client-side conversation state
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct ChatState {
    server: String,
    device_id: String,
    conversation_id: Option<String>,
    /// (role, content) pairs, oldest first. Resent with every turn.
    history: Vec<(&'static str, String)>,
    /// Document ids to ground the next new conversation in.
    document_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentSummary {
    id: String,
    name: String,
    byte_size: u64,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Public entry point
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Run the interactive chat loop against `server`.
pub async fn chat(server: String, device_id: String) -> anyhow::Result<()> {
    let client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()?;
    let mut state = ChatState {
        server: server.trim_end_matches('/').to_owned(),
        device_id,
        conversation_id: None,
        history: Vec::new(),
        document_ids: Vec::new(),
    };

    let history_path = dirs::home_dir()
        .unwrap_or_default()
        .join(".quill")
        .join("chat_history.txt");
    if let Some(parent) = history_path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let mut rl = rustyline::DefaultEditor::new()?;
    let _ = rl.load_history(&history_path);

    eprintln!("Quill chat — {}", state.server);
    eprintln!("Type /help for commands, Ctrl+D to exit");
    eprintln!();

    loop {
        match rl.readline("you> ") {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                rl.add_history_entry(&line).ok();

                if trimmed.starts_with('/') {
                    if handle_slash_command(trimmed, &client, &mut state).await {
                        break;
                    }
                    continue;
                }

                if let Err(e) = send_turn(&client, &mut state, trimmed).await {
                    eprintln!("\x1B[31merror: {e}\x1B[0m");
                }
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                eprintln!("(Use Ctrl+D or /exit to quit)");
                continue;
            }
            Err(rustyline::error::ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("\x1B[31mreadline error: {e}\x1B[0m");
                break;
            }
        }
    }

    rl.save_history(&history_path).ok();
    eprintln!("Goodbye!");
    Ok(())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Turn submission & throttled rendering
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

async fn send_turn(
    client: &reqwest::Client,
    state: &mut ChatState,
    user_text: &str,
) -> anyhow::Result<()> {
    let mut messages: Vec<serde_json::Value> = state
        .history
        .iter()
        .map(|(role, content)| serde_json::json!({ "role": role, "content": content }))
        .collect();
    messages.push(serde_json::json!({ "role": "user", "content": user_text }));

    let body = serde_json::json!({
        "deviceId": state.device_id,
        "conversationId": state.conversation_id,
        "documentIds": state.document_ids,
        "messages": messages,
    });

    let response = client
        .post(format!("{}/v1/turns", state.server))
        .json(&body)
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let detail = response.text().await.unwrap_or_default();
        anyhow::bail!("gateway returned {status}: {detail}");
    }

    // Adopt whatever conversation the gateway landed on. A stale or
    // missing local id silently becomes the fresh one.
    if let Some(id) = response
        .headers()
        .get(CONVERSATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
    {
        if state.conversation_id.as_deref() != Some(id) {
            state.conversation_id = Some(id.to_owned());
            eprintln!("(conversation {id})");
        }
    }
    let sources = response
        .headers()
        .get(SOURCES_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    // Stream the answer with batched repaints.
    let mut stdout = std::io::stdout();
    let mut answer = String::new();
    let mut pending = String::new();
    let mut last_flush = Instant::now();
    let mut body_stream = response.bytes_stream();

    while let Some(chunk) = body_stream.next().await {
        let chunk = chunk?;
        let text = String::from_utf8_lossy(&chunk);
        answer.push_str(&text);
        pending.push_str(&text);

        if last_flush.elapsed() >= RENDER_INTERVAL {
            write!(stdout, "{pending}")?;
            stdout.flush()?;
            pending.clear();
            last_flush = Instant::now();
        }
    }
    if !pending.is_empty() {
        write!(stdout, "{pending}")?;
        stdout.flush()?;
    }
    writeln!(stdout)?;

    if let Some(sources) = sources {
        eprintln!("(sources: {sources})");
    }

    state.history.push(("user", user_text.to_owned()));
    state.history.push(("assistant", answer));
    Ok(())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Slash commands
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Process a slash command. Returns `true` if the loop should exit.
async fn handle_slash_command(
    input: &str,
    client: &reqwest::Client,
    state: &mut ChatState,
) -> bool {
    let parts: Vec<&str> = input.splitn(2, ' ').collect();
    let cmd = parts[0];
    let arg = parts.get(1).map(|s| s.trim());

    match cmd {
        "/exit" | "/quit" => return true,

        "/new" => {
            state.conversation_id = None;
            state.history.clear();
            eprintln!("Started a new conversation.");
        }

        "/docs" => match arg.filter(|s| !s.is_empty()) {
            Some(ids) => {
                state.document_ids =
                    ids.split(',').map(|s| s.trim().to_owned()).collect();
                eprintln!(
                    "Grounding the next new conversation in {} document(s).",
                    state.document_ids.len()
                );
            }
            None => {
                list_documents(client, state).await;
            }
        },

        "/clear" => {
            eprint!("\x1B[2J\x1B[1;1H");
        }

        "/help" => {
            eprintln!("Commands:");
            eprintln!("  /new           start a new conversation");
            eprintln!("  /docs          list available documents");
            eprintln!("  /docs a,b,c    select document ids for the next conversation");
            eprintln!("  /clear         clear the screen");
            eprintln!("  /exit          quit");
        }

        other => {
            eprintln!("Unknown command: {other} (try /help)");
        }
    }
    false
}

async fn list_documents(client: &reqwest::Client, state: &ChatState) {
    let url = format!(
        "{}/v1/documents?deviceId={}",
        state.server, state.device_id
    );
    match client.get(&url).send().await {
        Ok(response) => match response.json::<Vec<DocumentSummary>>().await {
            Ok(documents) if documents.is_empty() => {
                eprintln!("No documents available.");
            }
            Ok(documents) => {
                for doc in documents {
                    eprintln!("  {}  {} ({} bytes)", doc.id, doc.name, doc.byte_size);
                }
            }
            Err(e) => eprintln!("\x1B[31mfailed to parse documents: {e}\x1B[0m"),
        },
        Err(e) => eprintln!("\x1B[31mfailed to list documents: {e}\x1B[0m"),
    }
}
