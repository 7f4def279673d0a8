// Terminal chat: the same session and orchestrator as the web UI, driven
// line by line from stdin.

use std::io::Write;

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::info;

use crate::conversation::{ChatTurn, Role};
use crate::credential::CredentialStore;
use crate::orchestrator::{ChatMode, Orchestrator};
use crate::session::Session;

const SEARCH_PREFIX: &str = "/search ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatExit {
    Quit,
    LoggedOut,
}

enum Command<'a> {
    Quit,
    Logout,
    Send { mode: ChatMode, text: &'a str },
}

fn parse_command(line: &str, default_mode: ChatMode) -> Command<'_> {
    match line {
        "/quit" | "/exit" => Command::Quit,
        "/logout" => Command::Logout,
        _ => match line.strip_prefix(SEARCH_PREFIX) {
            Some(text) => Command::Send {
                mode: ChatMode::Search,
                text: text.trim(),
            },
            None => Command::Send {
                mode: default_mode,
                text: line,
            },
        },
    }
}

/// Text shown for one turn in the terminal.
pub fn render_turn(turn: &ChatTurn) -> String {
    let speaker = match turn.role {
        Role::User => "나",
        Role::Assistant => "AI",
    };
    let mut out = format!("{}: {}", speaker, turn.content);
    if let Some(summary) = &turn.search_results {
        out.push_str("\n[검색 결과]\n");
        out.push_str(summary);
    }
    if let Some(url) = &turn.image_url {
        out.push_str("\n[생성된 이미지] ");
        out.push_str(url);
    }
    out
}

/// Runs the chat loop until `/quit`, `/logout`, or end of input.
pub async fn run_chat<R, W>(
    orchestrator: &Orchestrator,
    store: &CredentialStore,
    mut session: Session,
    default_mode: ChatMode,
    input: R,
    output: &mut W,
) -> Result<ChatExit>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    info!(?default_mode, "Starting terminal chat");
    if let Some(welcome) = session.conversation().turns().first() {
        writeln!(output, "{}", render_turn(welcome))?;
    }

    let mut lines = input.lines();
    loop {
        write!(output, "> ")?;
        output.flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (mode, text) = match parse_command(line, default_mode) {
            Command::Quit => break,
            Command::Logout => {
                session.end(store)?;
                writeln!(output, "로그아웃되었습니다.")?;
                return Ok(ChatExit::LoggedOut);
            }
            Command::Send { text, .. } if text.is_empty() => continue,
            Command::Send { mode, text } => (mode, text),
        };

        let history = session.conversation().turns().to_vec();
        let reply = orchestrator
            .converse(&history, text, session.credential(), mode)
            .await;
        let turn = session.conversation_mut().record_exchange(text, reply);
        writeln!(output, "{}", render_turn(turn))?;
    }

    info!(turns = session.conversation().len(), "Terminal chat finished");
    Ok(ChatExit::Quit)
}
