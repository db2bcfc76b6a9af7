use crate::{
    config::Config,
    conversation::OutboundPrompt,
    notify::{Level, Notification},
    relay::{HttpRelay, Relay},
    render::{INPUT_PLACEHOLDER, Line, Persona, Style},
    session::{Completion, Session},
};
use anyhow::{Context, Result};
use crossterm::{
    cursor::MoveTo,
    event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    queue,
    style::{
        Attribute, Color, Print, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor,
    },
    terminal::{self, Clear, ClearType},
};
use futures_util::StreamExt;
use std::io::{IsTerminal, Write};
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

const COMPLETION_QUEUE: usize = 8;
const FALLBACK_ROWS: u16 = 24;
// title, tagline, spacer, hint line, prompt
const CHROME_ROWS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Quit,
    ScrollUp,
    ScrollDown,
    Submit(String),
}

impl Command {
    /// Only the exact words are commands; anything else, including
    /// padded variants, is sent as a prompt.
    fn parse(line: &str) -> Self {
        match line {
            "/quit" => Self::Quit,
            "/up" => Self::ScrollUp,
            "/down" => Self::ScrollDown,
            _ => Self::Submit(line.to_string()),
        }
    }
}

/// What the event loop should do after a key press.
#[derive(Debug, PartialEq, Eq)]
enum KeyOutcome {
    Ignored,
    Redraw,
    Dispatch(OutboundPrompt),
    Quit,
}

/// Restores cooked mode even when the loop exits through `?`.
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> Result<Self> {
        terminal::enable_raw_mode().context("Failed to enable raw mode")?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = terminal::disable_raw_mode() {
            warn!("Failed to restore terminal mode: {}", e);
        }
    }
}

pub async fn run(config: Config) -> Result<()> {
    if config.api_url.is_empty() {
        warn!("No endpoint address configured; every request will fail");
    }

    let relay: Arc<dyn Relay> = Arc::new(HttpRelay::new(config.api_url.clone()));
    let mut session = Session::new(relay, Persona::from(&config), config.notification_ttl);

    if std::io::stdin().is_terminal() {
        interactive(&mut session).await
    } else {
        batch(&mut session).await
    }
}

async fn interactive(session: &mut Session) -> Result<()> {
    let (tx, mut rx) = mpsc::channel::<Completion>(COMPLETION_QUEUE);
    let mut events = EventStream::new();
    let mut out = std::io::stdout();
    let _raw = RawModeGuard::enable()?;

    draw(&mut out, session, rows(), Instant::now())?;

    loop {
        let expiry = session.notifications_mut().next_expiry();

        tokio::select! {
            event = events.next() => {
                let Some(event) = event else {
                    break;
                };
                match event.context("Failed to read terminal event")? {
                    Event::Key(key) => match handle_key(session, key, page_height(rows()), Instant::now()) {
                        KeyOutcome::Quit => break,
                        KeyOutcome::Dispatch(outbound) => session.dispatch(outbound, tx.clone()),
                        KeyOutcome::Redraw => {}
                        KeyOutcome::Ignored => continue,
                    },
                    Event::Resize(..) => {}
                    _ => continue,
                }
            }
            Some(completion) = rx.recv() => {
                session.complete(completion, Instant::now());
            }
            _ = sleep_until(expiry) => {}
            _ = tokio::signal::ctrl_c() => break,
        }

        draw(&mut out, session, rows(), Instant::now())?;
    }

    queue!(out, Print("\r\n"))?;
    out.flush()?;
    info!("Leaving chat");
    Ok(())
}

fn handle_key(session: &mut Session, key: KeyEvent, page: usize, now: Instant) -> KeyOutcome {
    if key.kind != KeyEventKind::Press {
        return KeyOutcome::Ignored;
    }

    match (key.code, key.modifiers) {
        (KeyCode::Char('c') | KeyCode::Char('d'), KeyModifiers::CONTROL) => KeyOutcome::Quit,
        (KeyCode::Enter, KeyModifiers::ALT) => {
            session.type_char('\n');
            KeyOutcome::Redraw
        }
        (KeyCode::Enter, _) => match Command::parse(session.state().draft()) {
            Command::Quit => KeyOutcome::Quit,
            Command::ScrollUp => {
                session.clear_draft();
                session.viewport_mut().scroll_up(page);
                KeyOutcome::Redraw
            }
            Command::ScrollDown => {
                session.clear_draft();
                session.viewport_mut().scroll_down(page);
                KeyOutcome::Redraw
            }
            Command::Submit(_) => match session.submit_draft(now) {
                Some(outbound) => KeyOutcome::Dispatch(outbound),
                None => KeyOutcome::Redraw,
            },
        },
        (KeyCode::Backspace, _) => {
            session.backspace();
            KeyOutcome::Redraw
        }
        (KeyCode::PageUp, _) => {
            session.viewport_mut().scroll_up(page);
            KeyOutcome::Redraw
        }
        (KeyCode::PageDown, _) => {
            session.viewport_mut().scroll_down(page);
            KeyOutcome::Redraw
        }
        (KeyCode::Char(c), KeyModifiers::NONE | KeyModifiers::SHIFT) => {
            session.type_char(c);
            KeyOutcome::Redraw
        }
        _ => KeyOutcome::Ignored,
    }
}

/// Non-interactive mode: every input line is submitted in turn and the
/// transcript is printed once stdin is exhausted.
async fn batch(session: &mut Session) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut err = std::io::stderr();

    while let Some(line) = lines.next_line().await.context("Failed to read input")? {
        match Command::parse(&line) {
            Command::Quit => break,
            Command::ScrollUp | Command::ScrollDown => continue,
            Command::Submit(text) => {
                session.submit_and_wait(text).await;
            }
        }
        for notice in session.notifications_mut().take_all() {
            writeln!(err, "{}", notice.text)?;
        }
    }

    let view = session.view();
    let mut out = std::io::stdout();
    for line in view.header.iter().chain(view.body.iter()) {
        writeln!(out, "{}", line.text)?;
    }
    out.flush()?;
    Ok(())
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline.into()).await,
        None => std::future::pending().await,
    }
}

fn rows() -> usize {
    terminal::size().map(|(_, rows)| rows).unwrap_or(FALLBACK_ROWS) as usize
}

fn page_height(rows: usize) -> usize {
    rows.saturating_sub(CHROME_ROWS).max(1)
}

fn draw(out: &mut impl Write, session: &mut Session, rows: usize, now: Instant) -> Result<()> {
    let view = session.view();
    let notices: Vec<Notification> = session.notifications_mut().active(now).to_vec();
    let draft_lines = session.state().draft().split('\n').count();
    let height = page_height(rows)
        .saturating_sub(notices.len() + draft_lines - 1)
        .max(1);

    queue!(out, Clear(ClearType::All), MoveTo(0, 0))?;

    for line in &view.header {
        print_line(out, line)?;
    }
    queue!(out, Print("\r\n"))?;

    let viewport = session.viewport_mut();
    for line in viewport.window(&view.body, height) {
        print_line(out, line)?;
    }

    for notice in &notices {
        let color = match notice.level {
            Level::Error => Color::Red,
            Level::Info => Color::Yellow,
        };
        queue!(
            out,
            SetForegroundColor(color),
            Print(&notice.text),
            ResetColor,
            Print("\r\n")
        )?;
    }

    let hint = match viewport.offset() {
        0 => format!(
            "{}  (Enter to send, Alt+Enter for a new line, PgUp/PgDn or /up /down to scroll, /quit to leave)",
            INPUT_PLACEHOLDER
        ),
        n => format!("{} more lines below, PgDn or /down to return", n),
    };
    queue!(
        out,
        SetForegroundColor(Color::DarkGrey),
        Print(hint),
        ResetColor,
        Print("\r\n")
    )?;

    queue!(
        out,
        Print("> "),
        Print(session.state().draft().replace('\n', "\r\n  "))
    )?;

    out.flush()?;
    Ok(())
}

fn print_line(out: &mut impl Write, line: &Line) -> std::io::Result<()> {
    match line.style {
        Style::Title => queue!(out, SetAttribute(Attribute::Bold), Print(&line.text))?,
        Style::Subtitle | Style::Placeholder => queue!(
            out,
            SetForegroundColor(Color::Grey),
            Print(&line.text)
        )?,
        Style::User => queue!(
            out,
            SetBackgroundColor(Color::DarkBlue),
            SetForegroundColor(Color::White),
            Print(&line.text)
        )?,
        Style::Thinking => queue!(
            out,
            SetAttribute(Attribute::Italic),
            Print(&line.text)
        )?,
        Style::Assistant | Style::Blank => queue!(out, Print(&line.text))?,
    }
    queue!(out, SetAttribute(Attribute::Reset), ResetColor, Print("\r\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const TTL: Duration = Duration::from_secs(4);

    fn session() -> Session {
        let persona = Persona {
            name: "Ada AI".to_string(),
            tagline: "Ask me anything".to_string(),
            assistant_avatar: "ada".to_string(),
            user_avatar: "you".to_string(),
        };
        // Never dispatched in these tests, so the address is irrelevant.
        Session::new(Arc::new(HttpRelay::new("")), persona, TTL)
    }

    fn press(session: &mut Session, code: KeyCode, now: Instant) -> KeyOutcome {
        handle_key(session, KeyEvent::new(code, KeyModifiers::NONE), 10, now)
    }

    fn type_text(session: &mut Session, text: &str, now: Instant) {
        for c in text.chars() {
            assert_eq!(press(session, KeyCode::Char(c), now), KeyOutcome::Redraw);
        }
    }

    fn reply(session: &mut Session, outbound: &OutboundPrompt, text: &str, now: Instant) {
        session.complete(
            Completion {
                id: outbound.id,
                result: Ok(text.to_string()),
            },
            now,
        );
    }

    fn drawn(session: &mut Session, rows: usize, now: Instant) -> String {
        let mut buf = Vec::new();
        draw(&mut buf, session, rows, now).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn parses_commands() {
        assert_eq!(Command::parse("/quit"), Command::Quit);
        assert_eq!(Command::parse("/up"), Command::ScrollUp);
        assert_eq!(Command::parse("/down"), Command::ScrollDown);
    }

    #[test]
    fn everything_else_is_submitted_verbatim() {
        assert_eq!(Command::parse(""), Command::Submit(String::new()));
        assert_eq!(
            Command::parse(" /up "),
            Command::Submit(" /up ".to_string())
        );
        assert_eq!(
            Command::parse("  hello there "),
            Command::Submit("  hello there ".to_string())
        );
        assert_eq!(
            Command::parse("/help"),
            Command::Submit("/help".to_string())
        );
    }

    #[test]
    fn enter_submits_the_typed_draft() {
        let mut session = session();
        let now = Instant::now();
        type_text(&mut session, "Hellp", now);
        press(&mut session, KeyCode::Backspace, now);
        type_text(&mut session, "o", now);

        let KeyOutcome::Dispatch(outbound) = press(&mut session, KeyCode::Enter, now) else {
            panic!("expected a dispatch");
        };
        assert_eq!(outbound.request.prompt, "Hello");
        assert!(outbound.request.chat_history.is_empty());
        assert_eq!(session.state().draft(), "");
    }

    #[test]
    fn enter_on_empty_draft_sends_empty_prompt() {
        let mut session = session();
        let outcome = press(&mut session, KeyCode::Enter, Instant::now());
        assert!(matches!(outcome, KeyOutcome::Dispatch(ref o) if o.request.prompt.is_empty()));
    }

    #[test]
    fn rejected_draft_is_submitted_on_next_enter() {
        let mut session = session();
        let now = Instant::now();

        type_text(&mut session, "first", now);
        let KeyOutcome::Dispatch(first) = press(&mut session, KeyCode::Enter, now) else {
            panic!("expected a dispatch");
        };

        type_text(&mut session, "second", now);
        assert_eq!(press(&mut session, KeyCode::Enter, now), KeyOutcome::Redraw);
        assert_eq!(session.state().draft(), "second");
        assert_eq!(session.state().conversation().len(), 1);

        reply(&mut session, &first, "re: first", now);
        assert_eq!(session.state().draft(), "second");

        let KeyOutcome::Dispatch(second) = press(&mut session, KeyCode::Enter, now) else {
            panic!("expected a dispatch");
        };
        assert_eq!(second.request.prompt, "second");
        assert_eq!(second.request.chat_history, vec!["first", "re: first"]);
    }

    #[test]
    fn alt_enter_inserts_a_line_break() {
        let mut session = session();
        let now = Instant::now();
        type_text(&mut session, "a", now);
        handle_key(
            &mut session,
            KeyEvent::new(KeyCode::Enter, KeyModifiers::ALT),
            10,
            now,
        );
        type_text(&mut session, "b", now);
        assert_eq!(session.state().draft(), "a\nb");
    }

    #[test]
    fn command_words_on_enter_do_not_submit() {
        let mut session = session();
        let now = Instant::now();

        type_text(&mut session, "/up", now);
        assert_eq!(press(&mut session, KeyCode::Enter, now), KeyOutcome::Redraw);
        assert_eq!(session.viewport_mut().offset(), 10);
        assert_eq!(session.state().draft(), "");
        assert!(session.state().conversation().is_empty());

        type_text(&mut session, "/quit", now);
        assert_eq!(press(&mut session, KeyCode::Enter, now), KeyOutcome::Quit);
    }

    #[test]
    fn ctrl_c_quits() {
        let mut session = session();
        let outcome = handle_key(
            &mut session,
            KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL),
            10,
            Instant::now(),
        );
        assert_eq!(outcome, KeyOutcome::Quit);
        assert_eq!(session.state().draft(), "");
    }

    #[test]
    fn draw_repaints_the_draft_after_the_prompt() {
        let mut session = session();
        let now = Instant::now();
        type_text(&mut session, "half typ", now);

        let screen = drawn(&mut session, 24, now);
        assert!(screen.contains("Ada AI"));
        assert!(screen.contains("You haven't asked anything yet!"));
        assert!(screen.ends_with("> half typ"));
    }

    #[test]
    fn draw_shows_notifications_until_they_expire() {
        let mut session = session();
        let now = Instant::now();
        let outbound = session.submit("Test", now).unwrap();
        session.complete(
            Completion {
                id: outbound.id,
                result: Err(crate::relay::RelayError::Status {
                    code: 500,
                    reason: "Internal Server Error".to_string(),
                }),
            },
            now,
        );

        let screen = drawn(&mut session, 24, now);
        assert!(screen.contains("500: Internal Server Error"));
        assert!(screen.contains("I'm sorry, it appears there has been an error!"));

        let later = drawn(&mut session, 24, now + TTL + Duration::from_secs(1));
        assert!(!later.contains("500: Internal Server Error"));
        assert!(later.contains("I'm sorry, it appears there has been an error!"));
    }

    #[test]
    fn draw_windows_the_body_and_hints_when_scrolled() {
        let mut session = session();
        let now = Instant::now();
        let outbound = session.submit("q1\nq2\nq3\nq4\nq5", now).unwrap();
        reply(&mut session, &outbound, "latest answer", now);

        // 8 rows leave 3 body lines: the last user line, the gap, the reply.
        let bottom = drawn(&mut session, 8, now);
        assert!(bottom.contains("latest answer"));
        assert!(bottom.contains("q5"));
        assert!(!bottom.contains("q1"));
        assert!(!bottom.contains("more lines below"));

        session.viewport_mut().scroll_up(100);
        let top = drawn(&mut session, 8, now);
        assert!(top.contains("q1"));
        assert!(!top.contains("latest answer"));
        assert!(top.contains("4 more lines below"));
    }

    #[test]
    fn print_line_writes_text_and_line_break() {
        let mut buf = Vec::new();
        print_line(
            &mut buf,
            &Line {
                style: Style::User,
                text: "[you] hi".to_string(),
            },
        )
        .unwrap();

        let written = String::from_utf8(buf).unwrap();
        assert!(written.contains("[you] hi"));
        assert!(written.ends_with("\r\n"));
    }
}
