use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use bubbleboard_core::Board;
use bubbleboard_core::commands::{self, Flow};
use bubbleboard_core::render::Renderer;
use bubbleboard_core::session::Session;
use bubbleboard_core::suggest::{self, Conversation, Generation, TextGenerator};
use chrono::NaiveDate;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, trace, warn};

use crate::gemini::GeminiClient;

/// Runs the board until stdin closes, `quit`, or ctrl-c.
#[instrument(skip_all)]
pub async fn run(board: Board) -> anyhow::Result<()> {
    let Board {
        cli,
        settings,
        mut session,
        renderer,
    } = board;

    let generator = Arc::new(GeminiClient::new(&settings.suggest)?);
    let (tx, mut rx) = mpsc::channel::<Conversation>(8);
    let mut input = BufReader::new(tokio::io::stdin());
    let mut pending = Vec::new();

    let mut ticker = tokio::time::interval(Duration::from_millis(settings.frame_ms.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_frame = Instant::now();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    {
        let mut out = std::io::stdout().lock();
        renderer.print_reply(&mut out, &settings.greeting)?;
        writeln!(out, "Type 'help' for commands.")?;
    }

    loop {
        tokio::select! {
            _ = ticker.tick(), if !cli.no_ticker => {
                let now = Instant::now();
                let elapsed_ms = now.duration_since(last_frame).as_secs_f64() * 1000.0;
                last_frame = now;
                let outcome = session.tick(elapsed_ms);
                if !outcome.popped.is_empty() {
                    debug!(popped = outcome.popped.len(), "single clicks popped bubbles");
                }
            }
            line = read_input_line(&mut input, &mut pending) => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        info!("stdin closed");
                        break;
                    }
                    Err(err) => {
                        warn!(error = %err, "failed reading input line");
                        writeln!(std::io::stdout().lock(), "error: {err:#}")?;
                        pending.clear();
                        continue;
                    }
                };
                match handle_line(&mut session, &renderer, &line)? {
                    Flow::Continue => {}
                    Flow::Converse { generation, input, today } => {
                        spawn_conversation(Arc::clone(&generator), tx.clone(), generation, input, today);
                    }
                    Flow::Quit => break,
                }
            }
            Some(conversation) = rx.recv() => {
                if session.apply_conversation(conversation) {
                    let mut out = std::io::stdout().lock();
                    if let Some(reply) = session.last_reply() {
                        renderer.print_reply(&mut out, reply)?;
                    }
                    renderer.print_chips(&mut out, session.chips())?;
                }
            }
            _ = &mut ctrl_c => {
                info!("interrupted");
                break;
            }
        }
    }

    info!(tasks = session.store().len(), "board closed");
    Ok(())
}

/// Reads one line, decoding invalid UTF-8 lossily. `pending` holds a partial
/// line across cancelled reads; `None` means end of input.
async fn read_input_line<R>(reader: &mut R, pending: &mut Vec<u8>) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    if reader.read_until(b'\n', pending).await? == 0 && pending.is_empty() {
        return Ok(None);
    }
    let line = String::from_utf8_lossy(pending)
        .trim_end_matches(['\r', '\n'])
        .to_string();
    pending.clear();
    Ok(Some(line))
}

/// Parses and applies one line; bad input is reported and never ends the loop.
fn handle_line(session: &mut Session, renderer: &Renderer, line: &str) -> anyhow::Result<Flow> {
    let mut out = std::io::stdout().lock();
    let command = match commands::parse_line(line, session.today()) {
        Ok(Some(command)) => command,
        Ok(None) => return Ok(Flow::Continue),
        Err(err) => {
            writeln!(out, "error: {err:#}")?;
            return Ok(Flow::Continue);
        }
    };

    match commands::dispatch(session, renderer, &mut out, command) {
        Ok(flow) => Ok(flow),
        Err(err) => {
            writeln!(out, "error: {err:#}")?;
            Ok(Flow::Continue)
        }
    }
}

/// Asks for a reply and suggestions concurrently and posts the result back.
pub fn spawn_conversation<G>(
    generator: Arc<G>,
    tx: mpsc::Sender<Conversation>,
    generation: Generation,
    input: String,
    today: NaiveDate,
) where
    G: TextGenerator + Send + Sync + 'static,
{
    tokio::spawn(async move {
        trace!(generation = generation.get(), "conversation task running");
        let (reply, suggestions) = tokio::join!(
            suggest::reply(generator.as_ref(), &input),
            suggest::suggest_tasks(generator.as_ref(), &input, today),
        );
        let conversation = Conversation {
            generation,
            input,
            reply,
            suggestions,
        };
        if tx.send(conversation).await.is_err() {
            debug!("board closed before the conversation finished");
        }
    });
}
