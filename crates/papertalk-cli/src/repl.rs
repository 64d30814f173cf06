use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use papertalk_core::{
    ChatBackend, ChatSession, ContextTemplate, PaperIndex, PaperSummary, SearchQuery,
    build_context,
};
use papertalk_ingest::Ingestor;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::action::parse_input;
use crate::citation::CitationFormat;
use crate::output::{self, ColorMode};
use crate::session::{App, Effect, Screen};

/// Everything the interactive loop talks to.
pub struct Services {
    pub index: Arc<dyn PaperIndex>,
    pub ingestor: Ingestor,
    pub chat_backend: Arc<dyn ChatBackend>,
    pub template: ContextTemplate,
}

impl Services {
    /// Read the paper and open a conversation about it.
    pub async fn prepare_chat(&self, paper: &PaperSummary) -> anyhow::Result<ChatSession> {
        let result = self
            .ingestor
            .ingest_paper(&paper.id)
            .await
            .with_context(|| format!("could not read paper {}", paper.id))?;
        let context = build_context(&result, &self.template)?;
        let session = ChatSession::start(Arc::clone(&self.chat_backend), context).await?;
        Ok(session)
    }

    pub async fn search(&self, query: &SearchQuery) -> anyhow::Result<Vec<PaperSummary>> {
        let bar = output::spinner(&format!("Searching {}...", self.index.name()));
        let results = self.index.search(query).await;
        bar.finish_and_clear();
        Ok(results?)
    }
}

fn prompt_text(app: &App) -> &'static str {
    match app.screen {
        Screen::Search => "search> ",
        Screen::Chat => "ask> ",
    }
}

/// Drive `app` from stdin until the user quits, stdin closes, or Ctrl+C.
pub async fn run(services: &Services, mut app: App, color: ColorMode) -> anyhow::Result<()> {
    let mut out = std::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    if app.screen == Screen::Search {
        output::print_banner(&mut out, color)?;
    }

    loop {
        if app.needs_chat() {
            ensure_chat(services, &mut app, &mut out, color).await?;
        }
        if app.should_quit {
            break;
        }

        write!(out, "{}", prompt_text(&app))?;
        out.flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            writeln!(out)?;
            break;
        };

        let action = parse_input(&line, &app.screen);
        match app.update(action) {
            Effect::None => {}
            Effect::Quit => break,
            Effect::Help => output::print_help(&mut out, app.search.mode, color)?,
            Effect::Notice(text) => output::print_notice(&mut out, &text, color)?,
            Effect::Cite(paper) => {
                output::print_citations(&mut out, &paper, CitationFormat::Both, color)?
            }
            Effect::Search(query) => match services.search(&query).await {
                Ok(results) if results.is_empty() => {
                    app.set_results(results);
                    output::print_search_tips(&mut out, query.mode, true, color)?;
                }
                Ok(results) => {
                    output::print_results(&mut out, &app.search.query, &results, color)?;
                    app.set_results(results);
                }
                Err(e) => output::print_error(&mut out, &format!("{:#}", e), color)?,
            },
            // Preparation happens at the top of the loop.
            Effect::PrepareChat(_) => {}
            Effect::Ask(prompt) => {
                let bar = output::spinner("Thinking...");
                let reply = app.send_prompt(&prompt).await.cloned();
                bar.finish_and_clear();
                if let Some(reply) = reply {
                    output::print_message(&mut out, &reply, color)?;
                }
            }
        }
    }
    Ok(())
}

async fn ensure_chat(
    services: &Services,
    app: &mut App,
    out: &mut dyn Write,
    color: ColorMode,
) -> anyhow::Result<()> {
    let Some(paper) = app.active_paper.clone() else {
        return Ok(());
    };
    output::print_chat_header(out, &paper, color)?;

    let bar = output::spinner("Reading paper and preparing the assistant...");
    let prepared = services.prepare_chat(&paper).await;
    bar.finish_and_clear();

    match prepared {
        Ok(session) => {
            app.attach_chat(session);
            for message in &app.messages {
                output::print_message(out, message, color)?;
            }
        }
        Err(e) => {
            tracing::debug!(id = %paper.id, error = ?e, "chat preparation failed");
            let message = app.chat_failed(&format!("{:#}", e));
            output::print_error(out, &message, color)?;
        }
    }
    Ok(())
}
