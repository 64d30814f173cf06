use std::io::Write;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use papertalk_core::{PaperSummary, SearchMode};

use crate::citation::{self, CitationFormat};
use crate::session::{DisplayMessage, Speaker};

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

const SUMMARY_WIDTH: usize = 300;

fn shorten(text: &str, max_chars: usize) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > max_chars {
        let cut: String = flat.chars().take(max_chars).collect();
        format!("{}...", cut.trim_end())
    } else {
        flat
    }
}

/// Spinner on stderr for a long-running step. Call `finish_and_clear` when done.
pub fn spinner(message: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        bar.set_style(style);
    }
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

pub fn print_banner(w: &mut dyn Write, color: ColorMode) -> std::io::Result<()> {
    if color.enabled() {
        writeln!(w, "{}", "AI Research Paper Assistant".bold().cyan())?;
        writeln!(w, "{}", "Type a query to search arXiv, :help for commands.".dimmed())?;
    } else {
        writeln!(w, "AI Research Paper Assistant")?;
        writeln!(w, "Type a query to search arXiv, :help for commands.")?;
    }
    writeln!(w)
}

/// Print numbered search hits.
pub fn print_results(
    w: &mut dyn Write,
    query: &str,
    results: &[PaperSummary],
    color: ColorMode,
) -> std::io::Result<()> {
    if color.enabled() {
        writeln!(w, "{} {}", "Results for:".bold(), query.cyan())?;
    } else {
        writeln!(w, "Results for: {}", query)?;
    }
    writeln!(w)?;

    for (i, paper) in results.iter().enumerate() {
        let published = paper
            .published
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "unknown".to_string());
        if color.enabled() {
            writeln!(w, "[{}] {}", (i + 1).to_string().bold(), paper.title.bold())?;
            writeln!(w, "    {} {}", "Authors:".dimmed(), paper.authors.join(", "))?;
            writeln!(w, "    {} {}", "Published:".dimmed(), published)?;
            writeln!(
                w,
                "    {} {}",
                "Summary:".dimmed(),
                shorten(&paper.summary, SUMMARY_WIDTH)
            )?;
            writeln!(w, "    {}", paper.entry_url.blue().underline())?;
        } else {
            writeln!(w, "[{}] {}", i + 1, paper.title)?;
            writeln!(w, "    Authors: {}", paper.authors.join(", "))?;
            writeln!(w, "    Published: {}", published)?;
            writeln!(w, "    Summary: {}", shorten(&paper.summary, SUMMARY_WIDTH))?;
            writeln!(w, "    {}", paper.entry_url)?;
        }
        writeln!(w)?;
    }
    Ok(())
}

fn tips(mode: SearchMode, no_results: bool) -> &'static [&'static str] {
    match (mode, no_results) {
        (SearchMode::Id, true) => &["Check the ID format: it should look like 2306.12345."],
        (_, true) => &[
            "Use meaningful keywords rather than full sentences.",
            "Include author names to narrow things down.",
            "Increase the number of results with :max.",
            "Try switching modes with :mode.",
        ],
        (SearchMode::General, false) => &[
            "Use topic keywords, e.g. diffusion models image synthesis.",
            "Add author names to focus the search.",
            "Combine topics to find work at their intersection.",
            "Avoid quotes; punctuation is stripped before searching.",
        ],
        (SearchMode::Title, false) => &[
            "Use distinct words from the title.",
            "Avoid full sentences.",
            "Match concepts rather than exact phrasing.",
        ],
        (SearchMode::Id, false) => &[
            "Enter a valid arXiv ID, e.g. 2102.12092.",
            "You can find it in the paper's arXiv URL.",
            "Only one ID at a time.",
        ],
    }
}

/// Search guidance for `mode`; the shorter "no results" variant when a
/// search came back empty.
pub fn print_search_tips(
    w: &mut dyn Write,
    mode: SearchMode,
    no_results: bool,
    color: ColorMode,
) -> std::io::Result<()> {
    if no_results {
        if color.enabled() {
            writeln!(w, "{}", "No results found.".yellow())?;
        } else {
            writeln!(w, "No results found.")?;
        }
    }
    let heading = if no_results {
        "Search tips:"
    } else {
        "How to search effectively:"
    };
    if color.enabled() {
        writeln!(w, "{} {}", heading.bold(), format!("({})", mode.label()).dimmed())?;
    } else {
        writeln!(w, "{} ({})", heading, mode.label())?;
    }
    for tip in tips(mode, no_results) {
        writeln!(w, "  - {}", tip)?;
    }
    writeln!(w)
}

pub fn print_help(w: &mut dyn Write, mode: SearchMode, color: ColorMode) -> std::io::Result<()> {
    let commands = [
        ("<text>", "search (or, in a chat, ask a question)"),
        (":mode general|title|id", "change the search mode"),
        (":max N", "number of results (10-300)"),
        (":open N", "chat with result N"),
        (":cite [N]", "APA and BibTeX for result N or the open paper"),
        (":back", "leave the chat and return to the results"),
        (":quit", "exit"),
    ];
    for (command, description) in commands {
        if color.enabled() {
            writeln!(w, "  {:<26} {}", command.cyan(), description)?;
        } else {
            writeln!(w, "  {:<26} {}", command, description)?;
        }
    }
    writeln!(w)?;
    print_search_tips(w, mode, false, color)
}

pub fn print_citations(
    w: &mut dyn Write,
    paper: &PaperSummary,
    format: CitationFormat,
    color: ColorMode,
) -> std::io::Result<()> {
    if matches!(format, CitationFormat::Apa | CitationFormat::Both) {
        if color.enabled() {
            writeln!(w, "{}", "APA Style:".bold())?;
        } else {
            writeln!(w, "APA Style:")?;
        }
        writeln!(w, "{}", citation::apa(paper))?;
    }
    if matches!(format, CitationFormat::Bibtex | CitationFormat::Both) {
        if color.enabled() {
            writeln!(w, "{}", "BibTeX Format:".bold())?;
        } else {
            writeln!(w, "BibTeX Format:")?;
        }
        writeln!(w, "{}", citation::bibtex(paper))?;
    }
    writeln!(w)
}

pub fn print_chat_header(
    w: &mut dyn Write,
    paper: &PaperSummary,
    color: ColorMode,
) -> std::io::Result<()> {
    if color.enabled() {
        writeln!(w, "{} {}", "Chatting with:".bold(), paper.title.italic())?;
        writeln!(w, "{}", ":back returns to the results, :quit exits.".dimmed())?;
    } else {
        writeln!(w, "Chatting with: {}", paper.title)?;
        writeln!(w, ":back returns to the results, :quit exits.")?;
    }
    writeln!(w)
}

pub fn print_message(
    w: &mut dyn Write,
    message: &DisplayMessage,
    color: ColorMode,
) -> std::io::Result<()> {
    let label = match message.speaker {
        Speaker::User => "you",
        Speaker::Assistant => "assistant",
    };
    if color.enabled() {
        match message.speaker {
            Speaker::User => writeln!(w, "{}", format!("{}>", label).green().bold())?,
            Speaker::Assistant => writeln!(w, "{}", format!("{}>", label).magenta().bold())?,
        }
    } else {
        writeln!(w, "{}>", label)?;
    }
    writeln!(w, "{}", message.text.trim_end())?;
    writeln!(w)
}

pub fn print_notice(w: &mut dyn Write, text: &str, color: ColorMode) -> std::io::Result<()> {
    if color.enabled() {
        writeln!(w, "{}", text.yellow())
    } else {
        writeln!(w, "{}", text)
    }
}

pub fn print_error(w: &mut dyn Write, text: &str, color: ColorMode) -> std::io::Result<()> {
    if color.enabled() {
        writeln!(w, "{} {}", "Error:".red().bold(), text)
    } else {
        writeln!(w, "Error: {}", text)
    }
}
