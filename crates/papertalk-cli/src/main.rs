use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use papertalk_core::{
    ArxivIndex, Config, ContextTemplate, GeminiBackend, PaperId, PaperIndex, SearchMode,
    SearchQuery, build_context, config_file,
};
use papertalk_ingest::Ingestor;
use tracing_subscriber::EnvFilter;

mod action;
mod citation;
mod output;
mod repl;
mod session;

use citation::CitationFormat;
use output::ColorMode;
use repl::Services;
use session::App;

/// Search arXiv and chat with a paper using a hosted language model
#[derive(Parser, Debug)]
#[command(name = "papertalk", version, about, long_about = None)]
struct Cli {
    /// Config file to use instead of the platform and .papertalk.toml cascade
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Chat model to use (overrides config and PAPERTALK_MODEL)
    #[arg(long, global = true)]
    model: Option<String>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search arXiv and print numbered results
    Search {
        /// Query text (an arXiv ID in --mode id)
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,

        /// How the query is interpreted
        #[arg(long, default_value = "general")]
        mode: SearchMode,

        /// Number of results (10-300)
        #[arg(long)]
        max: Option<usize>,
    },

    /// Print APA and/or BibTeX citations for one paper
    Cite {
        /// arXiv ID, e.g. 2102.12092
        id: String,

        #[arg(long, value_enum, default_value_t = CitationFormat::Both)]
        format: CitationFormat,
    },

    /// Read a paper and print the chat context document (no API key needed)
    Context {
        /// arXiv ID, e.g. 2102.12092
        id: String,
    },

    /// Read a paper and chat about it
    Chat {
        /// arXiv ID, e.g. 2102.12092
        id: String,
    },

    /// Interactive search and chat (default)
    Repl,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "warn,papertalk=debug,papertalk_core=debug,papertalk_ingest=debug,papertalk_pdf_mupdf=debug",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose > 1)
        .init();
}

/// Resolve configuration: CLI flags > env vars > config file > defaults.
fn resolve_config(cli: &Cli) -> anyhow::Result<Config> {
    let file = match &cli.config {
        Some(path) => config_file::read_config(path)?,
        None => config_file::load_config(),
    };
    let mut config = Config::from_file(&file).with_env();
    if let Some(model) = &cli.model {
        config.model = model.clone();
    }
    tracing::debug!(?config, "resolved configuration");
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = resolve_config(&cli)?;
    let color = ColorMode(!cli.no_color);
    let client = config.http_client()?;
    let index: Arc<dyn PaperIndex> = Arc::new(
        ArxivIndex::new(client.clone())
            .with_api_url(config.api_url.clone())
            .with_timeout(config.network_timeout()),
    );

    match cli.command.unwrap_or(Command::Repl) {
        Command::Search { query, mode, max } => {
            let max = max.unwrap_or(config.max_results);
            search(index.as_ref(), &query.join(" "), mode, max, color).await
        }
        Command::Cite { id, format } => cite(index.as_ref(), &id, format, color).await,
        Command::Context { id } => {
            let ingestor = Ingestor::from_config(&config, client, Arc::clone(&index));
            context(&ingestor, &config, &id).await
        }
        Command::Chat { id } => {
            let services = services(&config, client, index)?;
            chat(&services, &config, &id, color).await
        }
        Command::Repl => {
            let services = services(&config, client, index)?;
            repl::run(&services, App::new(config.max_results), color).await
        }
    }
}

/// Wire up everything a chat needs. Fails before any network activity when
/// no API key is configured.
fn services(
    config: &Config,
    client: reqwest::Client,
    index: Arc<dyn PaperIndex>,
) -> anyhow::Result<Services> {
    let chat_backend = GeminiBackend::from_config(config, client.clone())?;
    let template = ContextTemplate::resolve(config.context_template.as_deref())?;
    Ok(Services {
        ingestor: Ingestor::from_config(config, client, Arc::clone(&index)),
        index,
        chat_backend: Arc::new(chat_backend),
        template,
    })
}

async fn search(
    index: &dyn PaperIndex,
    text: &str,
    mode: SearchMode,
    max: usize,
    color: ColorMode,
) -> anyhow::Result<()> {
    let query = SearchQuery::new(text, mode).with_max_results(max);
    if query.cleaned().is_empty() {
        anyhow::bail!("Query is empty after removing punctuation: {:?}", text);
    }

    let bar = output::spinner(&format!("Searching {}...", index.name()));
    let results = index.search(&query).await;
    bar.finish_and_clear();

    let mut out = std::io::stdout();
    let results = results?;
    if results.is_empty() {
        output::print_search_tips(&mut out, mode, true, color)?;
    } else {
        output::print_results(&mut out, text, &results, color)?;
    }
    Ok(())
}

async fn lookup(index: &dyn PaperIndex, id: &str) -> anyhow::Result<papertalk_core::PaperSummary> {
    let query = SearchQuery::new(id, SearchMode::Id);
    let results = index.search(&query).await?;
    match results.into_iter().next() {
        Some(paper) => Ok(paper),
        None => anyhow::bail!("No paper found for arXiv ID {}", id),
    }
}

async fn cite(
    index: &dyn PaperIndex,
    id: &str,
    format: CitationFormat,
    color: ColorMode,
) -> anyhow::Result<()> {
    let paper = lookup(index, id).await?;
    let mut out = std::io::stdout();
    output::print_citations(&mut out, &paper, format, color)?;
    Ok(())
}

async fn context(ingestor: &Ingestor, config: &Config, id: &str) -> anyhow::Result<()> {
    let template = ContextTemplate::resolve(config.context_template.as_deref())?;
    let bar = output::spinner("Reading paper...");
    let result = ingestor.ingest_paper(&PaperId::new(id)).await;
    bar.finish_and_clear();

    let document = build_context(&result?, &template)?;
    let mut out = std::io::stdout();
    writeln!(out, "{}", document)?;
    Ok(())
}

async fn chat(services: &Services, config: &Config, id: &str, color: ColorMode) -> anyhow::Result<()> {
    let paper = lookup(services.index.as_ref(), id).await?;
    let mut app = App::new(config.max_results);
    app.open_direct(paper.clone());

    let mut out = std::io::stdout();
    output::print_chat_header(&mut out, &paper, color)?;
    let bar = output::spinner("Reading paper and preparing the assistant...");
    let prepared = services.prepare_chat(&paper).await;
    bar.finish_and_clear();

    app.attach_chat(prepared?);
    for message in &app.messages {
        output::print_message(&mut out, message, color)?;
    }
    repl::run(services, app, color).await
}
