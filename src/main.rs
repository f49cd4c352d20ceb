use anyhow::{Context, Result};
use clap::Parser;
use paiza_workspace::{
    config::{load_document, DEFAULT_CONFIG_FILE},
    metadata_from_page, scrape_and_create_metadata,
    session::DEFAULT_WEBDRIVER_URL,
    workspace::{DEFAULT_SOURCE_FILE, DEFAULT_WORKSPACE_ROOT},
    BrowserSession, CommandLauncher, Configuration, ProblemMetadata, ScaffoldBuilder,
    SessionOptionsBuilder, WebSession,
};
use std::{fs, path::PathBuf, time::Duration};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Scrape a paiza problem and scaffold a workspace for solving it.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Opts {
    /// Ready page url, e.g. https://paiza.jp/challenges/123/ready
    url: String,
    /// YAML file holding `email` and `password`
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config_file: PathBuf,
    #[arg(long, default_value = DEFAULT_WEBDRIVER_URL)]
    webdriver: String,
    #[arg(long)]
    headless: bool,
    /// Seconds to wait for the problem page to render
    #[arg(long, default_value_t = 10)]
    timeout: u64,
    #[arg(long, default_value = DEFAULT_WORKSPACE_ROOT)]
    workspace_root: PathBuf,
    #[arg(long, default_value = DEFAULT_SOURCE_FILE)]
    source_file: String,
    #[arg(long, env = "EDITOR", default_value = "gvim")]
    editor: String,
    #[arg(long, env = "SHELL", default_value = "sh")]
    shell: String,
    /// Read the title from a saved ready page instead of logging in
    #[arg(long)]
    page_file: Option<PathBuf>,
    /// Only create the files, don't open the editor or the shell
    #[arg(long)]
    no_launch: bool,
    /// Write the scraped problem metadata to metadata.json instead of the config document
    #[arg(long)]
    problem_metadata: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let opts = Opts::parse();

    info!(path = %opts.config_file.display(), "loading config");
    let document = load_document(&opts.config_file)?;
    let config = Configuration::from_document(&document)
        .with_context(|| format!("invalid config file {}", opts.config_file.display()))?;

    let metadata = match &opts.page_file {
        Some(path) => {
            let html = fs::read_to_string(path)
                .with_context(|| format!("failed to read page {}", path.display()))?;
            metadata_from_page(&html, &opts.url)?
        }
        None => scrape(&opts, &config).await?,
    };

    let scaffold = ScaffoldBuilder::default()
        .root(opts.workspace_root.clone())
        .source_file(opts.source_file.clone())
        .build()?;
    let workspace = if opts.problem_metadata {
        scaffold.prepare(&metadata, &metadata)?
    } else {
        scaffold.prepare(&metadata, &document)?
    };

    if opts.no_launch {
        info!(dir = %workspace.dir.display(), "workspace ready");
        return Ok(());
    }
    workspace.open(&CommandLauncher::new(&opts.editor, &opts.shell))
}

async fn scrape(opts: &Opts, config: &Configuration) -> Result<ProblemMetadata> {
    let timeout = Duration::from_secs(opts.timeout);
    let options = SessionOptionsBuilder::default()
        .webdriver_url(opts.webdriver.clone())
        .headless(opts.headless)
        .ready_timeout(timeout)
        .implicit_wait(timeout)
        .build()?;

    let mut session = BrowserSession::new(options);
    let result = scrape_and_create_metadata(&mut session, &opts.url, config, timeout).await;
    let closed = session.close().await;

    let metadata = result?;
    closed?;
    Ok(metadata)
}
