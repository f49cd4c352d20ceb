use crate::{create_metadata, validate_ready_url, Configuration, ProblemMetadata, WorkspaceError};
use async_trait::async_trait;
use derive_builder::Builder;
use fantoccini::{wd::TimeoutConfiguration, Client, ClientBuilder, Locator};
use serde_json::{json, Map, Value};
use std::{fmt, future::Future, time::Duration};
use strum::Display;
use tracing::{info, warn};

pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:4444";
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_IMPLICIT_WAIT: Duration = Duration::from_secs(10);
const POLL_INTERVAL: Duration = Duration::from_millis(250);

pub const EMAIL_FORM: Target = Target::Id("email");
pub const PASSWORD_FORM: Target = Target::Id("password");
pub const SUBMIT_BUTTON: Target = Target::XPath("//input[@type='submit']");
pub const PROBLEM_LOADED: Target = Target::Id("js-challenge-problem");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SessionState {
    NotStarted,
    Navigated,
    Authenticated,
    Ready,
    MetadataExtracted,
    Failed,
}

/// An element on the page, addressed the way WebDriver finds it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Id(&'static str),
    XPath(&'static str),
}

impl Target {
    fn locator(&self) -> Locator<'static> {
        match *self {
            Target::Id(id) => Locator::Id(id),
            Target::XPath(xpath) => Locator::XPath(xpath),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Id(id) => write!(f, "#{id}"),
            Target::XPath(xpath) => write!(f, "{xpath}"),
        }
    }
}

/// The browser the metadata is scraped through.
#[async_trait]
pub trait WebSession: Send {
    async fn goto(&mut self, url: &str) -> Result<(), WorkspaceError>;
    async fn fill(&mut self, target: &Target, text: &str) -> Result<(), WorkspaceError>;
    async fn click(&mut self, target: &Target) -> Result<(), WorkspaceError>;
    /// Blocks until `target` is displayed and enabled, or fails with
    /// [`WorkspaceError::Timeout`] once `timeout` has passed.
    async fn wait_clickable(&mut self, target: &Target, timeout: Duration)
        -> Result<(), WorkspaceError>;
    async fn title(&mut self) -> Result<String, WorkspaceError>;
    /// Releases the underlying browser. Safe to call on a session that never connected.
    async fn close(&mut self) -> Result<(), WorkspaceError>;
}

#[derive(Debug, Clone, Builder)]
#[builder(setter(into))]
pub struct SessionOptions {
    #[builder(default = "DEFAULT_WEBDRIVER_URL.to_string()")]
    webdriver_url: String,
    #[builder(default)]
    headless: bool,
    #[builder(default = "DEFAULT_READY_TIMEOUT")]
    ready_timeout: Duration,
    /// How long element lookups keep retrying before reporting no such element.
    #[builder(default = "DEFAULT_IMPLICIT_WAIT")]
    implicit_wait: Duration,
}

impl SessionOptions {
    pub fn webdriver_url(&self) -> &str {
        &self.webdriver_url
    }

    pub fn ready_timeout(&self) -> Duration {
        self.ready_timeout
    }

    pub fn implicit_wait(&self) -> Duration {
        self.implicit_wait
    }

    fn timeouts(&self) -> TimeoutConfiguration {
        TimeoutConfiguration::new(None, None, Some(self.implicit_wait))
    }

    fn capabilities(&self) -> Map<String, Value> {
        let mut args = vec!["--disable-gpu", "--no-sandbox"];
        if self.headless {
            args.push("--headless");
        }

        let mut caps = Map::new();
        caps.insert("browserName".to_string(), json!("chrome"));
        caps.insert("goog:chromeOptions".to_string(), json!({ "args": args }));
        caps
    }
}

/// A WebDriver session that connects on the first command it is given.
pub struct BrowserSession {
    options: SessionOptions,
    client: Option<Client>,
}

impl BrowserSession {
    pub fn new(options: SessionOptions) -> Self {
        Self {
            options,
            client: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    async fn client(&mut self) -> Result<&Client, WorkspaceError> {
        if self.client.is_none() {
            info!(webdriver = %self.options.webdriver_url, "connecting to webdriver");
            let mut builder = ClientBuilder::native();
            builder.capabilities(self.options.capabilities());
            let client = builder.connect(&self.options.webdriver_url).await?;
            // stored before configuring so close() still releases it on failure
            let client = self.client.insert(client);
            client.update_timeouts(self.options.timeouts()).await?;
        }
        self.client
            .as_ref()
            .ok_or_else(|| WorkspaceError::Browser("webdriver session is not open".to_string()))
    }
}

#[async_trait]
impl WebSession for BrowserSession {
    async fn goto(&mut self, url: &str) -> Result<(), WorkspaceError> {
        self.client().await?.goto(url).await?;
        Ok(())
    }

    async fn fill(&mut self, target: &Target, text: &str) -> Result<(), WorkspaceError> {
        let element = self.client().await?.find(target.locator()).await?;
        element.send_keys(text).await?;
        Ok(())
    }

    async fn click(&mut self, target: &Target) -> Result<(), WorkspaceError> {
        let element = self.client().await?.find(target.locator()).await?;
        element.click().await?;
        Ok(())
    }

    async fn wait_clickable(
        &mut self,
        target: &Target,
        timeout: Duration,
    ) -> Result<(), WorkspaceError> {
        let client = self.client().await?;
        poll_until(target, timeout, || is_clickable(client, target.locator())).await
    }

    async fn title(&mut self) -> Result<String, WorkspaceError> {
        Ok(self.client().await?.title().await?)
    }

    async fn close(&mut self) -> Result<(), WorkspaceError> {
        if let Some(client) = self.client.take() {
            info!("closing webdriver session");
            client.close().await?;
        }
        Ok(())
    }
}

/// Missing elements count as not clickable yet; any other browser error ends the wait.
async fn is_clickable(client: &Client, locator: Locator<'_>) -> Result<bool, WorkspaceError> {
    let element = match client.find(locator).await {
        Ok(element) => element,
        Err(err) if err.is_no_such_element() => return Ok(false),
        Err(err) => return Err(err.into()),
    };
    Ok(element.is_displayed().await? && element.is_enabled().await?)
}

async fn poll_until<F, Fut>(
    target: &Target,
    timeout: Duration,
    mut check: F,
) -> Result<(), WorkspaceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, WorkspaceError>>,
{
    let poll = async {
        while !check().await? {
            tokio::time::sleep(POLL_INTERVAL).await;
        }
        Ok::<_, WorkspaceError>(())
    };
    tokio::time::timeout(timeout, poll)
        .await
        .map_err(|_| WorkspaceError::Timeout {
            target: target.to_string(),
            timeout,
        })?
}

/// Logs in on the ready page and builds the problem metadata from what it shows.
///
/// The session is only borrowed: the caller owns it and must close it whatever
/// this returns. An invalid `ready_url` fails before the session is touched.
pub async fn scrape_and_create_metadata<S>(
    session: &mut S,
    ready_url: &str,
    config: &Configuration,
    timeout: Duration,
) -> Result<ProblemMetadata, WorkspaceError>
where
    S: WebSession + ?Sized,
{
    let mut state = SessionState::NotStarted;
    let result = drive(session, ready_url, config, timeout, &mut state).await;
    if let Err(err) = &result {
        warn!(%state, error = %err, "scrape failed");
        advance(&mut state, SessionState::Failed);
    }
    result
}

async fn drive<S>(
    session: &mut S,
    ready_url: &str,
    config: &Configuration,
    timeout: Duration,
    state: &mut SessionState,
) -> Result<ProblemMetadata, WorkspaceError>
where
    S: WebSession + ?Sized,
{
    validate_ready_url(ready_url)?;

    session.goto(ready_url).await?;
    advance(state, SessionState::Navigated);

    info!(email = config.email(), "logging in");
    session.fill(&EMAIL_FORM, config.email()).await?;
    session.fill(&PASSWORD_FORM, config.password()).await?;
    session.click(&SUBMIT_BUTTON).await?;
    advance(state, SessionState::Authenticated);

    info!(?timeout, "waiting for the problem page to render");
    session.wait_clickable(&PROBLEM_LOADED, timeout).await?;
    advance(state, SessionState::Ready);

    let title = session.title().await?;
    let metadata = create_metadata(&title, ready_url)?;
    advance(state, SessionState::MetadataExtracted);
    info!(
        problem_id = metadata.problem_id(),
        challenge_id = metadata.challenge_id(),
        "scraped metadata"
    );
    Ok(metadata)
}

fn advance(state: &mut SessionState, next: SessionState) {
    info!(from = %state, to = %next, "session state");
    *state = next;
}
