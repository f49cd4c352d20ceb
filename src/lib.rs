pub mod config;
pub mod error;
pub mod paiza;
pub mod session;
pub mod workspace;

pub use config::Configuration;
pub use error::WorkspaceError;
pub use paiza::{
    create_metadata, metadata_from_page, parse_challenge_id, parse_problem_id, title_from_html,
    validate_ready_url, ProblemMetadata,
};
pub use session::{scrape_and_create_metadata, BrowserSession, SessionOptionsBuilder, WebSession};
pub use workspace::{CommandLauncher, ScaffoldBuilder, Workspace, WorkspaceLauncher};
