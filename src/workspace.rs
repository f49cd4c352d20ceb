use crate::ProblemMetadata;
use anyhow::{bail, Context, Result};
use askama::Template;
use derive_builder::Builder;
use serde::Serialize;
use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    process::Command,
};
use tempfile::NamedTempFile;
use tracing::{info, warn};

pub const METADATA_FILE: &str = "metadata.json";
pub const DEFAULT_WORKSPACE_ROOT: &str = "submit";
pub const DEFAULT_SOURCE_FILE: &str = "Main.py";

#[derive(Template)]
#[template(path = "main.py.j2", escape = "none")]
struct SourceTemplate<'a> {
    metadata: &'a ProblemMetadata,
}

/// Opens the tools a problem is solved with.
pub trait WorkspaceLauncher {
    fn open_editor(&self, path: &Path) -> Result<()>;
    fn open_shell(&self, dir: &Path) -> Result<()>;
}

/// Runs the editor and shell as child processes and waits for each to exit.
#[derive(Debug, Clone)]
pub struct CommandLauncher {
    editor: String,
    shell: String,
}

impl CommandLauncher {
    pub fn new(editor: impl Into<String>, shell: impl Into<String>) -> Self {
        Self {
            editor: editor.into(),
            shell: shell.into(),
        }
    }
}

impl WorkspaceLauncher for CommandLauncher {
    fn open_editor(&self, path: &Path) -> Result<()> {
        let mut command = command_from(&self.editor)?;
        command.arg(path);
        run(command, &self.editor)
    }

    fn open_shell(&self, dir: &Path) -> Result<()> {
        let mut command = command_from(&self.shell)?;
        command.current_dir(dir);
        run(command, &self.shell)
    }
}

fn command_from(line: &str) -> Result<Command> {
    let mut parts = line.split_whitespace();
    let Some(program) = parts.next() else {
        bail!("empty command line");
    };
    let mut command = Command::new(program);
    command.args(parts);
    Ok(command)
}

fn run(mut command: Command, line: &str) -> Result<()> {
    info!(command = line, "launching");
    let status = command
        .status()
        .with_context(|| format!("failed to launch `{line}`"))?;
    if !status.success() {
        warn!(command = line, %status, "command exited unsuccessfully");
    }
    Ok(())
}

/// Where per-problem directories live and what they contain.
#[derive(Debug, Clone, Builder)]
#[builder(setter(into))]
pub struct Scaffold {
    #[builder(default = "PathBuf::from(DEFAULT_WORKSPACE_ROOT)")]
    root: PathBuf,
    #[builder(default = "DEFAULT_SOURCE_FILE.to_string()")]
    source_file: String,
}

/// A problem directory ready to be opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    pub dir: PathBuf,
    pub source: PathBuf,
    pub metadata_written: bool,
    pub source_created: bool,
}

impl Scaffold {
    pub fn problem_dir(&self, metadata: &ProblemMetadata) -> PathBuf {
        self.root.join(metadata.problem_id())
    }

    /// Creates the problem directory, `metadata.json` holding `document`, and the
    /// source file. Files that already exist are left untouched.
    pub fn prepare(
        &self,
        metadata: &ProblemMetadata,
        document: &impl Serialize,
    ) -> Result<Workspace> {
        let dir = self.problem_dir(metadata);
        info!(dir = %dir.display(), "creating problem directory");
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create directory {}", dir.display()))?;

        let metadata_written = write_metadata(&dir, document)?;
        let source = dir.join(&self.source_file);
        let source_created = write_source(&source, metadata)?;

        Ok(Workspace {
            dir,
            source,
            metadata_written,
            source_created,
        })
    }
}

impl Workspace {
    pub fn open(&self, launcher: &impl WorkspaceLauncher) -> Result<()> {
        launcher.open_editor(&self.source)?;
        launcher.open_shell(&self.dir)
    }
}

/// Writes `document` as `metadata.json` in `dir` unless the file already exists.
///
/// Returns whether the file was written.
pub fn write_metadata(dir: &Path, document: &impl Serialize) -> Result<bool> {
    let path = dir.join(METADATA_FILE);
    let content = serde_json::to_string_pretty(document)?;
    let written = create_new(&path, &content)?;
    if written {
        info!(path = %path.display(), "wrote metadata");
    } else {
        info!(path = %path.display(), "metadata already exists, leaving it as-is");
    }
    Ok(written)
}

fn write_source(path: &Path, metadata: &ProblemMetadata) -> Result<bool> {
    let content = SourceTemplate { metadata }.render()?;
    let created = create_new(path, &content)?;
    if created {
        info!(path = %path.display(), "created source file from template");
    }
    Ok(created)
}

/// Writes `content` to `path` only if nothing is there yet.
///
/// The content goes to a temp file next to `path` first, so a failed write never
/// leaves a partial file behind.
fn create_new(path: &Path, content: &str) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut file = NamedTempFile::new_in(dir)
        .with_context(|| format!("failed to create temp file in {}", dir.display()))?;
    file.write_all(content.as_bytes())
        .with_context(|| format!("failed to write {}", path.display()))?;

    match file.persist_noclobber(path) {
        Ok(_) => Ok(true),
        Err(err) if err.error.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(err) => {
            Err(err.error).with_context(|| format!("failed to create {}", path.display()))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::{config::load_document, create_metadata};

    fn metadata() -> ProblemMetadata {
        create_metadata("B106:席替えの席決め", "https://paiza.jp/challenges/123/ready").unwrap()
    }

    #[derive(Default)]
    struct RecordingLauncher {
        opened: RefCell<Vec<(&'static str, PathBuf)>>,
    }

    impl WorkspaceLauncher for RecordingLauncher {
        fn open_editor(&self, path: &Path) -> Result<()> {
            self.opened.borrow_mut().push(("editor", path.to_path_buf()));
            Ok(())
        }

        fn open_shell(&self, dir: &Path) -> Result<()> {
            self.opened.borrow_mut().push(("shell", dir.to_path_buf()));
            Ok(())
        }
    }

    #[test]
    fn write_metadata_should_be_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(METADATA_FILE);

        assert!(write_metadata(dir.path(), &metadata()).unwrap());
        let first = fs::read_to_string(&path).unwrap();

        let other = create_metadata("C001:x", "https://paiza.jp/challenges/9/ready").unwrap();
        assert!(!write_metadata(dir.path(), &metadata()).unwrap());
        assert!(!write_metadata(dir.path(), &other).unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), first);

        let value: serde_json::Value = serde_json::from_str(&first).unwrap();
        assert_eq!(value["problem_id"], "B106");
        assert_eq!(value["challenge_id"], "123");
    }

    #[test]
    fn prepare_should_store_config_document_as_metadata() {
        let root = tempfile::tempdir().unwrap();
        let config_path = root.path().join("config.yaml");
        fs::write(&config_path, "email: me@example.com\npassword: hunter2\n").unwrap();
        let document = load_document(&config_path).unwrap();

        let scaffold = ScaffoldBuilder::default()
            .root(root.path().join("submit"))
            .build()
            .unwrap();
        let workspace = scaffold.prepare(&metadata(), &document).unwrap();
        assert!(workspace.metadata_written);

        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(workspace.dir.join(METADATA_FILE)).unwrap())
                .unwrap();
        assert_eq!(
            written,
            serde_json::json!({ "email": "me@example.com", "password": "hunter2" })
        );
    }

    #[test]
    fn create_new_should_leave_only_the_target_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(METADATA_FILE);

        assert!(create_new(&path, "{}").unwrap());
        let entries = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect::<Vec<_>>();
        assert_eq!(entries, vec![METADATA_FILE]);
        assert_eq!(fs::read_to_string(&path).unwrap(), "{}");
    }

    #[test]
    fn create_new_should_not_create_anything_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join(METADATA_FILE);

        assert!(create_new(&path, "{}").is_err());
        assert!(!path.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn prepare_should_scaffold_problem_dir() {
        let root = tempfile::tempdir().unwrap();
        let scaffold = ScaffoldBuilder::default()
            .root(root.path())
            .build()
            .unwrap();

        let workspace = scaffold.prepare(&metadata(), &metadata()).unwrap();
        assert_eq!(workspace.dir, root.path().join("B106"));
        assert_eq!(workspace.source, root.path().join("B106").join(DEFAULT_SOURCE_FILE));
        assert!(workspace.metadata_written);
        assert!(workspace.source_created);

        let source = fs::read_to_string(&workspace.source).unwrap();
        assert!(source.starts_with("# B106 (challenge 123)\n"));
        assert!(source.contains("https://paiza.jp/challenges/123/ready"));
    }

    #[test]
    fn prepare_should_keep_existing_files() {
        let root = tempfile::tempdir().unwrap();
        let scaffold = ScaffoldBuilder::default()
            .root(root.path())
            .source_file("main.rs")
            .build()
            .unwrap();

        let first = scaffold.prepare(&metadata(), &metadata()).unwrap();
        fs::write(&first.source, "fn main() {}\n").unwrap();

        let second = scaffold.prepare(&metadata(), &metadata()).unwrap();
        assert!(!second.metadata_written);
        assert!(!second.source_created);
        assert_eq!(fs::read_to_string(&second.source).unwrap(), "fn main() {}\n");
    }

    #[test]
    fn open_should_launch_editor_then_shell() {
        let root = tempfile::tempdir().unwrap();
        let scaffold = ScaffoldBuilder::default()
            .root(root.path())
            .build()
            .unwrap();
        let workspace = scaffold.prepare(&metadata(), &metadata()).unwrap();

        let launcher = RecordingLauncher::default();
        workspace.open(&launcher).unwrap();

        assert_eq!(
            launcher.opened.into_inner(),
            vec![
                ("editor", workspace.source.clone()),
                ("shell", workspace.dir.clone()),
            ]
        );
    }

    #[test]
    fn command_from_should_split_arguments() {
        let command = command_from("code --wait").unwrap();
        assert_eq!(command.get_program(), "code");
        assert_eq!(command.get_args().collect::<Vec<_>>(), vec!["--wait"]);
        assert!(command_from("   ").is_err());
    }
}
