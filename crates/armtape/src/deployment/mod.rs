//! Web site deployment script generation.
//!
//! Produces a Kudu-style deployment script (`deploy.cmd` or `deploy.sh`) and
//! the `.deployment` descriptor that points the deployment engine at it.

mod templates;

use crate::error::{HarnessError, HarnessResult};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the descriptor file written next to the script.
pub const DEPLOYMENT_FILE: &str = ".deployment";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ScriptType {
    #[default]
    Batch,
    Bash,
}

impl ScriptType {
    pub fn parse(value: &str) -> HarnessResult<Self> {
        match value.to_ascii_lowercase().as_str() {
            "batch" => Ok(Self::Batch),
            "bash" => Ok(Self::Bash),
            other => Err(HarnessError::cli_invalid_arg(format!(
                "script type should be batch or bash, got '{other}'"
            ))),
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            Self::Batch => "deploy.cmd",
            Self::Bash => "deploy.sh",
        }
    }

    fn command(self) -> String {
        match self {
            Self::Batch => self.file_name().to_string(),
            Self::Bash => format!("bash {}", self.file_name()),
        }
    }
}

/// Kind of web site the script deploys.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProjectKind {
    Basic,
    Php,
    Python,
    Node,
    AspWebSite,
    /// .NET web application project, relative to the repository root.
    AspWap { project_file: String },
}

impl ProjectKind {
    /// Label used in "Generating deployment script for ..." output.
    pub fn site_label(&self) -> &'static str {
        match self {
            Self::Basic | Self::Php => "Web Site",
            Self::Python => "Python Web Site",
            Self::Node => "node.js Web Site",
            Self::AspWebSite => ".NET Web Site",
            Self::AspWap { .. } => ".NET Web Application",
        }
    }

    pub(crate) fn handling_message(&self) -> &'static str {
        match self {
            Self::Basic | Self::Php => "Handling Basic Web Site deployment.",
            Self::Python => "Handling python deployment.",
            Self::Node => "Handling node.js deployment.",
            Self::AspWebSite => "Handling .NET Web Site deployment.",
            Self::AspWap { .. } => "Handling .NET Web Application deployment.",
        }
    }
}

/// Mode selectors as given on the command line.
///
/// `asp_wap` is `Some(None)` when the flag was passed without its project
/// file argument.
#[derive(Clone, Debug, Default)]
pub struct ModeFlags {
    pub asp_wap: Option<Option<String>>,
    pub asp_web_site: bool,
    pub node: bool,
    pub php: bool,
    pub python: bool,
    pub basic: bool,
}

impl ModeFlags {
    /// The single selected kind, `None` when no selector was given.
    pub fn resolve(&self) -> HarnessResult<Option<ProjectKind>> {
        let selected: Vec<&str> = [
            (self.asp_wap.is_some(), "--aspWAP"),
            (self.asp_web_site, "--aspWebSite"),
            (self.node, "--node"),
            (self.php, "--php"),
            (self.python, "--python"),
            (self.basic, "--basic"),
        ]
        .into_iter()
        .filter_map(|(set, flag)| set.then_some(flag))
        .collect();
        if selected.len() > 1 {
            return Err(HarnessError::cli_invalid_arg(
                "specify only one of these flags: --aspWAP, --aspWebSite, --node, --php, --python, --basic",
            ));
        }
        if let Some(project_file) = &self.asp_wap {
            return match project_file.as_deref().map(str::trim) {
                Some(path) if !path.is_empty() => Ok(Some(ProjectKind::AspWap {
                    project_file: path.to_string(),
                })),
                _ => Err(HarnessError::cli_invalid_arg(
                    "--aspWAP: argument missing, specify the project file path",
                )),
            };
        }
        Ok(if self.asp_web_site {
            Some(ProjectKind::AspWebSite)
        } else if self.node {
            Some(ProjectKind::Node)
        } else if self.php {
            Some(ProjectKind::Php)
        } else if self.python {
            Some(ProjectKind::Python)
        } else if self.basic {
            Some(ProjectKind::Basic)
        } else {
            None
        })
    }
}

#[derive(Clone, Debug)]
pub struct ScriptOptions {
    pub repository_root: PathBuf,
    /// `None` infers the kind from the repository contents.
    pub project: Option<ProjectKind>,
    pub solution_file: Option<String>,
    pub script_type: ScriptType,
    /// Replace existing files instead of failing.
    pub overwrite: bool,
}

/// Files written by [`generate`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratedScript {
    pub project: ProjectKind,
    pub script_path: PathBuf,
    pub deployment_path: PathBuf,
}

impl GeneratedScript {
    /// `deploy.cmd and .deployment`
    pub fn describe_files(&self) -> String {
        let script = self
            .script_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!("{script} and {DEPLOYMENT_FILE}")
    }
}

/// Infer the project kind from well-known files in `root`.
pub fn detect_project_kind(root: &Path) -> ProjectKind {
    if has_node_entry_point(root) {
        ProjectKind::Node
    } else if root.join("requirements.txt").is_file() {
        ProjectKind::Python
    } else if root.join("index.php").is_file() {
        ProjectKind::Php
    } else {
        ProjectKind::Basic
    }
}

fn has_node_entry_point(root: &Path) -> bool {
    root.join("server.js").is_file() || root.join("app.js").is_file()
}

pub fn generate(options: &ScriptOptions) -> HarnessResult<GeneratedScript> {
    let root = &options.repository_root;
    if !root.is_dir() {
        return Err(HarnessError::cli_invalid_arg(format!(
            "repository root {} does not exist or is not a directory",
            root.display()
        )));
    }
    let project = match &options.project {
        Some(kind) => kind.clone(),
        None => detect_project_kind(root),
    };
    validate_project(root, &project, options.solution_file.as_deref())?;

    let script_path = root.join(options.script_type.file_name());
    let deployment_path = root.join(DEPLOYMENT_FILE);
    if !options.overwrite {
        for path in [&script_path, &deployment_path] {
            if path.exists() {
                return Err(HarnessError::cli_invalid_arg(format!(
                    "{} already exists, use -y to overwrite",
                    path.display()
                )));
            }
        }
    }

    let script = templates::render(
        &project,
        options.script_type,
        options.solution_file.as_deref(),
    );
    write_file(&script_path, &script)?;
    write_file(
        &deployment_path,
        &format!("[config]\ncommand = {}\n", options.script_type.command()),
    )?;
    debug!(
        root = %root.display(),
        project = ?project,
        script = %script_path.display(),
        "generated deployment script"
    );
    Ok(GeneratedScript {
        project,
        script_path,
        deployment_path,
    })
}

fn validate_project(root: &Path, project: &ProjectKind, solution: Option<&str>) -> HarnessResult<()> {
    match project {
        ProjectKind::Node if !has_node_entry_point(root) => {
            return Err(HarnessError::cli_invalid_arg(
                "Missing server.js/app.js file, node.js sites require one of them in the repository root",
            ));
        }
        ProjectKind::AspWap { project_file } if !root.join(project_file).exists() => {
            return Err(HarnessError::cli_invalid_arg(format!(
                "project file {project_file} does not exist"
            )));
        }
        _ => {}
    }
    if let Some(solution) = solution {
        if !root.join(solution).is_file() {
            return Err(HarnessError::cli_invalid_arg(format!(
                "solution file {solution} does not exist"
            )));
        }
    }
    Ok(())
}

fn write_file(path: &Path, contents: &str) -> HarnessResult<()> {
    fs::write(path, contents)
        .map_err(|err| HarnessError::io(format!("failed to write {}", path.display()), err))
}
