//! writing diagrams
use crate::graph::Graph;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

pub trait Render {
    fn render(&self, graph: &Graph, output: &Path) -> Result<(), RenderError>;
}

/// Lays out the graph with a graphviz program
///
/// The format follows the extension of the output path (`svg` when there is none).
/// `.dot` and `.gv` are written as is, without running graphviz.
#[derive(Debug, Clone)]
pub struct Graphviz {
    program: String,
}

impl Default for Graphviz {
    fn default() -> Self {
        Self::new("dot")
    }
}

impl Graphviz {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Program taken from `GRAPHIT_DOT`, `dot` if unset
    pub fn from_env() -> Self {
        std::env::var("GRAPHIT_DOT")
            .map(Self::new)
            .unwrap_or_default()
    }
}

pub fn output_format(output: &Path) -> String {
    output
        .extension()
        .and_then(|extension| extension.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| "svg".to_string())
}

impl Render for Graphviz {
    fn render(&self, graph: &Graph, output: &Path) -> Result<(), RenderError> {
        let format = output_format(output);
        let dot = graph.to_string();
        tracing::info!(path=%output.display(), %format, "rendering diagram");

        if matches!(format.as_str(), "dot" | "gv") {
            std::fs::write(output, dot)?;
            return Ok(());
        }

        let mut child = Command::new(&self.program)
            .arg(format!("-T{format}"))
            .arg("-o")
            .arg(output)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| RenderError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        // stdin is fed from its own thread so stderr is drained while the layout runs
        let writer = child.stdin.take().map(|mut stdin| {
            std::thread::spawn(move || stdin.write_all(dot.as_bytes()))
        });

        let result = child.wait_with_output()?;
        let written = match writer.map(std::thread::JoinHandle::join) {
            Some(Ok(written)) => written,
            Some(Err(_)) => Err(std::io::Error::other("stdin writer panicked")),
            None => Ok(()),
        };

        // an early exit also breaks the pipe, the exit status is the better diagnostic
        if !result.status.success() {
            return Err(RenderError::CommandFailed {
                program: self.program.clone(),
                status: result.status,
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }

        written?;
        Ok(())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    #[error("IO error")]
    IoError(#[from] std::io::Error),
    #[error("Unable to run `{program}`")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{program}` failed ({status}): {stderr}")]
    CommandFailed {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
}
