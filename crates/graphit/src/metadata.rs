//! image metadata sources
//!
//! The graph builder only needs the raw label text of an image. Where that text comes from is
//! behind [ImageMetadataSource]: [ContainerCli] asks a docker compatible CLI, [StaticMetadata]
//! serves fixtures.
use indexmap::IndexMap;
use std::process::Command;

pub trait ImageMetadataSource {
    /// Raw label text of `image`, as printed by `{{json .Config.Labels}}`
    fn fetch(&self, image: &str) -> Result<String, FetchError>;
}

/// Reads labels through `docker` (or any CLI with the same `image inspect` and `pull` commands)
#[derive(Debug, Clone)]
pub struct ContainerCli {
    program: String,
}

impl Default for ContainerCli {
    fn default() -> Self {
        Self::new("docker")
    }
}

impl ContainerCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Program taken from `GRAPHIT_RUNTIME`, `docker` if unset
    pub fn from_env() -> Self {
        std::env::var("GRAPHIT_RUNTIME")
            .map(Self::new)
            .unwrap_or_default()
    }

    fn inspect(&self, image: &str) -> Result<String, FetchError> {
        self.run(&[
            "image",
            "inspect",
            "--format",
            "{{json .Config.Labels}}",
            image,
        ])
    }

    fn run(&self, args: &[&str]) -> Result<String, FetchError> {
        tracing::debug!(program=%self.program, ?args, "running");

        let output = Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|source| FetchError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(FetchError::CommandFailed {
                program: self.program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        String::from_utf8(output.stdout).map_err(FetchError::Utf8)
    }
}

impl ImageMetadataSource for ContainerCli {
    /// Inspect the local image, pulling it once if that fails
    fn fetch(&self, image: &str) -> Result<String, FetchError> {
        match self.inspect(image) {
            Ok(labels) => return Ok(labels),
            Err(FetchError::CommandFailed { stderr, .. }) => {
                tracing::info!(image, %stderr, "image not available locally, pulling");
            }
            Err(error) => return Err(error),
        }

        self.run(&["pull", "--quiet", image])?;
        self.inspect(image)
    }
}

/// Label text per image reference, held in memory
#[derive(Debug, Clone, Default)]
pub struct StaticMetadata {
    labels: IndexMap<String, String>,
}

impl StaticMetadata {
    pub fn insert(&mut self, image: impl Into<String>, labels: impl Into<String>) {
        self.labels.insert(image.into(), labels.into());
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for StaticMetadata {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            labels: iter
                .into_iter()
                .map(|(image, labels)| (image.into(), labels.into()))
                .collect(),
        }
    }
}

impl ImageMetadataSource for StaticMetadata {
    fn fetch(&self, image: &str) -> Result<String, FetchError> {
        self.labels
            .get(image)
            .cloned()
            .ok_or_else(|| FetchError::Unavailable(image.to_string()))
    }
}

#[derive(thiserror::Error, Debug)]
pub enum FetchError {
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
    #[error("Labels are not valid utf-8")]
    Utf8(#[source] std::string::FromUtf8Error),
    #[error("No metadata for image `{0}`")]
    Unavailable(String),
}
