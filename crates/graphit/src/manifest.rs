//! LinuxKit manifest model
//!
//! Only the keys needed to draw the diagram are read:
//! - `kernel.image`
//! - `init` (list of image references)
//! - `onboot` and `services` (lists of `{name, image, ...}`)
//! - `files` (list of `{path, ...}`)
//!
//! All of them are required. Other top-level keys are ignored and values are passed through
//! opaquely, an invalid image reference only surfaces once its metadata is fetched.
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::Path;

/// Parsed manifest
///
/// Maps preserve manifest declaration order. Duplicate names (or file paths) replace the
/// earlier entry but keep its position.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    pub kernel_image: String,
    pub init_images: Vec<String>,
    pub onboot: IndexMap<String, Item>,
    pub services: IndexMap<String, Item>,
    pub files: IndexMap<String, FileSpec>,
}

/// An `onboot` or `services` entry
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Item {
    pub name: String,
    /// Image reference, usually `repo:tag`
    pub image: String,
    /// Remaining keys (capabilities, binds overrides, ...), not interpreted
    #[serde(flatten)]
    pub extra: IndexMap<String, serde_yaml::Value>,
}

/// A file injected into the image
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FileSpec {
    pub path: String,
    #[serde(flatten)]
    pub attributes: IndexMap<String, serde_yaml::Value>,
}

impl Manifest {
    pub fn parse(text: &str) -> Result<Self, MalformedManifestError> {
        let root: serde_yaml::Value =
            serde_yaml::from_str(text).map_err(MalformedManifestError::Yaml)?;

        let kernel_image = required(
            root.get("kernel").and_then(|kernel| kernel.get("image")),
            "kernel.image",
        )?;
        let init_images = required(root.get("init"), "init")?;

        let onboot = index_by(required::<Vec<Item>>(root.get("onboot"), "onboot")?, |item| {
            item.name.clone()
        });
        let services = index_by(
            required::<Vec<Item>>(root.get("services"), "services")?,
            |item| item.name.clone(),
        );
        let files = index_by(required::<Vec<FileSpec>>(root.get("files"), "files")?, |file| {
            file.path.clone()
        });

        Ok(Self {
            kernel_image,
            init_images,
            onboot,
            services,
            files,
        })
    }

    pub fn load_file(file_path: &Path) -> Result<Self, LoadError> {
        let file_path = file_path.canonicalize()?;
        tracing::info!(path=%file_path.display(), "loading manifest");

        let file_contents = std::fs::read_to_string(&file_path)?;
        let manifest = Self::parse(&file_contents)?;

        tracing::info!(
            init = manifest.init_images.len(),
            onboot = manifest.onboot.len(),
            services = manifest.services.len(),
            files = manifest.files.len(),
            "manifest loaded"
        );
        Ok(manifest)
    }
}

fn required<T: DeserializeOwned>(
    value: Option<&serde_yaml::Value>,
    key: &'static str,
) -> Result<T, MalformedManifestError> {
    let value = value.ok_or(MalformedManifestError::MissingKey(key))?;
    serde_yaml::from_value(value.clone())
        .map_err(|source| MalformedManifestError::WrongShape { key, source })
}

fn index_by<T>(entries: Vec<T>, key: impl Fn(&T) -> String) -> IndexMap<String, T> {
    let mut map = IndexMap::with_capacity(entries.len());
    for entry in entries {
        let key = key(&entry);
        if map.insert(key.clone(), entry).is_some() {
            tracing::debug!(%key, "duplicate manifest entry replaces earlier one");
        }
    }
    map
}

#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("IO error")]
    IoError(#[from] std::io::Error),
    #[error(transparent)]
    Malformed(#[from] MalformedManifestError),
}

#[derive(thiserror::Error, Debug)]
pub enum MalformedManifestError {
    #[error("Unable to parse yaml")]
    Yaml(#[source] serde_yaml::Error),
    #[error("Missing required key `{0}`")]
    MissingKey(&'static str),
    #[error("Unexpected value for key `{key}`")]
    WrongShape {
        key: &'static str,
        #[source]
        source: serde_yaml::Error,
    },
}
