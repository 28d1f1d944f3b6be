//! bind mount discovery from image labels
//!
//! LinuxKit images describe their runtime configuration in the `org.mobyproject.config` label.
//! The label value is itself a JSON document, for example:
//!
//! ```json
//! {"binds": ["/etc/resolv.conf:/etc/resolv.conf:rbind", "/var:/var"], "mounts": [...]}
//! ```
//!
//! Each bind is `source:dest[:flags]`. Only binds are read, `mounts` (tmpfs, volumes, ...) are not.
use indexmap::IndexMap;
use serde::Deserialize;

/// Label holding the image runtime configuration
pub const CONFIG_LABEL: &str = "org.mobyproject.config";

/// Normalized binds keyed by source path, in label order
pub type Binds = IndexMap<String, NormalizedBind>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedBind {
    pub source: String,
    pub dest: String,
    /// `rshared`
    pub shared_propagation: bool,
    /// `rbind`
    pub recursive_bind: bool,
}

/// Recognized values of the flags segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindFlags {
    None,
    Shared,
    Bind,
    SharedAndBind,
}

impl BindFlags {
    /// Classify a flags segment, `None` for anything that is not an exact match
    pub fn classify(segment: &str) -> Option<Self> {
        match segment {
            "rshared" => Some(Self::Shared),
            "rbind" => Some(Self::Bind),
            "rshared,rbind" | "rbind,rshared" => Some(Self::SharedAndBind),
            _ => None,
        }
    }

    pub fn shared_propagation(self) -> bool {
        matches!(self, Self::Shared | Self::SharedAndBind)
    }

    pub fn recursive_bind(self) -> bool {
        matches!(self, Self::Bind | Self::SharedAndBind)
    }
}

impl std::str::FromStr for NormalizedBind {
    type Err = BindEntryError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let segments: Vec<&str> = spec.split(':').collect();
        let [source, dest, rest @ ..] = segments.as_slice() else {
            return Err(BindEntryError::TooFewSegments(spec.to_string()));
        };

        let flags = match rest.first() {
            None => BindFlags::None,
            Some(segment) => BindFlags::classify(segment)
                .ok_or_else(|| BindEntryError::UnrecognizedFlags(segment.to_string()))?,
        };

        Ok(Self {
            source: source.to_string(),
            dest: dest.to_string(),
            shared_propagation: flags.shared_propagation(),
            recursive_bind: flags.recursive_bind(),
        })
    }
}

#[derive(Deserialize)]
struct ImageConfig {
    /// Entries are checked one by one, a bad entry must not hide the others
    binds: Option<Vec<serde_json::Value>>,
}

/// Parse the raw label text (`{{json .Config.Labels}}`) of an image into its binds
///
/// Missing or `null` `binds` is not an error. Entries that are not strings, malformed entries and
/// entries with unrecognized flags are skipped with a warning; a later entry with the same source
/// replaces an earlier one.
pub fn parse_binds(raw_label_text: &str) -> Result<Binds, LabelDecodeError> {
    let labels: serde_json::Value =
        serde_json::from_str(raw_label_text).map_err(LabelDecodeError::OuterJson)?;

    let config = labels
        .get(CONFIG_LABEL)
        .ok_or(LabelDecodeError::MissingLabel)?
        .as_str()
        .ok_or(LabelDecodeError::NotAString)?;

    let config: ImageConfig =
        serde_json::from_str(config).map_err(LabelDecodeError::InnerJson)?;

    let mut binds = Binds::new();
    for entry in config.binds.unwrap_or_default() {
        let Some(spec) = entry.as_str() else {
            let error = BindEntryError::NotAString(entry.to_string());
            tracing::warn!(%error, "skipping bind");
            continue;
        };

        match spec.parse::<NormalizedBind>() {
            Ok(bind) => {
                tracing::trace!(?bind, "bind");
                binds.insert(bind.source.clone(), bind);
            }
            // TODO: decide whether unrecognized flags (e.g. `ro`) should keep the bind with
            // default flags instead of dropping it
            Err(error) => tracing::warn!(%spec, %error, "skipping bind"),
        }
    }

    Ok(binds)
}

#[derive(thiserror::Error, Debug)]
pub enum LabelDecodeError {
    #[error("Labels are not valid json")]
    OuterJson(#[source] serde_json::Error),
    #[error("Label `{}` not found", CONFIG_LABEL)]
    MissingLabel,
    #[error("Label `{}` is not a string", CONFIG_LABEL)]
    NotAString,
    #[error("Label `{}` is not a valid json configuration", CONFIG_LABEL)]
    InnerJson(#[source] serde_json::Error),
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum BindEntryError {
    #[error("expected `source:dest[:flags]`, got `{0}`")]
    TooFewSegments(String),
    #[error("unrecognized bind flags `{0}`")]
    UnrecognizedFlags(String),
    #[error("expected a string, got `{0}`")]
    NotAString(String),
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Wrap binds the way a runtime reports the labels of a LinuxKit image
    fn labels(binds: &[&str]) -> String {
        let config = serde_json::json!({ "binds": binds, "mounts": [] }).to_string();
        serde_json::json!({ CONFIG_LABEL: config, "org.opencontainers.image.title": "x" })
            .to_string()
    }

    fn bind(source: &str, dest: &str, shared: bool, recursive: bool) -> NormalizedBind {
        NormalizedBind {
            source: source.into(),
            dest: dest.into(),
            shared_propagation: shared,
            recursive_bind: recursive,
        }
    }

    #[test]
    fn two_segments_default_flags() {
        let binds = parse_binds(&labels(&["/var:/var/lib"])).unwrap();
        assert_eq!(
            binds.values().collect::<Vec<_>>(),
            vec![&bind("/var", "/var/lib", false, false)]
        );
    }

    #[test]
    fn flag_combinations() {
        let cases = [
            ("rshared", true, false),
            ("rbind", false, true),
            ("rshared,rbind", true, true),
            ("rbind,rshared", true, true),
        ];

        for (flags, shared, recursive) in cases {
            let binds = parse_binds(&labels(&[format!("/a:/b:{flags}").as_str()])).unwrap();
            assert_eq!(binds["/a"], bind("/a", "/b", shared, recursive), "{flags}");
        }
    }

    #[test]
    fn resolv_conf() {
        let binds = parse_binds(&labels(&["/etc/resolv.conf:/etc/resolv.conf:rbind"])).unwrap();
        assert_eq!(
            binds["/etc/resolv.conf"],
            bind("/etc/resolv.conf", "/etc/resolv.conf", false, true)
        );
    }

    #[test]
    fn unrecognized_flags_drop_the_bind() {
        let binds = parse_binds(&labels(&["/a:/b:bogus", "/c:/d:ro", "/e:/f"])).unwrap();
        assert_eq!(binds.keys().collect::<Vec<_>>(), vec!["/e"]);
    }

    #[test]
    fn malformed_entry_is_skipped() {
        let binds = parse_binds(&labels(&["/just-a-path", "/e:/f"])).unwrap();
        assert_eq!(binds.keys().collect::<Vec<_>>(), vec!["/e"]);
    }

    #[test]
    fn non_string_entry_is_skipped() {
        let text = serde_json::json!({
            CONFIG_LABEL: r#"{"binds":["/a:/b",42,null,{"source":"/c"}]}"#
        })
        .to_string();

        let binds = parse_binds(&text).unwrap();
        assert_eq!(binds.keys().collect::<Vec<_>>(), vec!["/a"]);
        assert_eq!(binds["/a"], bind("/a", "/b", false, false));
    }

    #[test]
    fn null_binds() {
        let text = serde_json::json!({ CONFIG_LABEL: r#"{"binds":null,"mounts":[]}"# }).to_string();
        assert!(parse_binds(&text).unwrap().is_empty());
    }

    #[test]
    fn same_source_last_wins() {
        let binds = parse_binds(&labels(&["/a:/first", "/b:/b", "/a:/second:rshared"])).unwrap();
        assert_eq!(binds.len(), 2);
        assert_eq!(binds["/a"], bind("/a", "/second", true, false));
    }

    #[test]
    fn no_binds_key() {
        let config = serde_json::json!({ "capabilities": ["all"] }).to_string();
        let text = serde_json::json!({ CONFIG_LABEL: config }).to_string();
        assert!(parse_binds(&text).unwrap().is_empty());
    }

    #[test]
    fn decode_errors() {
        assert!(matches!(
            parse_binds("not json"),
            Err(LabelDecodeError::OuterJson(_))
        ));
        assert!(matches!(
            parse_binds("null"),
            Err(LabelDecodeError::MissingLabel)
        ));
        assert!(matches!(
            parse_binds(r#"{"other": "x"}"#),
            Err(LabelDecodeError::MissingLabel)
        ));
        assert!(matches!(
            parse_binds(r#"{"org.mobyproject.config": 42}"#),
            Err(LabelDecodeError::NotAString)
        ));
        assert!(matches!(
            parse_binds(r#"{"org.mobyproject.config": "{broken"}"#),
            Err(LabelDecodeError::InnerJson(_))
        ));
    }

    #[test]
    fn entry_errors() {
        assert_eq!(
            "/only".parse::<NormalizedBind>(),
            Err(BindEntryError::TooFewSegments("/only".into()))
        );
        assert_eq!(
            "/a:/b:rw".parse::<NormalizedBind>(),
            Err(BindEntryError::UnrecognizedFlags("rw".into()))
        );
    }
}
