//! # graphit - LinuxKit manifest diagrams
//!
//! `graphit` draws a LinuxKit manifest as a dependency diagram: the kernel, the init images, and
//! every onboot and service container hanging off the root filesystem through the bind mounts
//! declared in its image labels.
//!
//! ## Introduction for developers
//!
//! ### Pipeline
//!
//! 1. [manifest::Manifest] is parsed from the YAML manifest. Only `kernel.image`, `init`, `onboot`,
//!    `services` and `files` are read; they are all required.
//! 2. [builder::GraphBuilder] walks the manifest and adds nodes and edges to a [graph::Graph]
//!    (see the [builder] module for the layout of the diagram).
//! 3. For each onboot and service image it asks an [metadata::ImageMetadataSource] for the
//!    image labels and hands them to [binds::parse_binds].
//! 4. The finished graph is handed to a [render::Render] implementation.
//!
//! ### Image labels
//!
//! Given `docker image inspect --format '{{json .Config.Labels}}' linuxkit/getty:v1`
//!
//! ```json
//! {"org.mobyproject.config": "{\"binds\":[\"/etc/resolv.conf:/etc/resolv.conf\"]}"}
//! ```
//!
//! the value of `org.mobyproject.config` is decoded a second time and its `binds` become
//! [binds::NormalizedBind]s:
//!
//! | **bind**                          | **source**  | **dest**    | **rshared** | **rbind** |
//! |-----------------------------------|-------------|-------------|-------------|-----------|
//! | `/var:/var`                       | `/var`      | `/var`      | false       | false     |
//! | `/run:/run:rshared`               | `/run`      | `/run`      | true        | false     |
//! | `/lib/modules:/lib/modules:rbind` | `/lib/modules` | `/lib/modules` | false  | true      |
//! | `/dev:/dev:rshared,rbind`         | `/dev`      | `/dev`      | true        | true      |
//!
//! ### Failures
//!
//! Only the manifest is fatal. An image whose metadata cannot be fetched or decoded is drawn as
//! if it had no binds, so the diagram is always complete.
//!
//! ### Output
//!
//! [graph::Graph] displays as DOT. [render::Graphviz] writes DOT directly or pipes it through
//! graphviz depending on the output file extension.
//!
pub mod binds;
pub mod builder;
pub mod graph;
pub mod manifest;
pub mod metadata;
pub mod render;

/// Build the diagram for `manifest`, reading image labels from `source`
pub fn diagram(
    manifest: &manifest::Manifest,
    source: &dyn metadata::ImageMetadataSource,
) -> graph::Graph {
    builder::GraphBuilder::new(manifest, source).build()
}
