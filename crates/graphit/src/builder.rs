//! diagram construction
//!
//! The diagram is built in four stages, each adding to the same [Graph]:
//!
//! 1. kernel: a single `kernel` node labeled with the kernel image
//! 2. init: a `rootfs` node, `kernel -> rootfs` and `<init image> -> rootfs` per init image
//! 3. onboot (red): one node per item, connected to `rootfs` through its bind mounts
//! 4. services (blue): same as onboot
//!
//! A bind is drawn as two hops, `rootfs -> <dest> -> <item>`, with the rootfs edge labeled by the
//! bind source and flags. Items without binds get a direct `rootfs -> <item>` edge. Mount point
//! nodes are shared when several items bind the same destination.
use crate::binds::{parse_binds, Binds};
use crate::graph::{sanitize, Graph};
use crate::manifest::{Item, Manifest};
use crate::metadata::ImageMetadataSource;
use indexmap::IndexMap;
use std::collections::HashMap;

pub const KERNEL: &str = "kernel";
pub const ROOTFS: &str = "rootfs";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Onboot,
    Service,
}

impl Category {
    pub fn color(self) -> &'static str {
        match self {
            Category::Onboot => "red",
            Category::Service => "blue",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::Onboot => f.write_str("onboot"),
            Category::Service => f.write_str("service"),
        }
    }
}

/// Node id of an onboot or service item: `name`, a line break, the sanitized image
pub fn item_node_id(item: &Item) -> String {
    format!("{}\n{}", item.name, sanitize(&item.image))
}

#[derive(derive_new::new)]
pub struct GraphBuilder<'a> {
    manifest: &'a Manifest,
    source: &'a dyn ImageMetadataSource,

    /// Binds per image reference, each image is asked for at most once
    #[new(default)]
    resolved: HashMap<String, Binds>,

    #[new(default)]
    graph: Graph,
}

impl<'a> GraphBuilder<'a> {
    pub fn build(mut self) -> Graph {
        self.add_kernel();
        self.add_init();

        let manifest = self.manifest;
        self.add_items(&manifest.onboot, Category::Onboot);
        self.add_items(&manifest.services, Category::Service);

        self.graph
    }

    fn add_kernel(&mut self) {
        self.graph
            .add_node(KERNEL, [("label", sanitize(&self.manifest.kernel_image))]);
    }

    fn add_init(&mut self) {
        self.graph.add_node(ROOTFS, [("label", "RootFS".to_string())]);
        self.graph.add_edge(KERNEL, ROOTFS, []);

        for image in &self.manifest.init_images {
            let id = sanitize(image);
            self.graph.add_node(id.clone(), []);
            self.graph.add_edge(id, ROOTFS, []);
        }
    }

    fn add_items(&mut self, items: &IndexMap<String, Item>, category: Category) {
        let color = || ("color", category.color().to_string());

        for item in items.values() {
            tracing::info!(%category, name=%item.name, image=%item.image, "adding item");

            let item_id = item_node_id(item);
            self.graph.add_node(item_id.clone(), [color()]);

            let binds = self.resolve_binds(&item.image);
            if binds.is_empty() {
                self.graph.add_edge(ROOTFS, item_id, [color()]);
                continue;
            }

            for bind in binds.values() {
                let mount_point = sanitize(&bind.dest);
                let label = format!(
                    "{}\nrshared={}\nrbind={}",
                    bind.source, bind.shared_propagation, bind.recursive_bind
                );

                self.graph.add_node(mount_point.clone(), [color()]);
                self.graph
                    .add_edge(ROOTFS, mount_point.clone(), [color(), ("label", label)]);
                self.graph.add_edge(mount_point, item_id.clone(), [color()]);
            }
        }
    }

    /// Binds of `image`, empty when the metadata cannot be fetched or decoded
    fn resolve_binds(&mut self, image: &str) -> Binds {
        if let Some(binds) = self.resolved.get(image) {
            return binds.clone();
        }

        let binds = match self.source.fetch(image) {
            Err(error) => {
                tracing::warn!(
                    image,
                    error = %ErrorChain(&error),
                    "unable to fetch image metadata, assuming no binds"
                );
                Binds::new()
            }
            Ok(labels) => parse_binds(&labels).unwrap_or_else(|error| {
                tracing::warn!(
                    image,
                    error = %ErrorChain(&error),
                    "unable to decode image labels, assuming no binds"
                );
                Binds::new()
            }),
        };

        tracing::debug!(image, binds = binds.len(), "resolved binds");
        self.resolved.insert(image.to_string(), binds.clone());
        binds
    }
}

/// Displays an error followed by its sources
struct ErrorChain<'e>(&'e dyn std::error::Error);

impl std::fmt::Display for ErrorChain<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)?;
        let mut source = self.0.source();
        while let Some(error) = source {
            write!(f, ": {error}")?;
            source = error.source();
        }
        Ok(())
    }
}
