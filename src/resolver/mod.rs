//! Dependency graph resolution.
//!
//! The resolver walks a profile's declared dependencies depth-first in
//! declaration order, driving the [`FetcherSet`] as it goes - a remote
//! dependency's own metadata can only be read after its payload is fetched.
//! Sibling dependencies are resolved concurrently (network parallelism is
//! bounded inside the fetcher set); the produced plan is deterministic
//! regardless of completion order.
//!
//! Cycle detection keeps the set of descriptor equivalence keys along the
//! *current resolution path*: a key reappearing on its own path fails the run
//! with [`ProvendError::CyclicDependency`] naming the cycle, before any
//! network fetch of the repeated node. Two siblings with equivalent
//! descriptors are not a cycle - they share one fetch through the cache and
//! become two named entries in the plan.
//!
//! The finished [`ResolutionPlan`] stores nodes in an arena
//! ([`petgraph::graph::DiGraph`]) addressed by index, with edges recording
//! the parent/child structure; nothing holds raw shared references.

use anyhow::{Context, Result};
use futures::FutureExt;
use futures::future::BoxFuture;
use petgraph::graph::{DiGraph, NodeIndex};
use std::path::{Path, PathBuf};

use crate::core::ProvendError;
use crate::fetcher::FetcherSet;
use crate::lockfile::LockEntry;
use crate::profile::{DependencyDecl, Metadata, find_profile_root};
use crate::source::SourceDescriptor;

/// One fully resolved dependency in the plan arena.
#[derive(Debug)]
pub struct ResolvedNode {
    /// Full dependency name; nested dependencies are namespaced `parent/child`
    pub name: String,
    /// Normalized source descriptor
    pub descriptor: SourceDescriptor,
    /// Concrete commit id actually fetched (git sources only)
    pub resolved_ref: Option<String>,
    /// Payload digest, `sha256:` prefixed
    pub digest: String,
    /// Ready-to-use payload location
    pub content_path: PathBuf,
    /// Child nodes, in declaration order
    pub children: Vec<NodeIndex>,
}

/// In-memory result of resolving one profile, transferred to the lockfile
/// codec and the vendoring orchestrator. Discarded after the run.
#[derive(Debug)]
pub struct ResolutionPlan {
    graph: DiGraph<ResolvedNode, ()>,
    roots: Vec<NodeIndex>,
}

impl ResolutionPlan {
    /// Top-level dependency nodes, in declaration order.
    pub fn top_level(&self) -> impl Iterator<Item = &ResolvedNode> {
        self.roots.iter().map(|&index| &self.graph[index])
    }

    /// Total number of resolved nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    /// Whether the profile has no dependencies at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Lock entries in resolution order: declaration order, parents before
    /// their children.
    #[must_use]
    pub fn lock_entries(&self) -> Vec<LockEntry> {
        let mut entries = Vec::with_capacity(self.len());
        for &root in &self.roots {
            self.collect_entries(root, &mut entries);
        }
        entries
    }

    fn collect_entries(&self, index: NodeIndex, entries: &mut Vec<LockEntry>) {
        let node = &self.graph[index];
        entries.push(LockEntry {
            name: node.name.clone(),
            kind: node.descriptor.kind(),
            locator: node.descriptor.locator().to_string(),
            reference: node.descriptor.reference().map(str::to_string),
            resolved_ref: node.resolved_ref.clone(),
            digest: node.digest.clone(),
        });
        for &child in &node.children {
            self.collect_entries(child, entries);
        }
    }
}

/// An in-flight subtree, assembled into the plan arena once resolution
/// completes. Keeping resolution results in plain owned trees avoids sharing
/// the graph across concurrent sibling tasks.
struct ResolvedTree {
    name: String,
    descriptor: SourceDescriptor,
    resolved_ref: Option<String>,
    digest: String,
    content_path: PathBuf,
    children: Vec<ResolvedTree>,
}

/// Walks a profile's dependency declarations and produces a resolution plan.
pub struct Resolver<'a> {
    fetchers: &'a FetcherSet,
}

impl<'a> Resolver<'a> {
    /// Creates a resolver over the given fetcher set.
    #[must_use]
    pub const fn new(fetchers: &'a FetcherSet) -> Self {
        Self { fetchers }
    }

    /// Resolves the full dependency closure of a profile.
    pub async fn resolve(&self, profile_dir: &Path, metadata: &Metadata) -> Result<ResolutionPlan> {
        let trees = self
            .resolve_level(&metadata.depends, profile_dir, String::new(), Vec::new())
            .await?;

        let mut graph = DiGraph::new();
        let roots = trees
            .into_iter()
            .map(|tree| add_tree(&mut graph, tree))
            .collect();

        Ok(ResolutionPlan { graph, roots })
    }

    /// Resolves one level of sibling declarations concurrently, preserving
    /// declaration order in the result.
    fn resolve_level<'b>(
        &'b self,
        decls: &'b [DependencyDecl],
        base_dir: &'b Path,
        prefix: String,
        ancestors: Vec<(String, String)>,
    ) -> BoxFuture<'b, Result<Vec<ResolvedTree>>> {
        async move {
            let siblings = decls.iter().map(|decl| {
                self.resolve_one(decl, base_dir, prefix.clone(), ancestors.clone())
            });
            futures::future::try_join_all(siblings).await
        }
        .boxed()
    }

    async fn resolve_one(
        &self,
        decl: &DependencyDecl,
        base_dir: &Path,
        prefix: String,
        ancestors: Vec<(String, String)>,
    ) -> Result<ResolvedTree> {
        let full_name = if prefix.is_empty() {
            decl.name.clone()
        } else {
            format!("{prefix}/{}", decl.name)
        };

        let descriptor = SourceDescriptor::from_decl(decl, base_dir)?;
        let key = descriptor.cache_key();

        if ancestors.iter().any(|(_, ancestor_key)| *ancestor_key == key) {
            let mut names: Vec<&str> = ancestors.iter().map(|(name, _)| name.as_str()).collect();
            names.push(&decl.name);
            return Err(ProvendError::CyclicDependency {
                chain: names.join(" -> "),
            }
            .into());
        }

        let fetched = self
            .fetchers
            .fetch(&full_name, &descriptor)
            .await
            .with_context(|| format!("Failed to resolve dependency '{full_name}' ({descriptor})"))?;

        // Recurse into profile-like payloads: a directory whose root (or
        // single wrapper directory) carries profile metadata.
        let children = if fetched.content_path.is_dir() {
            match find_profile_root(&fetched.content_path) {
                Some(nested_root) => {
                    let nested = Metadata::load_from_dir(&nested_root).with_context(|| {
                        format!("Invalid metadata in dependency '{full_name}'")
                    })?;
                    let mut path_chain = ancestors;
                    path_chain.push((decl.name.clone(), key));
                    self.resolve_level(&nested.depends, &nested_root, full_name.clone(), path_chain)
                        .await?
                }
                None => Vec::new(),
            }
        } else {
            Vec::new()
        };

        Ok(ResolvedTree {
            name: full_name,
            descriptor,
            resolved_ref: fetched.resolved_ref,
            digest: fetched.digest,
            content_path: fetched.content_path,
            children,
        })
    }
}

/// Moves a resolved subtree into the arena, preorder, returning its index.
fn add_tree(graph: &mut DiGraph<ResolvedNode, ()>, tree: ResolvedTree) -> NodeIndex {
    let index = graph.add_node(ResolvedNode {
        name: tree.name,
        descriptor: tree.descriptor,
        resolved_ref: tree.resolved_ref,
        digest: tree.digest,
        content_path: tree.content_path,
        children: Vec::new(),
    });

    let children: Vec<NodeIndex> = tree
        .children
        .into_iter()
        .map(|child| add_tree(graph, child))
        .collect();

    for &child in &children {
        graph.add_edge(index, child, ());
    }
    graph[index].children = children;

    index
}
