//! provend - dependency vendoring for compliance-testing profiles
//!
//! A profile is a named bundle of compliance test content whose metadata
//! (`profile.yml`) may declare dependencies on other profiles located on the
//! local filesystem, in git repositories, or behind remote tar/zip archives.
//! provend computes a profile's full dependency closure, fetches each unique
//! source exactly once, caches the payloads, extracts archives into a
//! predictable layout, and records the result in a lockfile (`provend.lock`)
//! so that later operations - execution, packaging, validation - never need
//! network access.
//!
//! # Architecture Overview
//!
//! Control flow for one vendoring run:
//!
//! ```text
//! vendor::vendor_profile
//!   └── resolver::Resolver          builds the dependency plan
//!         └── fetcher::FetcherSet   retrieves payloads by source kind
//!               └── cache::CacheStore   fetch-once, read-many storage
//!         └── archive::extract      normalizes archives to directories
//!   └── lockfile::LockFile          persists the resolved set
//!   └── vendor/ directory on disk   one entry per top-level dependency
//! ```
//!
//! # Key Guarantees
//!
//! - **Fetch-once**: equivalent source descriptors (same kind, locator, and
//!   ref after normalization) are fetched at most once, even across
//!   concurrent resolutions, via per-key locking in the cache store.
//! - **Network-free replay**: a warm cache plus a lockfile lets a profile be
//!   re-vendored with zero network calls.
//! - **All-or-nothing commits**: the vendor tree and lockfile are replaced
//!   atomically; a failed run never corrupts a previously working profile.
//! - **No archives in vendor trees**: every archive payload is extracted;
//!   corrupt archives abort the run with the partial destination removed.
//!
//! # Core Modules
//!
//! - [`cli`] - Command-line interface (`provend vendor`)
//! - [`core`] - Error types and user-facing error reporting
//! - [`profile`] - Profile metadata (`profile.yml`) parsing
//! - [`source`] - Normalized source descriptors and equivalence keys
//! - [`resolver`] - Dependency graph resolution and cycle detection
//! - [`fetcher`] - Local / git / archive fetch strategies
//! - [`cache`] - Shared fetch-once payload cache
//! - [`archive`] - tar / tar.gz / zip extraction
//! - [`lockfile`] - Lockfile serialization (`provend.lock`)
//! - [`vendor`] - The vendoring orchestrator
//! - [`git`] - Git operations via the system git binary
//! - [`utils`] - File system and platform helpers

pub mod archive;
pub mod cache;
pub mod cli;
pub mod core;
pub mod fetcher;
pub mod git;
pub mod lockfile;
pub mod profile;
pub mod resolver;
pub mod source;
pub mod utils;
pub mod vendor;
