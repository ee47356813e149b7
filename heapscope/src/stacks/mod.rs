//! # Call-stack interning
//!
//! Two append-only tables turn the tracer's push/pop firehose into
//! compact, stable ids:
//!
//! - [`FrameRegistry`] interns frame descriptors. Tracer-defined frames
//!   arrive with explicit ids; line-patched copies of innermost frames
//!   get ids from a disjoint high range.
//! - [`FrameTree`] interns whole stacks as a prefix-shared tree, so a
//!   million allocations under the same call path cost one node chain.
//!
//! Ids handed out by either table are never reused or reassigned.

pub mod registry;
pub mod tree;

pub use registry::FrameRegistry;
pub use tree::FrameTree;
