// src/select/mod.rs

//! Which units take part in an invocation.
//!
//! - [`filter`] picks the roots (tag include/exclude, scope, changed-only).
//! - [`expand`] pulls in what the roots `want` and what is `wanted_by` them.

pub mod expand;
pub mod filter;

pub use expand::{expand_selection, Expansion};
pub use filter::{validate_tag_name, Selector, TagFilter};
