//! mockshift rewrites JMockit recording blocks (`new Expectations() {{ .. }}`
//! and its siblings) in Java test sources into Mockito stubbing and
//! verification calls.
//!
//! The crate is layered:
//!
//! - [`syntax`] and [`ast`]: a pest-based Java front end and the tree it builds.
//! - [`bindings`]: best-effort type information and mock declarations.
//! - [`rewrite`]: the engine, a pure tree-to-tree function per method.
//! - [`engine`], [`discovery`] and [`cli`]: the host that reads files, splices
//!   rewritten text and reports diagnostics.

pub mod ast;
pub mod bindings;
pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod discovery;
pub mod engine;
pub mod errors;
pub mod rewrite;
pub mod syntax;

#[cfg(test)]
pub(crate) mod test_support;

pub use errors::MockshiftError;
