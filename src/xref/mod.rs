//! Cross-reference index over the command tree and the hook pipeline that
//! drives its rebuilds.

mod hooks;
mod index;
mod pipeline;

#[cfg(test)]
mod tests;

pub use hooks::{AfterXrefHook, BeforeXrefHook, HookPipeline};
pub use index::{Namespace, XrefError, XrefIndex};
pub use pipeline::Xref;
