//! # redecl-core
//!
//! Reconstructs C++ header declarations from the DWARF debug information of a
//! compiled binary.
//!
//! The pipeline:
//! - [`loader`] reads `.debug_info` / `.debug_types` into a [`die::DieTree`]
//! - [`context::Context`] walks each compile unit and turns every named,
//!   located declaration into an [`entry::Entry`], merging the copies that
//!   different units carry of the same entity
//! - [`source_file::SourceFile`] renders the entries of one original file as
//!   a header, re-opening namespaces as needed
//! - [`cleanup`] tidies standard library spellings in the rendered text
//!
//! ## Example
//!
//! ```rust,no_run
//! let tree = redecl_core::loader::load_file("build/game")?;
//! let context = redecl_core::reconstruct(&tree);
//! for (path, text) in context.headers(None) {
//!     println!("// {path}\n{}", redecl_core::cleanup::clean(&text));
//! }
//! # Ok::<(), redecl_core::RedeclError>(())
//! ```

pub mod cleanup;
pub mod context;
pub mod die;
pub mod entry;
pub mod error;
pub mod loader;
pub mod path;
pub mod source_file;
pub mod type_printer;

pub use context::Context;
pub use die::{DieId, DieTree};
// Re-export commonly used types
pub use error::{RedeclError, Result};
use tracing::{debug, warn};

/// Walk every compile unit of `tree` into a fresh [`Context`].
///
/// A unit that fails with a reader error is abandoned (whatever it already
/// registered stays) and the run moves on to the next unit.
pub fn reconstruct(tree: &DieTree) -> Context
{
    let mut context = Context::new();
    let total = tree.units().len();
    for (index, unit) in tree.units().iter().enumerate() {
        debug!("[{}/{total}] compile unit", index + 1);
        if let Err(err) = context.update(tree, unit) {
            warn!("Compile unit {}/{total} aborted: {err}", index + 1);
        }
    }
    context
}
