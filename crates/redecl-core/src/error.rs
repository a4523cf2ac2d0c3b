//! # Error Types
//!
//! General error handling for declaration reconstruction.
//!
//! We use `thiserror` to automatically generate `Error` trait implementations
//! and nice error messages.

use thiserror::Error;

/// Main error type for redecl operations
///
/// Errors fall into two groups, which decide how far a failure propagates
/// during a run:
///
/// 1. **Reader errors**: Dwarf, Object, MalformedReference, Io. The debug
///    information itself is broken; the walk of the current compile unit stops.
/// 2. **Decode errors**: UnknownAccess, UnknownVirtuality, InvalidArgument. A
///    single node carries a value we do not understand; only the subtree of
///    that node is abandoned.
///
/// Neither group ever aborts a whole run. See [`RedeclError::is_unit_fatal`].
#[derive(Error, Debug)]
pub enum RedeclError
{
    /// gimli failed while decoding a DWARF section
    #[error("DWARF error while {context}: {source}")]
    Dwarf
    {
        /// What we were doing when the error happened
        context: String,
        /// The underlying gimli error
        #[source]
        source: gimli::Error,
    },

    /// The input is not an object file we can read
    #[error("Failed to parse object file: {0}")]
    Object(String),

    /// A node references an offset that doesn't belong to any loaded entry
    ///
    /// The offset is the section offset of the node holding the reference.
    #[error("Malformed reference in entry at 0x{offset:x}")]
    MalformedReference
    {
        /// Section offset of the referring entry
        offset: u64,
    },

    /// `DW_AT_accessibility` holds a value outside public/protected/private
    #[error("Unknown access specifier: {0}")]
    UnknownAccess(u64),

    /// `DW_AT_virtuality` holds a value outside none/virtual/pure virtual
    #[error("Unknown virtuality: {0}")]
    UnknownVirtuality(u64),

    /// Invalid argument passed to a redecl function
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// I/O error (reading the input binary)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RedeclError
{
    /// Whether this error stops the walk of the whole compile unit.
    ///
    /// Decode errors only abandon the offending node and its children.
    pub fn is_unit_fatal(&self) -> bool
    {
        !matches!(
            self,
            RedeclError::UnknownAccess(_) | RedeclError::UnknownVirtuality(_) | RedeclError::InvalidArgument(_)
        )
    }
}

/// Wrap a gimli error with a description of the operation that failed.
pub(crate) fn map_dwarf_error(context: &str, err: gimli::Error) -> RedeclError
{
    RedeclError::Dwarf {
        context: context.to_string(),
        source: err,
    }
}

/// Convenience type alias for `Result<T, RedeclError>`
///
/// ```rust
/// use redecl_core::error::Result;
/// fn foo() -> Result<()>
/// {
///     Ok(())
/// }
/// ```
pub type Result<T> = std::result::Result<T, RedeclError>;
