//! # Debug-Info Nodes
//!
//! An arena holding every debugging information entry (DIE) of one binary.
//!
//! Nodes are addressed through [`DieId`] handles instead of owned pointers, so
//! references between entries (types, signatures, containing types) are plain
//! `Copy` values and the whole tree can be shared immutably while entries are
//! reconstructed from it.
//!
//! ## Building trees
//!
//! The DWARF reader fills the arena unit by unit. Tests (and other producers)
//! use the chained builder:
//!
//! ```rust
//! use gimli::constants::{DW_AT_byte_size, DW_TAG_base_type, DW_TAG_structure_type};
//! use redecl_core::die::DieTree;
//!
//! let mut tree = DieTree::new();
//! let cu = tree.compile_unit("/src/main.cpp", "/src");
//! let int = tree.die(cu, DW_TAG_base_type).name("int").udata(DW_AT_byte_size, 4).id();
//! let foo = tree.die(cu, DW_TAG_structure_type).name("Foo").decl("/src/foo.h", 3).id();
//! assert_eq!(tree.short_name(int), Some("int"));
//! assert_eq!(tree.decl_line(foo), Some(3));
//! ```

use gimli::{constants, DwAt, DwTag};

use crate::error::{RedeclError, Result};

/// Handle to one node of a [`DieTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DieId(usize);

impl DieId
{
    /// Position of the node inside its arena.
    pub fn index(self) -> usize
    {
        self.0
    }
}

/// Decoded attribute value.
///
/// Constant forms keep their signedness: `DW_FORM_sdata` becomes `Sdata`, every
/// other constant form is widened into `Udata`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue
{
    Udata(u64),
    Sdata(i64),
    Flag(bool),
    Str(String),
    Block(Vec<u8>),
    Ref(DieId),
    /// A reference whose target could not be located. Holds the target offset.
    BrokenRef(u64),
}

impl AttrValue
{
    /// Value as an unsigned constant. Blocks of up to eight bytes are read as
    /// little-endian integers.
    pub fn as_u64(&self) -> Option<u64>
    {
        match self {
            AttrValue::Udata(value) => Some(*value),
            AttrValue::Sdata(value) => Some(*value as u64),
            AttrValue::Flag(value) => Some(u64::from(*value)),
            AttrValue::Block(bytes) if bytes.len() <= 8 => {
                Some(bytes.iter().rev().fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte)))
            }
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str>
    {
        match self {
            AttrValue::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_signed(&self) -> bool
    {
        matches!(self, AttrValue::Sdata(_))
    }
}

#[derive(Debug, Clone)]
struct DieData
{
    tag: DwTag,
    offset: u64,
    attrs: Vec<(DwAt, AttrValue)>,
    children: Vec<DieId>,
    parent: Option<DieId>,
}

/// Root of one compile unit plus its compilation directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileUnit
{
    pub root: DieId,
    pub comp_dir: Option<String>,
}

/// Arena of debugging information entries.
#[derive(Debug, Default, Clone)]
pub struct DieTree
{
    dies: Vec<DieData>,
    units: Vec<CompileUnit>,
}

impl DieTree
{
    pub fn new() -> Self
    {
        Self::default()
    }

    pub fn len(&self) -> usize
    {
        self.dies.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.dies.is_empty()
    }

    /// Append a node. `offset` is the node's position in its section and is
    /// only used in diagnostics.
    pub fn push(&mut self, parent: Option<DieId>, tag: DwTag, offset: u64) -> DieId
    {
        let id = DieId(self.dies.len());
        self.dies.push(DieData {
            tag,
            offset,
            attrs: Vec::new(),
            children: Vec::new(),
            parent,
        });
        if let Some(parent) = parent {
            self.dies[parent.0].children.push(id);
        }
        id
    }

    /// Set an attribute, replacing any previous value for the same name.
    pub fn set_attr(&mut self, die: DieId, name: DwAt, value: AttrValue)
    {
        let attrs = &mut self.dies[die.0].attrs;
        if let Some(slot) = attrs.iter_mut().find(|(at, _)| *at == name) {
            slot.1 = value;
        } else {
            attrs.push((name, value));
        }
    }

    /// Register `root` as the root node of a compile unit.
    pub fn add_unit(&mut self, root: DieId, comp_dir: Option<String>)
    {
        self.units.push(CompileUnit { root, comp_dir });
    }

    /// Compile units in section order. Type units are not listed.
    pub fn units(&self) -> &[CompileUnit]
    {
        &self.units
    }

    /// Start a new compile unit with the given name and compilation directory.
    pub fn compile_unit(&mut self, name: &str, comp_dir: &str) -> DieId
    {
        let root = self
            .die_root(constants::DW_TAG_compile_unit)
            .name(name)
            .attr(constants::DW_AT_comp_dir, AttrValue::Str(comp_dir.to_string()))
            .id();
        self.add_unit(root, Some(comp_dir.to_string()));
        root
    }

    /// Start a parentless node (type unit roots, compile unit roots).
    pub fn die_root(&mut self, tag: DwTag) -> DieBuilder<'_>
    {
        let offset = self.dies.len() as u64;
        let id = self.push(None, tag, offset);
        DieBuilder { tree: self, id }
    }

    /// Start a child node of `parent`.
    pub fn die(&mut self, parent: DieId, tag: DwTag) -> DieBuilder<'_>
    {
        let offset = self.dies.len() as u64;
        let id = self.push(Some(parent), tag, offset);
        DieBuilder { tree: self, id }
    }

    pub fn tag(&self, die: DieId) -> DwTag
    {
        self.dies[die.0].tag
    }

    pub fn offset(&self, die: DieId) -> u64
    {
        self.dies[die.0].offset
    }

    pub fn parent(&self, die: DieId) -> Option<DieId>
    {
        self.dies[die.0].parent
    }

    pub fn children(&self, die: DieId) -> &[DieId]
    {
        &self.dies[die.0].children
    }

    pub fn attr(&self, die: DieId, name: DwAt) -> Option<&AttrValue>
    {
        self.dies[die.0].attrs.iter().find(|(at, _)| *at == name).map(|(_, value)| value)
    }

    pub fn has_attr(&self, die: DieId, name: DwAt) -> bool
    {
        self.attr(die, name).is_some()
    }

    pub fn udata(&self, die: DieId, name: DwAt) -> Option<u64>
    {
        self.attr(die, name).and_then(AttrValue::as_u64)
    }

    pub fn short_name(&self, die: DieId) -> Option<&str>
    {
        self.attr(die, constants::DW_AT_name).and_then(AttrValue::as_str)
    }

    pub fn linkage_name(&self, die: DieId) -> Option<&str>
    {
        self.attr(die, constants::DW_AT_linkage_name)
            .or_else(|| self.attr(die, constants::DW_AT_MIPS_linkage_name))
            .and_then(AttrValue::as_str)
    }

    /// Absolute declaration file, as recorded by the reader.
    pub fn decl_file(&self, die: DieId) -> Option<&str>
    {
        self.attr(die, constants::DW_AT_decl_file).and_then(AttrValue::as_str)
    }

    pub fn decl_line(&self, die: DieId) -> Option<u64>
    {
        self.udata(die, constants::DW_AT_decl_line)
    }

    /// Follow a reference attribute.
    ///
    /// Returns `Ok(None)` when the attribute is absent and an error when it
    /// points nowhere.
    pub fn reference(&self, die: DieId, name: DwAt) -> Result<Option<DieId>>
    {
        match self.attr(die, name) {
            Some(AttrValue::Ref(target)) => Ok(Some(*target)),
            Some(AttrValue::BrokenRef(_)) => Err(RedeclError::MalformedReference {
                offset: self.offset(die),
            }),
            _ => Ok(None),
        }
    }

    /// The node's `DW_AT_type`, resolved through type units.
    pub fn type_of(&self, die: DieId) -> Result<Option<DieId>>
    {
        Ok(self
            .reference(die, constants::DW_AT_type)?
            .map(|target| self.resolve_type_unit_reference(target)))
    }

    /// Follow `DW_AT_signature` to the type unit holding the definition.
    ///
    /// Nodes without a (valid) signature resolve to themselves.
    pub fn resolve_type_unit_reference(&self, die: DieId) -> DieId
    {
        match self.attr(die, constants::DW_AT_signature) {
            Some(AttrValue::Ref(target)) => *target,
            _ => die,
        }
    }
}

/// Chained construction of a single node.
pub struct DieBuilder<'a>
{
    tree: &'a mut DieTree,
    id: DieId,
}

impl DieBuilder<'_>
{
    #[must_use]
    pub fn attr(self, name: DwAt, value: AttrValue) -> Self
    {
        self.tree.set_attr(self.id, name, value);
        self
    }

    #[must_use]
    pub fn name(self, name: &str) -> Self
    {
        self.attr(constants::DW_AT_name, AttrValue::Str(name.to_string()))
    }

    #[must_use]
    pub fn linkage_name(self, name: &str) -> Self
    {
        self.attr(constants::DW_AT_linkage_name, AttrValue::Str(name.to_string()))
    }

    #[must_use]
    pub fn decl(self, file: &str, line: u64) -> Self
    {
        self.attr(constants::DW_AT_decl_file, AttrValue::Str(file.to_string()))
            .attr(constants::DW_AT_decl_line, AttrValue::Udata(line))
    }

    #[must_use]
    pub fn udata(self, name: DwAt, value: u64) -> Self
    {
        self.attr(name, AttrValue::Udata(value))
    }

    #[must_use]
    pub fn sdata(self, name: DwAt, value: i64) -> Self
    {
        self.attr(name, AttrValue::Sdata(value))
    }

    #[must_use]
    pub fn flag(self, name: DwAt) -> Self
    {
        self.attr(name, AttrValue::Flag(true))
    }

    #[must_use]
    pub fn reference(self, name: DwAt, target: DieId) -> Self
    {
        self.attr(name, AttrValue::Ref(target))
    }

    #[must_use]
    pub fn type_ref(self, target: DieId) -> Self
    {
        self.reference(constants::DW_AT_type, target)
    }

    pub fn id(self) -> DieId
    {
        self.id
    }
}

#[cfg(test)]
mod tests
{
    use gimli::constants::*;

    use super::*;

    #[test]
    fn test_children_keep_insertion_order()
    {
        let mut tree = DieTree::new();
        let cu = tree.compile_unit("a.cpp", "/src");
        let first = tree.die(cu, DW_TAG_base_type).name("int").id();
        let second = tree.die(cu, DW_TAG_base_type).name("char").id();
        assert_eq!(tree.children(cu), &[first, second]);
        assert_eq!(tree.parent(first), Some(cu));
        assert_eq!(tree.units().len(), 1);
        assert_eq!(tree.units()[0].comp_dir.as_deref(), Some("/src"));
    }

    #[test]
    fn test_signature_resolves_to_type_unit()
    {
        let mut tree = DieTree::new();
        let tu = tree.die_root(DW_TAG_type_unit).id();
        let definition = tree.die(tu, DW_TAG_structure_type).name("Foo").id();
        let cu = tree.compile_unit("a.cpp", "/src");
        let declaration = tree
            .die(cu, DW_TAG_structure_type)
            .flag(DW_AT_declaration)
            .reference(DW_AT_signature, definition)
            .id();
        let field = tree.die(cu, DW_TAG_member).type_ref(declaration).id();

        assert_eq!(tree.resolve_type_unit_reference(declaration), definition);
        assert_eq!(tree.resolve_type_unit_reference(definition), definition);
        assert_eq!(tree.type_of(field).unwrap(), Some(definition));
    }

    #[test]
    fn test_broken_reference_is_an_error()
    {
        let mut tree = DieTree::new();
        let cu = tree.compile_unit("a.cpp", "/src");
        let field = tree
            .die(cu, DW_TAG_member)
            .attr(DW_AT_type, AttrValue::BrokenRef(0xdead))
            .id();
        assert!(matches!(tree.type_of(field), Err(RedeclError::MalformedReference { .. })));
    }

    #[test]
    fn test_block_constants_read_little_endian()
    {
        assert_eq!(AttrValue::Block(vec![0xdb, 0x0f, 0x49, 0x40]).as_u64(), Some(0x4049_0fdb));
        assert_eq!(AttrValue::Block(vec![0; 9]).as_u64(), None);
        assert_eq!(AttrValue::Sdata(-1).as_u64(), Some(u64::MAX));
    }
}
