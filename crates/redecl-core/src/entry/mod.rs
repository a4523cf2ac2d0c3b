//! # Entry Model
//!
//! A reconstructed declaration and the six shapes it can take.
//!
//! Every [`Entry`] carries the data common to all declarations (enclosing
//! namespace path and optional access specifier) plus a [`Decl`] payload. An
//! entry is built from one debug-info node and may be parsed again when other
//! compile units describe the same entity; parsing is additive, so a later,
//! poorer description never erases what an earlier one recovered.

mod enumeration;
mod field;
mod function;
mod struct_like;
mod typedef;

use std::collections::HashSet;
use std::fmt;

pub use enumeration::Enum;
pub use field::{ConstValue, Field};
pub use function::{Function, Parameter};
use gimli::{constants, DwTag};
use smallvec::SmallVec;
pub use struct_like::{BaseClass, StructKind, StructLike};
pub use typedef::Typedef;

use crate::die::{DieId, DieTree};
use crate::error::{RedeclError, Result};
use crate::type_printer;

/// Upper bound on declarations kept for a single source line.
pub const MAX_ENTRIES_PER_LINE: usize = 16;

/// Enclosing namespaces, outermost first. Anonymous namespaces are empty strings.
pub type NamespacePath = SmallVec<[String; 4]>;

/// C++ access specifier (`DW_AT_accessibility`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access
{
    Public,
    Protected,
    Private,
}

impl TryFrom<u64> for Access
{
    type Error = RedeclError;

    fn try_from(value: u64) -> Result<Self>
    {
        match value {
            1 => Ok(Access::Public),
            2 => Ok(Access::Protected),
            3 => Ok(Access::Private),
            other => Err(RedeclError::UnknownAccess(other)),
        }
    }
}

impl fmt::Display for Access
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let label = match self {
            Access::Public => "public",
            Access::Protected => "protected",
            Access::Private => "private",
        };
        write!(f, "{label}")
    }
}

/// `DW_AT_virtuality` of a member function or base class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Virtuality
{
    #[default]
    None,
    Virtual,
    PureVirtual,
}

impl TryFrom<u64> for Virtuality
{
    type Error = RedeclError;

    fn try_from(value: u64) -> Result<Self>
    {
        match value {
            0 => Ok(Virtuality::None),
            1 => Ok(Virtuality::Virtual),
            2 => Ok(Virtuality::PureVirtual),
            other => Err(RedeclError::UnknownVirtuality(other)),
        }
    }
}

/// Declaration payload.
#[derive(Debug, Clone)]
pub enum Decl
{
    Typedef(Typedef),
    Parameter(Parameter),
    Function(Function),
    Enum(Enum),
    Field(Field),
    StructLike(StructLike),
}

/// A reconstructed declaration.
#[derive(Debug, Clone)]
pub struct Entry
{
    namespaces: Option<NamespacePath>,
    access: Option<Access>,
    decl: Decl,
}

impl Entry
{
    pub fn new(decl: Decl) -> Self
    {
        Self {
            namespaces: None,
            access: None,
            decl,
        }
    }

    /// Entry for a node found at namespace scope, or `None` for tags that are
    /// not independently declarable there.
    pub fn declaration(tag: DwTag) -> Option<Self>
    {
        let decl = match tag {
            constants::DW_TAG_subprogram => Decl::Function(Function::free()),
            constants::DW_TAG_typedef => Decl::Typedef(Typedef::new()),
            _ => return Self::anonymous_type(tag),
        };
        Some(Self::new(decl))
    }

    /// Entry for a child of a class, struct or union named `owner`.
    pub fn member(tag: DwTag, owner: &str) -> Option<Self>
    {
        let decl = match tag {
            constants::DW_TAG_member => Decl::Field(Field::new()),
            constants::DW_TAG_variable => Decl::Field(Field::static_member()),
            constants::DW_TAG_subprogram => Decl::Function(Function::member(owner)),
            constants::DW_TAG_typedef => Decl::Typedef(Typedef::new()),
            _ => return Self::anonymous_type(tag),
        };
        Some(Self::new(decl))
    }

    /// Entry for the composite types that can be spelled inline.
    fn anonymous_type(tag: DwTag) -> Option<Self>
    {
        let decl = match tag {
            constants::DW_TAG_class_type => Decl::StructLike(StructLike::new(StructKind::Class)),
            constants::DW_TAG_structure_type => Decl::StructLike(StructLike::new(StructKind::Struct)),
            constants::DW_TAG_union_type => Decl::StructLike(StructLike::new(StructKind::Union)),
            constants::DW_TAG_enumeration_type => Decl::Enum(Enum::new()),
            _ => return None,
        };
        Some(Self::new(decl))
    }

    /// Whether a node with this tag describes the same kind of declaration.
    pub fn accepts(&self, tag: DwTag) -> bool
    {
        match &self.decl {
            Decl::Typedef(_) => tag == constants::DW_TAG_typedef,
            Decl::Parameter(_) => {
                tag == constants::DW_TAG_formal_parameter || tag == constants::DW_TAG_unspecified_parameters
            }
            Decl::Function(_) => tag == constants::DW_TAG_subprogram,
            Decl::Enum(_) => tag == constants::DW_TAG_enumeration_type,
            Decl::Field(_) => tag == constants::DW_TAG_member || tag == constants::DW_TAG_variable,
            Decl::StructLike(record) => record.kind().tag() == tag,
        }
    }

    /// Fold the information carried by `die` into this entry.
    pub fn parse(&mut self, tree: &DieTree, die: DieId) -> Result<()>
    {
        if self.namespaces.is_none() {
            self.namespaces = Some(namespace_path(tree, die));
        }

        // Last description wins when compile units disagree.
        if let Some(value) = tree.udata(die, constants::DW_AT_accessibility) {
            self.access = Some(Access::try_from(value)?);
        }

        match &mut self.decl {
            Decl::Typedef(typedef) => typedef.parse(tree, die),
            Decl::Parameter(parameter) => parameter.parse(tree, die),
            Decl::Function(function) => function.parse(tree, die),
            Decl::Enum(enumeration) => enumeration.parse(tree, die),
            Decl::Field(field) => field.parse(tree, die),
            Decl::StructLike(record) => record.parse(tree, die),
        }
    }

    /// Declaration text, without a trailing newline.
    pub fn render(&self) -> String
    {
        match &self.decl {
            Decl::Typedef(typedef) => typedef.render(),
            Decl::Parameter(parameter) => parameter.render(),
            Decl::Function(function) => function.render(),
            Decl::Enum(enumeration) => enumeration.render(),
            Decl::Field(field) => field.render(),
            Decl::StructLike(record) => record.render(),
        }
    }

    pub fn namespaces(&self) -> &[String]
    {
        self.namespaces.as_deref().unwrap_or_default()
    }

    pub fn access(&self) -> Option<Access>
    {
        self.access
    }

    pub fn decl(&self) -> &Decl
    {
        &self.decl
    }
}

/// Names of the namespaces directly enclosing `die`, outermost first.
pub fn namespace_path(tree: &DieTree, die: DieId) -> NamespacePath
{
    let mut path = NamespacePath::new();
    let mut current = tree.parent(die);
    while let Some(scope) = current.filter(|scope| tree.tag(*scope) == constants::DW_TAG_namespace) {
        path.push(tree.short_name(scope).unwrap_or_default().to_string());
        current = tree.parent(scope);
    }
    path.reverse();
    path
}

/// `template <...>` header rebuilt from the template parameter children.
fn template_parameters(tree: &DieTree, die: DieId) -> Result<Option<String>>
{
    let mut parts = Vec::new();
    for &child in tree.children(die) {
        let name = tree.short_name(child).unwrap_or_default();
        match tree.tag(child) {
            constants::DW_TAG_template_type_parameter => parts.push(format!("typename {name}")),
            constants::DW_TAG_template_value_parameter => {
                let ty = type_printer::qualified_name(tree, tree.type_of(child)?)?;
                parts.push(format!("{ty} {name}"));
            }
            constants::DW_TAG_GNU_template_parameter_pack => parts.push(format!("typename... {name}")),
            constants::DW_TAG_GNU_template_template_param => parts.push(format!("template<typename> class {name}")),
            _ => {}
        }
    }

    if parts.is_empty() {
        return Ok(None);
    }
    Ok(Some(format!("template <{}>", parts.join(", "))))
}

/// Full declaration text of an unnamed struct/class/union/enum, minus the
/// terminating semicolon, so it can stand in for a type name.
fn inline_anonymous(tree: &DieTree, ty: DieId) -> Result<Option<String>>
{
    if tree.short_name(ty).is_some() {
        return Ok(None);
    }
    let Some(mut entry) = Entry::anonymous_type(tree.tag(ty)) else {
        return Ok(None);
    };
    entry.parse(tree, ty)?;

    let mut text = entry.render();
    if text.ends_with(';') {
        text.pop();
    }
    Ok(Some(text))
}

/// Whether `ty` is an unnamed composite type that gets spelled inline.
fn is_anonymous_composite(tree: &DieTree, ty: DieId) -> bool
{
    tree.short_name(ty).is_none() && Entry::anonymous_type(tree.tag(ty)).is_some()
}

/// Unnamed composite types that a typedef, member or variable of `die` spells
/// inline, so they are not emitted a second time as nested declarations.
pub(crate) fn inline_types(tree: &DieTree, die: DieId) -> Result<HashSet<DieId>>
{
    let mut types = HashSet::new();
    for &child in tree.children(die) {
        if !matches!(
            tree.tag(child),
            constants::DW_TAG_member | constants::DW_TAG_typedef | constants::DW_TAG_variable
        ) {
            continue;
        }
        if let Some(ty) = tree.type_of(child)? {
            if is_anonymous_composite(tree, ty) {
                types.insert(ty);
            }
        }
    }
    Ok(types)
}
