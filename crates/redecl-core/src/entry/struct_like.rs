use std::collections::BTreeMap;

use gimli::{constants, DwTag};
use tracing::{debug, trace};

use super::{inline_types, template_parameters, Access, Entry, Virtuality, MAX_ENTRIES_PER_LINE};
use crate::die::{DieId, DieTree};
use crate::error::Result;
use crate::{path, type_printer};

/// Which keyword introduced the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructKind
{
    Struct,
    Class,
    Union,
}

impl StructKind
{
    pub fn keyword(self) -> &'static str
    {
        match self {
            StructKind::Struct => "struct",
            StructKind::Class => "class",
            StructKind::Union => "union",
        }
    }

    pub fn tag(self) -> DwTag
    {
        match self {
            StructKind::Struct => constants::DW_TAG_structure_type,
            StructKind::Class => constants::DW_TAG_class_type,
            StructKind::Union => constants::DW_TAG_union_type,
        }
    }

    /// `private` for classes, `public` otherwise.
    pub fn default_access(self) -> Access
    {
        match self {
            StructKind::Class => Access::Private,
            StructKind::Struct | StructKind::Union => Access::Public,
        }
    }
}

/// One entry of the base-clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseClass
{
    pub access: Access,
    pub is_virtual: bool,
    pub type_name: String,
}

/// Class, struct or union with its members grouped by declaration line.
#[derive(Debug, Clone)]
pub struct StructLike
{
    kind: StructKind,
    name: String,
    byte_size: Option<u64>,
    is_definition: bool,
    bases: Vec<BaseClass>,
    members: BTreeMap<u64, Vec<Entry>>,
    template: Option<String>,
}

impl StructLike
{
    pub fn new(kind: StructKind) -> Self
    {
        Self {
            kind,
            name: String::new(),
            byte_size: None,
            is_definition: false,
            bases: Vec::new(),
            members: BTreeMap::new(),
            template: None,
        }
    }

    pub fn kind(&self) -> StructKind
    {
        self.kind
    }

    pub fn name(&self) -> &str
    {
        &self.name
    }

    pub fn bases(&self) -> &[BaseClass]
    {
        &self.bases
    }

    /// Members keyed by declaration line.
    pub fn members(&self) -> &BTreeMap<u64, Vec<Entry>>
    {
        &self.members
    }

    pub(super) fn parse(&mut self, tree: &DieTree, die: DieId) -> Result<()>
    {
        if let Some(name) = tree.short_name(die) {
            self.name = name.to_string();
        }
        if let Some(size) = tree.udata(die, constants::DW_AT_byte_size) {
            self.byte_size = Some(size);
        }
        self.is_definition |= !tree.has_attr(die, constants::DW_AT_declaration);

        let inline_types = inline_types(tree, die)?;
        let decl_file = tree.decl_file(die).map(path::normalize);

        let mut bases = Vec::new();
        let mut members: BTreeMap<u64, Vec<Entry>> = BTreeMap::new();
        for &child in tree.children(die) {
            let child = tree.resolve_type_unit_reference(child);
            let tag = tree.tag(child);
            if tag == constants::DW_TAG_inheritance {
                bases.push(self.parse_base(tree, child)?);
                continue;
            }

            // Explicit specializations and out-of-line definitions live in
            // other files and belong to those files.
            if let (Some(own), Some(theirs)) = (&decl_file, tree.decl_file(child)) {
                if *own != path::normalize(theirs) {
                    trace!("Skipping member declared in {theirs}");
                    continue;
                }
            }
            if inline_types.contains(&child) {
                continue;
            }
            let Some(line) = tree.decl_line(child).filter(|line| *line > 0) else {
                continue;
            };
            let Some(mut entry) = Entry::member(tag, &self.name) else {
                continue;
            };

            let slot = members.entry(line).or_default();
            if slot.len() >= MAX_ENTRIES_PER_LINE {
                debug!("Too many members on line {line} of {}", self.name);
                continue;
            }
            entry.parse(tree, child)?;
            slot.push(entry);
        }

        for (line, mut entries) in members {
            entries.dedup_by(|a, b| a.render() == b.render());
            match self.members.get_mut(&line) {
                Some(existing) if entries.len() >= existing.len() => *existing = entries,
                Some(_) => {}
                None => {
                    self.members.insert(line, entries);
                }
            }
        }
        if !bases.is_empty() {
            self.bases = bases;
        }
        if let Some(template) = template_parameters(tree, die)? {
            self.template = Some(template);
        }
        Ok(())
    }

    fn parse_base(&self, tree: &DieTree, die: DieId) -> Result<BaseClass>
    {
        let access = match tree.udata(die, constants::DW_AT_accessibility) {
            Some(value) => Access::try_from(value)?,
            None => self.kind.default_access(),
        };
        let is_virtual = match tree.udata(die, constants::DW_AT_virtuality) {
            Some(value) => Virtuality::try_from(value)? != Virtuality::None,
            None => false,
        };
        let mut type_name = type_printer::qualified_name(tree, tree.type_of(die)?)?;
        if is_virtual {
            type_name.insert_str(0, "virtual ");
        }
        Ok(BaseClass {
            access,
            is_virtual,
            type_name,
        })
    }

    pub(super) fn render(&self) -> String
    {
        let mut out = String::new();
        if let Some(template) = &self.template {
            out.push_str("// ");
            out.push_str(template);
            out.push('\n');
        }
        out.push_str(self.kind.keyword());
        if !self.name.is_empty() {
            out.push(' ');
            out.push_str(&self.name);
        }

        // Nothing but a name: keep it a forward declaration.
        if !self.is_definition && self.members.is_empty() && self.bases.is_empty() {
            out.push(';');
            return out;
        }

        let default_access = self.kind.default_access();
        if !self.bases.is_empty() {
            let bases: Vec<String> = self
                .bases
                .iter()
                .map(|base| {
                    if base.access == default_access {
                        base.type_name.clone()
                    } else {
                        format!("{} {}", base.access, base.type_name)
                    }
                })
                .collect();
            out.push_str(" : ");
            out.push_str(&bases.join(", "));
        }
        out.push_str(" {\n");

        let mut current = default_access;
        let mut first_line = true;
        for entries in self.members.values() {
            for entry in entries {
                let access = entry.access().unwrap_or(default_access);
                if access != current {
                    if !first_line {
                        out.push('\n');
                    }
                    out.push_str(&format!("{access}:\n"));
                    current = access;
                }
                for line in entry.render().lines() {
                    if !line.is_empty() {
                        out.push_str("    ");
                        out.push_str(line);
                    }
                    out.push('\n');
                }
            }
            first_line = false;
        }
        out.push_str("};");

        if let Some(size) = self.byte_size.filter(|_| !self.name.is_empty()) {
            out.push_str(&format!("\nstatic_assert(sizeof({}) == {size});", self.name));
        }
        out
    }
}
