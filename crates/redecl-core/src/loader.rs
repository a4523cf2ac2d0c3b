//! # DWARF Loader
//!
//! Reads the debug sections of an object file into a [`DieTree`].
//!
//! Sections are copied into shared buffers and read through gimli's
//! `EndianArcSlice`, so the tree does not borrow from the input bytes.
//! Loading happens in two passes:
//!
//! 1. Every unit of `.debug_info` and `.debug_types` is walked and its nodes
//!    appended to the arena. References are recorded by section offset or
//!    type signature.
//! 2. Once all nodes exist, recorded references are patched into
//!    [`AttrValue::Ref`]. Targets that were never loaded become
//!    [`AttrValue::BrokenRef`].
//!
//! A unit whose header or entries cannot be decoded is skipped; the rest of
//! the file still loads.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use gimli::{
    constants, AttributeValue, DwAt, Dwarf, EndianArcSlice, EntriesTreeNode, Reader, RunTimeEndian, SectionId, Unit,
    UnitHeader, UnitOffset, UnitSectionOffset, UnitType,
};
use object::{Object, ObjectSection};
use tracing::{debug, info, warn};

use crate::die::{AttrValue, DieId, DieTree};
use crate::error::{map_dwarf_error, RedeclError, Result};
use crate::path;

type OwnedReader = EndianArcSlice<RunTimeEndian>;
type OwnedDwarf = Dwarf<OwnedReader>;

const DWARF_SECTIONS: &[(&str, &[&str])] = &[
    (".debug_abbrev", &[".debug_abbrev", "__debug_abbrev"]),
    (".debug_addr", &[".debug_addr", "__debug_addr"]),
    (".debug_info", &[".debug_info", "__debug_info"]),
    (".debug_line", &[".debug_line", "__debug_line"]),
    (".debug_line_str", &[".debug_line_str", "__debug_line_str"]),
    (".debug_str", &[".debug_str", "__debug_str"]),
    (".debug_str_offsets", &[".debug_str_offsets", "__debug_str_offs"]),
    (".debug_types", &[".debug_types", "__debug_types"]),
];

/// Section a node lives in. `.debug_info` and `.debug_types` offsets overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Section
{
    Info,
    Types,
}

type SectionKey = (Section, u64);

/// Reference target recorded during the first pass.
#[derive(Debug, Clone, Copy)]
enum Target
{
    Offset(SectionKey),
    Signature(u64),
}

/// Read `path` and load its debug information.
pub fn load_file(path: impl AsRef<Path>) -> Result<DieTree>
{
    let path = path.as_ref();
    let bytes = fs::read(path)?;
    info!("Loading debug information from {}", path.display());
    load_bytes(&bytes)
}

/// Load the debug information of an in-memory object file.
pub fn load_bytes(data: &[u8]) -> Result<DieTree>
{
    let file = object::File::parse(data).map_err(|err| RedeclError::Object(err.to_string()))?;
    let endian = if file.is_little_endian() {
        RunTimeEndian::Little
    } else {
        RunTimeEndian::Big
    };

    let mut sections = HashMap::new();
    for (canonical, aliases) in DWARF_SECTIONS {
        sections.insert(*canonical, load_section_bytes(&file, aliases)?);
    }
    let dwarf = Dwarf::load(|id| Ok::<_, gimli::Error>(section_reader(&sections, endian, id)))
        .map_err(|err| map_dwarf_error("loading DWARF sections", err))?;

    let mut loader = Loader::new(&dwarf);
    loader.load_units();
    Ok(loader.finish())
}

fn load_section_bytes(file: &object::File<'_>, names: &[&str]) -> Result<Arc<[u8]>>
{
    for name in names {
        if let Some(section) = file.section_by_name(name) {
            let data = section
                .uncompressed_data()
                .map_err(|err| RedeclError::Object(format!("failed to read {name}: {err}")))?;
            return Ok(match data {
                Cow::Borrowed(bytes) => Arc::<[u8]>::from(bytes),
                Cow::Owned(vec) => vec.into(),
            });
        }
    }
    Ok(Arc::<[u8]>::from(Vec::new()))
}

fn section_reader(sections: &HashMap<&'static str, Arc<[u8]>>, endian: RunTimeEndian, id: SectionId) -> OwnedReader
{
    let data = sections
        .get(id.name())
        .cloned()
        .unwrap_or_else(|| Arc::<[u8]>::from(Vec::new()));
    EndianArcSlice::new(data, endian)
}

fn section_key(base: UnitSectionOffset<usize>, offset: UnitOffset<usize>) -> SectionKey
{
    match base {
        UnitSectionOffset::DebugInfoOffset(base) => (Section::Info, (base.0 + offset.0) as u64),
        UnitSectionOffset::DebugTypesOffset(base) => (Section::Types, (base.0 + offset.0) as u64),
    }
}

struct Loader<'a>
{
    dwarf: &'a OwnedDwarf,
    tree: DieTree,
    offsets: HashMap<SectionKey, DieId>,
    signatures: HashMap<u64, DieId>,
    pending: Vec<(DieId, DwAt, Target)>,
}

impl<'a> Loader<'a>
{
    fn new(dwarf: &'a OwnedDwarf) -> Self
    {
        Self {
            dwarf,
            tree: DieTree::new(),
            offsets: HashMap::new(),
            signatures: HashMap::new(),
            pending: Vec::new(),
        }
    }

    fn load_units(&mut self)
    {
        let mut headers = self.dwarf.units();
        loop {
            match headers.next() {
                Ok(Some(header)) => self.load_unit(header),
                Ok(None) => break,
                Err(err) => {
                    warn!("Stopped reading .debug_info unit headers: {err}");
                    break;
                }
            }
        }

        let mut type_headers = self.dwarf.type_units();
        loop {
            match type_headers.next() {
                Ok(Some(header)) => self.load_unit(header),
                Ok(None) => break,
                Err(err) => {
                    warn!("Stopped reading .debug_types unit headers: {err}");
                    break;
                }
            }
        }
    }

    fn load_unit(&mut self, header: UnitHeader<OwnedReader>)
    {
        let unit_offset = header.offset();
        let result = self
            .dwarf
            .unit(header)
            .map_err(|err| map_dwarf_error("parsing unit", err))
            .and_then(|unit| self.load_unit_entries(&unit));
        if let Err(err) = result {
            warn!("Skipping unit at {unit_offset:?}: {err}");
        }
    }

    fn load_unit_entries(&mut self, unit: &Unit<OwnedReader>) -> Result<()>
    {
        let files = self.file_names(unit)?;
        let mut entries = unit
            .entries_tree(None)
            .map_err(|err| map_dwarf_error("building unit tree", err))?;
        let root = entries.root().map_err(|err| map_dwarf_error("navigating unit root", err))?;
        let root = self.load_node(unit, &files, root, None)?;

        match unit.header.type_() {
            UnitType::Type {
                type_signature,
                type_offset,
            }
            | UnitType::SplitType {
                type_signature,
                type_offset,
            } => {
                let key = section_key(unit.header.offset(), type_offset);
                if let Some(definition) = self.offsets.get(&key) {
                    self.signatures.insert(type_signature.0, *definition);
                }
            }
            _ => {
                let comp_dir = unit.comp_dir.as_ref().map(reader_to_string).transpose()?;
                debug!("Loaded compile unit {:?}", self.tree.short_name(root));
                self.tree.add_unit(root, comp_dir);
            }
        }
        Ok(())
    }

    /// Absolute path of every file in the unit's line table, keyed by the
    /// index `DW_AT_decl_file` uses.
    fn file_names(&self, unit: &Unit<OwnedReader>) -> Result<HashMap<u64, String>>
    {
        let mut files = HashMap::new();
        let Some(program) = &unit.line_program else {
            return Ok(files);
        };
        let header = program.header();
        let comp_dir = unit.comp_dir.as_ref().map(reader_to_string).transpose()?.unwrap_or_default();

        // Index 0 is only valid from DWARF 5 on; `file` sorts that out.
        for index in 0..=header.file_names().len() as u64 {
            let Some(file) = header.file(index) else {
                continue;
            };
            let name = self.attr_to_string(unit, file.path_name())?;
            let directory = match file.directory(header) {
                Some(directory) => self.attr_to_string(unit, directory)?,
                None => String::new(),
            };
            files.insert(index, path::join(&comp_dir, &path::join(&directory, &name)));
        }
        Ok(files)
    }

    fn load_node(
        &mut self,
        unit: &Unit<OwnedReader>,
        files: &HashMap<u64, String>,
        node: EntriesTreeNode<'_, '_, '_, OwnedReader>,
        parent: Option<DieId>,
    ) -> Result<DieId>
    {
        let id = {
            let entry = node.entry();
            let key = section_key(unit.header.offset(), entry.offset());
            let id = self.tree.push(parent, entry.tag(), key.1);
            self.offsets.insert(key, id);

            let mut attrs = entry.attrs();
            while let Some(attr) = attrs.next().map_err(|err| map_dwarf_error("reading attributes", err))? {
                self.load_attr(unit, files, id, attr.name(), attr.value())?;
            }
            id
        };

        let mut children = node.children();
        while let Some(child) = children
            .next()
            .map_err(|err| map_dwarf_error("iterating children", err))?
        {
            self.load_node(unit, files, child, Some(id))?;
        }
        Ok(id)
    }

    fn load_attr(
        &mut self,
        unit: &Unit<OwnedReader>,
        files: &HashMap<u64, String>,
        die: DieId,
        name: DwAt,
        value: AttributeValue<OwnedReader>,
    ) -> Result<()>
    {
        let decoded = match value {
            AttributeValue::UnitRef(offset) => {
                let target = Target::Offset(section_key(unit.header.offset(), offset));
                self.pending.push((die, name, target));
                return Ok(());
            }
            AttributeValue::DebugInfoRef(offset) => {
                self.pending.push((die, name, Target::Offset((Section::Info, offset.0 as u64))));
                return Ok(());
            }
            AttributeValue::DebugTypesRef(signature) => {
                self.pending.push((die, name, Target::Signature(signature.0)));
                return Ok(());
            }
            AttributeValue::FileIndex(index) => match files.get(&index) {
                Some(file) => AttrValue::Str(file.clone()),
                None => return Ok(()),
            },
            AttributeValue::Sdata(value) => AttrValue::Sdata(value),
            AttributeValue::Flag(value) => AttrValue::Flag(value),
            AttributeValue::Accessibility(access) => AttrValue::Udata(u64::from(access.0)),
            AttributeValue::Virtuality(virtuality) => AttrValue::Udata(u64::from(virtuality.0)),
            AttributeValue::Block(bytes) | AttributeValue::Exprloc(gimli::Expression(bytes)) => {
                let bytes = bytes.to_slice().map_err(|err| map_dwarf_error("reading block", err))?;
                AttrValue::Block(bytes.into_owned())
            }
            AttributeValue::String(_)
            | AttributeValue::DebugStrRef(_)
            | AttributeValue::DebugStrRefSup(_)
            | AttributeValue::DebugStrOffsetsIndex(_)
            | AttributeValue::DebugLineStrRef(_) => AttrValue::Str(self.attr_to_string(unit, value)?),
            other => match other.udata_value() {
                Some(value) if name == constants::DW_AT_decl_file => match files.get(&value) {
                    Some(file) => AttrValue::Str(file.clone()),
                    None => return Ok(()),
                },
                Some(value) => AttrValue::Udata(value),
                None => return Ok(()),
            },
        };
        self.tree.set_attr(die, name, decoded);
        Ok(())
    }

    fn attr_to_string(&self, unit: &Unit<OwnedReader>, value: AttributeValue<OwnedReader>) -> Result<String>
    {
        let reader = self
            .dwarf
            .attr_string(unit, value)
            .map_err(|err| map_dwarf_error("resolving DWARF string", err))?;
        reader_to_string(&reader)
    }

    /// Patch recorded references now that every node exists.
    fn finish(mut self) -> DieTree
    {
        let mut broken = 0usize;
        for (die, name, target) in std::mem::take(&mut self.pending) {
            let resolved = match target {
                Target::Offset(key) => self.offsets.get(&key).copied().ok_or(key.1),
                Target::Signature(signature) => self.signatures.get(&signature).copied().ok_or(signature),
            };
            let value = match resolved {
                Ok(target) => AttrValue::Ref(target),
                Err(offset) => {
                    broken += 1;
                    AttrValue::BrokenRef(offset)
                }
            };
            self.tree.set_attr(die, name, value);
        }
        if broken > 0 {
            warn!("{broken} references point outside the loaded debug information");
        }
        info!(
            "Loaded {} entries in {} compile units",
            self.tree.len(),
            self.tree.units().len()
        );
        self.tree
    }
}

fn reader_to_string(reader: &OwnedReader) -> Result<String>
{
    Ok(reader
        .to_string_lossy()
        .map_err(|err| map_dwarf_error("decoding DWARF string", err))?
        .into_owned())
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_rejects_non_object_input()
    {
        assert!(matches!(load_bytes(b"definitely not an object file"), Err(RedeclError::Object(_))));
    }

    #[test]
    fn test_missing_file_is_io_error()
    {
        assert!(matches!(
            load_file("/nonexistent/redecl/input.o"),
            Err(RedeclError::Io(_))
        ));
    }

    #[test]
    fn test_section_keys_keep_sections_apart()
    {
        let info = section_key(UnitSectionOffset::DebugInfoOffset(gimli::DebugInfoOffset(0x10)), UnitOffset(0x8));
        let types = section_key(UnitSectionOffset::DebugTypesOffset(gimli::DebugTypesOffset(0x10)), UnitOffset(0x8));
        assert_eq!(info, (Section::Info, 0x18));
        assert_eq!(types, (Section::Types, 0x18));
        assert_ne!(info, types);
    }
}
