//! # Reconstruction Context
//!
//! Accumulates declarations across every compile unit of a binary.
//!
//! The same entity is described by many compile units (every `.cpp` that
//! includes a header repeats its types). The context keeps exactly one
//! [`Entry`] per entity, keyed by declaration file, line and name, and folds
//! every further description of it into that entry. An identity map from node
//! to entry makes repeated lookups of the same node cheap.
//!
//! ## Example
//!
//! ```rust
//! use gimli::constants::{DW_AT_byte_size, DW_TAG_base_type, DW_TAG_member, DW_TAG_structure_type};
//! use redecl_core::context::Context;
//! use redecl_core::die::DieTree;
//!
//! let mut tree = DieTree::new();
//! let cu = tree.compile_unit("main.cpp", "/proj");
//! let int = tree.die(cu, DW_TAG_base_type).name("int").udata(DW_AT_byte_size, 4).id();
//! let point = tree.die(cu, DW_TAG_structure_type).name("Point").decl("/proj/point.h", 1).id();
//! let _ = tree.die(point, DW_TAG_member).name("x").type_ref(int).decl("/proj/point.h", 2).id();
//!
//! let mut context = Context::new();
//! context.update(&tree, &tree.units()[0]).unwrap();
//! let headers = context.headers(None);
//! assert_eq!(headers[0].0, "point.h");
//! assert_eq!(headers[0].1, "struct Point {\n    int x;\n};\n");
//! ```

use std::collections::HashMap;

use gimli::constants;
use tracing::{debug, info, trace, warn};

use crate::die::{CompileUnit, DieId, DieTree};
use crate::entry::{self, Entry};
use crate::error::Result;
use crate::path;
use crate::source_file::SourceFile;

/// Location of a registered entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntryKey
{
    pub file: String,
    pub line: u64,
    pub index: usize,
}

/// Every reconstructed declaration of a binary, grouped by source file.
#[derive(Debug, Default)]
pub struct Context
{
    base_dir: Option<String>,
    source_files: HashMap<String, SourceFile>,
    identities: HashMap<DieId, EntryKey>,
}

impl Context
{
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Common ancestor directory of every compile unit seen so far.
    pub fn base_dir(&self) -> Option<&str>
    {
        self.base_dir.as_deref()
    }

    pub fn source_files(&self) -> &HashMap<String, SourceFile>
    {
        &self.source_files
    }

    pub fn entry(&self, key: &EntryKey) -> Option<&Entry>
    {
        self.source_files.get(&key.file).and_then(|file| file.get(key.line, key.index))
    }

    /// Walk one compile unit and register every declaration it contains.
    ///
    /// Units without a name or compilation directory are skipped. A decode
    /// error abandons the offending node only; any other error stops the
    /// walk of this unit and is returned.
    pub fn update(&mut self, tree: &DieTree, unit: &CompileUnit) -> Result<()>
    {
        let (Some(name), Some(comp_dir)) = (tree.short_name(unit.root), unit.comp_dir.as_deref()) else {
            debug!("Skipping compile unit without name or compilation directory");
            return Ok(());
        };

        let unit_path = path::join(comp_dir, name);
        let unit_base = path::common_path(&unit_path, comp_dir);
        self.base_dir = Some(match self.base_dir.take() {
            Some(current) => path::common_path(&current, &unit_base),
            None => unit_base,
        });

        info!("Parsing compile unit {unit_path}");
        self.walk(tree, unit.root)
    }

    fn walk(&mut self, tree: &DieTree, scope: DieId) -> Result<()>
    {
        let inline_types = entry::inline_types(tree, scope)?;
        for &child in tree.children(scope) {
            if tree.tag(child) == constants::DW_TAG_namespace {
                trace!("Entering namespace {}", tree.short_name(child).unwrap_or("(anonymous)"));
                self.walk(tree, child)?;
                continue;
            }
            if inline_types.contains(&tree.resolve_type_unit_reference(child)) {
                continue;
            }

            match self.visit(tree, child) {
                Ok(()) => {}
                Err(err) if !err.is_unit_fatal() => {
                    warn!("Skipping entry at 0x{:x}: {err}", tree.offset(child));
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    fn visit(&mut self, tree: &DieTree, die: DieId) -> Result<()>
    {
        let Some(key) = self.get(tree, die)? else {
            return Ok(());
        };
        // A skeleton that points into a type unit still carries its own
        // members (methods defined in this unit, for instance).
        if tree.resolve_type_unit_reference(die) != die {
            self.reparse(tree, &key, die)?;
        }
        Ok(())
    }

    /// Entry for `die`, creating and registering it on first sight.
    ///
    /// Returns `None` for nodes that lack a name, declaration file or line,
    /// for tags that are not declarations, and when the declaration's line is
    /// already full.
    pub fn get(&mut self, tree: &DieTree, die: DieId) -> Result<Option<EntryKey>>
    {
        let canonical = tree.resolve_type_unit_reference(die);
        if let Some(key) = self.identities.get(&canonical) {
            return Ok(Some(key.clone()));
        }

        let (Some(name), Some(file), Some(line)) =
            (tree.short_name(canonical), tree.decl_file(canonical), tree.decl_line(canonical))
        else {
            return Ok(None);
        };
        let file = path::normalize(file);
        let tag = tree.tag(canonical);

        if let Some(index) = self.source_files.get(&file).and_then(|source| source.find(line, name, tag)) {
            let key = EntryKey { file, line, index };
            trace!("Merging {name} into {}:{}", key.file, key.line);
            self.reparse(tree, &key, canonical)?;
            self.identities.insert(canonical, key.clone());
            return Ok(Some(key));
        }

        let Some(mut entry) = Entry::declaration(tag) else {
            return Ok(None);
        };
        entry.parse(tree, canonical)?;

        let Some(index) = self.source_files.entry(file.clone()).or_default().insert(line, name, tag, entry) else {
            debug!("Too many declarations on line {line} of {file}");
            return Ok(None);
        };
        let key = EntryKey { file, line, index };
        self.identities.insert(canonical, key.clone());
        Ok(Some(key))
    }

    /// Fold `die` into an existing entry. The entry is left untouched when
    /// parsing fails.
    fn reparse(&mut self, tree: &DieTree, key: &EntryKey, die: DieId) -> Result<()>
    {
        let Some(existing) = self
            .source_files
            .get_mut(&key.file)
            .and_then(|file| file.get_mut(key.line, key.index))
        else {
            return Ok(());
        };
        if !existing.accepts(tree.tag(die)) {
            trace!("Not merging a different kind of declaration into {}:{}", key.file, key.line);
            return Ok(());
        }

        let mut updated = existing.clone();
        updated.parse(tree, die)?;
        *existing = updated;
        Ok(())
    }

    /// Rendered headers under the base directory as `(relative path, text)`,
    /// sorted by path. Files outside the base directory are left out.
    pub fn headers(&self, base_override: Option<&str>) -> Vec<(String, String)>
    {
        let Some(base) = base_override.or(self.base_dir.as_deref()) else {
            return Vec::new();
        };
        if base.is_empty() {
            warn!("Compile units share no common directory; pass a base directory to emit headers");
            return Vec::new();
        }

        let mut headers: Vec<(String, String)> = self
            .source_files
            .iter()
            .filter_map(|(file, source)| {
                let relative = path::strip_base(file, base).filter(|relative| !relative.is_empty())?;
                Some((relative, source.render()))
            })
            .collect();
        headers.sort_by(|a, b| a.0.cmp(&b.0));
        headers
    }
}

#[cfg(test)]
mod tests
{
    use gimli::constants::*;

    use super::*;
    use crate::entry::Decl;

    #[test]
    fn test_base_dir_narrows_across_units()
    {
        let mut tree = DieTree::new();
        let _ = tree.compile_unit("src/game/main.cpp", "/proj/build");
        let _ = tree.compile_unit("/proj/tools/gen.cpp", "/proj/tools");

        let mut context = Context::new();
        context.update(&tree, &tree.units()[0]).unwrap();
        assert_eq!(context.base_dir(), Some("/proj/build"));
        context.update(&tree, &tree.units()[1]).unwrap();
        assert_eq!(context.base_dir(), Some("/proj"));
    }

    #[test]
    fn test_unit_without_comp_dir_is_ignored()
    {
        let mut tree = DieTree::new();
        let root = tree.die_root(DW_TAG_compile_unit).name("a.cpp").id();
        tree.add_unit(root, None);

        let mut context = Context::new();
        context.update(&tree, &tree.units()[0]).unwrap();
        assert_eq!(context.base_dir(), None);
        assert!(context.headers(None).is_empty());
    }

    #[test]
    fn test_identity_is_cached()
    {
        let mut tree = DieTree::new();
        let cu = tree.compile_unit("a.cpp", "/src");
        let int = tree.die(cu, DW_TAG_base_type).name("int").id();
        let typedef = tree.die(cu, DW_TAG_typedef).name("Id").type_ref(int).decl("/src/id.h", 4).id();
        let unnamed = tree.die(cu, DW_TAG_typedef).type_ref(int).decl("/src/id.h", 5).id();

        let mut context = Context::new();
        let first = context.get(&tree, typedef).unwrap().unwrap();
        let second = context.get(&tree, typedef).unwrap().unwrap();
        assert_eq!(first, second);
        assert_eq!(context.get(&tree, unnamed).unwrap(), None);
        assert_eq!(context.source_files()["/src/id.h"].len(), 1);
    }

    #[test]
    fn test_variables_and_lexical_blocks_are_not_declarations()
    {
        let mut tree = DieTree::new();
        let cu = tree.compile_unit("a.cpp", "/src");
        let int = tree.die(cu, DW_TAG_base_type).name("int").id();
        let _ = tree.die(cu, DW_TAG_variable).name("global").type_ref(int).decl("/src/a.cpp", 1).id();

        let mut context = Context::new();
        context.update(&tree, &tree.units()[0]).unwrap();
        assert!(context.source_files().is_empty());
    }

    #[test]
    fn test_decode_error_skips_only_that_entry()
    {
        let mut tree = DieTree::new();
        let cu = tree.compile_unit("a.cpp", "/src");
        let int = tree.die(cu, DW_TAG_base_type).name("int").id();
        let _ = tree
            .die(cu, DW_TAG_typedef)
            .name("Bad")
            .type_ref(int)
            .decl("/src/a.h", 1)
            .udata(DW_AT_accessibility, 77)
            .id();
        let _ = tree.die(cu, DW_TAG_typedef).name("Good").type_ref(int).decl("/src/a.h", 2).id();

        let mut context = Context::new();
        context.update(&tree, &tree.units()[0]).unwrap();
        let headers = context.headers(None);
        assert_eq!(headers, vec![("a.h".to_string(), "using Good = int;\n".to_string())]);
    }

    #[test]
    fn test_malformed_reference_aborts_the_unit()
    {
        let mut tree = DieTree::new();
        let cu = tree.compile_unit("a.cpp", "/src");
        let _ = tree
            .die(cu, DW_TAG_typedef)
            .name("Broken")
            .attr(DW_AT_type, crate::die::AttrValue::BrokenRef(0x40))
            .decl("/src/a.h", 1)
            .id();

        let mut context = Context::new();
        assert!(context.update(&tree, &tree.units()[0]).is_err());
    }

    #[test]
    fn test_anonymous_typedef_target_is_not_emitted_twice()
    {
        let mut tree = DieTree::new();
        let cu = tree.compile_unit("a.c", "/src");
        let int = tree.die(cu, DW_TAG_base_type).name("int").id();
        let anon = tree.die(cu, DW_TAG_structure_type).decl("/src/a.h", 1).id();
        let _ = tree.die(anon, DW_TAG_member).name("x").type_ref(int).decl("/src/a.h", 1).id();
        let typedef = tree.die(cu, DW_TAG_typedef).name("Point").type_ref(anon).decl("/src/a.h", 1).id();

        let mut context = Context::new();
        context.update(&tree, &tree.units()[0]).unwrap();
        let key = context.get(&tree, typedef).unwrap().unwrap();
        assert!(matches!(context.entry(&key).map(Entry::decl), Some(Decl::Typedef(_))));
        assert_eq!(context.source_files()["/src/a.h"].len(), 1);
    }

    #[test]
    fn test_headers_outside_base_are_dropped()
    {
        let mut tree = DieTree::new();
        let cu = tree.compile_unit("main.cpp", "/proj");
        let int = tree.die(cu, DW_TAG_base_type).name("int").id();
        let _ = tree.die(cu, DW_TAG_typedef).name("size_t").type_ref(int).decl("/usr/include/stddef.h", 3).id();
        let _ = tree.die(cu, DW_TAG_typedef).name("Id").type_ref(int).decl("/proj/inc/id.h", 3).id();

        let mut context = Context::new();
        context.update(&tree, &tree.units()[0]).unwrap();
        let paths: Vec<String> = context.headers(None).into_iter().map(|(path, _)| path).collect();
        assert_eq!(paths, ["inc/id.h".to_string()]);

        let paths: Vec<String> = context.headers(Some("/")).into_iter().map(|(path, _)| path).collect();
        assert_eq!(paths, ["proj/inc/id.h".to_string(), "usr/include/stddef.h".to_string()]);
    }

    #[test]
    fn test_units_without_common_directory_need_a_base()
    {
        let mut tree = DieTree::new();
        let first = tree.compile_unit("x.cpp", "C:/game");
        let int = tree.die(first, DW_TAG_base_type).name("int").id();
        let _ = tree.die(first, DW_TAG_typedef).name("Id").type_ref(int).decl("C:/game/id.h", 1).id();
        let _ = tree.compile_unit("y.cpp", "D:/tools");

        let mut context = Context::new();
        context.update(&tree, &tree.units()[0]).unwrap();
        context.update(&tree, &tree.units()[1]).unwrap();
        assert_eq!(context.base_dir(), Some(""));
        assert!(context.headers(None).is_empty());
        assert_eq!(
            context.headers(Some("C:/game")),
            vec![("id.h".to_string(), "using Id = int;\n".to_string())]
        );
    }
}
