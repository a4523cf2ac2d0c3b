//! # Source Files
//!
//! All declarations attributed to one original source file, grouped by line.
//!
//! Rendering walks the lines in ascending order and opens or closes namespace
//! blocks whenever the namespace path changes between consecutive entries, so
//! the output stays brace-balanced no matter how entries from different
//! namespaces interleave.

use std::collections::{BTreeMap, HashMap};

use gimli::DwTag;

use crate::entry::{Entry, MAX_ENTRIES_PER_LINE};

/// Line, short name and tag of a declaration. `typedef struct Foo {...} Foo;`
/// puts two declarations under one line and name.
type LookupKey = (u64, String, DwTag);

/// Declarations of one file keyed by line number.
#[derive(Debug, Default, Clone)]
pub struct SourceFile
{
    lines: BTreeMap<u64, Vec<Entry>>,
    /// Index in the line's list.
    lookup: HashMap<LookupKey, usize>,
}

impl SourceFile
{
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Number of declarations held.
    pub fn len(&self) -> usize
    {
        self.lines.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool
    {
        self.lines.is_empty()
    }

    /// Index of the `tag` declaration named `name` on `line`.
    pub fn find(&self, line: u64, name: &str, tag: DwTag) -> Option<usize>
    {
        self.lookup.get(&(line, name.to_string(), tag)).copied()
    }

    /// Store `entry` at `line`, returning its index, or `None` when the line
    /// already holds the maximum number of declarations.
    pub fn insert(&mut self, line: u64, name: &str, tag: DwTag, entry: Entry) -> Option<usize>
    {
        let entries = self.lines.entry(line).or_default();
        if entries.len() >= MAX_ENTRIES_PER_LINE {
            return None;
        }
        let index = entries.len();
        entries.push(entry);
        self.lookup.insert((line, name.to_string(), tag), index);
        Some(index)
    }

    pub fn get(&self, line: u64, index: usize) -> Option<&Entry>
    {
        self.lines.get(&line).and_then(|entries| entries.get(index))
    }

    pub fn get_mut(&mut self, line: u64, index: usize) -> Option<&mut Entry>
    {
        self.lines.get_mut(&line).and_then(|entries| entries.get_mut(index))
    }

    /// Header text. Line groups are separated by a blank line.
    pub fn render(&self) -> String
    {
        let mut out = String::new();
        let mut open: &[String] = &[];
        for (index, entries) in self.lines.values().enumerate() {
            if index > 0 {
                out.push('\n');
            }
            for entry in entries {
                let wanted = entry.namespaces();
                let shared = open.iter().zip(wanted).take_while(|(a, b)| a == b).count();
                for name in open[shared..].iter().rev() {
                    close_namespace(&mut out, name);
                }
                for name in &wanted[shared..] {
                    open_namespace(&mut out, name);
                }
                open = wanted;

                out.push_str(&entry.render());
                out.push('\n');
            }
        }
        for name in open.iter().rev() {
            close_namespace(&mut out, name);
        }
        out
    }
}

fn open_namespace(out: &mut String, name: &str)
{
    if name.is_empty() {
        out.push_str("namespace {\n");
    } else {
        out.push_str(&format!("namespace {name} {{\n"));
    }
}

fn close_namespace(out: &mut String, name: &str)
{
    if name.is_empty() {
        out.push_str("} // namespace\n");
    } else {
        out.push_str(&format!("}} // namespace {name}\n"));
    }
}
