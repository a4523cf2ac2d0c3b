use gimli::constants;
use tracing::debug;

use crate::die::{AttrValue, DieId, DieTree};
use crate::error::Result;
use crate::type_printer;

/// `enum [class] Name [: Base] { ... };`
#[derive(Debug, Clone, Default)]
pub struct Enum
{
    name: String,
    base: Option<String>,
    enumerators: Vec<(String, i64)>,
    is_enum_class: bool,
}

impl Enum
{
    pub fn new() -> Self
    {
        Self::default()
    }

    pub fn enumerators(&self) -> &[(String, i64)]
    {
        &self.enumerators
    }

    pub(super) fn parse(&mut self, tree: &DieTree, die: DieId) -> Result<()>
    {
        if let Some(name) = tree.short_name(die) {
            self.name = name.to_string();
        }
        if let Some(base) = tree.type_of(die)? {
            self.base = Some(type_printer::qualified_name(tree, Some(base))?);
        }
        self.is_enum_class |= tree.has_attr(die, constants::DW_AT_enum_class);

        if !self.enumerators.is_empty() {
            return Ok(());
        }
        for &child in tree.children(die) {
            if tree.tag(child) != constants::DW_TAG_enumerator {
                continue;
            }
            let name = tree.short_name(child).unwrap_or_default();
            let value = match tree.attr(child, constants::DW_AT_const_value) {
                Some(AttrValue::Sdata(value)) => *value,
                Some(other) => match other.as_u64() {
                    Some(value) => value as i64,
                    None => {
                        debug!("Enumerator {name} has a non-constant value");
                        continue;
                    }
                },
                None => {
                    debug!("Enumerator {name} has no value");
                    continue;
                }
            };
            self.enumerators.push((name.to_string(), value));
        }
        Ok(())
    }

    pub(super) fn render(&self) -> String
    {
        let mut out = String::from("enum ");
        if self.is_enum_class {
            out.push_str("class ");
        }
        if !self.name.is_empty() {
            out.push_str(&self.name);
            out.push(' ');
        }
        if let Some(base) = &self.base {
            out.push_str(": ");
            out.push_str(base);
            out.push(' ');
        }
        out.push_str("{\n");
        for (name, value) in &self.enumerators {
            out.push_str(&format!("    {name} = {value},\n"));
        }
        out.push_str("};");
        out
    }
}
