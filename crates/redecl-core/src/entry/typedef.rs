use super::inline_anonymous;
use crate::die::{DieId, DieTree};
use crate::error::Result;
use crate::type_printer;

/// `using Name = Target;`, or the legacy `typedef Target A, B;` form when the
/// target is an inline anonymous type or several names alias the same type.
#[derive(Debug, Clone)]
pub struct Typedef
{
    names: Vec<String>,
    target: String,
    is_alias: bool,
}

impl Default for Typedef
{
    fn default() -> Self
    {
        Self::new()
    }
}

impl Typedef
{
    pub fn new() -> Self
    {
        Self {
            names: Vec::new(),
            target: String::new(),
            is_alias: true,
        }
    }

    pub fn names(&self) -> &[String]
    {
        &self.names
    }

    pub fn target(&self) -> &str
    {
        &self.target
    }

    pub(super) fn parse(&mut self, tree: &DieTree, die: DieId) -> Result<()>
    {
        if let Some(name) = tree.short_name(die) {
            if !self.names.iter().any(|known| known == name) {
                self.names.push(name.to_string());
            }
        }

        if !self.target.is_empty() {
            return Ok(());
        }
        match tree.type_of(die)? {
            Some(ty) => match inline_anonymous(tree, ty)? {
                Some(inline) => {
                    self.target = inline;
                    self.is_alias = false;
                }
                None => self.target = type_printer::qualified_name(tree, Some(ty))?,
            },
            None => self.target = type_printer::qualified_name(tree, None)?,
        }
        Ok(())
    }

    pub(super) fn render(&self) -> String
    {
        match self.names.as_slice() {
            [name] if self.is_alias => format!("using {name} = {};", self.target),
            names => format!("typedef {} {};", self.target, names.join(", ")),
        }
    }
}
