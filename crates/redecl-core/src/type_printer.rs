//! C++ type-name synthesis.
//!
//! Prints the type referenced by a node the way it would be spelled in a C++
//! declaration. Declarator syntax wraps around the declared identifier, so the
//! printer produces two halves: the text *before* the name (`int (*`) and the
//! text *after* it (`)[3]`). Printing a complete type name is the two halves
//! concatenated.
//!
//! The walk mirrors C declarator grammar: pointers and references are printed
//! on the way in, arrays and parameter lists on the way out, and parentheses
//! are inserted when a pointer binds to an array or function type.

use gimli::constants;

use crate::die::{AttrValue, DieId, DieTree};
use crate::error::Result;

/// Full, namespace-qualified spelling of a type. `None` prints `void`.
pub fn qualified_name(tree: &DieTree, die: Option<DieId>) -> Result<String>
{
    let mut printer = TypePrinter::new(tree);
    printer.append_qualified_name(die)?;
    Ok(printer.finish())
}

/// Text before and after the declared identifier.
pub fn declarator_parts(tree: &DieTree, die: Option<DieId>) -> Result<(String, String)>
{
    let mut before = TypePrinter::new(tree);
    let inner = before.append_qualified_name_before(die)?;

    let mut after = TypePrinter::new(tree);
    after.append_unqualified_name_after(die, inner, false)?;

    Ok((before.finish(), after.finish()))
}

/// Glue a declarator around `name`: `int *` + `p` gives `int *p`.
pub fn join_declarator(before: &str, name: &str, after: &str) -> String
{
    if name.is_empty() {
        return format!("{before}{after}");
    }
    if before.is_empty() || before.ends_with(['*', '&', '(']) {
        format!("{before}{name}{after}")
    } else {
        format!("{before} {name}{after}")
    }
}

/// Placeholder spelling for a type that has no name.
fn anonymous_name(tag: gimli::DwTag) -> &'static str
{
    match tag {
        constants::DW_TAG_structure_type => "(anonymous struct)",
        constants::DW_TAG_class_type => "(anonymous class)",
        constants::DW_TAG_union_type => "(anonymous union)",
        constants::DW_TAG_enumeration_type => "(anonymous enum)",
        constants::DW_TAG_namespace => "(anonymous namespace)",
        _ => "(anonymous)",
    }
}

fn is_record(tag: gimli::DwTag) -> bool
{
    matches!(
        tag,
        constants::DW_TAG_structure_type | constants::DW_TAG_class_type | constants::DW_TAG_union_type
    )
}

fn is_transparent(tag: gimli::DwTag) -> bool
{
    matches!(tag, constants::DW_TAG_restrict_type | constants::DW_TAG_atomic_type)
}

struct TypePrinter<'a>
{
    tree: &'a DieTree,
    out: String,
    /// The last thing printed was an identifier-like word and needs a space
    /// before a following `*` or `&`.
    word: bool,
}

impl<'a> TypePrinter<'a>
{
    fn new(tree: &'a DieTree) -> Self
    {
        Self {
            tree,
            out: String::new(),
            word: true,
        }
    }

    fn finish(self) -> String
    {
        self.out
    }

    fn append_qualified_name(&mut self, die: Option<DieId>) -> Result<()>
    {
        let inner = self.append_qualified_name_before(die)?;
        self.append_unqualified_name_after(die, inner, false)
    }

    fn append_qualified_name_before(&mut self, die: Option<DieId>) -> Result<Option<DieId>>
    {
        if let Some(parent) = die.and_then(|die| self.tree.parent(die)) {
            self.append_scopes(parent)?;
        }
        self.append_unqualified_name_before(die)
    }

    fn append_unqualified_name(&mut self, die: DieId) -> Result<()>
    {
        let inner = self.append_unqualified_name_before(Some(die))?;
        self.append_unqualified_name_after(Some(die), inner, false)
    }

    fn append_scopes(&mut self, die: DieId) -> Result<()>
    {
        if matches!(
            self.tree.tag(die),
            constants::DW_TAG_compile_unit
                | constants::DW_TAG_type_unit
                | constants::DW_TAG_skeleton_unit
                | constants::DW_TAG_partial_unit
                | constants::DW_TAG_subprogram
                | constants::DW_TAG_lexical_block
        ) {
            return Ok(());
        }

        let die = self.tree.resolve_type_unit_reference(die);
        if let Some(parent) = self.tree.parent(die) {
            self.append_scopes(parent)?;
        }
        self.append_unqualified_name(die)?;
        self.out.push_str("::");
        Ok(())
    }

    /// Print everything that precedes the identifier. Returns the referenced
    /// type, which the matching `after` call needs.
    fn append_unqualified_name_before(&mut self, die: Option<DieId>) -> Result<Option<DieId>>
    {
        let Some(die) = die else {
            self.out.push_str("void");
            return Ok(None);
        };

        let tag = self.tree.tag(die);
        if is_transparent(tag) {
            let target = self.tree.type_of(die)?;
            return self.append_qualified_name_before(target);
        }

        let inner = self.tree.type_of(die)?;
        self.word = true;
        match tag {
            constants::DW_TAG_pointer_type => self.append_pointer_like_before(inner, "*")?,
            constants::DW_TAG_reference_type => self.append_pointer_like_before(inner, "&")?,
            constants::DW_TAG_rvalue_reference_type => self.append_pointer_like_before(inner, "&&")?,
            constants::DW_TAG_subroutine_type => {
                self.append_qualified_name_before(inner)?;
                if self.word {
                    self.out.push(' ');
                }
                self.word = false;
            }
            constants::DW_TAG_array_type => {
                self.append_qualified_name_before(inner)?;
            }
            constants::DW_TAG_ptr_to_member_type => {
                self.append_qualified_name_before(inner)?;
                if self.needs_parens(inner) {
                    self.out.push('(');
                } else if self.word {
                    self.out.push(' ');
                }
                if let Some(container) = self.tree.reference(die, constants::DW_AT_containing_type)? {
                    let container = self.tree.resolve_type_unit_reference(container);
                    self.append_qualified_name(Some(container))?;
                    self.out.push_str("::");
                }
                self.out.push('*');
                self.word = false;
            }
            constants::DW_TAG_const_type | constants::DW_TAG_volatile_type => self.append_cv_before(die)?,
            constants::DW_TAG_unspecified_type if self.tree.short_name(die) == Some("decltype(nullptr)") => {
                self.out.push_str("std::nullptr_t");
            }
            _ => match self.tree.short_name(die) {
                Some(name) => {
                    self.out.push_str(name);
                    if !name.contains('<') && is_record(tag) {
                        self.append_template_arguments(die)?;
                    }
                }
                None => {
                    self.out.push_str(anonymous_name(tag));
                    return Ok(None);
                }
            },
        }
        Ok(inner)
    }

    /// Print everything that follows the identifier.
    fn append_unqualified_name_after(
        &mut self,
        die: Option<DieId>,
        inner: Option<DieId>,
        skip_first_param_if_artificial: bool,
    ) -> Result<()>
    {
        let Some(die) = die else {
            return Ok(());
        };

        match self.tree.tag(die) {
            constants::DW_TAG_subroutine_type => {
                self.append_subroutine_after(die, inner, skip_first_param_if_artificial, false, false)?;
            }
            constants::DW_TAG_array_type => self.append_array_bounds(die),
            constants::DW_TAG_const_type | constants::DW_TAG_volatile_type => self.append_cv_after(die)?,
            tag @ (constants::DW_TAG_ptr_to_member_type
            | constants::DW_TAG_reference_type
            | constants::DW_TAG_rvalue_reference_type
            | constants::DW_TAG_pointer_type) => {
                if self.needs_parens(inner) {
                    self.out.push(')');
                }
                let inner_inner = self.type_of_opt(inner)?;
                self.append_unqualified_name_after(inner, inner_inner, tag == constants::DW_TAG_ptr_to_member_type)?;
            }
            tag if is_transparent(tag) => {
                let target = self.tree.type_of(die)?;
                self.append_unqualified_name_after(target, inner, false)?;
            }
            _ => {}
        }
        Ok(())
    }

    fn append_pointer_like_before(&mut self, inner: Option<DieId>, ptr: &str) -> Result<()>
    {
        self.append_qualified_name_before(inner)?;
        if self.word {
            self.out.push(' ');
        }
        if self.needs_parens(inner) {
            self.out.push('(');
        }
        self.out.push_str(ptr);
        self.word = false;
        Ok(())
    }

    /// Split a `const`/`volatile` chain into its qualifiers and the qualified type.
    fn decompose_cv(&self, die: DieId) -> Result<(Option<DieId>, bool, bool)>
    {
        let mut is_const = self.tree.tag(die) == constants::DW_TAG_const_type;
        let mut is_volatile = !is_const;
        let mut target = self.tree.type_of(die)?;
        if let Some(next) = target {
            match self.tree.tag(next) {
                constants::DW_TAG_const_type => {
                    is_const = true;
                    target = self.tree.type_of(next)?;
                }
                constants::DW_TAG_volatile_type => {
                    is_volatile = true;
                    target = self.tree.type_of(next)?;
                }
                _ => {}
            }
        }
        Ok((target, is_const, is_volatile))
    }

    fn append_cv_before(&mut self, die: DieId) -> Result<()>
    {
        let (target, is_const, is_volatile) = self.decompose_cv(die)?;
        let subroutine = target.is_some_and(|t| self.tree.tag(t) == constants::DW_TAG_subroutine_type);

        let mut element = target;
        while let Some(array) = element.filter(|a| self.tree.tag(*a) == constants::DW_TAG_array_type) {
            element = self.tree.type_of(array)?;
        }
        let leading = !subroutine
            && element.map_or(true, |e| {
                !matches!(
                    self.tree.tag(e),
                    constants::DW_TAG_pointer_type | constants::DW_TAG_ptr_to_member_type
                )
            });

        if leading {
            if is_const {
                self.out.push_str("const ");
            }
            if is_volatile {
                self.out.push_str("volatile ");
            }
        }
        self.append_qualified_name_before(target)?;
        if !leading && !subroutine {
            self.word = true;
            if is_const {
                self.out.push_str("const");
            }
            if is_volatile {
                if is_const {
                    self.out.push(' ');
                }
                self.out.push_str("volatile");
            }
        }
        Ok(())
    }

    fn append_cv_after(&mut self, die: DieId) -> Result<()>
    {
        let (target, is_const, is_volatile) = self.decompose_cv(die)?;
        let target_inner = self.type_of_opt(target)?;
        match target {
            Some(subroutine) if self.tree.tag(subroutine) == constants::DW_TAG_subroutine_type => {
                self.append_subroutine_after(subroutine, target_inner, false, is_const, is_volatile)
            }
            _ => self.append_unqualified_name_after(target, target_inner, false),
        }
    }

    fn append_subroutine_after(
        &mut self,
        die: DieId,
        inner: Option<DieId>,
        skip_first_param_if_artificial: bool,
        mut is_const: bool,
        mut is_volatile: bool,
    ) -> Result<()>
    {
        self.out.push('(');

        let mut first = true;
        let mut real_first = true;
        let mut artificial_this = None;
        for &param in self.tree.children(die) {
            let tag = self.tree.tag(param);
            if tag != constants::DW_TAG_formal_parameter && tag != constants::DW_TAG_unspecified_parameters {
                continue;
            }
            let param_type = self.tree.type_of(param)?;
            if skip_first_param_if_artificial && real_first && self.tree.has_attr(param, constants::DW_AT_artificial) {
                artificial_this = param_type;
                real_first = false;
                continue;
            }
            real_first = false;
            if !first {
                self.out.push_str(", ");
            }
            first = false;
            if tag == constants::DW_TAG_unspecified_parameters {
                self.out.push_str("...");
            } else {
                self.append_qualified_name(param_type)?;
            }
        }
        self.out.push(')');

        // Member function pointers carry their cv-qualifiers on `this`.
        if let Some(this) = artificial_this.filter(|t| self.tree.tag(*t) == constants::DW_TAG_pointer_type) {
            let mut step = self.tree.type_of(this)?;
            for _ in 0..2 {
                let Some(qualifier) = step else {
                    break;
                };
                match self.tree.tag(qualifier) {
                    constants::DW_TAG_const_type => is_const = true,
                    constants::DW_TAG_volatile_type => is_volatile = true,
                    _ => break,
                }
                step = self.tree.type_of(qualifier)?;
            }
        }

        if is_const {
            self.out.push_str(" const");
        }
        if is_volatile {
            self.out.push_str(" volatile");
        }
        if self.tree.has_attr(die, constants::DW_AT_reference) {
            self.out.push_str(" &");
        }
        if self.tree.has_attr(die, constants::DW_AT_rvalue_reference) {
            self.out.push_str(" &&");
        }

        let inner_inner = self.type_of_opt(inner)?;
        self.append_unqualified_name_after(inner, inner_inner, false)
    }

    fn append_array_bounds(&mut self, die: DieId)
    {
        for &child in self.tree.children(die) {
            if self.tree.tag(child) != constants::DW_TAG_subrange_type {
                continue;
            }
            let count = self.tree.udata(child, constants::DW_AT_count).or_else(|| {
                let upper = self.tree.udata(child, constants::DW_AT_upper_bound)?;
                let lower = self.tree.udata(child, constants::DW_AT_lower_bound).unwrap_or(0);
                upper.checked_sub(lower)?.checked_add(1)
            });
            match count {
                Some(count) => self.out.push_str(&format!("[{count}]")),
                None => self.out.push_str("[]"),
            }
        }
    }

    /// Rebuild `<...>` for names emitted without their template arguments.
    fn append_template_arguments(&mut self, die: DieId) -> Result<()>
    {
        let mut arguments = Vec::new();
        self.collect_template_arguments(die, &mut arguments)?;
        if arguments.is_empty() {
            return Ok(());
        }

        let joined = arguments.join(", ");
        self.out.push('<');
        self.out.push_str(&joined);
        if joined.ends_with('>') {
            self.out.push(' ');
        }
        self.out.push('>');
        Ok(())
    }

    fn collect_template_arguments(&self, die: DieId, arguments: &mut Vec<String>) -> Result<()>
    {
        for &child in self.tree.children(die) {
            match self.tree.tag(child) {
                constants::DW_TAG_template_type_parameter => {
                    arguments.push(qualified_name(self.tree, self.tree.type_of(child)?)?);
                }
                constants::DW_TAG_template_value_parameter => {
                    let is_bool = self
                        .tree
                        .type_of(child)?
                        .and_then(|t| self.tree.short_name(t))
                        .is_some_and(|name| name == "bool");
                    match self.tree.attr(child, constants::DW_AT_const_value) {
                        Some(AttrValue::Sdata(value)) if !is_bool => arguments.push(value.to_string()),
                        Some(value) => match value.as_u64() {
                            Some(value) if is_bool => arguments.push((value != 0).to_string()),
                            Some(value) => arguments.push(value.to_string()),
                            None => {}
                        },
                        None => {}
                    }
                }
                constants::DW_TAG_GNU_template_parameter_pack => self.collect_template_arguments(child, arguments)?,
                _ => {}
            }
        }
        Ok(())
    }

    fn needs_parens(&self, die: Option<DieId>) -> bool
    {
        die.is_some_and(|die| {
            matches!(
                self.tree.tag(die),
                constants::DW_TAG_subroutine_type | constants::DW_TAG_array_type
            )
        })
    }

    fn type_of_opt(&self, die: Option<DieId>) -> Result<Option<DieId>>
    {
        match die {
            Some(die) => self.tree.type_of(die),
            None => Ok(None),
        }
    }
}
