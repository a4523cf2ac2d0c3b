use gimli::constants;

use super::inline_anonymous;
use crate::die::{AttrValue, DieId, DieTree};
use crate::error::Result;
use crate::type_printer;

/// `DW_OP_plus_uconst`, used by old producers to encode member offsets.
const DW_OP_PLUS_UCONST: u8 = 0x23;

/// A compile-time constant attached to a static member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstValue
{
    Signed(i64),
    Unsigned(u64),
}

impl ConstValue
{
    fn bits(self) -> u64
    {
        match self {
            ConstValue::Signed(value) => value as u64,
            ConstValue::Unsigned(value) => value,
        }
    }

    /// Literal spelling, chosen by the trailing word of the declared type.
    pub fn to_literal(self, type_text: &str) -> String
    {
        let type_text = type_text.trim_end();
        let last_word = type_text.rsplit(' ').next().unwrap_or_default();
        if type_text.ends_with("float") {
            let value = f32::from_bits(self.bits() as u32);
            return float_literal(f64::from(value), &format!("{value:?}"));
        }
        if type_text.ends_with("double") {
            let value = f64::from_bits(self.bits());
            return float_literal(value, &format!("{value:?}"));
        }
        if type_text.ends_with("char") || matches!(last_word, "wchar_t" | "char8_t" | "char16_t" | "char32_t") {
            return char_literal(self.bits());
        }
        if last_word == "bool" {
            return if self.bits() == 0 { "false" } else { "true" }.to_string();
        }
        match self {
            ConstValue::Signed(value) => value.to_string(),
            ConstValue::Unsigned(value) => value.to_string(),
        }
    }
}

fn float_literal(value: f64, shortest: &str) -> String
{
    if value.is_nan() {
        "NAN".to_string()
    } else if value.is_infinite() {
        if value < 0.0 { "-INFINITY" } else { "INFINITY" }.to_string()
    } else {
        shortest.to_string()
    }
}

fn char_literal(bits: u64) -> String
{
    // Sign-extended negative `char` values keep only their low byte.
    let value = if bits & !0xFF == !0xFF { bits & 0xFF } else { bits };
    match value {
        0x27 => "'\\''".to_string(),
        0x5C => "'\\\\'".to_string(),
        // Printable ASCII.
        0x20..=0x7E => format!("'{}'", char::from(value as u8)),
        0..=0xFF => format!("'\\x{value:02x}'"),
        0x100..=0xFFFF => format!("'\\u{value:04x}'"),
        _ => format!("'\\U{value:08x}'"),
    }
}

/// Data member, static member or bit-field.
#[derive(Debug, Clone, Default)]
pub struct Field
{
    name: String,
    before: String,
    after: String,
    offset: Option<u64>,
    bit_size: Option<u64>,
    default_value: Option<ConstValue>,
    is_static: bool,
    is_mutable: bool,
}

impl Field
{
    pub fn new() -> Self
    {
        Self::default()
    }

    /// A `DW_TAG_variable` nested in a class: always a static member.
    pub fn static_member() -> Self
    {
        Self {
            is_static: true,
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str
    {
        &self.name
    }

    pub fn offset(&self) -> Option<u64>
    {
        self.offset
    }

    pub(super) fn parse(&mut self, tree: &DieTree, die: DieId) -> Result<()>
    {
        if let Some(name) = tree.short_name(die) {
            self.name = name.to_string();
        }

        let ty = tree.type_of(die)?;
        match ty.map(|ty| inline_anonymous(tree, ty)).transpose()?.flatten() {
            Some(inline) => {
                self.before = inline;
                self.after.clear();
            }
            None => (self.before, self.after) = type_printer::declarator_parts(tree, ty)?,
        }

        if let Some(offset) = tree.attr(die, constants::DW_AT_data_member_location).and_then(member_offset) {
            self.offset = Some(offset);
        }
        if let Some(bits) = tree.udata(die, constants::DW_AT_bit_size) {
            self.bit_size = Some(bits);
        }
        self.is_static |= tree.has_attr(die, constants::DW_AT_external);
        self.is_mutable |= tree.has_attr(die, constants::DW_AT_mutable);

        match tree.attr(die, constants::DW_AT_const_value) {
            Some(AttrValue::Sdata(value)) => self.default_value = Some(ConstValue::Signed(*value)),
            Some(other) => {
                if let Some(value) = other.as_u64() {
                    self.default_value = Some(ConstValue::Unsigned(value));
                }
            }
            None => {}
        }
        Ok(())
    }

    pub(super) fn render(&self) -> String
    {
        let mut out = String::new();
        if self.is_static {
            out.push_str("static ");
        }
        if self.is_mutable {
            out.push_str("mutable ");
        }
        out.push_str(&type_printer::join_declarator(&self.before, &self.name, &self.after));
        if let Some(bits) = self.bit_size {
            out.push_str(&format!(" : {bits}"));
        }
        if let Some(value) = self.default_value {
            out.push_str(" = ");
            out.push_str(&value.to_literal(&self.before));
        }
        out.push(';');
        if let Some(offset) = self.offset {
            out.push_str(&format!(" // +{offset}"));
        }
        out
    }
}

/// Byte offset from a constant, or from a `DW_OP_plus_uconst` expression.
fn member_offset(value: &AttrValue) -> Option<u64>
{
    match value {
        AttrValue::Block(bytes) => match bytes.split_first() {
            Some((&DW_OP_PLUS_UCONST, rest)) => read_uleb128(rest),
            _ => None,
        },
        other => other.as_u64(),
    }
}

fn read_uleb128(bytes: &[u8]) -> Option<u64>
{
    let mut value = 0u64;
    for (index, byte) in bytes.iter().enumerate().take(10) {
        value |= u64::from(byte & 0x7F) << (7 * index);
        if byte & 0x80 == 0 {
            return Some(value);
        }
    }
    None
}

#[cfg(test)]
mod tests
{
    use gimli::constants::*;

    use super::*;

    fn render(tree: &DieTree, die: DieId) -> String
    {
        let mut field = if tree.tag(die) == DW_TAG_variable {
            Field::static_member()
        } else {
            Field::new()
        };
        field.parse(tree, die).unwrap();
        field.render()
    }

    #[test]
    fn test_plain_member_with_offset()
    {
        let mut tree = DieTree::new();
        let cu = tree.compile_unit("a.cpp", "/src");
        let int = tree.die(cu, DW_TAG_base_type).name("int").id();
        let record = tree.die(cu, DW_TAG_structure_type).name("S").id();
        let count = tree
            .die(record, DW_TAG_member)
            .name("count")
            .type_ref(int)
            .udata(DW_AT_data_member_location, 8)
            .id();
        let flags = tree
            .die(record, DW_TAG_member)
            .name("flags")
            .type_ref(int)
            .udata(DW_AT_bit_size, 3)
            .flag(DW_AT_mutable)
            .id();

        assert_eq!(render(&tree, count), "int count; // +8");
        assert_eq!(render(&tree, flags), "mutable int flags : 3;");
    }

    #[test]
    fn test_location_expression_offset()
    {
        assert_eq!(member_offset(&AttrValue::Block(vec![0x23, 0x90, 0x01])), Some(144));
        assert_eq!(member_offset(&AttrValue::Udata(4)), Some(4));
        assert_eq!(member_offset(&AttrValue::Block(vec![0x91, 0x00])), None);
    }

    #[test]
    fn test_static_constant_float()
    {
        let mut tree = DieTree::new();
        let cu = tree.compile_unit("a.cpp", "/src");
        let float = tree.die(cu, DW_TAG_base_type).name("float").id();
        let const_float = tree.die(cu, DW_TAG_const_type).type_ref(float).id();
        let record = tree.die(cu, DW_TAG_structure_type).name("Math").id();
        let pi = tree
            .die(record, DW_TAG_variable)
            .name("pi")
            .type_ref(const_float)
            .attr(DW_AT_const_value, AttrValue::Block(vec![0xdb, 0x0f, 0x49, 0x40]))
            .id();

        assert_eq!(render(&tree, pi), "static const float pi = 3.1415927;");
    }

    #[test]
    fn test_literals_follow_declared_type()
    {
        assert_eq!(ConstValue::Unsigned(0x4000_0000_0000_0000).to_literal("const double"), "2.0");
        assert_eq!(ConstValue::Unsigned(0x7FC0_0000).to_literal("float"), "NAN");
        assert_eq!(ConstValue::Signed(-1).to_literal("const int"), "-1");
        assert_eq!(ConstValue::Unsigned(1).to_literal("const bool"), "true");
        assert_eq!(ConstValue::Unsigned(u64::MAX).to_literal("unsigned long"), "18446744073709551615");
    }

    #[test]
    fn test_char_literals()
    {
        assert_eq!(ConstValue::Unsigned(u64::from(b'A')).to_literal("const char"), "'A'");
        assert_eq!(ConstValue::Unsigned(u64::from(b'\'')).to_literal("char"), "'\\''");
        assert_eq!(ConstValue::Unsigned(u64::from(b'\\')).to_literal("char"), "'\\\\'");
        assert_eq!(ConstValue::Signed(-1).to_literal("const char"), "'\\xff'");
        assert_eq!(ConstValue::Unsigned(0x3A9).to_literal("const wchar_t"), "'\\u03a9'");
        assert_eq!(ConstValue::Unsigned(0x1F600).to_literal("char32_t"), "'\\U0001f600'");
    }

    #[test]
    fn test_array_member_and_anonymous_union()
    {
        let mut tree = DieTree::new();
        let cu = tree.compile_unit("a.cpp", "/src");
        let int = tree.die(cu, DW_TAG_base_type).name("int").id();
        let float = tree.die(cu, DW_TAG_base_type).name("float").id();
        let array = tree.die(cu, DW_TAG_array_type).type_ref(int).id();
        let _ = tree.die(array, DW_TAG_subrange_type).udata(DW_AT_count, 4).id();
        let record = tree.die(cu, DW_TAG_structure_type).name("S").id();
        let values = tree.die(record, DW_TAG_member).name("values").type_ref(array).id();
        let union = tree.die(record, DW_TAG_union_type).id();
        let _ = tree.die(union, DW_TAG_member).name("i").type_ref(int).decl("/src/s.h", 4).id();
        let _ = tree.die(union, DW_TAG_member).name("f").type_ref(float).decl("/src/s.h", 5).id();
        let variant = tree.die(record, DW_TAG_member).type_ref(union).id();

        assert_eq!(render(&tree, values), "int values[4];");
        assert_eq!(render(&tree, variant), "union {\n    int i;\n    float f;\n};");
    }
}
