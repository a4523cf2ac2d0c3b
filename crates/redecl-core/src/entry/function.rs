use gimli::constants;

use super::{template_parameters, Virtuality};
use crate::die::{DieId, DieTree};
use crate::error::Result;
use crate::type_printer;

/// One formal parameter, or the `...` of a variadic function.
#[derive(Debug, Clone, Default)]
pub struct Parameter
{
    name: String,
    before: String,
    after: String,
    is_variadic: bool,
}

impl Parameter
{
    pub fn variadic() -> Self
    {
        Self {
            is_variadic: true,
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str
    {
        &self.name
    }

    pub(super) fn parse(&mut self, tree: &DieTree, die: DieId) -> Result<()>
    {
        if tree.tag(die) == constants::DW_TAG_unspecified_parameters {
            self.is_variadic = true;
            return Ok(());
        }
        if let Some(name) = tree.short_name(die) {
            self.name = name.to_string();
        }
        (self.before, self.after) = type_printer::declarator_parts(tree, tree.type_of(die)?)?;
        Ok(())
    }

    pub(super) fn render(&self) -> String
    {
        if self.is_variadic {
            return "...".to_string();
        }
        type_printer::join_declarator(&self.before, &self.name, &self.after)
    }
}

/// Free function or member function declaration.
#[derive(Debug, Clone)]
pub struct Function
{
    name: String,
    linkage_name: Option<String>,
    /// Name of the containing class, for member functions.
    owner: Option<String>,
    return_type: String,
    has_return_type: bool,
    parameters: Vec<Parameter>,
    template: Option<String>,
    virtuality: Virtuality,
    is_static: bool,
    is_const: bool,
    is_explicit: bool,
    is_defaulted: bool,
    is_deleted: bool,
}

impl Function
{
    fn with_owner(owner: Option<String>) -> Self
    {
        Self {
            name: String::new(),
            linkage_name: None,
            // Member functions are static until an implicit `this` shows up.
            is_static: owner.is_some(),
            owner,
            return_type: String::new(),
            has_return_type: false,
            parameters: Vec::new(),
            template: None,
            virtuality: Virtuality::None,
            is_const: false,
            is_explicit: false,
            is_defaulted: false,
            is_deleted: false,
        }
    }

    pub fn free() -> Self
    {
        Self::with_owner(None)
    }

    pub fn member(owner: &str) -> Self
    {
        Self::with_owner(Some(owner.to_string()))
    }

    pub fn name(&self) -> &str
    {
        &self.name
    }

    pub fn parameters(&self) -> &[Parameter]
    {
        &self.parameters
    }

    pub fn virtuality(&self) -> Virtuality
    {
        self.virtuality
    }

    pub fn is_member(&self) -> bool
    {
        self.owner.is_some()
    }

    pub fn is_static(&self) -> bool
    {
        self.is_static
    }

    pub fn is_const(&self) -> bool
    {
        self.is_const
    }

    pub(super) fn parse(&mut self, tree: &DieTree, die: DieId) -> Result<()>
    {
        if let Some(name) = tree.short_name(die) {
            self.name = name.to_string();
        }
        if let Some(linkage_name) = tree.linkage_name(die) {
            self.linkage_name = Some(linkage_name.to_string());
        }

        match tree.type_of(die)? {
            Some(ty) => {
                self.return_type = type_printer::qualified_name(tree, Some(ty))?;
                self.has_return_type = true;
            }
            None if self.return_type.is_empty() => self.return_type = type_printer::qualified_name(tree, None)?,
            None => {}
        }

        self.is_explicit |= tree.has_attr(die, constants::DW_AT_explicit);
        self.is_defaulted |= tree.udata(die, constants::DW_AT_defaulted).is_some_and(|value| value != 0);
        self.is_deleted |= tree.has_attr(die, constants::DW_AT_deleted);
        if let Some(value) = tree.udata(die, constants::DW_AT_virtuality) {
            let virtuality = Virtuality::try_from(value)?;
            if virtuality != Virtuality::None {
                self.virtuality = virtuality;
            }
        }

        let parameters = self.parse_parameters(tree, die)?;
        if !parameters.is_empty() {
            self.parameters = parameters;
        }

        if let Some(template) = template_parameters(tree, die)? {
            self.template = Some(template);
        }
        Ok(())
    }

    fn parse_parameters(&mut self, tree: &DieTree, die: DieId) -> Result<Vec<Parameter>>
    {
        let mut parameters = Vec::new();
        let mut first = true;
        for &child in tree.children(die) {
            match tree.tag(child) {
                constants::DW_TAG_formal_parameter => {
                    if first && self.is_member() && tree.has_attr(child, constants::DW_AT_artificial) {
                        self.is_static = false;
                        self.is_const |= points_to_const(tree, child)?;
                    } else {
                        let mut parameter = Parameter::default();
                        parameter.parse(tree, child)?;
                        parameters.push(parameter);
                    }
                    first = false;
                }
                constants::DW_TAG_unspecified_parameters => parameters.push(Parameter::variadic()),
                _ => {}
            }
        }
        Ok(parameters)
    }

    /// Constructors, destructors and conversion operators are declared
    /// without a return type.
    fn prints_return_type(&self) -> bool
    {
        if self.linkage_name.is_some() && is_conversion_operator(&self.name) {
            return false;
        }
        match &self.owner {
            Some(owner) if !self.has_return_type => {
                let class_name = owner.split('<').next().unwrap_or_default();
                !(self.name.starts_with('~') || self.name == class_name)
            }
            _ => true,
        }
    }

    pub(super) fn render(&self) -> String
    {
        let mut out = String::new();
        if let Some(template) = &self.template {
            out.push_str("// ");
            out.push_str(template);
            out.push('\n');
        }

        if self.is_member() && self.is_static {
            out.push_str("static ");
        }
        if self.virtuality != Virtuality::None {
            out.push_str("virtual ");
        }
        if self.prints_return_type() {
            out.push_str(&self.return_type);
            out.push(' ');
        }
        if self.is_explicit {
            out.push_str("explicit ");
        }

        let parameters: Vec<String> = self.parameters.iter().map(Parameter::render).collect();
        out.push_str(&self.name);
        out.push('(');
        out.push_str(&parameters.join(", "));
        out.push(')');

        if self.is_const {
            out.push_str(" const");
        }
        if self.virtuality == Virtuality::PureVirtual {
            out.push_str(" = 0");
        }
        if self.is_defaulted {
            out.push_str(" = default");
        }
        if self.is_deleted {
            out.push_str(" = delete");
        }
        out.push(';');
        out
    }
}

/// `operator int`, `operator const char *`, but not `operator new`.
fn is_conversion_operator(name: &str) -> bool
{
    match name.strip_prefix("operator ") {
        Some(target) => !matches!(target, "new" | "delete" | "new[]" | "delete[]"),
        None => false,
    }
}

/// Whether the implicit `this` parameter is a pointer to a const object.
fn points_to_const(tree: &DieTree, this: DieId) -> Result<bool>
{
    let Some(pointer) = tree.type_of(this)? else {
        return Ok(false);
    };
    if tree.tag(pointer) != constants::DW_TAG_pointer_type {
        return Ok(false);
    }
    Ok(tree.type_of(pointer)?.is_some_and(|pointee| tree.tag(pointee) == constants::DW_TAG_const_type))
}

#[cfg(test)]
mod tests
{
    use gimli::constants::*;

    use super::*;

    struct Fixture
    {
        tree: DieTree,
        class: DieId,
        int: DieId,
        this: DieId,
        const_this: DieId,
    }

    fn fixture() -> Fixture
    {
        let mut tree = DieTree::new();
        let cu = tree.compile_unit("a.cpp", "/src");
        let int = tree.die(cu, DW_TAG_base_type).name("int").id();
        let class = tree.die(cu, DW_TAG_class_type).name("Widget").id();
        let this = tree.die(cu, DW_TAG_pointer_type).type_ref(class).id();
        let const_class = tree.die(cu, DW_TAG_const_type).type_ref(class).id();
        let const_this = tree.die(cu, DW_TAG_pointer_type).type_ref(const_class).id();
        Fixture {
            tree,
            class,
            int,
            this,
            const_this,
        }
    }

    fn parse(tree: &DieTree, function: &mut Function, die: DieId) -> String
    {
        function.parse(tree, die).unwrap();
        function.render()
    }

    #[test]
    fn test_free_function()
    {
        let Fixture { mut tree, int, .. } = fixture();
        let cu = tree.units()[0].root;
        let add = tree.die(cu, DW_TAG_subprogram).name("add").type_ref(int).id();
        let _ = tree.die(add, DW_TAG_formal_parameter).name("a").type_ref(int).id();
        let _ = tree.die(add, DW_TAG_formal_parameter).type_ref(int).id();
        let _ = tree.die(add, DW_TAG_unspecified_parameters).id();

        assert_eq!(parse(&tree, &mut Function::free(), add), "int add(int a, int, ...);");
    }

    #[test]
    fn test_const_member_function()
    {
        let Fixture {
            mut tree,
            class,
            const_this,
            ..
        } = fixture();
        let bar = tree.die(class, DW_TAG_subprogram).name("bar").linkage_name("_ZNK6Widget3barEv").id();
        let _ = tree.die(bar, DW_TAG_formal_parameter).type_ref(const_this).flag(DW_AT_artificial).id();

        let mut function = Function::member("Widget");
        assert_eq!(parse(&tree, &mut function, bar), "void bar() const;");
        assert!(!function.is_static());
    }

    #[test]
    fn test_static_member_function()
    {
        let Fixture { mut tree, class, int, .. } = fixture();
        let create = tree.die(class, DW_TAG_subprogram).name("create").type_ref(int).id();

        assert_eq!(parse(&tree, &mut Function::member("Widget"), create), "static int create();");
    }

    #[test]
    fn test_constructor_and_destructor_have_no_return_type()
    {
        let Fixture {
            mut tree, class, this, int, ..
        } = fixture();
        let ctor = tree.die(class, DW_TAG_subprogram).name("Widget").flag(DW_AT_explicit).id();
        let _ = tree.die(ctor, DW_TAG_formal_parameter).type_ref(this).flag(DW_AT_artificial).id();
        let _ = tree.die(ctor, DW_TAG_formal_parameter).type_ref(int).id();
        let dtor = tree.die(class, DW_TAG_subprogram).name("~Widget").udata(DW_AT_virtuality, 1).id();
        let _ = tree.die(dtor, DW_TAG_formal_parameter).type_ref(this).flag(DW_AT_artificial).id();

        assert_eq!(parse(&tree, &mut Function::member("Widget<int>"), ctor), "explicit Widget(int);");
        assert_eq!(parse(&tree, &mut Function::member("Widget<int>"), dtor), "virtual ~Widget();");
    }

    #[test]
    fn test_conversion_operator()
    {
        let Fixture {
            mut tree, class, int, const_this, ..
        } = fixture();
        let conversion = tree
            .die(class, DW_TAG_subprogram)
            .name("operator int")
            .linkage_name("_ZNK6WidgetcviEv")
            .type_ref(int)
            .id();
        let _ = tree.die(conversion, DW_TAG_formal_parameter).type_ref(const_this).flag(DW_AT_artificial).id();

        assert_eq!(parse(&tree, &mut Function::member("Widget"), conversion), "operator int() const;");
        assert!(!is_conversion_operator("operator new"));
    }

    #[test]
    fn test_pure_virtual_defaulted_and_deleted()
    {
        let Fixture { mut tree, class, this, .. } = fixture();
        let draw = tree.die(class, DW_TAG_subprogram).name("draw").udata(DW_AT_virtuality, 2).id();
        let _ = tree.die(draw, DW_TAG_formal_parameter).type_ref(this).flag(DW_AT_artificial).id();
        let copy = tree
            .die(class, DW_TAG_subprogram)
            .name("reset")
            .udata(DW_AT_defaulted, 1)
            .flag(DW_AT_deleted)
            .id();
        let _ = tree.die(copy, DW_TAG_formal_parameter).type_ref(this).flag(DW_AT_artificial).id();

        assert_eq!(parse(&tree, &mut Function::member("Widget"), draw), "virtual void draw() = 0;");
        assert_eq!(
            parse(&tree, &mut Function::member("Widget"), copy),
            "void reset() = default = delete;"
        );
    }

    #[test]
    fn test_template_header_is_commented()
    {
        let Fixture { mut tree, int, .. } = fixture();
        let cu = tree.units()[0].root;
        let max = tree.die(cu, DW_TAG_subprogram).name("max<int>").type_ref(int).id();
        let _ = tree.die(max, DW_TAG_template_type_parameter).name("T").type_ref(int).id();

        assert_eq!(parse(&tree, &mut Function::free(), max), "// template <typename T>\nint max<int>();");
    }

    #[test]
    fn test_reparse_keeps_richer_description()
    {
        let Fixture { mut tree, int, .. } = fixture();
        let cu = tree.units()[0].root;
        let full = tree.die(cu, DW_TAG_subprogram).name("scale").type_ref(int).flag(DW_AT_explicit).id();
        let _ = tree.die(full, DW_TAG_formal_parameter).name("factor").type_ref(int).id();
        let sparse = tree.die(cu, DW_TAG_subprogram).name("scale").type_ref(int).id();

        let mut function = Function::free();
        function.parse(&tree, full).unwrap();
        function.parse(&tree, sparse).unwrap();
        assert_eq!(function.parameters().len(), 1);
        assert_eq!(function.parameters()[0].name(), "factor");
        assert_eq!(function.render(), "int explicit scale(int factor);");
    }
}
