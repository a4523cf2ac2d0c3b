//! # Standard Library Cleanup
//!
//! Rewrites standard library spellings in generated headers into the form a
//! person would write.
//!
//! Debug information names every template argument, defaulted or not, and
//! libc++ puts everything in an inline versioning namespace. So a plain
//! `std::vector<int>` comes out as
//! `std::__1::vector<int, std::__1::allocator<int> >`. Cleanup:
//!
//! - strips the `std::__1::` and `std::__ndk1::` inline namespaces,
//! - drops trailing template arguments that equal the container's defaults,
//! - folds `std::basic_string<char>` and friends into their aliases,
//! - replaces a few fully spelled-out library types with their member alias.
//!
//! Templates are matched by parsing their argument lists, and the rewrite is
//! repeated until nothing changes, so nested containers collapse from the
//! outside in.

const INLINE_NAMESPACES: &[&str] = &["std::__1::", "std::__ndk1::"];

/// Exact spellings with a shorter standard name.
const LITERAL_REPLACEMENTS: &[(&str, &str)] = &[(
    "std::chrono::time_point<std::chrono::steady_clock, std::chrono::duration<long long, std::ratio<1L, 1000000000L> > >",
    "std::chrono::steady_clock::time_point",
)];

/// A standard template and how to rebuild its defaulted arguments.
struct Rule
{
    name: &'static str,
    /// Leading arguments that are always written out.
    kept: usize,
    defaults: fn(&[&str]) -> Vec<String>,
}

fn allocator(args: &[&str]) -> Vec<String>
{
    vec![format!("std::allocator<{}>", args[0])]
}

fn pair_allocator(args: &[&str]) -> String
{
    format!("std::allocator<std::pair<const {}, {}>>", args[0], args[1])
}

const RULES: &[Rule] = &[
    Rule { name: "vector", kept: 1, defaults: allocator },
    Rule { name: "list", kept: 1, defaults: allocator },
    Rule { name: "forward_list", kept: 1, defaults: allocator },
    Rule { name: "deque", kept: 1, defaults: allocator },
    Rule {
        name: "queue",
        kept: 1,
        defaults: |args| vec![format!("std::deque<{}>", args[0])],
    },
    Rule {
        name: "unique_ptr",
        kept: 1,
        defaults: |args| vec![format!("std::default_delete<{}>", args[0])],
    },
    Rule {
        name: "set",
        kept: 1,
        defaults: |args| vec![format!("std::less<{}>", args[0]), format!("std::allocator<{}>", args[0])],
    },
    Rule {
        name: "multiset",
        kept: 1,
        defaults: |args| vec![format!("std::less<{}>", args[0]), format!("std::allocator<{}>", args[0])],
    },
    Rule {
        name: "map",
        kept: 2,
        defaults: |args| vec![format!("std::less<{}>", args[0]), pair_allocator(args)],
    },
    Rule {
        name: "multimap",
        kept: 2,
        defaults: |args| vec![format!("std::less<{}>", args[0]), pair_allocator(args)],
    },
    Rule {
        name: "unordered_set",
        kept: 1,
        defaults: |args| {
            vec![
                format!("std::hash<{}>", args[0]),
                format!("std::equal_to<{}>", args[0]),
                format!("std::allocator<{}>", args[0]),
            ]
        },
    },
    Rule {
        name: "unordered_map",
        kept: 2,
        defaults: |args| {
            vec![
                format!("std::hash<{}>", args[0]),
                format!("std::equal_to<{}>", args[0]),
                pair_allocator(args),
            ]
        },
    },
    Rule {
        name: "basic_string",
        kept: 1,
        defaults: |args| vec![format!("std::char_traits<{}>", args[0]), format!("std::allocator<{}>", args[0])],
    },
    Rule {
        name: "basic_string_view",
        kept: 1,
        defaults: |args| vec![format!("std::char_traits<{}>", args[0])],
    },
];

/// Apply every rewrite until the text stops changing.
pub fn clean(text: &str) -> String
{
    let mut current = replace_literals(&strip_inline_namespaces(text));
    loop {
        let next = simplify_templates(&current);
        if next == current {
            return next;
        }
        current = next;
    }
}

fn strip_inline_namespaces(text: &str) -> String
{
    INLINE_NAMESPACES
        .iter()
        .fold(text.to_string(), |acc, namespace| acc.replace(namespace, "std::"))
}

fn replace_literals(text: &str) -> String
{
    LITERAL_REPLACEMENTS
        .iter()
        .fold(text.to_string(), |acc, (long, short)| acc.replace(long, short))
}

/// One left-to-right pass over `text`, rewriting each outermost match.
fn simplify_templates(text: &str) -> String
{
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    while let Some(found) = text[cursor..].find("std::") {
        let start = cursor + found;
        let at_boundary = text[..start]
            .chars()
            .next_back()
            .map_or(true, |c| !(c.is_alphanumeric() || c == '_' || c == ':'));
        let name_start = start + "std::".len();
        let name_len = text[name_start..]
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(text.len() - name_start);
        let name = &text[name_start..name_start + name_len];
        let open = name_start + name_len;

        let rewrite = if at_boundary && text[open..].starts_with('<') {
            RULES
                .iter()
                .find(|rule| rule.name == name)
                .and_then(|rule| matching_close(text, open).map(|close| (rule, close)))
                .and_then(|(rule, close)| rewrite(rule, &text[open + 1..close]).map(|text| (text, close)))
        } else {
            None
        };

        match rewrite {
            Some((replacement, close)) => {
                out.push_str(&text[cursor..start]);
                out.push_str(&replacement);
                cursor = close + 1;
            }
            None => {
                out.push_str(&text[cursor..name_start]);
                cursor = name_start;
            }
        }
    }
    out.push_str(&text[cursor..]);
    out
}

/// Byte index of the `>` closing the `<` at `open`.
fn matching_close(text: &str, open: usize) -> Option<usize>
{
    let mut depth = 0usize;
    for (index, c) in text[open..].char_indices() {
        match c {
            '<' | '(' => depth += 1,
            '>' | ')' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return (c == '>').then_some(open + index);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split a template argument list on top-level commas.
fn split_arguments(list: &str) -> Vec<&str>
{
    let mut args = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (index, c) in list.char_indices() {
        match c {
            '<' | '(' => depth += 1,
            '>' | ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                args.push(list[start..index].trim());
                start = index + 1;
            }
            _ => {}
        }
    }
    args.push(list[start..].trim());
    args
}

fn same_type(a: &str, b: &str) -> bool
{
    a.chars().filter(|c| !c.is_whitespace()).eq(b.chars().filter(|c| !c.is_whitespace()))
}

/// Replacement for `std::<rule.name><list>`, or `None` when nothing changes.
fn rewrite(rule: &Rule, list: &str) -> Option<String>
{
    let args = split_arguments(list);
    if args.len() < rule.kept {
        return None;
    }
    let (kept, trailing) = args.split_at(rule.kept);
    let defaults = (rule.defaults)(kept);
    let all_default = trailing.len() <= defaults.len()
        && trailing.iter().zip(&defaults).all(|(actual, default)| same_type(actual, default));
    if !all_default {
        return None;
    }

    if let Some(alias) = string_alias(rule.name, kept[0]) {
        return Some(alias);
    }

    let joined = kept.join(", ");
    let spacer = if joined.ends_with('>') { " " } else { "" };
    let canonical = format!("{joined}{spacer}");
    // Already minimal; only the spacing before `>` may still need fixing.
    if trailing.is_empty() && canonical == list {
        return None;
    }
    Some(format!("std::{}<{canonical}>", rule.name))
}

fn string_alias(template: &str, character: &str) -> Option<String>
{
    let prefix = match character {
        "char" => "",
        "wchar_t" => "w",
        "char8_t" => "u8",
        "char16_t" => "u16",
        "char32_t" => "u32",
        _ => return None,
    };
    match template {
        "basic_string" => Some(format!("std::{prefix}string")),
        "basic_string_view" => Some(format!("std::{prefix}string_view")),
        _ => None,
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_inline_namespaces_are_removed()
    {
        assert_eq!(clean("std::__1::mutex lock;"), "std::mutex lock;");
        assert_eq!(clean("std::__ndk1::atomic<int> n;"), "std::atomic<int> n;");
    }

    #[test]
    fn test_string_aliases()
    {
        assert_eq!(
            clean("std::__1::basic_string<char, std::__1::char_traits<char>, std::__1::allocator<char> > name;"),
            "std::string name;"
        );
        assert_eq!(clean("std::basic_string_view<wchar_t, std::char_traits<wchar_t> > v;"), "std::wstring_view v;");
        assert_eq!(
            clean("std::basic_string<char, MyTraits, std::allocator<char> > s;"),
            "std::basic_string<char, MyTraits, std::allocator<char> > s;"
        );
    }

    #[test]
    fn test_nested_containers()
    {
        let input = "std::vector<std::vector<int, std::allocator<int> >, \
                     std::allocator<std::vector<int, std::allocator<int> > > > grid;";
        assert_eq!(clean(input), "std::vector<std::vector<int> > grid;");
    }

    #[test]
    fn test_map_defaults()
    {
        let input = "std::map<int, std::basic_string<char, std::char_traits<char>, std::allocator<char> >, \
                     std::less<int>, std::allocator<std::pair<const int, std::basic_string<char, \
                     std::char_traits<char>, std::allocator<char> > > > > names;";
        assert_eq!(clean(input), "std::map<int, std::string> names;");
    }

    #[test]
    fn test_custom_arguments_are_kept()
    {
        let input = "std::unordered_map<int, float, MyHash, std::equal_to<int>, std::allocator<std::pair<const int, float> > > m;";
        assert_eq!(clean(input), input);
        assert_eq!(clean("mystd::vector<int, std::allocator<int> > v;"), "mystd::vector<int, std::allocator<int> > v;");
    }

    #[test]
    fn test_unique_ptr_and_whitespace()
    {
        assert_eq!(
            clean("std::unique_ptr<Foo, std::default_delete<Foo>> ptr;\nint x;\n"),
            "std::unique_ptr<Foo> ptr;\nint x;\n"
        );
    }

    #[test]
    fn test_queue_over_default_deque()
    {
        assert_eq!(
            clean("std::__1::queue<int, std::__1::deque<int, std::__1::allocator<int> > > q;"),
            "std::queue<int> q;"
        );
        assert_eq!(
            clean("std::queue<int, std::list<int, std::allocator<int> > > q;"),
            "std::queue<int, std::list<int> > q;"
        );
    }

    #[test]
    fn test_steady_clock_time_point()
    {
        let input = "std::__1::chrono::time_point<std::__1::chrono::steady_clock, \
                     std::__1::chrono::duration<long long, std::__1::ratio<1L, 1000000000L> > > started;";
        assert_eq!(clean(input), "std::chrono::steady_clock::time_point started;");
    }

    #[test]
    fn test_split_arguments()
    {
        assert_eq!(split_arguments("int, std::pair<int, int>, void (*)(int, int)"), [
            "int",
            "std::pair<int, int>",
            "void (*)(int, int)"
        ]);
    }
}
