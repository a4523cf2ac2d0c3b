//! POSIX-style path arithmetic on the strings recorded in debug information.
//!
//! Paths come from whatever machine compiled the binary (often Windows), so
//! they are handled as `/`-separated strings rather than `std::path::Path`.

/// Convert backslashes to slashes and collapse `.`, `..` and repeated separators.
pub fn normalize(path: &str) -> String
{
    let path = path.replace('\\', "/");
    let absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|last| *last != "..") {
                    parts.pop();
                } else if !absolute {
                    parts.push("..");
                }
            }
            _ => parts.push(part),
        }
    }

    let joined = parts.join("/");
    match (absolute, joined.is_empty()) {
        (true, _) => format!("/{joined}"),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// Whether a path is absolute, either POSIX (`/usr`) or a drive path (`C:/src`).
pub fn is_absolute(path: &str) -> bool
{
    let bytes = path.as_bytes();
    path.starts_with('/')
        || path.starts_with('\\')
        || (bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':')
}

/// Join `path` onto `base` unless it is already absolute, then normalize.
pub fn join(base: &str, path: &str) -> String
{
    if is_absolute(path) || base.is_empty() {
        normalize(path)
    } else {
        normalize(&format!("{base}/{path}"))
    }
}

/// Longest common sequence of leading path components.
pub fn common_path(a: &str, b: &str) -> String
{
    let a = normalize(a);
    let b = normalize(b);
    let shared: Vec<&str> = a
        .split('/')
        .zip(b.split('/'))
        .take_while(|(left, right)| left == right)
        .map(|(left, _)| left)
        .collect();

    match shared.as_slice() {
        [] => String::new(),
        [""] => "/".to_string(),
        _ => shared.join("/"),
    }
}

/// `path` relative to `base`, or `None` when `path` lies outside of `base`.
pub fn strip_base(path: &str, base: &str) -> Option<String>
{
    let path = normalize(path);
    let base = normalize(base);
    if base == "/" {
        return path.strip_prefix('/').map(str::to_string);
    }
    let rest = path.strip_prefix(&base)?;
    if rest.is_empty() {
        return Some(String::new());
    }
    rest.strip_prefix('/').map(str::to_string)
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_normalize()
    {
        assert_eq!(normalize("C:\\src\\game\\..\\engine\\.\\a.h"), "C:/src/engine/a.h");
        assert_eq!(normalize("/usr//include/../lib/"), "/usr/lib");
        assert_eq!(normalize("../a/./b"), "../a/b");
        assert_eq!(normalize("/.."), "/");
        assert_eq!(normalize("a/.."), ".");
    }

    #[test]
    fn test_join()
    {
        assert_eq!(join("/proj/build", "../src/a.cpp"), "/proj/src/a.cpp");
        assert_eq!(join("/proj/build", "/abs/a.cpp"), "/abs/a.cpp");
        assert_eq!(join("/proj", "D:\\x\\y.h"), "D:/x/y.h");
    }

    #[test]
    fn test_common_path()
    {
        assert_eq!(common_path("/proj/src/a.cpp", "/proj/build"), "/proj");
        assert_eq!(common_path("/proj/src", "/proj/srcs"), "/proj");
        assert_eq!(common_path("/a", "/b"), "/");
        assert_eq!(common_path("C:/x", "D:/x"), "");
    }

    #[test]
    fn test_strip_base()
    {
        assert_eq!(strip_base("/proj/src/a.h", "/proj").as_deref(), Some("src/a.h"));
        assert_eq!(strip_base("/project/a.h", "/proj"), None);
        assert_eq!(strip_base("/usr/include/stdio.h", "/proj"), None);
        assert_eq!(strip_base("/proj/a.h", "/").as_deref(), Some("proj/a.h"));
    }
}
