//! Path normalization
//!
//! Every backend receives caller-supplied names that may be relative or
//! absolute. Relative names are resolved against the backend's base
//! directory; absolute names bypass it. All paths are `/`-separated and
//! cleaned lexically (duplicate separators, `.` and `..` are folded) without
//! touching the underlying storage.

/// Resolves names against a fixed base directory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathResolver {
    base: String,
}

impl PathResolver {
    pub fn new(base: impl Into<String>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// Absolute names are only cleaned; relative names are joined onto the
    /// base directory first.
    pub fn resolve(&self, name: &str) -> String {
        if is_absolute(name) {
            clean(name)
        } else {
            join(&self.base, name)
        }
    }

    /// Share-relative, backslash-separated form used by SMB trees.
    /// The share root is the empty string.
    pub fn to_share_path(&self, name: &str) -> String {
        strip_root(&self.resolve(name)).replace('/', "\\")
    }

    /// Object keys never start with a separator; the bucket root is the
    /// empty key.
    pub fn to_object_key(&self, name: &str) -> String {
        strip_root(&self.resolve(name)).to_string()
    }
}

pub fn is_absolute(path: &str) -> bool {
    path.starts_with('/')
}

/// Lexically clean a path: `"a//b/./c/.."` becomes `"a/b"`.
///
/// `..` never climbs above the root of an absolute path. An empty result is
/// `"."` for relative paths and `"/"` for absolute ones.
pub fn clean(path: &str) -> String {
    let rooted = is_absolute(path);
    let mut segments: Vec<&str> = Vec::new();

    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                _ if rooted => {}
                _ => segments.push(".."),
            },
            part => segments.push(part),
        }
    }

    let joined = segments.join("/");
    match (rooted, joined.is_empty()) {
        (true, _) => format!("/{}", joined),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// Join two paths and clean the result. An empty base leaves `name` as is.
pub fn join(base: &str, name: &str) -> String {
    if base.is_empty() {
        clean(name)
    } else {
        clean(&format!("{}/{}", base, name))
    }
}

/// Directory part of a path, cleaned: `"d/f.txt"` gives `"d"`,
/// `"f.txt"` gives `"."` and `"/f.txt"` gives `"/"`.
pub fn parent(path: &str) -> String {
    match path.rfind('/') {
        Some(0) => "/".to_string(),
        Some(idx) => clean(&path[..idx]),
        None => ".".to_string(),
    }
}

/// Last element of a cleaned path.
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn strip_root(path: &str) -> &str {
    match path.trim_start_matches('/') {
        "." => "",
        rest => rest,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean() {
        assert_eq!(clean("a//b/./c/.."), "a/b");
        assert_eq!(clean("/a/../../b"), "/b");
        assert_eq!(clean("../a"), "../a");
        assert_eq!(clean("a/../.."), "..");
        assert_eq!(clean(""), ".");
        assert_eq!(clean("/"), "/");
        assert_eq!(clean("//"), "/");
        assert_eq!(clean("dir/"), "dir");
    }

    #[test]
    fn test_resolve_relative_against_base() {
        let resolver = PathResolver::new("/tmp/naivefs");
        assert_eq!(resolver.resolve("some_file.txt"), "/tmp/naivefs/some_file.txt");
        assert_eq!(resolver.resolve("d/./f.txt"), "/tmp/naivefs/d/f.txt");
        assert_eq!(resolver.resolve("."), "/tmp/naivefs");
    }

    #[test]
    fn test_resolve_absolute_bypasses_base() {
        let resolver = PathResolver::new("/tmp/naivefs");
        assert_eq!(resolver.resolve("/etc//hosts"), "/etc/hosts");
    }

    #[test]
    fn test_resolve_without_base() {
        let resolver = PathResolver::default();
        assert_eq!(resolver.resolve("a/b.txt"), "a/b.txt");
        assert_eq!(resolver.resolve("."), ".");
    }

    #[test]
    fn test_share_path() {
        let resolver = PathResolver::new("projects");
        assert_eq!(resolver.to_share_path("d/f.txt"), "projects\\d\\f.txt");
        assert_eq!(resolver.to_share_path("/top.txt"), "top.txt");

        let root = PathResolver::default();
        assert_eq!(root.to_share_path("."), "");
        assert_eq!(root.to_share_path("/"), "");
    }

    #[test]
    fn test_object_key() {
        let resolver = PathResolver::new("/backups");
        assert_eq!(resolver.to_object_key("d/f.txt"), "backups/d/f.txt");

        let root = PathResolver::default();
        assert_eq!(root.to_object_key("a.txt"), "a.txt");
        assert_eq!(root.to_object_key("/a.txt"), "a.txt");
        assert_eq!(root.to_object_key(""), "");
    }

    #[test]
    fn test_parent() {
        assert_eq!(parent("d/f.txt"), "d");
        assert_eq!(parent("f.txt"), ".");
        assert_eq!(parent("/f.txt"), "/");
        assert_eq!(parent("/a/b/c"), "/a/b");
    }

    #[test]
    fn test_file_name() {
        assert_eq!(file_name("/a/b/c.txt"), "c.txt");
        assert_eq!(file_name("c.txt"), "c.txt");
    }
}
