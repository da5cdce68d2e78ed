//! Class name helpers.
//!
//! Class names travel through the pipeline in their fully-qualified dotted
//! form (`org.example.Foo`). Loaders that address artifacts as resources need
//! the slash form with a `.class` suffix (`org/example/Foo.class`).

/// Suffix of a compiled class resource.
pub const CLASS_SUFFIX: &str = ".class";

/// Translate a dotted class name into the resource path of its artifact.
///
/// ```
/// use class_pipeline_types::class_name::resource_path;
///
/// assert_eq!(resource_path("org.example.Foo"), "org/example/Foo.class");
/// assert_eq!(resource_path("org.example.Foo$Inner"), "org/example/Foo$Inner.class");
/// ```
pub fn resource_path(name: &str) -> String {
    let mut path = name.replace('.', "/");
    path.push_str(CLASS_SUFFIX);
    path
}

/// Inverse of [`resource_path`]. Returns `None` for non-class resources.
pub fn class_name_of(path: &str) -> Option<String> {
    let stem = path.strip_prefix('/').unwrap_or(path).strip_suffix(CLASS_SUFFIX)?;
    if stem.is_empty() {
        return None;
    }
    Some(stem.replace('/', "."))
}

/// The part of a dotted name after the last `.`.
pub fn simple_name(name: &str) -> &str {
    match name.rfind('.') {
        Some(pos) => &name[pos + 1..],
        None => name,
    }
}

/// The package portion of a dotted name, or `""` for the default package.
pub fn package_of(name: &str) -> &str {
    match name.rfind('.') {
        Some(pos) => &name[..pos],
        None => "",
    }
}
