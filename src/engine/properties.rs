// src/engine/properties.rs

//! Deployment property names, injection escaping, and `${}` expansion
//!
//! Recipes reference their environment through the host language's
//! property syntax. The names below are part of the recipe wire format
//! and must stay exactly as existing recipes spell them.

use std::collections::BTreeMap;
use std::path::Path;

/// Deployment target directory (absolute path); always injected
pub const DEPLOY_DIR: &str = "rhq.deploy.dir";
/// Numeric deployment identifier; always injected, opaque to the engine
pub const DEPLOY_ID: &str = "rhq.deploy.id";
/// Human-readable deployment name
pub const DEPLOY_NAME: &str = "rhq.deploy.name";
/// Current lifecycle phase, e.g. `INSTALL`
pub const DEPLOY_PHASE: &str = "rhq.deploy.phase";
/// True when the run reverts a previous deployment
pub const DEPLOY_REVERT: &str = "rhq.deploy.revert";
/// True when the destination is wiped before content is written
pub const DEPLOY_CLEAN: &str = "rhq.deploy.clean";

/// Double literal backslashes in a value sourced from an external
/// properties file
///
/// The binding layer treats a backslash as an escape introducer, so a
/// value must arrive with its backslashes doubled to survive injection
/// intact. Required compatibility behavior.
pub fn escape_external_value(value: &str) -> String {
    value.replace('\\', "\\\\")
}

/// Expand `${name}` references from the property table
///
/// Unknown references are left verbatim and `$$` renders a literal `$`,
/// matching the host language's expansion rules.
pub fn interpolate(input: &str, properties: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some((_, '$')) => {
                chars.next();
                out.push('$');
            }
            Some((_, '{')) => {
                if let Some(end) = input[i..].find('}') {
                    let name = &input[i + 2..i + end];
                    match properties.get(name) {
                        Some(value) => out.push_str(value),
                        None => out.push_str(&input[i..=i + end]),
                    }
                    // skip past the closing brace
                    while let Some((j, _)) = chars.peek() {
                        if *j > i + end {
                            break;
                        }
                        chars.next();
                    }
                } else {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// Read a `key=value` properties file, escaping values for injection
///
/// Lines starting with `#` or `!` are comments; lines without `=` are
/// ignored.
pub fn load_properties_file(path: &Path) -> std::io::Result<BTreeMap<String, String>> {
    let content = std::fs::read_to_string(path)?;
    let mut properties = BTreeMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            properties.insert(
                key.trim().to_string(),
                escape_external_value(value.trim()),
            );
        }
    }
    Ok(properties)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_escape_doubles_each_backslash() {
        assert_eq!(escape_external_value(r"C:\opt\app"), r"C:\\opt\\app");
        assert_eq!(escape_external_value("no-slashes"), "no-slashes");
        assert_eq!(escape_external_value(r"\"), r"\\");
    }

    #[test]
    fn test_interpolate_known_reference() {
        let p = props(&[("rhq.deploy.dir", "/opt/app")]);
        assert_eq!(
            interpolate("dest=${rhq.deploy.dir}/conf", &p),
            "dest=/opt/app/conf"
        );
    }

    #[test]
    fn test_interpolate_unknown_reference_left_verbatim() {
        let p = props(&[]);
        assert_eq!(interpolate("x=${missing}", &p), "x=${missing}");
    }

    #[test]
    fn test_interpolate_dollar_escape() {
        let p = props(&[("a", "1")]);
        assert_eq!(interpolate("$$ ${a}", &p), "$ 1");
    }

    #[test]
    fn test_interpolate_adjacent_references() {
        let p = props(&[("a", "1"), ("b", "2")]);
        assert_eq!(interpolate("${a}${b}", &p), "12");
    }

    #[test]
    fn test_load_properties_file_escapes_values() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("deploy.properties");
        std::fs::write(
            &path,
            "# deployment inputs\ninstall.root=C:\\apps\\petstore\nport = 8080\nbadline\n",
        )
        .unwrap();

        let properties = load_properties_file(&path).unwrap();
        assert_eq!(
            properties.get("install.root").map(String::as_str),
            Some(r"C:\\apps\\petstore")
        );
        assert_eq!(properties.get("port").map(String::as_str), Some("8080"));
        assert_eq!(properties.len(), 2);
    }
}
