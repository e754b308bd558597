//! Deterministic per-file-type transforms.
//!
//! The modifier consults this dispatch table before reaching for the
//! language model: known manifest formats merge deterministically,
//! Python function-level delete/add are block operations, new CSS/JSX
//! files are scaffolded, and unknown extensions receive a
//! comment-annotated trailer in their comment syntax. A `None` outcome
//! means the file needs the model.

use crate::core::{Action, ModificationStep};
use std::collections::BTreeMap;

/// Applies the deterministic transform for a step, if one exists.
///
/// Returns `Ok(None)` when the step needs the language model and
/// `Err(message)` when a deterministic transform failed (e.g. a named
/// function is absent).
pub fn apply_transform(
    original: &str,
    step: &ModificationStep,
) -> std::result::Result<Option<String>, String> {
    let file_name = std::path::Path::new(&step.file)
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let ext = std::path::Path::new(&step.file)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    if file_name == "requirements.txt" {
        return Ok(Some(merge_requirements(original, &step.how)));
    }
    if file_name == "package.json" {
        return Ok(Some(merge_package_json(original, &step.how)));
    }

    match ext.as_str() {
        "py" => python_transform(original, step),
        "css" if step.action == Action::Create => Ok(Some(css_scaffold(step))),
        "jsx" if step.action == Action::Create => Ok(Some(jsx_scaffold(step))),
        // Known code types go to the model for full-source generation.
        "js" | "ts" | "tsx" | "go" | "java" | "html" | "css" | "jsx" | "md" | "json" | "txt"
        | "yaml" | "yml" | "sh" | "rs" | "c" | "cpp" | "h" | "hpp" | "rb" | "php" | "cs" => {
            Ok(None)
        }
        _ => Ok(Some(annotate_with_trailer(original, step, &ext))),
    }
}

/// Python-specific transforms; block-level delete/add plus test-file and
/// init-file cleanups. Everything else defers to the model.
fn python_transform(
    original: &str,
    step: &ModificationStep,
) -> std::result::Result<Option<String>, String> {
    if let Some(function) = &step.function {
        match step.action {
            Action::Delete => return delete_python_function(original, function).map(Some),
            Action::Add => {
                let body = if step.how.contains("def ") {
                    step.how.clone()
                } else {
                    format!("def {function}():\n    \"\"\"{}\"\"\"\n    pass", step.what)
                };
                return Ok(Some(add_python_function(original, &body)));
            }
            _ => {}
        }
    }

    let file_name = std::path::Path::new(&step.file)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    if is_python_test_file(&file_name) {
        let cleaned = dedupe_main_blocks(original);
        if cleaned != original {
            return Ok(Some(cleaned));
        }
    }
    if file_name == "__init__.py" && step.action == Action::Modify {
        return Ok(Some(optimize_init_file(original)));
    }

    Ok(None)
}

fn is_python_test_file(file_name: &str) -> bool {
    file_name.starts_with("test_") || file_name.ends_with("_test.py")
}

/// Removes a top-level function block (decorators included).
fn delete_python_function(
    original: &str,
    function: &str,
) -> std::result::Result<String, String> {
    let lines: Vec<&str> = original.lines().collect();
    let def_line = lines.iter().position(|line| {
        let trimmed = line.trim_start();
        (trimmed.starts_with(&format!("def {function}("))
            || trimmed.starts_with(&format!("async def {function}(")))
            && line.starts_with(|c: char| !c.is_whitespace())
    });
    let Some(def_line) = def_line else {
        return Err(format!("function '{function}' not found"));
    };

    let mut start = def_line;
    while start > 0 && lines[start - 1].trim_start().starts_with('@') {
        start -= 1;
    }

    // The block ends at the next non-blank line with zero indentation.
    let mut end = def_line + 1;
    while end < lines.len() {
        let line = lines[end];
        if !line.trim().is_empty() && !line.starts_with([' ', '\t']) {
            break;
        }
        end += 1;
    }
    // Leave surrounding spacing tidy: drop trailing blanks of the block.
    while end > def_line + 1 && lines[end - 1].trim().is_empty() && end > start {
        end -= 1;
    }

    let mut kept: Vec<&str> = Vec::with_capacity(lines.len());
    kept.extend_from_slice(&lines[..start]);
    kept.extend_from_slice(&lines[end..]);

    let mut result = kept.join("\n");
    if original.ends_with('\n') && !result.ends_with('\n') {
        result.push('\n');
    }
    Ok(result)
}

/// Appends a function block at the end of the module.
fn add_python_function(original: &str, body: &str) -> String {
    let mut result = original.trim_end().to_string();
    if !result.is_empty() {
        result.push_str("\n\n\n");
    }
    result.push_str(body.trim_end());
    result.push('\n');
    result
}

/// Collapses duplicate `if __name__ == "__main__"` blocks, keeping one at
/// the file end.
fn dedupe_main_blocks(original: &str) -> String {
    let lines: Vec<&str> = original.lines().collect();
    let main_starts: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| {
            let t = line.trim();
            t.starts_with("if __name__") && t.contains("__main__")
        })
        .map(|(i, _)| i)
        .collect();
    if main_starts.len() <= 1 {
        return original.to_string();
    }

    // Remove every block but the last.
    let mut drop: Vec<(usize, usize)> = Vec::new();
    for &start in &main_starts[..main_starts.len() - 1] {
        let mut end = start + 1;
        while end < lines.len() {
            let line = lines[end];
            if !line.trim().is_empty() && !line.starts_with([' ', '\t']) {
                break;
            }
            end += 1;
        }
        drop.push((start, end));
    }

    let mut kept = Vec::with_capacity(lines.len());
    for (i, line) in lines.iter().enumerate() {
        if drop.iter().any(|&(s, e)| i >= s && i < e) {
            continue;
        }
        kept.push(*line);
    }
    let mut result = kept.join("\n");
    if original.ends_with('\n') {
        result.push('\n');
    }
    result
}

/// Sorts and deduplicates the explicit exports of an `__init__.py`.
fn optimize_init_file(original: &str) -> String {
    let mut imports: Vec<&str> = Vec::new();
    let mut rest: Vec<&str> = Vec::new();
    for line in original.lines() {
        let t = line.trim_start();
        if t.starts_with("from ") || t.starts_with("import ") {
            if !imports.contains(&line) {
                imports.push(line);
            }
        } else {
            rest.push(line);
        }
    }
    imports.sort_unstable();

    let mut out = imports.join("\n");
    let tail = rest.join("\n");
    if !tail.trim().is_empty() {
        out.push('\n');
        out.push_str(&tail);
    }
    if original.ends_with('\n') && !out.ends_with('\n') {
        out.push('\n');
    }
    out
}

/// Known pinned versions for common Python packages.
fn python_version_table() -> BTreeMap<&'static str, &'static str> {
    BTreeMap::from([
        ("fastapi", "0.109.1"),
        ("uvicorn[standard]", "0.24.0"),
        ("python-multipart", "0.0.18"),
        ("pydantic", "2.5.0"),
        ("sqlalchemy", "2.0.23"),
        ("python-jose[cryptography]", "3.3.0"),
        ("bcrypt", "4.1.2"),
        ("pytest", "7.4.3"),
        ("httpx", "0.25.2"),
        ("starlette", "0.40.0"),
    ])
}

/// Merges declared requirements with packages named in the instruction,
/// sorted alphabetically with known pins applied.
fn merge_requirements(original: &str, how: &str) -> String {
    let versions = python_version_table();
    let mut packages: BTreeMap<String, String> = BTreeMap::new();

    for line in original.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (name, spec) = line.split_once("==").map_or_else(
            || (line.to_string(), String::new()),
            |(n, v)| (n.to_string(), v.to_string()),
        );
        packages.insert(name, spec);
    }

    for token in how.split([' ', ',', '\n']) {
        let token = token.trim();
        if token.is_empty() || !token.chars().next().is_some_and(char::is_alphanumeric) {
            continue;
        }
        let (name, spec) = token.split_once("==").map_or_else(
            || (token.to_string(), String::new()),
            |(n, v)| (n.to_string(), v.to_string()),
        );
        // Accept only things that look like packages: known names,
        // explicit pins, or dashed distribution names.
        if versions.contains_key(name.as_str()) || !spec.is_empty() || name.contains('-') {
            packages.entry(name).or_insert(spec);
        }
    }

    let mut out = String::new();
    for (name, spec) in &packages {
        let pinned = if spec.is_empty() {
            versions.get(name.as_str()).map_or_else(String::new, |v| (*v).to_string())
        } else {
            spec.clone()
        };
        if pinned.is_empty() {
            out.push_str(name);
        } else {
            out.push_str(&format!("{name}=={pinned}"));
        }
        out.push('\n');
    }
    out
}

/// JSON-merges a fragment from the instruction into package.json,
/// preserving unknown keys.
fn merge_package_json(original: &str, how: &str) -> String {
    let mut base: serde_json::Value = serde_json::from_str(original)
        .unwrap_or_else(|_| serde_json::json!({"name": "frontend", "version": "0.1.0"}));

    if let Ok(fragment) = serde_json::from_str::<serde_json::Value>(how)
        && let (Some(base_map), Some(frag_map)) = (base.as_object_mut(), fragment.as_object())
    {
        for (key, value) in frag_map {
            match (base_map.get_mut(key), value.as_object()) {
                (Some(serde_json::Value::Object(existing)), Some(incoming)) => {
                    for (k, v) in incoming {
                        existing.insert(k.clone(), v.clone());
                    }
                }
                _ => {
                    base_map.insert(key.clone(), value.clone());
                }
            }
        }
    }

    serde_json::to_string_pretty(&base).map_or_else(|_| original.to_string(), |s| s + "\n")
}

/// Scaffold for a new CSS file.
fn css_scaffold(step: &ModificationStep) -> String {
    if step.how.contains('{') {
        return format!("/* {} */\n{}\n", step.what, step.how.trim());
    }
    let stem = std::path::Path::new(&step.file)
        .file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    format!(
        "/* {} */\n.{stem} {{\n    display: block;\n}}\n",
        step.what
    )
}

/// Scaffold for a new React component file.
fn jsx_scaffold(step: &ModificationStep) -> String {
    let stem = std::path::Path::new(&step.file)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "Component".to_string());
    format!(
        "import React from 'react';\n\nconst {stem} = () => {{\n    return (\n        <div className=\"{lower}\">\n            {{/* {what} */}}\n        </div>\n    );\n}};\n\nexport default {stem};\n",
        lower = stem.to_lowercase(),
        what = step.what,
    )
}

/// Comment syntax for a trailer by extension.
fn comment_wrap(ext: &str, text: &str) -> String {
    match ext {
        "rb" | "pl" | "r" | "jl" | "tcl" | "cfg" | "ini" | "toml" | "conf" | "" => {
            format!("# {text}")
        }
        "lua" | "sql" => format!("-- {text}"),
        "bat" | "cmd" => format!("REM {text}"),
        "vim" => format!("\" {text}"),
        _ => format!("# {text}"),
    }
}

/// Fallback for unknown types: append a comment-annotated trailer.
fn annotate_with_trailer(original: &str, step: &ModificationStep, ext: &str) -> String {
    let mut out = original.to_string();
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out.push('\n');
    out.push_str(&comment_wrap(ext, &format!("What: {}", step.what)));
    out.push('\n');
    out.push_str(&comment_wrap(ext, &format!("How: {}", step.how)));
    out.push('\n');
    out
}
