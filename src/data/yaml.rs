//! YAML processing utilities

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use yaml_rust_davvid::{Yaml, YamlEmitter};

/// Serialize data structure to YAML string with multi-line strings kept as
/// block scalars.
///
/// The emitter's own block scalars always clip the final line break, so
/// multi-line strings are emitted as placeholders and written here with the
/// chomping indicator that reproduces them exactly.
pub fn to_yaml<T: Serialize>(data: &T) -> Result<String> {
    let value = serde_yaml::to_value(data).context("Failed to serialize to serde value")?;
    let mut blocks = Vec::new();
    let yaml = to_emitter_value(&value, &mut blocks);

    let mut output = String::new();
    let mut emitter = YamlEmitter::new(&mut output);
    emitter.dump(&yaml).context("Failed to emit YAML")?;
    output.push('\n');

    for (index, text) in blocks.iter().enumerate() {
        let placeholder = block_placeholder(index);
        let Some(at) = output.find(&placeholder) else {
            anyhow::bail!("Emitter dropped a multi-line string");
        };
        let line_start = output[..at].rfind('\n').map_or(0, |i| i + 1);
        let prefix = &output[line_start..at];
        let column = prefix.len() - prefix.trim_start_matches([' ', '-']).len();
        let scalar = render_multiline(text, column + 2)?;
        output.replace_range(at..at + placeholder.len(), &scalar);
    }

    Ok(output)
}

fn block_placeholder(index: usize) -> String {
    format!("__git_regroup_block_{index}__")
}

/// Renders a string containing line breaks as a literal block scalar whose
/// content starts at `indent`, or as a double-quoted scalar when a block
/// cannot hold it.
fn render_multiline(text: &str, indent: usize) -> Result<String> {
    let content = text.trim_end_matches('\n');
    let trailing = text.len() - content.len();
    let blockable = content
        .lines()
        .next()
        .is_some_and(|first| !first.is_empty() && !first.starts_with([' ', '\t']))
        && !content.chars().any(|c| c.is_control() && c != '\n' && c != '\t');
    if !blockable {
        // JSON strings are valid YAML double-quoted scalars.
        return serde_json::to_string(text).context("Failed to quote multi-line string");
    }

    let chomp = match trailing {
        0 => "-",
        1 => "",
        _ => "+",
    };
    let pad = " ".repeat(indent);
    let mut scalar = format!("|{chomp}");
    for line in content.split('\n') {
        scalar.push('\n');
        if !line.is_empty() {
            scalar.push_str(&pad);
            scalar.push_str(line);
        }
    }
    for _ in 1..trailing {
        scalar.push('\n');
    }
    Ok(scalar)
}

/// Convert serde_yaml::Value to the emitter's value type, swapping
/// multi-line strings for placeholders collected in `blocks`.
fn to_emitter_value(value: &serde_yaml::Value, blocks: &mut Vec<String>) -> Yaml {
    match value {
        serde_yaml::Value::Null => Yaml::Null,
        serde_yaml::Value::Bool(b) => Yaml::Boolean(*b),
        serde_yaml::Value::Number(n) => n
            .as_i64()
            .map_or_else(|| Yaml::Real(n.to_string()), Yaml::Integer),
        serde_yaml::Value::String(s) if s.contains('\n') => {
            blocks.push(s.clone());
            Yaml::String(block_placeholder(blocks.len() - 1))
        }
        serde_yaml::Value::String(s) => Yaml::String(s.clone()),
        serde_yaml::Value::Sequence(seq) => Yaml::Array(
            seq.iter()
                .map(|item| to_emitter_value(item, blocks))
                .collect(),
        ),
        serde_yaml::Value::Mapping(map) => Yaml::Hash(
            map.iter()
                .map(|(k, v)| (to_emitter_value(k, blocks), to_emitter_value(v, blocks)))
                .collect(),
        ),
        serde_yaml::Value::Tagged(tagged) => to_emitter_value(&tagged.value, blocks),
    }
}

/// Deserialize YAML string to data structure
pub fn from_yaml<T: for<'de> Deserialize<'de>>(yaml: &str) -> Result<T> {
    serde_yaml::from_str(yaml).context("Failed to deserialize YAML")
}

/// Returns the body of the first fenced code block, or the trimmed input
/// when it has no fences.
///
/// Model replies often wrap YAML in ```` ```yaml ```` fences.
pub fn extract_yaml_block(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(start) = trimmed.find("```") else {
        return trimmed;
    };

    let after_fence = &trimmed[start + 3..];
    let body_start = after_fence.find('\n').map_or(after_fence.len(), |i| i + 1);
    let body = &after_fence[body_start..];
    match body.find("```") {
        Some(end) => body[..end].trim_end(),
        None => body.trim_end(),
    }
}

/// Read and parse YAML file
pub fn read_yaml_file<T: for<'de> Deserialize<'de>, P: AsRef<Path>>(path: P) -> Result<T> {
    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read file: {}", path.as_ref().display()))?;

    from_yaml(&content)
        .with_context(|| format!("Failed to parse YAML file: {}", path.as_ref().display()))
}

/// Write data structure to YAML file
pub fn write_yaml_file<T: Serialize, P: AsRef<Path>>(data: &T, path: P) -> Result<()> {
    let yaml_content = to_yaml(data)?;

    fs::write(&path, yaml_content)
        .with_context(|| format!("Failed to write file: {}", path.as_ref().display()))?;

    Ok(())
}
