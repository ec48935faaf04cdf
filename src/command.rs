//! Command documents: parsing, normalization and per-agent projection.
//!
//! Commands are stored in the canonical store as front-matter Markdown with
//! a `$ARGUMENTS` placeholder. Agents that read TOML commands receive a
//! projection with `description`, a multi-line `prompt` and `{{args}}` in
//! place of `$ARGUMENTS`. The TOML direction is one-way.

use serde::Serialize;
use serde_yaml::{Mapping, Value};

use crate::error::Result;
use crate::types::CommandFormat;

/// Argument placeholder in Markdown commands.
pub const MARKDOWN_ARGS: &str = "$ARGUMENTS";

/// Argument placeholder in TOML commands.
pub const TOML_ARGS: &str = "{{args}}";

const FRONT_MATTER_DELIMITER: &str = "---";

/// A parsed command file.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandDocument {
    /// Value of the `description` front-matter key.
    pub description: Option<String>,
    /// All other front-matter keys, in source order.
    pub metadata: Mapping,
    /// Everything after the front-matter.
    pub body: String,
}

#[derive(Serialize)]
struct TomlHeader<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
}

impl CommandDocument {
    /// Parses a front-matter Markdown command.
    ///
    /// Files without front-matter are accepted; the whole content becomes the
    /// body. CRLF line endings are normalized to LF.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::YamlParse`] if the front-matter is not valid YAML.
    pub fn parse(content: &str) -> Result<Self> {
        let content = content.trim_start_matches('\u{feff}').replace("\r\n", "\n");

        let Some((yaml, body)) = split_front_matter(&content) else {
            return Ok(Self {
                description: None,
                metadata: Mapping::new(),
                body: content,
            });
        };

        let mut metadata = if yaml.trim().is_empty() {
            Mapping::new()
        } else {
            serde_yaml::from_str::<Mapping>(yaml)?
        };

        let description = metadata
            .remove("description")
            .and_then(|value| scalar_to_string(&value));

        Ok(Self {
            description,
            metadata,
            body: body.to_string(),
        })
    }

    /// Renders the normalized Markdown form stored in the canonical store.
    ///
    /// `description` comes first, followed by the other keys in their
    /// original order. Without any front-matter keys only the body is written.
    pub fn to_markdown(&self) -> Result<String> {
        let mut front = Mapping::new();
        if let Some(description) = &self.description {
            front.insert(
                Value::String("description".to_string()),
                Value::String(description.clone()),
            );
        }
        for (key, value) in &self.metadata {
            front.insert(key.clone(), value.clone());
        }

        if front.is_empty() {
            return Ok(self.body.clone());
        }

        let yaml = serde_yaml::to_string(&front)?;
        Ok(format!(
            "{FRONT_MATTER_DELIMITER}\n{yaml}{FRONT_MATTER_DELIMITER}\n{}",
            self.body
        ))
    }

    /// Renders a TOML command: `description = "..."` and a `prompt` block
    /// with `$ARGUMENTS` rewritten to `{{args}}`.
    pub fn to_toml(&self) -> Result<String> {
        let header = TomlHeader {
            description: self.description.as_deref(),
        };
        let mut out = toml::to_string(&header).map_err(|e| {
            crate::Error::InvalidArgument(format!("cannot render TOML description: {e}"))
        })?;

        let prompt = self.body.trim_start_matches('\n').trim_end();
        let prompt = prompt.replace(MARKDOWN_ARGS, TOML_ARGS);
        out.push_str("prompt = \"\"\"\n");
        out.push_str(&escape_multiline(&prompt));
        out.push_str("\n\"\"\"\n");
        Ok(out)
    }

    /// Projects the command into the given agent format.
    pub fn project(&self, format: CommandFormat) -> Result<String> {
        match format {
            CommandFormat::Markdown => self.to_markdown(),
            CommandFormat::Toml => self.to_toml(),
        }
    }
}

/// Splits `---\n<yaml>\n---\n<body>` into its YAML and body parts.
fn split_front_matter(content: &str) -> Option<(&str, &str)> {
    let rest = content
        .strip_prefix(FRONT_MATTER_DELIMITER)?
        .strip_prefix('\n')?;

    if let Some(body) = rest.strip_prefix("---\n") {
        return Some(("", body));
    }
    if rest == FRONT_MATTER_DELIMITER {
        return Some(("", ""));
    }

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == FRONT_MATTER_DELIMITER {
            let yaml = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return Some((yaml, body));
        }
        offset += line.len();
    }
    None
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => None,
        other => serde_yaml::to_string(other)
            .ok()
            .map(|s| s.trim_end().to_string()),
    }
}

/// Escapes text for a TOML multi-line basic string.
fn escape_multiline(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut quotes = 0;
    for c in text.chars() {
        if c == '"' {
            quotes += 1;
            // Never let three quotes in a row close the string early.
            if quotes == 3 {
                out.push_str("\\\"");
                quotes = 0;
                continue;
            }
            out.push(c);
            continue;
        }
        quotes = 0;
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' | '\t' => out.push(c),
            '\r' => out.push_str("\\r"),
            c if c.is_control() => out.push_str(&format!("\\u{:04X}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const REVIEW: &str = "---\ndescription: \"x\"\nargument-hint: \"[file]\"\n---\n\nReview $ARGUMENTS carefully.\n";

    fn parse_toml(text: &str) -> toml::Table {
        text.parse::<toml::Table>().unwrap()
    }

    #[test]
    fn parse_extracts_description_and_body() {
        let doc = CommandDocument::parse(REVIEW).unwrap();
        assert_eq!(doc.description.as_deref(), Some("x"));
        assert_eq!(doc.body, "\nReview $ARGUMENTS carefully.\n");
        assert_eq!(
            doc.metadata.get("argument-hint"),
            Some(&Value::String("[file]".to_string()))
        );
    }

    #[test]
    fn parse_without_front_matter_keeps_everything_as_body() {
        let doc = CommandDocument::parse("Just do $ARGUMENTS\n").unwrap();
        assert_eq!(doc.description, None);
        assert!(doc.metadata.is_empty());
        assert_eq!(doc.body, "Just do $ARGUMENTS\n");
        assert_eq!(doc.to_markdown().unwrap(), "Just do $ARGUMENTS\n");
    }

    #[test]
    fn parse_handles_crlf_and_empty_front_matter() {
        let doc = CommandDocument::parse("---\r\n---\r\nBody\r\n").unwrap();
        assert_eq!(doc.description, None);
        assert_eq!(doc.body, "Body\n");
    }

    #[test]
    fn parse_rejects_invalid_yaml() {
        assert!(CommandDocument::parse("---\ndescription: [unclosed\n---\nbody").is_err());
    }

    #[test]
    fn markdown_normalization_is_stable() {
        let doc = CommandDocument::parse(REVIEW).unwrap();
        let normalized = doc.to_markdown().unwrap();
        let reparsed = CommandDocument::parse(&normalized).unwrap();
        assert_eq!(reparsed, doc);
        assert_eq!(reparsed.to_markdown().unwrap(), normalized);
        assert!(normalized.starts_with("---\ndescription: x\n"));
    }

    #[test]
    fn toml_projection_substitutes_args() {
        let doc = CommandDocument::parse(REVIEW).unwrap();
        let rendered = doc.to_toml().unwrap();

        assert!(rendered.starts_with("description = \"x\"\n"));
        assert!(rendered.contains("prompt = \"\"\"\n"));
        assert!(!rendered.contains(MARKDOWN_ARGS));

        let table = parse_toml(&rendered);
        assert_eq!(table["description"].as_str(), Some("x"));
        assert_eq!(
            table["prompt"].as_str(),
            Some("Review {{args}} carefully.\n")
        );
    }

    #[test]
    fn toml_projection_is_deterministic() {
        let doc = CommandDocument::parse(REVIEW).unwrap();
        assert_eq!(doc.to_toml().unwrap(), doc.to_toml().unwrap());
        assert_eq!(
            CommandDocument::parse(REVIEW).unwrap().to_toml().unwrap(),
            doc.to_toml().unwrap()
        );
    }

    #[test]
    fn toml_projection_escapes_quotes_and_backslashes() {
        let doc = CommandDocument::parse(
            "---\ndescription: 'say \"hi\"'\n---\nRun `grep \"\"\"x\"\"\" C:\\tmp` then \"$ARGUMENTS\"",
        )
        .unwrap();
        let table = parse_toml(&doc.to_toml().unwrap());
        assert_eq!(table["description"].as_str(), Some("say \"hi\""));
        assert_eq!(
            table["prompt"].as_str(),
            Some("Run `grep \"\"\"x\"\"\" C:\\tmp` then \"{{args}}\"\n")
        );
    }

    #[test]
    fn toml_projection_without_description_has_only_prompt() {
        let doc = CommandDocument::parse("Plain $ARGUMENTS").unwrap();
        let table = parse_toml(&doc.to_toml().unwrap());
        assert!(!table.contains_key("description"));
        assert_eq!(table["prompt"].as_str(), Some("Plain {{args}}\n"));
    }

    #[test]
    fn markdown_projection_is_the_normalized_form() {
        let doc = CommandDocument::parse(REVIEW).unwrap();
        assert_eq!(
            doc.project(CommandFormat::Markdown).unwrap(),
            doc.to_markdown().unwrap()
        );
    }
}
