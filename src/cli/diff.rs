//! Colorized property diffs
//!
//! Renders changed resource properties for `preview`, using the similar
//! crate for multi-line values such as page bodies and policy documents.

use colored::Colorize;
use similar::{ChangeTag, TextDiff};
use staticpage::resource::PropertyValue;
use staticpage::state::PropertyChange;

/// Lines of context shown around changed lines.
const CONTEXT_LINES: usize = 2;

/// Renders property changes.
#[derive(Debug, Clone, Copy)]
pub struct PropertyDiff {
    use_color: bool,
}

impl PropertyDiff {
    /// Create a renderer.
    pub fn new(use_color: bool) -> Self {
        Self { use_color }
    }

    /// Render one property change, indented by `indent` spaces.
    pub fn render(&self, change: &PropertyChange, indent: usize) -> String {
        let pad = " ".repeat(indent);
        let marker = if change.forces_replacement {
            " (forces replacement)"
        } else {
            ""
        };

        let mut output = String::new();
        let header = format!("{}{}:{}", pad, change.name, marker);
        if self.use_color && change.forces_replacement {
            output.push_str(&header.magenta().to_string());
        } else {
            output.push_str(&header);
        }
        output.push('\n');

        let old = change.old.as_ref().map(display_value);
        let new = change.new.as_ref().map(display_value);
        match (old, new) {
            (Some(old), Some(new)) if is_multiline(&old) || is_multiline(&new) => {
                output.push_str(&self.lines(&old, &new, &pad));
            }
            (old, new) => {
                if let Some(old) = old {
                    output.push_str(&self.line(ChangeTag::Delete, &old, &pad));
                }
                if let Some(new) = new {
                    output.push_str(&self.line(ChangeTag::Insert, &new, &pad));
                }
            }
        }
        output
    }

    fn lines(&self, old: &str, new: &str, pad: &str) -> String {
        let diff = TextDiff::from_lines(old, new);
        let mut output = String::new();
        for hunk in diff.unified_diff().context_radius(CONTEXT_LINES).iter_hunks() {
            for change in hunk.iter_changes() {
                output.push_str(&self.line(change.tag(), change.value().trim_end_matches('\n'), pad));
            }
        }
        output
    }

    fn line(&self, tag: ChangeTag, text: &str, pad: &str) -> String {
        let (sign, plain) = match tag {
            ChangeTag::Delete => ('-', format!("{}  - {}", pad, text)),
            ChangeTag::Insert => ('+', format!("{}  + {}", pad, text)),
            ChangeTag::Equal => (' ', format!("{}    {}", pad, text)),
        };
        let rendered = match (self.use_color, sign) {
            (true, '-') => plain.red().to_string(),
            (true, '+') => plain.green().to_string(),
            (true, _) => plain.dimmed().to_string(),
            (false, _) => plain,
        };
        format!("{}\n", rendered)
    }
}

/// Text shown for a property value: raw text for strings, JSON otherwise.
pub fn display_value(value: &PropertyValue) -> String {
    match value {
        PropertyValue::Known(serde_json::Value::String(s)) => s.clone(),
        other => other.to_string(),
    }
}

fn is_multiline(value: &str) -> bool {
    value.contains('\n')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn change(old: &str, new: &str) -> PropertyChange {
        PropertyChange {
            name: "content".to_string(),
            old: Some(PropertyValue::Known(json!(old))),
            new: Some(PropertyValue::Known(json!(new))),
            forces_replacement: false,
        }
    }

    #[test]
    fn test_single_line_change() {
        let rendered = PropertyDiff::new(false).render(&change("<h1>A</h1>", "<h1>B</h1>"), 4);
        assert_eq!(rendered, "    content:\n      - <h1>A</h1>\n      + <h1>B</h1>\n");
    }

    #[test]
    fn test_multiline_change_keeps_context() {
        let rendered = PropertyDiff::new(false).render(
            &change("<html>\n<h1>A</h1>\n</html>\n", "<html>\n<h1>B</h1>\n</html>\n"),
            0,
        );
        assert!(rendered.contains("    <html>"));
        assert!(rendered.contains("  - <h1>A</h1>"));
        assert!(rendered.contains("  + <h1>B</h1>"));
    }

    #[test]
    fn test_replacement_marker() {
        let mut c = change("a", "b");
        c.name = "bucket".to_string();
        c.forces_replacement = true;
        let rendered = PropertyDiff::new(false).render(&c, 0);
        assert!(rendered.starts_with("bucket: (forces replacement)"));
    }

    #[test]
    fn test_computed_value_display() {
        let value = PropertyValue::Computed {
            computed_from: vec!["urn".to_string()],
        };
        assert_eq!(display_value(&value), "(known after up)");
    }
}
