use crate::error::{Error, Result};

/// A pre-compiled page template.
///
/// Field references use `{{ field_name }}` (surrounding spaces optional). Single
/// braces are ordinary text, so CSS and JavaScript blocks need no escaping.
///
/// The template is parsed once into a sequence of literal and field segments.
/// Rendering is a single left-to-right pass; substituted values are never
/// re-scanned for field references.
#[derive(Clone, Debug)]
pub struct Template {
    parts: Vec<TemplatePart>,
    /// Pre-computed estimate of output size for allocation.
    estimated_size: usize,
}

#[derive(Clone, Debug)]
enum TemplatePart {
    Literal(String),
    Field(String),
}

impl Template {
    /// Compile a template string.
    ///
    /// An unclosed `{{` is kept as literal text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTemplate`] for an empty field reference (`{{ }}`).
    pub fn compile(template: &str) -> Result<Template> {
        let mut parts = Vec::new();
        let mut estimated_size = 0;
        let mut rest = template;

        while let Some(open) = rest.find("{{") {
            let after_open = &rest[open + 2..];
            let Some(close) = after_open.find("}}") else {
                break;
            };
            let name = after_open[..close].trim();
            if name.is_empty() {
                return Err(Error::InvalidTemplate {
                    reason: format!("empty field name at byte {}", template.len() - rest.len() + open),
                });
            }
            if open > 0 {
                estimated_size += open;
                parts.push(TemplatePart::Literal(rest[..open].to_string()));
            }
            // Estimate ~64 bytes per field value
            estimated_size += 64;
            parts.push(TemplatePart::Field(name.to_string()));
            rest = &after_open[close + 2..];
        }

        if !rest.is_empty() {
            estimated_size += rest.len();
            parts.push(TemplatePart::Literal(rest.to_string()));
        }

        Ok(Template {
            parts,
            estimated_size,
        })
    }

    /// Render the template using a closure to look up field values.
    #[inline]
    pub fn render<'a>(&self, mut lookup: impl FnMut(&str) -> &'a str) -> String {
        let mut output = String::with_capacity(self.estimated_size);
        for part in &self.parts {
            match part {
                TemplatePart::Literal(s) => output.push_str(s),
                TemplatePart::Field(name) => output.push_str(lookup(name)),
            }
        }
        output
    }
}
