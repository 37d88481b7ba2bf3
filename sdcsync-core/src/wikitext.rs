//! Locating the source citation on a file page.
//!
//! Only the few information templates that carry a `Source` parameter are
//! inspected. The scanner understands enough wiki syntax to split template
//! parameters correctly: nested templates and `[[...]]` links may contain
//! `|` characters of their own.

use tracing::debug;

use crate::identifier::urls_from_source;

/// File-page templates that carry source and reference fields.
pub const SOURCE_TEMPLATES: &[&str] = &["information", "photograph", "artwork", "art photo"];

/// One parsed template invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub name: String,
    /// Parameters in order; positional parameters get their 1-based index
    /// as name.
    pub params: Vec<(String, String)>,
}

impl Template {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Parse every template invocation in `text`, including nested ones, in
/// order of their opening braces.
pub fn templates(text: &str) -> Vec<Template> {
    let mut found = Vec::new();
    let mut cursor = 0;
    while let Some(offset) = text[cursor..].find("{{") {
        let start = cursor + offset;
        if let Some(template) = parse_template_at(text, start) {
            found.push(template);
        }
        cursor = start + 2;
    }
    found
}

fn parse_template_at(text: &str, start: usize) -> Option<Template> {
    let bytes = text.as_bytes();
    let mut parts = Vec::new();
    let mut part_start = start + 2;
    let mut braces = 0usize;
    let mut links = 0usize;
    let mut i = start + 2;

    while i + 1 < bytes.len() {
        match &bytes[i..i + 2] {
            b"{{" => {
                braces += 1;
                i += 2;
                continue;
            }
            b"}}" if braces > 0 => {
                braces -= 1;
                i += 2;
                continue;
            }
            b"}}" => {
                parts.push(&text[part_start..i]);
                return Some(build_template(&parts));
            }
            b"[[" => {
                links += 1;
                i += 2;
                continue;
            }
            b"]]" if links > 0 => {
                links -= 1;
                i += 2;
                continue;
            }
            _ => {}
        }
        if bytes[i] == b'|' && braces == 0 && links == 0 {
            parts.push(&text[part_start..i]);
            part_start = i + 1;
        }
        i += 1;
    }
    None
}

fn build_template(parts: &[&str]) -> Template {
    let raw_name = parts.first().copied().unwrap_or_default();
    // Anything after a newline in the name is a comment or stray markup
    let name = raw_name.split('\n').next().unwrap_or_default().trim();

    let mut positional = 0;
    let params = parts
        .iter()
        .skip(1)
        .map(|part| match part.split_once('=') {
            Some((key, value)) if !key.contains("{{") && !key.contains("[[") => {
                (key.trim().to_string(), value.trim().to_string())
            }
            _ => {
                positional += 1;
                (positional.to_string(), part.trim().to_string())
            }
        })
        .collect();

    Template {
        name: name.to_string(),
        params,
    }
}

fn is_source_template(name: &str) -> bool {
    let name = name.to_lowercase();
    SOURCE_TEMPLATES.contains(&name.as_str())
}

fn urls_from_param(page: &str, names: &[&str]) -> Vec<String> {
    for template in templates(page) {
        if !is_source_template(&template.name) {
            continue;
        }
        for name in names {
            let Some(value) = template.param(name) else {
                continue;
            };
            let urls = urls_from_source(value);
            if !urls.is_empty() {
                debug!(template = %template.name, param = name, count = urls.len(), "Found urls");
                return urls;
            }
        }
    }
    Vec::new()
}

/// URLs in the `Source` parameter of the first information template that
/// has any.
pub fn source_urls_from_page(page: &str) -> Vec<String> {
    urls_from_param(page, &["Source", "source"])
}

/// URLs in the `References` parameter, same rules as
/// [`source_urls_from_page`].
pub fn reference_urls_from_page(page: &str) -> Vec<String> {
    urls_from_param(page, &["References", "references"])
}

/// Citation line pointing at the current record page.
pub fn new_source_text(record_base: &str, id: &str) -> String {
    format!("<br>Image record page in Finna: [{record_base}{id} {id}]\n")
}
