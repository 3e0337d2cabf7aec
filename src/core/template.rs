//! GB-003: `{{var}}` template rendering for emission profiles.
//!
//! Every statement the emitter writes comes from a profile template. Unknown
//! variables and unclosed braces are errors, never silently passed through.

use super::error::CompileError;

/// Template variables, in lookup order.
pub type Vars<'a> = [(&'a str, &'a str)];

/// Substitute every `{{key}}` in `template` from `vars`.
pub fn render(template: &str, vars: &Vars<'_>) -> Result<String, CompileError> {
    let mut result = template.to_string();
    let mut start = 0;

    while let Some(open) = result[start..].find("{{") {
        let open = start + open;
        let close = result[open..]
            .find("}}")
            .ok_or_else(|| template_error(template, format!("unclosed `{{{{` at position {}", open)))?;
        let close = open + close + 2;
        let key = result[open + 2..close - 2].trim();

        let value = vars
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.to_string())
            .ok_or_else(|| template_error(template, format!("unknown template variable: {}", key)))?;

        result.replace_range(open..close, &value);
        start = open + value.len();
    }

    Ok(result)
}

/// List the variables a template refers to, in order of appearance.
pub fn placeholders(template: &str) -> Result<Vec<String>, CompileError> {
    let mut keys = Vec::new();
    let mut start = 0;
    while let Some(open) = template[start..].find("{{") {
        let open = start + open;
        let close = template[open..]
            .find("}}")
            .ok_or_else(|| template_error(template, format!("unclosed `{{{{` at position {}", open)))?;
        keys.push(template[open + 2..open + close].trim().to_string());
        start = open + close + 2;
    }
    Ok(keys)
}

/// Check that a template only uses `allowed` variables.
pub fn check(template: &str, allowed: &[&str]) -> Result<(), CompileError> {
    for key in placeholders(template)? {
        if !allowed.contains(&key.as_str()) {
            return Err(template_error(
                template,
                format!(
                    "unknown template variable: {} (expected one of: {})",
                    key,
                    allowed.join(", ")
                ),
            ));
        }
    }
    Ok(())
}

fn template_error(template: &str, reason: String) -> CompileError {
    CompileError::Template {
        template: template.to_string(),
        reason,
    }
}
