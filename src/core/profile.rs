//! GB-004: Emission profile — the pluggable target-language syntax.
//!
//! A YAML file whose every field has a default. The defaults reproduce the
//! classic C++/WinAPI solver program: `LoadLibrary` per component,
//! `GetProcAddress` per entry point, and `F(proc, pred, m)` dispatch.
//! Entry-point identifiers carry their component (`proc_<module>_<name>`)
//! so two components may export the same name.

use super::error::CompileError;
use super::template;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Variables available to each template.
pub const HEADER_VARS: &[&str] = &["program", "generator", "state_type", "state_var"];
pub const LOAD_VARS: &[&str] = &["module"];
pub const RESOLVE_VARS: &[&str] = &["name", "module"];
pub const CALL_VARS: &[&str] = &[
    "processor",
    "processor_module",
    "predicate",
    "predicate_module",
    "state",
];
pub const LOOP_OPEN_VARS: &[&str] = &["state"];
pub const LOOP_CLOSE_VARS: &[&str] = &["condition"];
pub const CONDITION_VARS: &[&str] = &["predicate", "module", "state"];
pub const NEGATE_VARS: &[&str] = &["expr"];

const DEFAULT_HEADER: &str = r#"// Generated by gbsegen {{generator}} from graph `{{program}}`. Do not edit.
#include <windows.h>
#include <anymap.h>

typedef int processorFuncType({{state_type}} &);
typedef bool predicateFuncType(const {{state_type}} &);

int F(processorFuncType *tf, predicateFuncType *tp, {{state_type}} &p_m)
{
	if (tp(p_m))
		return 1;
	return tf(p_m);
}

int main()
{
	{{state_type}} {{state_var}}("input.aini");
	int res = 0;
"#;

const DEFAULT_FOOTER: &str = "\treturn 0;\n}\n";

/// Target-language syntax and name-resolution policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Profile {
    /// Text before the first load statement
    pub header: String,

    /// Text after the last segment
    pub footer: String,

    /// One component load
    pub load: String,

    /// Processor entry-point resolution
    pub resolve_processor: String,

    /// Predicate entry-point resolution
    pub resolve_predicate: String,

    /// One dispatch with early return on non-zero
    pub call: String,

    pub loop_open: String,
    pub loop_close: String,

    /// Predicate evaluation used in loop exit tests
    pub condition: String,

    /// Negation of a condition expression
    pub negate: String,

    /// Indentation unit for body statements
    pub indent: String,

    /// Shared-state container type
    pub state_type: String,

    /// Shared-state variable name
    pub state_var: String,

    /// Predicate used on ungated edges
    pub placeholder_predicate: String,

    /// Component for bindings that declare no module
    pub default_module: String,

    /// Substitute `unresolved_name` for names missing from the lookup
    pub allow_unresolved: bool,

    pub unresolved_name: String,

    /// Extension of the generated file
    pub extension: String,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            header: DEFAULT_HEADER.to_string(),
            footer: DEFAULT_FOOTER.to_string(),
            load: r#"HMODULE lib_{{module}} = LoadLibrary(L"{{module}}");"#.to_string(),
            resolve_processor: r#"processorFuncType *proc_{{module}}_{{name}} = (processorFuncType *)GetProcAddress(lib_{{module}}, "{{name}}");"#.to_string(),
            resolve_predicate: r#"predicateFuncType *pred_{{module}}_{{name}} = (predicateFuncType *)GetProcAddress(lib_{{module}}, "{{name}}");"#.to_string(),
            call: "res = F(proc_{{processor_module}}_{{processor}}, pred_{{predicate_module}}_{{predicate}}, {{state}}); if (res != 0) return res;".to_string(),
            loop_open: "do {".to_string(),
            loop_close: "} while ({{condition}});".to_string(),
            condition: "pred_{{module}}_{{predicate}}({{state}})".to_string(),
            negate: "!{{expr}}".to_string(),
            indent: "\t".to_string(),
            state_type: "AnyMap".to_string(),
            state_var: "m".to_string(),
            placeholder_predicate: "default_pred_name".to_string(),
            default_module: "solver".to_string(),
            allow_unresolved: false,
            unresolved_name: "def_proc_name".to_string(),
            extension: "cpp".to_string(),
        }
    }
}

/// Load a profile from a YAML file.
pub fn load_profile(path: &Path) -> Result<Profile, CompileError> {
    let content = std::fs::read_to_string(path).map_err(|e| CompileError::io(path, e))?;
    parse_profile(&content).map_err(|e| match e {
        CompileError::Profile { reason, .. } => CompileError::Profile {
            origin: path.display().to_string(),
            reason,
        },
        other => other,
    })
}

/// Parse a profile from a YAML string.
pub fn parse_profile(yaml: &str) -> Result<Profile, CompileError> {
    serde_yaml_ng::from_str(yaml).map_err(|e| CompileError::Profile {
        origin: "<inline>".to_string(),
        reason: format!("YAML parse error: {}", e),
    })
}

/// Render the default profile as YAML, for `init`.
pub fn default_profile_yaml() -> Result<String, String> {
    serde_yaml_ng::to_string(&Profile::default()).map_err(|e| format!("serialize error: {}", e))
}

/// Validate a profile. Returns a list of errors (empty = valid).
pub fn validate_profile(profile: &Profile) -> Vec<CompileError> {
    let mut errors = Vec::new();

    let templates: [(&str, &str, &[&str]); 10] = [
        ("header", profile.header.as_str(), HEADER_VARS),
        ("footer", profile.footer.as_str(), HEADER_VARS),
        ("load", profile.load.as_str(), LOAD_VARS),
        ("resolve_processor", profile.resolve_processor.as_str(), RESOLVE_VARS),
        ("resolve_predicate", profile.resolve_predicate.as_str(), RESOLVE_VARS),
        ("call", profile.call.as_str(), CALL_VARS),
        ("loop_open", profile.loop_open.as_str(), LOOP_OPEN_VARS),
        ("loop_close", profile.loop_close.as_str(), LOOP_CLOSE_VARS),
        ("condition", profile.condition.as_str(), CONDITION_VARS),
        ("negate", profile.negate.as_str(), NEGATE_VARS),
    ];
    for (field, text, allowed) in templates {
        if let Err(e) = template::check(text, allowed) {
            let reason = match e {
                CompileError::Template { reason, .. } => reason,
                other => other.to_string(),
            };
            errors.push(CompileError::Profile {
                origin: field.to_string(),
                reason,
            });
        }
    }

    // Names that end up inside identifiers
    let names = [
        ("state_var", &profile.state_var),
        ("placeholder_predicate", &profile.placeholder_predicate),
        ("default_module", &profile.default_module),
        ("unresolved_name", &profile.unresolved_name),
    ];
    for (field, value) in names {
        if value.is_empty() {
            errors.push(CompileError::Profile {
                origin: field.to_string(),
                reason: "must not be empty".to_string(),
            });
        }
    }

    if !profile.negate.contains("{{") {
        errors.push(CompileError::Profile {
            origin: "negate".to_string(),
            reason: "must reference {{expr}}".to_string(),
        });
    }

    errors
}
