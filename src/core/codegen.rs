//! GB-008: Program emission.
//!
//! Renders header, component loads, entry-point resolutions, segments and
//! footer through the profile's templates. A symbol is identified by its
//! component and entry name; one bound by an earlier resolve pair is not
//! declared again.

use super::error::CompileError;
use super::partition::Resources;
use super::profile::Profile;
use super::template::render;
use super::types::{CallRecord, Condition, FunctionRef, ParsedGraph, Segment};
use rustc_hash::FxHashSet;

/// Generator version stamped into headers and locks.
pub const GENERATOR_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Emit the full program text.
pub fn emit(
    graph: &ParsedGraph,
    segments: &[Segment],
    resources: &Resources,
    profile: &Profile,
) -> Result<String, CompileError> {
    let program = graph.program_name();
    let frame_vars = [
        ("program", program),
        ("generator", GENERATOR_VERSION),
        ("state_type", profile.state_type.as_str()),
        ("state_var", profile.state_var.as_str()),
    ];

    let mut out = render(&profile.header, &frame_vars)?;
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }

    for module in resources.loads.iter() {
        let line = render(&profile.load, &[("module", module.as_str())])?;
        push_line(&mut out, &profile.indent, 1, &line);
    }

    out.push_str(&resolve_block(resources, profile)?);

    for segment in segments {
        match segment {
            Segment::Straight(record) => {
                push_line(&mut out, &profile.indent, 1, &call_statement(record, profile)?);
            }
            Segment::Loop {
                body,
                exit_condition,
            } => {
                let open = render(&profile.loop_open, &[("state", profile.state_var.as_str())])?;
                push_line(&mut out, &profile.indent, 1, &open);
                for record in body {
                    push_line(&mut out, &profile.indent, 2, &call_statement(record, profile)?);
                }
                let condition = condition_expr(exit_condition, profile)?;
                let close = render(&profile.loop_close, &[("condition", condition.as_str())])?;
                push_line(&mut out, &profile.indent, 1, &close);
            }
        }
    }

    out.push_str(&render(&profile.footer, &frame_vars)?);
    Ok(out)
}

/// Resolution statements, processor line before predicate line per pair.
fn resolve_block(resources: &Resources, profile: &Profile) -> Result<String, CompileError> {
    let mut out = String::new();
    let mut processors: FxHashSet<&FunctionRef> = FxHashSet::default();
    let mut predicates: FxHashSet<&FunctionRef> = FxHashSet::default();

    for pair in resources.resolutions.iter() {
        if processors.insert(&pair.processor) {
            let line = render(
                &profile.resolve_processor,
                &[
                    ("name", pair.processor.name.as_str()),
                    ("module", pair.processor.module.as_str()),
                ],
            )?;
            push_line(&mut out, &profile.indent, 1, &line);
        }
        if predicates.insert(&pair.predicate) {
            let line = render(
                &profile.resolve_predicate,
                &[
                    ("name", pair.predicate.name.as_str()),
                    ("module", pair.predicate.module.as_str()),
                ],
            )?;
            push_line(&mut out, &profile.indent, 1, &line);
        }
    }

    Ok(out)
}

/// One dispatch statement for a record.
pub fn call_statement(record: &CallRecord, profile: &Profile) -> Result<String, CompileError> {
    render(
        &profile.call,
        &[
            ("processor", record.processor.name.as_str()),
            ("processor_module", record.processor.module.as_str()),
            ("predicate", record.predicate.name.as_str()),
            ("predicate_module", record.predicate.module.as_str()),
            ("state", profile.state_var.as_str()),
        ],
    )
}

/// Loop exit expression, negated through the profile when required.
pub fn condition_expr(condition: &Condition, profile: &Profile) -> Result<String, CompileError> {
    let expr = render(
        &profile.condition,
        &[
            ("predicate", condition.predicate.name.as_str()),
            ("module", condition.predicate.module.as_str()),
            ("state", profile.state_var.as_str()),
        ],
    )?;
    if condition.negated {
        render(&profile.negate, &[("expr", expr.as_str())])
    } else {
        Ok(expr)
    }
}

fn push_line(out: &mut String, indent: &str, depth: usize, line: &str) {
    for _ in 0..depth {
        out.push_str(indent);
    }
    out.push_str(line);
    out.push('\n');
}
