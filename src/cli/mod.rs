//! GB-015: CLI subcommands — init, validate, inspect, compile, check.

use crate::core::compiler::{self, BuildConfig, Compilation};
use crate::core::cycles::CycleRange;
use crate::core::partition::Resources;
use crate::core::profile::{self, Profile};
use crate::core::types::{CallRecord, CompileEvent, Segment};
use crate::core::{parser, sequence, state};
use crate::tripwire::{drift, eventlog};
use clap::Subcommand;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write the default emission profile
    Init {
        /// Profile path to create
        #[arg(default_value = "gbsegen.yaml")]
        path: PathBuf,
    },

    /// Parse a graph and check every name resolves
    Validate {
        /// Path to the aDOT graph
        #[arg(short, long)]
        file: PathBuf,

        /// Emission profile (default: built-in C++ profile)
        #[arg(short, long)]
        profile: Option<PathBuf>,
    },

    /// Show call records, loops, segments and resources
    Inspect {
        /// Path to the aDOT graph
        #[arg(short, long)]
        file: PathBuf,

        /// Emission profile (default: built-in C++ profile)
        #[arg(short, long)]
        profile: Option<PathBuf>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Compile a graph to a linear program
    Compile {
        /// Path to the aDOT graph
        #[arg(short, long)]
        file: PathBuf,

        /// Output path (default: graph path with the profile's extension)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Emission profile (default: built-in C++ profile)
        #[arg(short, long)]
        profile: Option<PathBuf>,

        /// Record a build lock and events here
        #[arg(long)]
        state_dir: Option<PathBuf>,
    },

    /// Detect stale or edited output against the build lock (tripwire)
    Check {
        /// Path to the aDOT graph
        #[arg(short, long)]
        file: PathBuf,

        /// Emission profile to compare against the recorded one
        #[arg(short, long)]
        profile: Option<PathBuf>,

        /// State directory
        #[arg(long, default_value = "state")]
        state_dir: PathBuf,

        /// Exit non-zero on any drift (for CI)
        #[arg(long)]
        tripwire: bool,
    },
}

/// Dispatch a CLI command.
pub fn dispatch(cmd: Commands) -> Result<(), String> {
    match cmd {
        Commands::Init { path } => cmd_init(&path),
        Commands::Validate { file, profile } => cmd_validate(&file, profile.as_deref()),
        Commands::Inspect {
            file,
            profile,
            json,
        } => cmd_inspect(&file, profile.as_deref(), json),
        Commands::Compile {
            file,
            output,
            profile,
            state_dir,
        } => cmd_compile(&file, output.as_deref(), profile.as_deref(), state_dir.as_deref()),
        Commands::Check {
            file,
            profile,
            state_dir,
            tripwire,
        } => cmd_check(&file, profile.as_deref(), &state_dir, tripwire),
    }
}

/// Load the given profile or fall back to the built-in one, then validate it.
fn load_profile(path: Option<&Path>) -> Result<Profile, String> {
    let profile = match path {
        Some(p) => profile::load_profile(p).map_err(|e| e.to_string())?,
        None => Profile::default(),
    };
    let errors = profile::validate_profile(&profile);
    if errors.is_empty() {
        return Ok(profile);
    }
    for e in &errors {
        eprintln!("  ERROR: {}", e);
    }
    Err(format!("{} profile error(s)", errors.len()))
}

fn read_graph(file: &Path) -> Result<String, String> {
    std::fs::read_to_string(file).map_err(|e| format!("cannot read {}: {}", file.display(), e))
}

fn cmd_init(path: &Path) -> Result<(), String> {
    if path.exists() {
        return Err(format!("{} already exists", path.display()));
    }
    let yaml = profile::default_profile_yaml()?;
    state::write_atomic(path, &yaml).map_err(|e| format!("cannot write {}: {}", path.display(), e))?;
    println!("Created default profile: {}", path.display());
    Ok(())
}

fn cmd_validate(file: &Path, profile_path: Option<&Path>) -> Result<(), String> {
    let profile = load_profile(profile_path)?;
    let graph = parser::parse_graph(&read_graph(file)?).map_err(|e| e.to_string())?;
    let records = sequence::build_call_sequence(&graph, &profile).map_err(|e| e.to_string())?;

    println!(
        "OK: {} ({} nodes, {} edges, {} bindings)",
        graph.program_name(),
        graph.nodes.len(),
        records.len(),
        graph.lookup.len()
    );
    Ok(())
}

/// Everything `inspect --json` prints.
#[derive(Serialize)]
struct InspectView<'a> {
    program: &'a str,
    records: &'a [CallRecord],
    cycles: &'a [CycleRange],
    segments: &'a [Segment],
    resources: &'a Resources,
}

fn cmd_inspect(file: &Path, profile_path: Option<&Path>, json: bool) -> Result<(), String> {
    let profile = load_profile(profile_path)?;
    let c = compiler::compile_source(&read_graph(file)?, &profile).map_err(|e| e.to_string())?;

    if json {
        let view = InspectView {
            program: c.program(),
            records: &c.records,
            cycles: &c.cycles,
            segments: &c.segments,
            resources: &c.resources,
        };
        let out = serde_json::to_string_pretty(&view).map_err(|e| format!("JSON error: {}", e))?;
        println!("{}", out);
        return Ok(());
    }

    print_inspection(&c);
    Ok(())
}

fn print_inspection(c: &Compilation) {
    println!("Program: {}", c.program());
    println!();

    println!("Records ({}):", c.records.len());
    for (i, r) in c.records.iter().enumerate() {
        let mark = if r.in_cycle { "@" } else { " " };
        println!(
            "  {}{:>3} node {} -> {}: {} / {} [gate {}]{}",
            mark,
            i,
            r.node_id,
            c.graph.node(r.target).id,
            r.processor,
            r.predicate,
            r.gate,
            if r.terminal { " terminal" } else { "" }
        );
    }

    if !c.cycles.is_empty() {
        println!();
        println!("Back-references:");
        for range in &c.cycles {
            println!(
                "  node {} -> node {}: records {}..={}",
                range.node_id, range.target_id, range.start, range.end
            );
        }
    }

    println!();
    println!("Segments ({}):", c.segments.len());
    for segment in &c.segments {
        match segment {
            Segment::Straight(r) => println!("  call {} / {}", r.processor.name, r.predicate.name),
            Segment::Loop {
                body,
                exit_condition,
            } => {
                println!("  loop while {} ({} calls)", exit_condition, body.len());
                for r in body {
                    println!("    call {} / {}", r.processor.name, r.predicate.name);
                }
            }
        }
    }

    println!();
    println!("Loads ({}):", c.resources.loads.len());
    for module in c.resources.loads.iter() {
        println!("  {}", module);
    }
    println!("Resolutions ({}):", c.resources.resolutions.len());
    for pair in c.resources.resolutions.iter() {
        println!("  {} + {}", pair.processor, pair.predicate);
    }
}

fn cmd_compile(
    file: &Path,
    output: Option<&Path>,
    profile_path: Option<&Path>,
    state_dir: Option<&Path>,
) -> Result<(), String> {
    let profile = load_profile(profile_path)?;
    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| file.with_extension(&profile.extension));

    let report = compiler::build(&BuildConfig {
        input: file,
        output: &output,
        profile: &profile,
        state_dir,
    })
    .map_err(|e| e.to_string())?;

    let s = &report.summary;
    println!(
        "{}: {} records, {} straight, {} loop(s), {} load(s), {} resolution(s) ({:.3}s)",
        report.program,
        s.records,
        s.straight,
        s.loops,
        s.loads,
        s.resolutions,
        report.total_seconds
    );
    println!("  Wrote: {} ({})", report.output.display(), report.output_hash);
    Ok(())
}

fn cmd_check(
    file: &Path,
    profile_path: Option<&Path>,
    state_dir: &Path,
    tripwire_mode: bool,
) -> Result<(), String> {
    let program = std::fs::read_to_string(file)
        .ok()
        .and_then(|text| parser::peek_program_name(&text))
        .unwrap_or_else(|| "solver".to_string());
    let profile = match profile_path {
        Some(p) => Some(load_profile(Some(p))?),
        None => None,
    };

    let lock = state::load_lock(state_dir, &program)?
        .ok_or_else(|| format!("no build lock for {} in {}", program, state_dir.display()))?;

    println!("Checking {} (built {})...", program, lock.generated_at);
    let findings = drift::detect_drift(&lock, profile.as_ref());

    if findings.is_empty() {
        println!("No drift detected.");
        return Ok(());
    }

    for f in &findings {
        println!("  DRIFTED: {} ({})", f.artifact, f.detail);
        println!("    Expected: {}", f.expected_hash);
        println!("    Actual:   {}", f.actual_hash);
        eventlog::append_event(
            state_dir,
            &program,
            CompileEvent::DriftDetected {
                program: program.clone(),
                artifact: f.artifact.to_string(),
                expected_hash: f.expected_hash.clone(),
                actual_hash: f.actual_hash.clone(),
            },
        )?;
    }
    println!();
    println!("Drift detected: {} finding(s)", findings.len());

    if tripwire_mode {
        return Err(format!("{} drift finding(s)", findings.len()));
    }
    Ok(())
}
