mod input;

use clap::{Parser, Subcommand, ValueEnum};
use form_spec::{
    Answer, Dictionary, DraftStore, FileDraftStore, InspectionState, IssueDetail, SchemaRepository, Session,
    SubmitError, ValidationReport, build_empty_state, build_render_payload, render_json_ui, render_text,
    validate_all, validate_section,
};
use input::parse_value;
use serde_json::Value;
use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

const STATE_ENV: &str = "INSPECT_FORMS_STATE";
const DEFAULT_STATE_FILE: &str = "inspection.draft.json";

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Inspection form state CLI",
    long_about = "Edits, validates and renders in-progress inspection answers against a field dictionary"
)]
struct Cli {
    /// Path to the field dictionary JSON.
    #[arg(long, global = true, value_name = "DICTIONARY")]
    dictionary: Option<PathBuf>,
    /// State file (defaults to INSPECT_FORMS_STATE or ./inspection.draft.json; `.cbor` selects CBOR).
    #[arg(long, global = true, value_name = "STATE")]
    state: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum RenderMode {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Write an empty state seeded with dictionary defaults.
    Init {
        /// Overwrite an existing state file.
        #[arg(long)]
        force: bool,
    },
    /// Answer or skip one field.
    Set {
        key: String,
        /// Raw answer text; parsed according to the field type.
        value: Option<String>,
        /// Record the field as skipped instead of answered.
        #[arg(long)]
        skip: bool,
        #[arg(long, requires = "skip")]
        reason: Option<String>,
        #[arg(long, requires = "skip")]
        note: Option<String>,
        /// Clear dependent answers without asking.
        #[arg(long)]
        yes: bool,
    },
    /// Remove answers or whole subtrees.
    Clear {
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Record issue details for a field answered with a problem.
    Issue {
        key: String,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        /// Photo reference to attach; repeatable.
        #[arg(long = "photo")]
        photos: Vec<String>,
    },
    /// Clear answers held by auto-skipped sections.
    AutoSkip,
    /// Validate the state, optionally for a single section.
    Validate {
        #[arg(long)]
        section: Option<String>,
    },
    /// Print the render payload.
    Render {
        #[arg(long, value_enum, default_value_t = RenderMode::Text)]
        format: RenderMode,
    },
    /// Validate and print the final state, then discard the draft.
    Submit,
    /// Print the JSON Schema of the dictionary format.
    DictionarySchema,
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .init();

    let cli = Cli::parse();
    if let Command::DictionarySchema = cli.command {
        return run_dictionary_schema();
    }

    let schema = load_dictionary(cli.dictionary.as_deref())?;
    let state_path = resolve_state_path(cli.state);
    debug!(state = %state_path.display(), "using state file");

    match cli.command {
        Command::Init { force } => run_init(&schema, &state_path, force),
        Command::Set {
            key,
            value,
            skip,
            reason,
            note,
            yes,
        } => run_set(&schema, &state_path, &key, value, skip.then_some((reason, note)), yes),
        Command::Clear { paths } => {
            let mut session = open_session(&schema, &state_path);
            session.clear_paths(&paths);
            println!("Cleared {}", paths.join(", "));
            Ok(())
        }
        Command::Issue {
            key,
            location,
            notes,
            photos,
        } => run_issue(&schema, &state_path, &key, location, notes, photos),
        Command::AutoSkip => {
            let mut session = open_session(&schema, &state_path);
            session.apply_auto_skip();
            println!("Auto-skip applied");
            Ok(())
        }
        Command::Validate { section } => run_validate(&schema, &state_path, section.as_deref()),
        Command::Render { format } => {
            let state = load_state(&schema, &state_path);
            let payload = build_render_payload(&schema, &state);
            match format {
                RenderMode::Text => println!("{}", render_text(&payload)),
                RenderMode::Json => println!("{}", serde_json::to_string_pretty(&render_json_ui(&payload))?),
            }
            Ok(())
        }
        Command::Submit => run_submit(&schema, &state_path),
        Command::DictionarySchema => run_dictionary_schema(),
    }
}

fn load_dictionary(path: Option<&Path>) -> CliResult<SchemaRepository> {
    let path = path.ok_or("--dictionary is required for this command")?;
    Ok(SchemaRepository::from_file(path)?)
}

fn resolve_state_path(state: Option<PathBuf>) -> PathBuf {
    state
        .or_else(|| env::var_os(STATE_ENV).map(PathBuf::from))
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_FILE))
}

fn open_session<'a>(schema: &'a SchemaRepository, state_path: &Path) -> Session<'a> {
    Session::with_drafts(schema, Box::new(FileDraftStore::new(state_path)))
}

fn load_state(schema: &SchemaRepository, state_path: &Path) -> InspectionState {
    FileDraftStore::new(state_path)
        .load()
        .unwrap_or_else(|| build_empty_state(schema))
}

fn run_init(schema: &SchemaRepository, state_path: &Path, force: bool) -> CliResult<()> {
    if state_path.exists() && !force {
        return Err(format!(
            "state file '{}' already exists; pass --force to overwrite",
            state_path.display()
        )
        .into());
    }
    let mut store = FileDraftStore::new(state_path);
    store.save(&build_empty_state(schema));
    if !state_path.exists() {
        return Err(format!("could not write state file '{}'", state_path.display()).into());
    }
    println!(
        "Initialised {} ({} sections, dictionary {})",
        state_path.display(),
        schema.sections().len(),
        schema.version()
    );
    Ok(())
}

fn run_set(
    schema: &SchemaRepository,
    state_path: &Path,
    key: &str,
    value: Option<String>,
    skip: Option<(Option<String>, Option<String>)>,
    yes: bool,
) -> CliResult<()> {
    let answer = match skip {
        Some((reason, note)) => Answer::skipped(reason, note),
        None => {
            let raw = value.ok_or("a value is required unless --skip is given")?;
            let value = parse_value(schema, key, &raw).inspect_err(|err| {
                debug!(key = %key, detail = ?err.debug_message, "rejected value");
            })?;
            Answer::answered(value)
        }
    };
    let mut session = open_session(schema, state_path);
    let cleared = session.set_answer_with_gate_check(key, answer, |paths| {
        if yes {
            return true;
        }
        println!("Changing '{}' will clear: {}", key, paths.join(", "));
        prompt_bool("Continue?", false).unwrap_or(false)
    })?;
    if !cleared.is_empty() {
        println!("Cleared {}", cleared.join(", "));
    }
    println!("Saved {}", key);
    Ok(())
}

fn run_issue(
    schema: &SchemaRepository,
    state_path: &Path,
    key: &str,
    location: Option<String>,
    notes: Option<String>,
    photos: Vec<String>,
) -> CliResult<()> {
    let mut session = open_session(schema, state_path);
    let current = session.state().issue_detail(key).cloned().unwrap_or_default();
    let detail = IssueDetail {
        location: location.unwrap_or(current.location),
        notes: notes.unwrap_or(current.notes),
        photo_ids: current.photo_ids,
    };
    session.upsert_issue_detail(key, detail);
    for photo in &photos {
        session.add_issue_photo(key, photo);
    }
    let complete = session.state().issue_detail(key).is_some_and(IssueDetail::is_complete);
    println!(
        "Issue details for {} {}",
        key,
        if complete { "complete" } else { "incomplete" }
    );
    Ok(())
}

fn run_validate(schema: &SchemaRepository, state_path: &Path, section: Option<&str>) -> CliResult<()> {
    let state = load_state(schema, state_path);
    let report: ValidationReport = match section {
        Some(id) => {
            if schema.section(id).is_none() {
                return Err(format!("unknown section '{}'", id).into());
            }
            let errors = validate_section(schema, id, &state);
            if errors.is_empty() {
                ValidationReport::new()
            } else {
                ValidationReport::from([(id.to_string(), errors)])
            }
        }
        None => validate_all(schema, &state),
    };
    println!(
        "Validation result: {}",
        if report.is_empty() { "valid" } else { "invalid" }
    );
    describe_report(&report);
    if report.is_empty() {
        Ok(())
    } else {
        Err("validation failed".into())
    }
}

fn describe_report(report: &ValidationReport) {
    for (section, errors) in report {
        println!("[{}]", section);
        for (key, message) in errors {
            println!("  {} - {}", key, message);
        }
    }
}

fn run_submit(schema: &SchemaRepository, state_path: &Path) -> CliResult<()> {
    let mut session = open_session(schema, state_path);
    match session.submit() {
        Ok(submitted) => {
            println!("{}", serde_json::to_string_pretty(&submitted.to_json())?);
            Ok(())
        }
        Err(SubmitError::Invalid(report)) => {
            eprintln!("Submission blocked:");
            for (section, errors) in &report {
                for (key, message) in errors {
                    eprintln!("  [{}] {} - {}", section, key, message);
                }
            }
            Err(SubmitError::Invalid(report).into())
        }
    }
}

fn run_dictionary_schema() -> CliResult<()> {
    let schema = schemars::schema_for!(Dictionary);
    let value: Value = serde_json::to_value(&schema)?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn prompt_line(prompt: &str, default: Option<&str>) -> CliResult<String> {
    if let Some(default_value) = default {
        print!("{} [{}]: ", prompt, default_value);
    } else {
        print!("{}: ", prompt);
    }
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    let trimmed = line.trim();
    if trimmed.is_empty() {
        Ok(default.unwrap_or_default().to_string())
    } else {
        Ok(trimmed.to_string())
    }
}

fn prompt_bool(prompt: &str, default: bool) -> CliResult<bool> {
    let prompt_text = format!("{} (y/n)", prompt.trim());
    let default_hint = if default { "Y" } else { "N" };
    loop {
        let line = prompt_line(&prompt_text, Some(default_hint))?;
        match line.trim().to_lowercase().as_str() {
            "y" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            other => {
                println!("Invalid answer '{}'. Expected yes or no.", other);
            }
        }
    }
}
