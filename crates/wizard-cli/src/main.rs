mod wizard;

use clap::{Parser, Subcommand};
use serde_json::json;
use std::env;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use wizard::{Verbosity, WizardPresenter, parse_answer};
use wizard_engine::{
    CompletionError, EngineBuilder, EngineConfig, EngineError, FileStore, FormEngine, Outcome,
    completion_fn,
};
use wizard_spec::{
    FormData, StepId, StepSpec, StepTable, WizardSchema, data_schema, progress,
    validate_visible_steps, visible_steps,
};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

const STATE_DIR_ENV: &str = "WIZARD_STATE_DIR";
const DEFAULT_STATE_DIR: &str = ".wizard-drafts";

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Text-based onboarding wizard",
    long_about = "Runs multi-step onboarding wizards with resumable drafts, and checks answers against a wizard schema"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a wizard in a text shell, resuming any saved draft.
    Run {
        /// Path to the wizard schema JSON.
        #[arg(long, value_name = "SCHEMA")]
        schema: PathBuf,
        /// JSON object of values from the signed-in identity; these beat the draft.
        #[arg(long, value_name = "IDENTITY")]
        identity: Option<PathBuf>,
        /// Directory holding draft files (defaults to WIZARD_STATE_DIR or .wizard-drafts).
        #[arg(long, value_name = "DIR")]
        state_dir: Option<PathBuf>,
        /// Engine config JSON (namespace, persist, submit_policy).
        #[arg(long, value_name = "CONFIG")]
        config: Option<PathBuf>,
        /// Where to write the completed record; printed to stdout when omitted.
        #[arg(long, value_name = "OUT")]
        out: Option<PathBuf>,
        /// Show verbose output (slot ids, capabilities, parse expectations).
        #[arg(long, alias = "debug")]
        verbose: bool,
        /// Also emit the completed record as JSON after the CBOR summary.
        #[arg(long)]
        answers_json: bool,
    },
    /// Validate every visible step of a wizard against an answers file.
    Validate {
        #[arg(long, value_name = "SCHEMA")]
        schema: PathBuf,
        #[arg(long, value_name = "ANSWERS")]
        answers: PathBuf,
    },
    /// Print visible steps and progress counters for a set of answers.
    Progress {
        #[arg(long, value_name = "SCHEMA")]
        schema: PathBuf,
        #[arg(long, value_name = "ANSWERS")]
        answers: PathBuf,
        /// Slot to report progress for (defaults to the first).
        #[arg(long, value_name = "STEP", default_value_t = 1)]
        step: StepId,
    },
    /// Print the JSON Schema of the wizard schema format, or of a wizard's record.
    Schema {
        /// Emit the schema of the record collected by this wizard instead.
        #[arg(long, value_name = "SCHEMA")]
        record: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> CliResult<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            schema,
            identity,
            state_dir,
            config,
            out,
            verbose,
            answers_json,
        } => {
            let options = RunOptions {
                identity,
                state_dir,
                config,
                out,
                verbosity: Verbosity::from_verbose(verbose),
                answers_json,
            };
            run_wizard(schema, options).await
        }
        Command::Validate { schema, answers } => run_validate(schema, answers),
        Command::Progress {
            schema,
            answers,
            step,
        } => run_progress(schema, answers, step),
        Command::Schema { record } => run_schema(record),
    }
}

/// Engine events go to stderr so stdout stays clean for records and reports.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "wizard_engine=info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

struct RunOptions {
    identity: Option<PathBuf>,
    state_dir: Option<PathBuf>,
    config: Option<PathBuf>,
    out: Option<PathBuf>,
    verbosity: Verbosity,
    answers_json: bool,
}

enum StepInput {
    Filled,
    Back,
    Quit,
}

async fn run_wizard(schema_path: PathBuf, options: RunOptions) -> CliResult<()> {
    let schema = load_schema(&schema_path)?;
    let config = match &options.config {
        Some(path) => EngineConfig::from_json(&fs::read_to_string(path)?)?,
        None => EngineConfig::default().with_namespace(schema.id.clone()),
    };
    let overrides = match &options.identity {
        Some(path) => load_form_data(path)?,
        None => FormData::new(),
    };
    let state_dir = options
        .state_dir
        .or_else(|| env::var_os(STATE_DIR_ENV).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_DIR));
    let store = FileStore::new(state_dir);
    debug!(
        wizard = %schema.id,
        namespace = %config.namespace,
        state_dir = %store.root().display(),
        "starting wizard"
    );

    let out = options.out;
    let completion = completion_fn(move |data: FormData| {
        let out = out.clone();
        async move { write_record(out.as_deref(), &data) }
    });

    let mut engine = EngineBuilder::from_schema(&schema, Arc::new(completion))?
        .store(store)
        .config(config)
        .overrides(overrides)
        .build();

    let mut presenter = WizardPresenter::new(options.verbosity, options.answers_json);
    presenter.show_header(&schema);

    let stdin = io::stdin();
    let mut input = stdin.lock();
    loop {
        let view = engine.view();
        let step = find_step(&schema, view.step_id)?;
        presenter.show_step(&view, step);
        if !view.errors.is_empty() {
            presenter.show_errors(&view.errors);
        }

        match collect_step(&mut engine, step, &presenter, &mut input)? {
            StepInput::Filled => {}
            StepInput::Back => {
                engine.retreat()?;
                continue;
            }
            StepInput::Quit => {
                println!("Draft saved. Run the wizard again to pick up where you left off.");
                return Ok(());
            }
        }

        if engine.can_submit() {
            match engine.submit().await {
                Ok(Outcome::Completed) => {
                    presenter.show_completion(engine.data());
                    return Ok(());
                }
                // Invalid errors are shown with the step on the next pass.
                Ok(_) => {}
                Err(EngineError::Completion(err)) => {
                    eprintln!("Could not hand off the record: {}", err);
                    eprintln!("Your answers are kept; run the wizard again to retry.");
                    return Err("completion failed".into());
                }
                Err(err) => return Err(err.into()),
            }
        } else {
            engine.advance()?;
        }
    }
}

/// Prompts each field of `step`. Blank input keeps the current value.
fn collect_step(
    engine: &mut FormEngine,
    step: &StepSpec,
    presenter: &WizardPresenter,
    input: &mut impl BufRead,
) -> CliResult<StepInput> {
    for field in &step.fields {
        loop {
            presenter.show_prompt(field, engine.data().get(&field.name));
            print!("> ");
            io::stdout().flush()?;

            let mut line = String::new();
            if input.read_line(&mut line)? == 0 {
                return Ok(StepInput::Quit);
            }
            let trimmed = line.trim();
            match trimmed {
                ":back" => return Ok(StepInput::Back),
                ":quit" => return Ok(StepInput::Quit),
                "" => break,
                _ => {}
            }

            match parse_answer(field, trimmed) {
                Ok(value) => {
                    engine.update_field(field.name.clone(), value)?;
                    break;
                }
                Err(err) => presenter.show_parse_error(&err),
            }
        }
    }
    Ok(StepInput::Filled)
}

fn write_record(out: Option<&Path>, data: &FormData) -> Result<(), CompletionError> {
    let pretty = data.to_json_pretty()?;
    match out {
        Some(path) => {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, pretty)?;
        }
        None => println!("{}", pretty),
    }
    Ok(())
}

fn run_validate(schema_path: PathBuf, answers_path: PathBuf) -> CliResult<()> {
    let schema = load_schema(&schema_path)?;
    let table = StepTable::from_schema(&schema)?;
    let answers = load_form_data(&answers_path)?;

    let failures = validate_visible_steps(&table, &answers);
    println!(
        "Validation result: {}",
        if failures.is_empty() { "valid" } else { "invalid" }
    );
    if failures.is_empty() {
        return Ok(());
    }

    println!("Errors:");
    for (step, errors) in &failures {
        for (field, message) in errors {
            println!("  step {} {} - {}", step, field, message);
        }
    }
    Err("validation failed".into())
}

fn run_progress(schema_path: PathBuf, answers_path: PathBuf, step: StepId) -> CliResult<()> {
    let schema = load_schema(&schema_path)?;
    let table = StepTable::from_schema(&schema)?;
    if !table.contains(step) {
        return Err(format!("step {} is not defined by '{}'", step, schema.id).into());
    }
    let answers = load_form_data(&answers_path)?;

    let report = json!({
        "step": step,
        "visible": table.is_visible(step, &answers),
        "visible_steps": visible_steps(&table, &answers),
        "progress": progress(&table, step, &answers),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_schema(record: Option<PathBuf>) -> CliResult<()> {
    let schema = match record {
        Some(path) => data_schema::generate(&load_schema(&path)?),
        None => serde_json::to_value(schemars::schema_for!(WizardSchema))?,
    };
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

fn load_schema(path: &Path) -> CliResult<WizardSchema> {
    let contents = fs::read_to_string(path)?;
    Ok(WizardSchema::from_json(&contents)?)
}

fn load_form_data(path: &Path) -> CliResult<FormData> {
    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

fn find_step<'a>(schema: &'a WizardSchema, id: StepId) -> CliResult<&'a StepSpec> {
    schema
        .steps
        .iter()
        .find(|step| step.id == id)
        .ok_or_else(|| format!("wizard schema has no step {}", id).into())
}
