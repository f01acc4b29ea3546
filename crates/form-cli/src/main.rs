mod wizard;

use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::Value;

use form_session::{
    ConfigSource, FileConfigSource, FormSession, HttpClient, HttpSettings, MemorySink,
    OptionLookup, SessionError, StaticOptionLookup, SubmissionRecord, SubmissionSink,
    SubmissionTable, SubmitOutcome,
};
use form_spec::values::value_to_display;
use form_spec::{
    FormConfig, FormValues, OptionSets, RenderField, RenderPayload, ValidationResult,
    build_render_payload, catalog_schema, derive, find_form, flatten_values, is_empty_value,
    parse_catalog, render_json_ui, render_text, validate,
};
use wizard::{PromptContext, Verbosity, WizardPresenter, parse_answer};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Dynamic form CLI",
    long_about = "Checks form configurations, derives validation schemas and fills forms interactively"
)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, global = true, alias = "debug")]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum RenderMode {
    Text,
    Json,
}

#[derive(Args, Clone, Debug)]
struct HttpArgs {
    /// Base URL of the forms service.
    #[arg(long, env = "DYNFORM_BASE_URL")]
    base_url: Option<String>,
    /// Request timeout for the forms service.
    #[arg(long, env = "DYNFORM_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,
    /// Endpoint listing form configurations, relative to the base URL.
    #[arg(long, env = "DYNFORM_FORMS_ENDPOINT")]
    forms_endpoint: Option<String>,
    /// Endpoint accepting submissions, relative to the base URL.
    #[arg(long, env = "DYNFORM_SUBMIT_ENDPOINT")]
    submit_endpoint: Option<String>,
}

impl HttpArgs {
    fn settings(&self) -> HttpSettings {
        let defaults = HttpSettings::default();
        HttpSettings {
            base_url: self.base_url.clone().unwrap_or(defaults.base_url),
            timeout_secs: self.timeout_secs.unwrap_or(defaults.timeout_secs),
            forms_endpoint: self
                .forms_endpoint
                .clone()
                .unwrap_or(defaults.forms_endpoint),
            submit_endpoint: self
                .submit_endpoint
                .clone()
                .unwrap_or(defaults.submit_endpoint),
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Check every form in a configuration document.
    Check {
        /// Path to the form configuration JSON.
        #[arg(long, value_name = "FORMS")]
        forms: PathBuf,
    },
    /// Print the validation schema derived for the given values.
    Schema {
        #[arg(long, value_name = "FORMS")]
        forms: PathBuf,
        /// Form identifier inside the configuration document.
        #[arg(long, value_name = "ID")]
        form: String,
        /// Optional JSON file with current values.
        #[arg(long, value_name = "VALUES")]
        values: Option<PathBuf>,
    },
    /// Print the JSON Schema of the configuration format.
    SpecSchema,
    /// Validate values against a form.
    Validate {
        #[arg(long, value_name = "FORMS")]
        forms: PathBuf,
        #[arg(long, value_name = "ID")]
        form: String,
        #[arg(long, value_name = "VALUES")]
        values: PathBuf,
    },
    /// Render a form for the given values.
    Render {
        #[arg(long, value_name = "FORMS")]
        forms: PathBuf,
        #[arg(long, value_name = "ID")]
        form: String,
        #[arg(long, value_name = "VALUES")]
        values: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = RenderMode::Text)]
        format: RenderMode,
    },
    /// Fill a form interactively and submit it.
    Fill {
        /// Form configuration JSON; fetched from the forms service when omitted.
        #[arg(long, value_name = "FORMS")]
        forms: Option<PathBuf>,
        #[arg(long, value_name = "ID")]
        form: String,
        /// Optional JSON file with initial values.
        #[arg(long, value_name = "VALUES")]
        values: Option<PathBuf>,
        /// Dependent options table (`{"<endpoint>": {"<value>": [...]}}`); the
        /// forms service answers lookups when omitted.
        #[arg(long, value_name = "OPTIONS")]
        options: Option<PathBuf>,
        /// Send the submission to the forms service instead of printing it.
        #[arg(long)]
        remote_submit: bool,
        /// Also print the submission record as JSON.
        #[arg(long)]
        values_json: bool,
        #[arg(long, value_enum, default_value_t = RenderMode::Text)]
        format: RenderMode,
        #[command(flatten)]
        http: HttpArgs,
    },
    /// Print stored submissions as a table.
    Table {
        /// JSON array of submission records.
        #[arg(long, value_name = "RECORDS")]
        records: PathBuf,
        #[arg(long, value_enum, default_value_t = RenderMode::Text)]
        format: RenderMode,
    },
}

#[tokio::main]
async fn main() -> CliResult<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.command {
        Command::Check { forms } => run_check(&forms),
        Command::Schema {
            forms,
            form,
            values,
        } => run_schema(&forms, &form, values.as_deref()),
        Command::SpecSchema => run_spec_schema(),
        Command::Validate {
            forms,
            form,
            values,
        } => run_validate(&forms, &form, &values),
        Command::Render {
            forms,
            form,
            values,
            format,
        } => run_render(&forms, &form, values.as_deref(), format),
        Command::Fill {
            forms,
            form,
            values,
            options,
            remote_submit,
            values_json,
            format,
            http,
        } => {
            let options = FillOptions {
                forms,
                form_id: form,
                values,
                options,
                remote_submit,
                values_json,
                format,
                verbose: cli.verbose,
                http: http.settings(),
            };
            run_fill(options).await
        }
        Command::Table { records, format } => run_table(&records, format),
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_form(path: &Path, form_id: &str) -> CliResult<FormConfig> {
    let json = fs::read_to_string(path)?;
    let forms = parse_catalog(&json)?;
    find_form(&forms, form_id)
        .cloned()
        .ok_or_else(|| format!("form '{}' is not defined in {}", form_id, path.display()).into())
}

fn load_values(path: Option<&Path>) -> CliResult<FormValues> {
    match path {
        Some(path) => {
            let contents = fs::read_to_string(path)?;
            let value: Value = serde_json::from_str(&contents)?;
            if !value.is_object() {
                return Err(format!("{} must contain a JSON object", path.display()).into());
            }
            Ok(flatten_values(&value))
        }
        None => Ok(FormValues::new()),
    }
}

fn run_check(path: &Path) -> CliResult<()> {
    let json = fs::read_to_string(path)?;
    let forms = parse_catalog(&json)?;
    println!("{} form(s) OK", forms.len());
    for form in &forms {
        println!("  {} - {}", form.id, form.title);
    }
    Ok(())
}

fn run_schema(path: &Path, form_id: &str, values: Option<&Path>) -> CliResult<()> {
    let form = load_form(path, form_id)?;
    let values = load_values(values)?;
    let derivation = derive(&form, &values, &OptionSets::new());
    println!(
        "{}",
        serde_json::to_string_pretty(&derivation.schema.to_json_schema())?
    );
    Ok(())
}

fn run_spec_schema() -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(&catalog_schema())?);
    Ok(())
}

fn run_validate(path: &Path, form_id: &str, values: &Path) -> CliResult<()> {
    let form = load_form(path, form_id)?;
    let values = load_values(Some(values))?;

    let result = validate(&form, &values);
    println!(
        "Validation result: {}",
        if result.valid { "valid" } else { "invalid" }
    );
    describe_validation(&result);

    if result.valid {
        Ok(())
    } else {
        Err("validation failed".into())
    }
}

fn describe_validation(result: &ValidationResult) {
    if !result.errors.is_empty() {
        println!("Errors:");
        for error in &result.errors {
            println!("  {} - {}", error.path, error.message);
        }
    }
    if !result.missing_required.is_empty() {
        println!(
            "Missing required fields: {}",
            result.missing_required.join(", ")
        );
    }
    if !result.unknown_fields.is_empty() {
        println!("Unknown fields: {}", result.unknown_fields.join(", "));
    }
}

fn run_render(
    path: &Path,
    form_id: &str,
    values: Option<&Path>,
    format: RenderMode,
) -> CliResult<()> {
    let form = load_form(path, form_id)?;
    let values = load_values(values)?;
    let derivation = derive(&form, &values, &OptionSets::new());
    let payload = build_render_payload(&form, &values, &derivation);
    print_render_output(format, &payload)
}

fn print_render_output(mode: RenderMode, payload: &RenderPayload) -> CliResult<()> {
    match mode {
        RenderMode::Text => println!("{}", render_text(payload)),
        RenderMode::Json => println!(
            "{}",
            serde_json::to_string_pretty(&render_json_ui(payload))?
        ),
    }
    Ok(())
}

fn run_table(path: &Path, format: RenderMode) -> CliResult<()> {
    let contents = fs::read_to_string(path)?;
    let records: Vec<SubmissionRecord> = serde_json::from_str(&contents)?;
    let table = SubmissionTable::from_records(&records);
    match format {
        RenderMode::Json => println!("{}", serde_json::to_string_pretty(&table)?),
        RenderMode::Text => {
            println!("{}", table.columns.join("\t"));
            for row in &table.rows {
                let cells = row
                    .iter()
                    .map(value_to_display)
                    .collect::<Vec<_>>();
                println!("{}", cells.join("\t"));
            }
        }
    }
    Ok(())
}

struct FillOptions {
    forms: Option<PathBuf>,
    form_id: String,
    values: Option<PathBuf>,
    options: Option<PathBuf>,
    remote_submit: bool,
    values_json: bool,
    format: RenderMode,
    verbose: bool,
    http: HttpSettings,
}

async fn run_fill(options: FillOptions) -> CliResult<()> {
    let client = Arc::new(HttpClient::new(options.http.clone())?);
    let source: Box<dyn ConfigSource> = match &options.forms {
        Some(path) => Box::new(FileConfigSource::new(path.clone())),
        None => Box::new(client.as_ref().clone()),
    };
    let lookup: Arc<dyn OptionLookup> = match &options.options {
        Some(path) => Arc::new(StaticOptionLookup::from_json(&fs::read_to_string(path)?)?),
        None => client.clone(),
    };
    let sink: Arc<dyn SubmissionSink> = if options.remote_submit {
        client.clone()
    } else {
        Arc::new(MemorySink::new())
    };

    let mut session =
        FormSession::load(source.as_ref(), &options.form_id, lookup, sink).await?;
    for (id, value) in load_values(options.values.as_deref())? {
        session.set_value(&id, value)?;
    }

    let mut presenter =
        WizardPresenter::new(Verbosity::from_verbose(options.verbose), options.values_json);
    let mut skipped = BTreeSet::new();
    let mut forced: Option<String> = None;

    loop {
        session.resolve_pending().await;
        let payload = session.render_payload();
        print_render_output_for_fill(options.format, &payload)?;
        presenter.show_header(&payload);
        presenter.show_status(&payload);

        let target = forced
            .take()
            .or_else(|| next_unanswered(&payload, &skipped));
        let Some(field_id) = target else {
            match session.submit().await {
                Ok(SubmitOutcome::Submitted(record)) => {
                    presenter.show_completion(&record);
                    return Ok(());
                }
                Ok(SubmitOutcome::Invalid(result)) => {
                    describe_validation(&result);
                    let first = result
                        .errors
                        .first()
                        .map(|error| error.field_id.clone())
                        .ok_or("validation failed without field errors")?;
                    skipped.remove(&first);
                    forced = Some(first);
                    continue;
                }
                Err(SessionError::Submission(err)) => {
                    eprintln!("Submission failed: {}", err);
                    if prompt_bool("Retry submission?", true)? {
                        continue;
                    }
                    return Err(err.into());
                }
                Err(err) => return Err(err.into()),
            }
        };

        let payload = session.render_payload();
        let field = payload
            .field(&field_id)
            .ok_or_else(|| format!("field '{}' is missing from the render payload", field_id))?;
        let prompt = PromptContext::new(field, &payload.progress);
        match prompt_field(&prompt, field, &presenter)? {
            Some(value) => session.set_value(&field_id, value)?,
            None => {
                session.clear_value(&field_id)?;
                skipped.insert(field_id);
            }
        }
    }
}

fn print_render_output_for_fill(mode: RenderMode, payload: &RenderPayload) -> CliResult<()> {
    match mode {
        RenderMode::Text => Ok(()),
        RenderMode::Json => print_render_output(mode, payload),
    }
}

/// First visible field without a value that the user has not skipped.
fn next_unanswered(payload: &RenderPayload, skipped: &BTreeSet<String>) -> Option<String> {
    payload
        .fields
        .iter()
        .find(|field| {
            field.visible
                && !skipped.contains(&field.id)
                && field
                    .current_value
                    .as_ref()
                    .is_none_or(is_empty_value)
        })
        .map(|field| field.id.clone())
}

fn prompt_field(
    prompt: &PromptContext,
    field: &RenderField,
    presenter: &WizardPresenter,
) -> CliResult<Option<Value>> {
    loop {
        presenter.show_prompt(prompt);
        print!("> ");
        io::stdout().flush()?;
        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            return Err("input ended before the form was complete".into());
        }

        let trimmed = input.trim();
        if trimmed.eq_ignore_ascii_case("exit") {
            return Err("wizard aborted by user".into());
        }

        match parse_answer(field, trimmed) {
            Ok(value) => return Ok(value),
            Err(err) => presenter.show_parse_error(&err),
        }
    }
}

fn prompt_bool(prompt: &str, default: bool) -> CliResult<bool> {
    let default_hint = if default { "Y" } else { "N" };
    loop {
        print!("{} (y/n) [{}]: ", prompt.trim(), default_hint);
        io::stdout().flush()?;
        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            return Ok(false);
        }
        match line.trim().to_lowercase().as_str() {
            "" => return Ok(default),
            "y" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            other => {
                println!("Invalid answer '{}'. Expected yes or no.", other);
            }
        }
    }
}
