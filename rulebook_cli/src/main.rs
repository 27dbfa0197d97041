use clap::{Args, Parser, Subcommand};
use rulebook_core::*;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "rulebook")]
#[command(about = "Progression rule editor for training programs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

/// Identifies one program week
#[derive(Args)]
struct WeekArgs {
    /// Program id
    #[arg(long)]
    program: String,

    /// Program schedule id (the recurring workout slot)
    #[arg(long)]
    schedule: String,

    /// Week number, starting at 1
    #[arg(long)]
    week: u32,
}

impl WeekArgs {
    fn key(&self) -> WeekKey {
        WeekKey::new(&self.program, &self.schedule, self.week)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Register a schedule slot, optionally sourced from a template
    Schedule {
        /// Schedule id
        id: String,

        #[arg(long)]
        program: String,

        #[arg(long)]
        name: Option<String>,

        /// Template every week of this slot starts from
        #[arg(long)]
        template: Option<String>,
    },

    /// Import rules from a JSON array
    Import {
        /// Path to the JSON file
        file: PathBuf,
    },

    /// Show the blocks of a week
    Show {
        #[command(flatten)]
        week: WeekArgs,

        /// Print blocks as JSON
        #[arg(long)]
        json: bool,
    },

    /// Edit one field of a block and save the week
    Set {
        #[command(flatten)]
        week: WeekArgs,

        /// Block order
        #[arg(long)]
        block: u32,

        /// Form field key (e.g. sets, superset_reps)
        #[arg(long)]
        field: String,

        /// New value; an empty string clears the field
        #[arg(long, allow_hyphen_values = true)]
        value: String,

        /// Entry number (1-based) for giant set and circuit fields
        #[arg(long)]
        entry: Option<usize>,
    },

    /// Replace a week's rules with a fresh copy of its template
    Refresh {
        #[command(flatten)]
        week: WeekArgs,
    },

    /// Replace a week's workout with another template
    Replace {
        #[command(flatten)]
        week: WeekArgs,

        #[arg(long)]
        template: String,
    },

    /// List available workout templates
    Templates {
        /// Check every template against the catalog and exercise list
        #[arg(long)]
        validate: bool,
    },

    /// Export a week's rules as CSV
    Export {
        #[command(flatten)]
        week: WeekArgs,

        /// Output file (stdout when omitted)
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

/// Everything a command needs from the data directory
struct Workspace {
    store: FileRuleStore,
    exercises: ExerciseCatalog,
    config: Config,
}

impl Workspace {
    fn open(data_dir: &Path, config: Config) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let templates = TemplateLibrary::load(data_dir)?;
        let exercises = ExerciseCatalog::load(data_dir)?;
        Ok(Workspace {
            store: FileRuleStore::open(data_dir, templates),
            exercises,
            config,
        })
    }

    fn session(&self, week: &WeekArgs) -> Result<WeekSession<'_>> {
        WeekSession::open(&self.store, &self.exercises, &self.config.engine, week.key())
    }
}

fn main() -> Result<()> {
    // Initialize logging
    rulebook_core::logging::init();

    let cli = Cli::parse();

    let errors = validate_catalog();
    if !errors.is_empty() {
        eprintln!("Catalog validation errors:");
        for error in errors {
            eprintln!("  - {}", error);
        }
        return Err(Error::CatalogValidation("Invalid variant catalog".into()));
    }

    // Determine data directory
    let config = Config::load()?;
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone());
    let workspace = Workspace::open(&data_dir, config)?;

    match cli.command {
        Commands::Schedule {
            id,
            program,
            name,
            template,
        } => cmd_schedule(&workspace, id, program, name, template),
        Commands::Import { file } => cmd_import(&workspace, &file),
        Commands::Show { week, json } => cmd_show(&workspace, &week, json),
        Commands::Set {
            week,
            block,
            field,
            value,
            entry,
        } => cmd_set(&workspace, &week, block, &field, &value, entry),
        Commands::Refresh { week } => cmd_refresh(&workspace, &week),
        Commands::Replace { week, template } => cmd_replace(&workspace, &week, &template),
        Commands::Templates { validate } => cmd_templates(&workspace, validate),
        Commands::Export { week, out } => cmd_export(&workspace, &week, out.as_deref()),
    }
}

fn cmd_schedule(
    workspace: &Workspace,
    id: String,
    program: String,
    name: Option<String>,
    template: Option<String>,
) -> Result<()> {
    workspace.store.register_schedule(ProgramSchedule {
        id: id.clone(),
        program_id: program,
        name,
        template_id: template,
    })?;
    println!("✓ Registered schedule {}", id);
    Ok(())
}

fn cmd_import(workspace: &Workspace, file: &Path) -> Result<()> {
    tracing::info!("Importing rules from {}", file.display());
    let contents = std::fs::read_to_string(file)?;
    let rules: Vec<ProgressionRule> = serde_json::from_str(&contents)?;
    let count = workspace.store.import_rules(rules)?;
    println!("✓ Imported {} rules", count);
    Ok(())
}

fn cmd_show(workspace: &Workspace, week: &WeekArgs, json: bool) -> Result<()> {
    let session = workspace.session(week)?;

    if json {
        let blocks: Vec<serde_json::Value> = session
            .blocks()
            .iter()
            .map(|block| {
                serde_json::json!({
                    "block_order": block.block_order,
                    "block_type": block.block_type,
                    "block_name": block.block_name,
                    "rows": block.rules.len(),
                    "form": block.form_value,
                })
            })
            .collect();
        let output = serde_json::json!({
            "week": session.week(),
            "is_placeholder": session.is_placeholder(),
            "blocks": blocks,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let key = session.week();
    println!("Week {} ({} / {})", key.week_number, key.program_id, key.program_schedule_id);
    if session.is_placeholder() {
        println!(
            "  (borrowed from week {}; saving creates this week's rules)",
            workspace.config.engine.placeholder_source_week
        );
    }
    if session.blocks().is_empty() {
        println!("  No blocks.");
        return Ok(());
    }

    for block in session.blocks() {
        display_block(block);
    }
    Ok(())
}

fn display_block(block: &BlockFormState) {
    println!();
    match &block.block_name {
        Some(name) => println!("Block {}: {} ({})", block.block_order, name, block.block_type),
        None => println!("Block {}: {}", block.block_order, block.block_type),
    }

    let form = &block.form_value;
    for (key, value) in &form.fields {
        if key == "block_name" || value.is_empty() {
            continue;
        }
        println!("  {}: {}", key, with_exercise_name(form, key, value));
    }

    for (index, entry) in form.entries.iter().enumerate() {
        let values: Vec<String> = entry
            .iter()
            .filter(|(_, value)| !value.is_empty())
            .map(|(key, value)| format!("{}={}", key, with_exercise_name(form, key, value)))
            .collect();
        println!("  entry {}: {}", index + 1, values.join(", "));
    }
}

fn with_exercise_name(form: &FormValue, key: &str, value: &str) -> String {
    if !key.ends_with("exercise_id") {
        return value.to_string();
    }
    match form.exercises.get(value.trim()) {
        Some(exercise) => format!("{} ({})", value, exercise.name),
        None => value.to_string(),
    }
}

fn cmd_set(
    workspace: &Workspace,
    week: &WeekArgs,
    block_order: u32,
    field: &str,
    value: &str,
    entry: Option<usize>,
) -> Result<()> {
    let mut session = workspace.session(week)?;
    let block_type = session
        .block(block_order)
        .map(|block| block.block_type)
        .ok_or_else(|| Error::NotFound(format!("block {} in {}", block_order, week.key())))?;
    let spec = variant(block_type);
    tracing::debug!(
        "Setting {} on block {} ({}) entry {:?} to {:?}",
        field,
        block_order,
        block_type,
        entry,
        value
    );

    match entry {
        Some(number) => {
            if !spec.entry_keys().any(|key| key == field) {
                return Err(Error::Other(format!(
                    "'{}' is not a {} entry field",
                    field, block_type
                )));
            }
            if number == 0 || number > spec.max_rows {
                return Err(Error::Other(format!(
                    "{} blocks have entries 1 to {}",
                    block_type, spec.max_rows
                )));
            }
            session.edit(block_order, |form| {
                form.set_entry_field(number - 1, field, value)
            })?;
        }
        None => {
            if !spec.field_keys().any(|key| key == field) {
                return Err(Error::Other(format!(
                    "'{}' is not a {} field",
                    field, block_type
                )));
            }
            session.edit(block_order, |form| form.set_field(field, value))?;
        }
    }

    if !session.has_pending_changes() {
        println!("No changes to save.");
        return Ok(());
    }

    let report = session.save()?;
    println!(
        "✓ Saved: {} created, {} updated",
        report.created, report.updated
    );
    Ok(())
}

fn cmd_refresh(workspace: &Workspace, week: &WeekArgs) -> Result<()> {
    let mut session = workspace.session(week)?;
    tracing::info!("Refreshing {} from its template", week.key());
    let count = session.refresh_from_template()?;
    println!("✓ Refreshed week {} from its template ({} rules)", week.week, count);
    Ok(())
}

fn cmd_replace(workspace: &Workspace, week: &WeekArgs, template: &str) -> Result<()> {
    let mut session = workspace.session(week)?;
    tracing::info!("Replacing {} with template {}", week.key(), template);
    let count = session.replace_workout(template)?;
    println!(
        "✓ Replaced week {} with template {} ({} rules)",
        week.week, template, count
    );
    Ok(())
}

fn cmd_templates(workspace: &Workspace, validate: bool) -> Result<()> {
    let library = workspace.store.templates();

    if validate {
        let errors = library.validate(&workspace.exercises);
        if !errors.is_empty() {
            eprintln!("Template validation errors:");
            for error in errors {
                eprintln!("  - {}", error);
            }
            return Err(Error::CatalogValidation("Invalid template library".into()));
        }
        println!("✓ {} templates valid", library.len());
        return Ok(());
    }

    for template in library.iter() {
        println!(
            "{:<20} {} ({} blocks)",
            template.id,
            template.name,
            template.blocks.len()
        );
    }
    Ok(())
}

fn cmd_export(workspace: &Workspace, week: &WeekArgs, out: Option<&Path>) -> Result<()> {
    let rules = workspace
        .store
        .fetch_rules(&week.program, week.week, &week.schedule)?;

    match out {
        Some(path) => {
            let count = export_rules_csv(&rules, path)?;
            println!("✓ Exported {} rules to {}", count, path.display());
        }
        None => {
            write_rules_csv(&rules, std::io::stdout().lock())?;
        }
    }
    Ok(())
}
