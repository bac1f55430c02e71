// Command-line front end.
//
// Plays the collaborators around the engine: reads the course config and the
// uploaded spreadsheets, runs one computation pass and writes the report
// tables as CSV/JSON with markdown previews on stdout.
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use co_attainment::config::CourseConfig;
use co_attainment::engine::{compute, ComponentInput, ComputationInput};
use co_attainment::{loader, output, reports, util, AggregationPolicy};

#[derive(Parser)]
#[command(name = "co-attainment")]
#[command(about = "Course outcome attainment from uploaded marks sheets", long_about = None)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute attainment and write the report tables
    Report {
        #[arg(long)]
        config: PathBuf,
        /// Override the configured threshold percentage
        #[arg(long)]
        threshold: Option<f64>,
        /// Override the configured aggregation policy (weighted | unweighted)
        #[arg(long)]
        aggregation: Option<AggregationPolicy>,
        #[arg(long, default_value = "report")]
        out_dir: PathBuf,
        /// Report even when the course config breaks the form rules
        #[arg(long)]
        no_validate: bool,
        #[arg(long, default_value_t = 5)]
        preview_rows: usize,
    },
    /// Check a course config against the form rules
    Validate {
        #[arg(long)]
        config: PathBuf,
    },
    /// Show the columns detected in spreadsheets
    Inspect {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Commands::Report {
            config,
            threshold,
            aggregation,
            out_dir,
            no_validate,
            preview_rows,
        } => {
            let mut course = CourseConfig::load(&config)?;
            if let Some(t) = threshold {
                course.threshold = t;
            }
            if let Some(policy) = aggregation {
                course.aggregation = policy;
            }

            let issues = course.validate();
            for issue in &issues {
                tracing::warn!("{issue}");
            }
            if !issues.is_empty() && !no_validate {
                bail!(
                    "course config has {} issue(s); fix them or pass --no-validate",
                    issues.len()
                );
            }

            let mut components = Vec::with_capacity(course.components.len());
            for component in &course.components {
                let mut sheets = Vec::new();
                for file in course.files_for(component) {
                    sheets.extend(
                        loader::load_sheets(&file)
                            .with_context(|| format!("component `{}`", component.name))?,
                    );
                }
                components.push(ComponentInput {
                    name: component.name.clone(),
                    sheets,
                });
            }

            let input = ComputationInput {
                course: course.course.clone(),
                components,
                co_statements: course.co_statements.clone(),
                context: course.context(),
            };
            let snapshot = compute(&input);
            let tables = reports::build_report_tables(&snapshot);

            let written = output::write_report(&out_dir, &tables)?;
            let generated_at = chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%:z").to_string();
            let summary = reports::generate_summary(&snapshot, &generated_at);
            let summary_path = out_dir.join("summary.json");
            output::write_json(&summary_path, &summary)?;

            println!(
                "{} / {} ({}), threshold {}%, {} aggregation\n",
                if snapshot.course.course_name.is_empty() {
                    "Course"
                } else {
                    snapshot.course.course_name.as_str()
                },
                snapshot.course.class_name,
                snapshot.course.academic_year,
                util::format_number(snapshot.context.threshold.percent(), 2),
                snapshot.context.policy,
            );
            for table in tables.sheet_attainment.iter() {
                output::preview_report_table(table, preview_rows);
            }
            output::preview_report_table(&tables.co_analysis, preview_rows);
            println!("CO Attainment vs Target\n");
            output::preview_table_rows(&tables.co_summary, preview_rows);
            output::preview_report_table(&tables.copo_attainment, preview_rows + 1);
            println!(
                "{} files written to {} (summary in {})",
                util::format_int(written.len() + 1),
                out_dir.display(),
                summary_path.display()
            );
        }
        Commands::Validate { config } => {
            let course = CourseConfig::load(&config)?;
            let issues = course.validate();
            if issues.is_empty() {
                println!("{} is valid.", config.display());
                return Ok(());
            }
            for issue in &issues {
                println!("- {issue}");
            }
            bail!("{} issue(s) found", issues.len());
        }
        Commands::Inspect { files } => {
            for file in files {
                for sheet in loader::load_sheets(&file)? {
                    let data = sheet.normalize();
                    let cos: Vec<String> = data
                        .co_data
                        .iter()
                        .map(|(co, s)| match s.out_of() {
                            Some(max) => format!("{co} (out of {})", util::format_number(max, 2)),
                            None => format!("{co} (no max marks)"),
                        })
                        .collect();
                    println!("{} :: {}", file.display(), data.sheet_name);
                    println!("  students: {}", util::format_int(data.student_count()));
                    println!(
                        "  names: {}  rolls: {}  total marks: {}",
                        yes_no(!data.student_names.is_empty()),
                        yes_no(!data.roll_numbers.is_empty()),
                        yes_no(!data.total_marks.is_empty()),
                    );
                    println!(
                        "  COs: {}",
                        if cos.is_empty() { "none".to_string() } else { cos.join(", ") }
                    );
                }
            }
        }
    }

    Ok(())
}

fn yes_no(found: bool) -> &'static str {
    if found {
        "found"
    } else {
        "missing"
    }
}

