use clap::{Parser, Subcommand};
use std::path::PathBuf;

use comfyui_model_audit::models::ModelLocator;
use comfyui_model_audit::{nodes, orchestrate, report, validate, ComfyUIClient, Config, Family};

#[derive(Parser, Debug)]
#[command(name = "wfaudit", about = "Model audit tools for a local ComfyUI install", version)]
struct Cli {
    /// Override COMFYUI_PATH
    #[arg(global = true, long)]
    comfyui_path: Option<PathBuf>,

    /// Override COMFYUI_URL
    #[arg(global = true, long)]
    comfyui_url: Option<String>,

    /// Additional model root (repeatable)
    #[arg(global = true, long = "model-root", value_name = "PATH")]
    model_roots: Vec<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate one family's workflows against the model roots
    Validate {
        /// Family to validate: ltx, wan2, video-helper, kj-nodes, generic
        family: String,
        /// Write the Markdown report here instead of the reports directory
        #[arg(long, value_name = "PATH")]
        report: Option<PathBuf>,
        /// Also write a JSON summary
        #[arg(long, value_name = "PATH")]
        json: Option<PathBuf>,
    },
    /// Validate a single workflow file
    Check {
        /// Workflow JSON file
        file: PathBuf,
        /// Family profile to apply (defaults to generic)
        #[arg(long, default_value = "generic")]
        family: String,
    },
    /// Run every family validator concurrently and write all reports
    Orchestrate {
        /// Override MAX_WORKERS
        #[arg(long)]
        max_workers: Option<usize>,
    },
    /// Scan custom_nodes/ and summarize installed packs
    ScanNodes {
        /// Write the JSON export here
        #[arg(long, value_name = "PATH")]
        json: Option<PathBuf>,
        /// Cross-check against the running instance's installed-nodes list
        #[arg(long)]
        api: bool,
    },
    /// Model listing utilities against a running ComfyUI
    Models {
        #[command(subcommand)]
        cmd: ModelsCmd,
    },
}

#[derive(Subcommand, Debug)]
enum ModelsCmd {
    /// Show available model categories from /models
    Categories {
        /// Output raw JSON instead of pretty lines
        #[arg(long)]
        json: bool,
    },
    /// List models in a category, e.g. checkpoints, vae, clip
    List {
        /// Category name under /models/<category>
        category: String,
        /// Output raw JSON instead of pretty lines
        #[arg(long)]
        json: bool,
    },
}

fn parse_family(name: &str) -> Family {
    Family::from_name(name).unwrap_or_else(|| {
        eprintln!(
            "Unknown family '{}'. Expected one of: {}",
            name,
            Family::ALL.map(|f| f.name()).join(", ")
        );
        std::process::exit(2);
    })
}

fn print_value_lines(value: &serde_json::Value) {
    if let Some(arr) = value.as_array() {
        for item in arr {
            match item {
                serde_json::Value::String(s) => println!("{}", s),
                serde_json::Value::Object(o) => {
                    if let Some(name) = o.get("name").and_then(|x| x.as_str()) {
                        println!("{}", name);
                    } else if let Some(title) = o.get("title").and_then(|x| x.as_str()) {
                        println!("{}", title);
                    } else {
                        println!("{}", item);
                    }
                }
                _ => println!("{}", item),
            }
        }
    } else {
        println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    Config::dotenv_load();
    let cli = Cli::parse();

    let mut config = Config::new()?;
    if let Some(path) = cli.comfyui_path {
        config.comfyui_path = path.clone();
        config.model_roots.insert(0, path.join("models"));
    }
    if let Some(url) = cli.comfyui_url {
        config.comfyui_url = url;
    }
    config.model_roots.extend(cli.model_roots);

    match cli.command {
        Commands::Validate { family, report: report_path, json } => {
            let family = parse_family(&family);
            let family_report = validate::validate_family(family, &config)?;

            let md_path = report_path.unwrap_or_else(|| {
                config
                    .reports_dir
                    .join(format!("{}_validation_report.md", family.name().replace('-', "_")))
            });
            report::write_report(&md_path, &report::family_markdown(&family_report))?;
            if let Some(json_path) = json {
                report::write_report(&json_path, &report::family_json(&family_report)?)?;
            }

            println!("{} validation", family.display_name());
            println!("  Workflows analyzed: {}", family_report.total_workflows());
            println!("  Total models needed: {}", family_report.total_models());
            println!("  Models found: {}", family_report.found_models());
            println!("  Models missing: {}", family_report.missing_models());
            println!("  Report: {}", md_path.display());

            if family_report.missing_models() > 0 {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Check { file, family } => {
            let family = parse_family(&family);
            let locator = ModelLocator::new(config.model_roots.clone());
            let workflow_report = validate::validate_workflow(&file, family, &locator);

            if let Some(error) = &workflow_report.error {
                eprintln!("Error: {}", error);
                std::process::exit(1);
            }
            println!(
                "{}: {}/{} models found",
                workflow_report.workflow_name,
                workflow_report.found_models,
                workflow_report.total_models
            );
            for reference in &workflow_report.references {
                match &reference.resolved_path {
                    Some(path) => {
                        println!("  ok      {} -> {}", reference.reference.name, path.display())
                    }
                    None => println!(
                        "  MISSING {} ({})",
                        reference.reference.name, reference.reference.category
                    ),
                }
            }
            if workflow_report.missing_models > 0 {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Orchestrate { max_workers } => {
            if let Some(workers) = max_workers {
                config.max_workers = workers.max(1);
            }
            let run = orchestrate::run(&config).await?;

            println!("Validation orchestration completed");
            println!("  Total time: {:.1}s", run.total_elapsed_seconds);
            println!(
                "  Tasks: {}/{} successful",
                run.successful_tasks(),
                run.outcomes.len()
            );
            println!("  Workflows: {}", run.total_workflows());
            println!(
                "  Models: {}/{} found",
                run.found_models(),
                run.total_models()
            );
            println!("  Missing: {}", run.missing_models());
            println!("  Report: {}", run.comprehensive_report.display());

            if run.missing_models() > 0 || run.successful_tasks() < run.outcomes.len() {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::ScanNodes { json, api } => {
            let dir = config.custom_nodes_dir();
            let packs = nodes::scan(&dir)?;
            print!("{}", nodes::render_summary(&packs));

            if let Some(json_path) = json {
                report::write_report(&json_path, &nodes::export_json(&dir, &packs)?)?;
            }

            if api {
                let client = ComfyUIClient::new(config.comfyui_url.clone());
                match client.get_installed_custom_nodes().await {
                    Ok(value) => {
                        let reported = value.as_array().map(|a| a.len()).unwrap_or(0);
                        println!("\nManager API reports {} installed packs", reported);
                        if reported != packs.len() {
                            println!(
                                "  note: disk scan found {} packs; lists differ",
                                packs.len()
                            );
                        }
                    }
                    Err(e) => eprintln!("Manager API not reachable: {}", e),
                }
            }
            Ok(())
        }
        Commands::Models { cmd } => {
            let client = ComfyUIClient::new(config.comfyui_url.clone());
            match cmd {
                ModelsCmd::Categories { json } => {
                    let value = client.get_model_categories().await?;
                    if json {
                        println!("{}", serde_json::to_string(&value)?);
                    } else {
                        print_value_lines(&value);
                    }
                }
                ModelsCmd::List { category, json } => {
                    let value = client.get_models_in_category(&category).await?;
                    if json {
                        println!("{}", serde_json::to_string(&value)?);
                    } else {
                        print_value_lines(&value);
                    }
                }
            }
            Ok(())
        }
    }
}
