use clap::{Args, Parser, Subcommand, ValueEnum};
use logicleap::{
    actions::{download_code, DirectorySink},
    catalog::ScriptCollection,
    render::{Block, CursorPlacement, STREAMING_CURSOR},
    storage::FileStore,
    suggestions::{Filter, SuggestionCategory},
    AppConfig, AppError, AppResult, Catalog, Controller, ImageAttachment, Language,
    RenderedDocument, TaskType,
};
use logicleap_sdk::google::{GoogleModel, GoogleModelOptions};
use std::{
    io::{Read, Write},
    path::PathBuf,
    sync::Arc,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "logicleap", version, about = "AI scripting and automation assistant")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ask for a script, explanation, review or walkthrough.
    Ask(AskArgs),
    /// Search examples and ready-made scripts by label.
    Suggest {
        query: String,
        #[arg(long = "type", default_value = "all")]
        category: Filter<SuggestionCategory>,
        #[arg(long, default_value = "all")]
        language: Filter<Language>,
    },
    /// List example prompts for a task.
    Examples {
        #[arg(long, default_value = "generate")]
        task: TaskType,
        #[arg(default_value = "")]
        query: String,
    },
    /// Browse ready-made scripts.
    Scripts {
        #[arg(value_enum)]
        collection: CollectionArg,
        #[arg(default_value = "")]
        query: String,
    },
    /// Manage saved results.
    #[command(subcommand)]
    History(HistoryCommand),
}

#[derive(Args)]
struct AskArgs {
    #[arg(long, short, default_value = "generate")]
    task: TaskType,
    #[arg(long, short, default_value = "auto")]
    language: Language,
    /// Screenshot to send along with the request.
    #[arg(long, short)]
    image: Option<PathBuf>,
    /// Save the result to history when it completes.
    #[arg(long)]
    save: bool,
    /// Write every code block to this directory.
    #[arg(long)]
    download: Option<PathBuf>,
    /// Copy the first code block to the system clipboard.
    #[cfg(feature = "system-clipboard")]
    #[arg(long)]
    copy: bool,
    /// Request text. Read from stdin when omitted.
    text: Vec<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum CollectionArg {
    Quick,
    Cleanup,
    Security,
}

#[derive(Subcommand)]
enum HistoryCommand {
    List,
    Show { id: String },
    Delete { id: String },
    Clear,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(error) = run(Cli::parse()).await {
        eprintln!("{}", error.display_message());
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> AppResult<()> {
    let config = AppConfig::from_env()?;
    let catalog = match &config.catalog_path {
        Some(path) => Catalog::from_path(path)?,
        None => Catalog::builtin()?,
    };

    match cli.command {
        Command::Ask(args) => ask(&config, catalog, args).await,
        Command::Suggest {
            query,
            category,
            language,
        } => {
            let mut controller = controller(&config, catalog, None);
            controller.set_search_query(query);
            controller.set_filters(category, language);
            for item in controller.suggestions() {
                println!("[{}] {} ({})", item.category, item.label, item.language);
            }
            Ok(())
        }
        Command::Examples { task, query } => {
            for example in catalog.examples_for(task, &query) {
                println!("({}) {}\n", example.language, example.text);
            }
            Ok(())
        }
        Command::Scripts { collection, query } => {
            list_scripts(&catalog, collection, &query);
            Ok(())
        }
        Command::History(command) => history(&config, catalog, command),
    }
}

fn controller(config: &AppConfig, catalog: Catalog, api_key: Option<&str>) -> Controller {
    let model = GoogleModel::new(
        config.model.clone(),
        GoogleModelOptions {
            api_key: api_key.unwrap_or_default().to_string(),
            base_url: config.base_url.clone(),
            ..Default::default()
        },
    );
    Controller::new(
        Arc::new(model),
        catalog,
        Arc::new(FileStore::new(&config.data_dir)),
        config.stream_timeout,
    )
}

async fn ask(config: &AppConfig, catalog: Catalog, args: AskArgs) -> AppResult<()> {
    let api_key = config.require_api_key()?;
    let mut controller = controller(config, catalog, Some(api_key));

    let text = if args.text.is_empty() {
        let mut input = String::new();
        std::io::stdin().read_to_string(&mut input)?;
        input
    } else {
        args.text.join(" ")
    };

    controller.set_task(args.task);
    controller.set_language(args.language);
    controller.set_user_input(text);
    if let Some(path) = &args.image {
        controller.attach_image(ImageAttachment::from_path(path).await?);
    }

    let submission = controller.submit().await?;

    let mut printed = 0;
    controller
        .drive(submission, |controller| {
            let text = controller.state().result.text();
            if let Some(delta) = text.get(printed..) {
                print!("{delta}");
                let _ = std::io::stdout().flush();
            }
            printed = text.len();
        })
        .await;
    println!();

    if let Some(error) = controller.take_failure() {
        return Err(error);
    }

    let rendered = controller.rendered();
    for code in rendered.code_blocks() {
        eprintln!(
            "code block: {} ({} lines) -> {}",
            code.affordances.display_language,
            code.source.lines().count(),
            code.affordances.file_name
        );
    }

    if let Some(dir) = &args.download {
        let sink = DirectorySink::new(dir);
        for code in rendered.code_blocks() {
            let path = download_code(code, &sink)?;
            eprintln!("saved {}", path.display());
        }
    }

    #[cfg(feature = "system-clipboard")]
    if args.copy {
        if let Some(code) = rendered.code_blocks().next() {
            logicleap::actions::copy_code(code, &logicleap::actions::SystemClipboard)?;
            eprintln!("copied {} to the clipboard", code.affordances.display_language);
        }
    }

    if args.save {
        if let Some(version) = controller.save_version()? {
            eprintln!("saved as {}", version.id);
        }
    }

    Ok(())
}

fn list_scripts(catalog: &Catalog, collection: CollectionArg, query: &str) {
    let collection = match collection {
        CollectionArg::Quick => {
            for (language, scripts) in catalog.quick_scripts_by_language(query) {
                println!("{language}");
                for script in scripts {
                    println!("  {}: {}", script.label, script.script);
                }
            }
            return;
        }
        CollectionArg::Cleanup => ScriptCollection::Cleanup,
        CollectionArg::Security => ScriptCollection::Security,
    };
    for script in catalog.browse(collection, query) {
        println!("{} ({})\n  {}\n", script.label, script.language, script.description);
    }
}

fn history(config: &AppConfig, catalog: Catalog, command: HistoryCommand) -> AppResult<()> {
    let mut controller = controller(config, catalog, None);
    if let Some(error) = controller.version_load_error() {
        eprintln!("warning: {error}");
    }

    match command {
        HistoryCommand::List => {
            for version in controller.versions() {
                let prompt = version.prompt.lines().next().unwrap_or_default();
                println!(
                    "{}  {}  {} / {}  {prompt}",
                    version.id,
                    version.saved_at.format("%Y-%m-%d %H:%M"),
                    version.task_type.label(),
                    version.language,
                );
            }
        }
        HistoryCommand::Show { id } => {
            if !controller.load_version(&id) {
                return Err(AppError::Config(format!("No saved version {id}")));
            }
            print!("{}", format_document(&controller.rendered()));
        }
        HistoryCommand::Delete { id } => {
            if !controller.delete_version(&id)? {
                return Err(AppError::Config(format!("No saved version {id}")));
            }
        }
        HistoryCommand::Clear => controller.clear_history()?,
    }
    Ok(())
}

/// Plain-text view of a rendered document.
fn format_document(document: &RenderedDocument) -> String {
    let mut out = String::new();
    for (index, block) in document.blocks().iter().enumerate() {
        let cursor = matches!(document.cursor(), Some(CursorPlacement::InBlock(i)) if i == index);
        let cursor = if cursor {
            STREAMING_CURSOR.to_string()
        } else {
            String::new()
        };
        match block {
            Block::Paragraph { text, .. } | Block::InlineCode { text } => {
                out.push_str(&format!("{text}{cursor}\n\n"));
            }
            Block::Heading { level, text } => {
                let marks = "#".repeat(usize::from(*level));
                out.push_str(&format!("{marks} {text}{cursor}\n\n"));
            }
            Block::List(list) => {
                let last = list.items.len().saturating_sub(1);
                for (i, item) in list.items.iter().enumerate() {
                    let marker = if list.ordered() {
                        format!("{}.", list.start.unwrap_or(1) + i as u64)
                    } else {
                        "-".to_string()
                    };
                    let cursor = if i == last { cursor.as_str() } else { "" };
                    out.push_str(&format!("{marker} {item}{cursor}\n"));
                }
                out.push('\n');
            }
            Block::FencedCode(code) => {
                out.push_str(&format!(
                    "--- {} [{}] ---\n{}{cursor}\n---\n\n",
                    code.affordances.display_language, code.affordances.file_name, code.source
                ));
            }
        }
    }
    if document.cursor() == Some(CursorPlacement::Standalone) {
        out.push(STREAMING_CURSOR);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use logicleap::render;

    #[test]
    fn numbered_steps_keep_their_numbers_around_code() {
        let text = "1. Create the user\n\n   ```powershell\n   New-LocalUser bob\n   ```\n\n   Then verify it.\n\n2. Add to group\n";
        let out = format_document(&render(text, false));
        assert!(out.contains("1. Create the user\n"));
        assert!(out.contains("Then verify it.\n"));
        assert!(!out.contains("2. Then verify it."));
        assert!(out.contains("2. Add to group\n"));
    }

    #[test]
    fn bullet_lists_use_dashes() {
        let out = format_document(&render("- one\n- two\n", false));
        assert_eq!(out, "- one\n- two\n\n");
    }
}
