use anyhow::{Context, Result};

use syllabus_service::ContentService;
use syllabus_service::catalog::{Manifest, ModuleDecl};
use syllabus_service::content::{CatalogItem, filter};
use syllabus_service::{logging, metrics};

use settings::{Collection, Command, OutputFormat, Settings};

mod output;
mod settings;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::get()?;
    logging::init_logging(&settings.config.logging);

    if let Err(error) = run(settings).await {
        logging::ensure_log_error(&error);
        return Err(error);
    }
    Ok(())
}

async fn run(settings: Settings) -> Result<()> {
    let config = &settings.config;
    metrics::configure_statsd(&config.metrics)?;

    let service = ContentService::from_config(config).context("failed to set up content service")?;
    let result = execute(&service, &settings).await;
    service.shutdown().await;
    result
}

async fn execute(service: &ContentService, settings: &Settings) -> Result<()> {
    let format = settings.output_format;
    match &settings.command {
        Command::Warm => {
            service.initialize().await;
            let manifest = Manifest::from_path(&settings.config.manifest)?;
            let keys: Vec<_> = manifest.modules.iter().map(ModuleDecl::key).collect();
            let report = service.preload(&keys).await;
            output::print_warm(&report, service.stats(), format)
        }
        Command::Show {
            collection,
            category,
            id,
        } => show(service, *collection, category.as_deref(), id.as_deref(), format).await,
        Command::Search { query } => {
            let lessons = service.search_lessons(query).await;
            output::print_items(&lessons, format)
        }
    }
}

async fn show(
    service: &ContentService,
    collection: Collection,
    category: Option<&str>,
    id: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    match collection {
        Collection::Lessons => {
            let lessons = match category {
                Some(category) => service.lessons_in_category(category).await?.to_vec(),
                None => service.all_lessons().await,
            };
            print_selected(&lessons, id, format)
        }
        Collection::Notes => print_selected(&service.notes().await?, id, format),
        Collection::Quizzes => print_selected(&service.quizzes().await?, id, format),
        Collection::InterviewQuestions => {
            print_selected(&service.interview_questions().await?, id, format)
        }
        Collection::DesignPatterns => {
            print_selected(&service.design_patterns().await?, id, format)
        }
        Collection::CodingQuestions => {
            print_selected(&service.coding_questions().await?, id, format)
        }
        Collection::Roadmap => print_selected(&service.roadmap().await?, id, format),
    }
}

fn print_selected<T>(items: &[T], id: Option<&str>, format: OutputFormat) -> Result<()>
where
    T: CatalogItem + serde::Serialize,
{
    match id {
        Some(id) => {
            let item = filter::find_by_id(items, id).with_context(|| format!("no item `{id}`"))?;
            output::print_items(std::slice::from_ref(item), format)
        }
        None => output::print_items(items, format),
    }
}
