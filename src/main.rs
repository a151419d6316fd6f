use std::{process, sync::Arc};

use bidhall::{
    application::{
        Storefront,
        context::ServiceOptions,
        error::{AppError, ErrorReport},
        pagination::PaginationError,
        search::SearchFilter,
    },
    config::{self, BrowseArgs, SearchArgs},
    domain::types::PageDirection,
    infra::{error::InfraError, fixtures, memory::InMemoryObjectStore, telemetry},
};
use serde::Serialize;
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    let report = ErrorReport::from_error("bidhall", error);
    if dispatcher::has_been_set() {
        error!(error = %report.chain(), "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %report.chain(), "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| InfraError::configuration(format!("failed to load configuration: {err}")))?;

    telemetry::init(&settings.logging)?;
    let options = ServiceOptions::from(&settings);

    match cli_args.command {
        config::Command::Browse(args) => run_browse(&options, args).await,
        config::Command::Search(args) => run_search(&options, args).await,
    }
}

async fn open_storefront(
    options: &ServiceOptions,
    fixture: &std::path::Path,
) -> Result<Storefront, AppError> {
    let documents = fixtures::load(fixture, &options.collections).await?;
    Ok(Storefront::new(
        Arc::new(documents),
        Arc::new(InMemoryObjectStore::default()),
        options,
    ))
}

async fn run_browse(options: &ServiceOptions, args: BrowseArgs) -> Result<(), AppError> {
    let storefront = open_storefront(options, &args.fixture).await?;
    storefront.items.load_storefront().await?;

    let mut pages = vec![storefront.items.current_page(args.dimension)?];
    for _ in 1..args.pages {
        match storefront
            .items
            .load_page(args.dimension, PageDirection::Next)
            .await
        {
            Ok(page) if page.items.is_empty() => break,
            Ok(page) => pages.push(page),
            Err(AppError::Pagination(PaginationError::NoCursor { .. })) => break,
            Err(err) => return Err(err),
        }
    }

    info!(
        target = "bidhall::browse",
        dimension = args.dimension.as_str(),
        pages = pages.len(),
        "listing walked"
    );

    print_json(&serde_json::json!({
        "dimension": args.dimension.as_str(),
        "published": storefront.items.published_count(),
        "pages": pages,
    }))
}

async fn run_search(options: &ServiceOptions, args: SearchArgs) -> Result<(), AppError> {
    let storefront = open_storefront(options, &args.fixture).await?;
    let filter = SearchFilter {
        name: args.name,
        category: args.category,
    };
    let results = storefront.search.search(&filter).await?;
    print_json(&results)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    let rendered = serde_json::to_string_pretty(value).map_err(InfraError::from)?;
    println!("{rendered}");
    Ok(())
}
