use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use listing_core::{Error as ListingError, ListRequest, PageRequest, RawFilters, RawValue};
use listing_engine::{ListingEngine, MemoryExecutor};
use mimalloc::MiMalloc;
use runtime::AppConfig;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

mod catalog;

use catalog::{load_products, product_schema, Product, ProductListItem};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// List a product catalog with filters, sorting, pagination and facets
#[derive(Parser)]
#[command(name = "catalog-cli")]
#[command(about = "List a product catalog with filters, sorting, pagination and facets")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Catalog JSON file (array of products); defaults to the bundled sample
    #[arg(short, long, global = true)]
    data: Option<PathBuf>,

    /// Print current configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List one page of products
    List(ListArgs),
    /// Count matching products grouped by a field
    Facets(FacetArgs),
    /// Suggest product names starting with a prefix
    Suggest(SuggestArgs),
    /// Validate configuration and catalog, then exit
    Check,
}

#[derive(Args, Debug, Default)]
struct FilterArgs {
    /// Filter as NAME=VALUE; repeat for several filters
    #[arg(short, long = "filter", value_name = "NAME=VALUE")]
    filters: Vec<String>,
}

#[derive(Args, Debug)]
struct ListArgs {
    #[command(flatten)]
    filter: FilterArgs,

    /// Sort key as FIELD or FIELD:asc|desc; repeat for secondary keys
    #[arg(short, long = "sort", value_name = "FIELD[:DIR]")]
    sort: Vec<String>,

    /// 1-based page number (offset pagination)
    #[arg(long, conflicts_with_all = ["cursor", "limit"])]
    page: Option<u64>,

    /// Items per page (offset pagination)
    #[arg(long, conflicts_with_all = ["cursor", "limit"])]
    page_size: Option<u64>,

    /// Continue after this cursor (cursor pagination)
    #[arg(long)]
    cursor: Option<String>,

    /// Items per page (cursor pagination)
    #[arg(long)]
    limit: Option<u64>,

    /// Print complete records instead of the list view
    #[arg(long)]
    full: bool,
}

#[derive(Args, Debug)]
struct FacetArgs {
    /// Field to group by
    field: String,

    #[command(flatten)]
    filter: FilterArgs,
}

#[derive(Args, Debug)]
struct SuggestArgs {
    /// Prefix to complete
    prefix: String,

    /// Maximum number of suggestions (capped at 20)
    #[arg(short = 'n', long, default_value_t = 10)]
    limit: u64,

    /// Field to complete
    #[arg(long, default_value = "name")]
    field: String,
}

/// Result of one command: JSON for stdout plus the exit code.
struct Outcome {
    json: String,
    code: ExitCode,
}

impl Outcome {
    fn ok<T: Serialize>(value: &T) -> Result<Self> {
        Ok(Self {
            json: serde_json::to_string_pretty(value)?,
            code: ExitCode::SUCCESS,
        })
    }

    /// Listing errors are reported as problem documents.
    fn problem(err: &ListingError, instance: &str) -> Result<Self> {
        let problem = err.to_problem(instance);
        tracing::debug!(status = problem.status, code = %problem.code, "request failed");
        Ok(Self {
            json: serde_json::to_string_pretty(&problem)?,
            code: if err.is_client_error() {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            },
        })
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Load configuration (normalized home_dir is applied inside)
    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    config.apply_verbosity(cli.verbose);

    let logging_config = config.logging.clone().unwrap_or_default();
    runtime::init_logging_from_config(&logging_config, Path::new(&config.home_dir));

    if cli.print_config {
        println!("{}", config.to_yaml()?);
        return Ok(ExitCode::SUCCESS);
    }

    let products = load_products(cli.data.as_deref())?;
    tracing::info!(products = products.len(), "catalog ready");
    let executor = Arc::new(MemoryExecutor::new(products));
    let engine: ListingEngine<Product> =
        ListingEngine::new(product_schema(), config.engine.clone(), executor);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling");
            on_signal.cancel();
        }
    });

    let outcome = match cli.command.unwrap_or(Commands::Check) {
        Commands::List(args) => run_list(&engine, args, &cancel).await?,
        Commands::Facets(args) => run_facets(&engine, args, &cancel).await?,
        Commands::Suggest(args) => run_suggest(&engine, args, &cancel).await?,
        Commands::Check => check(&engine, &config)?,
    };
    println!("{}", outcome.json);
    Ok(outcome.code)
}

async fn run_list(
    engine: &ListingEngine<Product>,
    args: ListArgs,
    cancel: &CancellationToken,
) -> Result<Outcome> {
    let req = build_list_request(&args, engine)?;
    tracing::debug!(?req, "list request");

    if args.full {
        match engine.list(&req, cancel).await {
            Ok(page) => Outcome::ok(&page),
            Err(e) => Outcome::problem(&e, "/products"),
        }
    } else {
        match engine.list_projected(&req, cancel, ProductListItem::from).await {
            Ok(page) => Outcome::ok(&page),
            Err(e) => Outcome::problem(&e, "/products"),
        }
    }
}

async fn run_facets(
    engine: &ListingEngine<Product>,
    args: FacetArgs,
    cancel: &CancellationToken,
) -> Result<Outcome> {
    let filters = parse_filters(&args.filter.filters)?;
    match engine.facets(&filters, &args.field, cancel).await {
        Ok(counts) => Outcome::ok(&counts),
        Err(e) => Outcome::problem(&e, &format!("/products/facets/{}", args.field)),
    }
}

async fn run_suggest(
    engine: &ListingEngine<Product>,
    args: SuggestArgs,
    cancel: &CancellationToken,
) -> Result<Outcome> {
    match engine.suggest(&args.field, &args.prefix, args.limit, cancel).await {
        Ok(found) => Outcome::ok(&found),
        Err(e) => Outcome::problem(&e, "/products/autocomplete"),
    }
}

fn check(engine: &ListingEngine<Product>, config: &AppConfig) -> Result<Outcome> {
    tracing::info!("Checking configuration...");
    let summary = serde_json::json!({
        "status": "ok",
        "resource": engine.schema().name(),
        "home_dir": config.home_dir,
        "page_size_cap": config.engine.page_size_cap(),
        "signed_cursors": !config.engine.cursor_secret.is_empty(),
    });
    Outcome::ok(&summary)
}

fn build_list_request(args: &ListArgs, engine: &ListingEngine<Product>) -> Result<ListRequest> {
    let defaults = engine.config();
    let page = if args.cursor.is_some() || args.limit.is_some() {
        PageRequest::Cursor {
            token: args.cursor.clone(),
            limit: args.limit.unwrap_or(defaults.default_cursor_limit),
        }
    } else {
        PageRequest::offset(
            args.page.unwrap_or(1),
            args.page_size.unwrap_or(defaults.default_page_size),
        )
    };

    let mut req = ListRequest::new(page);
    req.filters = parse_filters(&args.filter.filters)?;
    for raw in &args.sort {
        let (field, dir) = raw.split_once(':').unwrap_or((raw.as_str(), "asc"));
        req = req.with_sort(field, dir);
    }
    Ok(req)
}

/// `NAME=VALUE` pairs; a name given more than once collects every value.
fn parse_filters(raw: &[String]) -> Result<RawFilters> {
    let mut filters = RawFilters::new();
    for pair in raw {
        let Some((name, value)) = pair.split_once('=') else {
            bail!("filter '{pair}' is not NAME=VALUE");
        };
        if name.trim().is_empty() {
            bail!("filter '{pair}' has an empty name");
        }
        let value = value.to_string();
        filters
            .entry(name.trim().to_string())
            .and_modify(|existing| {
                let mut all = match existing {
                    RawValue::One(v) => vec![v.clone()],
                    RawValue::Many(v) => v.clone(),
                };
                all.push(value.clone());
                *existing = RawValue::Many(all);
            })
            .or_insert_with(|| RawValue::One(value.clone()));
    }
    Ok(filters)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list_args(argv: &[&str]) -> ListArgs {
        let mut full = vec!["catalog-cli", "list"];
        full.extend_from_slice(argv);
        match Cli::try_parse_from(full).unwrap().command {
            Some(Commands::List(args)) => args,
            _ => panic!("expected list"),
        }
    }

    fn engine() -> ListingEngine<Product> {
        let products = load_products(None).unwrap();
        ListingEngine::new(
            product_schema(),
            Default::default(),
            Arc::new(MemoryExecutor::new(products)),
        )
    }

    #[test]
    fn repeated_filter_collects_values() {
        let filters = parse_filters(&[
            "category=kitchen".into(),
            "tags=sale".into(),
            "tags=travel".into(),
        ])
        .unwrap();
        assert_eq!(filters["category"], RawValue::One("kitchen".into()));
        assert_eq!(
            filters["tags"],
            RawValue::Many(vec!["sale".into(), "travel".into()])
        );
    }

    #[test]
    fn malformed_filter_is_rejected() {
        assert!(parse_filters(&["category".into()]).is_err());
        assert!(parse_filters(&["=x".into()]).is_err());
        // an empty value is the engine's call, not the parser's
        assert!(parse_filters(&["q=".into()]).is_ok());
    }

    #[test]
    fn offset_is_the_default_mode() {
        let req = build_list_request(&list_args(&["--sort", "price:desc"]), &engine()).unwrap();
        assert_eq!(req.page, PageRequest::offset(1, 20));
        assert_eq!(req.sort[0].field, "price");
        assert_eq!(req.sort[0].direction, "desc");
    }

    #[test]
    fn cursor_flags_select_cursor_mode() {
        let req = build_list_request(&list_args(&["--limit", "5"]), &engine()).unwrap();
        assert_eq!(req.page, PageRequest::first(5));

        let req = build_list_request(&list_args(&["--cursor", "abc"]), &engine()).unwrap();
        assert_eq!(req.page, PageRequest::after("abc", 20));
    }

    #[test]
    fn page_and_cursor_flags_conflict() {
        let res = Cli::try_parse_from(["catalog-cli", "list", "--page", "2", "--cursor", "abc"]);
        assert!(res.is_err());
    }

    #[test]
    fn suggest_defaults_to_ten_names() {
        let cli = Cli::try_parse_from(["catalog-cli", "suggest", "ca"]).unwrap();
        match cli.command {
            Some(Commands::Suggest(args)) => {
                assert_eq!(args.prefix, "ca");
                assert_eq!(args.limit, 10);
                assert_eq!(args.field, "name");
            }
            _ => panic!("expected suggest"),
        }
    }

    #[test]
    fn sort_without_direction_is_ascending() {
        let req = build_list_request(&list_args(&["--sort", "name"]), &engine()).unwrap();
        assert_eq!(req.sort[0].direction, "asc");
    }
}
