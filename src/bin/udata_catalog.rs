use std::fs;
use std::path::Path;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use serde::de::DeserializeOwned;
use tracing_subscriber::EnvFilter;

use udata_catalog::app::Connector;
use udata_catalog::config::{ConfigLoader, FileSecrets};
use udata_catalog::domain::{
    ImportConfig, ListAction, ListParams, LocalDataset, MetadataSource, Publication,
    PublicationSite,
};
use udata_catalog::error::CatalogError;
use udata_catalog::log::TracingLog;
use udata_catalog::output::{DeleteResult, JsonOutput};
use udata_catalog::prepare::prepare;

#[derive(Parser)]
#[command(name = "udata-catalog")]
#[command(about = "Browse, import and publish datasets on a Udata open-data catalog")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true, help = "Catalog configuration file (defaults to ./udata-catalog.json)")]
    config: Option<String>,

    #[arg(long, global = true, help = "Secrets file holding the API key")]
    secrets: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Store the API key as a secret and report capabilities")]
    Prepare(PrepareArgs),
    #[command(about = "List remote datasets, or the resources of one dataset")]
    List(ListArgs),
    #[command(about = "Download one remote resource")]
    Get(GetArgs),
    #[command(about = "Publish a local dataset to the catalog")]
    Publish(PublishArgs),
    #[command(about = "Delete a published dataset or resource")]
    Delete(DeleteArgs),
}

#[derive(Args)]
struct PrepareArgs {
    #[arg(long, help = "Check the API key and organization membership against the catalog")]
    validate: bool,
}

#[derive(Args)]
struct ListArgs {
    #[arg(long)]
    q: Option<String>,

    #[arg(long)]
    page: Option<u64>,

    #[arg(long)]
    size: Option<u64>,

    #[arg(long, help = "Search the whole catalog instead of the caller's organizations")]
    show_all: bool,

    #[arg(long)]
    organization: Option<String>,

    #[arg(long, help = "Dataset id whose resources should be listed")]
    folder: Option<String>,

    #[arg(long, value_enum)]
    action: Option<ListAction>,
}

#[derive(Args)]
struct GetArgs {
    #[arg(help = "Composite `datasetId:resourceId`")]
    resource_id: String,

    #[arg(long)]
    tmp_dir: Utf8PathBuf,

    #[arg(long, help = "Use the dataset title instead of the resource title")]
    dataset_title: bool,

    #[arg(long, help = "Use the resource description instead of the dataset description")]
    resource_description: bool,
}

#[derive(Args)]
struct PublishArgs {
    #[arg(long)]
    dataset: String,

    #[arg(long)]
    publication: String,

    #[arg(long)]
    site: String,
}

#[derive(Args)]
struct DeleteArgs {
    folder_id: String,

    #[arg(long)]
    resource: Option<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<CatalogError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &CatalogError) -> u8 {
    match error {
        CatalogError::InvalidResourceId(_)
        | CatalogError::InvalidInput(_)
        | CatalogError::MissingApiKey(_)
        | CatalogError::NotFound(_)
        | CatalogError::ConfigRead(_)
        | CatalogError::ConfigParse(_) => 2,
        CatalogError::Unauthorized { .. }
        | CatalogError::Forbidden { .. }
        | CatalogError::RemoteDatasetMissing { .. }
        | CatalogError::Http { .. }
        | CatalogError::Status { .. }
        | CatalogError::Delete { .. } => 3,
        CatalogError::Filesystem(_) => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ConfigLoader::resolve(cli.config.as_deref())?;
    let mut secrets = FileSecrets::open(cli.secrets.as_deref())?;
    let log = TracingLog;

    match cli.command {
        Commands::Prepare(args) => {
            let outcome = prepare(config, &mut secrets);
            secrets.save()?;
            ConfigLoader::save(&ConfigLoader::config_path(cli.config.as_deref()), &outcome.config)?;
            if args.validate {
                let connector = Connector::connect(outcome.config.clone(), &secrets)?;
                connector.check_access(&log)?;
            }
            JsonOutput::print_prepare(&outcome).into_diagnostic()
        }
        Commands::List(args) => {
            let connector = Connector::connect(config, &secrets)?;
            let params = ListParams {
                q: args.q,
                page: args.page,
                size: args.size,
                show_all: args.show_all,
                organization: args.organization,
                current_folder_id: args.folder,
                action: args.action,
            };
            let result = connector.list(&params, &log)?;
            JsonOutput::print_list(&result).into_diagnostic()
        }
        Commands::Get(args) => {
            let connector = Connector::connect(config, &secrets)?;
            let import = ImportConfig {
                title_source: if args.dataset_title {
                    MetadataSource::Dataset
                } else {
                    MetadataSource::Resource
                },
                description_source: if args.resource_description {
                    MetadataSource::Resource
                } else {
                    MetadataSource::Dataset
                },
            };
            let resource = connector.get_resource(&args.resource_id, &import, &args.tmp_dir, &log)?;
            JsonOutput::print_resource(&resource).into_diagnostic()
        }
        Commands::Publish(args) => {
            let connector = Connector::connect(config, &secrets)?;
            let dataset: LocalDataset = read_json(Path::new(&args.dataset))?;
            let publication: Publication = read_json(Path::new(&args.publication))?;
            let site: PublicationSite = read_json(Path::new(&args.site))?;
            let publication = connector.publish_dataset(&dataset, publication, &site, &log)?;
            JsonOutput::print_publication(&publication).into_diagnostic()
        }
        Commands::Delete(args) => {
            let connector = Connector::connect(config, &secrets)?;
            connector.delete_publication(&args.folder_id, args.resource.as_deref(), &log)?;
            JsonOutput::print_delete(&DeleteResult {
                folder_id: args.folder_id,
                resource_id: args.resource,
                deleted: true,
            })
            .into_diagnostic()
        }
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, CatalogError> {
    let content =
        fs::read_to_string(path).map_err(|_| CatalogError::ConfigRead(path.to_path_buf()))?;
    serde_json::from_str(&content)
        .map_err(|err| CatalogError::ConfigParse(format!("{}: {err}", path.display())))
}
