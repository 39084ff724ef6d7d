//! Point d'entrée CLI pour foret

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{debug, Level};
use tracing_subscriber::{fmt, EnvFilter};

use foret_pg::Config;
use foretgeo::PlotFilter;

mod cli;

use cli::{Commands, DbArgs};

// Charger .env au démarrage
fn load_env() {
    // Chercher .env dans le répertoire courant, puis à côté du binaire
    if dotenvy::dotenv().is_err() {
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                let _ = dotenvy::from_path(dir.join(".env"));
            }
        }
    }
}

/// Explorer et analyser la couverture forestière
#[derive(Parser)]
#[command(name = "foret")]
#[command(author, version)]
#[command(about = "Filtres en cascade, identification au point et analyse de polygones sur le catalogue forestier")]
#[command(long_about = "Outil d'exploration de la couverture forestière.\n\nPar défaut, le catalogue et les polygones sont lus dans PostGIS. Avec --catalogue, un fichier GeoJSON est chargé en mémoire et les polygones ne sont pas conservés.")]
struct Cli {
    /// Augmenter la verbosité (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Mode silencieux
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Catalogue GeoJSON chargé en mémoire (sans base de données)
    #[arg(long, global = true)]
    catalogue: Option<PathBuf>,

    /// Preset de configuration (default) ou chemin vers un fichier JSON
    #[arg(long, global = true, default_value = "default")]
    config: String,

    #[command(flatten)]
    db: DbArgs,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Charger .env avant tout
    load_env();

    let cli = Cli::parse();

    init_logging(cli.verbose, cli.quiet);

    let mut config = Config::resolve(&cli.config)?;
    config.apply_env_overrides();
    debug!(config = %cli.config, layers = config.layers.len(), "Configuration loaded");

    match &cli.command {
        // identify n'interroge que le serveur WMS
        Commands::Identify { lng, lat, bbox } => {
            cli::cmd_identify(&config, *lng, *lat, bbox).await?;
        }
        command => {
            let services = cli::connect(cli.catalogue.as_deref(), &cli.db).await?;
            run(&services, command).await?;
        }
    }

    Ok(())
}

async fn run(services: &cli::Services, command: &Commands) -> Result<()> {
    match command {
        Commands::Plots {
            region,
            departement,
            commune,
            lieu_dit,
            bbox,
            limit,
        } => {
            let filter = PlotFilter {
                region_code: region.clone(),
                department_code: departement.clone(),
                commune_code: commune.clone(),
                place_name: lieu_dit.clone(),
                bounds: bbox.as_deref().map(cli::parse_bbox).transpose()?,
                limit: *limit,
            };
            cli::cmd_plots(services, filter).await
        }
        Commands::Analyze {
            owner,
            name,
            geometry,
            output,
        } => cli::cmd_analyze(services, owner, name, geometry, output.as_deref()).await,
        Commands::Polygons { owner } => cli::cmd_polygons(services, owner).await,
        Commands::DeletePolygon { owner, id } => cli::cmd_delete(services, owner, id).await,
        hierarchy => cli::cmd_hierarchy(services, hierarchy).await,
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::WARN,
        (_, 0) => Level::INFO,
        (_, 1) => Level::DEBUG,
        (_, _) => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
