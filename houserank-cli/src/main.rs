mod config;
mod output;
mod prompt;
mod session;
mod store;

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::HouserankConfig;
use crate::session::{run_session, PromptJudge};
use crate::store::{HouseUpdate, NewHouse, RankingScope, Store, DEFAULT_COLLECTION_NAME, DEFAULT_RANKING_NAME};

#[derive(Parser)]
#[command(name = "houserank", version, about = "Rank candidate houses by pairwise preference")]
struct Cli {
    /// Path to config file (default: ~/.config/houserank/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Path to the store file (default: ~/.local/share/houserank/houses.json)
    #[arg(long, global = true)]
    data_file: Option<PathBuf>,

    /// Show debug logging on stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Create a default config file at ~/.config/houserank/config.toml
    Init,
    /// Add a house to a collection
    Add(AddArgs),
    /// Change the title, description or links of a house
    Edit(EditArgs),
    /// Show a ranking and the houses not yet ranked in it
    List(ListArgs),
    /// Rank unranked houses by answering pairwise comparisons
    Rank(RankArgs),
    /// Take a house out of a ranking
    Unrank(HouseArgs),
    /// Delete a house and drop it from every ranking
    Remove(RemoveArgs),
    /// List the rankings of a collection, or create a new one
    Rankings(RankingsArgs),
    /// List every collection with its number of houses
    Collections,
}

#[derive(clap::Args)]
struct ScopeArgs {
    /// Collection name (default from config, else "Default Collection")
    #[arg(long)]
    collection: Option<String>,

    /// Ranking name (default from config, else "Main Ranking")
    #[arg(long)]
    ranking: Option<String>,
}

#[derive(clap::Args)]
struct AddArgs {
    /// Short name for the house
    title: String,

    #[arg(long)]
    description: Option<String>,

    #[arg(long)]
    image_url: Option<String>,

    #[arg(long)]
    listing_url: Option<String>,

    /// Collection name (default from config, else "Default Collection")
    #[arg(long)]
    collection: Option<String>,
}

#[derive(clap::Args)]
struct EditArgs {
    /// House id or unique prefix
    house: String,

    #[arg(long)]
    title: Option<String>,

    /// New description (empty string clears it)
    #[arg(long)]
    description: Option<String>,

    /// New image URL (empty string clears it)
    #[arg(long)]
    image_url: Option<String>,

    /// New listing URL (empty string clears it)
    #[arg(long)]
    listing_url: Option<String>,
}

#[derive(clap::Args)]
struct ListArgs {
    #[command(flatten)]
    scope: ScopeArgs,

    /// Output JSON instead of table
    #[arg(long)]
    json: bool,
}

#[derive(clap::Args)]
struct RankArgs {
    #[command(flatten)]
    scope: ScopeArgs,

    /// House id (or unique prefix) to rank; default is the oldest unranked house
    #[arg(long)]
    house: Option<String>,

    /// Keep going until every house in the collection is ranked
    #[arg(long, conflicts_with = "house")]
    all: bool,
}

#[derive(clap::Args)]
struct HouseArgs {
    /// House id or unique prefix
    house: String,

    #[command(flatten)]
    scope: ScopeArgs,
}

#[derive(clap::Args)]
struct RemoveArgs {
    /// House id or unique prefix
    house: String,
}

#[derive(clap::Args)]
struct RankingsArgs {
    /// Collection name (default from config, else "Default Collection")
    #[arg(long)]
    collection: Option<String>,

    /// Create a ranking with this name
    #[arg(long)]
    create: Option<String>,
}

/// Settings resolved from CLI args and config file (CLI wins).
struct Settings {
    data_file: PathBuf,
    config: HouserankConfig,
}

impl Settings {
    fn resolve(config_path: &Path, data_file: Option<PathBuf>) -> Result<Self> {
        let config = config::load_config(config_path)?;
        let data_file = match data_file.or_else(|| config.data_file.clone()) {
            Some(path) => path,
            None => config::default_data_file()?,
        };
        Ok(Settings { data_file, config })
    }

    fn collection(&self, arg: Option<&String>) -> String {
        arg.cloned()
            .or_else(|| self.config.collection.clone())
            .unwrap_or_else(|| DEFAULT_COLLECTION_NAME.to_string())
    }

    fn scope(&self, args: &ScopeArgs) -> RankingScope {
        let ranking = args
            .ranking
            .clone()
            .or_else(|| self.config.ranking.clone())
            .unwrap_or_else(|| DEFAULT_RANKING_NAME.to_string());
        RankingScope::new(self.collection(args.collection.as_ref()), ranking)
    }

    /// Read-only snapshot of the store.
    fn open_store(&self) -> Result<Store> {
        Ok(Store::open(&self.data_file)?)
    }

    /// Store opened for writing; other writers wait until it is dropped.
    fn lock_store(&self) -> Result<Store> {
        Store::open_exclusive(&self.data_file)
            .with_context(|| format!("Failed to lock {}", self.data_file.display()))
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "houserank=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .with(filter)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config_path = match cli.config {
        Some(path) => path,
        None => config::config_path()?,
    };

    let settings = || Settings::resolve(&config_path, cli.data_file.clone());

    match cli.command {
        Commands::Init => {
            config::create_default_config(&config_path)?;
            println!("Created config at {}", config_path.display());
            println!("Edit it to set your default data file, collection and ranking.");
            Ok(())
        }
        Commands::Add(args) => run_add(&settings()?, args),
        Commands::Edit(args) => run_edit(&settings()?, args),
        Commands::List(args) => run_list(&settings()?, args),
        Commands::Rank(args) => run_rank(&settings()?, args),
        Commands::Unrank(args) => run_unrank(&settings()?, args),
        Commands::Remove(args) => run_remove(&settings()?, args),
        Commands::Rankings(args) => run_rankings(&settings()?, args),
        Commands::Collections => run_collections(&settings()?),
    }
}

fn run_add(settings: &Settings, args: AddArgs) -> Result<()> {
    if args.title.trim().is_empty() {
        bail!("House title must not be empty");
    }

    let mut store = settings.lock_store()?;
    let house = store.add_house(NewHouse {
        title: args.title.trim().to_string(),
        description: args.description,
        image_url: args.image_url,
        listing_url: args.listing_url,
        collection_name: Some(settings.collection(args.collection.as_ref())),
    });
    store.save()?;

    info!(house_id = %house.id, collection = %house.collection_name, "house added");
    println!("Added \"{}\" to \"{}\" ({})", house.title, house.collection_name, house.id);
    Ok(())
}

fn run_edit(settings: &Settings, args: EditArgs) -> Result<()> {
    let title = match args.title {
        Some(title) if title.trim().is_empty() => bail!("House title must not be empty"),
        Some(title) => Some(title.trim().to_string()),
        None => None,
    };
    let update = HouseUpdate {
        title,
        description: args.description,
        image_url: args.image_url,
        listing_url: args.listing_url,
    };

    let mut store = settings.lock_store()?;
    let house = store.update_house(&args.house, update)?;
    store.save()?;

    info!(house_id = %house.id, "house edited");
    println!("Updated \"{}\" ({})", house.title, house.id);
    Ok(())
}

fn run_list(settings: &Settings, args: ListArgs) -> Result<()> {
    let store = settings.open_store()?;
    let scope = settings.scope(&args.scope);
    let ranked = store.ranked(&scope)?;
    let unranked = store.unranked(&scope);

    if args.json {
        println!("{}", output::render_json(&scope, &ranked, &unranked)?);
    } else {
        print!("{}", output::render_table(&scope, &ranked, &unranked));
    }
    Ok(())
}

fn run_rank(settings: &Settings, args: RankArgs) -> Result<()> {
    let scope = settings.scope(&args.scope);

    loop {
        // Fresh view of the ranking for every house; the version read here
        // is what the commit is checked against.
        let store = settings.open_store()?;
        let version = store.version(&scope);
        let ranked = store.ranked(&scope)?;

        let house = match &args.house {
            Some(id) => store.rankable_house(&scope, id)?.clone(),
            None => match store.unranked(&scope).into_iter().next() {
                Some(house) => house,
                None => {
                    println!("Every house in \"{}\" is ranked.", scope.collection_name);
                    return Ok(());
                }
            },
        };
        drop(store);

        if ranked.is_empty() {
            println!("\"{}\" is the first house in {scope}.", house.title);
        } else {
            println!("Ranking \"{}\" against {} ranked houses.", house.title, ranked.len());
        }

        let stdin = io::stdin();
        let mut judge = PromptJudge::new(stdin.lock(), io::stdout());
        let outcome = run_session(&ranked, &house, &mut judge)?;

        let Some(final_rank) = outcome.final_rank else {
            println!("Stopped; \"{}\" left unranked.", house.title);
            return Ok(());
        };
        if outcome.finalized_early {
            warn!(house_id = %house.id, rank = final_rank, "placed before comparisons finished");
        }

        // The lock is held from reload to save, so the version check below
        // sees every commit that landed while the questions were being asked.
        let mut store = settings.lock_store()?;
        store
            .commit_insertion(&scope, &house.id, version, final_rank)
            .with_context(|| format!("Failed to save rank for \"{}\"", house.title))?;
        store.save()?;
        drop(store);

        info!(house_id = %house.id, %scope, rank = final_rank, comparisons = outcome.comparisons.len(), "house ranked");
        println!("Ranked \"{}\" at #{} after {} comparisons.", house.title, final_rank + 1, outcome.comparisons.len());

        if !args.all {
            return Ok(());
        }
    }
}

fn run_unrank(settings: &Settings, args: HouseArgs) -> Result<()> {
    let mut store = settings.lock_store()?;
    let scope = settings.scope(&args.scope);
    let title = store.house(&args.house)?.title.clone();

    let removed_rank = store.remove_from_ranking(&scope, &args.house)?;
    store.save()?;

    info!(house = %args.house, %scope, rank = removed_rank, "house unranked");
    println!("Removed \"{title}\" (was #{}) from {scope}.", removed_rank + 1);
    Ok(())
}

fn run_remove(settings: &Settings, args: RemoveArgs) -> Result<()> {
    let mut store = settings.lock_store()?;
    let house = store.delete_house(&args.house)?;
    store.save()?;

    info!(house_id = %house.id, "house deleted");
    println!("Deleted \"{}\" from {}.", house.title, store.path().display());
    Ok(())
}

fn run_rankings(settings: &Settings, args: RankingsArgs) -> Result<()> {
    let collection = settings.collection(args.collection.as_ref());

    if let Some(name) = args.create {
        let name = name.trim().to_string();
        if name.is_empty() {
            bail!("Ranking name must not be empty");
        }
        let mut store = settings.lock_store()?;
        let scope = RankingScope::new(collection.clone(), name);
        if store.create_ranking(&scope) {
            store.save()?;
            println!("Created ranking {scope}.");
        } else {
            println!("Ranking {scope} already exists.");
        }
        return Ok(());
    }

    let store = settings.open_store()?;
    for name in store.ranking_names(&collection) {
        let scope = RankingScope::new(collection.clone(), name);
        println!("{} ({} ranked)", scope.ranking_name, store.ranked(&scope)?.len());
    }
    Ok(())
}

fn run_collections(settings: &Settings) -> Result<()> {
    let store = settings.open_store()?;
    let collections = store.collections();
    if collections.is_empty() {
        println!("No houses yet. Add one with `houserank add`.");
        return Ok(());
    }
    for name in collections {
        println!("{name} ({} houses)", store.houses(&name).len());
    }
    Ok(())
}
