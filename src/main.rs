use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use mobile_store::api::{CachedApiClient, Product};
use mobile_store::cancel::CancellationToken;
use mobile_store::cart::{format_total, CartStore, Checkout, CheckoutOutcome};
use mobile_store::catalog::{filter_products, VariantSelection};
use mobile_store::config::Config;
use mobile_store::debounce::Debouncer;
use mobile_store::logging;
use mobile_store::query::{Query, QueryState};
use mobile_store::storage::SqliteStore;

type Api = CachedApiClient<SqliteStore>;
type Store = CartStore<Arc<Api>, SqliteStore>;

const DETAIL_FIELDS: &[(&str, &str)] = &[
  ("CPU", "cpu"),
  ("RAM", "ram"),
  ("OS", "os"),
  ("Screen", "displayResolution"),
  ("Battery", "battery"),
  ("Main camera", "primaryCamera"),
  ("Front camera", "secondaryCmera"),
  ("Dimensions", "dimentions"),
  ("Weight", "weight"),
];

#[derive(Parser, Debug)]
#[command(name = "mobile-store")]
#[command(about = "Browse the mobile phone catalog and manage your cart")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/mobile-store/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// API base URL, overriding config and MOBILE_STORE_API_URL
  #[arg(long)]
  api_url: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List products, optionally filtered by brand or model
  Products {
    #[arg(short, long)]
    search: Option<String>,
    /// Skip the cached list and fetch it again
    #[arg(long)]
    refresh: bool,
  },
  /// Show a product's details and options
  Product {
    id: String,
    /// Skip the cached details and fetch them again
    #[arg(long)]
    refresh: bool,
  },
  /// Inspect or change the cart
  Cart {
    #[command(subcommand)]
    action: CartAction,
  },
  /// Place the order and empty the cart
  Checkout,
}

#[derive(Subcommand, Debug)]
enum CartAction {
  /// Show cart contents and total
  Show,
  /// Add one unit of a product variant
  Add {
    id: String,
    /// Color code; may be omitted when the product has a single color
    #[arg(long)]
    color: Option<i64>,
    /// Storage code; may be omitted when the product has a single storage
    #[arg(long)]
    storage: Option<i64>,
  },
  /// Remove a line
  Remove { id: String, color: i64, storage: i64 },
  /// Set a line's quantity; zero or less removes it
  Set {
    id: String,
    color: i64,
    storage: i64,
    #[arg(allow_negative_numbers = true)]
    quantity: i64,
  },
  /// Empty the cart
  Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let mut config = Config::load(args.config.as_deref())?;

  // Override API URL if specified on command line
  if let Some(url) = args.api_url {
    config.api.base_url = url;
    config.validate()?;
  }

  let _log_guard = logging::init(config.storage.path.as_deref().and_then(Path::parent))?;

  let storage = Arc::new(match &config.storage.path {
    Some(path) => SqliteStore::open(path)?,
    None => SqliteStore::open_default()?,
  });
  let api = Arc::new(CachedApiClient::new(&config.api, Arc::clone(&storage))?);
  let cart = Arc::new(CartStore::new(Arc::clone(&api), storage));

  info!(base_url = %config.api.base_url, "Starting");

  match args.command {
    Command::Products { search, refresh } => {
      if refresh {
        api.invalidate_products();
      }
      list_products(&config, &api, search).await
    }
    Command::Product { id, refresh } => {
      if refresh {
        api.invalidate_product(&id);
      }
      show_product(&api, id).await
    }
    Command::Cart { action } => run_cart(&api, &cart, action).await,
    Command::Checkout => checkout(&config, &cart).await,
  }
}

async fn list_products(config: &Config, api: &Arc<Api>, search: Option<String>) -> Result<()> {
  let mut term = Debouncer::new(String::new(), config.search.debounce());
  let mut term_rx = term.subscribe();
  if let Some(search) = search {
    term.set(search);
  }

  let api = Arc::clone(api);
  let query = Query::new(move |cancel: CancellationToken| {
    let api = Arc::clone(&api);
    async move { api.list_products(&cancel).await }
  })
  .with_error_message("Error loading products. Please try again later.");

  let Some(products) = run_query(query).await? else {
    return Ok(());
  };

  if term.raw() != &term.current() {
    term_rx.changed().await?;
  }
  let term = term_rx.borrow().clone();

  let matches = filter_products(&products, &term);
  if matches.is_empty() {
    println!("No products found");
    return Ok(());
  }
  for product in matches {
    println!(
      "{:<12} {:<12} {:<28} {}",
      product.id,
      product.brand,
      product.model,
      product.display_price()
    );
  }
  Ok(())
}

async fn show_product(api: &Arc<Api>, id: String) -> Result<()> {
  let Some(product) = fetch_product(api, id).await? else {
    return Ok(());
  };

  println!("{} {}", product.brand, product.model);
  println!("  Price: {}", product.display_price());
  for (label, field) in DETAIL_FIELDS {
    if let Some(value) = product.detail(field) {
      println!("  {label}: {value}");
    }
  }

  if let Some(options) = &product.options {
    println!("  Colors:");
    for color in &options.colors {
      println!("    {:>6}  {}", color.code, color.name);
    }
    println!("  Storage:");
    for storage in &options.storages {
      println!("    {:>6}  {}", storage.code, storage.name);
    }
  }
  Ok(())
}

async fn fetch_product(api: &Arc<Api>, id: String) -> Result<Option<Product>> {
  let api = Arc::clone(api);
  let query = Query::new(move |cancel: CancellationToken| {
    let api = Arc::clone(&api);
    let id = id.clone();
    async move { api.get_product(&id, &cancel).await }
  })
  .with_error_message("Error loading product details. Please try again later.");

  run_query(query).await
}

/// Run a query to completion. `None` means the user interrupted it.
async fn run_query<T: Clone + Send + 'static>(mut query: Query<T>) -> Result<Option<T>> {
  query.fetch();

  let interrupted = tokio::select! {
    _ = query.settle() => false,
    _ = tokio::signal::ctrl_c() => true,
  };
  if interrupted {
    query.cancel();
    return Ok(None);
  }

  match query.state() {
    QueryState::Success(data) => Ok(Some(data.clone())),
    QueryState::Error(message) => Err(eyre!("{}", message)),
    QueryState::Idle | QueryState::Loading => Ok(None),
  }
}

async fn run_cart(api: &Arc<Api>, cart: &Store, action: CartAction) -> Result<()> {
  match action {
    CartAction::Show => {}
    CartAction::Add { id, color, storage } => {
      let Some(product) = fetch_product(api, id).await? else {
        return Ok(());
      };

      let mut selection = VariantSelection::for_product(&product);
      if let Some(code) = color {
        if !selection.select_color(code) {
          return Err(eyre!("{} {} has no color with code {}", product.brand, product.model, code));
        }
      }
      if let Some(code) = storage {
        if !selection.select_storage(code) {
          return Err(eyre!("{} {} has no storage with code {}", product.brand, product.model, code));
        }
      }

      let Some((color, storage)) = selection.selected() else {
        return Err(missing_variant(&selection));
      };
      cart.add_item(&product, color, storage).await?;
      println!("Added {} {} ({}, {})", product.brand, product.model, color.name, storage.name);
    }
    CartAction::Remove { id, color, storage } => cart.remove_item(&id, color, storage),
    CartAction::Set {
      id,
      color,
      storage,
      quantity,
    } => cart.update_quantity(&id, color, storage, quantity),
    CartAction::Clear => cart.clear(),
  }

  print_cart(cart);
  Ok(())
}

fn missing_variant(selection: &VariantSelection) -> color_eyre::Report {
  let options = selection.options();
  if options.colors.is_empty() || options.storages.is_empty() {
    return eyre!("This product has no purchasable options");
  }

  let mut missing = Vec::new();
  if selection.color().is_none() {
    let codes: Vec<String> = options
      .colors
      .iter()
      .map(|c| format!("{} ({})", c.code, c.name))
      .collect();
    missing.push(format!("--color, one of: {}", codes.join(", ")));
  }
  if selection.storage().is_none() {
    let codes: Vec<String> = options
      .storages
      .iter()
      .map(|s| format!("{} ({})", s.code, s.name))
      .collect();
    missing.push(format!("--storage, one of: {}", codes.join(", ")));
  }
  eyre!("Select a variant first:\n  {}", missing.join("\n  "))
}

fn print_cart(cart: &Store) {
  let lines = cart.lines();
  if lines.is_empty() {
    println!("Your cart is empty");
    return;
  }

  for line in &lines {
    println!(
      "{:<12} {} {} ({} / {})  {} x {} = {}",
      line.id,
      line.brand,
      line.model,
      line.color_name,
      line.storage_name,
      line.quantity,
      format_total(line.unit_price()),
      format_total(line.subtotal())
    );
  }
  println!("{} item(s), total {}", cart.count(), format_total(cart.total()));
}

async fn checkout(config: &Config, cart: &Arc<Store>) -> Result<()> {
  if cart.is_empty() {
    println!("Your cart is empty");
    return Ok(());
  }

  print_cart(cart);
  println!("Processing order...");

  let pending = Checkout::start(Arc::clone(cart), config.checkout.redirect_delay());
  // Dropping the pending checkout on Ctrl-C cancels it
  let outcome = tokio::select! {
    outcome = pending.wait() => outcome,
    _ = tokio::signal::ctrl_c() => CheckoutOutcome::Cancelled,
  };

  match outcome {
    CheckoutOutcome::Completed => println!("Order processed. Thank you for your purchase!"),
    CheckoutOutcome::Cancelled => println!("Checkout cancelled, your cart was kept"),
  }
  Ok(())
}
