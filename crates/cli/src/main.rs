//! Shopfront CLI - browse the catalog, manage the cart and check out.
//!
//! # Usage
//!
//! ```bash
//! # Log in (token is kept in SHOPFRONT_TOKEN_FILE)
//! shop login jo --password secret
//!
//! # Browse
//! shop products --category tea --limit 20
//! shop product 42
//!
//! # Cart
//! shop cart add 42 --quantity 2
//! shop cart show
//!
//! # Place the order
//! shop checkout "1 Main St, Springfield"
//! ```
//!
//! # Environment Variables
//!
//! - `SHOPFRONT_API_URL` - Backend base URL (default `http://localhost:8000/api`)
//! - `SHOPFRONT_TOKEN_FILE` - Where the session token is stored
//! - `SHOPFRONT_PASSWORD` - Password for `login` and `register`
//! - `SENTRY_DSN` - Enables error reporting when set

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Args, Parser, Subcommand};
use secrecy::SecretString;
use sentry::integrations::tracing as sentry_tracing;
use shopfront_client::ClientConfig;
use shopfront_client::models::ProductQuery;
use shopfront_core::{OrderId, ProductId};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "shop")]
#[command(author, version, about = "Shopfront command-line storefront")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and remember the session
    Login {
        /// Username
        username: String,

        #[command(flatten)]
        password: PasswordArg,
    },
    /// Create an account and log in
    Register {
        /// Email address
        #[arg(short, long)]
        email: String,

        /// Username
        #[arg(short, long)]
        username: String,

        /// Full name
        #[arg(short = 'n', long)]
        full_name: Option<String>,

        #[command(flatten)]
        password: PasswordArg,
    },
    /// Forget the stored session
    Logout,
    /// Show the logged-in user
    Whoami,
    /// List products
    Products {
        /// Only this category
        #[arg(short, long)]
        category: Option<String>,

        /// Search name and description
        #[arg(short, long)]
        search: Option<String>,

        /// Number of products to skip
        #[arg(long)]
        skip: Option<u32>,

        /// Page size (1-100)
        #[arg(short, long)]
        limit: Option<u32>,
    },
    /// Show a product
    Product {
        /// Product ID
        id: ProductId,
    },
    /// List product categories
    Categories,
    /// Manage the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Place an order for the current cart
    Checkout {
        /// Shipping address
        shipping_address: String,
    },
    /// List orders, or show one
    Orders {
        /// Order ID
        id: Option<OrderId>,
    },
    /// Check that the backend is up
    Health,
}

#[derive(Subcommand)]
enum CartAction {
    /// Show the cart
    Show,
    /// Add a product
    Add {
        /// Product ID
        product_id: ProductId,

        /// Units to add
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },
    /// Set the quantity of a product in the cart
    Update {
        /// Product ID
        product_id: ProductId,

        /// New quantity
        quantity: u32,
    },
    /// Remove a product from the cart
    Remove {
        /// Product ID
        product_id: ProductId,
    },
    /// Empty the cart
    Clear,
}

#[derive(Args)]
struct PasswordArg {
    /// Password
    #[arg(short, long, env = "SHOPFRONT_PASSWORD", hide_env_values = true)]
    password: String,
}

impl PasswordArg {
    fn into_secret(self) -> SecretString {
        SecretString::from(self.password)
    }
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ClientConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    Some(guard)
}

/// Errors become Sentry events, info and debug become breadcrumbs.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_tracing();
            tracing::error!("Invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    let _sentry_guard = init_sentry(&config);
    init_tracing();

    if let Err(e) = run(cli, &config).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

/// Logs go to stderr so command output on stdout stays clean.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "shopfront_client=info,shop=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

async fn run(cli: Cli, config: &ClientConfig) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Login { username, password } => {
            commands::auth::login(config, &username, &password.into_secret()).await?;
        }
        Commands::Register {
            email,
            username,
            full_name,
            password,
        } => {
            commands::auth::register(config, &email, &username, full_name, password.into_secret())
                .await?;
        }
        Commands::Logout => commands::auth::logout(config).await?,
        Commands::Whoami => commands::auth::whoami(config).await?,
        Commands::Products {
            category,
            search,
            skip,
            limit,
        } => {
            let query = ProductQuery {
                skip,
                limit,
                category,
                search,
            };
            commands::catalog::products(config, &query).await?;
        }
        Commands::Product { id } => commands::catalog::product(config, id).await?,
        Commands::Categories => commands::catalog::categories(config).await?,
        Commands::Cart { action } => match action {
            CartAction::Show => commands::cart::show(config).await?,
            CartAction::Add {
                product_id,
                quantity,
            } => commands::cart::add(config, product_id, quantity).await?,
            CartAction::Update {
                product_id,
                quantity,
            } => commands::cart::update(config, product_id, quantity).await?,
            CartAction::Remove { product_id } => commands::cart::remove(config, product_id).await?,
            CartAction::Clear => commands::cart::clear(config).await?,
        },
        Commands::Checkout { shipping_address } => {
            commands::orders::checkout(config, &shipping_address).await?;
        }
        Commands::Orders { id } => commands::orders::orders(config, id).await?,
        Commands::Health => health(config).await?,
    }
    Ok(())
}

#[allow(clippy::print_stdout)]
async fn health(config: &ClientConfig) -> Result<(), commands::CommandError> {
    let storefront = commands::connect(config).await?;
    println!("{}", storefront.health().await?);
    Ok(())
}
