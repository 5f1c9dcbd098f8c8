//! Marketplace cart CLI - inspect and edit a user's cart from the terminal.
//!
//! # Usage
//!
//! ```bash
//! # Show the cart with its total
//! cart-cli --user u-123 show
//!
//! # Add two units of a product variant
//! cart-cli --user u-123 add --product p-1 --sku p-1-m-red --name "T-shirt" --price 19.99 -q 2
//!
//! # Set a line's quantity exactly
//! cart-cli --user u-123 update --product p-1 --sku p-1-m-red -q 1
//!
//! # Remove a line, or everything
//! cart-cli --user u-123 remove --product p-1 --sku p-1-m-red
//! cart-cli --user u-123 clear
//! ```
//!
//! # Environment Variables
//!
//! - `CART_API_BASE_URL` and friends - see `marketplace_cart::config`
//! - `CART_USER` - default for `--user`
//! - `LOG_FORMAT` - `json` for structured log lines (default: human-readable)
//! - `SENTRY_DSN` - Sentry error tracking DSN

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Args, Parser, Subcommand};
use marketplace_core::{ProductId, Sku, UserId};
use rust_decimal::Decimal;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "cart-cli")]
#[command(author, version, about = "Marketplace cart tools")]
struct Cli {
    /// Signed-in user whose cart to operate on
    #[arg(short, long, env = "CART_USER", global = true)]
    user: Option<UserId>,

    /// Print the cart as JSON instead of a table
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch and print the cart
    Show,
    /// Add units of a product variant
    Add(AddArgs),
    /// Set a line's quantity exactly
    Update {
        #[command(flatten)]
        line: LineArgs,

        /// New quantity (must be at least 1; use `remove` to delete)
        #[arg(short, long, allow_hyphen_values = true)]
        quantity: i64,
    },
    /// Remove a line
    Remove {
        #[command(flatten)]
        line: LineArgs,
    },
    /// Remove every line
    Clear,
}

/// Identity of a cart line.
#[derive(Args)]
struct LineArgs {
    /// Product ID
    #[arg(short, long)]
    product: ProductId,

    /// Stock-keeping unit
    #[arg(short, long)]
    sku: Sku,
}

#[derive(Args)]
struct AddArgs {
    #[command(flatten)]
    line: LineArgs,

    /// Display name
    #[arg(short, long, default_value = "")]
    name: String,

    /// Unit price
    #[arg(long)]
    price: Decimal,

    /// Units to add
    #[arg(short, long, default_value_t = 1, allow_hyphen_values = true)]
    quantity: i64,

    /// Image URL
    #[arg(long)]
    image: Option<String>,

    /// Variant size
    #[arg(long)]
    size: Option<String>,

    /// Variant color
    #[arg(long)]
    color: Option<String>,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry() -> Option<sentry::ClientInitGuard> {
    let dsn = std::env::var("SENTRY_DSN").ok().filter(|d| !d.is_empty())?;

    let guard = sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

fn init_tracing() {
    // Defaults to info level for our crates if RUST_LOG is not set
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "marketplace_cart=info,marketplace_cli=info".into());
    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));

    // Logs go to stderr so stdout stays clean for cart output
    let fmt_layer = if json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() {
    // Load .env before Sentry so SENTRY_DSN can live there
    let _ = dotenvy::dotenv();

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry();
    init_tracing();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CommandError> {
    let ctx = commands::CartContext::connect(cli.user, cli.json).await?;

    match cli.command {
        Commands::Show => ctx.show(),
        Commands::Add(args) => {
            ctx.add(commands::AddLine {
                product: args.line.product,
                sku: args.line.sku,
                name: args.name,
                image: args.image,
                price: args.price,
                quantity: args.quantity,
                size: args.size,
                color: args.color,
            })
            .await
        }
        Commands::Update { line, quantity } => {
            ctx.update(&line.product, &line.sku, quantity).await
        }
        Commands::Remove { line } => ctx.remove(&line.product, &line.sku).await,
        Commands::Clear => ctx.clear().await,
    }
}
