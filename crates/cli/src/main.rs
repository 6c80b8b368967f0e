//! storyprint CLI - cart, shipping and checkout from the terminal.
//!
//! # Usage
//!
//! ```bash
//! # Add a story to the cart
//! storyprint cart add --id story-1 --title "Road Trip" --pdf-url https://cdn.example.com/story-1.pdf
//!
//! # Show the cart with pricing
//! storyprint cart list
//!
//! # Save shipping info
//! storyprint shipping set --name "Jordan Reyes" --address1 "500 Treat Ave" \
//!     --city "San Francisco" --state CA --postal 94110 --country US \
//!     --phone "+14155550123" --email jordan@example.com
//!
//! # Validate the saved address against the print provider
//! storyprint shipping validate
//!
//! # Run checkout (order + payment)
//! storyprint checkout
//! ```
//!
//! # Commands
//!
//! - `cart` - Manage the persisted cart
//! - `shipping` - Save, show and validate shipping info
//! - `checkout` - Place the print order and collect payment

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use storyprint_checkout::{AppState, CheckoutConfig};

mod commands;

#[derive(Parser)]
#[command(name = "storyprint")]
#[command(author, version, about = "storyprint checkout tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Manage shipping info
    Shipping {
        #[command(subcommand)]
        action: ShippingAction,
    },
    /// Place the order and collect payment
    Checkout,
}

#[derive(Subcommand)]
enum CartAction {
    /// List cart items with their prices and the total
    List,
    /// Add a story to the cart
    Add {
        /// Item identifier (one entry per id)
        #[arg(long)]
        id: String,

        /// Story title
        #[arg(long)]
        title: String,

        /// Story text, used as the line item description
        #[arg(long, default_value = "")]
        content: String,

        /// URL of the print-ready interior PDF
        #[arg(long)]
        pdf_url: String,

        /// URL of the cover preview image
        #[arg(long, default_value = "")]
        cover_image_url: String,
    },
    /// Remove an item from the cart
    Remove {
        /// Item identifier
        #[arg(long)]
        id: String,
    },
    /// Remove every item from the cart
    Clear,
}

#[derive(Subcommand)]
enum ShippingAction {
    /// Save shipping info, replacing any previous record
    Set {
        #[arg(long)]
        name: String,
        #[arg(long)]
        company: Option<String>,
        #[arg(long)]
        address1: String,
        #[arg(long)]
        address2: Option<String>,
        #[arg(long)]
        city: String,
        /// Two-letter state code
        #[arg(long)]
        state: String,
        /// Five-digit ZIP code
        #[arg(long)]
        postal: String,
        /// Two-letter country code
        #[arg(long, default_value = "US")]
        country: String,
        #[arg(long)]
        phone: String,
        #[arg(long)]
        email: String,
    },
    /// Show the saved shipping info
    Show,
    /// Validate the saved address against the print provider
    Validate,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = CheckoutConfig::from_env()?;
    let state = AppState::init(config).await?;

    match cli.command {
        Commands::Cart { action } => match action {
            CartAction::List => commands::cart::list(&state).await,
            CartAction::Add {
                id,
                title,
                content,
                pdf_url,
                cover_image_url,
            } => {
                commands::cart::add(&state, id, title, content, pdf_url, cover_image_url).await;
            }
            CartAction::Remove { id } => commands::cart::remove(&state, &id).await,
            CartAction::Clear => commands::cart::clear(&state).await,
        },
        Commands::Shipping { action } => match action {
            ShippingAction::Set {
                name,
                company,
                address1,
                address2,
                city,
                state: state_code,
                postal,
                country,
                phone,
                email,
            } => {
                commands::shipping::set(
                    &state,
                    storyprint_checkout::ShippingInfo {
                        name,
                        company,
                        address1,
                        address2,
                        city,
                        state: state_code,
                        postal,
                        country,
                        phone,
                        email,
                    },
                )
                .await?;
            }
            ShippingAction::Show => commands::shipping::show(&state).await,
            ShippingAction::Validate => {
                commands::shipping::validate(&state).await?;
            }
        },
        Commands::Checkout => commands::checkout::run(&state).await?,
    }
    Ok(())
}
