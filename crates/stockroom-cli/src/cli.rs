use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "stockroom")]
#[command(about = "Manage the product catalogue from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// CLI profile name for backend, auth and audio configuration
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List all products
    #[command(alias = "ls")]
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Search products by name on the server
    Search {
        /// Search term
        term: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create a product
    #[command(alias = "new")]
    Add {
        /// Product name
        #[arg(long)]
        name: String,
        /// Whole, non-negative quantity
        #[arg(long, allow_hyphen_values = true)]
        quantity: String,
        /// Non-negative price
        #[arg(long, allow_hyphen_values = true)]
        price: String,
        /// Output the created product as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change fields of an existing product
    Edit {
        /// Product ID
        id: String,
        /// New name
        #[arg(long)]
        name: Option<String>,
        /// New quantity
        #[arg(long, allow_hyphen_values = true)]
        quantity: Option<String>,
        /// New price
        #[arg(long, allow_hyphen_values = true)]
        price: Option<String>,
    },
    /// Delete a product
    #[command(alias = "rm")]
    Delete {
        /// Product ID
        id: String,
    },
    /// Play a product's audio preview
    Play {
        /// Product ID
        id: String,
        /// Print the signed URL instead of starting a player
        #[arg(long)]
        print_url: bool,
    },
    /// Interactive session with live search and editing
    Shell,
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Configure CLI profiles
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Sign in through the hosted identity provider
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize or update profile config
    Init {
        /// Profile name to initialize
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
        /// Products API base URL
        #[arg(long, value_name = "URL")]
        api_base_url: Option<String>,
        /// Hosted sign-in domain
        #[arg(long, value_name = "URL")]
        auth_domain: Option<String>,
        /// OAuth client ID
        #[arg(long, value_name = "ID")]
        client_id: Option<String>,
        /// OAuth redirect URI registered for this client
        #[arg(long, value_name = "URL")]
        redirect_uri: Option<String>,
        /// Where the provider returns after logout
        #[arg(long, value_name = "URL")]
        logout_uri: Option<String>,
        /// OAuth scopes
        #[arg(long, value_name = "SCOPES")]
        scope: Option<String>,
        /// Audio bucket region
        #[arg(long, value_name = "REGION")]
        audio_region: Option<String>,
        /// Audio bucket name
        #[arg(long, value_name = "BUCKET")]
        audio_bucket: Option<String>,
        /// Custom S3-compatible endpoint for the audio bucket
        #[arg(long, value_name = "URL")]
        audio_endpoint: Option<String>,
        /// Identity pool that issues audio credentials to signed-in users
        #[arg(long, value_name = "POOL_ID")]
        audio_identity_pool_id: Option<String>,
        /// Keep current active profile instead of activating this one
        #[arg(long)]
        no_activate: bool,
    },
}

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Print the sign-in URL, or exchange the code it redirects back with
    Login {
        /// Optional profile override
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
        /// Authorization code from the redirect URL
        #[arg(long, value_name = "CODE")]
        code: Option<String>,
    },
    /// Show auth status for profile
    Status {
        /// Optional profile override
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
    },
    /// Clear the stored session and print the provider logout URL
    Logout {
        /// Optional profile override
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
    },
}
