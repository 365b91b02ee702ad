use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};

use walletops::config::CoreConfig;
use walletops::error::{Classifier, ErrorCode, Locale, RawFailure};
use walletops::executor::{OperationExecutor, RetryOutcome};
use walletops::format::{format_address, format_balance, lamports_to_sol, sol_to_lamports};
use walletops::ledger::{LedgerClient, LedgerError, SimulatedLedger};
use walletops::logging::{init_logging, LoggingConfig};
use walletops::notification::{Notification, NotificationRenderer, NotificationSink};
use walletops::Dashboard;

/// Wallet used by the simulated `send` command.
const DEMO_WALLET: &str = "4Nd1mBQtrMJVYVfKf2PJy9NZUZdTAsp7D4xWLs4gDB4T";

/// JSON-RPC "internal error", used for injected failures without a code.
const INTERNAL_RPC_ERROR: i64 = -32603;

/// Language of user-facing messages
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CliLocale {
    /// English
    En,
    /// Romanian
    Ro,
}

impl From<CliLocale> for Locale {
    fn from(locale: CliLocale) -> Self {
        match locale {
            CliLocale::En => Locale::En,
            CliLocale::Ro => Locale::Ro,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "walletops")]
#[command(version)]
#[command(about = "Classify wallet failures and run dashboard operations")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to a TOML configuration file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Disable colors (also respects NO_COLOR environment variable)
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Classify a raw failure and print the normalized error as JSON
    Classify {
        /// Failure message
        message: Option<String>,

        /// Provider error code (numeric, or text)
        #[arg(long)]
        code: Option<String>,

        /// Operation label
        #[arg(long, default_value = "Operation")]
        operation: String,

        /// Message language (defaults to the configured locale)
        #[arg(long, value_enum)]
        locale: Option<CliLocale>,
    },
    /// List every error code with its severity, action and message
    Taxonomy {
        /// Message language (defaults to the configured locale)
        #[arg(long, value_enum)]
        locale: Option<CliLocale>,
    },
    /// Send a transfer against a simulated ledger
    Send {
        /// Destination address
        #[arg(long)]
        to: String,

        /// Amount in SOL
        #[arg(long, allow_negative_numbers = true)]
        amount: f64,

        /// Starting wallet balance in SOL
        #[arg(long, default_value = "2.0")]
        balance: f64,

        /// Make the first ledger call fail with this message
        #[arg(long, value_name = "MESSAGE")]
        fail: Option<String>,

        /// Provider code for the injected failure
        #[arg(long, requires = "fail", allow_negative_numbers = true)]
        fail_code: Option<i64>,

        /// Retry once if the transfer fails
        #[arg(long)]
        retry: bool,
    },
    /// Print the effective configuration as TOML
    Config,
}

/// Prints toasts to stdout as they arrive.
struct ConsoleSink {
    renderer: NotificationRenderer,
}

impl NotificationSink for ConsoleSink {
    fn notify(&self, notification: Notification) {
        println!("{}", self.renderer.render_toast(&notification));
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let use_color = !cli.no_color && std::env::var("NO_COLOR").is_err();
    init_logging(LoggingConfig::from_verbosity(cli.verbose).with_ansi(use_color))?;

    let config = CoreConfig::load(cli.config.as_ref())?;
    let renderer = NotificationRenderer::new()
        .with_colors(use_color)
        .with_locale(config.locale);

    match cli.command {
        Commands::Classify {
            message,
            code,
            operation,
            locale,
        } => {
            let locale = locale.map(Locale::from).unwrap_or(config.locale);
            let raw = build_failure(message, code);
            let error = Classifier::new()
                .with_locale(locale)
                .normalize(&raw, &operation);
            println!("{}", serde_json::to_string_pretty(&error)?);
        }
        Commands::Taxonomy { locale } => {
            let locale = locale.map(Locale::from).unwrap_or(config.locale);
            print_taxonomy(locale);
        }
        Commands::Send {
            to,
            amount,
            balance,
            fail,
            fail_code,
            retry,
        } => {
            let lamports = sol_to_lamports(balance)
                .ok_or("--balance must be a finite, non-negative amount")?;
            let ledger = SimulatedLedger::new(DEMO_WALLET, lamports);
            if let Some(message) = fail {
                ledger.fail_next(LedgerError::provider(
                    fail_code.unwrap_or(INTERNAL_RPC_ERROR),
                    message,
                ));
            }
            return Ok(run_send(&config, renderer, ledger, &to, amount, retry).await);
        }
        Commands::Config => {
            print!("{}", config.to_toml()?);
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn build_failure(message: Option<String>, code: Option<String>) -> RawFailure {
    let raw = match message {
        Some(message) if !message.is_empty() => RawFailure::message(message),
        _ => RawFailure::new(),
    };
    match code {
        Some(code) => match code.trim().parse::<i64>() {
            Ok(numeric) => raw.with_code(numeric),
            Err(_) => raw.with_text_code(code),
        },
        None => raw,
    }
}

fn print_taxonomy(locale: Locale) {
    println!("{:<20} {:<9} {:<10} MESSAGE", "CODE", "SEVERITY", "ACTION");
    for code in ErrorCode::ALL {
        println!(
            "{:<20} {:<9} {:<10} {}",
            code.as_str(),
            code.severity().to_string(),
            code.suggested_action().to_string(),
            code.user_message(locale)
        );
    }
}

async fn run_send(
    config: &CoreConfig,
    renderer: NotificationRenderer,
    ledger: SimulatedLedger,
    destination: &str,
    amount: f64,
    retry: bool,
) -> ExitCode {
    let sink = Arc::new(ConsoleSink {
        renderer: renderer.clone(),
    });
    let executor = OperationExecutor::from_config(config).with_sink(sink);
    let dashboard = Dashboard::from_config(Arc::new(ledger), executor, config);

    println!(
        "Sending {} SOL from {} to {}",
        format_balance(amount),
        format_address(DEMO_WALLET, 4),
        format_address(destination, 4)
    );

    let mut signature = dashboard.send_transfer(destination, amount).await;
    if signature.is_none() && retry {
        println!("{}", renderer.render_errors(&dashboard.executor().store().snapshot()));
        if dashboard.retry_last().await == RetryOutcome::Succeeded {
            signature = dashboard.last_signature();
        }
    }

    let state = dashboard.executor().store().snapshot();
    println!("{}", renderer.render_status(&state));

    match signature {
        Some(signature) => {
            println!("Explorer: {}", dashboard.explorer_url(&signature));
            let ledger = dashboard.ledger();
            if let Some(balance) = ledger.balance_of(ledger.wallet_address()) {
                println!("Balance: {} SOL", format_balance(lamports_to_sol(balance)));
            }
            ExitCode::SUCCESS
        }
        None => {
            println!("{}", renderer.render_errors(&state));
            ExitCode::FAILURE
        }
    }
}
