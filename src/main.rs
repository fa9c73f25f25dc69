use clap::Parser;
use ledgerbank::application::Bank;
use ledgerbank::config::EngineConfig;
use ledgerbank::domain::amortization::RepaymentPolicy;
use ledgerbank::domain::identity::Admin;
use ledgerbank::domain::ports::Stores;
use ledgerbank::infrastructure::in_memory::in_memory_stores;
use ledgerbank::interfaces::csv::account_writer::AccountWriter;
use ledgerbank::interfaces::csv::command_reader::CommandReader;
use ledgerbank::interfaces::csv::loan_writer::LoanWriter;
use ledgerbank::interfaces::script::ScriptRunner;
use miette::{IntoDiagnostic, Result};
use rust_decimal::Decimal;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input command script CSV file
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Upper bound on a single store call, in milliseconds
    #[arg(long, default_value_t = 5000)]
    store_timeout_ms: u64,

    /// Attempts for a conflicting conditional write before giving up
    #[arg(long, default_value_t = 5)]
    max_attempts: u32,

    /// EMI policy applied at approval (flat or reducing)
    #[arg(long, default_value = "flat")]
    approval_policy: RepaymentPolicy,

    /// Rate for personalized loans approved without an explicit rate
    #[arg(long)]
    custom_loan_rate: Option<Decimal>,

    /// Also write the final loan book to this CSV file
    #[arg(long)]
    loans_out: Option<PathBuf>,
}

impl Cli {
    fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            store_timeout: Duration::from_millis(self.store_timeout_ms),
            max_attempts: self.max_attempts.max(1),
            approval_policy: self.approval_policy,
            custom_loan_rate: self.custom_loan_rate,
            ..EngineConfig::default()
        }
    }
}

#[cfg(feature = "storage-rocksdb")]
fn open_stores(db_path: Option<&PathBuf>) -> Result<Stores> {
    use ledgerbank::infrastructure::rocksdb::RocksDBStore;

    match db_path {
        Some(path) => Ok(RocksDBStore::open(path).into_diagnostic()?.stores()),
        None => Ok(in_memory_stores()),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_stores(db_path: Option<&PathBuf>) -> Result<Stores> {
    if db_path.is_some() {
        eprintln!(
            "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
    }
    Ok(in_memory_stores())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "ledgerbank=info".into()))
        .with(fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    let bank = Bank::new(open_stores(cli.db_path.as_ref())?, cli.engine_config());
    let runner = ScriptRunner::new(&bank);

    // Process commands
    let file = File::open(&cli.input).into_diagnostic()?;
    for command in CommandReader::new(file).commands() {
        match command {
            Ok(command) => {
                if let Err(e) = runner.execute(&command).await {
                    eprintln!("Error processing command: {}", e);
                }
            }
            Err(e) => {
                eprintln!("Error reading command: {}", e);
            }
        }
    }

    let admin = Admin::new("cli");
    if let Some(path) = &cli.loans_out {
        let loans = runner.loans(&admin).await.into_diagnostic()?;
        let file = File::create(path).into_diagnostic()?;
        LoanWriter::new(file)
            .write_loans(&loans)
            .into_diagnostic()?;
    }

    // Output final state
    let accounts = runner.accounts(&admin).await.into_diagnostic()?;
    let stdout = io::stdout();
    let mut writer = AccountWriter::new(stdout.lock());
    writer.write_accounts(&accounts).into_diagnostic()?;

    Ok(())
}
