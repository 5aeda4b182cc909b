use std::path::PathBuf;

use clap::{Parser, Subcommand};

use warc_replay_proxy::archive::{dump, ArchiveReader, ArchiveStore, LookupPolicy, RecordKind};

#[derive(Parser)]
#[command(name = "archive-cli")]
#[command(about = "Inspect the WARC archives served by replay-proxy", long_about = None)]
struct Cli {
    /// Which record wins when a URL was captured more than once.
    #[arg(long, value_enum, default_value = "first")]
    policy: Policy,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum Policy {
    First,
    Last,
}

impl From<Policy> for LookupPolicy {
    fn from(policy: Policy) -> Self {
        match policy {
            Policy::First => LookupPolicy::First,
            Policy::Last => LookupPolicy::Last,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List record locators
    List {
        #[arg(required = true)]
        warcs: Vec<PathBuf>,
        /// Only response records
        #[arg(long)]
        responses: bool,
        /// One JSON object per line
        #[arg(long)]
        json: bool,
    },
    /// Print the archived record for a URL
    Dump {
        url: String,
        #[arg(short, long = "warc", required = true)]
        warcs: Vec<PathBuf>,
    },
    /// Write the (inflated) response body for a URL to a file
    Extract {
        url: String,
        #[arg(short, long = "warc", required = true)]
        warcs: Vec<PathBuf>,
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn load(warcs: &[PathBuf], policy: LookupPolicy) -> Result<ArchiveStore, Box<dyn std::error::Error>> {
    let store = ArchiveStore::new(policy);
    for warc in warcs {
        let report = store.load(warc)?;
        for issue in &report.errors {
            eprintln!("{}: offset {}: {}", warc.display(), issue.offset, issue.message);
        }
    }
    Ok(store)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let policy = LookupPolicy::from(cli.policy);
    let reader = ArchiveReader::new();

    match cli.command {
        Commands::List {
            warcs,
            responses,
            json,
        } => {
            let store = load(&warcs, policy)?;
            let locators = store.record_locators();
            for locator in locators
                .iter()
                .filter(|l| !responses || l.kind == RecordKind::Response)
            {
                if json {
                    println!("{}", serde_json::to_string(locator)?);
                } else {
                    println!(
                        "{}\t{}\t{}\t{}",
                        locator.source_file.display(),
                        locator.offset,
                        locator.kind,
                        locator.url
                    );
                }
            }
        }
        Commands::Dump { url, warcs } => {
            let store = load(&warcs, policy)?;
            let locator = store
                .lookup(&url)
                .ok_or_else(|| format!("{} not found in archives", url))?;
            print!("{}", dump(&reader.read(&locator)?));
        }
        Commands::Extract { url, warcs, output } => {
            let store = load(&warcs, policy)?;
            let locator = store
                .lookup(&url)
                .ok_or_else(|| format!("{} not found in archives", url))?;
            let record = reader.read(&locator)?;
            let payload = reader.extract_payload(&record)?;
            std::fs::write(&output, &payload)?;
            eprintln!("wrote {} bytes to {}", payload.len(), output.display());
        }
    }

    Ok(())
}
