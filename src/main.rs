use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio::sync::mpsc;

use piecewise::torrent::Torrent;
use piecewise::tracker::{self, TrackerRequest};
use piecewise::{Config, Coordinator, Download, Notification, storage};

#[derive(Parser, Debug)]
#[command(author, version, about = "Downloads a single-file torrent from its peers.")]
struct Args {
    /// Path to the .torrent file
    #[arg(short, long)]
    input: PathBuf,

    /// Output file, or a directory to save the torrent's file into
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Log connections and progress (RUST_LOG still applies)
    #[arg(long)]
    log: bool,

    /// Give up if the download takes longer than this many seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Port advertised to the tracker
    #[arg(long, default_value_t = 6881)]
    port: u16,

    /// Times to redial a peer after its connection fails
    #[arg(long, default_value_t = 0)]
    retries: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logger(args.log);

    let torrent = Torrent::load(&args.input).await?;
    let output = storage::output_path(&args.output, &torrent.info.name).await?;

    let mut config = Config::default()
        .with_port(args.port)
        .with_max_reconnects(args.retries);
    if let Some(secs) = args.timeout {
        config = config.with_download_timeout(Duration::from_secs(secs));
    }

    let response = tracker::announce(&TrackerRequest::new(&torrent, &config)).await?;
    let peers = response.peers.iter().map(|peer| peer.addr).collect();

    let (tx, rx) = mpsc::channel(16);
    let progress = tokio::spawn(print_progress(rx));
    let content = Coordinator::new(Download::from(&torrent.info), peers, config)
        .with_notifications(tx)
        .run()
        .await?;
    let _ = progress.await;

    storage::write(&output, &content).await?;
    println!("Saved {} to {}", torrent.info.name, output.display());
    Ok(())
}

fn init_logger(verbose: bool) {
    let env = if verbose {
        env_logger::Env::default().default_filter_or("info")
    } else {
        env_logger::Env::default()
    };
    env_logger::Builder::from_env(env).init();
}

async fn print_progress(mut notifications: mpsc::Receiver<Notification>) {
    while let Some(notification) = notifications.recv().await {
        match &notification {
            Notification::PieceCompleted {
                piece,
                active_peers,
                ..
            } => println!(
                "({:.2}%) downloaded piece #{} from {} peers",
                notification.percent().unwrap_or_default(),
                piece,
                active_peers
            ),
            Notification::DownloadComplete => break,
        }
    }
}
