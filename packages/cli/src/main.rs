use clap::Parser;
use persistfs_cli::{init_logging, run, Args};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    init_logging();
    let args = Args::parse();

    if let Err(e) = run(args, &mut std::io::stdout()).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
