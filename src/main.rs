use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = centrifuge::cli::Cli::parse();
    if let Err(e) = centrifuge::cmd::dispatch(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
