use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() > 1 && (args[1] == "--version" || args[1] == "-V") {
        println!("frg-lsp {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    // stdout carries the protocol; logs go to stderr only.
    let filter = EnvFilter::try_from_env("FRG_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    if let Err(e) = frg_lsp::start_server().await {
        eprintln!("LSP server error: {e}");
        std::process::exit(1);
    }
}
