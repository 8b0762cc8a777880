#[tokio::main]
async fn main() {
    if let Err(err) = relay::cli::run().await {
        eprintln!("relay: {}", err);
        if let Some(hint) = err.hint.as_deref() {
            eprintln!("hint: {}", hint);
        }
        std::process::exit(1);
    }
}
