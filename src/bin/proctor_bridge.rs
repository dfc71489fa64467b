#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = proctor_rust::run_bridge().await {
        eprintln!("proctor-bridge fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
