#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = quizforge::run().await {
        eprintln!("quizforge fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
