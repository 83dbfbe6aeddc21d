#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = applicant_review::run().await {
        eprintln!("applicant-review fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
