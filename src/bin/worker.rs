#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = applicant_review::run_worker().await {
        eprintln!("applicant-review-worker fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
