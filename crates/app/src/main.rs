use anyhow::Context;

mod config;
mod run;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let project_dirs = directories::ProjectDirs::from("dev", "settle", "Settle")
        .context("no home directory available for the settle data dir")?;
    let data_dir = project_dirs.data_dir().to_path_buf();
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("creating {}", data_dir.display()))?;

    let config = config::Config::load(&data_dir.join("settle.toml"))?;
    let today = chrono::Utc::now().date_naive();
    let period = config.period(today)?;

    let db = settle_storage::create_db(&data_dir.join("rates.db"))
        .await
        .context("opening the rate cache database")?;

    run::run(config, db, period).await
}
