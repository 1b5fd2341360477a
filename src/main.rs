use env_logger::Env;
use nack::config::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = Config::load();
    nack::app::run(config).await?;

    Ok(())
}
