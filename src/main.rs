use boss_tracker::app;
use boss_tracker::config::TrackerConfig;
use std::env;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Optional positional arguments: data directory, then port
    let args: Vec<String> = env::args().collect();
    let config = TrackerConfig::from_args(&args);

    app::run(config).await
}
