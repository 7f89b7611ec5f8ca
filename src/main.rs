use hospital::config::get_configuration;
use hospital::startup::Application;
use hospital::telemetry::{get_subscriber, init_subscriber};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise logger
    let subscriber = get_subscriber("hospital".into(), "info".into(), std::io::stdout);
    init_subscriber(subscriber);

    // Read configuration
    let config = get_configuration().expect("Failed to read configuration.");

    // Run the app
    let application = Application::build(config).await?;
    application.run_until_stopped().await?;

    Ok(())
}
