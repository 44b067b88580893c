use place_picker::config::Config;
use place_picker::engine::{PlacePicker, Status};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "invalid configuration");
            std::process::exit(1);
        }
    };

    tracing::info!(api_base = %config.api_base, "starting session");

    let picker = PlacePicker::new(config.api(), config.geolocation());
    picker.mount().await;

    match picker.available().status() {
        Status::Loading => tracing::info!("available places still loading"),
        Status::Failed(error) => tracing::error!(reason = %error.message, "available places"),
        Status::Ready(places) => {
            for place in places {
                tracing::info!(id = %place.id, name = %place.name, "available");
            }
        }
    }

    match picker.saved().state().status() {
        Status::Loading => tracing::info!("saved places still loading"),
        Status::Failed(error) => tracing::error!(reason = %error.message, "saved places"),
        Status::Ready(places) => {
            for place in places {
                tracing::info!(id = %place.id, name = %place.name, "saved");
            }
        }
    }
}
