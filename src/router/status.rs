//! Public configuration page for front-end identification.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::config::Configuration;

/// Structured configuration.
#[derive(Serialize)]
pub struct Status {
    version: String,
    name: String,
    url: String,
}

/// Public server status (configuration).
pub async fn status(State(config): State<Arc<Configuration>>) -> Json<Status> {
    Json(Status {
        version: config.version().to_owned(),
        name: config.name.clone(),
        url: config.url.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn status_reports_public_fields() {
        let config = Arc::new(Configuration {
            name: "bridge".into(),
            url: "https://bridge.example.org/".into(),
            ..Default::default()
        });

        let Json(status) = status(State(config)).await;
        assert_eq!(status.name, "bridge");
        assert_eq!(status.url, "https://bridge.example.org/");
    }
}
