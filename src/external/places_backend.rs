use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};

use crate::{
    api::PlacesAPI,
    entities::Place,
    error::{server_error, Error},
};

/// `PlacesAPI` over the JSON backend (`/places`, `/user-places`).
#[derive(Clone, Debug)]
pub struct PlacesBackend {
    client: Client,
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct PlacesResponse {
    places: Vec<Place>,
}

#[derive(Debug, Serialize)]
struct UpdateRequest<'a> {
    places: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    message: Option<String>,
}

impl PlacesBackend {
    pub fn new(api_base: impl Into<String>) -> Self {
        Self::with_client(Client::new(), api_base)
    }

    pub fn with_client(client: Client, api_base: impl Into<String>) -> Self {
        let api_base = api_base.into().trim_end_matches('/').to_string();

        Self { client, api_base }
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    async fn fetch_places(&self, path: &str) -> Result<Vec<Place>, Error> {
        let res = self.client.get(self.url(path)).send().await?;
        let res = check_status(res).await?;

        let data: PlacesResponse = res.json().await?;

        Ok(data.places)
    }
}

async fn check_status(res: Response) -> Result<Response, Error> {
    let status = res.status();

    if status.is_success() {
        return Ok(res);
    }

    let reason = status.canonical_reason().unwrap_or("unknown status").to_string();
    let message = match res.json::<ErrorResponse>().await {
        Ok(ErrorResponse {
            message: Some(message),
        }) if !message.trim().is_empty() => message,
        _ => reason,
    };

    tracing::warn!(status = status.as_u16(), detail = %message, "backend rejected request");

    Err(server_error(status.as_u16(), message))
}

#[async_trait]
impl PlacesAPI for PlacesBackend {
    #[tracing::instrument(skip(self))]
    async fn fetch_available_places(&self) -> Result<Vec<Place>, Error> {
        self.fetch_places("/places").await
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_user_places(&self) -> Result<Vec<Place>, Error> {
        self.fetch_places("/user-places").await
    }

    #[tracing::instrument(skip(self, places), fields(count = places.len()))]
    async fn update_user_places(&self, places: &[Place]) -> Result<(), Error> {
        let body = UpdateRequest {
            places: places.iter().map(|place| place.id.as_str()).collect(),
        };

        let res = self
            .client
            .put(self.url("/user-places"))
            .json(&body)
            .send()
            .await?;

        check_status(res).await?;

        Ok(())
    }
}

#[cfg(test)]
use axum::{
    extract::Extension,
    http::StatusCode,
    routing::get,
    Json, Router,
};
#[cfg(test)]
use serde_json::{json, Value};
#[cfg(test)]
use std::net::{SocketAddr, TcpListener};
#[cfg(test)]
use std::sync::{Arc, Mutex};
#[cfg(test)]
use tokio_test::block_on;

#[cfg(test)]
use crate::entities::Coordinates;
#[cfg(test)]
use crate::error::ErrorKind;

#[cfg(test)]
type Writes = Arc<Mutex<Vec<Value>>>;

#[cfg(test)]
async fn available() -> Json<Value> {
    Json(json!({
        "places": [
            { "id": "p1", "name": "Forest Waterfall", "latitude": 44.5588, "longitude": -80.344 },
            { "id": "p2", "name": "Sahara Desert Dunes", "latitude": 25.0, "longitude": 0.0 },
        ]
    }))
}

#[cfg(test)]
async fn user_places() -> Json<Value> {
    Json(json!({ "places": [] }))
}

#[cfg(test)]
async fn record_update(
    Extension(writes): Extension<Writes>,
    Json(body): Json<Value>,
) -> StatusCode {
    writes.lock().unwrap().push(body);
    StatusCode::OK
}

#[cfg(test)]
async fn broken() -> (StatusCode, Json<Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "message": "Could not read places." })),
    )
}

#[cfg(test)]
async fn malformed() -> Json<Value> {
    Json(json!({ "items": [] }))
}

#[cfg(test)]
fn spawn(app: Router) -> String {
    let server = axum::Server::bind(&SocketAddr::from(([127, 0, 0, 1], 0)))
        .serve(app.into_make_service());
    let addr = server.local_addr();

    tokio::spawn(server);

    format!("http://{}/", addr)
}

#[test]
fn fetches_and_updates_places() {
    block_on(async {
        let writes = Writes::default();
        let app = Router::new()
            .route("/places", get(available))
            .route("/user-places", get(user_places).put(record_update))
            .layer(Extension(writes.clone()));

        let backend = PlacesBackend::new(spawn(app));
        assert!(!backend.api_base().ends_with('/'));

        let places = backend.fetch_available_places().await.unwrap();
        assert_eq!(places.len(), 2);
        assert_eq!(places[0].coordinates, Coordinates::new(44.5588, -80.344));

        assert!(backend.fetch_user_places().await.unwrap().is_empty());

        backend.update_user_places(&places).await.unwrap();
        assert_eq!(
            writes.lock().unwrap().as_slice(),
            &[json!({ "places": ["p1", "p2"] })]
        );
    });
}

#[test]
fn non_success_status_is_server_error() {
    block_on(async {
        let app = Router::new()
            .route("/places", get(broken))
            .route("/user-places", get(user_places));

        let backend = PlacesBackend::new(spawn(app));

        let err = backend.fetch_available_places().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Server(500));
        assert_eq!(err.message, "Could not read places.");

        // no PUT route: 405 without a message body
        let err = backend.update_user_places(&[]).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Server(405));
        assert_eq!(err.message, "Method Not Allowed");
    });
}

#[test]
fn unexpected_payload_is_validation_error() {
    block_on(async {
        let app = Router::new().route("/user-places", get(malformed));
        let backend = PlacesBackend::new(spawn(app));

        let err = backend.fetch_user_places().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    });
}

#[test]
fn unreachable_backend_is_network_error() {
    let addr = TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap();

    block_on(async {
        let backend = PlacesBackend::new(format!("http://{}", addr));

        let err = backend.fetch_available_places().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Network);
    });
}
