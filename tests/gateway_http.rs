use std::collections::HashMap;
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use reqwest::{Client, Url};
use serde_json::{json, Value};
use parlor_client::error::GatewayError;
use parlor_client::models::preferences::UserPreferences;
use parlor_client::models::search_request::SearchRequest;
use parlor_client::repositories::backend_repo::BackendRepo;
use parlor_client::repositories::gateway::{BackendGateway, HttpGateway};
use parlor_client::repositories::image_probe::{HttpImageProbe, ImageProbe};
use parlor_client::repositories::places_repo::{BackendPlacesProvider, PlacesProvider};

#[derive(Clone, Default)]
struct Recorded {
    bodies: Arc<Mutex<Vec<Value>>>,
}

fn restaurant(id: &str) -> Value {
    json!({
        "id": id,
        "name": "Joe's Pizza",
        "address": "7 Carmine St",
        "distance": 0.4,
        "rating": 4.6,
        "priceLevel": 1,
        "cuisine": ["pizza"],
        "latitude": 40.73,
        "longitude": -74.0,
        "photoUrl": "https://photos.example/joes.jpg"
    })
}

async fn recommendations(State(recorded): State<Recorded>, Json(body): Json<Value>) -> Json<Value> {
    recorded.bodies.lock().unwrap().push(body);
    Json(json!([restaurant("r1"), restaurant("r2")]))
}

async fn geocode() -> impl IntoResponse {
    (StatusCode::BAD_REQUEST, Json(json!({ "detail": "Geocoding failed: unknown address" })))
}

async fn summary(Path(id): Path<String>, Query(query): Query<HashMap<String, String>>) -> Json<Value> {
    Json(json!({
        "restaurantId": id,
        "summary": format!("hints={}", query.get("preferences").cloned().unwrap_or_default()),
        "highlights": ["Crispy"],
        "recommendations": ["Plain slice"]
    }))
}

async fn autocomplete(Query(query): Query<HashMap<String, String>>) -> impl IntoResponse {
    if query.get("session_token").map(String::as_str) == Some("revoked") {
        return (StatusCode::FORBIDDEN, Json(json!({ "detail": "key revoked" })));
    }
    (
        StatusCode::OK,
        Json(json!([
            {
                "place_id": "places/abc",
                "description": format!("{} Broadway, New York", query["input"]),
                "main_text": "Broadway",
                "secondary_text": "New York"
            },
            { "place_id": "", "description": "No id" },
            { "place_id": "def", "description": "  " }
        ])),
    )
}

async fn place_details(Path(id): Path<String>) -> Json<Value> {
    Json(json!({
        "id": id,
        "displayName": { "text": "1435 Broadway" },
        "location": { "latitude": 40.75, "longitude": -73.98 }
    }))
}

async fn photo() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "image/jpeg")], vec![0xff_u8, 0xd8, 0xff])
}

async fn not_a_photo() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/html")], "<html></html>")
}

fn serve(recorded: Recorded) -> Url {
    let app = Router::new()
        .route("/api/pizza-recommendations", post(recommendations))
        .route("/api/geocode", post(geocode))
        .route("/api/restaurants/:id/summary", get(summary))
        .route("/api/places/autocomplete", get(autocomplete))
        .route("/api/places/details/:id", get(place_details))
        .route("/photos/ok.jpg", get(photo))
        .route("/photos/page.jpg", get(not_a_photo))
        .with_state(recorded);

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::Server::from_tcp(listener)
            .unwrap()
            .serve(app.into_make_service())
            .await
            .unwrap();
    });
    Url::parse(&format!("http://{}/", address)).unwrap()
}

fn gateway(root: &Url) -> (Arc<dyn PlacesProvider>, HttpGateway) {
    let backend = BackendRepo::new(Client::new(), root.join("api").unwrap());
    let places: Arc<dyn PlacesProvider> = Arc::new(BackendPlacesProvider::new(backend.clone()));
    (places.clone(), HttpGateway::new(backend, places))
}

#[tokio::test]
async fn recommendations_are_posted_in_camel_case() {
    let recorded = Recorded::default();
    let root = serve(recorded.clone());
    let (_, gateway) = gateway(&root);
    let mut preferences = UserPreferences::default();
    preferences.toggle_dietary_restriction("Vegan");

    let restaurants = gateway
        .recommendations(&SearchRequest::for_address("7 Carmine St", &preferences))
        .await
        .unwrap();

    assert_eq!(restaurants.len(), 2);
    assert_eq!(restaurants[0].price_label(), "$");
    assert!(restaurants[0].ai_summary.is_none());

    let body = recorded.bodies.lock().unwrap()[0].clone();
    assert_eq!(body["address"], "7 Carmine St");
    assert_eq!(body["preferences"]["maxDistance"], 10);
    assert_eq!(body["preferences"]["dietaryRestrictions"], json!(["Vegan"]));
    assert!(body.get("latitude").is_none());
    assert!(body.get("offset").is_none());
}

#[tokio::test]
async fn backend_detail_is_surfaced_on_failure() {
    let root = serve(Recorded::default());
    let (_, gateway) = gateway(&root);

    let error = gateway.geocode("Nowhere").await.unwrap_err();

    assert!(matches!(error, GatewayError::Status { status: 400, .. }));
    assert_eq!(error.detail(), Some("Geocoding failed: unknown address"));
}

#[tokio::test]
async fn summary_carries_preference_hints() {
    let root = serve(Recorded::default());
    let (_, gateway) = gateway(&root);

    let hinted = gateway
        .summary("r1", &["Vegan".to_string(), "Neapolitan".to_string()])
        .await
        .unwrap();
    let plain = gateway.summary("r1", &[]).await.unwrap();

    assert_eq!(hinted.restaurant_id, "r1");
    assert_eq!(hinted.summary, "hints=Vegan,Neapolitan");
    assert_eq!(plain.summary, "hints=");
}

#[tokio::test]
async fn proxy_predictions_are_normalized() {
    let root = serve(Recorded::default());
    let (_, gateway) = gateway(&root);

    let predictions = gateway.autocomplete("1435", "token-1").await.unwrap();

    assert_eq!(predictions.len(), 1);
    assert_eq!(predictions[0].id, "abc");
    assert_eq!(predictions[0].description, "1435 Broadway, New York");
    assert_eq!(predictions[0].main_text.as_deref(), Some("Broadway"));

    let place = gateway.place_details("abc", "token-1").await.unwrap();
    assert_eq!(place.formatted_address, "1435 Broadway");
    assert_eq!(place.location.latitude, 40.75);
}

#[tokio::test]
async fn rejected_credentials_fire_auth_hooks() {
    let root = serve(Recorded::default());
    let (places, gateway) = gateway(&root);
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = fired.clone();
    places.auth_failures().register(move |failure| {
        assert_eq!(failure.status, 403);
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let error = gateway.autocomplete("1435", "revoked").await.unwrap_err();

    assert!(matches!(error, GatewayError::Unauthorized { status: 403, .. }));
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert!(gateway.autocomplete("1435", "token-2").await.is_ok());
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn image_probe_requires_image_bytes() {
    let root = serve(Recorded::default());
    let probe = HttpImageProbe::new(Client::new());

    assert!(probe.preload(root.join("photos/ok.jpg").unwrap().as_str()).await.is_ok());
    assert!(matches!(
        probe.preload(root.join("photos/page.jpg").unwrap().as_str()).await,
        Err(GatewayError::MalformedPayload(_))
    ));
    assert!(matches!(
        probe.preload(root.join("photos/missing.jpg").unwrap().as_str()).await,
        Err(GatewayError::Status { status: 404, .. })
    ));
}
