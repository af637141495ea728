use secrecy::Secret;
use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use qr_console::services::api_client::{ApiError, QrApiClient};
use qr_console::services::card_renderer::DateFormatter;
use qr_console::services::listing::load_page;

fn client(server: &MockServer) -> QrApiClient {
    QrApiClient::new(&server.uri(), None)
        .unwrap()
        .with_token(Secret::new("tok".to_string()))
}

fn dates() -> DateFormatter {
    DateFormatter::from_utc_offset_hours(-6).unwrap()
}

fn record(id: &str, state: &str) -> Value {
    json!({
        "qrcode_id": id,
        "new_value": 10.0,
        "old_value": 0.0,
        "state": state,
        "creation_date": "2024-05-01T18:00:00Z",
        "used_date": null,
        "qr_image": "iVBORw0KGgo="
    })
}

#[tokio::test]
async fn test_second_page_with_reported_total() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/qrcodes"))
        .and(query_param("skip", "200"))
        .and(query_param("limit", "200"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-Total-Count", "450")
                .set_body_json(json!([
                    record("a", "valido"),
                    record("b", "usado"),
                    record("c", "valido"),
                    record("d", "expirado"),
                ])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let view = load_page(&client(&server), 2, 200, &dates()).await.unwrap();

    assert_eq!(view.stats.total, 4);
    assert_eq!(view.stats.valid, 2);
    assert_eq!(view.stats.used, 1);
    assert_eq!(view.stats.expired, 1);
    assert_eq!(view.stats.invalidated, 0);

    assert_eq!(view.pagination.page, 2);
    assert_eq!(view.pagination.total_pages, 3);
    assert!(view.pagination.has_previous());
    assert!(view.pagination.has_next());

    let ids: Vec<&str> = view.cards.iter().map(|c| c.qrcode_id.as_str()).collect();
    assert_eq!(ids, ["a", "b", "c", "d"]);
    assert_eq!(view.cards[0].creation_date, "2024-05-01 12:00:00");
    assert_eq!(
        view.cards[0].image_src.as_deref(),
        Some("data:image/png;base64,iVBORw0KGgo=")
    );
}

#[tokio::test]
async fn test_empty_collection() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/qrcodes"))
        .and(query_param("skip", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let view = load_page(&client(&server), 1, 200, &dates()).await.unwrap();

    assert!(view.cards.is_empty());
    assert_eq!(view.stats.total, 0);
    assert_eq!(view.pagination.total_pages, 1);
    assert!(!view.pagination.has_previous());
    assert!(!view.pagination.has_next());
}

#[tokio::test]
async fn test_page_zero_is_treated_as_first() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/qrcodes"))
        .and(query_param("skip", "0"))
        .and(query_param("limit", "2"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([record("a", "valido"), record("b", "valido")])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let view = load_page(&client(&server), 0, 2, &dates()).await.unwrap();

    // No total header and a full page: another page may follow.
    assert_eq!(view.pagination.page, 1);
    assert!(view.pagination.has_next());
}

#[tokio::test]
async fn test_listing_errors_propagate() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/qrcodes"))
        .and(query_param("skip", "0"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/qrcodes"))
        .and(query_param("skip", "200"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let client = client(&server);
    assert!(matches!(
        load_page(&client, 1, 200, &dates()).await,
        Err(ApiError::Unauthorized)
    ));
    match load_page(&client, 2, 200, &dates()).await {
        Err(ApiError::Status { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "upstream down");
        }
        other => panic!("unexpected result: {:?}", other.map(|v| v.stats)),
    }
}
