use secrecy::{ExposeSecret, Secret};
use serde_json::json;
use wiremock::matchers::{body_json, body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use qr_console::models::auth::RegisterForm;
use qr_console::models::QrState;
use qr_console::services::api_client::{ApiError, QrApiClient};

fn anonymous(server: &MockServer) -> QrApiClient {
    QrApiClient::new(&server.uri(), None).unwrap()
}

fn authorized(server: &MockServer) -> QrApiClient {
    anonymous(server).with_token(Secret::new("tok".to_string()))
}

#[tokio::test]
async fn test_login_posts_form_and_reads_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("username=ana"))
        .and(body_string_contains("password=s3cret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "abc.def",
            "token_type": "bearer",
            "full_name": "Ana Perez",
            "role": "admin"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let token = anonymous(&server)
        .login("ana", &Secret::new("s3cret".to_string()))
        .await
        .unwrap();

    assert_eq!(token.access_token.expose_secret(), "abc.def");
    assert_eq!(token.full_name, "Ana Perez");
    assert_eq!(token.role, "admin");
}

#[tokio::test]
async fn test_login_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "detail": "Incorrect username or password"
        })))
        .mount(&server)
        .await;

    let result = anonymous(&server)
        .login("ana", &Secret::new("wrong".to_string()))
        .await;

    assert!(matches!(result, Err(ApiError::Unauthorized)));
}

#[tokio::test]
async fn test_register_surfaces_detail_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/register"))
        .and(body_json(json!({
            "username": "ana",
            "password": "s3cret",
            "full_name": "Ana Perez",
            "role": "operator"
        })))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "detail": "Username already registered"
        })))
        .mount(&server)
        .await;

    let form = RegisterForm {
        username: "ana".to_string(),
        password: Secret::new("s3cret".to_string()),
        full_name: "Ana Perez".to_string(),
        role: "operator".to_string(),
    };
    let err = anonymous(&server).register(&form).await.unwrap_err();

    match err {
        ApiError::Status { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "Username already registered");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_get_qr_sends_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/qrdata/Xk29aPq1"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "qrcode_id": "Xk29aPq1",
            "new_value": 5.0,
            "old_value": null,
            "state": "usado",
            "creation_date": "2024-05-01T00:00:00",
            "used_date": "2024-05-02T15:00:00",
            "qr_image": null
        })))
        .mount(&server)
        .await;

    let record = authorized(&server).get_qr("Xk29aPq1").await.unwrap();

    assert_eq!(record.qrcode_id, "Xk29aPq1");
    assert_eq!(record.old_value, 0.0);
    assert_eq!(record.known_state(), Some(QrState::Used));
    assert_eq!(record.used_date.as_deref(), Some("2024-05-02T15:00:00"));
}

#[tokio::test]
async fn test_get_qr_not_found_and_expired_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/qrdata/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "QR no encontrado"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/qrdata/any"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let client = authorized(&server);
    assert!(matches!(
        client.get_qr("missing").await,
        Err(ApiError::NotFound)
    ));
    let err = client.get_qr("any").await.unwrap_err();
    assert!(err.is_unauthorized());
}

#[tokio::test]
async fn test_list_passes_skip_and_limit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/qrcodes"))
        .and(query_param("skip", "400"))
        .and(query_param("limit", "200"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-Total-Count", "401")
                .set_body_json(json!([{
                    "qrcode_id": "last",
                    "new_value": 1.0,
                    "old_value": 0.0,
                    "state": "valido",
                    "creation_date": "2024-05-01T00:00:00"
                }])),
        )
        .mount(&server)
        .await;

    let page = authorized(&server).list_qr(400, 200).await.unwrap();

    assert_eq!(page.records.len(), 1);
    assert_eq!(page.total, Some(401));
}

#[tokio::test]
async fn test_list_non_array_body_is_empty_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/qrcodes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
        .mount(&server)
        .await;

    let page = authorized(&server).list_qr(0, 200).await.unwrap();

    assert!(page.records.is_empty());
    assert_eq!(page.total, None);
}

#[tokio::test]
async fn test_delete_by_state_uses_wire_value() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/qrdata/state/usado"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "12 QR codes deleted"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let deleted = authorized(&server)
        .delete_by_state(QrState::Used)
        .await
        .unwrap();

    assert_eq!(deleted.message, "12 QR codes deleted");
}

#[tokio::test]
async fn test_exchange_reports_backend_refusal() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/qrdata/exchange/Xk29aPq1"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "detail": "El QR ya fue usado"
        })))
        .mount(&server)
        .await;

    let err = authorized(&server)
        .exchange_qr("Xk29aPq1")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ApiError::Status { status: 400, ref message } if message == "El QR ya fue usado"
    ));
}
