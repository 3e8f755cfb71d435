use axum::{
    extract::{Multipart, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::post,
    Router,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use pharmstock_client::client::error::FALLBACK_MESSAGE;
use pharmstock_client::{AnalysisClient, AnalysisError, AnalysisResponse, ImageFile, MedicationInfo};

const PARACETAMOL_BODY: &str = r#"{"medications":[{"nom":"Paracetamol","laboratoire":"Lab A","date_peremption":"2025-01-01","numero_lot":"L123","nombre_unites":20,"confiance":0.95}],"success":true,"message":"OK"}"#;

/// What the fake backend saw of one upload.
#[derive(Debug, Clone, Default)]
struct Captured {
    fields: Vec<String>,
    file_name: Option<String>,
    content_type: Option<String>,
    bytes: Vec<u8>,
    query: HashMap<String, String>,
}

type Capture = Arc<Mutex<Option<Captured>>>;

async fn spawn(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// A backend answering every analysis with a fixed status and body.
async fn spawn_fixed(status: StatusCode, body: &'static str) -> String {
    let app = Router::new().route(
        "/analyze-medication",
        post(move || async move {
            (status, [(header::CONTENT_TYPE, "application/json")], body)
        }),
    );
    spawn(app).await
}

async fn capture_upload(
    State(capture): State<Capture>,
    Query(query): Query<HashMap<String, String>>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let mut captured = Captured {
        query,
        ..Captured::default()
    };
    while let Some(field) = multipart.next_field().await.unwrap() {
        captured.fields.push(field.name().unwrap_or_default().to_string());
        captured.file_name = field.file_name().map(str::to_string);
        captured.content_type = field.content_type().map(str::to_string);
        captured.bytes = field.bytes().await.unwrap().to_vec();
    }
    *capture.lock().unwrap() = Some(captured);

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        PARACETAMOL_BODY,
    )
}

fn jpeg() -> ImageFile {
    ImageFile::new("boite.jpg", "image/jpeg", vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10])
}

#[tokio::test]
async fn test_success_is_returned_unchanged() {
    let base_url = spawn_fixed(StatusCode::OK, PARACETAMOL_BODY).await;
    let client = AnalysisClient::new(&base_url).unwrap();

    let response = client.analyze_medication(jpeg()).await.unwrap();

    assert_eq!(
        response,
        AnalysisResponse {
            medications: vec![MedicationInfo {
                name: "Paracetamol".to_string(),
                manufacturer: "Lab A".to_string(),
                expiration_date: "2025-01-01".to_string(),
                lot_number: "L123".to_string(),
                unit_count: 20,
                confidence: 0.95,
            }],
            success: true,
            message: "OK".to_string(),
        }
    );
}

#[tokio::test]
async fn test_medication_order_is_preserved() {
    let body = r#"{"medications":[
        {"nom":"C","laboratoire":"","date_peremption":"","numero_lot":"","nombre_unites":1,"confiance":0.1},
        {"nom":"A","laboratoire":"","date_peremption":"","numero_lot":"","nombre_unites":2,"confiance":0.2},
        {"nom":"B","laboratoire":"","date_peremption":"","numero_lot":"","nombre_unites":3,"confiance":0.3}
    ],"success":false,"message":""}"#;
    let base_url = spawn_fixed(StatusCode::OK, body).await;
    let client = AnalysisClient::new(&base_url).unwrap();

    let response = client.analyze_medication(jpeg()).await.unwrap();

    let names: Vec<&str> = response.medications.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, ["C", "A", "B"]);
    assert!(!response.success);
    assert_eq!(response.message, "");
}

#[tokio::test]
async fn test_empty_medication_list() {
    let base_url = spawn_fixed(
        StatusCode::OK,
        r#"{"medications":[],"success":true,"message":"Aucun médicament détecté"}"#,
    )
    .await;
    let client = AnalysisClient::new(&base_url).unwrap();

    let response = client.analyze_medication(jpeg()).await.unwrap();

    assert!(response.medications.is_empty());
    assert_eq!(response.message, "Aucun médicament détecté");
}

#[tokio::test]
async fn test_upload_is_a_single_file_part() {
    let capture: Capture = Arc::new(Mutex::new(None));
    let app = Router::new()
        .route("/analyze-medication", post(capture_upload))
        .with_state(capture.clone());
    let base_url = spawn(app).await;
    let client = AnalysisClient::new(&format!("{}/", base_url)).unwrap();

    client.analyze_medication(jpeg()).await.unwrap();

    let captured = capture.lock().unwrap().clone().unwrap();
    assert_eq!(captured.fields, ["file"]);
    assert_eq!(captured.file_name.as_deref(), Some("boite.jpg"));
    assert_eq!(captured.content_type.as_deref(), Some("image/jpeg"));
    assert_eq!(captured.bytes, jpeg().bytes);
    assert!(captured.query.is_empty());
}

#[tokio::test]
async fn test_session_is_sent_as_query_parameter() {
    let capture: Capture = Arc::new(Mutex::new(None));
    let app = Router::new()
        .route("/analyze-medication", post(capture_upload))
        .with_state(capture.clone());
    let base_url = spawn(app).await;
    let client = AnalysisClient::new(&base_url).unwrap();

    client
        .analyze_medication_in_session(jpeg(), "pharmacie-nord")
        .await
        .unwrap();

    let captured = capture.lock().unwrap().clone().unwrap();
    assert_eq!(
        captured.query.get("session_id").map(String::as_str),
        Some("pharmacie-nord")
    );
}

#[tokio::test]
async fn test_file_content_is_not_validated_locally() {
    let capture: Capture = Arc::new(Mutex::new(None));
    let app = Router::new()
        .route("/analyze-medication", post(capture_upload))
        .with_state(capture.clone());
    let base_url = spawn(app).await;
    let client = AnalysisClient::new(&base_url).unwrap();

    let notes = ImageFile::new("notes.txt", "text/plain", Vec::new());
    client.analyze_medication(notes).await.unwrap();

    let captured = capture.lock().unwrap().clone().unwrap();
    assert_eq!(captured.content_type.as_deref(), Some("text/plain"));
    assert!(captured.bytes.is_empty());
}

#[tokio::test]
async fn test_detail_is_the_error_message() {
    let base_url = spawn_fixed(
        StatusCode::UNPROCESSABLE_ENTITY,
        r#"{"detail":"Fichier invalide"}"#,
    )
    .await;
    let client = AnalysisClient::new(&base_url).unwrap();

    let err = client.analyze_medication(jpeg()).await.unwrap_err();

    assert_eq!(err.to_string(), "Fichier invalide");
    assert_eq!(
        err,
        AnalysisError::Server {
            status: 422,
            message: "Fichier invalide".to_string()
        }
    );
}

#[tokio::test]
async fn test_empty_error_body_uses_status_line() {
    let base_url = spawn_fixed(StatusCode::INTERNAL_SERVER_ERROR, "").await;
    let client = AnalysisClient::new(&base_url).unwrap();

    let err = client.analyze_medication(jpeg()).await.unwrap_err();

    assert_eq!(err.to_string(), "Erreur 500: Internal Server Error");
}

#[tokio::test]
async fn test_validation_error_list_is_not_a_detail() {
    let base_url = spawn_fixed(
        StatusCode::UNPROCESSABLE_ENTITY,
        r#"{"detail":[{"type":"missing","loc":["body","file"],"msg":"Field required"}]}"#,
    )
    .await;
    let client = AnalysisClient::new(&base_url).unwrap();

    let err = client.analyze_medication(jpeg()).await.unwrap_err();

    assert_eq!(err.to_string(), "Erreur 422: Unprocessable Entity");
}

#[tokio::test]
async fn test_unknown_route_uses_status_line() {
    let base_url = spawn(Router::new()).await;
    let client = AnalysisClient::new(&base_url).unwrap();

    let err = client.analyze_medication(jpeg()).await.unwrap_err();

    assert_eq!(err.to_string(), "Erreur 404: Not Found");
    assert_eq!(err.status(), Some(404));
}

#[tokio::test]
async fn test_connection_refused_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let client = AnalysisClient::new(&format!("http://{}", addr)).unwrap();

    let err = client.analyze_medication(jpeg()).await.unwrap_err();

    assert!(matches!(err, AnalysisError::Transport { .. }));
    assert!(err.to_string().starts_with("Erreur: "), "got: {}", err);
    assert_ne!(err.to_string(), FALLBACK_MESSAGE);
    assert_eq!(err.status(), None);
}

#[tokio::test]
async fn test_malformed_success_body_is_a_decode_error() {
    for body in ["not json", r#"{"medications":[],"success":true}"#, ""] {
        let base_url = spawn_fixed(StatusCode::OK, body).await;
        let client = AnalysisClient::new(&base_url).unwrap();

        let err = client.analyze_medication(jpeg()).await.unwrap_err();

        assert_eq!(err.to_string(), "Erreur 200: Http failure during parsing");
        assert!(matches!(err, AnalysisError::Decode { status: 200, .. }));
    }
}

#[tokio::test]
async fn test_concurrent_calls_are_independent() {
    let ok = spawn_fixed(StatusCode::OK, PARACETAMOL_BODY).await;
    let failing = spawn_fixed(StatusCode::BAD_REQUEST, r#"{"detail":"Le fichier doit être une image"}"#).await;
    let ok_client = AnalysisClient::new(&ok).unwrap();
    let failing_client = AnalysisClient::new(&failing).unwrap();

    let (first, second, third) = tokio::join!(
        ok_client.analyze_medication(jpeg()),
        failing_client.analyze_medication(jpeg()),
        ok_client.analyze_medication(jpeg()),
    );

    assert_eq!(first.unwrap().medications[0].name, "Paracetamol");
    assert_eq!(second.unwrap_err().to_string(), "Le fichier doit être une image");
    assert_eq!(third.unwrap().medications[0].name, "Paracetamol");
}

/// A backend that sends `reply` verbatim after the request headers, then hangs up.
async fn spawn_raw(reply: &'static [u8]) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }
        socket.write_all(reply).await.unwrap();
        socket.shutdown().await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_truncated_error_body_keeps_the_status() {
    let base_url = spawn_raw(
        b"HTTP/1.1 500 Internal Server Error\r\nContent-Length: 100\r\n\r\n{\"de",
    )
    .await;
    let client = AnalysisClient::new(&base_url).unwrap();

    let err = client.health().await.unwrap_err();

    assert_eq!(err.to_string(), "Erreur 500: Internal Server Error");
    assert_eq!(
        err,
        AnalysisError::Server {
            status: 500,
            message: "Erreur 500: Internal Server Error".to_string()
        }
    );
}

#[tokio::test]
async fn test_truncated_success_body_is_a_transport_error() {
    let base_url = spawn_raw(
        b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 100\r\n\r\n{\"me",
    )
    .await;
    let client = AnalysisClient::new(&base_url).unwrap();

    let err = client.health().await.unwrap_err();

    assert!(matches!(err, AnalysisError::Transport { .. }));
    assert!(err.to_string().starts_with("Erreur: "), "got: {}", err);
}
