mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;
use serde_json::json;

#[tokio::test]
async fn seeded_categories_are_listed() {
    let app = TestApp::new().await;

    let (status, body) = app
        .send(Method::GET, "/api/kategoriler", None, Some(&app.regular_token()))
        .await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(names.len(), 6);
    assert!(names.contains(&"Şarküteri"));
}

#[tokio::test]
async fn category_mutations_follow_roles() {
    let app = TestApp::new().await;
    let payload = json!({ "name": "Sakatat", "description": "Ciğer, işkembe" });

    let (status, _) = app
        .send(Method::POST, "/api/kategoriler", Some(payload.clone()), Some(&app.regular_token()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .send(Method::POST, "/api/kategoriler", Some(payload.clone()), Some(&app.clerk_token()))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["data"]["id"].as_i64().unwrap();

    let (status, _) = app
        .send(Method::POST, "/api/kategoriler", Some(payload), Some(&app.clerk_token()))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app
        .send(
            Method::PUT,
            &format!("/api/kategoriler/{}", id),
            Some(json!({ "description": null })),
            Some(&app.clerk_token()),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["description"].is_null());
    assert_eq!(body["data"]["name"], "Sakatat");

    let (status, _) = app
        .send(Method::DELETE, &format!("/api/kategoriler/{}", id), None, Some(&app.clerk_token()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(Method::DELETE, &format!("/api/kategoriler/{}", id), None, Some(&app.admin_token()))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn supplier_crud() {
    let app = TestApp::new().await;
    let clerk = app.clerk_token();

    let (status, _) = app
        .send(Method::POST, "/api/tedarikciler", Some(json!({ "phone": "0212" })), Some(&clerk))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(
            Method::POST,
            "/api/tedarikciler",
            Some(json!({ "name": "Bozuk", "email": "not-an-email" })),
            Some(&clerk),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, created) = app
        .send(
            Method::POST,
            "/api/tedarikciler",
            Some(json!({
                "name": "Anadolu Besicilik",
                "phone": "0312 444 55 66",
                "email": "siparis@anadolubesi.com",
                "tax_number": "9876543210"
            })),
            Some(&clerk),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["data"]["id"].as_i64().unwrap();
    let path = format!("/api/tedarikciler/{}", id);

    let (status, fetched) = app
        .send(Method::GET, &path, None, Some(&app.regular_token()))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["data"]["tax_number"], "9876543210");

    let (status, updated) = app
        .send(
            Method::PUT,
            &path,
            Some(json!({ "phone": null, "notes": "Cuma teslimat" })),
            Some(&clerk),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(updated["data"]["phone"].is_null());
    assert_eq!(updated["data"]["notes"], "Cuma teslimat");
    assert_eq!(updated["data"]["name"], "Anadolu Besicilik");

    let (_, listed) = app
        .send(Method::GET, "/api/tedarikciler?search=anadolu", None, Some(&clerk))
        .await;
    assert_eq!(listed["data"]["pagination"]["total"], 1);

    let (status, _) = app.send(Method::DELETE, &path, None, Some(&clerk)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app
        .send(Method::DELETE, &path, None, Some(&app.admin_token()))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.send(Method::GET, &path, None, Some(&clerk)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
