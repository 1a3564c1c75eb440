mod common;

use axum::http::{Method, StatusCode};
use common::{dec_of, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;

async fn seeded_item(app: &TestApp, token: &str) -> i64 {
    let (status, body) = app
        .send(
            Method::POST,
            "/api/stoklar",
            Some(json!({ "product_name": "Dana Kıyma", "total_weight": 10, "remaining_weight": 10 })),
            Some(token),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    body["data"]["item"]["id"].as_i64().unwrap()
}

#[tokio::test]
async fn stale_version_is_conflict_and_writes_nothing() {
    let app = TestApp::new().await;
    let token = app.clerk_token();
    let id = seeded_item(&app, &token).await;
    let path = format!("/api/stoklar/{}", id);

    let (status, body) = app
        .send(
            Method::PUT,
            &path,
            Some(json!({ "remaining_weight": 8, "version": 1 })),
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["item"]["version"], 2);

    let (status, body) = app
        .send(
            Method::PUT,
            &path,
            Some(json!({ "remaining_weight": 5, "version": 1 })),
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);

    let (_, current) = app.send(Method::GET, &path, None, Some(&token)).await;
    assert_eq!(dec_of(&current["data"]["remaining_weight"]), dec!(8));
    assert_eq!(current["data"]["version"], 2);

    let (_, history) = app
        .send(Method::GET, &format!("{}/hareketler", path), None, Some(&token))
        .await;
    assert_eq!(history["data"]["pagination"]["total"], 2);
}

#[tokio::test]
async fn racing_updates_on_same_version_let_one_through() {
    let app = TestApp::new().await;
    let token = app.clerk_token();
    let id = seeded_item(&app, &token).await;
    let path = format!("/api/stoklar/{}", id);

    let (first, second) = tokio::join!(
        app.send(
            Method::PUT,
            &path,
            Some(json!({ "remaining_weight": 9, "version": 1 })),
            Some(&token),
        ),
        app.send(
            Method::PUT,
            &path,
            Some(json!({ "remaining_weight": 6, "version": 1 })),
            Some(&token),
        ),
    );

    let mut statuses = vec![first.0, second.0];
    statuses.sort();
    assert_eq!(statuses, vec![StatusCode::OK, StatusCode::CONFLICT]);

    let (_, history) = app
        .send(Method::GET, &format!("{}/hareketler", path), None, Some(&token))
        .await;
    assert_eq!(history["data"]["pagination"]["total"], 2);
}

#[tokio::test]
async fn unversioned_updates_apply_in_sequence() {
    let app = TestApp::new().await;
    let token = app.clerk_token();
    let id = seeded_item(&app, &token).await;
    let path = format!("/api/stoklar/{}", id);

    for remaining in [9, 7, 4] {
        let (status, _) = app
            .send(Method::PUT, &path, Some(json!({ "remaining_weight": remaining })), Some(&token))
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, current) = app.send(Method::GET, &path, None, Some(&token)).await;
    assert_eq!(current["data"]["version"], 4);
    assert_eq!(dec_of(&current["data"]["remaining_weight"]), dec!(4));

    let (_, history) = app
        .send(Method::GET, &format!("{}/hareketler?limit=10", path), None, Some(&token))
        .await;
    let quantities: Vec<_> = history["data"]["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| dec_of(&m["quantity"]))
        .collect();
    assert_eq!(quantities, vec![dec!(3), dec!(2), dec!(1), dec!(10)]);
}
