mod common;

use common::{spawn_app, TestApp};
use serde_json::{json, Value};

async fn create(app: &TestApp, token: &str, body: Value) -> reqwest::Response {
    app.client
        .post(app.url("/reservas"))
        .bearer_auth(token)
        .json(&body)
        .send()
        .await
        .expect("Failed to execute request.")
}

async fn get_json(app: &TestApp, token: &str, path: &str) -> (u16, Value) {
    let response = app
        .client
        .get(app.url(path))
        .bearer_auth(token)
        .send()
        .await
        .expect("Failed to execute request.");
    let status = response.status().as_u16();
    (status, response.json().await.unwrap_or(Value::Null))
}

#[tokio::test]
async fn reservas_require_authentication() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(app.url("/reservas"))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(401, response.status().as_u16());
}

#[tokio::test]
async fn create_returns_201_with_defaults() {
    let app = spawn_app().await;
    let token = app.access_token_for("owner@example.com").await;

    let response = create(
        &app,
        &token,
        json!({ "nombreUsuario": "Ana", "descripcion": "Spinning 7am" }),
    )
    .await;

    assert_eq!(201, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!("Ana", body["nombreUsuario"]);
    assert_eq!("Spinning 7am", body["descripcion"]);
    assert_eq!("ACTIVA", body["estado"]);
    assert!(body["dueDate"].is_null());
}

#[tokio::test]
async fn create_returns_400_for_invalid_body() {
    let app = spawn_app().await;
    let token = app.access_token_for("invalid@example.com").await;
    let test_cases = vec![
        (json!({ "nombreUsuario": "" }), "empty holder name"),
        (json!({ "descripcion": "no holder" }), "missing holder name"),
        (json!({ "nombreUsuario": "Ana", "estado": "TODAS" }), "unknown status"),
    ];

    for (body, description) in test_cases {
        let response = create(&app, &token, body).await;
        assert_eq!(
            400,
            response.status().as_u16(),
            "The API did not fail with 400 Bad Request for {}.",
            description
        );
    }
}

#[tokio::test]
async fn reservas_are_scoped_to_their_owner() {
    let app = spawn_app().await;
    let alice = app.access_token_for("alice@example.com").await;
    let bob = app.access_token_for("bob@example.com").await;

    let created: Value = create(&app, &alice, json!({ "nombreUsuario": "Alice" }))
        .await
        .json()
        .await
        .unwrap();
    let path = format!("/reservas/{}", created["id"].as_str().unwrap());

    let (status, _) = get_json(&app, &bob, &path).await;
    assert_eq!(404, status);

    let (status, list) = get_json(&app, &bob, "/reservas").await;
    assert_eq!(200, status);
    assert_eq!(0, list.as_array().unwrap().len());

    let patch = app
        .client
        .patch(app.url(&path))
        .bearer_auth(&bob)
        .json(&json!({ "estado": "CANCELADA" }))
        .send()
        .await
        .unwrap();
    assert_eq!(404, patch.status().as_u16());

    let delete = app
        .client
        .delete(app.url(&path))
        .bearer_auth(&bob)
        .send()
        .await
        .unwrap();
    assert_eq!(404, delete.status().as_u16());

    let (status, own) = get_json(&app, &alice, &path).await;
    assert_eq!(200, status);
    assert_eq!("ACTIVA", own["estado"]);
}

#[tokio::test]
async fn patch_distinguishes_null_from_missing() {
    let app = spawn_app().await;
    let token = app.access_token_for("patch@example.com").await;

    let created: Value = create(
        &app,
        &token,
        json!({
            "nombreUsuario": "Ana",
            "descripcion": "Yoga",
            "dueDate": "2026-11-01T09:00:00Z"
        }),
    )
    .await
    .json()
    .await
    .unwrap();
    let path = format!("/reservas/{}", created["id"].as_str().unwrap());

    let response = app
        .client
        .patch(app.url(&path))
        .bearer_auth(&token)
        .json(&json!({ "dueDate": null, "estado": "COMPLETADA" }))
        .send()
        .await
        .unwrap();
    assert_eq!(200, response.status().as_u16());

    let updated: Value = response.json().await.unwrap();
    assert!(updated["dueDate"].is_null());
    assert_eq!("COMPLETADA", updated["estado"]);
    assert_eq!("Yoga", updated["descripcion"]);
    assert_eq!("Ana", updated["nombreUsuario"]);
}

#[tokio::test]
async fn delete_returns_ok_then_404() {
    let app = spawn_app().await;
    let token = app.access_token_for("delete@example.com").await;

    let created: Value = create(&app, &token, json!({ "nombreUsuario": "Ana" }))
        .await
        .json()
        .await
        .unwrap();
    let path = format!("/reservas/{}", created["id"].as_str().unwrap());

    let first = app
        .client
        .delete(app.url(&path))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(200, first.status().as_u16());
    assert_eq!(json!({ "ok": true }), first.json::<Value>().await.unwrap());

    let (status, _) = get_json(&app, &token, &path).await;
    assert_eq!(404, status);
}

#[tokio::test]
async fn list_is_newest_first_and_paginated() {
    let app = spawn_app().await;
    let token = app.access_token_for("pages@example.com").await;

    for i in 0..3 {
        let response = create(&app, &token, json!({ "nombreUsuario": format!("Slot {}", i) })).await;
        assert_eq!(201, response.status().as_u16());
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    let (_, all) = get_json(&app, &token, "/reservas").await;
    let names: Vec<&str> = all
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["nombreUsuario"].as_str().unwrap())
        .collect();
    assert_eq!(vec!["Slot 2", "Slot 1", "Slot 0"], names);

    let (_, page) = get_json(&app, &token, "/reservas?skip=1&take=1").await;
    let page = page.as_array().unwrap();
    assert_eq!(1, page.len());
    assert_eq!("Slot 1", page[0]["nombreUsuario"]);
}

#[tokio::test]
async fn admin_listing_requires_admin_role() {
    let app = spawn_app().await;
    let user = app.access_token_for("member@example.com").await;
    create(&app, &user, json!({ "nombreUsuario": "Member" })).await;

    let (status, body) = get_json(&app, &user, "/reservas/admin/all").await;
    assert_eq!(403, status);
    assert_eq!("FORBIDDEN", body["code"]);

    let admin = app.admin_access_token().await;
    let (status, body) = get_json(&app, &admin, "/reservas/admin/all").await;
    assert_eq!(200, status);
    assert_eq!(1, body.as_array().unwrap().len());
}

#[tokio::test]
async fn malformed_id_is_not_found() {
    let app = spawn_app().await;
    let token = app.access_token_for("badid@example.com").await;

    let (status, _) = get_json(&app, &token, "/reservas/not-a-uuid").await;
    assert_eq!(404, status);
}
