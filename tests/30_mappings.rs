mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::{json, Value};

use common::TestApp;

fn mapping(name: &str, is_default: bool) -> Value {
    json!({
        "name": name,
        "description": "Exportação da loja",
        "mappingData": { "Produto": "formNorm", "Qtd": "quantidade" },
        "isDefault": is_default,
    })
}

async fn create(app: &TestApp, token: &str, name: &str, is_default: bool) -> Result<String> {
    let (status, body) = app.post("/mappings", Some(token), mapping(name, is_default)).await?;
    anyhow::ensure!(status == StatusCode::CREATED, "create failed: {} {}", status, body);
    Ok(body["mapping"]["id"].as_str().unwrap_or_default().to_string())
}

fn defaults(body: &Value) -> Vec<String> {
    body["mappings"]
        .as_array()
        .into_iter()
        .flatten()
        .filter(|m| m["isDefault"] == true)
        .map(|m| m["id"].as_str().unwrap_or_default().to_string())
        .collect()
}

#[tokio::test]
async fn create_list_get_update_delete() -> Result<()> {
    let app = TestApp::new()?;
    let token = app.register("Ana", "ana@farmacia.com").await?;

    let id = create(&app, &token, "Padrão", false).await?;

    let (status, body) = app.get("/mappings", &token).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mappings"].as_array().map(Vec::len), Some(1));

    let (status, body) = app.get(&format!("/mappings/{}", id), &token).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mapping"]["mappingData"]["Produto"], "formNorm");

    let (status, body) = app
        .put(&format!("/mappings/{}", id), &token, Some(json!({ "name": "Renomeado" })))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mapping"]["name"], "Renomeado");
    assert_eq!(body["mapping"]["description"], "Exportação da loja");

    let (status, _) = app.delete(&format!("/mappings/{}", id), &token).await?;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.get(&format!("/mappings/{}", id), &token).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Mapeamento não encontrado");
    Ok(())
}

#[tokio::test]
async fn mapping_data_must_be_an_object_of_strings() -> Result<()> {
    let app = TestApp::new()?;
    let token = app.register("Ana", "ana@farmacia.com").await?;

    let (status, body) = app
        .post("/mappings", Some(&token), json!({ "name": "X", "mappingData": { "Qtd": 3 } }))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    Ok(())
}

#[tokio::test]
async fn names_are_checked_after_sanitising() -> Result<()> {
    let app = TestApp::new()?;
    let token = app.register("Ana", "ana@farmacia.com").await?;

    let (status, body) = app
        .post(
            "/mappings",
            Some(&token),
            json!({ "name": "<script>x</script>", "mappingData": { "Produto": "formNorm" } }),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"], json!(["Nome deve ter pelo menos 1 caracteres"]));

    let (_, body) = app.get("/mappings", &token).await?;
    assert_eq!(body["mappings"], json!([]));
    Ok(())
}

#[tokio::test]
async fn other_owners_mappings_look_nonexistent() -> Result<()> {
    let app = TestApp::new()?;
    let ana = app.register("Ana", "ana@farmacia.com").await?;
    let bruno = app.register("Bruno", "bruno@farmacia.com").await?;
    let id = create(&app, &bruno, "Do Bruno", false).await?;
    let missing = uuid::Uuid::new_v4();

    let foreign = app.get(&format!("/mappings/{}", id), &ana).await?;
    let absent = app.get(&format!("/mappings/{}", missing), &ana).await?;
    assert_eq!(foreign.0, StatusCode::NOT_FOUND);
    assert_eq!(foreign, absent);

    let update = json!({ "name": "Roubado" });
    assert_eq!(
        app.put(&format!("/mappings/{}", id), &ana, Some(update)).await?.0,
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        app.put(&format!("/mappings/{}/default", id), &ana, None).await?.0,
        StatusCode::NOT_FOUND
    );
    assert_eq!(app.delete(&format!("/mappings/{}", id), &ana).await?.0, StatusCode::NOT_FOUND);

    // Bruno's mapping is untouched
    let (status, body) = app.get(&format!("/mappings/{}", id), &bruno).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mapping"]["name"], "Do Bruno");
    assert_eq!(body["mapping"]["isDefault"], false);
    Ok(())
}

#[tokio::test]
async fn malformed_ids_are_not_found() -> Result<()> {
    let app = TestApp::new()?;
    let token = app.register("Ana", "ana@farmacia.com").await?;

    let (status, _) = app.get("/mappings/not-a-uuid", &token).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn set_default_leaves_exactly_one_default() -> Result<()> {
    let app = TestApp::new()?;
    let token = app.register("Ana", "ana@farmacia.com").await?;

    let first = create(&app, &token, "Primeiro", true).await?;
    let second = create(&app, &token, "Segundo", true).await?;

    let (_, body) = app.get("/mappings", &token).await?;
    assert_eq!(defaults(&body), vec![second.clone()]);
    // Default is listed first
    assert_eq!(body["mappings"][0]["id"], second.as_str());

    let (status, _) = app.put(&format!("/mappings/{}/default", first), &token, None).await?;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.get("/mappings", &token).await?;
    assert_eq!(defaults(&body), vec![first]);
    Ok(())
}

#[tokio::test]
async fn concurrent_set_default_calls_settle_on_one() -> Result<()> {
    let app = std::sync::Arc::new(TestApp::new()?);
    let token = app.register("Ana", "ana@farmacia.com").await?;

    let mut ids = Vec::new();
    for i in 0..6 {
        ids.push(create(&app, &token, &format!("Mapa {}", i), false).await?);
    }

    let mut handles = Vec::new();
    for id in ids.clone() {
        let app = app.clone();
        let token = token.clone();
        handles.push(tokio::spawn(async move {
            app.put(&format!("/mappings/{}/default", id), &token, None).await
        }));
    }
    for handle in handles {
        let (status, _) = handle.await??;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, body) = app.get("/mappings", &token).await?;
    let defaults = defaults(&body);
    assert_eq!(defaults.len(), 1);
    assert!(ids.contains(&defaults[0]));
    Ok(())
}
