mod common;

use std::io::Cursor;

use anyhow::Result;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use calamine::{open_workbook_auto_from_rs, Reader};
use serde_json::{json, Value};

use common::{multipart_upload, read_bytes, read_json, sample_workbook, TestApp};

fn export_request(format: Option<&str>, body: Value) -> Result<Request<Body>> {
    let uri = match format {
        Some(format) => format!("/export-report?format={}", format),
        None => "/export-report".to_string(),
    };
    Ok(Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&body)?))?)
}

#[tokio::test]
async fn preview_returns_headers_and_bounded_rows() -> Result<()> {
    let app = TestApp::new()?;
    let response = app.send(multipart_upload("Producao.XLSX", &sample_workbook(30)?)?).await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await?;
    assert_eq!(body["fileName"], "Producao.XLSX");
    assert_eq!(body["sheetName"], "Produção");
    assert_eq!(body["totalRows"], 31);
    assert_eq!(body["headers"], json!(["Produto", "Quantidade"]));
    assert_eq!(body["previewData"].as_array().map(Vec::len), Some(20));
    assert_eq!(body["sampleRows"].as_array().map(Vec::len), Some(5));
    assert_eq!(body["sampleRows"][0][0], "Cápsula 1");
    Ok(())
}

#[tokio::test]
async fn preview_of_a_short_sheet_has_fewer_samples() -> Result<()> {
    let app = TestApp::new()?;
    let response = app.send(multipart_upload("curta.xlsx", &sample_workbook(2)?)?).await?;

    let body = read_json(response).await?;
    assert_eq!(body["previewData"].as_array().map(Vec::len), Some(3));
    assert_eq!(body["sampleRows"].as_array().map(Vec::len), Some(2));
    Ok(())
}

#[tokio::test]
async fn preview_rejects_other_file_types() -> Result<()> {
    let app = TestApp::new()?;
    let response = app.send(multipart_upload("dados.csv", b"a,b\n1,2\n")?).await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await?;
    assert_eq!(body["success"], false);
    Ok(())
}

#[tokio::test]
async fn preview_rejects_corrupt_workbooks() -> Result<()> {
    let app = TestApp::new()?;
    let response = app.send(multipart_upload("quebrada.xlsx", b"not a zip")?).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn csv_export_quotes_every_field() -> Result<()> {
    let app = TestApp::new()?;
    let response = app
        .send(export_request(
            Some("csv"),
            json!({ "items": [{ "formNorm": "F1", "quantidade": 5, "valor": 10 }] }),
        )?)
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(disposition.starts_with("attachment;"));
    assert!(disposition.contains(".csv"));

    let bytes = read_bytes(response).await?;
    let text = String::from_utf8(bytes)?;
    let text = text.trim_start_matches('\u{feff}');
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(
        lines[0],
        "\"Forma Normalizada\",\"Descrição\",\"Vendedor\",\"Data\",\"Quantidade\",\"Valor\",\"Cliente\",\"Categoria\""
    );
    assert_eq!(lines[1], "\"F1\",\"\",\"\",\"\",\"5\",\"10\",\"\",\"Não mapeado\"");
    Ok(())
}

#[tokio::test]
async fn xlsx_is_the_default_export() -> Result<()> {
    let app = TestApp::new()?;
    let response = app
        .send(export_request(
            None,
            json!({ "items": [{ "formNorm": "F1", "quantidade": 5, "valor": 10, "categoria": "Cápsulas" }] }),
        )?)
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()),
        Some("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet")
    );

    let bytes = read_bytes(response).await?;
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;
    assert_eq!(workbook.sheet_names(), vec!["Relatório".to_string()]);

    let range = workbook.worksheet_range("Relatório")?;
    let header: Vec<String> = range
        .rows()
        .next()
        .map(|row| row.iter().map(|c| c.to_string()).collect())
        .unwrap_or_default();
    assert_eq!(header[0], "Forma Normalizada");
    assert_eq!(header[7], "Categoria");
    assert_eq!(range.height(), 2);
    Ok(())
}

#[tokio::test]
async fn export_rejects_unknown_formats_and_empty_items() -> Result<()> {
    let app = TestApp::new()?;

    let response = app
        .send(export_request(Some("pdf"), json!({ "items": [{ "formNorm": "F1" }] }))?)
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app.send(export_request(Some("csv"), json!({ "items": [] }))?).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await?;
    assert_eq!(body["details"][0], "Nenhum item para exportar");
    Ok(())
}
