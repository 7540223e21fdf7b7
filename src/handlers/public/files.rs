// handlers/public/files.rs - POST /preview-excel and POST /export-report

use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::{JsonRejection, QueryRejection},
        Multipart, Query,
    },
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::Value;

use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::spreadsheet::{
    self, is_supported_workbook, ExportFormat, SpreadsheetError, WorkbookPreview,
};
use crate::validation::schemas::{ExportRequest, EXPORT};

/**
 * POST /preview-excel - Peek into an uploaded workbook
 *
 * Multipart form with a `file` part named `*.xlsx` or `*.xls`. Only the first
 * sheet is read.
 *
 * Expected Output:
 * ```json
 * {
 *   "success": true,
 *   "fileName": "producao.xlsx",
 *   "sheetName": "Planilha1",
 *   "totalRows": 152,
 *   "previewData": [["Produto", "Qtd"], ["Cápsula A", 10], ...],   // first 20 rows
 *   "headers": ["Produto", "Qtd"],
 *   "sampleRows": [["Cápsula A", 10], ...]                         // rows 2-6
 * }
 * ```
 */
pub async fn preview_excel(
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<WorkbookPreview> {
    let mut multipart = multipart?;

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        if !is_supported_workbook(&file_name) {
            return Err(SpreadsheetError::UnsupportedFile(file_name).into());
        }

        let bytes = field.bytes().await?;
        let preview = tokio::task::spawn_blocking(move || {
            spreadsheet::preview_workbook(&file_name, bytes.to_vec())
        })
        .await??;

        return Ok(ApiResponse::success(preview));
    }

    Err(ApiError::bad_request("Nenhum arquivo enviado"))
}

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    pub format: Option<String>,
}

/**
 * POST /export-report?format=csv|xlsx - Download processed items
 *
 * Expected Input:
 * ```json
 * { "items": [{ "formNorm": "F1", "quantidade": 5, "valor": 10, "categoria": "Cápsulas" }] }
 * ```
 *
 * Responds with the file itself (`Content-Disposition: attachment`). Default
 * format is xlsx; any other format or an empty item list is a 400.
 */
pub async fn export_report(
    query: Result<Query<ExportQuery>, QueryRejection>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    let format = match query.format.as_deref() {
        Some(format) => format.parse::<ExportFormat>()?,
        None => ExportFormat::default(),
    };

    let Json(body) = body?;
    let request: ExportRequest = EXPORT.parse(body)?;
    let item_count = request.items.len();

    let file =
        tokio::task::spawn_blocking(move || spreadsheet::export_report(&request.items, format))
            .await??;

    tracing::info!("Exported {} items as {}", item_count, format.extension());

    Ok((
        [
            (header::CONTENT_TYPE, file.content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file.file_name),
            ),
        ],
        file.bytes,
    )
        .into_response())
}
