// handlers/protected/mappings.rs - Column mapping CRUD for the caller

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::database::models::AuditAction;
use crate::handlers::or_not_found;
use crate::middleware::{ApiResponse, ApiResult, ClientInfo, Principal};
use crate::state::AppState;
use crate::validation::schemas::{MappingCreate, MappingUpdate, MAPPING_CREATE, MAPPING_UPDATE};

const MAPPING_NOT_FOUND: &str = "Mapeamento não encontrado";

/// GET /mappings - Caller's mappings, default first, then newest
pub async fn list(State(state): State<AppState>, principal: Principal) -> ApiResult<Value> {
    let mappings = state.store.list_mappings(principal.id).await?;
    Ok(ApiResponse::success(json!({ "mappings": mappings })))
}

/**
 * POST /mappings - Save a header-to-field mapping
 *
 * Expected Input:
 * ```json
 * {
 *   "name": "Planilha padrão",
 *   "description": "Exportação do sistema da loja",
 *   "mappingData": { "Produto": "formNorm", "Qtd": "quantidade" },
 *   "isDefault": true
 * }
 * ```
 *
 * Expected Output (201):
 * ```json
 * { "success": true, "mapping": { "id": "uuid", "isDefault": true, ... } }
 * ```
 */
pub async fn create(
    State(state): State<AppState>,
    principal: Principal,
    client: ClientInfo,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(body) = body?;
    let mapping = MAPPING_CREATE.parse::<MappingCreate>(body)?.into_new_mapping();

    let mapping = state.store.create_mapping(principal.id, mapping).await?;
    state
        .audit
        .record(
            Some(principal.id),
            AuditAction::MappingCreated,
            &client,
            json!({ "mappingId": mapping.id, "name": mapping.name }),
        )
        .await;

    Ok(ApiResponse::created(json!({ "mapping": mapping })))
}

/// GET /mappings/:id
pub async fn get(
    State(state): State<AppState>,
    principal: Principal,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Value> {
    let Path(id) = id?;
    let mapping = state
        .store
        .find_mapping(principal.id, id)
        .await
        .map_err(or_not_found(MAPPING_NOT_FOUND))?;
    Ok(ApiResponse::success(json!({ "mapping": mapping })))
}

/// PUT /mappings/:id - Partial update of name, description and mappingData
pub async fn update(
    State(state): State<AppState>,
    principal: Principal,
    client: ClientInfo,
    id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Value> {
    let Path(id) = id?;
    let Json(body) = body?;
    let changes = MAPPING_UPDATE.parse::<MappingUpdate>(body)?.into_changes();

    let mapping = state
        .store
        .update_mapping(principal.id, id, changes)
        .await
        .map_err(or_not_found(MAPPING_NOT_FOUND))?;

    state
        .audit
        .record(Some(principal.id), AuditAction::MappingUpdated, &client, json!({ "mappingId": id }))
        .await;

    Ok(ApiResponse::success(json!({ "mapping": mapping })))
}

/// DELETE /mappings/:id
pub async fn delete(
    State(state): State<AppState>,
    principal: Principal,
    client: ClientInfo,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Value> {
    let Path(id) = id?;
    state
        .store
        .delete_mapping(principal.id, id)
        .await
        .map_err(or_not_found(MAPPING_NOT_FOUND))?;

    state
        .audit
        .record(Some(principal.id), AuditAction::MappingDeleted, &client, json!({ "mappingId": id }))
        .await;

    Ok(ApiResponse::success(json!({ "message": "Mapeamento excluído com sucesso" })))
}

/// PUT /mappings/:id/default - Make this the caller's only default mapping
pub async fn set_default(
    State(state): State<AppState>,
    principal: Principal,
    client: ClientInfo,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Value> {
    let Path(id) = id?;
    state
        .store
        .set_default_mapping(principal.id, id)
        .await
        .map_err(or_not_found(MAPPING_NOT_FOUND))?;

    state
        .audit
        .record(Some(principal.id), AuditAction::MappingDefaultSet, &client, json!({ "mappingId": id }))
        .await;

    Ok(ApiResponse::success(json!({ "message": "Mapeamento padrão definido com sucesso" })))
}
