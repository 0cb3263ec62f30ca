//! Plan API Handlers

use axum::{
    Json,
    extract::{Extension, Path, Query, State},
};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::api::identity::CurrentUser;
use crate::core::ServerState;
use crate::utils::{AppError, AppResult, ok};
use shared::ApiEnvelope;
use shared::plan::request::{
    CreateEntryRequest, CreatedReceipt, DeleteReceipt, EntryView, MoveEntryRequest, MoveReceipt,
    PlanRange, UpdateEntryRequest, UpdateReceipt,
};

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    start: NaiveDate,
    end: NaiveDate,
}

/// GET /api/plan?start=..&end=.. - 列出日期范围内的计划条目
pub async fn list(
    State(state): State<ServerState>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<RangeQuery>,
) -> AppResult<Json<ApiEnvelope<Vec<EntryView>>>> {
    let range = PlanRange::new(query.start, query.end)
        .map_err(|e| AppError::Validation(e.to_string()))?;
    let views = state.service.list(&user.user_id, range).await?;
    Ok(ok(views))
}

/// POST /api/plan - 创建条目（追加到桶尾）
pub async fn create(
    State(state): State<ServerState>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<CreateEntryRequest>,
) -> AppResult<Json<ApiEnvelope<CreatedReceipt>>> {
    let entry = state.service.create(&user.user_id, payload).await?;
    Ok(ok(CreatedReceipt { id: entry.id }))
}

/// PUT /api/plan/:id - 更新条目标题（fire-and-forget，结果走事件流）
pub async fn update(
    State(state): State<ServerState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateEntryRequest>,
) -> AppResult<Json<ApiEnvelope<UpdateReceipt>>> {
    // The handle is dropped: completion reaches clients as EntryUpdated
    // or UpdateFailed over the feed
    let _handle = state.service.update(&user.user_id, &id, payload).await?;
    Ok(ok(UpdateReceipt { success: true }))
}

/// DELETE /api/plan/:id - 删除条目并压实其桶
pub async fn delete(
    State(state): State<ServerState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiEnvelope<DeleteReceipt>>> {
    state.service.delete(&user.user_id, &id).await?;
    Ok(ok(DeleteReceipt { success: true }))
}

/// POST /api/plan/:id/move - 移动条目到目标桶/序号
pub async fn move_entry(
    State(state): State<ServerState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(payload): Json<MoveEntryRequest>,
) -> AppResult<Json<ApiEnvelope<MoveReceipt>>> {
    let outcome = state.service.move_entry(&user.user_id, &id, payload).await?;
    Ok(ok(MoveReceipt {
        success: true,
        moved: outcome.moved,
    }))
}
