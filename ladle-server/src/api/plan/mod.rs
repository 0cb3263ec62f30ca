//! Plan API 模块
//!
//! # 路由列表
//!
//! | 路径 | 方法 | 说明 |
//! |------|------|------|
//! | /api/plan | GET | 列出日期范围内的条目 |
//! | /api/plan | POST | 创建条目 |
//! | /api/plan/{id} | PUT | 更新条目标题 (fire-and-forget) |
//! | /api/plan/{id} | DELETE | 删除条目 |
//! | /api/plan/{id}/move | POST | 移动条目 |
//! | /api/plan/feed | GET | 实时事件流 (SSE) |
//!
//! 全部路由要求 `x-ladle-user` 身份头。

mod feed;
mod handler;

use axum::{Router, middleware, routing::get, routing::post};

use crate::api::identity::resolve_identity;
use crate::core::ServerState;

pub fn router(state: ServerState) -> Router<ServerState> {
    Router::new().nest("/api/plan", routes(state))
}

fn routes(state: ServerState) -> Router<ServerState> {
    Router::new()
        .route("/", get(handler::list).post(handler::create))
        .route(
            "/{id}",
            axum::routing::put(handler::update).delete(handler::delete),
        )
        .route("/{id}/move", post(handler::move_entry))
        .route("/feed", get(feed::stream))
        .layer(middleware::from_fn_with_state(state, resolve_identity))
}
