//! API 路由模块
//!
//! # 结构
//!
//! - [`health`] - 健康检查
//! - [`plan`] - 计划条目接口与实时事件流
//! - [`identity`] - 身份解析中间件
//!
//! [`app`] 把全部路由组装为一个带状态的 [`axum::Router`]，测试可以
//! 直接对它发起 oneshot 请求，进程内客户端也以它为传输目标。

pub mod health;
pub mod identity;
pub mod plan;

use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::core::ServerState;

pub use identity::{CurrentUser, IDENTITY_HEADER};

/// Assemble the full application router
pub fn app(state: ServerState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(plan::router(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
