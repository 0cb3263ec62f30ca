//! Plan domain - store, ordering engine, fan-out and service
//!
//! # 模块结构
//!
//! - [`store`] - redb 存储层（条目表 + 桶索引表）
//! - [`engine`] - 排序引擎（create/delete/update/move，单事务执行）
//! - [`broadcast`] - 家庭主题事件广播
//! - [`service`] - 访问控制、编排与事件发布
//! - [`error`] - 领域错误

pub mod broadcast;
pub mod engine;
pub mod error;
pub mod service;
pub mod store;

pub use broadcast::PlanBroadcaster;
pub use engine::{DeleteOutcome, MoveOutcome, PlanEngine};
pub use error::{PlanError, PlanResult};
pub use service::{PlanService, UpdateHandle};
pub use store::{PlanStore, StoreError, StoreStats};
