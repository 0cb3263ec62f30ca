//! Ladle Server - 家庭餐食计划同步服务
//!
//! # 架构概述
//!
//! 本模块是 Ladle 服务端的主入口，提供以下核心功能：
//!
//! - **计划引擎** (`plan`): 餐食条目的桶内排序与移动算法
//! - **存储** (`plan::store`): 嵌入式 redb 持久化
//! - **实时广播** (`plan::broadcast`): 按家庭分组的事件扇出
//! - **目录** (`directory`): 家庭成员与菜谱元数据解析
//! - **HTTP API** (`api`): RESTful 接口 + SSE 事件流
//!
//! # 模块结构
//!
//! ```text
//! ladle-server/src/
//! ├── core/          # 配置、状态、服务器生命周期
//! ├── directory/     # 家庭与菜谱目录
//! ├── plan/          # 存储、排序引擎、服务层、广播
//! ├── api/           # HTTP 路由和处理器
//! └── utils/         # 错误映射、日志
//! ```

pub mod api;
pub mod core;
pub mod directory;
pub mod plan;
pub mod utils;

// Re-export 公共类型
pub use api::{CurrentUser, IDENTITY_HEADER};
pub use core::{Config, Server, ServerState};
pub use directory::{HouseholdDirectory, InMemoryHouseholds, InMemoryRecipes, RecipeDirectory};
pub use plan::{PlanBroadcaster, PlanEngine, PlanError, PlanService, PlanStore};
pub use utils::{AppError, AppResult};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};

pub fn print_banner() {
    println!(
        r#"
    __              ____
   / /   ____ _____/ / /__
  / /   / __ `/ __  / / _ \
 / /___/ /_/ / /_/ / /  __/
/_____/\__,_/\__,_/_/\___/
    "#
    );
}
