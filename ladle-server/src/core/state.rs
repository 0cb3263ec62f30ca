use std::sync::Arc;

use crate::core::Config;
use crate::directory::{HouseholdDirectory, InMemoryHouseholds, InMemoryRecipes, RecipeDirectory};
use crate::plan::{PlanBroadcaster, PlanEngine, PlanService, PlanStore};

/// 服务器状态 - 持有所有服务的共享引用
///
/// ServerState 是组合根，使用 Arc 实现浅拷贝，克隆成本极低。
///
/// # 组件
///
/// | 字段 | 类型 | 说明 |
/// |------|------|------|
/// | config | Config | 配置项 (不可变) |
/// | store | PlanStore | redb 存储 |
/// | service | PlanService | 计划领域服务（引擎 + 目录 + 广播） |
///
/// # 使用示例
///
/// ```ignore
/// let state = ServerState::initialize(&config).await;
/// let app = api::app(state.clone());
/// ```
#[derive(Clone)]
pub struct ServerState {
    /// 服务器配置
    pub config: Config,
    /// 存储层（用于健康检查的统计读取）
    pub store: PlanStore,
    /// 计划领域服务
    pub service: PlanService,
}

impl ServerState {
    /// 创建服务器状态 (手动构造)
    ///
    /// 通常使用 [`ServerState::initialize`] 代替；测试需要注入自定义
    /// 目录实现时用本方法组装。
    pub fn new(config: Config, store: PlanStore, service: PlanService) -> Self {
        Self {
            config,
            store,
            service,
        }
    }

    /// 初始化服务器状态
    ///
    /// 按顺序初始化：
    /// 1. 数据目录（确保存在）
    /// 2. 存储 (data_dir/plan.redb)
    /// 3. 目录协作方（内存实现，代替外部系统）
    /// 4. 广播器与领域服务
    ///
    /// # Panics
    ///
    /// 数据目录或存储初始化失败时 panic
    pub async fn initialize(config: &Config) -> Self {
        std::fs::create_dir_all(&config.data_dir).expect("Failed to create data directory");

        let store =
            PlanStore::open(config.store_path()).expect("Failed to open plan store");

        let households: Arc<dyn HouseholdDirectory> = Arc::new(InMemoryHouseholds::demo());
        let recipes: Arc<dyn RecipeDirectory> = Arc::new(InMemoryRecipes::demo());
        let broadcaster = PlanBroadcaster::new(config.feed_capacity);
        let service = PlanService::new(
            PlanEngine::new(store.clone()),
            households,
            recipes,
            broadcaster,
        );

        Self::new(config.clone(), store, service)
    }
}
