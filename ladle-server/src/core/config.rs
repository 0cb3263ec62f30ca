use std::path::PathBuf;

/// 服务器配置
///
/// # 环境变量
///
/// 所有配置项都可以通过环境变量覆盖：
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | LADLE_HTTP_PORT | 8420 | HTTP 服务端口 |
/// | LADLE_DATA_DIR | ./data | 数据目录（存放 plan.redb） |
/// | LADLE_LOG_DIR | (无) | 日志目录，设置后写入滚动日志文件 |
/// | LADLE_FEED_CAPACITY | 256 | 每个家庭事件通道的容量 |
/// | LADLE_ENVIRONMENT | development | 运行环境 |
///
/// # 示例
///
/// ```ignore
/// LADLE_DATA_DIR=/var/lib/ladle LADLE_HTTP_PORT=8080 cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP API 服务端口
    pub http_port: u16,
    /// 数据目录
    pub data_dir: String,
    /// 日志目录（可选）
    pub log_dir: Option<String>,
    /// 广播通道容量，落后超过此数量的订阅者会被断开
    pub feed_capacity: usize,
    /// 运行环境: development | production
    pub environment: String,
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置，使用默认值
    pub fn from_env() -> Self {
        Self {
            http_port: std::env::var("LADLE_HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8420),
            data_dir: std::env::var("LADLE_DATA_DIR").unwrap_or_else(|_| "./data".into()),
            log_dir: std::env::var("LADLE_LOG_DIR").ok(),
            feed_capacity: std::env::var("LADLE_FEED_CAPACITY")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(256),
            environment: std::env::var("LADLE_ENVIRONMENT")
                .unwrap_or_else(|_| "development".into()),
        }
    }

    /// 使用自定义值覆盖部分配置
    ///
    /// 常用于测试场景
    pub fn with_overrides(data_dir: impl Into<String>, http_port: u16) -> Self {
        let mut config = Self::from_env();
        config.data_dir = data_dir.into();
        config.http_port = http_port;
        config
    }

    /// 数据库文件路径
    pub fn store_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("plan.redb")
    }

    /// 是否生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// 是否开发环境
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
