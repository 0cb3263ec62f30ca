//! 共享小工具

/// 当前 UTC 时间戳（毫秒）, 条目的 created_at/updated_at 都用这个单位
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
