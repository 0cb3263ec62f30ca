//! 工具模块 - 错误处理与日志

pub mod error;
pub mod logger;

pub use error::{AppError, AppResult, ok};
pub use logger::{init_logger, init_logger_with_file};
