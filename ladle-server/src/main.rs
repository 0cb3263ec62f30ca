use ladle_server::{Config, Server, ServerState, init_logger_with_file, print_banner};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. 加载环境变量与配置
    dotenv::dotenv().ok();
    let config = Config::from_env();

    // 2. 初始化日志 (RUST_LOG 优先，可选滚动文件输出)
    init_logger_with_file(None, config.log_dir.as_deref());

    // 打印横幅
    print_banner();

    tracing::info!("🥄 Ladle Server starting...");

    // 3. 初始化服务器状态 (存储、目录、广播器)
    let state = ServerState::initialize(&config).await;

    // 4. 启动 HTTP 服务器
    let server = Server::with_state(config, state);

    if let Err(e) = server.run().await {
        tracing::error!("Server error: {}", e);
        return Err(e.into());
    }

    Ok(())
}
