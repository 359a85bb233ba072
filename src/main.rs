use s3migrate::config::Settings;
use s3migrate::core::SyncEngine;
use s3migrate::logging::{self, LogConfig};
use std::path::Path;
use std::process::ExitCode;
use tracing::error;

#[tokio::main]
async fn main() -> ExitCode {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.json".to_string());
    let config_path = Path::new(&config_path);

    logging::init(&LogConfig::load(config_path));

    // 配置错误是致命的，在发起任何传输之前退出
    let settings = match Settings::load(config_path) {
        Ok(s) => s,
        Err(e) => {
            error!("配置加载失败: {:#}", e);
            return ExitCode::from(1);
        }
    };

    let engine = match SyncEngine::from_settings(&settings) {
        Ok(e) => e,
        Err(e) => {
            error!("初始化存储失败: {:#}", e);
            return ExitCode::from(1);
        }
    };

    let report = engine.run().await;

    // 对象级失败默认不影响退出码，failOnObjectErrors 打开后按 CI 语义处理
    if settings.transfer.fail_on_object_errors && report.failed() > 0 {
        return ExitCode::from(2);
    }

    ExitCode::SUCCESS
}
