use anyhow::Result;
use tracing::{error, info};

use video_automation::utils::logging;
use video_automation::{App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let config = Config::from_env();
    if let Err(e) = logging::init_log_file(&config.output_log_file) {
        error!("写运行日志头失败: {}", e);
    }

    info!("🎬 视频切片自动化启动");
    info!("  浏览器调试端口: {}", config.browser_debug_port);
    info!("  视频清单: {}", config.video_list_file);
    info!("  提示词文件: {}", config.prompts_file);

    let mut app = App::initialize(config).await?;
    app.run().await?;

    info!("✅ 程序正常退出");
    Ok(())
}
