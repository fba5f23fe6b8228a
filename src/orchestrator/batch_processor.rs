//! 批处理编排 - 编排层
//!
//! 顶层入口：连接浏览器、加载视频清单与提示词、逐个视频跑会话、
//! 批次收尾（合并切片总表、移交渲染脚本）。渲染脚本是外部协作方，
//! 它的非零退出只记日志，不影响本批次的成败统计。

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Result};
use chromiumoxide::Browser;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::browser::connect_to_browser_and_page;
use crate::config::Config;
use crate::error::AppError;
use crate::infrastructure::UiExecutor;
use crate::models::{load_video_list, PromptSet, SessionEnd};
use crate::services::{ArtifactWriter, IdentitySwitcher, ResponseExtractor};
use crate::workflow::recovery::{Decision, OperatorConsole, RecoveryPrompt, RecoveryReason};
use crate::workflow::{StdinConsole, VideoFlow};

/// 一轮批次的统计
#[derive(Debug, Default)]
struct BatchStats {
    succeeded: usize,
    failed: Vec<String>,
}

pub struct App {
    config: Config,
    // 持有连接防止被析构断开
    _browser: Browser,
    ui: UiExecutor,
    console: StdinConsole,
}

impl App {
    /// 连接浏览器并准备好页面
    pub async fn initialize(config: Config) -> Result<Self> {
        let (browser, page) = connect_to_browser_and_page(
            config.browser_debug_port,
            Some(&config.ai_studio_url),
            Some("AI Studio"),
        )
        .await?;

        Ok(Self {
            config,
            _browser: browser,
            ui: UiExecutor::new(page),
            console: StdinConsole,
        })
    }

    /// 跑批次，直到清单处理完且操作员不再要求重跑
    pub async fn run(&mut self) -> Result<()> {
        loop {
            let quit = self.run_batch().await?;
            if quit {
                break;
            }

            // 批次收尾后问一声是否再跑一轮（比如清单有新视频）
            let decision = self.console.decide(&RecoveryPrompt {
                video: "<批次>".to_string(),
                step_index: 0,
                reason: RecoveryReason::BatchComplete,
            });
            if decision != Decision::Retry {
                break;
            }
            info!("🔁 重新加载清单，再跑一轮");
        }
        Ok(())
    }

    /// 跑一轮批次，返回操作员是否要求退出
    async fn run_batch(&mut self) -> Result<bool> {
        let switcher = IdentitySwitcher::new();
        if !self.ensure_logged_in(&switcher).await {
            return Ok(true);
        }

        let videos = load_video_list(&self.config.video_list_file)?;
        if videos.is_empty() {
            warn!("⚠️ 视频清单为空: {}", self.config.video_list_file);
            return Ok(true);
        }

        let prompts = PromptSet::load(&self.config.prompts_file)?;
        if prompts.len() != self.config.total_steps {
            bail!(AppError::Config(
                crate::error::ConfigError::PromptCountMismatch {
                    expected: self.config.total_steps,
                    actual: prompts.len(),
                }
            ));
        }

        info!(
            "🚀 批次开始: {} 个视频, 每个 {} 步",
            videos.len(),
            self.config.total_steps
        );

        let extractor = ResponseExtractor::new();
        let writer = ArtifactWriter::new(&self.config);
        let mut stats = BatchStats::default();
        let mut quit = false;

        let total = videos.len();
        for (i, video) in videos.into_iter().enumerate() {
            info!("===== [{}/{}] {} =====", i + 1, total, video.filename);
            let rendered = prompts.render(&video);
            let filename = video.filename.clone();

            let mut flow = VideoFlow::new(
                &self.ui,
                &self.config,
                &extractor,
                &writer,
                &switcher,
                &mut self.console,
            );
            match flow.run(video, rendered).await {
                Ok(SessionEnd::Success) => stats.succeeded += 1,
                Ok(SessionEnd::Skipped) => stats.failed.push(filename),
                Ok(SessionEnd::Quit) => {
                    stats.failed.push(filename);
                    quit = true;
                    break;
                }
                Err(e) => {
                    error!("❌ 视频 {} 处理失败: {}", filename, e);
                    stats.failed.push(filename);
                }
            }

            if i + 1 < total {
                sleep(Duration::from_secs(self.config.wait_between_videos)).await;
            }
        }

        // 即使中途退出也把已有产物合并掉
        self.finish_batch(&stats).await;
        Ok(quit)
    }

    /// 确认浏览器已登录，未登录时等操作员在浏览器里完成登录
    ///
    /// 返回 false 表示操作员选择退出。
    async fn ensure_logged_in(&mut self, switcher: &IdentitySwitcher) -> bool {
        loop {
            match switcher.is_logged_in(&self.ui).await {
                Ok(true) => {
                    info!("🔐 已检测到登录状态");
                    return true;
                }
                Ok(false) => warn!("⚠️ 浏览器未登录 Google 账号"),
                Err(e) => warn!("⚠️ 登录状态探测失败: {}", e),
            }

            let decision = self.console.decide(&RecoveryPrompt {
                video: "<登录>".to_string(),
                step_index: 0,
                reason: RecoveryReason::LoginRequired,
            });
            if matches!(decision, Decision::Quit | Decision::Skip) {
                return false;
            }
            // 给登录后的页面留出刷新时间再复查
            sleep(Duration::from_secs(3)).await;
        }
    }

    /// 批次收尾：合并切片总表并移交渲染脚本
    async fn finish_batch(&self, stats: &BatchStats) {
        match ArtifactWriter::new(&self.config).merge_tables() {
            Ok(rows) => info!("📊 合并完成，共 {} 行切片数据", rows),
            Err(e) => error!("❌ 合并切片总表失败: {}", e),
        }

        self.handoff_render().await;

        info!(
            "🏁 批次结束: 成功 {} 个, 失败/跳过 {} 个",
            stats.succeeded,
            stats.failed.len()
        );
        if !stats.failed.is_empty() {
            warn!("失败/跳过清单: {:?}", stats.failed);
        }
    }

    /// 调用外部渲染脚本（存在才调，非零退出只记日志）
    async fn handoff_render(&self) {
        if !Path::new(&self.config.render_script).exists() {
            info!("渲染脚本不存在，跳过移交: {}", self.config.render_script);
            return;
        }

        info!(
            "🎞️ 移交渲染脚本: {} {}",
            self.config.render_command, self.config.render_script
        );
        let status = tokio::process::Command::new(&self.config.render_command)
            .arg(&self.config.render_script)
            .status()
            .await;

        match status {
            Ok(s) if s.success() => info!("✅ 渲染脚本执行完成"),
            Ok(s) => error!("❌ 渲染脚本非零退出: {}", s),
            Err(e) => error!("❌ 启动渲染脚本失败: {}", e),
        }
    }
}
