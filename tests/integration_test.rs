//! 集成测试
//!
//! 带 `#[ignore]` 的用例需要一个以调试端口启动的 Chrome：
//! `google-chrome --remote-debugging-port=9222`，并登录 AI Studio。
//! 其余用例离线跑通"响应 -> 提取 -> 落盘 -> 合并"的完整链路。

use std::fs;

use video_automation::models::{ExtractedPayload, RenderedContent, StepRole};
use video_automation::services::extractor::extract_from_content;
use video_automation::services::ArtifactWriter;
use video_automation::Config;

/// 被 UI 文案污染的字幕响应，离线走完提取与落盘
#[test]
fn test_polluted_caption_response_to_srt_files() {
    let root = std::env::temp_dir().join("video_automation_it_captions");
    let _ = fs::remove_dir_all(&root);

    let mut config = Config::default();
    config.process_folder = root.join("process").display().to_string();
    config.clips_file = root.join("clips.csv").display().to_string();

    let content = RenderedContent {
        text: String::new(),
        html: concat!(
            "<div>SRT File 1:",
            "<pre>1\n00:00:00,000 -> 00:00:02,000\n第一句\n\n",
            "2\n00:00:02,000 -> 00:00:04,000\n第二句\n\nexpand_less</pre>",
            "<pre>1\n00:00:00,000 --> 00:00:03,000\n另一轨</pre></div>",
        )
        .to_string(),
    };

    let payload = extract_from_content(StepRole::Captions, &content);
    let ExtractedPayload::Captions(tracks) = &payload else {
        panic!("期望字幕轨，得到 {:?}", payload);
    };
    assert_eq!(tracks.len(), 2);

    let writer = ArtifactWriter::new(&config);
    let written = writer.persist("v1", 23, &payload).unwrap();
    assert_eq!(written.len(), 2);

    let srt = fs::read_to_string(&written[0]).unwrap();
    assert!(srt.starts_with("1\n00:00:00,000 --> 00:00:02,000\n第一句"));
    assert!(!srt.contains("expand_less"));
    assert!(!srt.contains("SRT File"));

    let _ = fs::remove_dir_all(&root);
}

/// 表格响应提取、落盘、跨视频合并
#[test]
fn test_table_responses_merge_into_clips_file() {
    let root = std::env::temp_dir().join("video_automation_it_tables");
    let _ = fs::remove_dir_all(&root);

    let mut config = Config::default();
    config.process_folder = root.join("process").display().to_string();
    config.clips_file = root.join("clips.csv").display().to_string();
    let writer = ArtifactWriter::new(&config);

    for (stem, text) in [
        ("v1", "| 文件名 | 开始 | 结束 |\n|---|---|---|\n| v1.mp4 | 0:00 | 1:00 |"),
        ("v2", "| 文件名 | 开始 | 类型 |\n|---|---|---|\n| v2.mp4 | 0:30 | 搞笑 |"),
    ] {
        let content = RenderedContent {
            text: text.to_string(),
            html: String::new(),
        };
        let payload = extract_from_content(StepRole::Table, &content);
        assert!(matches!(payload, ExtractedPayload::Table(_)));
        writer.persist(stem, 25, &payload).unwrap();
    }

    let merged = writer.merge_tables().unwrap();
    assert_eq!(merged, 2);

    let clips = fs::read_to_string(root.join("clips.csv")).unwrap();
    let mut lines = clips.lines();
    // 列并集按首次出现顺序，缺列补空
    assert_eq!(lines.next().unwrap(), "文件名,开始,结束,类型");
    assert_eq!(lines.next().unwrap(), "v1.mp4,0:00,1:00,");
    assert_eq!(lines.next().unwrap(), "v2.mp4,0:30,,搞笑");

    let _ = fs::remove_dir_all(&root);
}

// ========== 以下用例需要真实浏览器 ==========

mod browser_required {
    use std::time::Duration;

    use video_automation::browser::connect_to_browser_and_page;
    use video_automation::config::selectors;
    use video_automation::infrastructure::UiExecutor;
    use video_automation::services::classifier;
    use video_automation::Config;

    /// 连接调试端口并复用/打开 AI Studio 页面
    #[tokio::test]
    #[ignore]
    async fn test_connect_and_reach_ai_studio() {
        let config = Config::default();
        let (_browser, page) = connect_to_browser_and_page(
            config.browser_debug_port,
            Some(&config.ai_studio_url),
            Some("AI Studio"),
        )
        .await
        .expect("需要以调试端口启动的 Chrome");

        let ui = UiExecutor::new(page);
        let reached = ui
            .wait_for_url_contains("aistudio.google.com", Duration::from_secs(30))
            .await
            .unwrap();
        assert!(reached, "页面未到达 AI Studio");
    }

    /// Run 按钮快照可采集且空闲态可判定
    #[tokio::test]
    #[ignore]
    async fn test_run_button_probe_on_live_page() {
        let config = Config::default();
        let (_browser, page) = connect_to_browser_and_page(
            config.browser_debug_port,
            Some(&config.ai_studio_url),
            Some("AI Studio"),
        )
        .await
        .unwrap();

        let ui = UiExecutor::new(page);
        let probe = ui.run_button_probe(selectors::RUN_BUTTON).await.unwrap();
        assert!(probe.found, "页面上找不到 Run 按钮");
        assert!(!classifier::is_busy(&probe), "空闲页面不应处于生成中");
    }

    /// 已登录的会话能通过登录状态探测
    #[tokio::test]
    #[ignore]
    async fn test_login_status_probe() {
        let config = Config::default();
        let (_browser, page) = connect_to_browser_and_page(
            config.browser_debug_port,
            Some(&config.ai_studio_url),
            Some("AI Studio"),
        )
        .await
        .unwrap();

        let ui = UiExecutor::new(page);
        let switcher = video_automation::services::IdentitySwitcher::new();
        let logged_in = switcher.is_logged_in(&ui).await.unwrap();
        assert!(logged_in, "测试要求浏览器已登录 Google 账号");
    }

    /// 提示词输入框可填入文本
    #[tokio::test]
    #[ignore]
    async fn test_fill_prompt_box() {
        let config = Config::default();
        let (_browser, page) = connect_to_browser_and_page(
            config.browser_debug_port,
            Some(&config.ai_studio_url),
            Some("AI Studio"),
        )
        .await
        .unwrap();

        let ui = UiExecutor::new(page);
        ui.fill_first(selectors::INPUT_BOX, "测试输入，请勿提交", "提示词输入框")
            .await
            .unwrap();
    }
}
