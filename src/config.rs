/// 程序配置
///
/// 拒绝/配额提示语列表是经验性收集的，上游没有结构化错误码，
/// 因此它们是配置项而不是写死的逻辑。
#[derive(Clone, Debug)]
pub struct Config {
    // --- 路径配置 ---
    /// 处理目录（每个视频一个子目录存放产物）
    pub process_folder: String,
    /// 视频文件存放目录
    pub videos_folder: String,
    /// 视频列表 CSV 文件
    pub video_list_file: String,
    /// 提示词 TOML 文件
    pub prompts_file: String,
    /// 合并后的表格数据文件
    pub clips_file: String,
    /// 后续渲染脚本（外部协作方，非零退出只记日志）
    pub render_command: String,
    pub render_script: String,
    /// 输出日志文件
    pub output_log_file: String,

    // --- 浏览器配置 ---
    /// 浏览器调试端口
    pub browser_debug_port: u16,
    /// AI Studio 地址（每次 goto 开启一个新对话）
    pub ai_studio_url: String,

    // --- 步骤配置 ---
    /// 每个视频的总步骤数（提示词数量需与之一致）
    pub total_steps: usize,
    /// 产出字幕轨的步骤
    pub caption_steps: Vec<usize>,
    /// 产出表格数据的步骤
    pub table_steps: Vec<usize>,

    // --- 等待时间配置（秒） ---
    /// 上传视频后的等待时间
    pub wait_after_upload: u64,
    /// 发送提示词后的等待时间
    pub wait_after_send: u64,
    /// 等待 Run 按钮可用的最大时间（慢速网络下上传可能很久）
    pub wait_button_enabled: u64,
    /// 等待单次响应完成的最大时间
    pub response_timeout: u64,
    /// 轮询按钮状态的间隔
    pub poll_interval: u64,
    /// 响应完成后的稳定等待
    pub settle_delay: u64,
    /// 表格步骤的稳定等待（表格渲染慢于文本）
    pub settle_delay_table: u64,
    /// 视频之间的休息时间
    pub wait_between_videos: u64,
    /// Content blocked 去重冷却时间
    pub content_blocked_cooldown: u64,

    // --- 恢复策略配置 ---
    /// 同一步骤内容拦截自动重试上限
    pub max_rejection_retries: usize,
    /// 超时自动延长等待的上限（超过则询问操作员）
    pub max_timeout_extensions: usize,
    /// 内容拦截后自动发送的续写提示词
    pub continuation_prompt: String,

    // --- 提示语配置 ---
    /// 内容拦截提示语（不区分大小写的子串匹配）
    pub rejection_phrases: Vec<String>,
    /// 配额/限流提示语
    pub quota_phrases: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            process_folder: "assets/Process_Folder".to_string(),
            videos_folder: "assets/Process_Folder/videos".to_string(),
            video_list_file: "assets/Process_Folder/videos/VideoList.csv".to_string(),
            prompts_file: "assets/Process_Folder/prompts.toml".to_string(),
            clips_file: "assets/output/clips.csv".to_string(),
            render_command: "python3".to_string(),
            render_script: "assets/output/process_video.py".to_string(),
            output_log_file: "automation.log".to_string(),
            browser_debug_port: 9222,
            ai_studio_url: "https://aistudio.google.com/".to_string(),
            total_steps: 25,
            caption_steps: vec![23],
            table_steps: vec![25],
            wait_after_upload: 15,
            wait_after_send: 3,
            wait_button_enabled: 300,
            response_timeout: 600,
            poll_interval: 2,
            settle_delay: 3,
            settle_delay_table: 8,
            wait_between_videos: 5,
            content_blocked_cooldown: 60,
            max_rejection_retries: 3,
            max_timeout_extensions: 3,
            continuation_prompt: "继续".to_string(),
            rejection_phrases: vec![
                "content blocked".to_string(),
                "内容被阻止".to_string(),
                "something went wrong".to_string(),
                "an internal error has occurred".to_string(),
            ],
            quota_phrases: vec![
                "quota".to_string(),
                "rate limit".to_string(),
                "resource has been exhausted".to_string(),
                "too many requests".to_string(),
            ],
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            process_folder: std::env::var("PROCESS_FOLDER").unwrap_or(default.process_folder.clone()),
            videos_folder: std::env::var("VIDEOS_FOLDER").unwrap_or(default.videos_folder.clone()),
            video_list_file: std::env::var("VIDEO_LIST_FILE").unwrap_or(default.video_list_file.clone()),
            prompts_file: std::env::var("PROMPTS_FILE").unwrap_or(default.prompts_file.clone()),
            clips_file: std::env::var("CLIPS_FILE").unwrap_or(default.clips_file.clone()),
            render_command: std::env::var("RENDER_COMMAND").unwrap_or(default.render_command.clone()),
            render_script: std::env::var("RENDER_SCRIPT").unwrap_or(default.render_script.clone()),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(default.output_log_file.clone()),
            browser_debug_port: std::env::var("BROWSER_DEBUG_PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(default.browser_debug_port),
            ai_studio_url: std::env::var("AI_STUDIO_URL").unwrap_or(default.ai_studio_url.clone()),
            total_steps: std::env::var("TOTAL_STEPS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.total_steps),
            wait_after_upload: std::env::var("WAIT_AFTER_UPLOAD").ok().and_then(|v| v.parse().ok()).unwrap_or(default.wait_after_upload),
            wait_after_send: std::env::var("WAIT_AFTER_SEND").ok().and_then(|v| v.parse().ok()).unwrap_or(default.wait_after_send),
            wait_button_enabled: std::env::var("WAIT_BUTTON_ENABLED").ok().and_then(|v| v.parse().ok()).unwrap_or(default.wait_button_enabled),
            response_timeout: std::env::var("RESPONSE_TIMEOUT").ok().and_then(|v| v.parse().ok()).unwrap_or(default.response_timeout),
            wait_between_videos: std::env::var("WAIT_BETWEEN_VIDEOS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.wait_between_videos),
            content_blocked_cooldown: std::env::var("CONTENT_BLOCKED_COOLDOWN").ok().and_then(|v| v.parse().ok()).unwrap_or(default.content_blocked_cooldown),
            max_rejection_retries: std::env::var("MAX_REJECTION_RETRIES").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_rejection_retries),
            max_timeout_extensions: std::env::var("MAX_TIMEOUT_EXTENSIONS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_timeout_extensions),
            ..default
        }
    }

    /// 判断步骤产出哪种结构化数据
    pub fn step_role(&self, step_index: usize) -> crate::models::StepRole {
        if self.caption_steps.contains(&step_index) {
            crate::models::StepRole::Captions
        } else if self.table_steps.contains(&step_index) {
            crate::models::StepRole::Table
        } else {
            crate::models::StepRole::PassThrough
        }
    }
}

/// 页面选择器候选列表
///
/// 按顺序逐个探测，命中即用。选择器基于 AI Studio 当前页面结构，
/// 页面改版后需要在这里更新。
pub mod selectors {
    /// 添加附件按钮
    pub const ADD_BUTTON: &[&str] = &[
        r#"button[iconname="add_circle"]"#,
        r#"button[data-test-add-chunk-menu-button]"#,
        r#"button[aria-label*="Insert assets"]"#,
    ];

    /// Upload File 菜单项
    pub const UPLOAD_FILE_BUTTON: &[&str] = &[
        r#"button[aria-label="Upload File"]"#,
        r#"button[mat-menu-item]"#,
    ];

    /// 文件输入框
    pub const FILE_INPUT: &[&str] = &[
        r#"input[data-test-upload-file-input]"#,
        r#"input[type="file"][multiple]"#,
        r#"input[type="file"]"#,
    ];

    /// 提示词输入框
    pub const INPUT_BOX: &[&str] = &[
        r#"textarea[placeholder*="Enter"]"#,
        "textarea",
        r#"[contenteditable="true"]"#,
        r#"div[role="textbox"]"#,
    ];

    /// Run/Stop 按钮（busy 状态通过它判断）
    pub const RUN_BUTTON: &[&str] = &[
        r#"button[aria-label="Run"]"#,
        "button.run-button",
        r#"button[type="submit"][aria-label="Run"]"#,
    ];

    /// 模型响应容器
    pub const MODEL_RESPONSE: &[&str] = &[
        r#"[data-message-author-role="model"]"#,
        "ms-chat-turn",
    ];

    /// 账号切换入口（头像按钮）
    pub const ACCOUNT_BUTTON: &[&str] = &[
        r#"a[aria-label*="Google Account"]"#,
        r#"button[aria-label*="Google Account"]"#,
        r#"a[href*="accounts.google.com/SignOutOptions"]"#,
    ];
}
