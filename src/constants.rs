// src/constants.rs

pub const UI_WIDTH: usize = 88;
pub const FILENAME_TRUNCATE_LENGTH: usize = 65;
pub const MAX_FILENAME_BYTES: usize = 200;
pub const CONFIG_DIR_NAME: &str = ".spaces-backup";
pub const CONFIG_FILE_NAME: &str = "config.json";
pub const STATE_FILE_NAME: &str = "state.json";
pub const LOG_FILE_NAME: &str = "app.log";
pub const LOG_FALLBACK_FILE_NAME: &str = "fallback.log";
pub const DEFAULT_SAVE_DIR: &str = "downloads";
pub const DEFAULT_BASE_URL: &str = "https://spaces.im";
pub const DEFAULT_USER_DIR: &str = "default";
pub const SID_ENV_VAR: &str = "SPACES_SID";
pub const SID_COOKIE_NAME: &str = "sid";
pub const SYNTHETIC_ID_PREFIX: &str = "synthetic-";
pub const UNKNOWN_FOLDER_NAME: &str = "unknown";
pub const PAGE_QUERY_PARAM: &str = "P";
pub const LINK_ID_QUERY_PARAM: &str = "Link_id";
pub const SECTION_URL_TEMPLATE: &str = "{base}/{section}/user/{username}/";
pub const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/143.0.0.0 Safari/537.36 Edg/143.0.0.0";
pub const HTML_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8";
pub const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9,ru;q=0.8";

pub const HELP_SID_GUIDE: &str = r#"
1. 登录网站: 使用 Chrome / Edge / Firefox 浏览器登录 spaces.im。
2. 打开开发者工具:
   - 在 Windows / Linux 上: 按 F12 或 Ctrl+Shift+I
   - 在 macOS 上: 按 Cmd+Opt+I (⌘⌥I)
3. 切换到 "应用" (Application) / "存储" (Storage) 标签页。
4. 在 Cookies -> https://spaces.im 中找到名为 sid 的条目，复制它的值。
5. 运行:  spaces-backup --sid <复制的值> --user <你的用户名>
   也可以导出整个 cookies.txt (Netscape 格式) 并使用 --cookies-file。"#;

pub mod content_types {
    pub const PICTURES: u32 = 7;
    pub const MUSIC: u32 = 6;
    pub const VIDEO: u32 = 25;
}

pub mod delays {
    pub const BETWEEN_REQUESTS_MS: u64 = 300;
    pub const BETWEEN_DOWNLOADS_MS: u64 = 200;
}
