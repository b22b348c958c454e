// src/config.rs

pub mod state;

use self::state::load_or_create_external_config;
use crate::{
    cli::Cli,
    constants,
    error::AppResult,
    models::{ContentType, SaveMode, Section},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NetworkConfig {
    pub connect_timeout_secs: Option<u64>,
    pub timeout_secs: Option<u64>,
    pub download_timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DelayConfig {
    pub between_requests_ms: Option<u64>,
    pub between_downloads_ms: Option<u64>,
}

/// 分区目录中的一项，`url` 由模板和用户名生成
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SectionTemplate {
    pub id: String,
    pub name: String,
    pub folder_name: String,
    #[serde(default)]
    pub content_type: ContentType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub delays: DelayConfig,
    #[serde(default = "default_section_url_template")]
    pub section_url_template: String,
    #[serde(default = "default_section_catalog")]
    pub sections: Vec<SectionTemplate>,
}

// --- 为上面的 serde default 添加辅助函数 ---
fn default_base_url() -> String {
    constants::DEFAULT_BASE_URL.to_string()
}

fn default_section_url_template() -> String {
    constants::SECTION_URL_TEMPLATE.to_string()
}

fn default_section_catalog() -> Vec<SectionTemplate> {
    let entry = |id: &str, name: &str, folder_name: &str, content_type| SectionTemplate {
        id: id.into(),
        name: name.into(),
        folder_name: folder_name.into(),
        content_type,
    };
    vec![
        entry("pictures", "Фотографии", "photos", ContentType::Pictures),
        entry("music", "Музыка", "music", ContentType::Music),
        entry("video", "Видео", "videos", ContentType::Video),
        entry("files", "Файлы", "files", ContentType::Files),
    ]
}

impl ExternalConfig {
    pub(crate) fn default_app_config() -> Self {
        // 为 NetworkConfig 提供一组稳健的默认值
        let network_config = NetworkConfig {
            connect_timeout_secs: Some(10),
            timeout_secs: Some(180),
            download_timeout_secs: Some(300),
            max_retries: Some(3),
        };

        Self {
            base_url: default_base_url(),
            network: network_config,
            delays: DelayConfig {
                between_requests_ms: Some(constants::delays::BETWEEN_REQUESTS_MS),
                between_downloads_ms: Some(constants::delays::BETWEEN_DOWNLOADS_MS),
            },
            section_url_template: default_section_url_template(),
            sections: default_section_catalog(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub base_url: String,
    pub user_agent: String,
    pub connect_timeout: Duration,
    pub timeout: Duration,
    pub download_timeout: Duration,
    pub max_retries: u32,
    /// 两次页面请求之间的固定间隔，用于避免触发站点的反爬限制
    pub request_delay: Duration,
    /// 两个文件下载之间的固定间隔
    pub download_delay: Duration,
    pub section_url_template: String,
    pub section_catalog: Vec<SectionTemplate>,
    pub skip_protected: bool,
    pub save_mode: SaveMode,
}

impl AppConfig {
    pub fn new(args: &Cli) -> AppResult<Self> {
        let external_config = load_or_create_external_config()?;
        Ok(Self::from_external(external_config, args))
    }

    pub fn from_external(external_config: ExternalConfig, args: &Cli) -> Self {
        let network = external_config.network;
        let delays = external_config.delays;
        Self {
            base_url: external_config.base_url.trim_end_matches('/').to_string(),
            user_agent: constants::USER_AGENT.into(),
            connect_timeout: Duration::from_secs(network.connect_timeout_secs.unwrap_or(10)),
            timeout: Duration::from_secs(network.timeout_secs.unwrap_or(180)),
            download_timeout: Duration::from_secs(network.download_timeout_secs.unwrap_or(300)),
            max_retries: network.max_retries.unwrap_or(3),
            request_delay: Duration::from_millis(
                delays
                    .between_requests_ms
                    .unwrap_or(constants::delays::BETWEEN_REQUESTS_MS),
            ),
            download_delay: Duration::from_millis(
                delays
                    .between_downloads_ms
                    .unwrap_or(constants::delays::BETWEEN_DOWNLOADS_MS),
            ),
            section_url_template: external_config.section_url_template,
            section_catalog: external_config.sections,
            skip_protected: args.skip_protected,
            save_mode: args.save_mode,
        }
    }

    /// 根据分区目录和用户名生成该用户的分区列表
    pub fn build_sections(&self, username: &str) -> Vec<Section> {
        self.section_catalog
            .iter()
            .map(|template| Section {
                id: template.id.clone(),
                name: template.name.clone(),
                folder_name: template.folder_name.clone(),
                url: self
                    .section_url_template
                    .replace("{base}", &self.base_url)
                    .replace("{section}", &template.id)
                    .replace("{username}", username),
                content_type: template.content_type,
            })
            .collect()
    }

    /// 构造文件的 view / download 回退地址: `{base}/{category}/{action}/{id}/`
    pub fn build_file_url(&self, content_type: ContentType, id: &str, action: &str) -> String {
        format!(
            "{}/{}/{}/{}/",
            self.base_url,
            content_type.category(),
            action,
            id
        )
    }
}

#[cfg(feature = "testing")]
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: constants::DEFAULT_BASE_URL.to_string(),
            user_agent: "test-agent/1.0".to_string(),
            connect_timeout: Duration::from_secs(5),
            timeout: Duration::from_secs(15),
            download_timeout: Duration::from_secs(15),
            max_retries: 0,
            request_delay: Duration::ZERO,
            download_delay: Duration::ZERO,
            section_url_template: default_section_url_template(),
            section_catalog: default_section_catalog(),
            skip_protected: false,
            save_mode: SaveMode::Structured,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn config() -> AppConfig {
        let args = Cli::parse_from(["spaces-backup", "--skip-protected", "--save-mode", "flat"]);
        let mut external = ExternalConfig::default_app_config();
        external.base_url = "https://example.test/".into();
        AppConfig::from_external(external, &args)
    }

    #[test]
    fn test_build_sections_from_template() {
        let config = config();
        assert!(config.skip_protected);
        assert_eq!(config.save_mode, SaveMode::Flat);

        let sections = config.build_sections("alice");
        assert_eq!(sections.len(), 4);
        assert_eq!(sections[0].id, "pictures");
        assert_eq!(sections[0].folder_name, "photos");
        assert_eq!(sections[0].url, "https://example.test/pictures/user/alice/");
        assert_eq!(sections[2].content_type, ContentType::Video);
    }

    #[test]
    fn test_build_file_url() {
        let config = config();
        assert_eq!(
            config.build_file_url(ContentType::Music, "42", "view"),
            "https://example.test/music/view/42/"
        );
    }

    #[test]
    fn test_partial_config_file_uses_defaults() {
        let external: ExternalConfig =
            serde_json::from_str(r#"{"delays": {"between_requests_ms": 50}}"#).unwrap();
        assert_eq!(external.base_url, constants::DEFAULT_BASE_URL);
        assert_eq!(external.sections.len(), 4);
        let args = Cli::parse_from(["spaces-backup"]);
        let config = AppConfig::from_external(external, &args);
        assert_eq!(config.request_delay, Duration::from_millis(50));
        assert_eq!(config.download_delay, Duration::from_millis(200));
    }
}
