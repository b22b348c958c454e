// src/config/state.rs

use crate::{
    config::ExternalConfig, // 只需要从父模块导入结构体定义
    constants,
    cookies::SessionCookies,
    error::{AppError, AppResult},
    models::Section,
};
use anyhow::{Context, anyhow};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// 上一次运行留下的本地状态: Cookie、用户和分区列表
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookies: Option<SessionCookies>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default)]
    pub sections: Vec<Section>,
}

/// 配置目录，可通过 `SPACES_BACKUP_HOME` 覆盖 (测试时使用)
pub fn get_config_dir() -> AppResult<PathBuf> {
    if let Ok(dir) = std::env::var("SPACES_BACKUP_HOME")
        && !dir.is_empty()
    {
        return Ok(PathBuf::from(dir));
    }
    let path = dirs::home_dir()
        .ok_or_else(|| AppError::Other(anyhow!("无法获取用户主目录")))?
        .join(constants::CONFIG_DIR_NAME);
    Ok(path)
}

pub(crate) fn load_or_create_external_config() -> AppResult<ExternalConfig> {
    let config_path = get_config_dir()?.join(constants::CONFIG_FILE_NAME);
    if config_path.is_file() {
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("读取配置文件 '{}' 失败", config_path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("解析配置文件 '{}' 失败", config_path.display()))
            .map_err(AppError::from)
    } else {
        info!("配置文件 {:?} 不存在，将创建默认配置。", config_path);
        let config = ExternalConfig::default_app_config();
        write_json(&config_path, &config)?;
        Ok(config)
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> AppResult<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let json_content = serde_json::to_string_pretty(value)?;
    fs::write(path, json_content)
        .with_context(|| format!("写入 '{}' 失败", path.display()))?;
    Ok(())
}

pub fn load_state() -> PersistedState {
    let Ok(dir) = get_config_dir() else {
        return PersistedState::default();
    };
    let path = dir.join(constants::STATE_FILE_NAME);
    let Ok(content) = fs::read_to_string(&path) else {
        debug!("本地状态文件 {:?} 不存在", path);
        return PersistedState::default();
    };
    serde_json::from_str(&content).unwrap_or_else(|e| {
        warn!("本地状态文件 {:?} 已损坏，将忽略: {}", path, e);
        PersistedState::default()
    })
}

pub fn save_state(state: &PersistedState) -> AppResult<()> {
    let path = get_config_dir()?.join(constants::STATE_FILE_NAME);
    write_json(&path, state)?;
    debug!("本地状态已保存至: {}", path.display());
    Ok(())
}

/// 按优先级解析会话 Cookie: 命令行 SID / Cookie 文件 -> 环境变量 -> 本地状态
pub fn resolve_session(
    cli_sid: Option<&str>,
    cookies_file: Option<&Path>,
    state: &PersistedState,
) -> AppResult<(Option<SessionCookies>, String)> {
    if let Some(sid) = cli_sid
        && !sid.trim().is_empty()
    {
        debug!("使用来自命令行参数的 SID");
        return Ok((Some(SessionCookies::parse(sid)), "命令行参数".to_string()));
    }
    if let Some(path) = cookies_file {
        let content = fs::read_to_string(path)
            .with_context(|| format!("读取 Cookie 文件 '{}' 失败", path.display()))?;
        let cookies = SessionCookies::parse(&content);
        if cookies.sid().is_none() {
            return Err(AppError::UserInputError(format!(
                "Cookie 文件 '{}' 中没有找到 sid。",
                path.display()
            )));
        }
        debug!("使用来自 Cookie 文件的会话");
        return Ok((Some(cookies), format!("Cookie 文件 ({})", path.display())));
    }
    if let Ok(sid) = std::env::var(constants::SID_ENV_VAR)
        && !sid.trim().is_empty()
    {
        debug!("使用来自环境变量 {} 的 SID", constants::SID_ENV_VAR);
        return Ok((
            Some(SessionCookies::parse(&sid)),
            format!("环境变量 ({})", constants::SID_ENV_VAR),
        ));
    }
    if let Some(cookies) = state.cookies.as_ref().filter(|c| c.sid().is_some()) {
        debug!("使用来自本地状态文件的会话");
        return Ok((Some(cookies.clone()), "本地状态文件".to_string()));
    }
    debug!("未在任何位置找到可用的会话");
    Ok((None, "未找到".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_cli_sid_has_priority() {
        let mut state = PersistedState::default();
        state.cookies = Some(SessionCookies::from_sid("from-state"));
        let (cookies, _) = resolve_session(Some("from-cli"), None, &state).unwrap();
        assert_eq!(cookies.unwrap().sid(), Some("from-cli"));
    }

    #[test]
    fn test_cookies_file_without_sid_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "lang=ru; theme=dark").unwrap();
        let result = resolve_session(None, Some(file.path()), &PersistedState::default());
        assert!(matches!(result, Err(AppError::UserInputError(_))));
    }

    #[test]
    fn test_cookies_file_is_parsed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "sid=abc; user_id=5").unwrap();
        let (cookies, source) =
            resolve_session(None, Some(file.path()), &PersistedState::default()).unwrap();
        let cookies = cookies.unwrap();
        assert_eq!(cookies.sid(), Some("abc"));
        assert_eq!(cookies.get("user_id"), Some("5"));
        assert!(source.contains("Cookie 文件"));
    }

    #[test]
    fn test_state_round_trip() {
        let state = PersistedState {
            cookies: Some(SessionCookies::from_sid("x")),
            user: Some("bob".into()),
            sections: vec![],
        };
        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains(r#""cookies":{"sid":"x"}"#));
        let back: PersistedState = serde_json::from_str(&json).unwrap();
        assert_eq!(back.user.as_deref(), Some("bob"));
        assert_eq!(back.cookies.unwrap().sid(), Some("x"));
    }
}
