// src/cookies.rs

use crate::constants;
use log::{debug, trace};
use reqwest::header::{HeaderMap, SET_COOKIE};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

/// 会话 Cookie 集合。每次合并时新值覆盖旧值，未出现过的名称被追加。
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionCookies(BTreeMap<String, String>);

impl SessionCookies {
    pub fn new() -> Self {
        Self::default()
    }

    /// 仅凭 SID 创建会话
    pub fn from_sid(sid: &str) -> Self {
        let mut cookies = Self::new();
        cookies.insert(constants::SID_COOKIE_NAME, sid.trim());
        cookies
    }

    /// 解析用户提供的 Cookie 文本。
    ///
    /// 支持三种写法:
    /// - Netscape cookies.txt (每行 7 个 TAB 分隔字段)
    /// - 每行一个 `name=value`
    /// - 浏览器请求头格式 `a=1; b=2`
    ///
    /// 不含 `=` 的单个值被视为 SID。
    pub fn parse(text: &str) -> Self {
        let mut cookies = Self::new();
        let trimmed = text.trim();
        if !trimmed.is_empty() && !trimmed.contains('=') && !trimmed.contains('\t') {
            return Self::from_sid(trimmed);
        }
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if line.contains('\t') {
                let parts: Vec<&str> = line.split('\t').collect();
                if parts.len() >= 7 && !parts[5].is_empty() && !parts[6].is_empty() {
                    cookies.insert(parts[5], parts[6]);
                }
                continue;
            }
            for pair in line.split(';') {
                if let Some((name, value)) = pair.split_once('=') {
                    let (name, value) = (name.trim(), value.trim());
                    if !name.is_empty() && !value.is_empty() {
                        cookies.insert(name, value);
                    }
                }
            }
        }
        debug!("解析得到 {} 个 Cookie", cookies.len());
        cookies
    }

    /// 从响应头中提取服务器新设置的 Cookie (只取 `name=value` 部分)。
    pub fn from_set_cookie_headers(headers: &HeaderMap) -> Self {
        let mut cookies = Self::new();
        for value in headers.get_all(SET_COOKIE) {
            let Ok(raw) = value.to_str() else { continue };
            let first = raw.split(';').next().unwrap_or_default();
            if let Some((name, value)) = first.split_once('=') {
                let (name, value) = (name.trim(), value.trim());
                if !name.is_empty() && !value.is_empty() {
                    trace!("服务器设置 Cookie: {}", name);
                    cookies.insert(name, value);
                }
            }
        }
        cookies
    }

    pub fn insert(&mut self, name: &str, value: &str) {
        self.0.insert(name.to_string(), value.to_string());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn sid(&self) -> Option<&str> {
        self.get(constants::SID_COOKIE_NAME)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 合并新 Cookie，返回是否有任何值发生了变化。
    pub fn merge(&mut self, other: &SessionCookies) -> bool {
        let mut changed = false;
        for (name, value) in &other.0 {
            if self.0.get(name) != Some(value) {
                self.0.insert(name.clone(), value.clone());
                changed = true;
            }
        }
        changed
    }

    /// 生成 `Cookie` 请求头
    pub fn to_header_value(&self) -> String {
        self.0
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

// Cookie 值属于敏感信息，Debug 输出只保留名称。
impl fmt::Debug for SessionCookies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.0.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn cookies(pairs: &[(&str, &str)]) -> SessionCookies {
        let mut c = SessionCookies::new();
        for (k, v) in pairs {
            c.insert(k, v);
        }
        c
    }

    #[test]
    fn test_merge_new_values_win() {
        let mut base = cookies(&[("sid", "a")]);
        let changed = base.merge(&cookies(&[("sid", "b"), ("extra", "x")]));
        assert!(changed);
        assert_eq!(base, cookies(&[("sid", "b"), ("extra", "x")]));

        // 相同值再次合并不算变化
        assert!(!base.merge(&cookies(&[("sid", "b")])));
    }

    #[test]
    fn test_parse_formats() {
        // 单个值视为 SID
        assert_eq!(SessionCookies::parse("  abc123 \n").sid(), Some("abc123"));

        // 请求头格式
        let parsed = SessionCookies::parse("sid=abc; user_id=42; theme=");
        assert_eq!(parsed.sid(), Some("abc"));
        assert_eq!(parsed.get("user_id"), Some("42"));
        assert_eq!(parsed.get("theme"), None);

        // Netscape 格式，值中可以包含 '='
        let netscape = "# Netscape HTTP Cookie File\n.spaces.im\tTRUE\t/\tTRUE\t0\tsid\tq=w=e\n.spaces.im\tTRUE\t/\tFALSE\t0\tlang\tru\n";
        let parsed = SessionCookies::parse(netscape);
        assert_eq!(parsed.sid(), Some("q=w=e"));
        assert_eq!(parsed.get("lang"), Some("ru"));
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn test_header_round_trip_and_set_cookie() {
        let c = cookies(&[("b", "2"), ("a", "1")]);
        assert_eq!(c.to_header_value(), "a=1; b=2");

        let mut headers = HeaderMap::new();
        headers.append(SET_COOKIE, HeaderValue::from_static("sid=new; Path=/; HttpOnly"));
        headers.append(SET_COOKIE, HeaderValue::from_static("ck=77; Max-Age=3600"));
        headers.append(SET_COOKIE, HeaderValue::from_static("broken"));
        let set = SessionCookies::from_set_cookie_headers(&headers);
        assert_eq!(set, cookies(&[("sid", "new"), ("ck", "77")]));
    }

    #[test]
    fn test_debug_hides_values() {
        let c = cookies(&[("sid", "secret")]);
        let printed = format!("{:?}", c);
        assert!(printed.contains("sid"));
        assert!(!printed.contains("secret"));
    }
}
