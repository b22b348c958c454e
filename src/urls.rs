// src/urls.rs

use crate::constants;
use percent_encoding::percent_decode_str;
use regex::Regex;
use std::sync::LazyLock;
use url::Url;

static LIST_SEGMENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/list/([^/?#]+)/").unwrap());
static LINK_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"[?&]{}=(\d+)", constants::LINK_ID_QUERY_PARAM)).unwrap()
});
static URL_EXT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\.([A-Za-z0-9]{1,5})$").unwrap());

/// 设置 (或替换) 分页参数 `P=<page>`，第 1 页保持原样
pub fn add_pagination(url: &str, page: u32) -> String {
    if page <= 1 {
        return url.to_string();
    }
    let Ok(mut parsed) = Url::parse(url) else {
        let separator = if url.contains('?') { '&' } else { '?' };
        return format!("{}{}{}={}", url, separator, constants::PAGE_QUERY_PARAM, page);
    };
    let pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(k, _)| k != constants::PAGE_QUERY_PARAM)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    parsed
        .query_pairs_mut()
        .clear()
        .extend_pairs(pairs)
        .append_pair(constants::PAGE_QUERY_PARAM, &page.to_string());
    parsed.to_string()
}

/// `/list/<name>-<id>/` 中的名称部分 (去掉最后一个 `-` 之后的 id)
pub fn folder_name_from_url(url: &str) -> Option<String> {
    let segment = LIST_SEGMENT_RE.captures(url)?.get(1)?.as_str();
    let decoded = percent_decode_str(segment).decode_utf8_lossy();
    let name = match decoded.rsplit_once('-') {
        Some((name, _id)) => name,
        None => decoded.as_ref(),
    };
    let name = name.trim();
    (!name.is_empty()).then(|| name.to_string())
}

/// `/list/<name>-<id>/` 中最后一个 `-` 之后的数字 id
pub fn folder_id_from_url(url: &str) -> Option<String> {
    let segment = LIST_SEGMENT_RE.captures(url)?.get(1)?.as_str();
    let decoded = percent_decode_str(segment).decode_utf8_lossy();
    let (_name, id) = decoded.rsplit_once('-')?;
    (!id.is_empty() && id.bytes().all(|b| b.is_ascii_digit())).then(|| id.to_string())
}

/// 不含文件夹段的地址 (分区首页，或 `/list/-/`) 视为分区根
pub fn is_section_root(url: &str) -> bool {
    folder_name_from_url(url).is_none()
}

pub fn link_id(url: &str) -> Option<String> {
    LINK_ID_RE.captures(url).map(|caps| caps[1].to_string())
}

/// 将页面中的相对地址或协议相对地址 (`//cdn...`) 转为绝对地址
pub fn absolutize(href: &str, base: &Url) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with("javascript:") || href == "#" {
        return None;
    }
    if let Some(rest) = href.strip_prefix("//") {
        return Some(format!("https://{}", rest));
    }
    base.join(href).ok().map(String::from)
}

/// 地址最后一个路径段 (已解码)，用于推断文件名
pub fn file_name_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let last = parsed.path_segments()?.rev().find(|s| !s.is_empty())?;
    let decoded = percent_decode_str(last).decode_utf8_lossy().trim().to_string();
    (!decoded.is_empty()).then_some(decoded)
}

/// 地址中的文件扩展名 (带前导点)，纯数字 id 段不算扩展名
pub fn extension_from_url(url: &str) -> Option<String> {
    let name = file_name_from_url(url)?;
    let caps = URL_EXT_RE.captures(&name)?;
    let ext = &caps[1];
    if ext.chars().all(|c| c.is_ascii_digit()) || name.len() == ext.len() + 1 {
        return None;
    }
    Some(format!(".{}", ext.to_ascii_lowercase()))
}

pub fn is_download_url(url: &str) -> bool {
    url.contains("/download/")
}

pub fn is_view_url(url: &str) -> bool {
    url.contains("/view/")
}

/// 根据响应的 Content-Type 推断扩展名
pub fn extension_from_content_type(content_type: &str) -> Option<&'static str> {
    let mime = content_type.split(';').next()?.trim().to_ascii_lowercase();
    let ext = match mime.as_str() {
        "image/jpeg" | "image/jpg" => ".jpg",
        "image/png" => ".png",
        "image/gif" => ".gif",
        "image/webp" => ".webp",
        "image/bmp" => ".bmp",
        "audio/mpeg" | "audio/mp3" => ".mp3",
        "audio/ogg" => ".ogg",
        "audio/wav" | "audio/x-wav" => ".wav",
        "audio/mp4" | "audio/x-m4a" => ".m4a",
        "video/mp4" => ".mp4",
        "video/webm" => ".webm",
        "video/x-msvideo" => ".avi",
        "video/3gpp" => ".3gp",
        "application/pdf" => ".pdf",
        "application/zip" => ".zip",
        "application/x-rar-compressed" | "application/vnd.rar" => ".rar",
        "text/plain" => ".txt",
        _ => return None,
    };
    Some(ext)
}
