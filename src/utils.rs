// src/utils.rs

use crate::{constants, error::*};
use anyhow::Context;
use md5::{Digest, Md5};
use regex::Regex;
use std::{
    collections::BTreeSet,
    ffi::OsStr,
    fs::File,
    io::{BufReader, Read},
    path::{Component, Path, PathBuf},
    sync::LazyLock,
};

static ILLEGAL_CHARS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"[\\/*?:"<>|]"#).unwrap());
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static NAME_EXT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(.+?)(\.[^.\s]+)$").unwrap());

/// 逻辑路径拼接: 父路径为空时直接返回名称
pub fn join_logical_path(parent: &str, name: &str) -> String {
    let parent = parent.trim_end_matches('/');
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", parent, name)
    }
}

/// 将 "photo.final.jpg" 拆分为 ("photo.final", ".jpg")，没有扩展名时第二项为空
pub fn split_name_extension(full_name: &str) -> (String, String) {
    let full_name = full_name.trim();
    match NAME_EXT_RE.captures(full_name) {
        Some(caps) => (caps[1].to_string(), caps[2].to_string()),
        None => (full_name.to_string(), String::new()),
    }
}

pub fn sanitize_filename(name: &str) -> String {
    let original_name = name.trim();
    if original_name.is_empty() {
        return "unknown".to_string();
    }

    let stem = Path::new(original_name)
        .file_stem()
        .unwrap_or_else(|| OsStr::new(original_name))
        .to_string_lossy()
        .to_uppercase();
    let windows_reserved = [
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7",
        "COM8", "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];

    let mut name = if windows_reserved.contains(&stem.as_ref()) {
        format!("_{}", original_name)
    } else {
        original_name.to_string()
    };

    name = ILLEGAL_CHARS_RE.replace_all(&name, " ").into_owned();
    name = WHITESPACE_RE.replace_all(&name, " ").trim().to_string();
    name = name
        .trim_matches(|c: char| c == '.' || c.is_whitespace())
        .to_string();
    if name.is_empty() {
        return "unnamed".to_string();
    }

    if name.len() > constants::MAX_FILENAME_BYTES {
        let (stem_part, ext) = split_name_extension(&name);
        if ext.is_empty() {
            name = safe_truncate_utf8(&name, constants::MAX_FILENAME_BYTES).to_string();
        } else {
            let max_stem_bytes = constants::MAX_FILENAME_BYTES.saturating_sub(ext.len());
            name = format!("{}{}", safe_truncate_utf8(&stem_part, max_stem_bytes), ext);
        }
    }
    name
}

/// 逐段清理逻辑路径 ("photos/Отпуск: 2020/a.jpg")，得到可以安全落盘的相对路径
pub fn sanitize_relative_path(logical_path: &str) -> PathBuf {
    logical_path
        .split('/')
        .filter(|segment| !segment.trim().is_empty())
        .map(sanitize_filename)
        .collect()
}

fn safe_truncate_utf8(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut i = max_bytes;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    &s[..i]
}

pub fn truncate_text(text: &str, max_width: usize) -> String {
    let mut width = 0;
    let mut end_pos = 0;
    for (i, c) in text.char_indices() {
        width += if c.is_ascii() { 1 } else { 2 };
        if width > max_width.saturating_sub(3) {
            end_pos = i;
            break;
        }
    }
    if end_pos == 0 {
        text.to_string()
    } else {
        format!("{}...", &text[..end_pos])
    }
}

pub fn parse_selection_indices(selection_str: &str, total_items: usize) -> Vec<usize> {
    if selection_str.eq_ignore_ascii_case("all") {
        return (0..total_items).collect();
    }
    let mut indices = BTreeSet::new();
    for part in selection_str.split(',').map(|s| s.trim()) {
        if part.is_empty() {
            continue;
        }
        if let Some((start, end)) = part.split_once('-') {
            if let (Ok(start), Ok(end)) = (start.parse::<usize>(), end.parse::<usize>()) {
                if start == 0 || end == 0 {
                    continue;
                }
                let (min, max) = (start.min(end), start.max(end));
                indices.extend((min..=max).filter(|i| *i <= total_items).map(|i| i - 1));
            }
        } else if let Ok(num) = part.parse::<usize>()
            && num > 0
            && num <= total_items
        {
            indices.insert(num - 1);
        }
    }
    indices.into_iter().collect()
}

pub fn calculate_file_md5(path: &Path) -> AppResult<String> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = Md5::new();
    let mut buffer = [0; 8192];
    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// 目标已存在时生成 `<stem>_<md5 前 8 位><ext>`
pub fn collision_file_name(file_name: &str, md5_hex: &str) -> String {
    let (stem, ext) = split_name_extension(file_name);
    let short = &md5_hex[..md5_hex.len().min(8)];
    format!("{}_{}{}", stem, short, ext)
}

pub fn secure_join_path(base_dir: &Path, relative_path: &Path) -> AppResult<PathBuf> {
    let resolved_base = dunce::canonicalize(base_dir)
        .with_context(|| format!("基础目录 '{:?}' 不存在或无法访问", base_dir))?;
    let mut final_path = resolved_base.clone();
    for component in relative_path.components() {
        match component {
            Component::Normal(part) => final_path.push(part),
            Component::ParentDir => {
                return Err(AppError::Security("检测到路径遍历 '..' ".to_string()));
            }
            _ => continue,
        }
    }
    if !final_path.starts_with(&resolved_base) {
        return Err(AppError::Security(format!(
            "路径遍历攻击检测: '{:?}'",
            relative_path
        )));
    }
    Ok(final_path)
}

/// 字节数格式化为人类可读形式
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_selection_indices() {
        // 测试基本情况
        assert_eq!(parse_selection_indices("1,3,5", 5), vec![0, 2, 4]);

        // 测试范围
        assert_eq!(parse_selection_indices("2-4", 5), vec![1, 2, 3]);

        // 测试 "all" 关键字 (大小写不敏感)
        assert_eq!(parse_selection_indices("all", 3), vec![0, 1, 2]);
        assert_eq!(parse_selection_indices("All", 3), vec![0, 1, 2]);

        // 测试混合、乱序和重复
        assert_eq!(parse_selection_indices("4, 1-2, 1", 4), vec![0, 1, 3]);

        // 测试无效和越界输入
        assert_eq!(parse_selection_indices("1,10,foo,-2", 4), vec![0]);

        // 测试空输入
        assert_eq!(parse_selection_indices("", 4), Vec::<usize>::new());
    }

    #[test]
    fn test_sanitize_filename() {
        // 测试非法字符
        assert_eq!(sanitize_filename("a\\b/c:d*e?f\"g<h>i|j"), "a b c d e f g h i j");

        // 测试首尾空格和点
        assert_eq!(sanitize_filename(" . my file. "), "my file");

        // 测试 Windows 保留字 (大小写不敏感)
        assert_eq!(sanitize_filename("CON.txt"), "_CON.txt");
        assert_eq!(sanitize_filename("aux"), "_aux");

        // 测试空或只有非法字符的输入
        assert_eq!(sanitize_filename(""), "unknown");
        assert_eq!(sanitize_filename("<>|"), "unnamed");

        // 超长的西里尔文件名截断后不能破坏 UTF-8 和扩展名
        let very_long_name = format!("{}.mp3", "Песня".repeat(40));
        let truncated = sanitize_filename(&very_long_name);
        assert!(truncated.len() <= constants::MAX_FILENAME_BYTES);
        assert!(truncated.ends_with(".mp3"));
    }

    #[test]
    fn test_split_name_extension() {
        assert_eq!(split_name_extension("cat.jpg"), ("cat".into(), ".jpg".into()));
        assert_eq!(
            split_name_extension("archive.tar.gz"),
            ("archive.tar".into(), ".gz".into())
        );
        assert_eq!(split_name_extension("README"), ("README".into(), "".into()));
        assert_eq!(split_name_extension(".hidden"), (".hidden".into(), "".into()));
    }

    #[test]
    fn test_paths() {
        assert_eq!(join_logical_path("", "photos"), "photos");
        assert_eq!(join_logical_path("photos", "Лето"), "photos/Лето");
        assert_eq!(
            sanitize_relative_path("photos//a:b/c.txt"),
            PathBuf::from("photos").join("a b").join("c.txt")
        );
        assert_eq!(collision_file_name("song.mp3", "0123456789abcdef"), "song_01234567.mp3");
        assert_eq!(collision_file_name("noext", "abc"), "noext_abc");
    }

    #[test]
    fn test_secure_join_rejects_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(secure_join_path(dir.path(), Path::new("a/b.txt")).is_ok());
        assert!(matches!(
            secure_join_path(dir.path(), Path::new("../evil.txt")),
            Err(AppError::Security(_))
        ));
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
    }
}
