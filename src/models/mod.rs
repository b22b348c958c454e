// src/models/mod.rs

pub mod progress;

pub use progress::{DownloadState, FileProgress};

use crate::constants::content_types;
use serde::{Deserialize, Serialize};

// 1. 站点内容类型 (决定回退 URL 的构造方式)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Pictures,
    Music,
    Video,
    #[default]
    Files,
}

impl ContentType {
    /// 根据页面上 `data-type` 的数值映射，未知编码按普通文件处理
    pub fn from_code(code: u32) -> Self {
        match code {
            content_types::PICTURES => ContentType::Pictures,
            content_types::MUSIC => ContentType::Music,
            content_types::VIDEO => ContentType::Video,
            _ => ContentType::Files,
        }
    }

    /// URL 中使用的分类路径段
    pub fn category(&self) -> &'static str {
        match self {
            ContentType::Pictures => "pictures",
            ContentType::Music => "music",
            ContentType::Video => "video",
            ContentType::Files => "files",
        }
    }
}

// 2. 文件描述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FileDescriptor {
    pub id: String,
    pub display_name: String,
    /// 带前导点的扩展名，例如 ".jpg"，可能为空
    pub extension: String,
    pub content_type: ContentType,
    /// 当前已知的最佳地址，可能是需要二次解析的 view 页面
    pub resolved_url: String,
    /// 播放器直链 (音频/视频条目上的 data-src)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direct_url: Option<String>,
    #[serde(default)]
    pub logical_path: String,
}

impl FileDescriptor {
    pub fn file_name(&self) -> String {
        format!("{}{}", self.display_name, self.extension)
    }
}

// 3. 文件夹节点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FolderNode {
    pub id: String,
    pub name: String,
    pub source_url: String,
    pub path: String,
    pub files: Vec<FileDescriptor>,
    pub children: Vec<FolderNode>,
}

impl FolderNode {
    /// 整棵子树中的文件条目数 (未去重)
    pub fn total_file_count(&self) -> usize {
        self.files.len()
            + self
                .children
                .iter()
                .map(FolderNode::total_file_count)
                .sum::<usize>()
    }

    pub fn total_folder_count(&self) -> usize {
        self.children.len()
            + self
                .children
                .iter()
                .map(FolderNode::total_folder_count)
                .sum::<usize>()
    }
}

// 4. 用户的顶层分区
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    /// 显示名称，例如 "Фотографии"
    pub name: String,
    /// 保存时使用的根目录名，例如 "photos"
    pub folder_name: String,
    pub url: String,
    #[serde(default)]
    pub content_type: ContentType,
}

/// 单个分区扫描失败的记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionError {
    pub section_id: String,
    pub section_name: String,
    pub message: String,
}

/// 单个文件下载失败的记录，按文件名索引
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileError {
    pub file_id: String,
    pub file_name: String,
    pub message: String,
}

/// 保存模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SaveMode {
    /// 保留扫描得到的目录结构
    #[default]
    Structured,
    /// 所有文件放入同一目录，重名时自动改名
    Flat,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_codes() {
        assert_eq!(ContentType::from_code(7), ContentType::Pictures);
        assert_eq!(ContentType::from_code(6), ContentType::Music);
        assert_eq!(ContentType::from_code(25), ContentType::Video);
        assert_eq!(ContentType::from_code(5), ContentType::Files);
        assert_eq!(ContentType::from_code(0), ContentType::Files);
        assert_eq!(ContentType::Video.category(), "video");
    }

    #[test]
    fn test_folder_counts() {
        let file = |id: &str| FileDescriptor {
            id: id.into(),
            ..Default::default()
        };
        let tree = FolderNode {
            files: vec![file("1")],
            children: vec![FolderNode {
                files: vec![file("2"), file("1")],
                children: vec![FolderNode::default()],
                ..Default::default()
            }],
            ..Default::default()
        };
        assert_eq!(tree.total_file_count(), 3);
        assert_eq!(tree.total_folder_count(), 2);
    }
}
