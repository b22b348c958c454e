// src/extractor/mod.rs

pub mod spaces;

pub use spaces::SpacesExtractor;

use crate::models::FileDescriptor;
use serde::Serialize;
use url::Url;

/// 列表页中的一个子文件夹
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct FolderDescriptor {
    pub id: Option<String>,
    pub name: String,
    pub url: String,
    /// 带密码保护的文件夹
    pub protected: bool,
}

/// 单个列表页的提取结果。提取不到任何内容时返回空列表，不视为错误。
#[derive(Debug, Clone, Default)]
pub struct PageListing {
    pub folders: Vec<FolderDescriptor>,
    pub files: Vec<FileDescriptor>,
    pub page_count: Option<u32>,
    /// 面包屑或标题中的文件夹名
    pub title: Option<String>,
}

/// 页面结构提取。实现必须是同步的，返回的数据不借用页面内容。
pub trait ListingExtractor: Send + Sync {
    fn extract_listing(&self, body: &str, page_url: &Url) -> PageListing;

    /// 在文件详情 (view) 页面中寻找真实的下载地址
    fn extract_download_link(&self, body: &str, page_url: &Url) -> Option<String>;
}
