// src/scanner/orchestrator.rs

use super::{CookieCallback, FolderScanner, collect_all_files, dedup_files};
use crate::{
    cookies::SessionCookies,
    error::{AppError, AppResult},
    models::{FileDescriptor, FileProgress, FolderNode, Section, SectionError},
};
use log::{error, info, warn};
use serde::Serialize;

/// 一次多分区扫描的汇总结果
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    /// 合成的根节点 (id 为 `root`，名称为用户名)，子节点是各分区的根
    pub root: FolderNode,
    /// 跨分区去重后的文件列表
    pub files: Vec<FileDescriptor>,
    pub progress: Vec<FileProgress>,
    pub section_errors: Vec<SectionError>,
    #[serde(skip)]
    pub cookies: SessionCookies,
}

pub struct SectionOrchestrator {
    scanner: FolderScanner,
}

impl SectionOrchestrator {
    pub fn new(scanner: FolderScanner) -> Self {
        Self { scanner }
    }

    /// 按分区顺序依次扫描选中的分区。
    ///
    /// 单个分区失败只记录错误，不影响其余分区；用户中断直接返回。
    pub async fn scan_sections(
        &self,
        username: &str,
        sections: &[Section],
        selected: &[String],
        cookies: &SessionCookies,
        on_cookies_update: &mut CookieCallback<'_>,
    ) -> AppResult<ScanReport> {
        for id in selected {
            if !sections.iter().any(|s| &s.id == id) {
                warn!("未知的分区 '{}'，已忽略", id);
            }
        }

        let mut current = cookies.clone();
        let mut section_roots = Vec::new();
        let mut section_errors = Vec::new();

        for section in sections.iter().filter(|s| selected.contains(&s.id)) {
            info!("开始扫描分区 '{}' ({})", section.name, section.url);
            let mut latest = current.clone();
            let result = {
                let mut forward = |updated: &SessionCookies| {
                    latest = updated.clone();
                    on_cookies_update(updated);
                };
                self.scanner
                    .scan(&section.url, &current, &section.folder_name, &mut forward)
                    .await
            };
            // 失败的分区中途拿到的 Cookie 同样向后传递
            current = latest;

            match result {
                Ok(mut node) => {
                    node.name = section.folder_name.clone();
                    node.path = section.folder_name.clone();
                    info!(
                        "分区 '{}' 扫描完成: {} 个文件",
                        section.name,
                        node.total_file_count()
                    );
                    section_roots.push(node);
                }
                Err(AppError::UserInterrupt) => return Err(AppError::UserInterrupt),
                Err(e) => {
                    error!("分区 '{}' 扫描失败: {}", section.name, e);
                    section_errors.push(SectionError {
                        section_id: section.id.clone(),
                        section_name: section.name.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        let files = dedup_files(section_roots.iter().flat_map(collect_all_files));
        let progress = files.iter().map(FileProgress::pending).collect();
        let root = FolderNode {
            id: "root".to_string(),
            name: username.to_string(),
            children: section_roots,
            ..Default::default()
        };

        Ok(ScanReport {
            root,
            files,
            progress,
            section_errors,
            cookies: current,
        })
    }
}
