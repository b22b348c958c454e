// src/downloader/mod.rs

mod job;
mod task_processor;

pub use job::BackupDownloader;

use crate::{symbols, ui};
use colored::*;
use log::info;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadStats {
    pub total: usize,
    pub success: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// 一批下载任务的统计，以及跳过/失败的明细 (文件名, 原因)
#[derive(Debug, Default)]
pub struct DownloadManager {
    stats: DownloadStats,
    failed_downloads: Vec<(String, String)>,
    skipped_downloads: Vec<(String, String)>,
}

impl DownloadManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_batch(&mut self, total_tasks: usize) {
        info!("开始新一批下载任务，总数: {}", total_tasks);
        self.stats = DownloadStats {
            total: total_tasks,
            ..Default::default()
        };
        self.failed_downloads.clear();
        self.skipped_downloads.clear();
    }

    pub fn record_success(&mut self) {
        self.stats.success += 1;
    }

    pub fn record_skip(&mut self, filename: &str, reason: &str) {
        info!("跳过文件 '{}'，原因: {}", filename, reason);
        self.stats.skipped += 1;
        self.skipped_downloads
            .push((filename.to_string(), reason.to_string()));
    }

    pub fn record_failure(&mut self, filename: &str, reason: &str) {
        log::error!("文件 '{}' 下载失败: {}", filename, reason);
        self.stats.failed += 1;
        self.failed_downloads
            .push((filename.to_string(), reason.to_string()));
    }

    pub fn get_stats(&self) -> DownloadStats {
        self.stats.clone()
    }

    pub fn did_all_succeed(&self) -> bool {
        self.stats.failed == 0
    }

    pub fn print_report(&self) {
        let stats = &self.stats;
        info!(
            "下载报告: Total={}, Success={}, Skipped={}, Failed={}",
            stats.total, stats.success, stats.skipped, stats.failed
        );

        if !self.skipped_downloads.is_empty() || !self.failed_downloads.is_empty() {
            ui::print_sub_header("下载详情报告");
            if !self.skipped_downloads.is_empty() {
                println!("\n{} 跳过的文件 ({}个):", *symbols::INFO, stats.skipped);
                print_grouped_report(&self.skipped_downloads, |s| s.cyan());
            }
            if !self.failed_downloads.is_empty() {
                println!("\n{} 失败的文件 ({}个):", *symbols::ERROR, stats.failed);
                print_grouped_report(&self.failed_downloads, |s| s.red());
            }
        }
        ui::print_sub_header("任务总结");
        if stats.total > 0 && stats.failed == 0 {
            println!(
                "{} 所有 {} 个文件均已处理 ({} 个已跳过)。",
                *symbols::OK,
                stats.total,
                stats.skipped
            );
        } else {
            println!(
                "{} | {} | {}",
                format!("成功: {}", stats.success).green(),
                format!("失败: {}", stats.failed).red(),
                format!("跳过: {}", stats.skipped).yellow()
            );
        }
    }
}

// 按原因分组输出，原因和文件名都排序
fn print_grouped_report(items: &[(String, String)], color_fn: fn(ColoredString) -> ColoredString) {
    let mut grouped: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (filename, reason) in items {
        grouped.entry(reason.as_str()).or_default().push(filename.as_str());
    }
    for (reason, mut filenames) in grouped {
        println!("  - {}", color_fn(format!("原因: {}", reason).into()));
        filenames.sort();
        for filename in filenames {
            println!("    - {}", filename);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_resets_stats() {
        let mut manager = DownloadManager::new();
        manager.start_batch(3);
        manager.record_success();
        manager.record_skip("a.jpg", "已完成");
        manager.record_failure("b.mp3", "服务器返回错误 404");
        assert_eq!(
            manager.get_stats(),
            DownloadStats { total: 3, success: 1, skipped: 1, failed: 1 }
        );
        assert!(!manager.did_all_succeed());

        manager.start_batch(1);
        assert_eq!(manager.get_stats().failed, 0);
        assert!(manager.did_all_succeed());
    }
}
