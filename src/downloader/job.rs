// src/downloader/job.rs

use super::{DownloadManager, task_processor::TaskProcessor};
use crate::{
    BackupJobContext, constants,
    cookies::SessionCookies,
    error::*,
    models::{DownloadState, FileDescriptor, FileError, FileProgress},
    symbols, ui, utils,
};
use colored::*;
use indicatif::MultiProgress;
use log::{debug, error, info};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::atomic::Ordering,
};

/// 顺序下载扫描得到的文件列表。
///
/// 每个文件的状态保存在 `progress` 中，失败记录按文件名保存在 `errors` 中，
/// 已完成的文件在后续 `run` / `retry_failed` 中会被跳过。
pub struct BackupDownloader {
    context: BackupJobContext,
    output_root: PathBuf,
    cookies: SessionCookies,
    progress: HashMap<String, FileProgress>,
    errors: Vec<FileError>,
    manager: DownloadManager,
}

impl BackupDownloader {
    /// 文件保存到 `<output>/<username>/` 下
    pub fn new(
        context: BackupJobContext,
        output_dir: &Path,
        username: &str,
        cookies: SessionCookies,
        initial_progress: Vec<FileProgress>,
    ) -> Self {
        let user_dir = utils::sanitize_filename(username);
        let user_dir = if user_dir == "unknown" || user_dir == "unnamed" {
            constants::DEFAULT_USER_DIR.to_string()
        } else {
            user_dir
        };
        Self {
            context,
            output_root: output_dir.join(user_dir),
            cookies,
            progress: initial_progress
                .into_iter()
                .map(|p| (p.file_id.clone(), p))
                .collect(),
            errors: Vec::new(),
            manager: DownloadManager::new(),
        }
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    pub fn cookies(&self) -> &SessionCookies {
        &self.cookies
    }

    pub fn progress(&self, file_id: &str) -> Option<&FileProgress> {
        self.progress.get(file_id)
    }

    pub fn errors(&self) -> &[FileError] {
        &self.errors
    }

    pub fn manager(&self) -> &DownloadManager {
        &self.manager
    }

    pub fn failed_files<'f>(&self, files: &'f [FileDescriptor]) -> Vec<&'f FileDescriptor> {
        files
            .iter()
            .filter(|f| self.progress.get(&f.id).is_some_and(FileProgress::is_retryable))
            .collect()
    }

    /// 按列表顺序下载所有未完成的文件。单个文件失败不会中断循环。
    pub async fn run(&mut self, files: &[FileDescriptor]) -> AppResult<()> {
        fs::create_dir_all(&self.output_root)?;
        let absolute = dunce::canonicalize(&self.output_root)?;
        info!("文件将保存到目录: \"{}\"", absolute.display());
        ui::info(&format!("文件将保存到目录: \"{}\"", absolute.display()));

        self.manager.start_batch(files.len());
        let multi = MultiProgress::new();
        let main_pbar = multi.add(ui::new_tasks_progress_bar(files.len() as u64, "总进度"));

        let mut attempted = false;
        for file in files {
            if self.context.cancellation_token.load(Ordering::Relaxed) {
                main_pbar.abandon();
                return Err(AppError::UserInterrupt);
            }
            let file_name = file.file_name();
            let entry = self
                .progress
                .entry(file.id.clone())
                .or_insert_with(|| FileProgress::pending(file));
            if entry.state == DownloadState::Completed {
                self.manager.record_skip(&file_name, "已下载完成");
                main_pbar.println(format!("{} {}", *symbols::SKIP, file_name.dimmed()));
                main_pbar.inc(1);
                continue;
            }

            if attempted && !self.context.config.download_delay.is_zero() {
                tokio::time::sleep(self.context.config.download_delay).await;
            }
            attempted = true;

            main_pbar.set_message(utils::truncate_text(&file_name, 30));
            match self.download_one(file, &multi).await {
                Ok(path) => {
                    if let Some(p) = self.progress.get_mut(&file.id) {
                        p.complete();
                    }
                    self.errors.retain(|e| e.file_name != file_name);
                    self.manager.record_success();
                    let size = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
                    main_pbar.println(format!(
                        "{} {} ({})",
                        *symbols::OK,
                        path.display(),
                        utils::format_bytes(size)
                    ));
                }
                Err(AppError::UserInterrupt) => {
                    if let Some(p) = self.progress.get_mut(&file.id) {
                        p.fail();
                    }
                    main_pbar.abandon();
                    return Err(AppError::UserInterrupt);
                }
                Err(e) => {
                    error!("下载 '{}' 失败: {}", file_name, e);
                    if let Some(p) = self.progress.get_mut(&file.id) {
                        p.fail();
                    }
                    self.record_error(file, &file_name, &e);
                    main_pbar.println(format!(
                        "{} {} {}",
                        *symbols::ERROR,
                        file_name,
                        format!("失败: {}", e).red()
                    ));
                }
            }
            main_pbar.inc(1);
        }
        main_pbar.finish_and_clear();
        Ok(())
    }

    /// 只重新下载状态为失败的文件
    pub async fn retry_failed(&mut self, files: &[FileDescriptor]) -> AppResult<()> {
        let retry: Vec<FileDescriptor> = self.failed_files(files).into_iter().cloned().collect();
        if retry.is_empty() {
            debug!("没有需要重试的文件");
            return Ok(());
        }
        info!("重试 {} 个失败的文件", retry.len());
        self.run(&retry).await
    }

    pub fn print_report(&self) {
        self.manager.print_report();
    }

    async fn download_one(&mut self, file: &FileDescriptor, multi: &MultiProgress) -> AppResult<PathBuf> {
        let processor = TaskProcessor::new(&self.context, &self.output_root);
        let Some(progress) = self.progress.get_mut(&file.id) else {
            return Err(AppError::Other(anyhow::anyhow!("缺少文件 {} 的进度记录", file.id)));
        };
        if !progress.begin() {
            debug!("文件 '{}' 当前状态 {:?}，不重复下载", file.file_name(), progress.state);
        }

        let url = processor.resolve_download_url(file, &mut self.cookies).await?;
        debug!("文件 '{}' 的下载地址: {}", file.file_name(), url);
        if self.context.cancellation_token.load(Ordering::Relaxed) {
            return Err(AppError::UserInterrupt);
        }

        processor
            .download(file, &url, &self.cookies, progress, multi)
            .await
    }

    fn record_error(&mut self, file: &FileDescriptor, file_name: &str, err: &AppError) {
        let message = err.to_string();
        self.errors.retain(|e| e.file_name != file_name);
        self.errors.push(FileError {
            file_id: file.id.clone(),
            file_name: file_name.to_string(),
            message: message.clone(),
        });
        self.manager.record_failure(file_name, &message);
    }
}
