// src/downloader/task_processor.rs

use crate::{
    BackupJobContext,
    client::PageFetcher,
    constants,
    cookies::SessionCookies,
    error::*,
    models::{FileDescriptor, FileProgress, SaveMode},
    ui, urls, utils,
};
use futures::StreamExt;
use indicatif::{MultiProgress, ProgressBar};
use log::{debug, info, warn};
use md5::{Digest, Md5};
use reqwest::{Response, header};
use std::{
    fs,
    io::Write as IoWrite,
    path::{Path, PathBuf},
};
use url::Url;

/// `TaskProcessor` 负责单个文件: 解析真实下载地址、流式下载并保存到磁盘。
pub struct TaskProcessor<'a> {
    context: &'a BackupJobContext,
    output_root: &'a Path,
}

impl<'a> TaskProcessor<'a> {
    pub fn new(context: &'a BackupJobContext, output_root: &'a Path) -> Self {
        Self {
            context,
            output_root,
        }
    }

    /// 播放器直链 > 已知的 download 地址 > 从 view 页面提取 > 按 id 构造的 download 地址
    pub async fn resolve_download_url(
        &self,
        file: &FileDescriptor,
        cookies: &mut SessionCookies,
    ) -> AppResult<String> {
        if let Some(direct) = file.direct_url.as_deref().filter(|u| !u.is_empty()) {
            return Ok(direct.to_string());
        }
        if urls::is_download_url(&file.resolved_url) {
            return Ok(file.resolved_url.clone());
        }

        let config = &self.context.config;
        let view_url = if urls::is_view_url(&file.resolved_url) {
            file.resolved_url.clone()
        } else {
            config.build_file_url(file.content_type, &file.id, "view")
        };
        let fallback = config.build_file_url(file.content_type, &file.id, "download");

        debug!("文件 '{}' 没有直接下载地址，读取详情页: {}", file.file_name(), view_url);
        let fetched = self.context.http_client.fetch_page(&view_url, cookies).await;
        // 详情页请求与随后的文件请求之间同样保持固定间隔
        if !config.request_delay.is_zero() {
            tokio::time::sleep(config.request_delay).await;
        }
        let page = match fetched {
            Ok(page) => page,
            Err(e) => {
                warn!("读取详情页 {} 失败 ({})，使用默认下载地址", view_url, e);
                return Ok(fallback);
            }
        };
        cookies.merge(&page.set_cookies);

        let page_url = Url::parse(&view_url)?;
        match self
            .context
            .extractor
            .extract_download_link(&page.body, &page_url)
        {
            Some(link) => Ok(link),
            None => {
                warn!("详情页中没有找到下载链接，使用默认下载地址: {}", fallback);
                Ok(fallback)
            }
        }
    }

    /// 下载文件并返回最终保存路径
    pub async fn download(
        &self,
        file: &FileDescriptor,
        url: &str,
        cookies: &SessionCookies,
        progress: &mut FileProgress,
        multi: &MultiProgress,
    ) -> AppResult<PathBuf> {
        let res = self.context.http_client.get_stream(url, cookies).await?;
        let final_url = res.url().to_string();
        let content_type = res
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let total = res.content_length().filter(|len| *len > 0);

        let file_name = final_file_name(file, &final_url, content_type.as_deref());
        let relative = relative_save_path(file, &file_name, self.context.config.save_mode);
        fs::create_dir_all(self.output_root)?;
        let target = utils::secure_join_path(self.output_root, &relative)?;

        let pbar = multi.add(ui::new_bytes_progress_bar(total, "文件"));
        pbar.set_message(utils::truncate_text(&file_name, constants::FILENAME_TRUNCATE_LENGTH));
        let result = self
            .save_stream(res, &target, &file_name, total, progress, &pbar)
            .await;
        pbar.finish_and_clear();
        multi.remove(&pbar);
        result
    }

    async fn save_stream(
        &self,
        res: Response,
        target: &Path,
        file_name: &str,
        total: Option<u64>,
        progress: &mut FileProgress,
        pbar: &ProgressBar,
    ) -> AppResult<PathBuf> {
        let parent = target
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.output_root.to_path_buf());
        fs::create_dir_all(&parent)?;

        let mut temp = tempfile::Builder::new()
            .prefix(".part-")
            .tempfile_in(&parent)?;
        let mut hasher = Md5::new();
        let mut downloaded: u64 = 0;
        let mut stream = res.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            temp.as_file_mut().write_all(&chunk)?;
            hasher.update(&chunk);
            downloaded += chunk.len() as u64;
            progress.update(downloaded, total);
            pbar.set_position(downloaded);
        }
        temp.as_file_mut().flush()?;
        let md5_hex = format!("{:x}", hasher.finalize());

        let final_path = if target.exists() {
            if utils::calculate_file_md5(target)? == md5_hex {
                info!("'{}' 已存在且内容相同，不再重复保存", target.display());
                return Ok(target.to_path_buf());
            }
            let renamed = parent.join(utils::collision_file_name(file_name, &md5_hex));
            info!("'{}' 已存在，改名保存为 '{}'", target.display(), renamed.display());
            renamed
        } else {
            target.to_path_buf()
        };
        temp.persist(&final_path)?;
        debug!("已保存 {} 字节到 {}", downloaded, final_path.display());
        Ok(final_path)
    }
}

/// 最终文件名: 下载地址中的扩展名优先，其次是页面上的扩展名，最后按 Content-Type 推断
pub(super) fn final_file_name(
    file: &FileDescriptor,
    final_url: &str,
    content_type: Option<&str>,
) -> String {
    let mut stem = file.display_name.trim().to_string();
    let mut extension = file.extension.trim().to_string();
    if stem.is_empty()
        && let Some(from_url) = urls::file_name_from_url(final_url)
    {
        let (url_stem, url_ext) = utils::split_name_extension(&from_url);
        stem = url_stem;
        if extension.is_empty() {
            extension = url_ext;
        }
    }
    if let Some(url_ext) = urls::extension_from_url(final_url) {
        extension = url_ext;
    }
    if extension.is_empty()
        && let Some(ext) = content_type.and_then(urls::extension_from_content_type)
    {
        extension = ext.to_string();
    }
    if !extension.is_empty() && !extension.starts_with('.') {
        extension.insert(0, '.');
    }
    let stem = if stem.is_empty() { file.id.clone() } else { stem };
    utils::sanitize_filename(&format!("{}{}", stem, extension))
}

/// structured 模式保留逻辑路径中的目录部分，flat 模式只保留文件名
pub(super) fn relative_save_path(file: &FileDescriptor, file_name: &str, mode: SaveMode) -> PathBuf {
    match mode {
        SaveMode::Flat => PathBuf::from(file_name),
        SaveMode::Structured => {
            let dir = file
                .logical_path
                .rsplit_once('/')
                .map(|(dir, _)| dir)
                .unwrap_or_default();
            utils::sanitize_relative_path(dir).join(file_name)
        }
    }
}
