// src/scanner/mod.rs

mod dedup;
pub mod orchestrator;

pub use dedup::{collect_all_files, dedup_files};
pub use orchestrator::{ScanReport, SectionOrchestrator};

use crate::{
    client::{FetchedPage, PageFetcher},
    config::AppConfig,
    constants,
    cookies::SessionCookies,
    error::{AppError, AppResult},
    extractor::{FolderDescriptor, ListingExtractor, PageListing},
    models::FolderNode,
    urls,
    utils::join_logical_path,
};
use futures::future::BoxFuture;
use log::{debug, info, warn};
use std::{
    collections::HashSet,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};
use url::Url;

/// 扫描过程中 Cookie 发生变化时的回调
pub type CookieCallback<'a> = dyn FnMut(&SessionCookies) + Send + 'a;

/// 一次 `scan` 调用的可变状态，在递归中以 `&mut` 传递
struct ScanSession<'s> {
    cookies: SessionCookies,
    /// 当前递归链上正在扫描的地址
    in_flight: HashSet<String>,
    on_cookies_update: &'s mut CookieCallback<'s>,
}

/// 递归扫描一个列表地址，生成完整的目录树。
///
/// 所有请求严格顺序执行，两次请求之间固定等待 `request_delay`。
/// 间隔跨越多次 `scan` 调用 (例如连续扫描多个分区) 同样生效。
pub struct FolderScanner {
    fetcher: Arc<dyn PageFetcher>,
    extractor: Arc<dyn ListingExtractor>,
    request_delay: Duration,
    skip_protected: bool,
    cancellation_token: Arc<AtomicBool>,
    synthetic_ids: AtomicU64,
    /// 是否已经发出过请求，第一次请求之前不等待
    fetched_any: AtomicBool,
}

impl FolderScanner {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        extractor: Arc<dyn ListingExtractor>,
        config: &AppConfig,
        cancellation_token: Arc<AtomicBool>,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            request_delay: config.request_delay,
            skip_protected: config.skip_protected,
            cancellation_token,
            synthetic_ids: AtomicU64::new(0),
            fetched_any: AtomicBool::new(false),
        }
    }

    pub async fn scan(
        &self,
        root_url: &str,
        cookies: &SessionCookies,
        parent_path: &str,
        on_cookies_update: &mut CookieCallback<'_>,
    ) -> AppResult<FolderNode> {
        let mut session = ScanSession {
            cookies: cookies.clone(),
            in_flight: HashSet::new(),
            on_cookies_update,
        };
        self.scan_folder(&mut session, root_url.to_string(), parent_path.to_string(), None)
            .await
    }

    fn check_cancelled(&self) -> AppResult<()> {
        if self.cancellation_token.load(Ordering::Relaxed) {
            return Err(AppError::UserInterrupt);
        }
        Ok(())
    }

    fn scan_folder<'a, 's: 'a>(
        &'a self,
        session: &'a mut ScanSession<'s>,
        url: String,
        parent_path: String,
        descriptor: Option<FolderDescriptor>,
    ) -> BoxFuture<'a, AppResult<FolderNode>> {
        Box::pin(async move {
            self.check_cancelled()?;
            if !session.in_flight.insert(url.clone()) {
                warn!("检测到循环链接，不再进入: {}", url);
                let (name, path) = resolve_name_and_path(&url, &parent_path, None, descriptor.as_ref());
                return Ok(FolderNode {
                    id: self.folder_id(&url, descriptor.as_ref()),
                    name,
                    source_url: url,
                    path,
                    ..Default::default()
                });
            }
            let result = self.scan_listing(session, &url, &parent_path, descriptor).await;
            session.in_flight.remove(&url);
            result
        })
    }

    async fn scan_listing(
        &self,
        session: &mut ScanSession<'_>,
        url: &str,
        parent_path: &str,
        descriptor: Option<FolderDescriptor>,
    ) -> AppResult<FolderNode> {
        debug!("扫描文件夹: {}", url);
        let page = self.fetch(session, url).await?;
        let PageListing {
            folders,
            mut files,
            page_count,
            title,
        } = self.extract(&page, url)?;

        if let Some(total) = page_count.filter(|n| *n > 1) {
            debug!("{} 共 {} 页", url, total);
            for page_no in 2..=total {
                let page_url = urls::add_pagination(url, page_no);
                let page = self.fetch(session, &page_url).await?;
                let listing = self.extract(&page, &page_url)?;
                // 子文件夹只从第 1 页读取
                if !listing.folders.is_empty() {
                    warn!(
                        "{} 第 {} 页出现了 {} 个子文件夹，已忽略",
                        url,
                        page_no,
                        listing.folders.len()
                    );
                }
                files.extend(listing.files);
            }
        }

        let (name, current_path) =
            resolve_name_and_path(url, parent_path, title.as_deref(), descriptor.as_ref());

        let mut children = Vec::with_capacity(folders.len());
        for folder in folders {
            if folder.protected && self.skip_protected {
                info!("跳过带密码的文件夹: {} ({})", folder.name, folder.url);
                continue;
            }
            let child_url = folder.url.clone();
            let child = self
                .scan_folder(session, child_url, current_path.clone(), Some(folder))
                .await?;
            children.push(child);
        }

        for file in &mut files {
            file.logical_path = join_logical_path(&current_path, &file.file_name());
        }

        debug!(
            "文件夹 '{}' 完成: {} 个文件, {} 个子文件夹",
            current_path,
            files.len(),
            children.len()
        );
        Ok(FolderNode {
            id: self.folder_id(url, descriptor.as_ref()),
            name,
            source_url: url.to_string(),
            path: current_path,
            files,
            children,
        })
    }

    async fn fetch(&self, session: &mut ScanSession<'_>, url: &str) -> AppResult<FetchedPage> {
        self.check_cancelled()?;
        if self.fetched_any.swap(true, Ordering::Relaxed) && !self.request_delay.is_zero() {
            tokio::time::sleep(self.request_delay).await;
            self.check_cancelled()?;
        }

        let page = self.fetcher.fetch_page(url, &session.cookies).await?;
        if session.cookies.merge(&page.set_cookies) {
            debug!("会话 Cookie 已更新 ({} 个)", session.cookies.len());
            (session.on_cookies_update)(&session.cookies);
        }
        Ok(page)
    }

    fn extract(&self, page: &FetchedPage, url: &str) -> AppResult<PageListing> {
        let page_url = Url::parse(url)?;
        Ok(self.extractor.extract_listing(&page.body, &page_url))
    }

    /// `Link_id` 参数 > 列表中的 id > 地址中的 `-<id>` > 合成 id
    fn folder_id(&self, url: &str, descriptor: Option<&FolderDescriptor>) -> String {
        urls::link_id(url)
            .or_else(|| descriptor.and_then(|d| d.id.clone()).filter(|id| !id.is_empty()))
            .or_else(|| urls::folder_id_from_url(url))
            .unwrap_or_else(|| {
                let n = self.synthetic_ids.fetch_add(1, Ordering::Relaxed) + 1;
                format!("{}{}", constants::SYNTHETIC_ID_PREFIX, n)
            })
    }
}

/// 分区根不产生路径段；其余文件夹按 标题 > 列表中的名称 > 地址中的名称 取名
fn resolve_name_and_path(
    url: &str,
    parent_path: &str,
    title: Option<&str>,
    descriptor: Option<&FolderDescriptor>,
) -> (String, String) {
    if urls::is_section_root(url) {
        return (String::new(), parent_path.to_string());
    }
    let name = title
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .or_else(|| {
            descriptor
                .map(|d| d.name.trim().to_string())
                .filter(|n| !n.is_empty())
        })
        .or_else(|| urls::folder_name_from_url(url))
        .unwrap_or_else(|| constants::UNKNOWN_FOLDER_NAME.to_string());
    let path = join_logical_path(parent_path, &name);
    (name, path)
}
