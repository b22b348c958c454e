// src/lib.rs

pub mod cli;
pub mod client;
pub mod config;
pub mod constants;
pub mod cookies;
pub mod downloader;
pub mod error;
pub mod extractor;
pub mod models;
pub mod scanner;
pub mod symbols;
pub mod ui;
pub mod urls;
pub mod utils;

use crate::{
    cli::Cli,
    client::{PageFetcher, RobustClient},
    config::{
        AppConfig,
        state::{self, PersistedState},
    },
    cookies::SessionCookies,
    downloader::BackupDownloader,
    error::{AppError, AppResult},
    extractor::{ListingExtractor, SpacesExtractor},
    models::Section,
    scanner::{FolderScanner, ScanReport, SectionOrchestrator},
};
use colored::*;
use log::{debug, info, warn};
use serde_json::json;
use std::{
    fs,
    path::Path,
    sync::{Arc, atomic::AtomicBool},
};

/// 核心的执行上下文，包含扫描与下载共用的配置和工具
#[derive(Clone)]
pub struct BackupJobContext {
    pub config: Arc<AppConfig>,
    pub http_client: Arc<RobustClient>,
    pub extractor: Arc<dyn ListingExtractor>,
    pub cancellation_token: Arc<AtomicBool>,
}

impl BackupJobContext {
    pub fn new(config: Arc<AppConfig>, cancellation_token: Arc<AtomicBool>) -> AppResult<Self> {
        let http_client = Arc::new(RobustClient::new(config.clone())?);
        Ok(Self {
            config,
            http_client,
            extractor: Arc::new(SpacesExtractor::new()),
            cancellation_token,
        })
    }

    pub fn folder_scanner(&self) -> FolderScanner {
        let fetcher: Arc<dyn PageFetcher> = self.http_client.clone();
        FolderScanner::new(
            fetcher,
            self.extractor.clone(),
            &self.config,
            self.cancellation_token.clone(),
        )
    }
}

/// 库的公共入口点，由 `main.rs` 调用
pub async fn run_from_cli(args: Arc<Cli>, cancellation_token: Arc<AtomicBool>) -> AppResult<()> {
    debug!("CLI 参数: {:?}", args);
    if args.sid_help {
        ui::box_message(
            "获取 SID 指南",
            constants::HELP_SID_GUIDE
                .lines()
                .collect::<Vec<_>>()
                .as_slice(),
            |s| s.cyan(),
        );
        println!(
            "\n{} 安全提醒: SID 等同于你的登录状态，请不要分享给他人。",
            *symbols::INFO
        );
        return Ok(());
    }

    let config = Arc::new(AppConfig::new(&args)?);
    debug!("加载的应用配置: {:?}", config);

    let mut persisted = state::load_state();
    let cookies = resolve_cookies(&args, &persisted)?;
    let username = resolve_username(&args, &persisted)?;
    ui::info(&format!("备份用户: {}", username.bold()));

    let context = BackupJobContext::new(config.clone(), cancellation_token)?;
    let sections = config.build_sections(&username);
    let selected = select_sections(&args, &sections)?;
    if selected.is_empty() {
        ui::info("未选择任何分区，任务结束。");
        return Ok(());
    }

    persisted.user = Some(username.clone());
    persisted.cookies = Some(cookies.clone());
    persisted.sections = sections.clone();
    state::save_state(&persisted)?;

    let report = scan(&context, &username, &sections, &selected, &cookies, &persisted).await?;
    persisted.cookies = Some(report.cookies.clone());
    state::save_state(&persisted)?;

    if let Some(manifest_path) = &args.manifest {
        write_manifest(manifest_path, &username, &report)?;
        ui::info(&format!("扫描结果已写入: {}", manifest_path.display()));
    }

    if args.dry_run {
        ui::info("--dry-run: 只扫描，不下载任何文件。");
        return Ok(());
    }
    if report.files.is_empty() {
        ui::info("没有发现任何可下载的文件。");
        return Ok(());
    }

    ui::print_header(&format!(
        "开始下载 {} 个文件 (按 {} 可中断)",
        report.files.len(),
        *symbols::CTRL_C
    ));
    let mut downloader = BackupDownloader::new(
        context,
        &args.output,
        &username,
        report.cookies.clone(),
        report.progress.clone(),
    );
    let download_result = download_with_retry(&mut downloader, &args, &report).await;

    persisted.cookies = Some(downloader.cookies().clone());
    state::save_state(&persisted)?;
    download_result?;

    downloader.print_report();
    if !downloader.manager().did_all_succeed() {
        ui::warn("部分文件下载失败，可以稍后重新运行 (内容相同的文件不会重复保存)。");
    }
    Ok(())
}

fn resolve_cookies(args: &Cli, persisted: &PersistedState) -> AppResult<SessionCookies> {
    let (cookies, source) =
        state::resolve_session(args.sid.as_deref(), args.cookies_file.as_deref(), persisted)?;
    if let Some(cookies) = cookies {
        info!("从 {} 加载会话", source);
        ui::info(&format!("已从 {} 加载会话。", source));
        return Ok(cookies);
    }
    if args.interactive {
        let sid = ui::prompt_hidden("请输入 SID (输入内容不会显示)")
            .map_err(|_| AppError::UserInterrupt)?;
        let cookies = SessionCookies::parse(&sid);
        if cookies.sid().is_some() {
            return Ok(cookies);
        }
    }
    Err(AppError::SessionMissing)
}

fn resolve_username(args: &Cli, persisted: &PersistedState) -> AppResult<String> {
    if let Some(user) = args.user.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
        return Ok(user.to_string());
    }
    if let Some(user) = persisted.user.as_deref().filter(|u| !u.is_empty()) {
        debug!("使用上次保存的用户: {}", user);
        return Ok(user.to_string());
    }
    if args.interactive {
        let user = ui::prompt("请输入要备份的用户名", None).map_err(|_| AppError::UserInterrupt)?;
        if !user.is_empty() {
            return Ok(user);
        }
    }
    Err(AppError::UserMissing)
}

/// `--sections` > 交互菜单 > 全部分区
fn select_sections(args: &Cli, sections: &[Section]) -> AppResult<Vec<String>> {
    if let Some(ids) = &args.sections {
        let ids: Vec<String> = ids
            .iter()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        for id in &ids {
            if !sections.iter().any(|s| &s.id == id) {
                let valid = sections.iter().map(|s| s.id.as_str()).collect::<Vec<_>>().join(", ");
                return Err(AppError::UserInputError(format!(
                    "无效的分区 '{}'。有效选项: {}",
                    id, valid
                )));
            }
        }
        return Ok(ids);
    }
    if args.interactive {
        let options: Vec<String> = sections
            .iter()
            .map(|s| format!("{} ({})", s.name, s.id))
            .collect();
        let indices = ui::get_user_choices_from_menu(&options, "选择要备份的分区", "all");
        return Ok(indices.into_iter().map(|i| sections[i].id.clone()).collect());
    }
    Ok(sections.iter().map(|s| s.id.clone()).collect())
}

async fn scan(
    context: &BackupJobContext,
    username: &str,
    sections: &[Section],
    selected: &[String],
    cookies: &SessionCookies,
    persisted: &PersistedState,
) -> AppResult<ScanReport> {
    ui::print_header(&format!("扫描 {} 个分区 (按 {} 可中断)", selected.len(), *symbols::CTRL_C));
    let orchestrator = SectionOrchestrator::new(context.folder_scanner());

    // 每次 Cookie 变化都立即写入本地状态
    let mut snapshot = persisted.clone();
    let mut on_update = |updated: &SessionCookies| {
        snapshot.cookies = Some(updated.clone());
        if let Err(e) = state::save_state(&snapshot) {
            warn!("保存会话状态失败: {}", e);
        }
    };
    let report = orchestrator
        .scan_sections(username, sections, selected, cookies, &mut on_update)
        .await?;

    ui::print_sub_header("扫描结果");
    ui::print_tree(&report.root);
    for err in &report.section_errors {
        ui::error(&format!("分区 '{}' 扫描失败: {}", err.section_name, err.message));
    }
    ui::info(&format!(
        "共发现 {} 个文件 (已去重)。",
        report.files.len()
    ));
    if !report.section_errors.is_empty() {
        ui::warn(&format!(
            "{} 个分区扫描失败，只会下载其余分区中的文件。",
            report.section_errors.len()
        ));
    }
    Ok(report)
}

fn write_manifest(path: &Path, username: &str, report: &ScanReport) -> AppResult<()> {
    let manifest = json!({
        "user": username,
        "generated_at": chrono::Local::now().to_rfc3339(),
        "root": report.root,
        "files": report.files,
        "section_errors": report.section_errors,
    });
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    fs::write(path, serde_json::to_string_pretty(&manifest)?)?;
    Ok(())
}

async fn download_with_retry(
    downloader: &mut BackupDownloader,
    args: &Cli,
    report: &ScanReport,
) -> AppResult<()> {
    downloader.run(&report.files).await?;

    let failed = downloader.failed_files(&report.files).len();
    if failed == 0 {
        return Ok(());
    }
    let retry = if args.retry_failed {
        true
    } else if args.interactive {
        downloader.print_report();
        ui::confirm(&format!("有 {} 个文件下载失败，是否重试?", failed), true)
    } else {
        false
    };
    if retry {
        ui::info(&format!("重试 {} 个失败的文件...", failed));
        downloader.retry_failed(&report.files).await?;
    }
    Ok(())
}
