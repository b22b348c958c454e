// src/cli.rs

use crate::{constants, models::SaveMode};
use clap::{Parser, ValueEnum, command, crate_version};
use std::path::PathBuf;

/// 定义日志输出级别
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

// command 属性
#[derive(Parser, Debug, Clone)]
#[command(
    version = crate_version!(),
    about,
    long_about = None,
    disable_help_flag = true,
    disable_version_flag = true,
)]
pub struct Cli {
    // --- 会话 (Session) ---
    /// 会话 Cookie 中 sid 的值，优先级最高
    #[arg(long, help_heading = "Session", conflicts_with = "cookies_file")]
    pub sid: Option<String>,
    /// 从文件读取 Cookie (cookies.txt 或 `name=value` 格式)
    #[arg(long, value_name = "FILE", help_heading = "Session")]
    pub cookies_file: Option<PathBuf>,
    /// 要备份的用户名 (默认使用上次保存的用户)
    #[arg(short, long, help_heading = "Session")]
    pub user: Option<String>,
    /// 显示如何获取 SID 的指南并退出
    #[arg(long, action = clap::ArgAction::SetTrue, help_heading = "Session")]
    pub sid_help: bool,

    // --- 扫描选项 (Scan) ---
    /// 只扫描指定分区 (例如 'pictures,music')，默认全部
    #[arg(short, long, value_delimiter = ',', value_name = "IDS", help_heading = "Scan")]
    pub sections: Option<Vec<String>>,
    /// 以交互方式选择分区并在结束后询问是否重试失败的文件
    #[arg(short, long, action = clap::ArgAction::SetTrue, help_heading = "Scan")]
    pub interactive: bool,
    /// 跳过带密码保护的文件夹
    #[arg(long, action = clap::ArgAction::SetTrue, help_heading = "Scan")]
    pub skip_protected: bool,
    /// 只扫描并显示目录树，不下载任何文件
    #[arg(long, action = clap::ArgAction::SetTrue, help_heading = "Scan")]
    pub dry_run: bool,
    /// 将扫描结果 (目录树与文件列表) 写入 JSON 文件
    #[arg(long, value_name = "FILE", help_heading = "Scan")]
    pub manifest: Option<PathBuf>,

    // --- 下载选项 (Download) ---
    /// 保存模式: structured (保留目录结构) 或 flat (全部放入同一目录)
    #[arg(long, value_enum, default_value_t = SaveMode::Structured, help_heading = "Download")]
    pub save_mode: SaveMode,
    /// 设置文件保存目录
    #[arg(short, long, value_name = "DIR", default_value_os_t = PathBuf::from(constants::DEFAULT_SAVE_DIR), help_heading = "Download")]
    pub output: PathBuf,
    /// 下载结束后自动重试一次失败的文件
    #[arg(long, action = clap::ArgAction::SetTrue, help_heading = "Download")]
    pub retry_failed: bool,

    // --- 通用选项 (General) ---
    /// 显示此帮助信息并退出
    #[arg(short = 'h', long, action = clap::ArgAction::Help, global = true, help_heading = "General")]
    _help: Option<bool>,
    /// 显示版本信息并退出
    #[arg(short = 'V', long, action = clap::ArgAction::Version, global = true, help_heading = "General")]
    _version: Option<bool>,
    /// (隐藏参数) 设置日志文件的输出级别，用于调试
    #[arg(long, value_enum, default_value_t = LogLevel::Off, global = true, hide = true)]
    pub log_level: LogLevel,
}

impl LogLevel {
    pub fn to_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}
