// src/models/progress.rs

use super::FileDescriptor;
use serde::{Deserialize, Serialize};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DownloadState {
    #[default]
    Pending,
    Downloading,
    Completed,
    Error,
}

/// 单个文件的下载进度。
///
/// 生命周期: Pending -> Downloading -> Completed | Error。
/// Error 可以重试，重试时回到 Downloading。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileProgress {
    pub file_id: String,
    pub file_name: String,
    pub state: DownloadState,
    pub percent: f64,
    /// 字节/秒
    pub speed: Option<f64>,
    #[serde(skip)]
    started_at: Option<Instant>,
}

impl FileProgress {
    pub fn pending(file: &FileDescriptor) -> Self {
        Self {
            file_id: file.id.clone(),
            file_name: file.file_name(),
            state: DownloadState::Pending,
            percent: 0.0,
            speed: None,
            started_at: None,
        }
    }

    /// 开始 (或重试) 下载。已完成或正在下载的条目返回 false。
    pub fn begin(&mut self) -> bool {
        match self.state {
            DownloadState::Pending | DownloadState::Error => {
                self.state = DownloadState::Downloading;
                self.percent = 0.0;
                self.speed = None;
                self.started_at = Some(Instant::now());
                true
            }
            DownloadState::Downloading | DownloadState::Completed => false,
        }
    }

    pub fn update(&mut self, downloaded: u64, total: Option<u64>) {
        if self.state != DownloadState::Downloading {
            return;
        }
        if let Some(total) = total.filter(|t| *t > 0) {
            self.percent = (downloaded as f64 / total as f64 * 100.0).min(100.0);
        }
        if let Some(started) = self.started_at {
            let elapsed = started.elapsed().as_secs_f64();
            if elapsed > 0.0 {
                self.speed = Some(downloaded as f64 / elapsed);
            }
        }
    }

    pub fn complete(&mut self) {
        self.state = DownloadState::Completed;
        self.percent = 100.0;
        self.speed = None;
    }

    pub fn fail(&mut self) {
        self.state = DownloadState::Error;
        self.speed = None;
    }

    pub fn is_retryable(&self) -> bool {
        self.state == DownloadState::Error
    }
}
