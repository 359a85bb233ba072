//! 应用配置模块

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// 对象存储连接配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreConfig {
    /// S3 兼容端点（MinIO、R2 等只需改这里和凭证）
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    #[serde(default = "default_region")]
    pub region: String,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

/// 传输配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferConfig {
    /// 最大并发传输数（1 表示严格串行）
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_transfers: usize,
    /// 最大重试次数（0 表示失败不重试）
    #[serde(default)]
    pub max_retries: u32,
    /// 重试基础延迟（毫秒）
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    /// 存在对象级失败时进程以非零码退出
    #[serde(default)]
    pub fail_on_object_errors: bool,
    /// 暂存目录（默认使用系统临时目录）
    #[serde(default)]
    pub staging_dir: Option<PathBuf>,
}

fn default_max_concurrent() -> usize {
    4
}

fn default_retry_base_delay_ms() -> u64 {
    2000
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            max_concurrent_transfers: default_max_concurrent(),
            max_retries: 0,
            retry_base_delay_ms: default_retry_base_delay_ms(),
            fail_on_object_errors: false,
            staging_dir: None,
        }
    }
}

/// 配置文件原始结构
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    source: StoreConfig,
    destination: StoreConfig,
    #[serde(default)]
    prefixes: Vec<String>,
    #[serde(default)]
    start_time: Option<String>,
    #[serde(default)]
    transfer: TransferConfig,
}

/// 一次运行的完整配置，启动时解析一次后只读
#[derive(Debug, Clone)]
pub struct Settings {
    pub source: StoreConfig,
    pub destination: StoreConfig,
    pub prefixes: Vec<String>,
    /// 同步起点：修改时间早于该时刻的对象不迁移
    pub cutoff: DateTime<Utc>,
    pub transfer: TransferConfig,
}

impl Settings {
    /// 从配置文件加载。缺少 startTime 或文件不可读属于致命错误，
    /// 调用方应在任何传输开始前退出。
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("无法读取配置文件: {}", path.display()))?;
        let file: SettingsFile = serde_json::from_str(&content)
            .with_context(|| format!("配置文件格式错误: {}", path.display()))?;
        Self::resolve(file)
    }

    fn resolve(file: SettingsFile) -> Result<Self> {
        let start_time = match file.start_time {
            Some(s) => s,
            None => bail!("配置缺少 startTime，必须指定同步起点时间"),
        };
        let cutoff = parse_cutoff(&start_time)
            .with_context(|| format!("无法解析 startTime: {}", start_time))?;

        Ok(Self {
            source: file.source,
            destination: file.destination,
            prefixes: file.prefixes,
            cutoff,
            transfer: file.transfer,
        })
    }
}

/// 解析同步起点时间。带时区偏移的 ISO-8601 字符串按给定偏移换算，
/// 不带时区的字符串一律按 UTC 处理。
pub fn parse_cutoff(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(naive.and_utc());
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN).and_utc());
    }

    bail!("不支持的时间格式")
}
