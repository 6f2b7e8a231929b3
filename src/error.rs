/// Repository-wide structured errors for planning, orchestration and validation.
#[derive(Debug, Clone)]
pub enum RemigrateError {
    /// 日志行包含已知错误签名，但无法按固定格式解析
    Parse { file: String, line_no: usize, line: String },
    /// 无法启动外部传输进程（可执行文件、参数）
    Spawn { program: String, reason: String },
    /// 在 PATH 中找不到外部传输工具
    ExecutableNotFound(String),
    LedgerMissing(String),
    LedgerFormat { path: String, line_no: usize, reason: String },
    Io { path: String, reason: String },
    /// 路径既不在源挂载点下，也不在目标挂载点下
    MountMismatch { path: String, source_mount: String, destination_mount: String },
    StatsDirNotFound(String),
}

impl std::fmt::Display for RemigrateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use RemigrateError::*;
        match self {
            Parse { file, line_no, line } => {
                write!(f, "日志格式无法解析: {}:{} — {}", file, line_no, line.trim_end())
            }
            Spawn { program, reason } => write!(f, "无法启动传输进程: {} — {}", program, reason),
            ExecutableNotFound(name) => write!(f, "找不到可执行文件: {}，请用 `rmg set --msrsync` 指定", name),
            LedgerMissing(p) => write!(f, "失败清单不存在: {}，请先运行 generate-logs", p),
            LedgerFormat { path, line_no, reason } => {
                write!(f, "失败清单格式错误: {}:{} — {}", path, line_no, reason)
            }
            Io { path, reason } => write!(f, "文件读写失败: {} — {}", path, reason),
            MountMismatch { path, source_mount, destination_mount } => write!(
                f,
                "路径不属于任何挂载点: {} (源: {}, 目标: {})",
                path, source_mount, destination_mount
            ),
            StatsDirNotFound(p) => write!(f, "未找到 msrsync 临时日志目录: {}", p),
        }
    }
}

impl std::error::Error for RemigrateError {}

impl RemigrateError {
    pub(crate) fn io(path: impl AsRef<std::path::Path>, err: std::io::Error) -> Self {
        RemigrateError::Io { path: path.as_ref().display().to_string(), reason: err.to_string() }
    }

    /// Short classification printed in front of fatal errors.
    pub fn class(&self) -> &'static str {
        use RemigrateError::*;
        match self {
            Parse { .. } => "parse",
            Spawn { .. } | ExecutableNotFound(_) => "orchestration",
            LedgerMissing(_) | LedgerFormat { .. } => "ledger",
            Io { .. } => "filesystem",
            MountMismatch { .. } => "alignment",
            StatsDirNotFound(_) => "discovery",
        }
    }

    /// Whether the whole run must stop. A missing msrsync bucket directory only
    /// means there is nothing to parse; everything else leaves the run in a state
    /// that cannot be trusted.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, RemigrateError::StatsDirNotFound(_))
    }
}
