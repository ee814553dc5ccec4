//! experience ファイルの読み書きで発生するエラー

use std::path::PathBuf;

/// experience ストアのエラー
///
/// ロード時のエラーはそのロードだけを中断し、保存時のエラーはバックアップからの
/// 復元を試みた上で呼び出し元へ返す。どのエラーもプロセスを停止させない。
#[derive(thiserror::Error, Debug)]
pub enum ExperienceError {
    /// ファイルを開けない
    #[error("Could not open experience file: {path}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// レコードが 1 件もない
    #[error("The experience file [{path}] is empty")]
    Empty { path: PathBuf },

    /// サイズがレコード長の倍数になっていない
    #[error(
        "Experience file [{path}] is corrupted. Size: {size}, exp-size: {payload}, exp-count: {count}"
    )]
    Corrupt {
        path: PathBuf,
        size: u64,
        payload: u64,
        count: u64,
    },

    /// 先頭のシグネチャが一致しない
    #[error("Experience file [{path}] signature mismatch")]
    SignatureMismatch { path: PathBuf },

    /// レコード領域の途中で読み込みに失敗した
    #[error("Failed to read experience entry {index} of {total} from [{path}]")]
    ReadFailure {
        path: PathBuf,
        index: u64,
        total: u64,
        #[source]
        source: std::io::Error,
    },

    /// インデックス用のメモリを確保できない
    #[error("Failed to allocate room for {count} experience entries from [{path}]")]
    AllocationFailure { path: PathBuf, count: u64 },

    /// ロードが中断された（リンク済みのレコードは残る）
    #[error("Loading of experience file [{path}] was aborted after {linked} entries")]
    Aborted { path: PathBuf, linked: u64 },

    /// 書き込みに失敗した
    #[error("Failed to write experience file [{path}]")]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// バックアップを作成できない（保存は続行する）
    #[error("Could not create backup of experience file [{path}]")]
    BackupFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 書き込み失敗後にバックアップを戻せない
    #[error("Could not restore backup experience file: {path}")]
    RestoreFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ExperienceError {
    /// 対象ファイルのパス
    pub fn path(&self) -> &std::path::Path {
        match self {
            ExperienceError::Unreadable { path, .. }
            | ExperienceError::Empty { path }
            | ExperienceError::Corrupt { path, .. }
            | ExperienceError::SignatureMismatch { path }
            | ExperienceError::ReadFailure { path, .. }
            | ExperienceError::AllocationFailure { path, .. }
            | ExperienceError::Aborted { path, .. }
            | ExperienceError::WriteFailure { path, .. }
            | ExperienceError::BackupFailure { path, .. }
            | ExperienceError::RestoreFailure { path, .. } => path,
        }
    }
}

/// experience 操作の Result 型
pub type ExperienceResult<T> = Result<T, ExperienceError>;
