//! experience ストア本体
//!
//! 1 つのファイル名・インデックス・未保存レコードのバッファ 2 本（PV / MultiPV）と
//! ロード状態を持つ。ロード以外の操作はすべて呼び出し側のスレッドで同期的に行う。
//!
//! # 保存
//!
//! - 通常保存: 未保存レコードを既存ファイルの末尾に追記する
//! - 全体保存（compact）: 既存ファイルを `<file>.bak` に退避し、インデックス全体と
//!   未保存レコードを書き直す。書き込みに失敗した場合は退避したファイルを戻す
//!
//! どちらの場合も `min_depth` 未満のレコードは書き出さない。

use std::fmt;
use std::io::{BufWriter, Write};
use std::mem;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::DEFAULT_MIN_DEPTH;
use crate::error::{ExperienceError, ExperienceResult};
use crate::fs::{ExperienceFs, StdFs, backup_path};
use crate::index::{Chain, ExperienceIndex};
use crate::loader::{AbortFlag, LoadSummary, LoadTask, load_into, report};
use crate::record::{ExpEntry, write_signature};
use crate::types::{Depth, Key, Move, Value};

const WRITER_BUF_CAP: usize = 64 * 1024; // 64 KiB

/// 保存結果の統計
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveSummary {
    pub path: PathBuf,
    /// 全体保存かどうか
    pub compacted: bool,
    /// 全体保存で書き出した局面数
    pub positions: usize,
    /// 全体保存で書き出したインデックス中のレコード数
    pub moves: usize,
    /// 書き出した PV レコード数
    pub pv: usize,
    /// 書き出した MultiPV レコード数
    pub multipv: usize,
}

impl fmt::Display for SaveSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.compacted {
            write!(
                f,
                "Saved {} position(s) and {} moves to experience file: {}",
                self.positions,
                self.moves + self.pv + self.multipv,
                self.path.display()
            )
        } else {
            write!(
                f,
                "Saved {} PV and {} MultiPV entries to experience file: {}",
                self.pv,
                self.multipv,
                self.path.display()
            )
        }
    }
}

/// [`ExperienceStore::try_save`] の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// 書き出すものがなくファイルに触れなかった
    NothingToSave,
    Saved(SaveSummary),
}

/// experience ストア
pub struct ExperienceStore {
    filename: PathBuf,
    fs: Arc<dyn ExperienceFs>,
    min_depth: Depth,

    /// ロード中はワーカー側が所有しており、ここは空
    index: ExperienceIndex,
    new_pv: Vec<ExpEntry>,
    new_multipv: Vec<ExpEntry>,

    loader: Option<LoadTask>,
    loading_result: bool,
    last_load: Option<LoadSummary>,
}

impl Default for ExperienceStore {
    fn default() -> Self {
        Self::new(Arc::new(StdFs::new()), DEFAULT_MIN_DEPTH)
    }
}

impl ExperienceStore {
    /// 空のストアを作成
    pub fn new(fs: Arc<dyn ExperienceFs>, min_depth: Depth) -> Self {
        Self {
            filename: PathBuf::new(),
            fs,
            min_depth,
            index: ExperienceIndex::new(),
            new_pv: Vec::new(),
            new_multipv: Vec::new(),
            loader: None,
            loading_result: false,
            last_load: None,
        }
    }

    /// 最後に `load` したファイル名（論理名）
    pub fn filename(&self) -> &Path {
        &self.filename
    }

    pub fn min_depth(&self) -> Depth {
        self.min_depth
    }

    pub fn set_min_depth(&mut self, min_depth: Depth) {
        self.min_depth = min_depth;
    }

    /// 未保存のレコードがあるか
    pub fn has_new_exp(&self) -> bool {
        !self.new_pv.is_empty() || !self.new_multipv.is_empty()
    }

    /// ロード中か
    pub fn is_loading(&self) -> bool {
        self.loader.is_some()
    }

    /// 直近のロードが成功したか（ロード中は false）
    pub fn loading_result(&self) -> bool {
        self.loader.is_none() && self.loading_result
    }

    /// 直近の成功したロードの統計
    pub fn last_load(&self) -> Option<&LoadSummary> {
        self.last_load.as_ref()
    }

    /// インデックス（ロード中は空に見える）
    pub fn index(&self) -> &ExperienceIndex {
        &self.index
    }

    /// ファイルをロードする
    ///
    /// 既存のインデックスに追加でリンクする。実行中のロードがあれば完了を待ってから
    /// 開始する。`synchronous` なら完了まで待って結果を返し、そうでなければ即座に
    /// true を返す（結果は [`Self::wait_for_load_finished`] で受け取る）。
    pub fn load<P: AsRef<Path>>(&mut self, filename: P, synchronous: bool) -> bool {
        self.wait_for_load_finished();

        self.filename = filename.as_ref().to_path_buf();
        self.loading_result = false;
        let path = self.fs.map_path(&self.filename);
        let index = mem::take(&mut self.index);

        match LoadTask::spawn(index, Arc::clone(&self.fs), path.clone()) {
            Ok(task) => self.loader = Some(task),
            Err(mut index) => {
                // ワーカーを起動できない場合はこのスレッドでロードする
                let result = load_into(&mut index, self.fs.as_ref(), &path, &AbortFlag::new());
                report(&result);
                self.index = index;
                self.finish_load(result);
                return self.loading_result;
            }
        }

        if synchronous {
            self.wait_for_load_finished()
        } else {
            true
        }
    }

    /// 実行中のロードの完了を待ち、直近のロード結果を返す
    pub fn wait_for_load_finished(&mut self) -> bool {
        if let Some(task) = self.loader.take() {
            match task.join() {
                Some(outcome) => {
                    self.index = outcome.index;
                    self.finish_load(outcome.result);
                }
                None => {
                    self.index = ExperienceIndex::new();
                    self.loading_result = false;
                }
            }
        }
        self.loading_result
    }

    fn finish_load(&mut self, result: ExperienceResult<LoadSummary>) {
        self.loading_result = result.is_ok();
        if let Ok(summary) = result {
            self.last_load = Some(summary);
        }
    }

    /// 局面のチェーンを引く。ロード中は常に `None`
    #[inline]
    pub fn probe(&self, key: Key) -> Option<&Chain> {
        self.index.probe(key)
    }

    /// PV で得た結果を記録する
    pub fn add_pv_experience(&mut self, key: Key, mv: Move, value: Value, depth: Depth) {
        self.new_pv.push(ExpEntry::new(key, mv, value, depth));
    }

    /// MultiPV で得た結果を記録する
    pub fn add_multipv_experience(&mut self, key: Key, mv: Move, value: Value, depth: Depth) {
        self.new_multipv.push(ExpEntry::new(key, mv, value, depth));
    }

    /// 保存する。失敗はログに出して false を返す
    pub fn save<P: AsRef<Path>>(&mut self, filename: P, compact_all: bool) -> bool {
        match self.try_save(filename.as_ref(), compact_all) {
            Ok(_) => true,
            Err(e) => {
                log::error!("{e}");
                false
            }
        }
    }

    /// 保存する
    ///
    /// 失敗した場合、全体保存で作ったバックアップがあれば元に戻し、なければ
    /// 書き込み前の長さまで切り詰める。
    /// 未保存レコードのバッファは成功時のみクリアされる。
    pub fn try_save(&mut self, filename: &Path, compact_all: bool) -> ExperienceResult<SaveOutcome> {
        // ロード中のインデックスは保存しない
        self.wait_for_load_finished();

        if !self.has_new_exp() && (!compact_all || self.index.is_empty()) {
            return Ok(SaveOutcome::NothingToSave);
        }

        let path = self.fs.map_path(filename);
        let prev_len = self.fs.file_len(&path).map_err(|source| ExperienceError::WriteFailure {
            path: path.clone(),
            source,
        })?;
        let backup = if compact_all && self.fs.exists(&path) {
            self.create_backup(&path)
        } else {
            None
        };

        match self.write(&path, compact_all) {
            Ok(summary) => {
                self.clear_new_exp();
                log::info!("{summary}");
                Ok(SaveOutcome::Saved(summary))
            }
            Err(e) => {
                match backup {
                    Some(backup) => self.restore_backup(&backup, &path),
                    None => self.truncate_to(&path, prev_len),
                }
                Err(e)
            }
        }
    }

    /// `path` を `<path>.bak` へ退避する。失敗時は警告して `None`
    fn create_backup(&self, path: &Path) -> Option<PathBuf> {
        let backup = backup_path(path);

        if self.fs.exists(&backup) {
            if let Err(source) = self.fs.remove_file(&backup) {
                log::warn!("{}", ExperienceError::BackupFailure { path: backup, source });
                return None;
            }
        }

        if let Err(source) = self.fs.rename(path, &backup) {
            log::warn!(
                "{}",
                ExperienceError::BackupFailure {
                    path: path.to_path_buf(),
                    source
                }
            );
            return None;
        }

        Some(backup)
    }

    fn restore_backup(&self, backup: &Path, path: &Path) {
        if let Err(source) = self.fs.rename(backup, path) {
            log::error!(
                "{}",
                ExperienceError::RestoreFailure {
                    path: backup.to_path_buf(),
                    source
                }
            );
        }
    }

    /// 追記が途中で失敗したファイルを書き込み前の長さへ戻す
    ///
    /// 末尾に半端なレコードが残るとファイル全体が読めなくなる。
    fn truncate_to(&self, path: &Path, len: u64) {
        if !self.fs.exists(path) {
            return;
        }
        if let Err(source) = self.fs.truncate(path, len) {
            log::error!(
                "{}",
                ExperienceError::RestoreFailure {
                    path: path.to_path_buf(),
                    source
                }
            );
        }
    }

    fn write(&self, path: &Path, compact_all: bool) -> ExperienceResult<SaveSummary> {
        let write_failure = |source| ExperienceError::WriteFailure {
            path: path.to_path_buf(),
            source,
        };

        let len = self.fs.file_len(path).map_err(write_failure)?;
        let file = self.fs.open_append(path).map_err(write_failure)?;
        let mut out = BufWriter::with_capacity(WRITER_BUF_CAP, file);

        if len == 0 {
            write_signature(&mut out).map_err(write_failure)?;
        }

        let mut summary = SaveSummary {
            path: path.to_path_buf(),
            compacted: compact_all,
            ..SaveSummary::default()
        };

        if compact_all {
            for (_, chain) in self.index.iter() {
                let mut written = 0;
                for entry in chain.iter().filter(|e| e.depth >= self.min_depth) {
                    entry.write_to(&mut out).map_err(write_failure)?;
                    written += 1;
                }
                if written > 0 {
                    summary.positions += 1;
                    summary.moves += written;
                }
            }
        }

        for entry in self.new_pv.iter().filter(|e| e.depth >= self.min_depth) {
            entry.write_to(&mut out).map_err(write_failure)?;
            summary.pv += 1;
        }

        for entry in self.new_multipv.iter().filter(|e| e.depth >= self.min_depth) {
            entry.write_to(&mut out).map_err(write_failure)?;
            summary.multipv += 1;
        }

        out.flush().map_err(write_failure)?;
        Ok(summary)
    }

    fn clear_new_exp(&mut self) {
        self.new_pv.clear();
        self.new_multipv.clear();
    }

    /// 実行中のロードを中断し、すべてのレコードを破棄する
    pub fn clear(&mut self) {
        self.abort_loading();
        self.index.clear();
        self.last_load = None;
        self.clear_new_exp();
    }

    fn abort_loading(&mut self) {
        if let Some(task) = &self.loader {
            task.abort();
        }
        self.wait_for_load_finished();
    }
}

impl Drop for ExperienceStore {
    fn drop(&mut self) {
        // ワーカーが解放済みのデータに触れないよう最初に止める
        self.abort_loading();
    }
}
