//! experience ファイルのバックグラウンドロード
//!
//! ワーカースレッドはロード中だけインデックスの所有権を持ち、join 時に呼び出し側へ
//! 返す。中断フラグはレコードを 1 件読むごとに確認し、中断時もそれまでにリンクした
//! レコードはインデックスに残る。

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use crate::error::{ExperienceError, ExperienceResult};
use crate::fs::ExperienceFs;
use crate::index::{ExperienceIndex, LinkResult};
use crate::record::RecordReader;

/// ロードの中断フラグ（キャンセルトークン）
#[derive(Debug, Clone, Default)]
pub struct AbortFlag(Arc<AtomicBool>);

impl AbortFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// 中断を要求する
    pub fn abort(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// 1 ファイル分のロード結果の統計
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadSummary {
    pub path: PathBuf,
    /// ファイル中のレコード数
    pub total_moves: u64,
    /// ロード後の局面数
    pub positions: usize,
    /// このファイルで新たに増えた局面数
    pub new_positions: usize,
    /// 既存レコードに統合されたレコード数
    pub duplicate_moves: u64,
    /// 空のインデックスへのロードだったか
    pub first: bool,
}

impl LoadSummary {
    /// 重複レコードの割合（%）
    pub fn fragmentation(&self) -> f64 {
        if self.total_moves == 0 {
            return 0.0;
        }
        100.0 * self.duplicate_moves as f64 / self.total_moves as f64
    }
}

impl fmt::Display for LoadSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.first {
            write!(
                f,
                "{} -> Total moves: {}. Total positions: {}. Duplicate moves: {}. Fragmentation: {:.2}%",
                self.path.display(),
                self.total_moves,
                self.positions,
                self.duplicate_moves,
                self.fragmentation()
            )
        } else {
            write!(
                f,
                "{} -> Total new moves: {}. Total new positions: {}. Duplicate moves: {}",
                self.path.display(),
                self.total_moves,
                self.new_positions,
                self.duplicate_moves
            )
        }
    }
}

/// ファイルのレコードを先頭から順にインデックスへリンクする
pub fn load_into(
    index: &mut ExperienceIndex,
    fs: &dyn ExperienceFs,
    path: &Path,
    abort: &AbortFlag,
) -> ExperienceResult<LoadSummary> {
    let mut reader = RecordReader::open(fs, path)?;
    let total = reader.count();

    let allocation_failure = || ExperienceError::AllocationFailure {
        path: path.to_path_buf(),
        count: total,
    };
    let additional = usize::try_from(total).map_err(|_| allocation_failure())?;
    index.try_reserve(additional).map_err(|_| allocation_failure())?;

    let prev_positions = index.positions();
    let mut linked = 0u64;
    let mut duplicate_moves = 0u64;
    loop {
        if abort.is_aborted() {
            return Err(ExperienceError::Aborted {
                path: path.to_path_buf(),
                linked,
            });
        }

        let Some(entry) = reader.read_next()? else {
            break;
        };
        if index.link(entry) == LinkResult::Merged {
            duplicate_moves += 1;
        }
        linked += 1;
    }

    Ok(LoadSummary {
        path: path.to_path_buf(),
        total_moves: total,
        positions: index.positions(),
        new_positions: index.positions() - prev_positions,
        duplicate_moves,
        first: prev_positions == 0,
    })
}

/// ロード結果を 1 行ログに出す
pub(crate) fn report(result: &ExperienceResult<LoadSummary>) {
    match result {
        Ok(summary) => log::info!("{summary}"),
        Err(e @ ExperienceError::Aborted { .. }) => log::debug!("{e}"),
        Err(e) => log::error!("{e}"),
    }
}

/// ワーカーが返すもの
pub struct LoadOutcome {
    pub index: ExperienceIndex,
    pub result: ExperienceResult<LoadSummary>,
}

/// 実行中のロード
pub struct LoadTask {
    handle: JoinHandle<Option<LoadOutcome>>,
    abort: AbortFlag,
}

impl LoadTask {
    /// ワーカーを起動する
    ///
    /// スレッドを起動できなかった場合はインデックスを `Err` で返す。
    pub fn spawn(
        index: ExperienceIndex,
        fs: Arc<dyn ExperienceFs>,
        path: PathBuf,
    ) -> Result<LoadTask, ExperienceIndex> {
        let abort = AbortFlag::new();
        let worker_abort = abort.clone();
        let (index_tx, index_rx) = mpsc::channel::<ExperienceIndex>();

        let spawned = thread::Builder::new()
            .name("experience-loader".to_string())
            .spawn(move || {
                let mut index = index_rx.recv().ok()?;
                let result = load_into(&mut index, fs.as_ref(), &path, &worker_abort);
                report(&result);
                Some(LoadOutcome { index, result })
            });

        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                log::warn!("Failed to spawn experience loader thread: {e}");
                return Err(index);
            }
        };

        // 受信側はワーカーが recv するまで生きている
        if let Err(mpsc::SendError(index)) = index_tx.send(index) {
            if handle.join().is_err() {
                log::error!("Experience loader thread panicked");
            }
            return Err(index);
        }

        Ok(LoadTask { handle, abort })
    }

    /// 中断を要求する（レコード単位で反映される）
    pub fn abort(&self) {
        self.abort.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// 完了まで待ってインデックスを受け取る
    ///
    /// ワーカーが panic した場合は `None`（インデックスは失われる）。
    pub fn join(self) -> Option<LoadOutcome> {
        match self.handle.join() {
            Ok(outcome) => outcome,
            Err(_) => {
                log::error!("Experience loader thread panicked");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::StdFs;
    use crate::record::{ExpEntry, write_signature};
    use crate::types::{Move, Value};
    use std::io::Write;

    fn write_file(path: &Path, entries: &[ExpEntry]) {
        let mut buf = Vec::new();
        write_signature(&mut buf).unwrap();
        for e in entries {
            e.write_to(&mut buf).unwrap();
        }
        std::fs::File::create(path).unwrap().write_all(&buf).unwrap();
    }

    fn entry(key: u64, mv: u32, value: i32, depth: u32) -> ExpEntry {
        ExpEntry::new(key, Move::from_raw(mv), Value::new(value), depth)
    }

    #[test]
    fn test_load_into_counts_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.exp");
        write_file(
            &path,
            &[entry(1, 1, 10, 5), entry(1, 1, 20, 5), entry(2, 1, 0, 3), entry(1, 2, 0, 9)],
        );

        let mut index = ExperienceIndex::new();
        let summary = load_into(&mut index, &StdFs::new(), &path, &AbortFlag::new()).unwrap();
        assert_eq!(summary.total_moves, 4);
        assert_eq!(summary.positions, 2);
        assert_eq!(summary.new_positions, 2);
        assert_eq!(summary.duplicate_moves, 1);
        assert!(summary.first);
        assert!((summary.fragmentation() - 25.0).abs() < 1e-9);

        // 後から出てきた重複が先のレコードへ統合される
        let chain = index.probe(1).unwrap();
        assert_eq!(chain.head().mv, Move::from_raw(2));
        assert_eq!(chain.find(Move::from_raw(1)).unwrap().value, Value::new(20));
    }

    #[test]
    fn test_second_file_reports_new_positions() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.exp");
        let b = dir.path().join("b.exp");
        write_file(&a, &[entry(1, 1, 0, 5)]);
        write_file(&b, &[entry(1, 1, 0, 5), entry(3, 1, 0, 5)]);

        let fs = StdFs::new();
        let mut index = ExperienceIndex::new();
        load_into(&mut index, &fs, &a, &AbortFlag::new()).unwrap();
        let summary = load_into(&mut index, &fs, &b, &AbortFlag::new()).unwrap();
        assert!(!summary.first);
        assert_eq!(summary.new_positions, 1);
        assert_eq!(summary.duplicate_moves, 1);
        assert!(summary.to_string().contains("Total new positions: 1"));
    }

    #[test]
    fn test_aborted_load_links_nothing_when_flag_set_first() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.exp");
        write_file(&path, &[entry(1, 1, 0, 5), entry(2, 1, 0, 5)]);

        let abort = AbortFlag::new();
        abort.abort();
        let mut index = ExperienceIndex::new();
        let err = load_into(&mut index, &StdFs::new(), &path, &abort).err().unwrap();
        assert!(matches!(err, ExperienceError::Aborted { linked: 0, .. }));
        assert!(index.is_empty());
    }

    #[test]
    fn test_task_returns_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.exp");
        write_file(&path, &[entry(1, 1, 0, 5), entry(2, 1, 0, 5)]);

        let task = match LoadTask::spawn(ExperienceIndex::new(), Arc::new(StdFs::new()), path) {
            Ok(task) => task,
            Err(_) => panic!("spawn failed"),
        };
        let outcome = task.join().unwrap();
        assert!(outcome.result.is_ok());
        assert_eq!(outcome.index.positions(), 2);
    }

    #[test]
    fn test_corrupt_file_leaves_index_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.exp");
        std::fs::write(&path, b"SugaR\x01\x02\x03").unwrap();

        let mut index = ExperienceIndex::new();
        let err = load_into(&mut index, &StdFs::new(), &path, &AbortFlag::new()).err().unwrap();
        assert!(matches!(err, ExperienceError::Corrupt { .. }));
        assert!(index.is_empty());
    }
}
