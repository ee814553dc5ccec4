//! experience ファイルの保守操作（defrag / merge）
//!
//! どちらも使い捨てのストアにロードしてから全体保存するだけで、重複・統合済みの
//! レコードと `min_depth` 未満のレコードが取り除かれる。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::fs::ExperienceFs;
use crate::store::ExperienceStore;
use crate::types::Depth;

/// 1 ファイルをロードし直して全体保存する
pub fn defragment(fs: Arc<dyn ExperienceFs>, min_depth: Depth, path: &Path) -> bool {
    log::info!("Defragmenting experience file: {}", path.display());

    let mut store = ExperienceStore::new(fs, min_depth);
    if !store.load(path, true) {
        return false;
    }

    store.save(path, true)
}

/// 複数ファイルを `target` に統合する
///
/// `target` が既に存在する場合はそれも統合対象に含める。ロードに失敗したファイルは
/// 読み飛ばし、同じパスの二度目以降の指定は無視する。
pub fn merge(
    fs: Arc<dyn ExperienceFs>,
    min_depth: Depth,
    target: &Path,
    sources: &[PathBuf],
) -> bool {
    log::info!(
        "Merging experience files: {} -> target file: {}",
        sources.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", "),
        target.display()
    );

    let target_exists = fs.exists(&fs.map_path(target));
    let mut store = ExperienceStore::new(fs, min_depth);
    let mut seen: Vec<&Path> = Vec::with_capacity(sources.len() + 1);

    if target_exists {
        store.load(target, true);
        seen.push(target);
    }

    for source in sources {
        if seen.contains(&source.as_path()) {
            log::debug!("Skipping duplicate merge source: {}", source.display());
            continue;
        }
        seen.push(source.as_path());

        if !store.load(source, true) {
            log::warn!("Skipping experience file that failed to load: {}", source.display());
        }
    }

    if store.index().is_empty() {
        log::warn!("Nothing to merge into {}", target.display());
        return false;
    }

    store.save(target, true)
}
