//! エンジンから使う experience の窓口
//!
//! 起動時に 1 つ作り、探索と USI コマンド処理に渡して使う。アクティブなストアは
//! 高々 1 つで、設定の切り替えに応じて保存・破棄・再ロードを行う。

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{ConfigError, ExperienceConfig};
use crate::fs::{ExperienceFs, StdFs};
use crate::index::Chain;
use crate::store::ExperienceStore;
use crate::types::{Depth, Key, Move, Value};

/// experience のコンテキスト
pub struct ExperienceContext {
    fs: Arc<dyn ExperienceFs>,
    config: ExperienceConfig,
    current: Option<ExperienceStore>,
    learning_paused: bool,
}

impl ExperienceContext {
    /// 設定だけを持つコンテキストを作る（ロードは [`Self::init`] で行う）
    pub fn new(config: ExperienceConfig) -> Self {
        Self::with_fs(config, Arc::new(StdFs::new()))
    }

    pub fn with_fs(config: ExperienceConfig, fs: Arc<dyn ExperienceFs>) -> Self {
        Self {
            fs,
            config,
            current: None,
            learning_paused: false,
        }
    }

    pub fn config(&self) -> &ExperienceConfig {
        &self.config
    }

    pub fn fs(&self) -> Arc<dyn ExperienceFs> {
        Arc::clone(&self.fs)
    }

    /// アクティブなストア
    pub fn store(&self) -> Option<&ExperienceStore> {
        self.current.as_ref()
    }

    /// USI オプションを設定に反映する（反映は次の [`Self::init`] から）
    pub fn set_option(&mut self, name: &str, value: &str) -> Result<bool, ConfigError> {
        self.config.set_option(name, value)
    }

    /// 設定を置き換えて [`Self::init`] する
    pub fn set_config(&mut self, config: ExperienceConfig) {
        self.config = config;
        self.init();
    }

    /// ファイルと有効/無効を指定して [`Self::init`] する
    pub fn activate<P: Into<PathBuf>>(&mut self, filename: P, enabled: bool) {
        self.config.file = filename.into();
        self.config.enabled = enabled;
        self.init();
    }

    /// 現在の設定に合わせてストアを用意する
    ///
    /// 無効なら破棄する。同じファイルのロードに成功済みなら何もしない。
    /// それ以外は現在のストアを保存して破棄し、新しいファイルを非同期でロードする。
    pub fn init(&mut self) {
        if !self.config.enabled {
            self.unload();
            return;
        }

        if let Some(store) = self.current.as_mut() {
            if store.filename() == self.config.file && store.wait_for_load_finished() {
                store.set_min_depth(self.config.min_depth);
                return;
            }
        }

        self.unload();

        let mut store = ExperienceStore::new(Arc::clone(&self.fs), self.config.min_depth);
        store.load(&self.config.file, false);
        self.current = Some(store);
    }

    /// 保存してからストアを破棄する
    pub fn deactivate(&mut self) {
        self.unload();
    }

    pub fn unload(&mut self) {
        self.save();
        self.current = None;
    }

    /// experience が有効か
    pub fn enabled(&self) -> bool {
        self.config.enabled
    }

    /// 未保存のレコードを追記保存する
    ///
    /// 未保存のレコードが残った場合（読み取り専用、または書き込みに失敗）は false。
    pub fn save(&mut self) -> bool {
        let Some(store) = self.current.as_mut() else {
            return true;
        };
        if !store.has_new_exp() {
            return true;
        }
        if self.config.readonly {
            return false;
        }

        let filename = store.filename().to_path_buf();
        store.save(&filename, false)
    }

    /// 未保存のレコードがあれば保存し、ファイルをロードし直してインデックスに反映する
    ///
    /// 保存できなかった場合はロードし直さず、未保存のレコードをそのまま残す。
    pub fn reload(&mut self) {
        if self.config.readonly {
            return;
        }
        match self.current.as_ref() {
            Some(store) if store.has_new_exp() => {}
            _ => return,
        }

        if !self.save() {
            return;
        }
        if let Some(store) = self.current.as_mut() {
            let filename = store.filename().to_path_buf();
            store.clear();
            store.load(&filename, false);
        }
    }

    /// 局面のチェーンを引く
    pub fn probe(&self, key: Key) -> Option<&Chain> {
        self.current.as_ref()?.probe(key)
    }

    /// ロードの完了を待つ。ストアがなければ false
    pub fn wait_for_loading_finished(&mut self) -> bool {
        match self.current.as_mut() {
            Some(store) => store.wait_for_load_finished(),
            None => false,
        }
    }

    /// PV の結果を記録する
    pub fn insert_pv(&mut self, key: Key, mv: Move, value: Value, depth: Depth) {
        debug_assert!(!self.config.readonly, "insert while experience is read-only");
        if let Some(store) = self.current.as_mut() {
            store.add_pv_experience(key, mv, value, depth);
        }
    }

    /// MultiPV の結果を記録する
    pub fn insert_multipv(&mut self, key: Key, mv: Move, value: Value, depth: Depth) {
        debug_assert!(!self.config.readonly, "insert while experience is read-only");
        if let Some(store) = self.current.as_mut() {
            store.add_multipv_experience(key, mv, value, depth);
        }
    }

    pub fn pause_learning(&mut self) {
        self.learning_paused = true;
    }

    pub fn resume_learning(&mut self) {
        self.learning_paused = false;
    }

    pub fn is_learning_paused(&self) -> bool {
        self.learning_paused
    }
}

impl Drop for ExperienceContext {
    fn drop(&mut self) {
        self.unload();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::testing::FailingAppendFs;
    use std::path::Path;

    const A: Move = Move::from_raw(0x101);

    fn context(dir: &Path) -> ExperienceContext {
        let config = ExperienceConfig {
            file: dir.join("ctx.exp"),
            ..ExperienceConfig::default()
        };
        ExperienceContext::new(config)
    }

    #[test]
    fn test_probe_and_insert_without_store_are_noops() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context(dir.path());
        ctx.insert_pv(1, A, Value::new(0), 8);
        assert!(ctx.probe(1).is_none());
        assert!(!ctx.wait_for_loading_finished());
        drop(ctx);
        assert!(!dir.path().join("ctx.exp").exists());
    }

    #[test]
    fn test_insert_then_reload_makes_records_probeable() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context(dir.path());
        ctx.init();
        // 新規ファイルなのでロード自体は失敗する
        assert!(!ctx.wait_for_loading_finished());

        ctx.insert_pv(1, A, Value::new(25), 8);
        assert!(ctx.probe(1).is_none());

        ctx.reload();
        assert!(ctx.wait_for_loading_finished());
        assert_eq!(ctx.probe(1).unwrap().head().value, Value::new(25));
        assert!(!ctx.store().unwrap().has_new_exp());
    }

    #[test]
    fn test_init_same_file_is_noop_after_success() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context(dir.path());
        ctx.init();
        ctx.insert_pv(1, A, Value::new(25), 8);
        ctx.reload();
        assert!(ctx.wait_for_loading_finished());

        ctx.insert_pv(2, A, Value::new(5), 8);
        ctx.init();
        // ストアは作り直されていないので未保存レコードが残っている
        assert!(ctx.store().unwrap().has_new_exp());
    }

    #[test]
    fn test_disable_flushes_and_unloads() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context(dir.path());
        ctx.init();
        ctx.insert_multipv(3, A, Value::new(1), 8);

        ctx.activate(dir.path().join("ctx.exp"), false);
        assert!(ctx.store().is_none());
        assert!(!ctx.enabled());
        assert!(dir.path().join("ctx.exp").exists());
    }

    #[test]
    fn test_readonly_skips_save() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context(dir.path());
        ctx.init();
        ctx.insert_pv(1, A, Value::new(0), 8);
        ctx.set_option("Experience Readonly", "true").unwrap();
        assert!(!ctx.save());
        assert!(!dir.path().join("ctx.exp").exists());
    }

    #[test]
    fn test_reload_keeps_pending_when_flush_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = ExperienceConfig {
            file: dir.path().join("ctx.exp"),
            ..ExperienceConfig::default()
        };
        let fs = Arc::new(FailingAppendFs(StdFs::new()));
        let mut ctx = ExperienceContext::with_fs(config, fs);
        ctx.init();
        ctx.wait_for_loading_finished();

        ctx.insert_pv(1, A, Value::new(10), 20);
        assert!(!ctx.save());
        ctx.reload();
        assert!(ctx.store().unwrap().has_new_exp());
        assert!(!ctx.store().unwrap().is_loading());
    }

    #[test]
    fn test_reload_in_readonly_keeps_pending() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context(dir.path());
        ctx.init();
        ctx.wait_for_loading_finished();
        ctx.insert_pv(1, A, Value::new(10), 20);
        ctx.set_option("Experience Readonly", "true").unwrap();

        ctx.reload();
        assert!(ctx.store().unwrap().has_new_exp());
        assert!(ctx.probe(1).is_none());
        assert!(!dir.path().join("ctx.exp").exists());
    }

    #[test]
    fn test_learning_pause_flag() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context(dir.path());
        assert!(!ctx.is_learning_paused());
        ctx.pause_learning();
        assert!(ctx.is_learning_paused());
        ctx.resume_learning();
        assert!(!ctx.is_learning_paused());
    }
}
