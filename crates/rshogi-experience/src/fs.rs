//! ファイルシステム境界
//!
//! ストアはファイル名の解決・存在確認・削除・リネーム・読み書きのオープンを
//! すべて [`ExperienceFs`] 経由で行う。通常は [`StdFs`] を使う。

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// experience ストアが利用するファイル操作
pub trait ExperienceFs: Send + Sync {
    /// 論理ファイル名を実際のパスへ変換する
    fn map_path(&self, name: &Path) -> PathBuf;

    /// ファイルが存在するか
    fn exists(&self, path: &Path) -> bool;

    /// ファイルを削除する
    fn remove_file(&self, path: &Path) -> io::Result<()>;

    /// ファイルをリネームする（移動先が存在する場合は置き換える）
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// ファイルサイズ。存在しない場合は 0
    fn file_len(&self, path: &Path) -> io::Result<u64>;

    /// 読み込み用に開く
    fn open_read(&self, path: &Path) -> io::Result<File>;

    /// 追記用に開く（存在しなければ作成する）
    fn open_append(&self, path: &Path) -> io::Result<Box<dyn Write + Send>>;

    /// 指定した長さに切り詰める
    fn truncate(&self, path: &Path, len: u64) -> io::Result<()>;
}

/// std::fs による実装
///
/// `base_dir` を指定すると、相対パスはそのディレクトリ基準で解決される。
#[derive(Debug, Clone, Default)]
pub struct StdFs {
    base_dir: Option<PathBuf>,
}

impl StdFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// 相対パスの基準ディレクトリを指定して生成
    pub fn with_base_dir<P: Into<PathBuf>>(base_dir: P) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
        }
    }
}

impl ExperienceFs for StdFs {
    fn map_path(&self, name: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) if name.is_relative() => base.join(name),
            _ => name.to_path_buf(),
        }
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        // Windows の rename は移動先が存在すると失敗するため先に消す
        if cfg!(windows) && to.exists() {
            fs::remove_file(to)?;
        }
        fs::rename(from, to)
    }

    fn file_len(&self, path: &Path) -> io::Result<u64> {
        match fs::metadata(path) {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e),
        }
    }

    fn open_read(&self, path: &Path) -> io::Result<File> {
        File::open(path)
    }

    fn open_append(&self, path: &Path) -> io::Result<Box<dyn Write + Send>> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Box::new(file))
    }

    fn truncate(&self, path: &Path, len: u64) -> io::Result<()> {
        OpenOptions::new().write(true).open(path)?.set_len(len)
    }
}

/// バックアップファイル名（`<file>.bak`）
pub fn backup_path(path: &Path) -> PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(".bak");
    PathBuf::from(s)
}

/// テスト用の差し替え実装
#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// 追記用ライターへの書き込みが常に失敗する
    pub(crate) struct FailingAppendFs(pub(crate) StdFs);

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("no space left on device"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl ExperienceFs for FailingAppendFs {
        fn map_path(&self, name: &Path) -> PathBuf {
            self.0.map_path(name)
        }

        fn exists(&self, path: &Path) -> bool {
            self.0.exists(path)
        }

        fn remove_file(&self, path: &Path) -> io::Result<()> {
            self.0.remove_file(path)
        }

        fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
            self.0.rename(from, to)
        }

        fn file_len(&self, path: &Path) -> io::Result<u64> {
            self.0.file_len(path)
        }

        fn open_read(&self, path: &Path) -> io::Result<File> {
            self.0.open_read(path)
        }

        fn open_append(&self, path: &Path) -> io::Result<Box<dyn Write + Send>> {
            self.0.open_append(path)?;
            Ok(Box::new(FailingWriter))
        }

        fn truncate(&self, path: &Path, len: u64) -> io::Result<()> {
            self.0.truncate(path, len)
        }
    }
}
