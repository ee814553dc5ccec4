//! experience ファイルのレコード形式
//!
//! ファイルは固定長のシグネチャと、パディングなしで並ぶ固定長レコードからなる。
//!
//! ```text
//! [signature: 5 bytes "SugaR"]
//! [record]*  record = key:u64 | move:u32 | value:i32 | depth:u32  (little-endian, 20 bytes)
//! ```
//!
//! ファイルサイズが `SIGNATURE.len() + k * RECORD_SIZE` であり、先頭がシグネチャと
//! 一致する場合のみ有効なファイルとして扱う。

use std::cmp::Ordering;
use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{ExperienceError, ExperienceResult};
use crate::fs::ExperienceFs;
use crate::types::{Depth, Key, Move, Value};

/// ファイル先頭のシグネチャ（既存の experience ファイルと互換）
pub const SIGNATURE: &[u8] = b"SugaR";

/// 1 レコードのバイト数
pub const RECORD_SIZE: usize = 8 + 4 + 4 + 4;

const READER_BUF_CAP: usize = 64 * 1024; // 64 KiB

/// experience の 1 レコード
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExpEntry {
    pub key: Key,
    pub mv: Move,
    pub value: Value,
    pub depth: Depth,
}

impl ExpEntry {
    pub const fn new(key: Key, mv: Move, value: Value, depth: Depth) -> Self {
        Self {
            key,
            mv,
            value,
            depth,
        }
    }

    /// 順位付けの比較
    ///
    /// 深い探索の結果ほど信頼できるとみなし depth の降順、同じ depth なら value の降順。
    /// `Greater` は self の方が上位であることを表す。
    #[inline]
    pub fn compare(&self, other: &ExpEntry) -> Ordering {
        self.depth.cmp(&other.depth).then(self.value.cmp(&other.value))
    }

    /// 同じ (key, move) のレコードを統合する
    ///
    /// depth の大きい方の (value, depth) を採用し、depth が等しければ value の大きい方を
    /// 採用する。値が変わった場合は true を返す。
    pub fn merge(&mut self, other: &ExpEntry) -> bool {
        debug_assert_eq!(self.key, other.key);
        debug_assert_eq!(self.mv, other.mv);

        if other.compare(self) == Ordering::Greater {
            self.value = other.value;
            self.depth = other.depth;
            true
        } else {
            false
        }
    }

    /// 1 レコードを書き出す
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u64::<LittleEndian>(self.key)?;
        w.write_u32::<LittleEndian>(self.mv.raw())?;
        w.write_i32::<LittleEndian>(self.value.raw())?;
        w.write_u32::<LittleEndian>(self.depth)
    }

    /// 1 レコードを読み込む
    pub fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        let key = r.read_u64::<LittleEndian>()?;
        let mv = Move::from_raw(r.read_u32::<LittleEndian>()?);
        let value = Value::new(r.read_i32::<LittleEndian>()?);
        let depth = r.read_u32::<LittleEndian>()?;
        Ok(Self::new(key, mv, value, depth))
    }
}

/// 新規ファイルの先頭にシグネチャを書く
pub fn write_signature<W: Write>(w: &mut W) -> io::Result<()> {
    w.write_all(SIGNATURE)
}

/// サイズからレコード数を求める（シグネチャの検査は含まない）
pub fn record_count(path: &Path, size: u64) -> ExperienceResult<u64> {
    if size == 0 {
        return Err(ExperienceError::Empty {
            path: path.to_path_buf(),
        });
    }

    let sig_len = SIGNATURE.len() as u64;
    let payload = size.saturating_sub(sig_len);
    let count = payload / RECORD_SIZE as u64;
    if size < sig_len || count * RECORD_SIZE as u64 != payload {
        return Err(ExperienceError::Corrupt {
            path: path.to_path_buf(),
            size,
            payload,
            count,
        });
    }

    Ok(count)
}

/// レコードを先頭から順に読み出すリーダー
///
/// 生成時にサイズとシグネチャを検証する。
pub struct RecordReader<R: Read> {
    inner: BufReader<R>,
    path: PathBuf,
    count: u64,
    read: u64,
}

impl RecordReader<File> {
    /// ファイルを開いて検証する
    pub fn open(fs: &dyn ExperienceFs, path: &Path) -> ExperienceResult<Self> {
        let unreadable = |source| ExperienceError::Unreadable {
            path: path.to_path_buf(),
            source,
        };
        let file = fs.open_read(path).map_err(unreadable)?;
        let size = file.metadata().map_err(unreadable)?.len();
        Self::new(file, size, path)
    }
}

impl<R: Read> RecordReader<R> {
    /// 任意のリーダーから生成する。`size` はシグネチャを含む全体のバイト数
    pub fn new(reader: R, size: u64, path: &Path) -> ExperienceResult<Self> {
        let count = record_count(path, size)?;

        let mut inner = BufReader::with_capacity(READER_BUF_CAP, reader);
        let mut sig = [0u8; SIGNATURE.len()];
        inner.read_exact(&mut sig).map_err(|source| ExperienceError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        if &sig[..] != SIGNATURE {
            return Err(ExperienceError::SignatureMismatch {
                path: path.to_path_buf(),
            });
        }

        if count == 0 {
            return Err(ExperienceError::Empty {
                path: path.to_path_buf(),
            });
        }

        Ok(Self {
            inner,
            path: path.to_path_buf(),
            count,
            read: 0,
        })
    }

    /// ファイル中のレコード数
    pub fn count(&self) -> u64 {
        self.count
    }

    /// 未読のレコード数
    pub fn remaining(&self) -> u64 {
        self.count - self.read
    }

    /// 次のレコード。全件読み終えたら `None`
    pub fn read_next(&mut self) -> ExperienceResult<Option<ExpEntry>> {
        if self.read == self.count {
            return Ok(None);
        }

        let entry =
            ExpEntry::read_from(&mut self.inner).map_err(|source| ExperienceError::ReadFailure {
                path: self.path.clone(),
                index: self.read + 1,
                total: self.count,
                source,
            })?;
        self.read += 1;
        Ok(Some(entry))
    }
}

/// ファイルを検証し、レコード数を返す
pub fn validate(fs: &dyn ExperienceFs, path: &Path) -> ExperienceResult<u64> {
    RecordReader::open(fs, path).map(|reader| reader.count())
}
