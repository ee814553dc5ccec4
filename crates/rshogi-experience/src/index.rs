//! 局面キー → 順位付きチェーンのインデックス
//!
//! 各局面キーに対し、その局面で記録された指し手のレコード列（チェーン）を保持する。
//! チェーンは [`ExpEntry::compare`] の降順に並び、先頭が現時点で最善の指し手となる。
//! 同じ指し手は 1 つのチェーンに 1 回しか現れない。

use std::cmp::Ordering;
use std::collections::HashMap;
use std::collections::TryReserveError;

use crate::record::ExpEntry;
use crate::types::{Key, Move};

/// [`ExperienceIndex::link`] の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkResult {
    /// 新しいレコードとして追加された
    Inserted,
    /// 既存の同じ指し手のレコードに統合された
    Merged,
}

/// 1 局面分のレコード列（常に 1 件以上）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chain {
    entries: Vec<ExpEntry>,
}

impl Chain {
    fn new(entry: ExpEntry) -> Self {
        Self {
            entries: vec![entry],
        }
    }

    /// 最上位のレコード
    #[inline]
    pub fn head(&self) -> &ExpEntry {
        &self.entries[0]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 順位順のイテレータ
    pub fn iter(&self) -> std::slice::Iter<'_, ExpEntry> {
        self.entries.iter()
    }

    pub fn as_slice(&self) -> &[ExpEntry] {
        &self.entries
    }

    /// 指定した指し手のレコード
    pub fn find(&self, mv: Move) -> Option<&ExpEntry> {
        self.entries.iter().find(|e| e.mv == mv)
    }

    fn link(&mut self, entry: ExpEntry) -> LinkResult {
        if let Some(pos) = self.entries.iter().position(|e| e.mv == entry.mv) {
            if self.entries[pos].merge(&entry) {
                self.promote(pos);
            }
            return LinkResult::Merged;
        }

        // 自分より strictly 上位でないレコードの後ろ（同順位なら既存が先）
        let at = self.entries.partition_point(|e| entry.compare(e) != Ordering::Greater);
        self.entries.insert(at, entry);
        LinkResult::Inserted
    }

    /// 統合で順位が上がったレコードを正しい位置へ移す
    fn promote(&mut self, pos: usize) {
        let entry = self.entries[pos];
        let at = self.entries[..pos].partition_point(|e| entry.compare(e) != Ordering::Greater);
        if at < pos {
            self.entries[at..=pos].rotate_right(1);
        }
    }
}

impl<'a> IntoIterator for &'a Chain {
    type Item = &'a ExpEntry;
    type IntoIter = std::slice::Iter<'a, ExpEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// experience のインメモリインデックス
#[derive(Debug, Default)]
pub struct ExperienceIndex {
    chains: HashMap<Key, Chain>,
    moves: usize,
}

impl ExperienceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// レコードを 1 件リンクする
    pub fn link(&mut self, entry: ExpEntry) -> LinkResult {
        let result = match self.chains.get_mut(&entry.key) {
            Some(chain) => chain.link(entry),
            None => {
                self.chains.insert(entry.key, Chain::new(entry));
                LinkResult::Inserted
            }
        };

        if result == LinkResult::Inserted {
            self.moves += 1;
        }
        result
    }

    /// 局面のチェーンを引く
    #[inline]
    pub fn probe(&self, key: Key) -> Option<&Chain> {
        self.chains.get(&key)
    }

    /// 局面数
    pub fn positions(&self) -> usize {
        self.chains.len()
    }

    /// レコード総数
    pub fn moves(&self) -> usize {
        self.moves
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    /// (局面キー, チェーン) を列挙する。局面間の順序は不定
    pub fn iter(&self) -> impl Iterator<Item = (Key, &Chain)> + '_ {
        self.chains.iter().map(|(k, c)| (*k, c))
    }

    /// 局面 `additional` 件分の領域を確保する
    pub fn try_reserve(&mut self, additional: usize) -> Result<(), TryReserveError> {
        self.chains.try_reserve(additional)
    }

    pub fn clear(&mut self) {
        self.chains.clear();
        self.moves = 0;
    }
}
