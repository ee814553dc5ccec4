//! experience で扱う基本型
//!
//! 局面キーと指し手のエンコードはエンジン側の責務であり、ここでは固定幅の
//! 不透明な値として扱う。

/// 局面キー（64bit ハッシュ）
pub type Key = u64;

/// 探索深さ（experience では負の深さを持たない）
pub type Depth = u32;

/// 指し手（32bit、エンジンのエンコードをそのまま保持する）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct Move(u32);

impl Move {
    /// 無効な指し手
    pub const NONE: Move = Move(0);

    /// 生の値から生成
    #[inline]
    pub const fn from_raw(raw: u32) -> Move {
        Move(raw)
    }

    /// 生の値を取得
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// 有効な指し手かどうか
    #[inline]
    pub const fn is_some(self) -> bool {
        self.0 != 0
    }
}

impl From<u32> for Move {
    fn from(raw: u32) -> Self {
        Move(raw)
    }
}

/// 評価値（手番側から見た値）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct Value(i32);

impl Value {
    /// ゼロ
    pub const ZERO: Value = Value(0);

    /// 値から生成
    #[inline]
    pub const fn new(v: i32) -> Value {
        Value(v)
    }

    /// 生の値を取得
    #[inline]
    pub const fn raw(self) -> i32 {
        self.0
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value(v)
    }
}

impl std::ops::Neg for Value {
    type Output = Value;

    #[inline]
    fn neg(self) -> Value {
        Value(-self.0)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
