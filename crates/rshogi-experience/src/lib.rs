//! rshogi experience ストア
//!
//! 過去の探索で有力だった指し手を局面キーごとに記録し、次回以降の探索で参照する
//! ための永続ストア。
//!
//! - `record`: ファイル形式（シグネチャ + 固定長レコード）と検証
//! - `index`: 局面キー → 順位付きチェーンのインメモリインデックス
//! - `loader`: ワーカースレッドでのロードと中断
//! - `store`: 追記保存・全体保存とバックアップ/復元
//! - `maintenance`: defrag / merge
//! - `context`: エンジンから使う窓口
//! - `command`: 保守コマンドの解釈
//!
//! # 使用例
//!
//! ```no_run
//! use rshogi_experience::{ExperienceConfig, ExperienceContext, Move, Value};
//!
//! let mut ctx = ExperienceContext::new(ExperienceConfig::default());
//! ctx.init();
//! ctx.wait_for_loading_finished();
//!
//! if let Some(chain) = ctx.probe(0x1234_5678_9abc_def0) {
//!     let best = chain.head();
//!     println!("best move {:#x} value {} depth {}", best.mv.raw(), best.value, best.depth);
//! }
//!
//! ctx.insert_pv(0x1234_5678_9abc_def0, Move::from_raw(0x0C2B), Value::new(120), 18);
//! ctx.save();
//! ```

pub mod command;
pub mod config;
pub mod context;
pub mod error;
pub mod fs;
pub mod index;
pub mod loader;
pub mod maintenance;
pub mod record;
pub mod store;
pub mod types;

pub use command::{CommandError, ExperienceCommand};
pub use config::{ConfigError, DEFAULT_MIN_DEPTH, ExperienceConfig};
pub use context::ExperienceContext;
pub use error::{ExperienceError, ExperienceResult};
pub use fs::{ExperienceFs, StdFs};
pub use index::{Chain, ExperienceIndex, LinkResult};
pub use loader::{AbortFlag, LoadSummary};
pub use record::{ExpEntry, RECORD_SIZE, SIGNATURE};
pub use store::{ExperienceStore, SaveOutcome, SaveSummary};
pub use types::{Depth, Key, Move, Value};
