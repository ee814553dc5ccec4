//! 保守コマンド（`defrag` / `merge`）の解釈と実行
//!
//! ```text
//! defrag [filename]
//! merge <filename> <filename1> [filename2] ... [filenameX]
//! ```
//!
//! ファイル名は空白を含む場合ダブルクォートで囲む。`merge` の最初のファイルは統合先で、
//! 既に存在すればそれ自身も統合対象になる。

use std::path::PathBuf;

use crate::context::ExperienceContext;
use crate::maintenance;

/// コマンドの書式エラー
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("Incorrect defrag command. Syntax: defrag [filename]")]
    Defrag,

    #[error(
        "Incorrect merge command. Syntax: merge <filename> <filename1> [filename2] ... [filenameX] \
         (the first <filename> is the target which will contain all the merged data)"
    )]
    Merge,

    #[error("Unknown experience command: {0}")]
    Unknown(String),
}

/// 保守コマンド
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExperienceCommand {
    /// `None` の場合は設定中の experience ファイル
    Defrag { file: Option<PathBuf> },
    Merge { target: PathBuf, sources: Vec<PathBuf> },
}

impl ExperienceCommand {
    /// 引数列（先頭はコマンド名）から解釈する
    pub fn parse<S: AsRef<str>>(args: &[S]) -> Result<Self, CommandError> {
        let Some(name) = args.first() else {
            return Err(CommandError::Unknown(String::new()));
        };
        let rest: Vec<&str> = args[1..].iter().map(|s| unquote(s.as_ref())).collect();

        match name.as_ref() {
            "defrag" => {
                let file = match rest.as_slice() {
                    [] => None,
                    [file] if !file.is_empty() => Some(PathBuf::from(file)),
                    [_] => return Err(CommandError::Defrag),
                    // 引用符なしで空白を含むファイル名
                    parts => Some(PathBuf::from(parts.join(" "))),
                };
                Ok(ExperienceCommand::Defrag { file })
            }
            "merge" => {
                let [target, sources @ ..] = rest.as_slice() else {
                    return Err(CommandError::Merge);
                };
                if sources.is_empty() {
                    return Err(CommandError::Merge);
                }
                Ok(ExperienceCommand::Merge {
                    target: PathBuf::from(target),
                    sources: sources.iter().map(PathBuf::from).collect(),
                })
            }
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }

    /// 1 行のコマンド文字列から解釈する
    pub fn parse_line(line: &str) -> Result<Self, CommandError> {
        Self::parse(&split_args(line))
    }

    /// 実行する。結果は成否のみで、詳細はログに出る
    pub fn execute(&self, ctx: &ExperienceContext) -> bool {
        let config = ctx.config();
        match self {
            ExperienceCommand::Defrag { file } => {
                let file = file.as_ref().unwrap_or(&config.file);
                maintenance::defragment(ctx.fs(), config.min_depth, file)
            }
            ExperienceCommand::Merge { target, sources } => {
                maintenance::merge(ctx.fs(), config.min_depth, target, sources)
            }
        }
    }
}

/// 空白で区切る。ダブルクォートで囲まれた部分は 1 つの引数として扱う
pub fn split_args(line: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut has_token = false;

    for c in line.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                has_token = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if has_token {
                    args.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            c => {
                current.push(c);
                has_token = true;
            }
        }
    }
    if has_token {
        args.push(current);
    }
    args
}

/// 前後のダブルクォートを外す
pub fn unquote(s: &str) -> &str {
    let s = s.trim();
    s.strip_prefix('"').and_then(|t| t.strip_suffix('"')).unwrap_or(s)
}
