//! experience ファイルの保守ツール
//!
//! ```text
//! rshogi-exp defrag [FILE]
//! rshogi-exp merge TARGET FILE1 [FILE2 ...]
//! rshogi-exp info FILE
//! ```

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use rshogi_experience::{
    ExperienceCommand, ExperienceConfig, ExperienceContext, ExperienceFs, ExperienceStore, StdFs,
};

#[derive(Parser, Debug)]
#[command(name = "rshogi-exp", author, version, about = "experience ファイルの defrag / merge / 統計表示")]
struct Cli {
    /// 設定ファイル（TOML）
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// 保存対象とする最小の探索深さ（設定ファイルより優先）
    #[arg(long, global = true)]
    min_depth: Option<u32>,

    /// デバッグログを有効化
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 重複レコードと浅いレコードを取り除いて書き直す
    Defrag {
        /// 対象ファイル（省略時は設定の experience ファイル）
        file: Option<PathBuf>,
    },
    /// 複数のファイルを TARGET に統合する（TARGET が既にあればそれも含める）
    Merge {
        target: PathBuf,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// ファイルを検証してロードし、統計を表示する
    Info { file: PathBuf },
}

fn init_logger(debug: bool) {
    let log_level = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, log_level),
    )
    .format(|buf, record| writeln!(buf, "[{}] {}: {}", record.level(), record.target(), record.args()))
    .write_style(env_logger::WriteStyle::Never)
    .target(env_logger::Target::Stderr)
    .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logger(cli.debug);

    let mut config = match &cli.config {
        Some(path) => ExperienceConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ExperienceConfig::default(),
    };
    if let Some(min_depth) = cli.min_depth {
        config.min_depth = min_depth;
    }

    let fs: Arc<dyn ExperienceFs> = Arc::new(StdFs::new());

    let command = match cli.command {
        Command::Defrag { file } => ExperienceCommand::Defrag { file },
        Command::Merge { target, files } => ExperienceCommand::Merge {
            target,
            sources: files,
        },
        Command::Info { file } => return info(fs, config.min_depth, file),
    };

    // 保守コマンドはストアを持たないコンテキストで実行する
    let ctx = ExperienceContext::with_fs(config, fs);
    if !command.execute(&ctx) {
        bail!("experience command failed: {command:?}");
    }
    Ok(())
}

fn info(fs: Arc<dyn ExperienceFs>, min_depth: u32, file: PathBuf) -> Result<()> {
    let mut store = ExperienceStore::new(fs, min_depth);
    if !store.load(&file, true) {
        bail!("Failed to load experience file {}", file.display());
    }

    let index = store.index();
    let longest = index.iter().map(|(_, chain)| chain.len()).max().unwrap_or(0);
    let shallow = index
        .iter()
        .flat_map(|(_, chain)| chain.iter())
        .filter(|e| e.depth < min_depth)
        .count();

    println!("file: {}", file.display());
    println!("positions: {}", index.positions());
    println!("moves: {}", index.moves());
    println!("longest chain: {longest}");
    println!("moves below min depth {min_depth}: {shallow}");
    if let Some(summary) = store.last_load() {
        println!("duplicate moves: {}", summary.duplicate_moves);
        println!("fragmentation: {:.2}%", summary.fragmentation());
    }
    Ok(())
}
