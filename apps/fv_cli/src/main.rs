// apps/fv_cli/src/main.rs

//! FvKit 命令行界面
//!
//! 运行内置或 JSON 描述的有限体积算例，检查算例配置。

mod commands;

use clap::{Parser, Subcommand};
use tracing::Level;

/// FvKit 有限体积求解命令行工具
#[derive(Parser)]
#[command(name = "fv_cli")]
#[command(author = "FvKit Developers")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "FvKit finite-volume assembly and sparse solver toolkit", long_about = None)]
struct Cli {
    /// 日志级别 (trace, debug, info, warn, error)
    #[arg(short, long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 运行算例
    Run(commands::run::RunArgs),
    /// 显示信息
    Info(commands::info::InfoArgs),
    /// 验证算例配置
    Validate(commands::validate::ValidateArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // 数值库通过 log 输出，try_init 同时安装 log 桥接
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("日志初始化失败: {}", e))?;

    match cli.command {
        Commands::Run(args) => commands::run::execute(args),
        Commands::Info(args) => commands::info::execute(args),
        Commands::Validate(args) => commands::validate::execute(args),
    }
}
