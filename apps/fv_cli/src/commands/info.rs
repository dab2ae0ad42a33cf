// apps/fv_cli/src/commands/info.rs

//! 信息显示命令

use anyhow::{Context, Result};
use clap::Args;
use fv_config::{
    CaseConfig, CaseKind, DdtKind, InterpolationKind, PreconditionerKind, SmootherKind,
    SolverKind,
};
use std::path::PathBuf;
use tracing::info;

/// 信息参数
#[derive(Args)]
pub struct InfoArgs {
    /// 列出可选的求解器与格式名称
    #[arg(long)]
    pub names: bool,

    /// 输出内置算例的 JSON 配置
    #[arg(long)]
    pub demo: Option<String>,

    /// 把 `--demo` 的配置写入文件，作为自定义算例的起点
    #[arg(long, requires = "demo")]
    pub save: Option<PathBuf>,
}

/// 执行信息命令
pub fn execute(args: InfoArgs) -> Result<()> {
    info!("=== FvKit 信息 ===");

    if let Some(name) = &args.demo {
        let case = CaseConfig::demo(CaseKind::lookup(name)?);
        match &args.save {
            Some(path) => {
                case.save_to_file(path)
                    .with_context(|| format!("无法写入: {}", path.display()))?;
                info!("算例 {} 已写入 {}", case.name, path.display());
            }
            None => println!("{}", serde_json::to_string_pretty(&case)?),
        }
        return Ok(());
    }

    print_version();
    if args.names {
        println!();
        print_names();
    }
    Ok(())
}

fn print_version() {
    println!("FvKit CLI 版本: {}", env!("CARGO_PKG_VERSION"));
    println!("目标平台: {} / {}", std::env::consts::ARCH, std::env::consts::OS);
    println!("内置算例: {}", CaseKind::canonical_names().join(", "));
}

fn print_names() {
    println!("=== 可选名称 ===");
    println!("求解器:     {}", SolverKind::canonical_names().join(", "));
    println!("预条件子:   {}", PreconditionerKind::canonical_names().join(", "));
    println!("光顺器:     {}", SmootherKind::canonical_names().join(", "));
    println!("对流格式:   {}", InterpolationKind::canonical_names().join(", "));
    println!("时间格式:   {}", DdtKind::canonical_names().join(", "));
}
