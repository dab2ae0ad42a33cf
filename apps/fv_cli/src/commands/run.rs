// apps/fv_cli/src/commands/run.rs

//! 运行算例命令

use anyhow::{bail, Result};
use clap::Args;
use fv_cli::run_case;
use std::path::PathBuf;
use tracing::{info, warn};

/// 运行参数
#[derive(Args)]
pub struct RunArgs {
    /// 算例文件（JSON）
    #[arg(short, long)]
    pub case: Option<PathBuf>,

    /// 内置算例 (diffusion1d, convection2d, poissonNeumann, cavity)
    #[arg(short, long)]
    pub demo: Option<String>,

    /// 覆盖分区数
    #[arg(long)]
    pub ranks: Option<usize>,

    /// 覆盖结束时间 [s]
    #[arg(short = 't', long)]
    pub end_time: Option<f64>,

    /// 报告输出路径（JSON）
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// 有线性求解未收敛时返回错误
    #[arg(long)]
    pub require_converged: bool,
}

/// 执行运行命令
pub fn execute(args: RunArgs) -> Result<()> {
    info!("=== FvKit 算例运行 ===");

    let mut case = super::load_case(args.case.as_ref(), args.demo.as_deref())?;
    if let Some(ranks) = args.ranks {
        case.n_ranks = ranks;
    }
    if let Some(end_time) = args.end_time {
        case.time.end_time = end_time;
    }

    let report = run_case(&case)?;
    report.log_summary();

    if let Some(path) = &args.output {
        report.write_json(path)?;
    }

    if !report.all_converged() {
        if args.require_converged {
            bail!("算例 {} 中有线性求解未收敛", report.case);
        }
        warn!("算例 {} 中有线性求解未收敛", report.case);
    }
    Ok(())
}
