// apps/fv_cli/src/cases/report.rs

//! 运行报告

use super::CaseOutput;
use anyhow::{Context, Result};
use fv_config::CaseConfig;
use fv_numerics::SolverPerformance;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// 算例运行报告，可写成 JSON
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// 算例名
    pub case: String,
    /// 算例类型
    pub kind: String,
    /// 单元数
    pub n_cells: usize,
    /// 分区数
    pub n_ranks: usize,
    /// 时间步数
    pub steps: usize,
    /// 墙钟时间 [s]
    pub elapsed_seconds: f64,
    /// 全局统计量
    pub summary: BTreeMap<String, f64>,
    /// 最后一个时间步的求解记录
    pub performance: Vec<SolverPerformance>,
    /// 单元场
    pub fields: BTreeMap<String, Vec<f64>>,
}

impl RunReport {
    /// 由求解结果生成
    pub fn new(case: &CaseConfig, n_cells: usize, output: CaseOutput, elapsed: Duration) -> Self {
        Self {
            case: case.name.clone(),
            kind: case.kind.name().to_string(),
            n_cells,
            n_ranks: case.n_ranks,
            steps: output.steps,
            elapsed_seconds: elapsed.as_secs_f64(),
            summary: output.summary,
            performance: output.performance,
            fields: output.fields,
        }
    }

    /// 所有线性求解都收敛
    pub fn all_converged(&self) -> bool {
        self.performance.iter().all(|p| p.converged)
    }

    /// 输出摘要日志
    pub fn log_summary(&self) {
        info!("=== {} 完成 ===", self.case);
        info!(
            "{} 单元, {} 分区, {} 步, 耗时 {:.3} s",
            self.n_cells, self.n_ranks, self.steps, self.elapsed_seconds
        );
        for perf in &self.performance {
            info!("{}", perf);
        }
        for (key, value) in &self.summary {
            info!("{} = {:.6e}", key, value);
        }
    }

    /// 写 JSON 文件
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self).context("报告序列化失败")?;
        std::fs::write(path, content)
            .with_context(|| format!("无法写入报告: {}", path.display()))?;
        info!("报告已写入 {}", path.display());
        Ok(())
    }
}
