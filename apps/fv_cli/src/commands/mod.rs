// apps/fv_cli/src/commands/mod.rs

//! 子命令

pub mod info;
pub mod run;
pub mod validate;

use anyhow::{bail, Context, Result};
use fv_config::{CaseConfig, CaseKind};
use std::path::PathBuf;

/// 从 `--case` 或 `--demo` 得到算例，两者必须且只能给一个
pub fn load_case(case: Option<&PathBuf>, demo: Option<&str>) -> Result<CaseConfig> {
    match (case, demo) {
        (Some(path), None) => CaseConfig::from_file(path)
            .with_context(|| format!("无法加载算例: {}", path.display())),
        (None, Some(name)) => {
            let kind = CaseKind::lookup(name)?;
            Ok(CaseConfig::demo(kind))
        }
        (Some(_), Some(_)) => bail!("--case 与 --demo 不能同时使用"),
        (None, None) => bail!("需要 --case <文件> 或 --demo <名称>"),
    }
}
