// apps/fv_cli/src/lib.rs

//! FvKit 命令行工具的算例层
//!
//! 命令行入口只做参数解析与日志初始化，算例的组装与求解放在这里，
//! 便于集成测试直接调用。

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cases;

pub use cases::{build_mesh, run_case, CaseOutput, RunReport};
