// crates/fv_mesh/src/cache.rs

//! 按网格代数缓存的派生数据
//!
//! 插值权重、距离系数、LDU 寻址等首次访问时计算，之后按网格代数复用。
//! 网格变化（体积更新、拓扑变化通知）时代数递增，旧值自然失效；
//! 也可以显式 `invalidate`。

use parking_lot::RwLock;
use std::sync::Arc;

/// 单个派生对象的缓存槽
#[derive(Debug)]
pub struct DemandCache<T> {
    slot: RwLock<Option<(u64, Arc<T>)>>,
}

impl<T> Default for DemandCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> DemandCache<T> {
    /// 空缓存
    pub fn new() -> Self {
        Self {
            slot: RwLock::new(None),
        }
    }

    /// 取当前代的值，不存在或过期则调用 `build` 计算
    pub fn get_or_try_init<E>(
        &self,
        generation: u64,
        build: impl FnOnce() -> Result<T, E>,
    ) -> Result<Arc<T>, E> {
        if let Some((g, v)) = self.slot.read().as_ref() {
            if *g == generation {
                return Ok(Arc::clone(v));
            }
        }

        let mut slot = self.slot.write();
        // 等写锁期间可能已被其它线程计算
        if let Some((g, v)) = slot.as_ref() {
            if *g == generation {
                return Ok(Arc::clone(v));
            }
        }
        let value = Arc::new(build()?);
        *slot = Some((generation, Arc::clone(&value)));
        Ok(value)
    }

    /// 是否持有指定代的值
    pub fn is_current(&self, generation: u64) -> bool {
        matches!(self.slot.read().as_ref(), Some((g, _)) if *g == generation)
    }

    /// 清空
    pub fn invalidate(&self) {
        *self.slot.write() = None;
    }
}
