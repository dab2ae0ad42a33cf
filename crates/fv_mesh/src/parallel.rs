// crates/fv_mesh/src/parallel.rs

//! 进程间通信抽象
//!
//! 每个网格分区对应一个 rank。核心只需要三类操作：
//!
//! 1. 点对点发送/接收（processor 边界交换单元值）
//! 2. 全局归约（求解器中的点积、残差范数）
//! 3. 查询 rank 与总数
//!
//! [`LocalWorld`] 用 `std::sync::mpsc` 通道在同一进程内模拟多 rank，
//! 每个 rank 运行在一个线程上；发送从不阻塞，接收阻塞到消息到达。
//! 阻塞调度逐个边界发送并接收；非阻塞调度先发出全部消息，
//! 之后在显式等待点统一接收。

use fv_foundation::{FvError, FvResult};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::mpsc::{channel, Receiver, Sender};

/// 归约使用的保留标签
const REDUCE_TAG: u32 = u32::MAX;
/// 广播使用的保留标签
const BROADCAST_TAG: u32 = u32::MAX - 1;

/// 通信器
pub trait Communicator: Send + Sync + fmt::Debug {
    /// 本 rank 序号
    fn rank(&self) -> usize;

    /// rank 总数
    fn n_ranks(&self) -> usize;

    /// 发送（不阻塞）
    fn send(&self, to: usize, tag: u32, data: Vec<f64>) -> FvResult<()>;

    /// 接收（阻塞到 (from, tag) 的下一条消息）
    fn recv(&self, from: usize, tag: u32) -> FvResult<Vec<f64>>;

    /// 全局求和
    fn all_reduce_sum(&self, value: f64) -> FvResult<f64>;

    /// 全局最大值
    fn all_reduce_max(&self, value: f64) -> FvResult<f64>;

    /// 全局最小值
    fn all_reduce_min(&self, value: f64) -> FvResult<f64>;

    /// 是否多 rank
    fn is_parallel(&self) -> bool {
        self.n_ranks() > 1
    }

    /// 是否主 rank
    fn is_master(&self) -> bool {
        self.rank() == 0
    }
}

// =============================================================================
// 串行
// =============================================================================

/// 单进程通信器
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialComm;

impl Communicator for SerialComm {
    fn rank(&self) -> usize {
        0
    }

    fn n_ranks(&self) -> usize {
        1
    }

    fn send(&self, to: usize, _tag: u32, _data: Vec<f64>) -> FvResult<()> {
        Err(FvError::communication(format!(
            "串行运行中不能向 rank {} 发送",
            to
        )))
    }

    fn recv(&self, from: usize, _tag: u32) -> FvResult<Vec<f64>> {
        Err(FvError::communication(format!(
            "串行运行中不能从 rank {} 接收",
            from
        )))
    }

    fn all_reduce_sum(&self, value: f64) -> FvResult<f64> {
        Ok(value)
    }

    fn all_reduce_max(&self, value: f64) -> FvResult<f64> {
        Ok(value)
    }

    fn all_reduce_min(&self, value: f64) -> FvResult<f64> {
        Ok(value)
    }
}

// =============================================================================
// 进程内多 rank
// =============================================================================

struct Envelope {
    from: usize,
    tag: u32,
    data: Vec<f64>,
}

/// 进程内多 rank 通信器（每个 rank 一个实例）
pub struct LocalComm {
    rank: usize,
    n_ranks: usize,
    senders: Vec<Option<Sender<Envelope>>>,
    inbox: Mutex<Receiver<Envelope>>,
    pending: Mutex<HashMap<(usize, u32), VecDeque<Vec<f64>>>>,
}

impl fmt::Debug for LocalComm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalComm")
            .field("rank", &self.rank)
            .field("n_ranks", &self.n_ranks)
            .finish()
    }
}

/// 创建进程内多 rank 通信器组
pub struct LocalWorld;

impl LocalWorld {
    /// 创建 `n_ranks` 个互联的通信器，第 i 个用于 rank i
    pub fn create(n_ranks: usize) -> Vec<LocalComm> {
        let (senders, receivers): (Vec<_>, Vec<_>) =
            (0..n_ranks).map(|_| channel::<Envelope>()).unzip();

        receivers
            .into_iter()
            .enumerate()
            .map(|(rank, inbox)| LocalComm {
                rank,
                n_ranks,
                // 不持有发往自己的发送端，对端全部退出时接收会立即报错
                senders: senders
                    .iter()
                    .enumerate()
                    .map(|(to, s)| (to != rank).then(|| s.clone()))
                    .collect(),
                inbox: Mutex::new(inbox),
                pending: Mutex::new(HashMap::new()),
            })
            .collect()
    }
}

impl LocalComm {
    fn reduce(&self, value: f64, op: fn(f64, f64) -> f64) -> FvResult<f64> {
        if self.n_ranks == 1 {
            return Ok(value);
        }
        if self.rank == 0 {
            // 按 rank 顺序合并，结果与线程调度无关
            let mut acc = value;
            for from in 1..self.n_ranks {
                let v = self.recv(from, REDUCE_TAG)?;
                acc = op(acc, v.first().copied().unwrap_or(f64::NAN));
            }
            for to in 1..self.n_ranks {
                self.send(to, BROADCAST_TAG, vec![acc])?;
            }
            Ok(acc)
        } else {
            self.send(0, REDUCE_TAG, vec![value])?;
            let v = self.recv(0, BROADCAST_TAG)?;
            v.first()
                .copied()
                .ok_or_else(|| FvError::communication("广播消息为空"))
        }
    }
}

impl Communicator for LocalComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn n_ranks(&self) -> usize {
        self.n_ranks
    }

    fn send(&self, to: usize, tag: u32, data: Vec<f64>) -> FvResult<()> {
        FvError::check_index("rank", to, self.n_ranks)?;
        let sender = self.senders[to].as_ref().ok_or_else(|| {
            FvError::communication(format!("rank {} 不能向自己发送", self.rank))
        })?;
        sender
            .send(Envelope {
                from: self.rank,
                tag,
                data,
            })
            .map_err(|_| FvError::communication(format!("rank {} 已退出, 无法接收", to)))
    }

    fn recv(&self, from: usize, tag: u32) -> FvResult<Vec<f64>> {
        FvError::check_index("rank", from, self.n_ranks)?;
        loop {
            if let Some(data) = self
                .pending
                .lock()
                .get_mut(&(from, tag))
                .and_then(|q| q.pop_front())
            {
                return Ok(data);
            }

            let envelope = self.inbox.lock().recv().map_err(|_| {
                FvError::communication(format!(
                    "rank {} 等待 rank {} (tag {}) 时所有对端已退出",
                    self.rank, from, tag
                ))
            })?;
            if envelope.from == from && envelope.tag == tag {
                return Ok(envelope.data);
            }
            self.pending
                .lock()
                .entry((envelope.from, envelope.tag))
                .or_default()
                .push_back(envelope.data);
        }
    }

    fn all_reduce_sum(&self, value: f64) -> FvResult<f64> {
        self.reduce(value, |a, b| a + b)
    }

    fn all_reduce_max(&self, value: f64) -> FvResult<f64> {
        self.reduce(value, f64::max)
    }

    fn all_reduce_min(&self, value: f64) -> FvResult<f64> {
        self.reduce(value, f64::min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_reductions_are_identity() {
        let c = SerialComm;
        assert_eq!(c.all_reduce_sum(3.0).unwrap(), 3.0);
        assert_eq!(c.all_reduce_max(-1.0).unwrap(), -1.0);
        assert!(!c.is_parallel());
        assert!(c.send(1, 0, vec![]).is_err());
    }

    #[test]
    fn test_local_world_reduce() {
        let comms = LocalWorld::create(3);
        let results: Vec<(f64, f64, f64)> = std::thread::scope(|s| {
            let handles: Vec<_> = comms
                .iter()
                .map(|c| {
                    s.spawn(move || {
                        let r = c.rank() as f64;
                        (
                            c.all_reduce_sum(r + 1.0).unwrap(),
                            c.all_reduce_max(r).unwrap(),
                            c.all_reduce_min(r).unwrap(),
                        )
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        for r in results {
            assert_eq!(r, (6.0, 2.0, 0.0));
        }
    }

    #[test]
    fn test_out_of_order_messages_are_buffered() {
        let comms = LocalWorld::create(2);
        std::thread::scope(|s| {
            let (a, b) = (&comms[0], &comms[1]);
            s.spawn(move || {
                a.send(1, 7, vec![7.0]).unwrap();
                a.send(1, 3, vec![3.0]).unwrap();
            });
            s.spawn(move || {
                assert_eq!(b.recv(0, 3).unwrap(), vec![3.0]);
                assert_eq!(b.recv(0, 7).unwrap(), vec![7.0]);
            });
        });
    }

    #[test]
    fn test_send_to_self_rejected() {
        let comms = LocalWorld::create(2);
        assert!(comms[0].send(0, 1, vec![1.0]).is_err());
        assert!(comms[0].send(5, 1, vec![1.0]).is_err());
    }
}
