use std::collections::HashMap;
use std::io;

use nfq::{Message, Queue, Verdict};

pub fn make_queue(queue_num: u16) -> Result<Queue, io::Error> {
    let mut q = Queue::open()?;
    q.bind(queue_num)?;
    q.set_copy_range(queue_num, 0xFFFF)?;
    q.set_queue_max_len(queue_num, 10000)?;
    q.set_nonblocking(true);
    Ok(q)
}

// ==========================================
// 在 TCPTrack 里排队的真包，对应的 NFQUEUE 消息先扣在这里
// 真包被放行时按 serial 找回消息下 Accept 判决
// ==========================================
#[derive(Default)]
pub struct HeldMessages {
    held: HashMap<u64, Message>,
}

impl HeldMessages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hold(&mut self, serial: u64, msg: Message) {
        self.held.insert(serial, msg);
    }

    pub fn len(&self) -> usize {
        self.held.len()
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }

    /// 下判决；serial 不在表里说明不是从队列来的，什么都不做
    pub fn release(&mut self, queue: &mut Queue, serial: u64, verdict: Verdict) -> io::Result<bool> {
        let Some(mut msg) = self.held.remove(&serial) else {
            return Ok(false);
        };
        msg.set_verdict(verdict);
        queue.verdict(msg)?;
        Ok(true)
    }
}
