use std::collections::VecDeque;

use crate::packet::Morality;
use crate::track::{Qdisc, Queued};

// ==========================================
// 出口 FIFO：真包永远收，诱饵超过上限就拒
// ==========================================
pub struct FifoQdisc {
    queue: VecDeque<Queued>,
    decoy_limit: usize, // 队列里最多压多少诱饵
    decoys: usize,
}

impl FifoQdisc {
    pub fn new(decoy_limit: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            decoy_limit,
            decoys: 0,
        }
    }
}

fn is_decoy(item: &Queued) -> bool {
    item.pkt.morality() == Some(Morality::Decoy)
}

impl Qdisc for FifoQdisc {
    fn enqueue(&mut self, item: Queued) -> Result<(), Queued> {
        if is_decoy(&item) {
            if self.decoys >= self.decoy_limit {
                return Err(item);
            }
            self.decoys += 1;
        }
        self.queue.push_back(item);
        Ok(())
    }

    fn peek(&self) -> Option<&Queued> {
        self.queue.front()
    }

    fn dequeue(&mut self) -> Option<Queued> {
        let item = self.queue.pop_front()?;
        if is_decoy(&item) {
            self.decoys -= 1;
        }
        Some(item)
    }

    fn len(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::testing::ack_psh;
    use crate::packet::{Disposition, Source};

    fn item(serial: u64, morality: Morality) -> Queued {
        let mut pkt = ack_psh(1);
        pkt.mark(Source::LocalApp, Disposition::Send, morality);
        Queued {
            serial,
            origin: None,
            pkt,
        }
    }

    #[test]
    fn decoys_bounded_legit_never_rejected() {
        let mut q = FifoQdisc::new(2);
        assert!(q.enqueue(item(1, Morality::Decoy)).is_ok());
        assert!(q.enqueue(item(2, Morality::Decoy)).is_ok());
        assert_eq!(q.enqueue(item(3, Morality::Decoy)).map_err(|i| i.serial), Err(3));
        for s in 4..100 {
            assert!(q.enqueue(item(s, Morality::Legitimate)).is_ok());
        }

        assert_eq!(q.dequeue().map(|i| i.serial), Some(1));
        assert!(q.enqueue(item(100, Morality::Decoy)).is_ok());
        assert_eq!(q.peek().map(|i| i.serial), Some(2));
        assert_eq!(q.len(), 2 + 96);
    }
}
