use chrono::Local;
use std::time::{Duration, Instant};

use crate::packet::Morality;
use crate::track::{Qdisc, Queued};

// ==========================================
// 1. 按真包/诱饵分开的统计 (区间计数 + 积压水位)
// ==========================================
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReleaseStats {
    // 📈 区间计数，每次报告后清零
    pub in_pkts: u64,
    pub drop_pkts: u64,
    pub out_pkts: u64,
    pub out_bytes: u64,

    // 🌊 积压水位，不清零
    pub backlog_pkts: u64,

    // 累计值，给测试和退出时的总结用
    pub total_out: u64,
    pub total_drop: u64,
}

#[derive(Default)]
struct Stats {
    legit: ReleaseStats,
    decoy: ReleaseStats,
}

impl Stats {
    fn of(&mut self, morality: Option<Morality>) -> &mut ReleaseStats {
        match morality {
            Some(Morality::Decoy) => &mut self.decoy,
            _ => &mut self.legit,
        }
    }
}

// ==========================================
// 2. 监控包装：原样转发，顺便记账、定期打报表
// ==========================================
pub struct MonitorQdisc {
    name: String,
    pub inner: Box<dyn Qdisc>,
    stats: Stats,
    report_interval: Duration,
    last_report: Instant,
}

impl MonitorQdisc {
    pub fn new(name: &str, inner: Box<dyn Qdisc>, report_interval: Duration) -> Self {
        Self {
            name: name.to_string(),
            inner,
            stats: Stats::default(),
            report_interval,
            last_report: Instant::now(),
        }
    }

    pub fn stats(&self, morality: Morality) -> ReleaseStats {
        match morality {
            Morality::Legitimate => self.stats.legit,
            Morality::Decoy => self.stats.decoy,
        }
    }

    fn check_and_report(&mut self) {
        let elapsed = self.last_report.elapsed();
        if elapsed < self.report_interval {
            return;
        }

        let now_str = Local::now().format("%H:%M:%S").to_string();
        log::info!("📊 [{}] {} over {:.1}s", now_str, self.name, elapsed.as_secs_f64());
        for (label, stat) in [("good", &mut self.stats.legit), ("evil", &mut self.stats.decoy)] {
            log::info!(
                "{:<5} | in {:<6} | drop {:<6} | out {:<6} | {:<8} bytes | backlog {}",
                label,
                stat.in_pkts,
                stat.drop_pkts,
                stat.out_pkts,
                stat.out_bytes,
                stat.backlog_pkts
            );
            // 只清区间计数
            stat.in_pkts = 0;
            stat.drop_pkts = 0;
            stat.out_pkts = 0;
            stat.out_bytes = 0;
        }

        self.last_report = Instant::now();
    }
}

// ==========================================
// 3. Qdisc 接口 (拦截、更新)
// ==========================================
impl Qdisc for MonitorQdisc {
    fn enqueue(&mut self, item: Queued) -> Result<(), Queued> {
        let morality = item.pkt.morality();
        let result = self.inner.enqueue(item);
        let stat = self.stats.of(morality);
        match &result {
            Ok(()) => {
                stat.in_pkts += 1;
                stat.backlog_pkts += 1;
            }
            Err(rejected) => {
                stat.drop_pkts += 1;
                stat.total_drop += 1;
                rejected.pkt.selflog("MonitorQdisc", "release queue full, dropped");
            }
        }
        result
    }

    fn peek(&self) -> Option<&Queued> {
        self.inner.peek()
    }

    fn dequeue(&mut self) -> Option<Queued> {
        let result = self.inner.dequeue();

        if let Some(item) = &result {
            let bytes = item.pkt.wire_bytes().len() as u64;
            let stat = self.stats.of(item.pkt.morality());
            stat.out_pkts += 1;
            stat.total_out += 1;
            stat.out_bytes += bytes;
            stat.backlog_pkts = stat.backlog_pkts.saturating_sub(1);
        }

        self.check_and_report();
        result
    }

    fn len(&self) -> usize {
        self.inner.len()
    }
}
