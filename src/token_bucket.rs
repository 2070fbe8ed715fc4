// ================= 极简令牌桶 =================
// 用来给“每 N 秒最多触发一次”的 hack 限流
// 时间由调用方传入，一次评估只采样一次时钟

use std::time::{Duration, Instant};

pub trait TokenBucketLimiter {
    fn can_spend(&mut self, cost: f64, now: Instant) -> bool;
    fn consume(&mut self, cost: f64, now: Instant) -> bool;
}

#[derive(Debug, Clone)]
pub struct TokenBucket {
    pub tokens: f64, // 当前余额
    rate: f64,       // 每秒补充的令牌
    capacity: f64,   // 桶容量
    last_update: Instant,
    name: &'static str,
}

impl TokenBucket {
    pub fn new(rate_per_sec: f64, burst: f64, name: &'static str, now: Instant) -> Self {
        Self {
            tokens: burst, // 初始给满
            rate: rate_per_sec,
            capacity: burst,
            last_update: now,
            name,
        }
    }

    /// 容量 1、每 interval 补 1 个：第一次立即放行，之后每 interval 最多一次
    pub fn once_per(interval: Duration, name: &'static str, now: Instant) -> Self {
        let secs = interval.as_secs_f64().max(0.001);
        Self::new(1.0 / secs, 1.0, name, now)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_update).as_secs_f64();

        // 太小的时间差不算，免得浮点误差累积
        if elapsed > 0.0001 {
            self.tokens = (self.tokens + self.rate * elapsed).min(self.capacity);
            self.last_update = now;
        }
    }
}

impl TokenBucketLimiter for TokenBucket {
    fn consume(&mut self, cost: f64, now: Instant) -> bool {
        self.refill(now);
        if self.tokens >= cost {
            self.tokens -= cost;
            true
        } else {
            log::trace!("[{}] bucket empty ({:.3} tokens)", self.name, self.tokens);
            false
        }
    }

    fn can_spend(&mut self, cost: f64, now: Instant) -> bool {
        self.refill(now);
        self.tokens >= cost
    }
}
