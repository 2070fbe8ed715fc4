use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::time::{Duration, Instant};

use rand::{Rng, RngCore};

use crate::five_tuple::FiveTuple;
use crate::hack::Frequency;
use crate::token_bucket::{TokenBucket, TokenBucketLimiter};

// ==========================================
// 会话：hack 需要的按连接记忆都放在这里
// ==========================================
#[derive(Debug)]
pub struct Session {
    pub key: FiveTuple,
    /// 本会话已经评估过的包数，从 1 开始
    pub packets: u64,
    last_seen: Instant,
    /// hack 下标 -> 限流桶，TimeBased 用
    buckets: HashMap<usize, TokenBucket>,
}

impl Session {
    fn new(key: FiveTuple, now: Instant) -> Self {
        Session {
            key,
            packets: 0,
            last_seen: now,
            buckets: HashMap::new(),
        }
    }

    pub fn last_seen(&self) -> Instant {
        self.last_seen
    }

    /// condition 已经成立之后，由频率决定这次要不要真的触发
    /// TimeBased 这里只看不扣，hack 真的产出诱饵后由 record_fired 扣掉
    pub fn should_fire(
        &mut self,
        idx: usize,
        name: &'static str,
        freq: Frequency,
        now: Instant,
        rng: &mut dyn RngCore,
    ) -> bool {
        match freq {
            Frequency::OnCondition => true,
            Frequency::Probability(percent) => rng.gen_range(0..100u8) < percent,
            Frequency::EveryNPackets(n) => n > 0 && self.packets % n as u64 == 0,
            Frequency::TimeBased(interval) => self
                .buckets
                .entry(idx)
                .or_insert_with(|| TokenBucket::once_per(interval, name, now))
                .can_spend(1.0, now),
        }
    }

    pub fn record_fired(&mut self, idx: usize, freq: Frequency, now: Instant) {
        if let Frequency::TimeBased(_) = freq {
            if let Some(bucket) = self.buckets.get_mut(&idx) {
                bucket.consume(1.0, now);
            }
        }
    }
}

/// 有上限的会话表：满了踢最久没动静的，空闲超时的定期回收
pub struct SessionTable {
    sessions: HashMap<FiveTuple, Session>,
    max_sessions: usize,
    idle: Duration,
}

impl SessionTable {
    pub fn new(max_sessions: usize, idle: Duration) -> Self {
        SessionTable {
            sessions: HashMap::with_capacity(max_sessions),
            max_sessions: max_sessions.max(1),
            idle,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn get(&self, key: &FiveTuple) -> Option<&Session> {
        self.sessions.get(&key.canonical())
    }

    /// 找到（或新建）会话，计数加一
    pub fn touch(&mut self, key: FiveTuple, now: Instant) -> &mut Session {
        let key = key.canonical();
        if !self.sessions.contains_key(&key) && self.sessions.len() >= self.max_sessions {
            self.evict_oldest();
        }

        let session = match self.sessions.entry(key) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => {
                log::debug!("new session {:?}", key);
                e.insert(Session::new(key, now))
            }
        };
        session.packets += 1;
        session.last_seen = now;
        session
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .sessions
            .values()
            .min_by_key(|s| s.last_seen)
            .map(|s| s.key);
        if let Some(key) = oldest {
            log::debug!("session table full, evicting {:?}", key);
            self.sessions.remove(&key);
        }
    }

    /// 回收空闲会话，返回回收数量
    pub fn gc(&mut self, now: Instant) -> usize {
        let before = self.sessions.len();
        let idle = self.idle;
        self.sessions
            .retain(|_, s| now.saturating_duration_since(s.last_seen) <= idle);
        let removed = before - self.sessions.len();
        if removed > 0 {
            log::debug!("session gc removed {removed}, {} left", self.sessions.len());
        }
        removed
    }
}
