use std::collections::VecDeque;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use crate::config::Config;
use crate::error::PacketError;
use crate::five_tuple::FiveTuple;
use crate::hack_pool::{HackPool, PoolControl};
use crate::packet::{Disposition, Intent, Morality, Packet, Proto, ReleaseHint, Source};

mod fifo_qdisc;
mod monitor_qdisc;
mod session;

pub use fifo_qdisc::FifoQdisc;
pub use monitor_qdisc::{MonitorQdisc, ReleaseStats};
pub use session::{Session, SessionTable};

/// 每处理这么多包回收一次空闲会话
const GC_EVERY: u64 = 1024;

/// 排队中的包，serial 是进入 TCPTrack 时分配的创建序号
#[derive(Debug)]
pub struct Queued {
    pub serial: u64,
    /// 诱饵记录它模仿的真包的 serial
    pub origin: Option<u64>,
    pub pkt: Packet,
}

pub trait Qdisc {
    fn enqueue(&mut self, item: Queued) -> Result<(), Queued>;
    fn peek(&self) -> Option<&Queued>;
    fn dequeue(&mut self) -> Option<Queued>;
    fn len(&self) -> usize;
}

// ==========================================
// TCPTrack：收包 -> 评估 hack -> 打戳 -> 按顺序放行
// 单线程处理；HackPool 的配置每个包只读一次快照
// ==========================================
pub struct TCPTrack {
    pool: HackPool,
    sessions: SessionTable,
    /// 写进来还没分析的包，状态都是 Young
    young: VecDeque<Queued>,
    release: MonitorQdisc,
    rng: Box<dyn RngCore + Send>,
    next_serial: u64,
    analyzed: u64,
}

impl TCPTrack {
    pub fn new(pool: HackPool, config: &Config) -> Self {
        Self::with_rng(pool, config, StdRng::from_entropy())
    }

    /// 固定随机源，测试里要可复现
    pub fn with_rng(pool: HackPool, config: &Config, rng: impl RngCore + Send + 'static) -> Self {
        TCPTrack {
            pool,
            sessions: SessionTable::new(config.max_sessions, config.session_idle),
            young: VecDeque::new(),
            release: MonitorQdisc::new(
                "release",
                Box::new(FifoQdisc::new(config.max_packet_queue)),
                config.report_interval,
            ),
            rng: Box::new(rng),
            next_serial: 0,
            analyzed: 0,
        }
    }

    pub fn control(&self) -> PoolControl {
        self.pool.control()
    }

    pub fn sessions(&self) -> &SessionTable {
        &self.sessions
    }

    pub fn stats(&self, morality: Morality) -> ReleaseStats {
        self.release.stats(morality)
    }

    /// 已放行还没被读走的包数
    pub fn pending(&self) -> usize {
        self.release.len()
    }

    fn alloc_serial(&mut self) -> u64 {
        let s = self.next_serial;
        self.next_serial += 1;
        s
    }

    /// 从原始字节收一个真包，返回它的 serial
    pub fn write_packet(&mut self, source: Source, bytes: &[u8]) -> Result<u64, PacketError> {
        let pkt = Packet::new(bytes)?;
        Ok(self.write(source, pkt))
    }

    pub fn write(&mut self, source: Source, mut pkt: Packet) -> u64 {
        pkt.mark(source, Disposition::Young, Morality::Legitimate);
        let serial = self.alloc_serial();
        pkt.selflog("TCPTrack::write", "new packet");
        self.young.push_back(Queued {
            serial,
            origin: None,
            pkt,
        });
        serial
    }

    pub fn analyze_packets_queue(&mut self) {
        self.analyze_at(Instant::now());
    }

    /// 时钟只在这里采一次，整批包共用
    pub fn analyze_at(&mut self, now: Instant) {
        while let Some(orig) = self.young.pop_front() {
            let (before, after) = if orig.pkt.proto() == Proto::Tcp
                && orig.pkt.source().is_some_and(Source::is_outbound)
            {
                self.run_hacks(&orig, now)
            } else {
                (Vec::new(), Vec::new())
            };
            self.flush(orig, before, after);

            self.analyzed += 1;
            if self.analyzed % GC_EVERY == 0 {
                self.sessions.gc(now);
            }
        }
    }

    /// 对一个真包跑所有合格的 hack，诱饵按 release hint 分成前后两组
    fn run_hacks(&mut self, orig: &Queued, now: Instant) -> (Vec<Packet>, Vec<Packet>) {
        let mut before = Vec::new();
        let mut after = Vec::new();

        let Some(dport) = orig.pkt.tcp().map(|t| t.dst_port()) else {
            return (before, after);
        };
        let snapshot = self.pool.snapshot();
        let session = self.sessions.touch(FiveTuple::from(&orig.pkt), now);
        let rng: &mut dyn RngCore = self.rng.as_mut();

        for (idx, hack) in self.pool.eligible(&snapshot, dport) {
            if !hack.condition(&orig.pkt) {
                continue;
            }
            if !session.should_fire(idx, hack.name(), hack.frequency(), now, rng) {
                continue;
            }

            let decoys = match hack.create_hack(&orig.pkt, rng) {
                Ok(decoys) => decoys,
                Err(e) => {
                    // 这次不适用，不占用它的触发窗口
                    log::debug!("hack {} not applied: {e}", hack.name());
                    continue;
                }
            };
            session.record_fired(idx, hack.frequency(), now);

            for mut decoy in decoys {
                if let Err(e) = decoy.self_integrity_check(hack.name()) {
                    log::warn!("{e}, decoy discarded");
                    continue;
                }
                // 畸形选项对端未必拒收，和校验和诱饵一样出门前弄坏校验和
                if matches!(
                    decoy.intent(),
                    Some(Intent::ChecksumInvalid | Intent::Malformed)
                ) {
                    if let Err(e) = decoy.corrupt_tcp_checksum() {
                        log::warn!("hack {} produced a non-TCP decoy: {e}", hack.name());
                        continue;
                    }
                }
                match decoy.position() {
                    Some(ReleaseHint::BeforeOriginal) => before.push(decoy),
                    _ => after.push(decoy),
                }
            }
        }

        (before, after)
    }

    /// 前置诱饵 -> 真包 -> 后置诱饵，依次进放行队列
    fn flush(&mut self, mut orig: Queued, before: Vec<Packet>, after: Vec<Packet>) {
        // write() 一定盖过 source
        let source = orig.pkt.source().unwrap_or(Source::Network);

        let mut held = Vec::with_capacity(before.len());
        for mut pkt in before {
            pkt.mark(source, Disposition::Held, Morality::Decoy);
            pkt.selflog("TCPTrack::flush", "held until original is ready");
            held.push(self.wrap_decoy(pkt, orig.serial));
        }

        for mut item in held {
            item.pkt.set_disposition(Disposition::Send);
            self.release_one(item);
        }

        let origin = orig.serial;
        orig.pkt.set_disposition(Disposition::Send);
        self.release_one(orig);

        for mut pkt in after {
            pkt.mark(source, Disposition::Send, Morality::Decoy);
            let item = self.wrap_decoy(pkt, origin);
            self.release_one(item);
        }
    }

    fn wrap_decoy(&mut self, pkt: Packet, origin: u64) -> Queued {
        Queued {
            serial: self.alloc_serial(),
            origin: Some(origin),
            pkt,
        }
    }

    fn release_one(&mut self, item: Queued) {
        item.pkt.selflog("TCPTrack::release", "ready to send");
        if let Err(dropped) = self.release.enqueue(item) {
            // 真包不会被拒，能到这里的只有诱饵
            log::debug!("decoy {} dropped, release queue full", dropped.serial);
        }
    }

    /// 按放行顺序取包
    pub fn read_packet(&mut self) -> Option<Queued> {
        self.release.dequeue()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::hack::{
        Frequency, Hack, fake_close_rst, fake_data, fake_seq, inject_ipopt, inject_tcpopt,
        zero_window,
    };
    use crate::hack_pool::Strength;
    use crate::packet::testing::{ack_psh, tcp_bytes};

    /// 负载太短就报错的计时 hack
    struct PickyClose;

    impl Hack for PickyClose {
        fn name(&self) -> &'static str {
            "picky_close"
        }

        fn frequency(&self) -> Frequency {
            Frequency::TimeBased(Duration::from_secs(20))
        }

        fn min_strength(&self) -> Strength {
            Strength::Light
        }

        fn condition(&self, orig: &Packet) -> bool {
            orig.tcp().is_some_and(|t| t.ack())
        }

        fn create_hack(
            &self,
            orig: &Packet,
            _rng: &mut dyn RngCore,
        ) -> Result<Vec<Packet>, PacketError> {
            if orig.payload_len() < 10 {
                return Err(PacketError::Truncated {
                    len: orig.payload_len(),
                    need: 10,
                });
            }
            let mut pkt = Packet::derive_from(orig);
            pkt.set_intent(Intent::HarmlessDecoy);
            pkt.set_position(ReleaseHint::BeforeOriginal);
            Ok(vec![pkt])
        }
    }

    fn track(hacks: Vec<(Box<dyn crate::hack::Hack>, bool)>, strength: Strength) -> TCPTrack {
        TCPTrack::with_rng(
            HackPool::from_hacks(hacks, strength),
            &Config::default(),
            StdRng::seed_from_u64(42),
        )
    }

    fn drain(t: &mut TCPTrack) -> Vec<Queued> {
        std::iter::from_fn(|| t.read_packet()).collect()
    }

    #[test]
    fn fake_close_goes_before_original() {
        let mut t = track(vec![(fake_close_rst::create_hack_object(), true)], Strength::Normal);
        let orig = ack_psh(37);
        let serial = t.write(Source::LocalApp, orig.clone());
        t.analyze_packets_queue();

        let out = drain(&mut t);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].origin, Some(serial));
        assert_eq!(out[0].pkt.morality(), Some(Morality::Decoy));
        assert_eq!(out[0].pkt.source(), Some(Source::LocalApp));
        assert!(out[0].pkt.tcp().unwrap().rst());
        assert_eq!(out[1].serial, serial);
        assert_eq!(out[1].pkt.as_bytes(), orig.as_bytes());
        assert!(out.iter().all(|q| q.pkt.disposition() == Some(Disposition::Send)));
    }

    #[test]
    fn time_based_hack_fires_once_per_window() {
        let mut t = track(vec![(fake_close_rst::create_hack_object(), true)], Strength::Light);
        let t0 = Instant::now();
        for i in 0..5 {
            t.write(Source::LocalApp, ack_psh(10));
            t.analyze_at(t0 + Duration::from_secs(i));
        }
        assert_eq!(drain(&mut t).len(), 6);

        t.write(Source::LocalApp, ack_psh(10));
        t.analyze_at(t0 + Duration::from_secs(21));
        assert_eq!(drain(&mut t).len(), 2);
    }

    #[test]
    fn checksum_invalid_decoys_are_corrupted_and_trail() {
        let mut t = track(
            vec![
                (fake_data::create_hack_object(), true),
                (zero_window::create_hack_object(), true),
            ],
            Strength::Heavy,
        );
        // 概率型 hack，多喂一些包
        for _ in 0..200 {
            t.write(Source::LocalApp, ack_psh(20));
        }
        t.analyze_packets_queue();

        let mut last_orig = None;
        let mut decoys = 0;
        for q in drain(&mut t) {
            match q.pkt.morality() {
                Some(Morality::Legitimate) => {
                    assert!(q.pkt.verify_tcp_checksum());
                    last_orig = Some(q.serial);
                }
                _ => {
                    decoys += 1;
                    assert!(!q.pkt.verify_tcp_checksum());
                    if q.pkt.position() == Some(ReleaseHint::AfterOriginal) {
                        assert_eq!(q.origin, last_orig);
                    }
                }
            }
        }
        assert!(decoys > 0);
    }

    #[test]
    fn failed_hack_keeps_its_time_window() {
        let picky: Box<dyn Hack> = Box::new(PickyClose);
        let mut t = track(vec![(picky, true)], Strength::Normal);
        let t0 = Instant::now();

        t.write(Source::LocalApp, ack_psh(5));
        t.analyze_at(t0);
        assert_eq!(drain(&mut t).len(), 1);

        t.write(Source::LocalApp, ack_psh(30));
        t.analyze_at(t0 + Duration::from_secs(1));
        assert_eq!(drain(&mut t).len(), 2);

        t.write(Source::LocalApp, ack_psh(30));
        t.analyze_at(t0 + Duration::from_secs(2));
        assert_eq!(drain(&mut t).len(), 1);
    }

    #[test]
    fn malformed_decoys_never_carry_a_valid_checksum() {
        let mut t = track(
            vec![
                (inject_tcpopt::create_hack_object(), true),
                (inject_ipopt::create_hack_object(), true),
                (fake_seq::create_hack_object(), true),
            ],
            Strength::Heavy,
        );
        let mut malformed = 0;
        for i in 0..300u32 {
            let mut pkt = ack_psh(40);
            pkt.tcp_mut().unwrap().set_seq(0x2000_0000 + i * 40);
            pkt.fix_ip_tcp_checksum().unwrap();
            t.write(Source::LocalApp, pkt);
            t.analyze_packets_queue();

            for q in drain(&mut t) {
                if q.pkt.intent() == Some(Intent::Malformed) {
                    malformed += 1;
                    assert!(q.pkt.verify_ip_checksum());
                    assert!(!q.pkt.verify_tcp_checksum());
                }
            }
        }
        assert!(malformed > 0);
    }

    #[test]
    fn inbound_and_non_tcp_pass_through() {
        let mut t = track(vec![(fake_close_rst::create_hack_object(), true)], Strength::Heavy);
        t.write(Source::Network, ack_psh(10));
        let mut icmp = tcp_bytes(8, 0, 0, 0);
        icmp[9] = 1;
        t.write_packet(Source::LocalApp, &icmp).unwrap();
        t.analyze_packets_queue();

        let out = drain(&mut t);
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|q| q.pkt.morality() == Some(Morality::Legitimate)));
        assert!(t.sessions().is_empty());
    }

    #[test]
    fn none_strength_port_is_left_alone() {
        let mut t = track(vec![(fake_close_rst::create_hack_object(), true)], Strength::Normal);
        t.control().set_port_strength(443..=443, Strength::None).unwrap();
        t.write(Source::LocalApp, ack_psh(10));
        t.analyze_packets_queue();
        assert_eq!(drain(&mut t).len(), 1);
    }

    #[test]
    fn short_buffer_rejected_at_write() {
        let mut t = track(Vec::new(), Strength::Normal);
        assert!(matches!(
            t.write_packet(Source::LocalApp, &[0x45; 12]),
            Err(PacketError::Truncated { len: 12, need: 20 })
        ));
    }
}
