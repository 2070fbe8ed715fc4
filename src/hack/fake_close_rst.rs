// 假关闭：在真数据前面塞一个 RST，序列号往回退到刚好“关掉”这段数据
use std::time::Duration;

use rand::{Rng, RngCore};

use super::{Frequency, Hack};
use crate::error::PacketError;
use crate::hack_pool::Strength;
use crate::packet::header::{TCP_PSH, TCP_RST};
use crate::packet::{Intent, Packet, ReleaseHint};

pub const HACK_NAME: &str = "fake_close_rst";

pub struct FakeCloseRst;

impl Hack for FakeCloseRst {
    fn name(&self) -> &'static str {
        HACK_NAME
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
        rng: &mut dyn RngCore,
    ) -> Result<Vec<Packet>, PacketError> {
        orig.selflog(HACK_NAME, "Original packet");

        let mut pkt = Packet::derive_from(orig);
        // 截断之前先记下原始负载长度
        let original_size = pkt.orig_payload_len() as u32;

        pkt.resize_payload(0)?;
        let id = pkt.ip().id();
        pkt.ip_mut().set_id(id.wrapping_add(rng.gen_range(0..10)));

        let mut tcp = pkt.tcp_mut().ok_or(PacketError::NotTcp)?;
        tcp.set_flag(TCP_PSH, false);
        tcp.set_flag(TCP_RST, true);
        let seq = tcp.seq();
        tcp.set_seq(seq.wrapping_sub(original_size).wrapping_add(1));

        pkt.fill_random_payload(rng);
        pkt.fix_ip_tcp_checksum()?;

        pkt.set_position(ReleaseHint::BeforeOriginal);
        pkt.set_intent(Intent::DeliberatelyCorrupt);
        pkt.selflog(HACK_NAME, "Hacked packet");

        Ok(vec![pkt])
    }
}

pub fn create_hack_object() -> Box<dyn Hack> {
    Box::new(FakeCloseRst)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hack::testing::fire;
    use crate::packet::header::{TCP_ACK, TCP_SYN};
    use crate::packet::testing::{ack_psh, tcp_packet};

    #[test]
    fn closes_right_after_sent_data() {
        let orig = ack_psh(37);
        let out = fire(&FakeCloseRst, &orig);
        assert_eq!(out.len(), 1);

        let d = &out[0];
        let tcp = d.tcp().unwrap();
        assert_eq!(d.payload_len(), 0);
        assert!(tcp.rst());
        assert!(!tcp.psh());
        assert_eq!(tcp.seq(), 0x1000_0000 - 37 + 1);
        assert!(d.verify_ip_checksum());
        assert!(d.verify_tcp_checksum());
        assert_eq!(d.position(), Some(ReleaseHint::BeforeOriginal));
        assert_eq!(d.intent(), Some(Intent::DeliberatelyCorrupt));

        let id_gap = d.ip().id().wrapping_sub(orig.ip().id());
        assert!(id_gap < 10);
    }

    #[test]
    fn seq_wraps_around_zero() {
        let orig = tcp_packet(100, TCP_ACK, 10);
        let out = fire(&FakeCloseRst, &orig);
        assert_eq!(out[0].tcp().unwrap().seq(), 10u32.wrapping_sub(99));
    }

    #[test]
    fn needs_ack() {
        assert!(!FakeCloseRst.condition(&tcp_packet(0, TCP_SYN, 1)));
    }
}
