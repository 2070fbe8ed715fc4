// 校验和正确的 RST，但序列号远在窗口之外：中间设备可能信，终端一定不收
use std::time::Duration;

use rand::{Rng, RngCore};

use super::{Frequency, Hack};
use crate::error::PacketError;
use crate::hack_pool::Strength;
use crate::packet::header::{TCP_PSH, TCP_RST};
use crate::packet::{Intent, Packet, ReleaseHint};

pub const HACK_NAME: &str = "valid_rst_fake_seq";

/// 至少偏出这么多，保证落在任何合理窗口外面
const OUT_OF_WINDOW: u32 = 1 << 24;

pub struct ValidRstFakeSeq;

impl Hack for ValidRstFakeSeq {
    fn name(&self) -> &'static str {
        HACK_NAME
    }

    fn frequency(&self) -> Frequency {
        Frequency::TimeBased(Duration::from_secs(60))
    }

    fn min_strength(&self) -> Strength {
        Strength::Normal
    }

    fn condition(&self, orig: &Packet) -> bool {
        orig.tcp().is_some_and(|t| t.ack())
    }

    fn create_hack(
        &self,
        orig: &Packet,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<Packet>, PacketError> {
        let mut pkt = Packet::derive_from(orig);
        pkt.resize_payload(0)?;

        let shift = rng.gen_range(OUT_OF_WINDOW..=u32::MAX - OUT_OF_WINDOW);
        let mut tcp = pkt.tcp_mut().ok_or(PacketError::NotTcp)?;
        tcp.set_flag(TCP_PSH, false);
        tcp.set_flag(TCP_RST, true);
        let seq = tcp.seq();
        tcp.set_seq(seq.wrapping_add(shift));
        pkt.fix_ip_tcp_checksum()?;

        pkt.set_position(ReleaseHint::BeforeOriginal);
        pkt.set_intent(Intent::InnocuousLooking);
        pkt.selflog(HACK_NAME, "Hacked packet");

        Ok(vec![pkt])
    }
}

pub fn create_hack_object() -> Box<dyn Hack> {
    Box::new(ValidRstFakeSeq)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hack::testing::fire;
    use crate::packet::testing::ack_psh;

    #[test]
    fn valid_rst_far_from_window() {
        let orig = ack_psh(5);
        let out = fire(&ValidRstFakeSeq, &orig);
        let d = &out[0];
        assert!(d.tcp().unwrap().rst());
        assert!(d.verify_tcp_checksum());
        let dist = d.tcp().unwrap().seq().wrapping_sub(orig.tcp().unwrap().seq());
        assert!((OUT_OF_WINDOW..=u32::MAX - OUT_OF_WINDOW).contains(&dist));
    }
}
