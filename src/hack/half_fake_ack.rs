// 校验和正确的纯 ACK，ack_seq 退到很久以前，对端当作过期确认丢掉
use rand::{Rng, RngCore};

use super::{Frequency, Hack};
use crate::error::PacketError;
use crate::hack_pool::Strength;
use crate::packet::header::TCP_PSH;
use crate::packet::{Intent, Packet, ReleaseHint};

pub const HACK_NAME: &str = "half_fake_ack";

/// 比任何窗口都大的回退量
const STALE_ACK: u32 = 1 << 24;

pub struct HalfFakeAck;

impl Hack for HalfFakeAck {
    fn name(&self) -> &'static str {
        HACK_NAME
    }

    fn frequency(&self) -> Frequency {
        Frequency::Probability(10)
    }

    fn min_strength(&self) -> Strength {
        Strength::Heavy
    }

    fn condition(&self, orig: &Packet) -> bool {
        orig.tcp()
            .is_some_and(|t| t.ack() && !t.syn() && !t.rst() && !t.fin())
    }

    fn create_hack(
        &self,
        orig: &Packet,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<Packet>, PacketError> {
        let mut pkt = Packet::derive_from(orig);
        pkt.resize_payload(0)?;

        let back = rng.gen_range(STALE_ACK..STALE_ACK * 2);
        let mut tcp = pkt.tcp_mut().ok_or(PacketError::NotTcp)?;
        tcp.set_flag(TCP_PSH, false);
        let ack = tcp.ack_seq();
        tcp.set_ack_seq(ack.wrapping_sub(back));
        pkt.fix_ip_tcp_checksum()?;

        pkt.set_position(ReleaseHint::AfterOriginal);
        pkt.set_intent(Intent::InnocuousLooking);
        pkt.selflog(HACK_NAME, "Hacked packet");

        Ok(vec![pkt])
    }
}

pub fn create_hack_object() -> Box<dyn Hack> {
    Box::new(HalfFakeAck)
}
