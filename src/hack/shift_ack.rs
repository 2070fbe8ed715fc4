use rand::{Rng, RngCore};

use super::{Frequency, Hack};
use crate::error::PacketError;
use crate::hack_pool::Strength;
use crate::packet::{Intent, Packet, ReleaseHint};

pub const HACK_NAME: &str = "shift_ack";

pub struct ShiftAck;

impl Hack for ShiftAck {
    fn name(&self) -> &'static str {
        HACK_NAME
    }

    fn frequency(&self) -> Frequency {
        Frequency::Probability(20)
    }

    fn min_strength(&self) -> Strength {
        Strength::Heavy
    }

    fn condition(&self, orig: &Packet) -> bool {
        orig.tcp().is_some_and(|t| t.ack()) && orig.payload_len() > 0
    }

    fn create_hack(
        &self,
        orig: &Packet,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<Packet>, PacketError> {
        let mut pkt = Packet::derive_from(orig);

        let shift = rng.gen_range(1..=0xffffu32);
        let mut tcp = pkt.tcp_mut().ok_or(PacketError::NotTcp)?;
        let ack = tcp.ack_seq();
        tcp.set_ack_seq(ack.wrapping_add(shift));
        pkt.fill_random_payload(rng);

        pkt.set_position(ReleaseHint::AfterOriginal);
        pkt.set_intent(Intent::ChecksumInvalid);
        pkt.selflog(HACK_NAME, "Hacked packet");

        Ok(vec![pkt])
    }
}

pub fn create_hack_object() -> Box<dyn Hack> {
    Box::new(ShiftAck)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hack::testing::fire;
    use crate::packet::testing::ack_psh;

    #[test]
    fn ack_moves_forward() {
        let orig = ack_psh(8);
        let out = fire(&ShiftAck, &orig);
        let gap = out[0]
            .tcp()
            .unwrap()
            .ack_seq()
            .wrapping_sub(orig.tcp().unwrap().ack_seq());
        assert!((1..=0xffff).contains(&gap));
        assert!(!ShiftAck.condition(&ack_psh(0)));
    }
}
