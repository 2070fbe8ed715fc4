// 同样的序列号、同样长度的随机负载，一前一后各一个
use rand::RngCore;

use super::{Frequency, Hack};
use crate::error::PacketError;
use crate::hack_pool::Strength;
use crate::packet::{Intent, Packet, ReleaseHint};

pub const HACK_NAME: &str = "fake_data";

pub struct FakeData;

impl Hack for FakeData {
    fn name(&self) -> &'static str {
        HACK_NAME
    }

    fn frequency(&self) -> Frequency {
        Frequency::Probability(30)
    }

    fn min_strength(&self) -> Strength {
        Strength::Normal
    }

    fn condition(&self, orig: &Packet) -> bool {
        orig.tcp().is_some() && orig.payload_len() > 0
    }

    fn create_hack(
        &self,
        orig: &Packet,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<Packet>, PacketError> {
        [ReleaseHint::BeforeOriginal, ReleaseHint::AfterOriginal]
            .into_iter()
            .map(|position| {
                let mut pkt = Packet::derive_from(orig);
                pkt.fill_random_payload(rng);
                pkt.set_position(position);
                pkt.set_intent(Intent::ChecksumInvalid);
                pkt.selflog(HACK_NAME, position.as_str());
                Ok(pkt)
            })
            .collect()
    }
}

pub fn create_hack_object() -> Box<dyn Hack> {
    Box::new(FakeData)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hack::testing::fire;
    use crate::packet::testing::ack_psh;

    #[test]
    fn surrounds_original_with_noise() {
        let orig = ack_psh(64);
        let out = fire(&FakeData, &orig);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].position(), Some(ReleaseHint::BeforeOriginal));
        assert_eq!(out[1].position(), Some(ReleaseHint::AfterOriginal));
        for d in &out {
            assert_eq!(d.payload_len(), 64);
            assert_eq!(d.tcp().unwrap().seq(), orig.tcp().unwrap().seq());
            assert_ne!(d.payload(), orig.payload());
        }
    }

    #[test]
    fn skips_empty_segments() {
        assert!(!FakeData.condition(&ack_psh(0)));
    }
}
