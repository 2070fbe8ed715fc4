use std::collections::HashSet;

use rand::SeedableRng;
use rand::rngs::StdRng;

use nfq_decoy::config::Config;
use nfq_decoy::error::PacketError;
use nfq_decoy::hack_pool::{HackPool, Strength};
use nfq_decoy::packet::header::{TCP_ACK, TCP_PSH};
use nfq_decoy::packet::{Intent, Morality, Packet, ReleaseHint, Source};
use nfq_decoy::track::{Queued, TCPTrack};

fn tcp_segment(ip_opts: usize, sport: u16, seq: u32, payload_len: usize) -> Packet {
    let ihl = 20 + ip_opts;
    let total = ihl + 20 + payload_len;
    let mut b = vec![0u8; total];
    b[0] = 0x40 | (ihl / 4) as u8;
    b[2..4].copy_from_slice(&(total as u16).to_be_bytes());
    b[4..6].copy_from_slice(&0x4242u16.to_be_bytes());
    b[8] = 64;
    b[9] = 6;
    b[12..16].copy_from_slice(&[192, 168, 10, 2]);
    b[16..20].copy_from_slice(&[203, 0, 113, 7]);
    for x in &mut b[20..ihl] {
        *x = 1;
    }
    let t = ihl;
    b[t..t + 2].copy_from_slice(&sport.to_be_bytes());
    b[t + 2..t + 4].copy_from_slice(&443u16.to_be_bytes());
    b[t + 4..t + 8].copy_from_slice(&seq.to_be_bytes());
    b[t + 8..t + 12].copy_from_slice(&0x0a0b_0c0du32.to_be_bytes());
    b[t + 12] = 5 << 4;
    b[t + 13] = TCP_ACK | TCP_PSH;
    b[t + 14..t + 16].copy_from_slice(&64240u16.to_be_bytes());
    for (i, x) in b[t + 20..].iter_mut().enumerate() {
        *x = b'a' + (i % 26) as u8;
    }

    let mut pkt = Packet::new(&b).expect("valid segment");
    pkt.fix_ip_tcp_checksum().expect("tcp");
    pkt
}

fn tracker(config: &Config) -> TCPTrack {
    let pool = HackPool::new(config).expect("known hacks");
    TCPTrack::with_rng(pool, config, StdRng::seed_from_u64(2024))
}

fn drain(track: &mut TCPTrack) -> Vec<Queued> {
    std::iter::from_fn(|| track.read_packet()).collect()
}

#[test]
fn fake_close_on_37_byte_segment() {
    let config = Config {
        only_hack: Some("fake_close_rst".into()),
        ..Config::default()
    };
    let mut track = tracker(&config);

    let orig = tcp_segment(0, 51000, 0x7000_0000, 37);
    let serial = track.write(Source::LocalApp, orig.clone());
    track.analyze_packets_queue();
    let out = drain(&mut track);
    assert_eq!(out.len(), 2);

    let decoy = &out[0].pkt;
    let tcp = decoy.tcp().unwrap();
    assert_eq!(decoy.morality(), Some(Morality::Decoy));
    assert_eq!(decoy.payload_len(), 0);
    assert!(tcp.rst());
    assert!(!tcp.psh());
    assert_eq!(tcp.seq(), 0x7000_0000 - 37 + 1);
    assert!(decoy.verify_ip_checksum());
    assert!(decoy.verify_tcp_checksum());
    assert_eq!(decoy.intent(), Some(Intent::DeliberatelyCorrupt));

    assert_eq!(out[1].serial, serial);
    assert_eq!(out[1].pkt.morality(), Some(Morality::Legitimate));
    assert_eq!(out[1].pkt.as_bytes(), orig.as_bytes());
    assert!(out[1].pkt.verify_tcp_checksum());
}

#[test]
fn full_ip_header_refuses_more_options() {
    let mut rng = StdRng::seed_from_u64(5);
    let mut pkt = tcp_segment(36, 51000, 1, 8);
    assert_eq!(pkt.ip_header_len(), 56);
    let before = pkt.as_bytes().to_vec();

    assert_eq!(
        pkt.inject_bad_ipopt_len(8, &mut rng),
        Err(PacketError::HeaderCapacity {
            proposed: 64,
            limit: 60
        })
    );
    assert_eq!(pkt.as_bytes(), &before[..]);
}

#[test]
fn disabled_hack_never_fires() {
    let config = Config {
        only_hack: Some("fake_data".into()),
        default_strength: Strength::Heavy,
        ..Config::default()
    };
    let mut track = tracker(&config);
    track.control().set_hack_enabled("fake_data", false).unwrap();

    for i in 0..1000u32 {
        track.write(Source::LocalApp, tcp_segment(0, 52000, i * 100, 100));
        track.analyze_packets_queue();
        let out = drain(&mut track);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].pkt.morality(), Some(Morality::Legitimate));
    }
    assert_eq!(track.stats(Morality::Decoy).total_out, 0);

    track.control().set_hack_enabled("fake_data", true).unwrap();
    for i in 0..200u32 {
        track.write(Source::LocalApp, tcp_segment(0, 52000, i * 100, 100));
        track.analyze_packets_queue();
        drain(&mut track);
    }
    assert!(track.stats(Morality::Decoy).total_out > 0);
}

#[test]
fn before_decoys_precede_their_original_across_sessions() {
    let config = Config {
        hacks: ["fake_close_rst", "fake_seq", "fake_data", "inject_tcpopt", "zero_window"]
            .iter()
            .map(|n| (n.to_string(), true))
            .collect(),
        default_strength: Strength::Heavy,
        ..Config::default()
    };
    let mut track = tracker(&config);

    let mut written = Vec::new();
    for round in 0..30u32 {
        for sport in [40001u16, 40002, 40003] {
            let seq = round * 1000 + sport as u32;
            written.push(track.write(Source::LocalApp, tcp_segment(0, sport, seq, 50)));
        }
        // 一轮分析一次，一批里交错着三个会话
        track.analyze_packets_queue();
    }

    let mut released = HashSet::new();
    let mut legit_order = Vec::new();
    let mut befores = 0;
    for q in drain(&mut track) {
        match q.pkt.morality() {
            Some(Morality::Legitimate) => {
                released.insert(q.serial);
                legit_order.push(q.serial);
            }
            _ => {
                let origin = q.origin.expect("decoys know their original");
                match q.pkt.position() {
                    Some(ReleaseHint::BeforeOriginal) => {
                        befores += 1;
                        assert!(!released.contains(&origin));
                    }
                    _ => assert!(released.contains(&origin)),
                }
            }
        }
    }

    assert!(befores > 0);
    // 真包顺序不变
    assert_eq!(legit_order, written);
}

#[test]
fn checksum_repair_round_trip() {
    let mut pkt = tcp_segment(8, 53000, 77, 33);
    assert!(pkt.verify_ip_checksum());
    assert!(pkt.verify_tcp_checksum());

    pkt.corrupt_tcp_checksum().unwrap();
    assert!(!pkt.verify_tcp_checksum());

    pkt.ip_mut().set_ttl(3);
    assert!(!pkt.verify_ip_checksum());

    pkt.fix_ip_tcp_checksum().unwrap();
    assert!(pkt.verify_ip_checksum());
    assert!(pkt.verify_tcp_checksum());
}

#[test]
fn fake_syn_goes_out_before_with_bad_checksum() {
    let config = Config {
        only_hack: Some("fake_syn".into()),
        ..Config::default()
    };
    let mut track = tracker(&config);

    let mut syns = 0;
    for i in 0..300u32 {
        let serial = track.write(Source::LocalApp, tcp_segment(0, 54000, i * 64, 64));
        track.analyze_packets_queue();
        let out = drain(&mut track);
        let (last, decoys) = out.split_last().unwrap();
        assert_eq!(last.serial, serial);
        for d in decoys {
            let tcp = d.pkt.tcp().unwrap();
            assert!(tcp.syn() && !tcp.ack());
            assert_eq!(d.pkt.position(), Some(ReleaseHint::BeforeOriginal));
            assert!(!d.pkt.verify_tcp_checksum());
            syns += 1;
        }
    }
    assert!(syns > 0);
}
