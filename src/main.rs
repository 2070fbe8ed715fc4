use std::error::Error;
use std::time::Duration;

use nfq::Verdict;

use nfq_decoy::{
    config::Config,
    hack_pool::HackPool,
    nfq_message::{HeldMessages, make_queue},
    packet::{Morality, Source},
    raw_socket::RawInjector,
    track::TCPTrack,
};

const BATCH_LIMIT: usize = 10000;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env()?;
    let pool = HackPool::new(&config)?;
    let mut track = TCPTrack::new(pool, &config);
    log::info!("hack pool:\n{}", track.control().status());

    let mut queue = make_queue(config.queue_num)?;
    let injector = RawInjector::open(config.fwmark)?;
    let mut held = HeldMessages::new();
    log::info!(
        "listening on NFQUEUE {}, decoys marked 0x{:x}",
        config.queue_num,
        injector.fwmark()
    );

    loop {
        let mut working = false;

        // 1. 收一批
        let mut packet_count = 0;
        while packet_count < BATCH_LIMIT {
            let Ok(mut msg) = queue.recv() else {
                break;
            };
            working = true;
            packet_count += 1;

            match track.write_packet(Source::LocalApp, msg.get_payload()) {
                Ok(serial) => held.hold(serial, msg),
                Err(e) => {
                    // 解析不了的包原样放走
                    log::debug!("unparsable packet accepted untouched: {e}");
                    msg.set_verdict(Verdict::Accept);
                    queue.verdict(msg).ok();
                }
            }
        }

        // 2. 评估 hack、排好顺序
        track.analyze_packets_queue();

        // 3. 按顺序放行：诱饵走 raw socket，真包下 Accept
        while let Some(item) = track.read_packet() {
            working = true;
            match item.pkt.morality() {
                Some(Morality::Decoy) => {
                    if let Err(e) = injector.send(&item.pkt) {
                        log::warn!("decoy {} not sent: {e}", item.serial);
                    }
                }
                _ => match held.release(&mut queue, item.serial, Verdict::Accept) {
                    Ok(true) => {}
                    Ok(false) => log::warn!("no held message for packet {}", item.serial),
                    Err(e) => log::warn!("verdict for packet {} failed: {e}", item.serial),
                },
            }
        }

        // 一轮放行完真包应该全部下过判决
        if !held.is_empty() {
            log::warn!("{} queued packets still waiting for a verdict", held.len());
        }

        if !working {
            std::thread::sleep(Duration::from_micros(100));
        }
    }
}
