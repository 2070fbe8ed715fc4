use rand::Rng;

use super::Packet;
use super::header::MAX_HDR_LEN;
use crate::error::PacketError;

const IPOPT_NOP: u8 = 1;
const IPOPT_RR: u8 = 7;
const IPOPT_MINOFF: u8 = 4;

const TCPOPT_EOL: u8 = 0;
const TCPOPT_NOP: u8 = 1;
const TCPOPT_TIMESTAMP: u8 = 8;

const FAKE_TCPOPT_LEN: usize = 4;

// ==========================================
// 选项注入：在头部后面挤出空间，写入长度故意不对的选项
// 所有挪动都走 copy_within，越界会被切片检查拦下
// ==========================================
impl Packet {
    /// 随机长度的 Record-Route 选项：(1 + 0..10) * 4 字节
    pub fn inject_bad_ipopt<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<usize, PacketError> {
        let route_n = rng.gen_range(0..10usize);
        self.inject_bad_ipopt_len((route_n + 1) * 4, rng)
    }

    /// 注入 fakeipopt 字节的 IP 选项，超出 60 字节上限时拒绝且不改动包
    pub fn inject_bad_ipopt_len<R: Rng + ?Sized>(
        &mut self,
        fakeipopt: usize,
        rng: &mut R,
    ) -> Result<usize, PacketError> {
        debug_assert!(fakeipopt >= 4 && fakeipopt % 4 == 0);

        let iphlen = self.ip_header_len();
        if iphlen + fakeipopt > MAX_HDR_LEN {
            return Err(PacketError::HeaderCapacity {
                proposed: iphlen + fakeipopt,
                limit: MAX_HDR_LEN,
            });
        }
        let total = self.total_len().min(self.buffer_len());
        if total < iphlen {
            return Err(PacketError::Truncated {
                len: total,
                need: iphlen,
            });
        }

        self.selflog("inject_bad_ipopt", "before IPopt injection");

        let free_space = self.buffer_len() - total;
        if free_space < fakeipopt {
            self.increase_pbuf(fakeipopt - free_space);
        }

        // 传输层头 + 负载整体后移
        self.pbuf.copy_within(iphlen..total, iphlen + fakeipopt);

        // 真实长度是 fakeipopt - 1（第一个字节是 NOP），这里故意多写或少写 4 的倍数，至少偏 4
        let skew = 4 * rng.gen_range(1..5u8);
        let true_len = (fakeipopt - 1) as u8;
        let olen = if rng.gen_bool(0.5) {
            true_len.wrapping_sub(skew)
        } else {
            true_len.wrapping_add(skew)
        };

        let opt = &mut self.pbuf[iphlen..iphlen + fakeipopt];
        opt[0] = IPOPT_NOP;
        opt[1] = IPOPT_RR;
        opt[2] = olen;
        opt[3] = IPOPT_MINOFF;
        rng.fill(&mut opt[4..]);

        let mut ip = self.ip_mut();
        ip.set_header_len(iphlen + fakeipopt);
        ip.set_total_len((total + fakeipopt) as u16);
        self.update_layout();

        self.selflog("inject_bad_ipopt", "after IPopt injection");
        Ok(fakeipopt)
    }

    /// 注入 NOP NOP TIMESTAMP len 四个字节，没有给时间戳留位置，len 也是随机的
    pub fn inject_bad_tcpopt<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<usize, PacketError> {
        let tcp = self.tcp_range().ok_or(PacketError::NotTcp)?;
        let tcphlen = tcp.len();
        if tcphlen + FAKE_TCPOPT_LEN > MAX_HDR_LEN {
            return Err(PacketError::HeaderCapacity {
                proposed: tcphlen + FAKE_TCPOPT_LEN,
                limit: MAX_HDR_LEN,
            });
        }

        self.selflog("inject_bad_tcpopt", "before TCPopt injection");

        let endtcp = tcp.end;
        // tot_len 可能比 TCP 头还短，按实际要挪的范围算空闲
        let total = self.total_len().min(self.buffer_len()).max(endtcp);
        let free_space = self.buffer_len() - total;
        if free_space < FAKE_TCPOPT_LEN {
            self.increase_pbuf(FAKE_TCPOPT_LEN - free_space);
        }

        self.pbuf.copy_within(endtcp..total, endtcp + FAKE_TCPOPT_LEN);
        self.pbuf[endtcp..endtcp + FAKE_TCPOPT_LEN].copy_from_slice(&[
            TCPOPT_NOP,
            TCPOPT_NOP,
            TCPOPT_TIMESTAMP,
            rng.gen_range(0..11u8),
        ]);

        self.ip_mut()
            .set_total_len((total + FAKE_TCPOPT_LEN) as u16);
        if let Some(mut t) = self.tcp_mut() {
            t.set_header_len(tcphlen + FAKE_TCPOPT_LEN);
        }
        self.update_layout();

        self.selflog("inject_bad_tcpopt", "after TCPopt injection");
        Ok(FAKE_TCPOPT_LEN)
    }

    /// 除了 NOP/EOL/TIMESTAMP 以外出现任何选项都算少见
    /// 选项区是不可信字节，长度字段不合理也算少见
    pub fn check_uncommon_tcpopt(&self) -> bool {
        let Some(tcp) = self.tcp() else {
            return false;
        };
        let opts = tcp.options();
        let mut ret = false;
        let mut i = 0;
        while i < opts.len() {
            match opts[i] {
                TCPOPT_EOL | TCPOPT_NOP => i += 1,
                TCPOPT_TIMESTAMP => {
                    let len = opts.get(i + 1).copied().unwrap_or(0) as usize;
                    if len < 2 {
                        ret = true;
                        break;
                    }
                    i += len;
                }
                _ => {
                    ret = true;
                    break;
                }
            }
        }

        log::trace!(
            target: "nfq_decoy::packets",
            "check_uncommon_tcpopt: sport {} -> dport {}, TCP OPT {}",
            tcp.src_port(),
            tcp.dst_port(),
            ret
        );
        ret
    }

    /// IP 选项还没做检查，一律当作没有少见选项
    pub fn check_uncommon_ipopt(&self) -> bool {
        false
    }
}
