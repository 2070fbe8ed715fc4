use std::io;
use std::mem;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

use crate::packet::Packet;

// ==========================================
// 诱饵出口：IPPROTO_RAW 套接字，包头自己带
// NFQUEUE 只能对已有的包下判决，新包只能从这里发出去
// ==========================================
pub struct RawInjector {
    fd: OwnedFd,
    fwmark: u32,
}

impl RawInjector {
    /// 需要 CAP_NET_RAW；打 SO_MARK 还要 CAP_NET_ADMIN
    pub fn open(fwmark: u32) -> io::Result<Self> {
        let raw = unsafe { libc::socket(libc::AF_INET, libc::SOCK_RAW, libc::IPPROTO_RAW) };
        if raw < 0 {
            return Err(io::Error::last_os_error());
        }
        let fd = unsafe { OwnedFd::from_raw_fd(raw) };

        let ret = unsafe {
            libc::setsockopt(
                fd.as_raw_fd(),
                libc::SOL_SOCKET,
                libc::SO_MARK,
                &fwmark as *const u32 as *const libc::c_void,
                mem::size_of::<u32>() as libc::socklen_t,
            )
        };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }

        log::info!("raw injector ready, decoys marked 0x{fwmark:x}");
        Ok(RawInjector { fd, fwmark })
    }

    pub fn fwmark(&self) -> u32 {
        self.fwmark
    }

    /// 按包里的目的地址原样发出
    pub fn send(&self, pkt: &Packet) -> io::Result<usize> {
        let bytes = pkt.wire_bytes();
        let dst = pkt.ip().dst();

        let mut sin: libc::sockaddr_in = unsafe { mem::zeroed() };
        sin.sin_family = libc::AF_INET as libc::sa_family_t;
        sin.sin_addr = libc::in_addr {
            s_addr: u32::from(dst).to_be(),
        };

        let sent = unsafe {
            libc::sendto(
                self.fd.as_raw_fd(),
                bytes.as_ptr() as *const libc::c_void,
                bytes.len(),
                0,
                &sin as *const libc::sockaddr_in as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
            )
        };
        if sent < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(sent as usize)
    }
}
