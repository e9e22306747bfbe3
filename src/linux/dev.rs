use std::io;

use crate::core::dev::{
    Device,
    Error,
    Result,
};
use crate::linux::libc as _libc;

/// [TAP interface](https://www.kernel.org/doc/Documentation/networking/tuntap.txt)
/// for sending and receiving raw ethernet frames.
#[derive(Debug)]
pub struct Tap {
    tapfd: libc::c_int,
    max_transmission_unit: usize,
}

impl Tap {
    /// Creates or binds to an existing TAP interface and queries its MTU.
    ///
    /// The TAP is opened in non blocking mode, so recv(...) returns
    /// Error::Nothing rather than waiting for a frame.
    pub fn new(ifr_name: &str) -> Result<Tap> {
        let ifreq = _libc::c_ifreq::with_name(ifr_name).ok_or_else(|| {
            Error::IO(io::Error::new(
                io::ErrorKind::InvalidInput,
                "TAP name too long",
            ))
        })?;

        unsafe {
            let tapfd = libc::open(
                "/dev/net/tun\0".as_ptr() as *const libc::c_char,
                libc::O_RDWR | libc::O_NONBLOCK,
            );

            if tapfd < 0 {
                return Err(Error::IO(io::Error::last_os_error()));
            }

            let mut _ifreq = ifreq;
            _ifreq.ifr_ifru.ifr_flags = _libc::IFF_TAP | _libc::IFF_NO_PI;
            if libc::ioctl(tapfd, _libc::TUNSETIFF, &mut _ifreq as *mut _libc::c_ifreq) == -1 {
                let err = io::Error::last_os_error();
                libc::close(tapfd);
                return Err(Error::IO(err));
            }

            let max_transmission_unit = match Self::query_mtu(ifreq) {
                Ok(mtu) => mtu,
                Err(err) => {
                    libc::close(tapfd);
                    return Err(err);
                }
            };

            debug!(
                "Opened TAP {} with MTU {}.",
                ifr_name, max_transmission_unit
            );

            Ok(Tap {
                tapfd,
                max_transmission_unit,
            })
        }
    }

    unsafe fn query_mtu(mut ifreq: _libc::c_ifreq) -> Result<usize> {
        let sockfd = libc::socket(libc::AF_INET, libc::SOCK_DGRAM, 0);

        if sockfd == -1 {
            return Err(Error::IO(io::Error::last_os_error()));
        }

        if libc::ioctl(sockfd, _libc::SIOCGIFMTU, &mut ifreq as *mut _libc::c_ifreq) == -1 {
            let err = io::Error::last_os_error();
            libc::close(sockfd);
            return Err(Error::IO(err));
        }

        libc::close(sockfd);
        Ok(ifreq.ifr_ifru.ifr_mtu as usize)
    }
}

impl Device for Tap {
    fn send(&mut self, buffer: &[u8]) -> Result<()> {
        let wrote = unsafe {
            libc::write(
                self.tapfd,
                buffer.as_ptr() as *const libc::c_void,
                buffer.len(),
            )
        };

        if wrote >= 0 {
            return Ok(());
        }

        match io::Error::last_os_error() {
            ref err if err.kind() == io::ErrorKind::WouldBlock => Err(Error::Busy),
            err => Err(Error::IO(err)),
        }
    }

    fn recv(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let read = unsafe {
            libc::read(
                self.tapfd,
                buffer.as_mut_ptr() as *mut libc::c_void,
                buffer.len(),
            )
        };

        if read >= 0 {
            return Ok(read as usize);
        }

        match io::Error::last_os_error() {
            ref err if err.kind() == io::ErrorKind::WouldBlock => Err(Error::Nothing),
            err => Err(Error::IO(err)),
        }
    }

    fn max_transmission_unit(&self) -> usize {
        self.max_transmission_unit
    }
}

impl Drop for Tap {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.tapfd);
        }
    }
}
