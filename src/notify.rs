use log::debug;
use std::ffi::OsString;
use std::io;

/// Environment variable naming the datagram socket that wants readiness
/// notifications.
pub const NOTIFY_SOCKET_ENV: &str = "NOTIFY_SOCKET";

/// Best-effort service readiness notification.
///
/// `Disabled` is the no-op used when nobody asked to be notified. A socket
/// target receives one datagram per call and no reply is awaited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notifier {
    Disabled,
    Datagram(OsString),
}

impl Notifier {
    pub fn from_env() -> Self {
        Self::from_socket_addr(std::env::var_os(NOTIFY_SOCKET_ENV))
    }

    /// Builds a notifier for a socket address; `None` or empty disables it.
    /// Addresses starting with `@` name Linux abstract sockets.
    pub fn from_socket_addr(addr: Option<OsString>) -> Self {
        match addr {
            Some(addr) if !addr.is_empty() => Notifier::Datagram(addr),
            _ => Notifier::Disabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Notifier::Datagram(_))
    }

    pub fn ready(&self) -> io::Result<()> {
        self.notify("READY=1")
    }

    pub fn notify(&self, state: &str) -> io::Result<()> {
        match self {
            Notifier::Disabled => Ok(()),
            Notifier::Datagram(addr) => {
                debug!("Sending {:?} to {:?}", state, addr);
                send_datagram(addr, state.as_bytes())
            }
        }
    }
}

#[cfg(unix)]
fn send_datagram(addr: &OsString, payload: &[u8]) -> io::Result<()> {
    use std::os::unix::ffi::OsStrExt;
    use std::os::unix::net::UnixDatagram;

    let socket = UnixDatagram::unbound()?;
    let raw = addr.as_bytes();

    if let Some(name) = raw.strip_prefix(b"@") {
        return send_abstract(&socket, name, payload);
    }

    socket.send_to(payload, addr)?;
    Ok(())
}

#[cfg(target_os = "linux")]
fn send_abstract(
    socket: &std::os::unix::net::UnixDatagram,
    name: &[u8],
    payload: &[u8],
) -> io::Result<()> {
    use std::os::linux::net::SocketAddrExt;

    let addr = std::os::unix::net::SocketAddr::from_abstract_name(name)?;
    socket.send_to_addr(payload, &addr)?;
    Ok(())
}

#[cfg(all(unix, not(target_os = "linux")))]
fn send_abstract(
    _socket: &std::os::unix::net::UnixDatagram,
    _name: &[u8],
    _payload: &[u8],
) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "abstract notify sockets are only available on Linux",
    ))
}

#[cfg(not(unix))]
fn send_datagram(_addr: &OsString, _payload: &[u8]) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "notify sockets require Unix domain sockets",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_or_empty_is_disabled() {
        assert_eq!(Notifier::from_socket_addr(None), Notifier::Disabled);
        assert_eq!(
            Notifier::from_socket_addr(Some(OsString::new())),
            Notifier::Disabled
        );
        assert!(Notifier::Disabled.ready().is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_ready_datagram_delivered() {
        use std::os::unix::net::UnixDatagram;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notify.sock");
        let receiver = UnixDatagram::bind(&path).unwrap();

        let notifier = Notifier::from_socket_addr(Some(path.into_os_string()));
        assert!(notifier.is_enabled());
        notifier.ready().unwrap();

        let mut buf = [0u8; 64];
        let n = receiver.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"READY=1");
    }

    #[cfg(unix)]
    #[test]
    fn test_missing_socket_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        let notifier = Notifier::from_socket_addr(Some(dir.path().join("absent.sock").into_os_string()));
        assert!(notifier.ready().is_err());
    }
}
