//! `X-Forwarded-For` injection into the sniffed first message.
//!
//! This is the one place the router touches payload bytes. It runs once
//! per connection on the buffer captured by the sniffer and never looks
//! at anything the relay copies afterwards.

use std::borrow::Cow;
use std::net::IpAddr;

/// Offset just past the first `\n`, or `None` when the buffer holds no
/// complete line.
#[must_use]
pub fn first_line_end(buf: &[u8]) -> Option<usize> {
    buf.iter().position(|&b| b == b'\n').map(|i| i + 1)
}

/// Insert `X-Forwarded-For: <client>` right after the request/status line.
///
/// Without a line terminator in `initial` the bytes are returned untouched.
#[must_use]
pub fn inject_forwarded_for(initial: &[u8], client: IpAddr) -> Cow<'_, [u8]> {
    let Some(split) = first_line_end(initial) else {
        return Cow::Borrowed(initial);
    };

    let header = format!("X-Forwarded-For: {client}\r\n");
    let mut out = Vec::with_capacity(initial.len() + header.len());
    out.extend_from_slice(&initial[..split]);
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(&initial[split..]);
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn injects_after_request_line() {
        let client: IpAddr = "203.0.113.5".parse().unwrap();
        let out = inject_forwarded_for(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n", client);
        assert_eq!(
            &*out,
            b"GET / HTTP/1.1\r\nX-Forwarded-For: 203.0.113.5\r\nHost: x\r\n\r\n".as_slice()
        );
    }

    #[test]
    fn bare_lf_line_keeps_its_terminator() {
        let client: IpAddr = "10.1.2.3".parse().unwrap();
        let out = inject_forwarded_for(b"HTTP/1.0 200 OK\nbody", client);
        assert_eq!(
            &*out,
            b"HTTP/1.0 200 OK\nX-Forwarded-For: 10.1.2.3\r\nbody".as_slice()
        );
    }

    #[test]
    fn ipv6_has_no_brackets() {
        let client: IpAddr = "2001:db8::1".parse().unwrap();
        let out = inject_forwarded_for(b"GET / HTTP/1.1\r\n", client);
        assert!(out.ends_with(b"X-Forwarded-For: 2001:db8::1\r\n"));
    }

    #[test]
    fn no_terminator_forwards_unmodified() {
        let client: IpAddr = "10.1.2.3".parse().unwrap();
        let out = inject_forwarded_for(b"GET / HTTP/1.1", client);
        assert!(matches!(out, Cow::Borrowed(_)));
        assert_eq!(&*out, b"GET / HTTP/1.1".as_slice());
    }

    #[test]
    fn first_line_end_offsets() {
        assert_eq!(first_line_end(b"\n"), Some(1));
        assert_eq!(first_line_end(b"ab\r\ncd\n"), Some(4));
        assert_eq!(first_line_end(b""), None);
    }
}
