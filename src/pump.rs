//! Bidirectional byte relay between a client and its destination.
//!
//! The pump waits at most one poll interval per cycle for either side to
//! produce data. Every chunk read from one side is written in full to the
//! other before the next cycle starts. A cycle in which neither side had
//! anything to say counts as idle; enough consecutive idle cycles end the
//! relay, so tunnels a test client forgot about do not linger.

use log::{debug, trace};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{Duration, sleep};

/// Why a relay stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The client closed its write side.
    ClientClosed,
    /// The destination closed its write side.
    UpstreamClosed,
    /// No data moved for the configured number of cycles.
    Idle,
    /// A read or write failed on either side.
    Error(io::ErrorKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayStats {
    pub client_to_upstream: u64,
    pub upstream_to_client: u64,
    pub termination: Termination,
}

#[derive(Debug, Clone)]
pub struct RelayPump {
    poll_interval: Duration,
    chunk_size: usize,
    idle_limit: u32,
}

impl RelayPump {
    pub fn new(poll_interval: Duration, chunk_size: usize, idle_limit: u32) -> Self {
        Self {
            poll_interval,
            chunk_size: chunk_size.max(1),
            idle_limit: idle_limit.max(1),
        }
    }

    pub fn idle_limit(&self) -> u32 {
        self.idle_limit
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Relays until either side closes or fails, or the relay goes idle.
    ///
    /// Ordinary I/O outcomes end the relay and are reported in the returned
    /// stats rather than as errors. Neither stream is shut down here; the
    /// caller owns both and closes them.
    pub async fn pump<A, B>(&self, client: &mut A, upstream: &mut B) -> RelayStats
    where
        A: AsyncRead + AsyncWrite + Unpin + ?Sized,
        B: AsyncRead + AsyncWrite + Unpin + ?Sized,
    {
        let mut client_buf = vec![0u8; self.chunk_size];
        let mut upstream_buf = vec![0u8; self.chunk_size];
        let mut client_to_upstream = 0u64;
        let mut upstream_to_client = 0u64;
        let mut idle_cycles = 0u32;

        let termination = loop {
            tokio::select! {
                res = client.read(&mut client_buf) => {
                    let n = match res {
                        Ok(0) => break Termination::ClientClosed,
                        Ok(n) => n,
                        Err(e) => break Termination::Error(e.kind()),
                    };
                    if let Err(e) = upstream.write_all(&client_buf[..n]).await {
                        break Termination::Error(e.kind());
                    }
                    if let Err(e) = upstream.flush().await {
                        break Termination::Error(e.kind());
                    }
                    trace!("relayed {} bytes client -> upstream", n);
                    client_to_upstream += n as u64;
                    idle_cycles = 0;
                }
                res = upstream.read(&mut upstream_buf) => {
                    let n = match res {
                        Ok(0) => break Termination::UpstreamClosed,
                        Ok(n) => n,
                        Err(e) => break Termination::Error(e.kind()),
                    };
                    if let Err(e) = client.write_all(&upstream_buf[..n]).await {
                        break Termination::Error(e.kind());
                    }
                    if let Err(e) = client.flush().await {
                        break Termination::Error(e.kind());
                    }
                    trace!("relayed {} bytes upstream -> client", n);
                    upstream_to_client += n as u64;
                    idle_cycles = 0;
                }
                _ = sleep(self.poll_interval) => {
                    idle_cycles += 1;
                    if idle_cycles >= self.idle_limit {
                        break Termination::Idle;
                    }
                }
            }
        };

        debug!(
            "Relay finished ({:?}): {} bytes client -> upstream, {} bytes upstream -> client",
            termination, client_to_upstream, upstream_to_client
        );

        RelayStats {
            client_to_upstream,
            upstream_to_client,
            termination,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;
    use tokio::time::Instant;

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[tokio::test]
    async fn test_relays_both_directions_unmodified() {
        let (mut client_side, mut client) = duplex(64 * 1024);
        let (mut upstream, mut upstream_side) = duplex(64 * 1024);
        let pump = RelayPump::new(Duration::from_millis(50), 8192, 20);

        let relay = tokio::spawn(async move { pump.pump(&mut client, &mut upstream).await });

        client_side.write_all(b"ping from client").await.unwrap();
        let mut buf = [0u8; 16];
        upstream_side.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping from client");

        upstream_side.write_all(b"pong").await.unwrap();
        let mut buf = [0u8; 4];
        client_side.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"pong");

        drop(client_side);
        let stats = relay.await.unwrap();
        assert_eq!(stats.termination, Termination::ClientClosed);
        assert_eq!(stats.client_to_upstream, 16);
        assert_eq!(stats.upstream_to_client, 4);
    }

    #[tokio::test]
    async fn test_payload_sizes_across_chunk_boundaries() {
        let chunk = 1024;
        for len in [0, 1, chunk - 1, chunk, chunk + 1, 5 * chunk + 17] {
            let (mut client_side, mut client) = duplex(256);
            let (mut upstream, mut upstream_side) = duplex(256);
            let pump = RelayPump::new(Duration::from_millis(50), chunk, 20);
            let relay = tokio::spawn(async move { pump.pump(&mut client, &mut upstream).await });

            let payload = pattern(len);
            let expected = payload.clone();
            let writer = tokio::spawn(async move {
                client_side.write_all(&payload).await.unwrap();
                client_side
            });
            let mut received = vec![0u8; len];
            upstream_side.read_exact(&mut received).await.unwrap();
            assert_eq!(received, expected, "payload of {len} bytes changed in transit");

            // Destination hangs up, relay ends without consuming more
            drop(upstream_side);
            let stats = relay.await.unwrap();
            assert_eq!(stats.client_to_upstream, len as u64);
            assert_eq!(stats.termination, Termination::UpstreamClosed);
            drop(writer.await.unwrap());
        }
    }

    #[tokio::test]
    async fn test_idle_limit_terminates_silent_relay() {
        let (_client_side, mut client) = duplex(1024);
        let (mut upstream, _upstream_side) = duplex(1024);
        let pump = RelayPump::new(Duration::from_millis(20), 8192, 5);

        let started = Instant::now();
        let stats = pump.pump(&mut client, &mut upstream).await;

        assert_eq!(stats.termination, Termination::Idle);
        assert!(started.elapsed() >= Duration::from_millis(100));
        assert_eq!(stats.client_to_upstream + stats.upstream_to_client, 0);
    }

    #[tokio::test]
    async fn test_traffic_resets_idle_counter() {
        let (mut client_side, mut client) = duplex(1024);
        let (mut upstream, mut upstream_side) = duplex(1024);
        let interval = Duration::from_millis(100);
        let pump = RelayPump::new(interval, 8192, 4);

        let started = Instant::now();
        let relay = tokio::spawn(async move { pump.pump(&mut client, &mut upstream).await });

        // Three idle cycles, then one byte just before the limit
        tokio::time::sleep(interval * 3 + interval / 2).await;
        client_side.write_all(b"x").await.unwrap();
        let mut byte = [0u8; 1];
        upstream_side.read_exact(&mut byte).await.unwrap();

        let stats = relay.await.unwrap();
        assert_eq!(stats.termination, Termination::Idle);
        assert_eq!(stats.client_to_upstream, 1);
        // Counter restarted at the byte, so the relay outlived 4 + 3 cycles
        assert!(started.elapsed() >= interval * 7);
    }

    #[test]
    fn test_limits_are_clamped() {
        let pump = RelayPump::new(Duration::from_millis(1), 0, 0);
        assert_eq!(pump.idle_limit(), 1);
        assert_eq!(pump.chunk_size, 1);
    }
}
