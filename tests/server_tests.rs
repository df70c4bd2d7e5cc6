//! End-to-end socket tests: a controller client against a live bridge.

#[cfg(test)]
mod tests {
    use avatar_bridge::provision::RecordStore;
    use avatar_bridge::world::{Avatar, World};
    use avatar_bridge::{Bridge, BridgeConfig, Vec3};
    use parking_lot::Mutex;
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
    use tokio::net::tcp::OwnedReadHalf;
    use tokio::net::TcpStream;
    use tokio::time::timeout;

    const BOB: u64 = 1;

    async fn start_bridge() -> (Bridge, SocketAddr) {
        let store = Arc::new(RecordStore::new());
        let world = Arc::new(Mutex::new(World::new()));
        world
            .lock()
            .attach_avatar(Avatar::new(BOB, 10, "Bob", Vec3::zero()));
        let bridge = Bridge::new(BridgeConfig::default(), world, store);

        let manager = bridge
            .bind_server_on("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let addr = manager.local_addr().unwrap();
        tokio::spawn(manager.run());
        (bridge, addr)
    }

    async fn connect(addr: SocketAddr) -> (Lines<BufReader<OwnedReadHalf>>, tokio::net::tcp::OwnedWriteHalf) {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (reader, writer) = stream.into_split();
        (BufReader::new(reader).lines(), writer)
    }

    async fn next_snapshot(lines: &mut Lines<BufReader<OwnedReadHalf>>) -> serde_json::Value {
        let line = timeout(Duration::from_secs(2), lines.next_line())
            .await
            .expect("timed out waiting for a snapshot")
            .unwrap()
            .expect("connection closed");
        serde_json::from_str(&line).unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn new_controller_gets_the_current_snapshot_immediately() {
        let (_bridge, addr) = start_bridge().await;
        let (mut lines, _writer) = connect(addr).await;

        let doc = next_snapshot(&mut lines).await;
        assert_eq!(doc["version"], 0);
        assert!(doc["players"].as_array().unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn command_lines_reach_the_tick_thread() {
        let (mut bridge, addr) = start_bridge().await;
        let (mut lines, mut writer) = connect(addr).await;
        next_snapshot(&mut lines).await;

        // a malformed line must not kill the connection
        writer.write_all(b"not a command\n").await.unwrap();
        writer.write_all(b"Bob:say:hello\n").await.unwrap();
        writer.flush().await.unwrap();

        let world = bridge.world();
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        loop {
            bridge.on_update(10);
            if world.lock().avatar(BOB).unwrap().chat_log == vec!["hello".to_string()] {
                break;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "command never applied"
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn version_change_triggers_a_push() {
        let (mut bridge, addr) = start_bridge().await;
        let (mut lines, _writer) = connect(addr).await;
        next_snapshot(&mut lines).await;

        bridge.on_update(400); // publish cycle bumps the version

        let doc = next_snapshot(&mut lines).await;
        assert_eq!(doc["version"], 1);
        assert_eq!(doc["players"][0]["name"], "Bob");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn idle_connections_get_a_keepalive_resend() {
        let (_bridge, addr) = start_bridge().await;
        let (mut lines, _writer) = connect(addr).await;
        let first = next_snapshot(&mut lines).await;

        // no publish cycle runs; the same document is resent after the
        // keepalive interval
        let second = next_snapshot(&mut lines).await;
        assert_eq!(first, second);
    }
}
