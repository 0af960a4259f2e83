//! Transport Module Tests
//!
//! ## Test Scopes
//! - **MessageId**: Bit-exact layout and address recovery.
//! - **Envelope**: Checksum verification and malformed input handling.
//! - **ResponseCache**: Budget admission, replacement and TTL expiry.

#[cfg(test)]
mod tests {
    use crate::budget::{SharedBudget, Unlimited};
    use crate::error::TransportError;
    use crate::transport::{Envelope, MessageId, ResponseCache, open, seal};
    use std::net::{Ipv4Addr, SocketAddrV4};
    use std::sync::Arc;
    use std::time::Duration;

    fn addr() -> SocketAddrV4 {
        SocketAddrV4::new(Ipv4Addr::new(10, 1, 2, 3), 0x1234)
    }

    // ============================================================
    // MESSAGE ID TESTS
    // ============================================================

    #[test]
    fn test_message_id_layout() {
        let id = MessageId::from_parts(addr(), 0xbeef, 0x0102_0304_0506_0708);

        assert_eq!(&id.0[0..4], &[10, 1, 2, 3]);
        assert_eq!(&id.0[4..6], &[0x34, 0x12], "port is little-endian");
        assert_eq!(&id.0[6..8], &[0xef, 0xbe]);
        assert_eq!(&id.0[8..16], &[8, 7, 6, 5, 4, 3, 2, 1], "timestamp is little-endian");
    }

    #[test]
    fn test_message_id_decodes_sender_and_timestamp() {
        let id = MessageId::from_parts(addr(), 1, 42);

        assert_eq!(id.sender(), addr());
        assert_eq!(id.timestamp_ns(), 42);
    }

    #[test]
    fn test_generated_ids_differ() {
        let a = MessageId::generate(addr());
        let b = MessageId::generate(addr());
        assert_ne!(a, b);
        assert_eq!(a.sender(), addr());
        assert_ne!(MessageId::random(), MessageId::random());
    }

    // ============================================================
    // ENVELOPE TESTS
    // ============================================================

    #[test]
    fn test_wrap_then_unwrap() {
        let id = MessageId::generate(addr());
        let envelope = Envelope::wrap(id, b"payload".to_vec());

        let (got_id, payload) = envelope.into_verified().unwrap();
        assert_eq!(got_id, id);
        assert_eq!(payload, b"payload".to_vec());
    }

    #[test]
    fn test_checksum_covers_id_and_payload() {
        let id = MessageId::generate(addr());
        let mut tampered = Envelope::wrap(id, b"payload".to_vec());
        tampered.payload[0] ^= 0xff;
        assert!(matches!(
            tampered.into_verified(),
            Err(TransportError::ChecksumMismatch { .. })
        ));

        let mut tampered = Envelope::wrap(id, b"payload".to_vec());
        tampered.message_id.0[15] ^= 0x01;
        assert!(tampered.into_verified().is_err());
    }

    #[test]
    fn test_open_rejects_garbage() {
        assert!(matches!(open(&[1, 2, 3]), Err(TransportError::Malformed(_))));
    }

    #[test]
    fn test_seal_then_open() {
        let id = MessageId::random();
        let datagram = seal(id, vec![9; 100]).unwrap();
        assert_eq!(open(&datagram).unwrap(), (id, vec![9; 100]));
    }

    // ============================================================
    // RESPONSE CACHE TESTS
    // ============================================================

    #[test]
    fn test_cache_hit_and_miss() {
        let cache = ResponseCache::new(Arc::new(Unlimited), 4);
        let id = MessageId::random();

        assert!(cache.insert(id, b"resp".to_vec()));
        assert_eq!(cache.get(&id), Some(b"resp".to_vec()));
        assert_eq!(cache.get(&MessageId::random()), None);
    }

    #[test]
    fn test_cache_refused_by_budget() {
        let budget: SharedBudget = Arc::new(|extra: usize| extra < 64);
        let cache = ResponseCache::new(budget, 4);

        assert!(!cache.insert(MessageId::random(), vec![0; 100]));
        assert!(cache.insert(MessageId::random(), vec![0; 8]));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_insert_replaces_same_id() {
        let cache = ResponseCache::new(Arc::new(Unlimited), 4);
        let id = MessageId::random();

        cache.insert(id, b"first".to_vec());
        cache.insert(id, b"second".to_vec());

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&id), Some(b"second".to_vec()));
    }

    #[test]
    fn test_cache_entries_expire_after_ttl_sweeps() {
        let cache = ResponseCache::new(Arc::new(Unlimited), 4);
        let id = MessageId::random();
        cache.insert(id, b"resp".to_vec());

        for _ in 0..3 {
            assert_eq!(cache.sweep(), 0);
            assert!(cache.get(&id).is_some());
        }
        assert_eq!(cache.sweep(), 1);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_sweeper_stops_on_shutdown() {
        let cache = Arc::new(ResponseCache::new(Arc::new(Unlimited), 1));
        cache.insert(MessageId::random(), b"resp".to_vec());

        let (tx, rx) = tokio::sync::watch::channel(false);
        let handle = tokio::spawn(cache.clone().run_sweeper(Duration::from_millis(10), rx));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(cache.is_empty());

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper did not stop")
            .unwrap();
    }
}
