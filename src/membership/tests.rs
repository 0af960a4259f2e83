//! Membership Module Tests
//!
//! ## Test Scopes
//! - **Seeding**: Membership file parsing and initial state.
//! - **Gossip sizing**: Fan-out rule and target selection.
//! - **Conflict Resolution**: Incarnation-ordered merge of remote views.

#[cfg(test)]
mod tests {
    use crate::membership::{MembershipService, Node, gossip_fanout, load_members};
    use std::collections::HashSet;
    use std::io::Write;
    use std::net::{Ipv4Addr, SocketAddrV4};

    fn addr(port: u16) -> SocketAddrV4 {
        SocketAddrV4::new(Ipv4Addr::LOCALHOST, port)
    }

    fn cluster(size: u16) -> MembershipService {
        let seed: Vec<_> = (0..size).map(|i| addr(5000 + i)).collect();
        MembershipService::new(seed[0], seed)
    }

    // ============================================================
    // SEEDING TESTS
    // ============================================================

    #[test]
    fn test_load_members_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "127.0.0.1:5000").unwrap();
        writeln!(file, "  127.0.0.1:5001  ").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "# retired: 127.0.0.1:5002").unwrap();

        let members = load_members(file.path()).unwrap();
        assert_eq!(members, vec![addr(5000), addr(5001)]);
    }

    #[test]
    fn test_load_members_rejects_bad_line() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "localhost").unwrap();

        assert!(load_members(file.path()).is_err());
    }

    #[test]
    fn test_seeded_members_start_alive() {
        let service = cluster(5);

        assert_eq!(service.members.len(), 5);
        assert_eq!(service.get_alive_members().len(), 5);
        assert_eq!(service.alive_peers().len(), 4, "Peers exclude the local node");
        assert!(!service.alive_peers().contains(&service.local_addr));
    }

    // ============================================================
    // GOSSIP SIZING TESTS
    // ============================================================

    #[test]
    fn test_gossip_fanout_rule() {
        assert_eq!(gossip_fanout(0), 0);
        assert_eq!(gossip_fanout(3), 3);
        assert_eq!(gossip_fanout(4), 4);
        assert_eq!(gossip_fanout(5), 4);
        assert_eq!(gossip_fanout(19), 4);
        assert_eq!(gossip_fanout(25), 5);
        assert_eq!(gossip_fanout(100), 20);
    }

    #[test]
    fn test_gossip_targets_are_distinct_alive_peers() {
        let service = cluster(30);
        service.mark_dead(&addr(5001), 10);

        let targets = service.gossip_targets();
        let unique: HashSet<_> = targets.iter().collect();

        assert_eq!(targets.len(), gossip_fanout(28));
        assert_eq!(unique.len(), targets.len());
        assert!(!targets.contains(&service.local_addr));
        assert!(!targets.contains(&addr(5001)));
    }

    // ============================================================
    // CONFLICT RESOLUTION TESTS
    // ============================================================

    #[test]
    fn test_merge_adopts_newer_death() {
        let service = cluster(3);
        let remote = vec![Node {
            addr: addr(5001),
            alive: false,
            incarnation: 50,
        }];

        let outcome = service.merge(remote);

        assert_eq!(outcome.died, vec![addr(5001)]);
        assert!(outcome.revived.is_empty());
        assert!(!service.is_alive(&addr(5001)));
        assert_eq!(service.get_member(&addr(5001)).unwrap().incarnation, 50);
    }

    #[test]
    fn test_merge_ignores_stale_or_equal_incarnation() {
        let service = cluster(3);
        service.mark_dead(&addr(5002), 100);

        let outcome = service.merge(vec![
            Node {
                addr: addr(5002),
                alive: true,
                incarnation: 100,
            },
            Node {
                addr: addr(5001),
                alive: true,
                incarnation: 999,
            },
        ]);

        assert!(outcome.is_empty(), "Equal incarnation or same state must not flip");
        assert!(!service.is_alive(&addr(5002)));
        assert_eq!(service.get_member(&addr(5001)).unwrap().incarnation, 0);
    }

    #[test]
    fn test_merge_reports_revival() {
        let service = cluster(3);
        service.mark_dead(&addr(5002), 100);

        let outcome = service.merge(vec![Node {
            addr: addr(5002),
            alive: true,
            incarnation: 200,
        }]);

        assert_eq!(outcome.revived, vec![addr(5002)]);
        assert!(service.is_alive(&addr(5002)));
    }

    #[test]
    fn test_merge_never_adopts_own_death() {
        let service = cluster(3);
        let outcome = service.merge(vec![Node {
            addr: service.local_addr,
            alive: false,
            incarnation: u64::MAX,
        }]);

        assert!(outcome.is_empty());
        assert!(service.is_alive(&service.local_addr));
    }

    #[test]
    fn test_mark_alive_and_dead_report_transitions() {
        let service = cluster(2);

        assert!(service.mark_dead(&addr(5001), 1));
        assert!(!service.mark_dead(&addr(5001), 2));
        assert!(service.mark_alive(&addr(5001), 3));
        assert!(!service.mark_alive(&addr(5001), 4));
        assert!(!service.mark_alive(&addr(6000), 5), "Unknown members are not admitted");
    }
}
