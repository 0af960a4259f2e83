//! Protocol Module Tests
//!
//! Validates the command table and payload codec.

#[cfg(test)]
mod tests {
    use crate::error::StoreError;
    use crate::protocol::{Command, CommandKind, ErrorCode, KvRequest, KvResponse};

    // ============================================================
    // COMMAND TABLE TESTS
    // ============================================================

    #[test]
    fn test_command_tags_match_wire_values() {
        assert_eq!(Command::Put.tag(), 0x01);
        assert_eq!(Command::GetMembershipList.tag(), 0x22);
        assert_eq!(Command::RemoveForward.tag(), 0x25);
        assert_eq!(Command::RemoveReplicateGrandson.tag(), 0x29);
        assert_eq!(Command::FatherDied.tag(), 0x32);
        assert_eq!(Command::IAmYourGrandson.tag(), 0x38);
        assert_eq!(Command::Hello.tag(), 0x40);
    }

    #[test]
    fn test_every_tag_round_trips_through_try_from() {
        for tag in 0u32..=0x50 {
            if let Ok(command) = Command::try_from(tag) {
                assert_eq!(command.tag(), tag);
            }
        }
        assert_eq!(Command::try_from(0x09), Err(0x09));
        assert_eq!(Command::try_from(0x99), Err(0x99));
    }

    #[test]
    fn test_forwarded_variants() {
        assert_eq!(Command::Get.forwarded(), Some(Command::GetForward));
        assert_eq!(Command::Put.forwarded(), Some(Command::PutForward));
        assert_eq!(Command::Remove.forwarded(), Some(Command::RemoveForward));
        assert_eq!(Command::Hello.forwarded(), None);
        assert_eq!(Command::Wipeout.forwarded(), None);
    }

    #[test]
    fn test_command_kinds() {
        assert_eq!(Command::Put.kind(), CommandKind::Client);
        assert_eq!(Command::GetForward.kind(), CommandKind::Forwarded);
        assert_eq!(Command::WipeoutReplicateSon.kind(), CommandKind::Replicate);
        assert_eq!(Command::IAmYourSon.kind(), CommandKind::Chain);
        assert_eq!(Command::Hello.kind(), CommandKind::Lifecycle);
    }

    // ============================================================
    // ERROR CODE TESTS
    // ============================================================

    #[test]
    fn test_store_errors_map_to_codes() {
        assert_eq!(ErrorCode::from(&StoreError::KeyNotFound), ErrorCode::KeyDoesNotExist);
        assert_eq!(ErrorCode::from(&StoreError::KeyTooLong(33)), ErrorCode::InvalidKey);
        assert_eq!(
            ErrorCode::from(&StoreError::ValueTooLong(10_001)),
            ErrorCode::InvalidValue
        );
        assert_eq!(ErrorCode::from(&StoreError::NoSpace(8)), ErrorCode::NoSpace);
        assert_eq!(ErrorCode::from(&Ok::<(), StoreError>(())), ErrorCode::NoErr);
        assert_eq!(ErrorCode::from_code(3), Some(ErrorCode::SysOverload));
        assert_eq!(ErrorCode::from_code(8), None);
    }

    // ============================================================
    // PAYLOAD CODEC TESTS
    // ============================================================

    #[test]
    fn test_unknown_command_survives_decoding() {
        let request = KvRequest {
            command: 0x77,
            ..Default::default()
        };
        let decoded = KvRequest::decode(&request.encode().unwrap()).unwrap();
        assert_eq!(decoded.command(), Err(0x77));
    }

    #[test]
    fn test_client_addr_is_parsed() {
        let mut request = KvRequest::new(Command::GetForward).with_key("a");
        request.addr = Some("127.0.0.1:4000".to_string());
        assert_eq!(request.client_addr(), Some("127.0.0.1:4000".parse().unwrap()));

        request.addr = Some("not an address".to_string());
        assert_eq!(request.client_addr(), None);
    }

    #[test]
    fn test_truncated_response_is_rejected() {
        let response = KvResponse {
            value: b"payload".to_vec(),
            ..KvResponse::with_code(ErrorCode::NoErr)
        };
        let bytes = response.encode().unwrap();
        assert!(KvResponse::decode(&bytes[..bytes.len() - 3]).is_err());
    }
}
