#[cfg(test)]
mod tests {
    use super::super::authority::{LookupError, RecordStore};
    use super::super::name::DomainName;
    use super::super::protocol::ResultCode;
    use super::super::query_type::{QueryType, RecordClass};
    use std::net::Ipv4Addr;

    fn name(domain: &str) -> DomainName {
        DomainName::from_dotted(domain).unwrap()
    }

    fn create_test_store() -> RecordStore {
        let mut builder = RecordStore::builder();

        builder
            .add_a(&name("example.com"), Ipv4Addr::new(188, 138, 0, 9), 360)
            .add_a(&name("example.com"), Ipv4Addr::new(127, 0, 0, 1), 360)
            .add_a(&name("www.example.com"), Ipv4Addr::new(10, 0, 0, 1), 60);

        builder
            .add(&name("example.com"), QueryType::Txt, 300, b"\x05hello".to_vec())
            .unwrap();
        builder
            .add(
                &name("example.com"),
                QueryType::Mx,
                300,
                b"\x00\x0a\x04mail\x07example\x03com\x00".to_vec(),
            )
            .unwrap();

        builder.build()
    }

    #[test]
    fn test_a_records_in_insertion_order() {
        let store = create_test_store();

        let records = store
            .lookup(&name("example.com"), QueryType::A, RecordClass::In)
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].rdata(), &[188, 138, 0, 9]);
        assert_eq!(records[1].rdata(), &[127, 0, 0, 1]);
        for rec in records {
            assert_eq!(rec.ttl(), 360);
            assert_eq!(rec.rtype(), QueryType::A);
            assert_eq!(rec.rclass(), RecordClass::In);
            assert_eq!(rec.name(), name("example.com").to_wire().as_slice());
        }
    }

    #[test]
    fn test_other_types_are_separate_buckets() {
        let store = create_test_store();

        let txt = store
            .lookup(&name("example.com"), QueryType::Txt, RecordClass::In)
            .unwrap();
        assert_eq!(txt.len(), 1);
        assert_eq!(txt[0].rdata(), b"\x05hello");

        let mx = store
            .lookup(&name("example.com"), QueryType::Mx, RecordClass::In)
            .unwrap();
        assert_eq!(mx.len(), 1);
        assert_eq!(mx[0].rdlength() as usize, mx[0].rdata().len());
    }

    #[test]
    fn test_unregistered_domain_is_empty() {
        let store = create_test_store();

        let records = store
            .lookup(&name("nothere.example.org"), QueryType::A, RecordClass::In)
            .unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_missing_type_is_empty() {
        let store = create_test_store();

        let records = store
            .lookup(&name("www.example.com"), QueryType::Mx, RecordClass::In)
            .unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_exact_match_only() {
        let store = create_test_store();

        for domain in &["EXAMPLE.com", "sub.www.example.com", "com"] {
            let records = store
                .lookup(&name(domain), QueryType::A, RecordClass::In)
                .unwrap();
            assert!(records.is_empty(), "{} should not match", domain);
        }
    }

    #[test]
    fn test_wildcard_type_rejected() {
        let store = create_test_store();

        let err = store
            .lookup(&name("example.com"), QueryType::from_num(255), RecordClass::In)
            .unwrap_err();
        assert_eq!(err, LookupError::WildcardUnsupported);
        assert_eq!(err.result_code(), ResultCode::NOTIMP);
    }

    #[test]
    fn test_unsupported_class_rejected() {
        let store = create_test_store();

        let err = store
            .lookup(&name("example.com"), QueryType::A, RecordClass::from_num(5))
            .unwrap_err();
        assert_eq!(err, LookupError::UnsupportedClass { class: 5 });
        assert_eq!(err.result_code(), ResultCode::REFUSED);
    }

    #[test]
    fn test_class_checked_before_type() {
        let store = create_test_store();

        let err = store
            .lookup(&name("example.com"), QueryType::All, RecordClass::from_num(3))
            .unwrap_err();
        assert_eq!(err, LookupError::UnsupportedClass { class: 3 });
    }

    #[test]
    fn test_unknown_type_rejected() {
        let store = create_test_store();

        let err = store
            .lookup(&name("example.com"), QueryType::from_num(28), RecordClass::In)
            .unwrap_err();
        assert_eq!(err, LookupError::UnknownType { code: 28 });
        assert_eq!(err.result_code(), ResultCode::NOTIMP);
    }

    #[test]
    fn test_store_counts() {
        let store = create_test_store();

        assert_eq!(store.len(), 5);
        assert!(!store.is_empty());
        let mut domains: Vec<&str> = store.domains().collect();
        domains.sort_unstable();
        assert_eq!(domains, vec!["example.com", "www.example.com"]);

        assert!(RecordStore::default().is_empty());
    }
}
