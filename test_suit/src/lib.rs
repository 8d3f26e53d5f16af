mod adapter;

mod test_derive {
    use std::collections::HashMap;

    use chrono::{DateTime, Utc};
    use filterables::{Error, FieldKind, Filterable, Operand};
    use uuid::Uuid;

    #[allow(dead_code)]
    #[derive(Filterable, Debug, Clone)]
    pub struct AuditEvent {
        id: Uuid,
        sequence: u64,
        at: DateTime<Utc>,
        score: Option<f32>,
        ok: bool,
        actor: String,
        labels: HashMap<String, String>,
        #[filterable(nested)]
        payload: String,
        #[filterable(kind = "integer")]
        level: Level,
        #[filterable(rename = "kind")]
        event_kind: String,
        #[filterable(skip)]
        secret: Vec<u8>,
    }

    #[allow(dead_code)]
    #[derive(Debug, Clone)]
    pub struct Level(i32);

    #[allow(dead_code)]
    #[derive(Filterable)]
    #[filterable(table = "accounts", primary_key = "account_id")]
    pub struct Account {
        account_id: i64,
        owner: Option<String>,
    }

    #[test]
    fn test_default_table_and_primary_key() {
        let model = AuditEvent::model();
        assert_eq!(model.table, "audit_event");
        assert_eq!(model.primary_key, "id");
        assert_eq!(model.primary_field().unwrap().kind, FieldKind::Uuid);

        let model = Account::model();
        assert_eq!(model.table, "accounts");
        assert_eq!(model.primary_key, "account_id");
    }

    #[test]
    fn test_inferred_kinds() {
        let kinds: Vec<_> = AuditEvent::model()
            .fields
            .iter()
            .map(|field| (field.name, field.kind))
            .collect();

        assert_eq!(
            kinds,
            vec![
                ("id", FieldKind::Uuid),
                ("sequence", FieldKind::Integer),
                ("at", FieldKind::Timestamp),
                ("score", FieldKind::Real),
                ("ok", FieldKind::Boolean),
                ("actor", FieldKind::Text),
                ("labels", FieldKind::Json),
                ("payload", FieldKind::Json),
                ("level", FieldKind::Integer),
                ("kind", FieldKind::Text),
            ]
        );
        assert_eq!(
            Account::model().field("owner").map(|field| field.kind),
            Some(FieldKind::Text)
        );
    }

    #[test]
    fn test_skipped_fields_are_unknown() {
        assert_eq!(
            AuditEvent::model().path("secret"),
            Err(Error::UnknownField {
                path: "secret".to_string()
            })
        );
        assert!(AuditEvent::model().path("event_kind").is_err());
        assert!(AuditEvent::model().path("kind").is_ok());
    }

    #[test]
    fn test_nested_attribute() {
        assert_eq!(
            AuditEvent::model().path("payload.request.ip").unwrap(),
            Operand::Nested {
                column: "payload",
                keys: vec!["request".to_string(), "ip".to_string()],
            }
        );
    }
}
