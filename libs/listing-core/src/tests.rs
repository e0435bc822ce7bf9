#[allow(clippy::module_inception)]
mod tests {
    use crate::ast::{FilterCondition, FilterExpr, FilterOp, Value};
    use crate::{
        base64_url, CursorCodec, CursorError, CursorV1, Error, FacetCounts, FacetValue, OrderBy,
        SortDir, SortKey, ValidationError,
    };
    use std::cmp::Ordering;

    fn sample_cursor() -> CursorV1 {
        CursorV1 {
            k: vec![
                "electronics".to_string(),
                "123e4567-e89b-12d3-a456-426614174000".to_string(),
            ],
            s: "+category,+id".to_string(),
            f: Some("abc123".to_string()),
        }
    }

    fn encode_raw(json: serde_json::Value) -> String {
        base64_url::encode(serde_json::to_vec(&json).unwrap().as_slice())
    }

    #[test]
    fn test_cursor_encode_decode_round_trip() {
        let codec = CursorCodec::unsigned();
        let cursor = sample_cursor();
        let decoded = codec.decode(&codec.encode(&cursor)).expect("decode");
        assert_eq!(decoded, cursor);
    }

    #[test]
    fn test_cursor_round_trip_without_filter_hash() {
        let codec = CursorCodec::signed("s3cret");
        let cursor = CursorV1 {
            k: vec!["42".to_string()],
            s: "+id".to_string(),
            f: None,
        };
        assert_eq!(codec.decode(&codec.encode(&cursor)).unwrap(), cursor);
    }

    #[test]
    fn test_cursor_decode_invalid_base64() {
        let result = CursorCodec::unsigned().decode("invalid_base64!");
        assert!(matches!(result, Err(CursorError::InvalidBase64)));
    }

    #[test]
    fn test_cursor_decode_invalid_json() {
        let token = base64_url::encode(b"not_json");
        let result = CursorCodec::unsigned().decode(&token);
        assert!(matches!(result, Err(CursorError::InvalidJson)));
    }

    #[test]
    fn test_cursor_decode_invalid_version() {
        let token = encode_raw(serde_json::json!({"v": 2, "k": ["1"], "s": "+id"}));
        let result = CursorCodec::unsigned().decode(&token);
        assert!(matches!(result, Err(CursorError::InvalidVersion)));
    }

    #[test]
    fn test_cursor_decode_empty_keys() {
        let token = encode_raw(serde_json::json!({"v": 1, "k": [], "s": "+id"}));
        let result = CursorCodec::unsigned().decode(&token);
        assert!(matches!(result, Err(CursorError::InvalidKeys)));
    }

    #[test]
    fn test_cursor_decode_empty_fields() {
        let token = encode_raw(serde_json::json!({"v": 1, "k": ["1"], "s": ""}));
        let result = CursorCodec::unsigned().decode(&token);
        assert!(matches!(result, Err(CursorError::InvalidFields)));
    }

    #[test]
    fn test_signed_cursor_rejects_tampered_payload() {
        let codec = CursorCodec::signed("s3cret");
        let genuine = codec.encode(&sample_cursor());
        let (_, tag) = genuine.split_once('.').unwrap();

        let mut forged = sample_cursor();
        forged.k[0] = "aaaa".to_string();
        let forged_payload = CursorCodec::unsigned().encode(&forged);

        let result = codec.decode(&format!("{forged_payload}.{tag}"));
        assert!(matches!(result, Err(CursorError::InvalidSignature)));
    }

    #[test]
    fn test_signed_codec_rejects_unsigned_token_and_vice_versa() {
        let signed = CursorCodec::signed("s3cret");
        let unsigned = CursorCodec::unsigned();
        let cursor = sample_cursor();

        assert!(matches!(
            signed.decode(&unsigned.encode(&cursor)),
            Err(CursorError::InvalidSignature)
        ));
        assert!(matches!(
            unsigned.decode(&signed.encode(&cursor)),
            Err(CursorError::InvalidSignature)
        ));
    }

    #[test]
    fn test_cursor_from_other_secret_is_rejected() {
        let a = CursorCodec::signed("one");
        let b = CursorCodec::signed("two");
        let token = a.encode(&sample_cursor());
        assert!(b.decode(&token).is_err());
    }

    #[test]
    fn test_empty_secret_means_unsigned() {
        assert!(!CursorCodec::signed("").is_signed());
        assert!(CursorCodec::signed("x").is_signed());
    }

    #[test]
    fn test_cursor_errors_collapse_to_generic_error() {
        let err: Error = CursorError::InvalidSignature.into();
        assert_eq!(err, Error::InvalidCursor);
        assert_eq!(err.to_string(), "invalid pagination cursor");
    }

    #[test]
    fn test_order_by_to_signed_tokens() {
        let order = OrderBy(vec![SortKey::desc("price"), SortKey::asc("id")]);
        assert_eq!(order.to_signed_tokens(), "-price,+id");
        assert_eq!(OrderBy::empty().to_signed_tokens(), "");
    }

    #[test]
    fn test_order_by_equals_signed_tokens() {
        let order = OrderBy(vec![SortKey::desc("created_at"), SortKey::asc("id")]);

        assert!(order.equals_signed_tokens("-created_at,+id"));
        assert!(order.equals_signed_tokens("  -created_at , +id  "));
        assert!(order.equals_signed_tokens("-created_at,id"));
        assert!(!order.equals_signed_tokens("-created_at,+id,+name"));
        assert!(!order.equals_signed_tokens("-created_at,-id"));
        assert!(!order.equals_signed_tokens(""));
    }

    #[test]
    fn test_order_by_from_signed_tokens() {
        let order = OrderBy::from_signed_tokens("+name,-created_at").unwrap();
        assert_eq!(order.0, vec![SortKey::asc("name"), SortKey::desc("created_at")]);

        let order = OrderBy::from_signed_tokens("+name,,+email").unwrap();
        assert_eq!(order.len(), 2);

        assert!(matches!(
            OrderBy::from_signed_tokens(""),
            Err(ValidationError::InvalidSortField(_))
        ));
        assert!(matches!(
            OrderBy::from_signed_tokens("-"),
            Err(ValidationError::InvalidSortField(_))
        ));
    }

    #[test]
    fn test_order_by_display() {
        assert_eq!(OrderBy::empty().to_string(), "(none)");
        let order = OrderBy(vec![SortKey::asc("email"), SortKey::desc("created_at")]);
        assert_eq!(order.to_string(), "email asc, created_at desc");
    }

    #[test]
    fn test_sort_dir_parse() {
        assert_eq!(SortDir::parse("ASC").unwrap(), SortDir::Asc);
        assert_eq!(SortDir::parse(" descending ").unwrap(), SortDir::Desc);
        assert!(matches!(
            SortDir::parse("sideways"),
            Err(ValidationError::InvalidSortDirection(_))
        ));
    }

    #[test]
    fn test_value_compare() {
        assert_eq!(Value::I64(1).compare(&Value::F64(1.5)), Some(Ordering::Less));
        assert_eq!(Value::Null.compare(&Value::I64(0)), Some(Ordering::Less));
        assert_eq!(
            Value::String("b".into()).compare(&Value::String("a".into())),
            Some(Ordering::Greater)
        );
        assert_eq!(Value::Bool(true).compare(&Value::I64(1)), None);
    }

    #[test]
    fn test_filter_expr_helpers() {
        let leaf = FilterExpr::Condition(FilterCondition {
            field: "price".into(),
            op: FilterOp::Gte,
            value: Value::F64(10.0),
            ignore_case: false,
        });
        assert_eq!(FilterExpr::all_of(vec![leaf.clone()]), leaf);
        assert!(FilterExpr::all_of(vec![]).is_match_all());

        let tree = FilterExpr::And(vec![leaf.clone(), FilterExpr::Or(vec![leaf.clone(), leaf])]);
        assert_eq!(tree.node_count(), 5);
        assert_eq!(tree.conditions().len(), 3);
    }

    #[test]
    fn test_facet_counts_are_ordered() {
        let counts = FacetCounts::new(
            "category",
            vec![
                FacetValue { value: "b".into(), count: 2 },
                FacetValue { value: "a".into(), count: 2 },
                FacetValue { value: "c".into(), count: 5 },
            ],
        );
        let order: Vec<_> = counts.values.iter().map(|v| v.value.as_str()).collect();
        assert_eq!(order, vec!["c", "a", "b"]);
        assert_eq!(counts.total(), 9);
    }

    #[test]
    fn test_problem_mapping_hides_storage_detail() {
        let p = Error::Storage.to_problem("/products");
        assert_eq!(p.status, 500);
        assert_eq!(p.code, "STORAGE_ERROR");
        assert_eq!(p.instance, "/products");

        let p = Error::StorageTimeout.to_problem("/products");
        assert_eq!(p.status, 503);

        let p = Error::InvalidCursor.to_problem("/");
        assert_eq!(p.status, 400);
        assert_eq!(p.detail, "invalid pagination cursor");

        let p = Error::Cancelled.to_problem("/");
        assert_eq!(p.status, 499);
    }

    #[test]
    fn test_problem_mapping_names_field_and_constraint() {
        let err = Error::from(ValidationError::out_of_range("page_size", "must be between 1 and 100"));
        let p = err.to_problem("/");
        assert_eq!(p.status, 422);
        assert_eq!(p.code, "OUT_OF_RANGE");
        assert_eq!(p.detail, "page_size out of range: must be between 1 and 100");

        let p = Error::from(ValidationError::UnknownField("colour".into())).to_problem("/");
        assert_eq!(p.status, 400);
        assert_eq!(p.detail, "unknown filter field: colour");
    }

    #[test]
    fn test_value_serializes_as_bare_json() {
        let uuid = uuid::Uuid::parse_str("123e4567-e89b-12d3-a456-426614174000").unwrap();
        let list = Value::List(vec![
            Value::I64(3),
            Value::String("sale".into()),
            Value::Uuid(uuid),
            Value::Null,
        ]);
        assert_eq!(
            serde_json::to_value(&list).unwrap(),
            serde_json::json!([3, "sale", "123e4567-e89b-12d3-a456-426614174000", null])
        );
    }
}
