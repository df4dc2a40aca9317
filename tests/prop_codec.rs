//! Property-based tests for the value codec against hostile responses.
//!
//! Run with: cargo test --release prop_codec

#![allow(missing_docs)]
#![allow(clippy::unwrap_used)]

use proptest::prelude::*;
use serde_json::{Value as Json, json};

use ratchet::codec::{CodecError, decode, encode};
use ratchet::vm::{Value, ops};

/// Arbitrary JSON, biased towards objects that look like tagged values.
fn wire() -> impl Strategy<Value = Json> {
    let leaf = prop_oneof![
        Just(Json::Null),
        any::<bool>().prop_map(Json::Bool),
        any::<i64>().prop_map(|i| json!(i)),
        (-1e6f64..1e6).prop_map(|f| json!(f)),
        "[a-z_]{0,8}".prop_map(Json::String),
    ];
    leaf.prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Json::Array),
            (0u64..12, prop::collection::btree_map(
                prop_oneof![
                    Just("x".to_string()),
                    Just("y".to_string()),
                    Just("val".to_string()),
                    Just("loc".to_string()),
                    Just("id".to_string()),
                    Just("msg".to_string()),
                    Just("etype".to_string()),
                    "[a-z]{1,4}",
                ],
                inner,
                0..6,
            ))
                .prop_map(|(tag, fields)| {
                    let mut object: serde_json::Map<String, Json> = fields.into_iter().collect();
                    object.insert("type".to_string(), json!(tag));
                    Json::Object(object)
                }),
        ]
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(2000))]

    /// Decoding never panics, whatever the authority sends.
    #[test]
    fn prop_decode_total(document in wire()) {
        match decode(&document) {
            Ok(_) | Err(CodecError::Malformed(_) | CodecError::Thrown { .. }) => {}
            Err(other) => prop_assert!(false, "unexpected error {other:?}"),
        }
    }

    /// Arrays of locations decode element-wise, in order.
    #[test]
    fn prop_location_arrays(points in prop::collection::vec((any::<i32>(), any::<i32>()), 0..20)) {
        let document = Json::Array(
            points.iter().map(|(x, y)| json!({"type": 2, "x": x, "y": y})).collect(),
        );
        let decoded = decode(&document).unwrap();
        let items = ops::collect(&decoded).unwrap();
        prop_assert_eq!(items.len(), points.len());
        for (item, (x, y)) in items.iter().zip(&points) {
            let Value::Location(loc) = item else {
                return Err(TestCaseError::fail("expected a location"));
            };
            prop_assert_eq!((loc.x, loc.y), (*x, *y));
        }
    }

    /// Plain scalars pass through unchanged.
    #[test]
    fn prop_scalars_pass_through(i in any::<i64>(), s in "[ -~]{0,16}", b in any::<bool>()) {
        prop_assert_eq!(encode(&Value::Int(i)).unwrap(), json!(i));
        prop_assert_eq!(encode(&Value::str(&s)).unwrap(), json!(s));
        prop_assert_eq!(encode(&Value::Bool(b)).unwrap(), json!(b));
        prop_assert_eq!(encode(&Value::None).unwrap(), Json::Null);
    }
}
