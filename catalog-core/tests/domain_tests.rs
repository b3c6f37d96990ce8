use catalog_core::domain::*;
use catalog_core::CoreError;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rstest::rstest;
use uuid::Uuid;
use validator::Validate;

// ===== ID Tests =====

#[test]
fn test_product_id_conversions() {
    let uuid = Uuid::new_v4();
    let id = ProductId::from_uuid(uuid);

    assert_eq!(id.as_uuid(), &uuid);

    let id2: ProductId = uuid.into();
    assert_eq!(id, id2);

    let uuid2: Uuid = id.into();
    assert_eq!(uuid, uuid2);
}

#[test]
fn test_product_id_display() {
    let id = ProductId::new();
    assert_eq!(format!("{}", id), id.as_uuid().to_string());
}

#[test]
fn test_product_id_serializes_as_bare_uuid() {
    let id = ProductId::new();
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, format!("\"{}\"", id.as_uuid()));
}

#[rstest]
#[case("abc", Some("abc"))]
#[case("  abc  ", Some("abc"))]
#[case("upstream-7f3a", Some("upstream-7f3a"))]
#[case("", None)]
#[case("   ", None)]
fn test_correlation_id_parse(#[case] input: &str, #[case] expected: Option<&str>) {
    let parsed = CorrelationId::parse(input);
    assert_eq!(parsed.as_ref().map(CorrelationId::as_str), expected);
}

#[test]
fn test_correlation_id_serializes_transparently() {
    let id = CorrelationId::parse("abc").unwrap();
    assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc\"");
}

proptest! {
    #[test]
    fn prop_generated_ids_are_32_hex(_seed in 0u8..32) {
        let correlation = CorrelationId::generate();
        let request = RequestId::generate();

        for id in [correlation.as_str(), request.as_str()] {
            prop_assert_eq!(id.len(), 32);
            prop_assert!(id.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)));
        }
    }

    #[test]
    fn prop_parse_never_keeps_outer_whitespace(s in "[ \t]{0,3}[a-z0-9-]{1,16}[ \t]{0,3}") {
        let parsed = CorrelationId::parse(&s).unwrap();
        prop_assert_eq!(parsed.as_str(), s.trim());
    }
}

// ===== Product Tests =====

fn product(price: f64, stock: i32) -> Product {
    Product::new(
        "Desk Lamp".to_string(),
        Some("Adjustable arm".to_string()),
        "lighting".to_string(),
        price,
        stock,
        None,
    )
}

#[test]
fn test_new_product_timestamps_match() {
    let p = product(10.0, 1);
    assert_eq!(p.created_at, p.updated_at);
}

#[rstest]
#[case(10.0, 0, 0.0)]
#[case(20.0, 5, 100.0)]
#[case(0.5, 3, 1.5)]
fn test_inventory_value(#[case] price: f64, #[case] stock: i32, #[case] expected: f64) {
    assert_eq!(product(price, stock).inventory_value(), expected);
}

#[rstest]
#[case("", "lighting", 1.0, 1)]
#[case("Lamp", "", 1.0, 1)]
#[case("Lamp", "lighting", -0.01, 1)]
#[case("Lamp", "lighting", 1.0, -5)]
fn test_invalid_products_rejected(
    #[case] name: &str,
    #[case] category: &str,
    #[case] price: f64,
    #[case] stock: i32,
) {
    let p = Product::new(name.to_string(), None, category.to_string(), price, stock, None);
    let err: CoreError = p.validate().unwrap_err().into();
    assert!(matches!(err, CoreError::Validation(_)));
}

#[test]
fn test_valid_product_passes_validation() {
    assert!(product(0.0, 0).validate().is_ok());
}

#[test]
fn test_patch_changes_only_given_fields() {
    let mut p = product(10.0, 3);
    let original = p.clone();

    p.apply(ProductPatch {
        category: Some("office".to_string()),
        sku: Some("DL-9".to_string()),
        ..Default::default()
    });

    assert_eq!(p.category, "office");
    assert_eq!(p.sku.as_deref(), Some("DL-9"));
    assert_eq!(p.name, original.name);
    assert_eq!(p.price, original.price);
    assert_eq!(p.stock, original.stock);
    assert_eq!(p.created_at, original.created_at);
    assert!(p.updated_at >= original.updated_at);
}

#[test]
fn test_product_json_shape() {
    let p = product(12.0, 4);
    let value = serde_json::to_value(&p).unwrap();

    assert_eq!(value["name"], "Desk Lamp");
    assert_eq!(value["category"], "lighting");
    assert_eq!(value["stock"], 4);
    assert_eq!(value["id"], p.id.to_string());
}
