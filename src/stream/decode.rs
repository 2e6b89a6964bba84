use serde::Deserialize;

use crate::config::{DEFAULT_CATEGORY, DEFAULT_PRODUCT_ID};
use crate::error::Result;
use crate::types::SaleEvent;

/// Wire shape published by the sale RPC service (`categoria`, `productoId`,
/// `precio`, `cantidadVendida`, `timestampUnixMs`); the English camelCase names
/// are accepted too. Absent fields take zero values, so only structurally broken
/// payloads are rejected.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RawSale {
    #[serde(alias = "categoria")]
    category: Option<String>,
    #[serde(alias = "productoId")]
    product_id: Option<String>,
    #[serde(alias = "precio")]
    price: f64,
    #[serde(alias = "cantidadVendida")]
    quantity_sold: i32,
    #[serde(alias = "timestampUnixMs")]
    timestamp: Option<i64>,
}

/// Decode one payload into a normalized [`SaleEvent`].
///
/// Empty category / product id fall back to their defaults. When the event carries
/// no usable timestamp, `fallback_ts_ms` (broker time, else receive time) is used.
pub fn decode_sale(payload: &[u8], fallback_ts_ms: i64) -> Result<SaleEvent> {
    let raw: RawSale = serde_json::from_slice(payload)?;

    let category = raw
        .category
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());
    let product_id = raw
        .product_id
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| DEFAULT_PRODUCT_ID.to_string());
    let timestamp_ms = raw.timestamp.filter(|ts| *ts > 0).unwrap_or(fallback_ts_ms);

    Ok(SaleEvent {
        category,
        product_id,
        price: raw.price,
        quantity_sold: raw.quantity_sold,
        timestamp_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const FALLBACK: i64 = 1_700_000_000_000;

    #[test]
    fn decodes_full_event() {
        let raw = br#"{"category":"Electronica","productId":"TV-55","price":499.99,"quantitySold":2,"timestamp":1700000123456}"#;
        let e = decode_sale(raw, FALLBACK).unwrap();
        assert_eq!(e.category, "Electronica");
        assert_eq!(e.product_id, "TV-55");
        assert!((e.price - 499.99).abs() < 1e-9);
        assert_eq!(e.quantity_sold, 2);
        assert_eq!(e.timestamp_ms, 1_700_000_123_456);
    }

    #[test]
    fn accepts_producer_timestamp_field_name() {
        let raw = br#"{"category":"Hogar","productId":"P1","price":1.0,"quantitySold":1,"timestampUnixMs":42}"#;
        assert_eq!(decode_sale(raw, FALLBACK).unwrap().timestamp_ms, 42);
    }

    #[test]
    fn decodes_rpc_service_payload() {
        let raw = br#"{"categoria":"Hogar","productoId":"LAMP-1","precio":25.5,"cantidadVendida":3,"timestampUnixMs":1700000000123}"#;
        let e = decode_sale(raw, FALLBACK).unwrap();
        assert_eq!(
            e,
            SaleEvent {
                category: "Hogar".to_string(),
                product_id: "LAMP-1".to_string(),
                price: 25.5,
                quantity_sold: 3,
                timestamp_ms: 1_700_000_000_123,
            }
        );
    }

    #[test]
    fn rpc_payload_without_timestamp_uses_fallback() {
        let raw = br#"{"categoria":"Ropa","precio":9.99,"cantidadVendida":1,"productoId":"S-2"}"#;
        let e = decode_sale(raw, FALLBACK).unwrap();
        assert_eq!(e.category, "Ropa");
        assert_eq!(e.product_id, "S-2");
        assert_eq!(e.timestamp_ms, FALLBACK);
    }

    #[test]
    fn empty_and_missing_identifiers_take_defaults() {
        let e = decode_sale(br#"{"category":"","price":3.5}"#, FALLBACK).unwrap();
        assert_eq!(e.category, "Unknown");
        assert_eq!(e.product_id, "UNKNOWN");
        assert_eq!(e.quantity_sold, 0);
        assert_eq!(e.timestamp_ms, FALLBACK);

        let e = decode_sale(br#"{"category":null,"productId":null}"#, FALLBACK).unwrap();
        assert_eq!(e.category, "Unknown");
        assert_eq!(e.product_id, "UNKNOWN");
        assert_eq!(e.price, 0.0);
    }

    #[test]
    fn negative_quantity_and_zero_timestamp_pass_through_decoding() {
        let e = decode_sale(br#"{"category":"Ropa","productId":"S1","price":9.0,"quantitySold":-3,"timestamp":0}"#, FALLBACK).unwrap();
        assert_eq!(e.quantity_sold, -3);
        assert_eq!(e.timestamp_ms, FALLBACK);
    }

    #[test]
    fn malformed_payloads_are_rejected() {
        assert!(decode_sale(b"not json", FALLBACK).is_err());
        assert!(decode_sale(b"[1,2,3]", FALLBACK).is_err());
        assert!(decode_sale(br#"{"price":"cheap"}"#, FALLBACK).is_err());
        assert!(decode_sale(&[0xff, 0xfe, 0x7b], FALLBACK).is_err());
        assert!(decode_sale(b"", FALLBACK).is_err());
    }
}
