// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Conversion between wire values and [`DynamicValue`].
//!
//! # Overview
//!
//! | Function | Direction | Failure |
//! |----------|-----------|---------|
//! | [`encode`] | `DynamicValue` → [`Variant`] | [`CodecError`] on hint mismatch or limits |
//! | [`decode`] | [`Variant`] → `DynamicValue` | never; unrepresentable parts become `Unsupported` |
//! | [`decode_as`] | [`Variant`] → `DynamicValue` of a numeric target | never; falls back to [`decode`] |
//!
//! Well-known records (Range, EUInformation, ...) travel as binary extension
//! objects. Unknown extension objects stay [`OpaquePayload`]s so re-encoding
//! is lossless.
//!
//! # Examples
//!
//! ```
//! use uaflow_client::codec::{self, DynamicValue, WireType};
//!
//! let value = DynamicValue::Array(vec![DynamicValue::Int16(1), DynamicValue::Int16(2)]);
//! let wire = codec::encode(&value, Some(WireType::Int16)).unwrap();
//! assert_eq!(codec::decode(&wire), value);
//!
//! // No silent coercion.
//! assert!(codec::encode(&DynamicValue::Int16(1), Some(WireType::Double)).is_err());
//! ```

pub mod binary;
pub mod filter;
mod matrix;
mod records;
mod value;
mod variant;

pub use matrix::{MultiDimArray, MAX_ELEMENTS};
pub use records::encoding_ids;
pub use value::{
    Argument, AxisInformation, AxisScale, BodyEncoding, ComplexNumber, DoubleComplexNumber,
    DynamicValue, EuInformation, OpaquePayload, Range, WireType, XvType,
};
pub use variant::{DataValue, DiagnosticInfo, ExtensionBody, ExtensionObject, Variant, WireArray};

use crate::error::CodecError;

// =============================================================================
// Encode
// =============================================================================

/// Encodes a value into its wire form.
///
/// For arrays and matrices `hint` names the element type. A hint of
/// [`WireType::Variant`] accepts any kind.
///
/// # Errors
///
/// - [`CodecError::TypeMismatch`] if the value's kind disagrees with `hint`
/// - [`CodecError::InvalidDimensions`] if an array exceeds the length limit
/// - [`CodecError::InvalidEncoding`] if an XML payload is not UTF-8, or an
///   opaque payload carries body bytes but no body encoding
pub fn encode(value: &DynamicValue, hint: Option<WireType>) -> Result<Variant, CodecError> {
    match value {
        DynamicValue::Null | DynamicValue::Unsupported { .. } => Ok(Variant::Empty),
        DynamicValue::Array(items) => encode_array(items, None, hint),
        DynamicValue::Matrix(matrix) => {
            encode_array(matrix.values(), Some(matrix.dimensions().to_vec()), hint)
        }
        scalar => {
            let kind = scalar.kind();
            match hint {
                Some(expected) if expected != WireType::Variant && expected != kind => {
                    Err(CodecError::type_mismatch(expected, scalar.type_name()))
                }
                _ => encode_scalar(scalar),
            }
        }
    }
}

fn encode_array(
    items: &[DynamicValue],
    dimensions: Option<Vec<u32>>,
    hint: Option<WireType>,
) -> Result<Variant, CodecError> {
    if items.len() > MAX_ELEMENTS {
        return Err(CodecError::invalid_dimensions(format!(
            "array of {} elements exceeds the Int32 length limit",
            items.len()
        )));
    }

    let element_type = hint.unwrap_or_else(|| value::common_element_type(items));
    let values = items
        .iter()
        .map(|item| {
            if element_type == WireType::Variant {
                encode(item, None)
            } else if item.is_array() {
                Err(CodecError::type_mismatch(element_type, item.type_name()))
            } else {
                encode(item, Some(element_type))
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Variant::Array(WireArray {
        element_type,
        values,
        dimensions,
    }))
}

fn encode_scalar(value: &DynamicValue) -> Result<Variant, CodecError> {
    if let Some(record) = records::encode(value) {
        return record.map(Variant::ExtensionObject);
    }

    Ok(match value {
        DynamicValue::Boolean(v) => Variant::Boolean(*v),
        DynamicValue::SByte(v) => Variant::SByte(*v),
        DynamicValue::Byte(v) => Variant::Byte(*v),
        DynamicValue::Int16(v) => Variant::Int16(*v),
        DynamicValue::UInt16(v) => Variant::UInt16(*v),
        DynamicValue::Int32(v) => Variant::Int32(*v),
        DynamicValue::UInt32(v) => Variant::UInt32(*v),
        DynamicValue::Int64(v) => Variant::Int64(*v),
        DynamicValue::UInt64(v) => Variant::UInt64(*v),
        DynamicValue::Float(v) => Variant::Float(*v),
        DynamicValue::Double(v) => Variant::Double(*v),
        DynamicValue::String(v) => Variant::String(v.clone()),
        DynamicValue::ByteString(v) => Variant::ByteString(v.clone()),
        DynamicValue::XmlElement(v) => Variant::XmlElement(v.clone()),
        DynamicValue::DateTime(v) => Variant::DateTime(*v),
        DynamicValue::Guid(v) => Variant::Guid(*v),
        DynamicValue::NodeId(v) => Variant::NodeId(v.clone()),
        DynamicValue::ExpandedNodeId(v) => Variant::ExpandedNodeId(v.clone()),
        DynamicValue::StatusCode(v) => Variant::StatusCode(*v),
        DynamicValue::QualifiedName(v) => Variant::QualifiedName(v.clone()),
        DynamicValue::LocalizedText(v) => Variant::LocalizedText(v.clone()),
        DynamicValue::Opaque(payload) => Variant::ExtensionObject(encode_opaque(payload)?),
        DynamicValue::Null
        | DynamicValue::Unsupported { .. }
        | DynamicValue::Array(_)
        | DynamicValue::Matrix(_)
        | DynamicValue::Range(_)
        | DynamicValue::EuInformation(_)
        | DynamicValue::ComplexNumber(_)
        | DynamicValue::DoubleComplexNumber(_)
        | DynamicValue::AxisInformation(_)
        | DynamicValue::XvType(_)
        | DynamicValue::Argument(_) => Variant::Empty,
    })
}

fn encode_opaque(payload: &OpaquePayload) -> Result<ExtensionObject, CodecError> {
    let body = match payload.encoding {
        BodyEncoding::None if !payload.body.is_empty() => {
            return Err(CodecError::invalid_encoding(format!(
                "{} body bytes without a body encoding",
                payload.body.len()
            )));
        }
        BodyEncoding::None => ExtensionBody::None,
        BodyEncoding::Binary => ExtensionBody::Binary(payload.body.clone()),
        BodyEncoding::Xml => ExtensionBody::Xml(
            String::from_utf8(payload.body.clone())
                .map_err(|e| CodecError::invalid_encoding(format!("XML body: {e}")))?,
        ),
    };
    Ok(ExtensionObject {
        type_id: payload.type_id.clone(),
        body,
    })
}

// =============================================================================
// Decode
// =============================================================================

/// Decodes a wire value. The wire type determines the produced kind.
pub fn decode(variant: &Variant) -> DynamicValue {
    match variant {
        Variant::Empty => DynamicValue::Null,
        Variant::Boolean(v) => DynamicValue::Boolean(*v),
        Variant::SByte(v) => DynamicValue::SByte(*v),
        Variant::Byte(v) => DynamicValue::Byte(*v),
        Variant::Int16(v) => DynamicValue::Int16(*v),
        Variant::UInt16(v) => DynamicValue::UInt16(*v),
        Variant::Int32(v) => DynamicValue::Int32(*v),
        Variant::UInt32(v) => DynamicValue::UInt32(*v),
        Variant::Int64(v) => DynamicValue::Int64(*v),
        Variant::UInt64(v) => DynamicValue::UInt64(*v),
        Variant::Float(v) => DynamicValue::Float(*v),
        Variant::Double(v) => DynamicValue::Double(*v),
        Variant::String(v) => DynamicValue::String(v.clone()),
        Variant::DateTime(v) => DynamicValue::DateTime(*v),
        Variant::Guid(v) => DynamicValue::Guid(*v),
        Variant::ByteString(v) => DynamicValue::ByteString(v.clone()),
        Variant::XmlElement(v) => DynamicValue::XmlElement(v.clone()),
        Variant::NodeId(v) => DynamicValue::NodeId(v.clone()),
        Variant::ExpandedNodeId(v) => DynamicValue::ExpandedNodeId(v.clone()),
        Variant::StatusCode(v) => DynamicValue::StatusCode(*v),
        Variant::QualifiedName(v) => DynamicValue::QualifiedName(v.clone()),
        Variant::LocalizedText(v) => DynamicValue::LocalizedText(v.clone()),
        Variant::ExtensionObject(obj) => decode_extension(obj),
        Variant::DataValue(_) => DynamicValue::unsupported("nested DataValue"),
        Variant::DiagnosticInfo(_) => DynamicValue::unsupported("DiagnosticInfo"),
        Variant::Array(array) => decode_array(array, decode),
    }
}

fn decode_extension(obj: &ExtensionObject) -> DynamicValue {
    match &obj.body {
        ExtensionBody::None => DynamicValue::Opaque(OpaquePayload::empty(obj.type_id.clone())),
        ExtensionBody::Binary(body) => records::decode(&obj.type_id, body).unwrap_or_else(|| {
            DynamicValue::Opaque(OpaquePayload::binary(obj.type_id.clone(), body.clone()))
        }),
        ExtensionBody::Xml(text) => DynamicValue::Opaque(OpaquePayload {
            type_id: obj.type_id.clone(),
            encoding: BodyEncoding::Xml,
            body: text.as_bytes().to_vec(),
        }),
    }
}

fn decode_array(array: &WireArray, element: impl Fn(&Variant) -> DynamicValue) -> DynamicValue {
    let values: Vec<DynamicValue> = array.values.iter().map(element).collect();
    match &array.dimensions {
        None => DynamicValue::Array(values),
        Some(dimensions) => match MultiDimArray::new(dimensions.clone(), values) {
            Ok(matrix) => DynamicValue::Matrix(matrix),
            Err(error) => {
                tracing::trace!(%error, "Wire array dimensions contradict its length");
                DynamicValue::unsupported(error.to_string())
            }
        },
    }
}

/// Decodes a wire value, reinterpreting numbers as `target` when they fit.
///
/// Integers convert to any integer type that holds them and to
/// float/double; floats widen to double; finite doubles narrow to float.
/// Anything else decodes as [`decode`] would. Applies element-wise to
/// arrays and matrices.
pub fn decode_as(variant: &Variant, target: WireType) -> DynamicValue {
    match variant {
        Variant::Array(array) => decode_array(array, |v| decode_as(v, target)),
        scalar => {
            let plain = decode(scalar);
            if target.is_numeric() {
                convert_numeric(&plain, target).unwrap_or(plain)
            } else {
                plain
            }
        }
    }
}

fn convert_numeric(value: &DynamicValue, target: WireType) -> Option<DynamicValue> {
    if let Some(i) = value.as_integer() {
        return match target {
            WireType::SByte => i8::try_from(i).ok().map(DynamicValue::SByte),
            WireType::Byte => u8::try_from(i).ok().map(DynamicValue::Byte),
            WireType::Int16 => i16::try_from(i).ok().map(DynamicValue::Int16),
            WireType::UInt16 => u16::try_from(i).ok().map(DynamicValue::UInt16),
            WireType::Int32 => i32::try_from(i).ok().map(DynamicValue::Int32),
            WireType::UInt32 => u32::try_from(i).ok().map(DynamicValue::UInt32),
            WireType::Int64 => i64::try_from(i).ok().map(DynamicValue::Int64),
            WireType::UInt64 => u64::try_from(i).ok().map(DynamicValue::UInt64),
            WireType::Float => Some(DynamicValue::Float(i as f32)),
            WireType::Double => Some(DynamicValue::Double(i as f64)),
            _ => None,
        };
    }

    match (value, target) {
        (DynamicValue::Float(v), WireType::Double) => Some(DynamicValue::Double(f64::from(*v))),
        (DynamicValue::Double(v), WireType::Float) if v.is_finite() => {
            let narrowed = *v as f32;
            narrowed.is_finite().then_some(DynamicValue::Float(narrowed))
        }
        _ => None,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::status::StatusCode;
    use crate::types::{LocalizedText, NodeId, QualifiedName};

    fn round_trip(value: DynamicValue) {
        let wire = encode(&value, Some(value.kind())).unwrap();
        assert_eq!(decode(&wire), value, "wire form {wire:?}");
    }

    #[test]
    fn test_representative_round_trips() {
        round_trip(DynamicValue::Boolean(true));
        round_trip(DynamicValue::UInt64(u64::MAX));
        round_trip(DynamicValue::Double(-0.5));
        round_trip(DynamicValue::String("pump".into()));
        round_trip(DynamicValue::DateTime(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()));
        round_trip(DynamicValue::NodeId(NodeId::string(2, "Line1.Pump")));
        round_trip(DynamicValue::StatusCode(StatusCode::BAD_NOT_READABLE));
        round_trip(DynamicValue::QualifiedName(QualifiedName::new(1, "Speed")));
        round_trip(DynamicValue::LocalizedText(LocalizedText::new("de", "Drehzahl")));
        round_trip(DynamicValue::Range(Range { low: 1.0, high: 2.0 }));
        round_trip(DynamicValue::ComplexNumber(ComplexNumber { real: 1.0, imaginary: -1.0 }));
        round_trip(DynamicValue::Array(vec![
            DynamicValue::Int32(1),
            DynamicValue::String("x".into()),
            DynamicValue::Null,
        ]));
    }

    #[test]
    fn test_opaque_body_needs_encoding() {
        let empty = OpaquePayload::empty(NodeId::numeric(2, 5001));
        assert!(encode(&DynamicValue::Opaque(empty), None).is_ok());

        let stray = OpaquePayload {
            type_id: NodeId::numeric(2, 5001),
            encoding: BodyEncoding::None,
            body: vec![0x01, 0x02],
        };
        let err = encode(&DynamicValue::Opaque(stray), None).unwrap_err();
        assert!(matches!(err, CodecError::InvalidEncoding { .. }));
    }

    #[test]
    fn test_hint_mismatch_rejected() {
        let err = encode(&DynamicValue::Int32(5), Some(WireType::UInt32)).unwrap_err();
        assert!(matches!(err, CodecError::TypeMismatch { .. }));

        let array = DynamicValue::Array(vec![DynamicValue::Int32(1), DynamicValue::Double(2.0)]);
        assert!(encode(&array, Some(WireType::Int32)).is_err());
        assert!(encode(&array, Some(WireType::Variant)).is_ok());
    }

    #[test]
    fn test_null_and_unsupported_encode_empty() {
        for hint in [None, Some(WireType::Int32), Some(WireType::Variant)] {
            assert_eq!(encode(&DynamicValue::Null, hint).unwrap(), Variant::Empty);
            assert_eq!(
                encode(&DynamicValue::unsupported("x"), hint).unwrap(),
                Variant::Empty
            );
        }
    }

    #[test]
    fn test_array_element_type_selection() {
        let homogeneous = DynamicValue::Array(vec![DynamicValue::Float(1.0), DynamicValue::Float(2.0)]);
        match encode(&homogeneous, None).unwrap() {
            Variant::Array(array) => assert_eq!(array.element_type, WireType::Float),
            other => panic!("unexpected {other:?}"),
        }

        let nested = DynamicValue::Array(vec![DynamicValue::Array(vec![DynamicValue::Byte(1)])]);
        match encode(&nested, None).unwrap() {
            Variant::Array(array) => assert_eq!(array.element_type, WireType::Variant),
            other => panic!("unexpected {other:?}"),
        }
        assert!(encode(&nested, Some(WireType::Byte)).is_err());
    }

    #[test]
    fn test_dimensions_decode_to_matrix() {
        let wire = Variant::Array(WireArray {
            element_type: WireType::Int32,
            values: vec![Variant::Int32(1), Variant::Int32(2)],
            dimensions: Some(vec![2]),
        });
        match decode(&wire) {
            DynamicValue::Matrix(matrix) => assert_eq!(matrix.dimensions(), &[2]),
            other => panic!("unexpected {other:?}"),
        }

        let matrix = MultiDimArray::new(vec![1, 2], vec![DynamicValue::Double(1.5), DynamicValue::Double(2.5)]).unwrap();
        let value = DynamicValue::Matrix(matrix);
        match encode(&value, None).unwrap() {
            Variant::Array(array) => assert_eq!(array.dimensions, Some(vec![1, 2])),
            other => panic!("unexpected {other:?}"),
        }
        round_trip(value);
    }

    #[test]
    fn test_contradicting_dimensions_are_unsupported() {
        let wire = Variant::Array(WireArray {
            element_type: WireType::Int32,
            values: vec![Variant::Int32(1)],
            dimensions: Some(vec![2, 2]),
        });
        assert!(matches!(decode(&wire), DynamicValue::Unsupported { .. }));
    }

    #[test]
    fn test_unsupported_elements_do_not_abort() {
        let wire = Variant::Array(WireArray::new(
            WireType::Variant,
            vec![
                Variant::Int32(7),
                Variant::DataValue(Box::default()),
                Variant::DiagnosticInfo(DiagnosticInfo::default()),
            ],
        ));
        match decode(&wire) {
            DynamicValue::Array(items) => {
                assert_eq!(items[0], DynamicValue::Int32(7));
                assert!(matches!(items[1], DynamicValue::Unsupported { .. }));
                assert!(matches!(items[2], DynamicValue::Unsupported { .. }));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_opaque_payloads_are_lossless() {
        let unknown = DynamicValue::Opaque(OpaquePayload::binary(
            NodeId::numeric(3, 5001),
            vec![1, 2, 3, 4],
        ));
        round_trip(unknown);

        let empty = Variant::ExtensionObject(ExtensionObject {
            type_id: NodeId::numeric(0, 886),
            body: ExtensionBody::None,
        });
        match decode(&empty) {
            DynamicValue::Opaque(payload) => assert_eq!(payload.encoding, BodyEncoding::None),
            other => panic!("unexpected {other:?}"),
        }

        let truncated = Variant::ExtensionObject(ExtensionObject {
            type_id: NodeId::numeric(0, 886),
            body: ExtensionBody::Binary(vec![0; 8]),
        });
        assert!(matches!(decode(&truncated), DynamicValue::Opaque(_)));

        round_trip(DynamicValue::Opaque(OpaquePayload {
            type_id: NodeId::numeric(2, 77),
            encoding: BodyEncoding::Xml,
            body: b"<Point x=\"1\"/>".to_vec(),
        }));
    }

    #[test]
    fn test_invalid_xml_body_rejected() {
        let value = DynamicValue::Opaque(OpaquePayload {
            type_id: NodeId::numeric(2, 77),
            encoding: BodyEncoding::Xml,
            body: vec![0xFF, 0xFE],
        });
        assert!(matches!(
            encode(&value, None),
            Err(CodecError::InvalidEncoding { .. })
        ));
    }

    #[test]
    fn test_decode_as_numeric() {
        assert_eq!(decode_as(&Variant::Int32(200), WireType::Byte), DynamicValue::Byte(200));
        assert_eq!(decode_as(&Variant::Int32(300), WireType::Byte), DynamicValue::Int32(300));
        assert_eq!(decode_as(&Variant::Int32(-1), WireType::Double), DynamicValue::Double(-1.0));
        assert_eq!(decode_as(&Variant::Float(0.5), WireType::Double), DynamicValue::Double(0.5));
        assert_eq!(decode_as(&Variant::Double(0.25), WireType::Float), DynamicValue::Float(0.25));
        assert_eq!(
            decode_as(&Variant::Double(f64::MAX), WireType::Float),
            DynamicValue::Double(f64::MAX)
        );
        assert_eq!(
            decode_as(&Variant::String("1".into()), WireType::Int32),
            DynamicValue::String("1".into())
        );

        let wire = Variant::Array(WireArray::new(
            WireType::UInt16,
            vec![Variant::UInt16(1), Variant::UInt16(2)],
        ));
        assert_eq!(
            decode_as(&wire, WireType::Int64),
            DynamicValue::Array(vec![DynamicValue::Int64(1), DynamicValue::Int64(2)])
        );
    }
}
