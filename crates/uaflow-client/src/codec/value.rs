// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The generic value type and the wire type tags used as encode hints.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::matrix::MultiDimArray;
use crate::status::StatusCode;
use crate::types::{ExpandedNodeId, LocalizedText, NodeId, QualifiedName};

// =============================================================================
// WireType
// =============================================================================

/// Built-in wire types (OPC UA Part 6, 5.1.2).
///
/// Used as element type of wire arrays and as the hint passed to
/// [`encode`](super::encode). For arrays and matrices the hint names the
/// element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WireType {
    /// Boolean (1).
    Boolean,
    /// SByte (2).
    SByte,
    /// Byte (3).
    Byte,
    /// Int16 (4).
    Int16,
    /// UInt16 (5).
    UInt16,
    /// Int32 (6).
    Int32,
    /// UInt32 (7).
    UInt32,
    /// Int64 (8).
    Int64,
    /// UInt64 (9).
    UInt64,
    /// Float (10).
    Float,
    /// Double (11).
    Double,
    /// String (12).
    String,
    /// DateTime (13).
    DateTime,
    /// Guid (14).
    Guid,
    /// ByteString (15).
    ByteString,
    /// XmlElement (16).
    XmlElement,
    /// NodeId (17).
    NodeId,
    /// ExpandedNodeId (18).
    ExpandedNodeId,
    /// StatusCode (19).
    StatusCode,
    /// QualifiedName (20).
    QualifiedName,
    /// LocalizedText (21).
    LocalizedText,
    /// ExtensionObject (22).
    ExtensionObject,
    /// DataValue (23).
    DataValue,
    /// Variant (24), accepts any kind.
    Variant,
    /// DiagnosticInfo (25).
    DiagnosticInfo,
}

impl WireType {
    /// Returns the built-in type id.
    pub const fn builtin_id(&self) -> u8 {
        match self {
            Self::Boolean => 1,
            Self::SByte => 2,
            Self::Byte => 3,
            Self::Int16 => 4,
            Self::UInt16 => 5,
            Self::Int32 => 6,
            Self::UInt32 => 7,
            Self::Int64 => 8,
            Self::UInt64 => 9,
            Self::Float => 10,
            Self::Double => 11,
            Self::String => 12,
            Self::DateTime => 13,
            Self::Guid => 14,
            Self::ByteString => 15,
            Self::XmlElement => 16,
            Self::NodeId => 17,
            Self::ExpandedNodeId => 18,
            Self::StatusCode => 19,
            Self::QualifiedName => 20,
            Self::LocalizedText => 21,
            Self::ExtensionObject => 22,
            Self::DataValue => 23,
            Self::Variant => 24,
            Self::DiagnosticInfo => 25,
        }
    }

    /// Returns the type with the given built-in id (1..=25).
    pub fn from_builtin_id(id: u32) -> Option<Self> {
        const ALL: [WireType; 25] = [
            WireType::Boolean,
            WireType::SByte,
            WireType::Byte,
            WireType::Int16,
            WireType::UInt16,
            WireType::Int32,
            WireType::UInt32,
            WireType::Int64,
            WireType::UInt64,
            WireType::Float,
            WireType::Double,
            WireType::String,
            WireType::DateTime,
            WireType::Guid,
            WireType::ByteString,
            WireType::XmlElement,
            WireType::NodeId,
            WireType::ExpandedNodeId,
            WireType::StatusCode,
            WireType::QualifiedName,
            WireType::LocalizedText,
            WireType::ExtensionObject,
            WireType::DataValue,
            WireType::Variant,
            WireType::DiagnosticInfo,
        ];
        let index = usize::try_from(id).ok()?.checked_sub(1)?;
        ALL.get(index).copied()
    }

    /// Returns `true` for integer types.
    pub const fn is_integer(&self) -> bool {
        matches!(
            self,
            Self::SByte
                | Self::Byte
                | Self::Int16
                | Self::UInt16
                | Self::Int32
                | Self::UInt32
                | Self::Int64
                | Self::UInt64
        )
    }

    /// Returns `true` for integer and floating-point types.
    pub const fn is_numeric(&self) -> bool {
        self.is_integer() || matches!(self, Self::Float | Self::Double)
    }

    /// Returns the type name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Boolean => "Boolean",
            Self::SByte => "SByte",
            Self::Byte => "Byte",
            Self::Int16 => "Int16",
            Self::UInt16 => "UInt16",
            Self::Int32 => "Int32",
            Self::UInt32 => "UInt32",
            Self::Int64 => "Int64",
            Self::UInt64 => "UInt64",
            Self::Float => "Float",
            Self::Double => "Double",
            Self::String => "String",
            Self::DateTime => "DateTime",
            Self::Guid => "Guid",
            Self::ByteString => "ByteString",
            Self::XmlElement => "XmlElement",
            Self::NodeId => "NodeId",
            Self::ExpandedNodeId => "ExpandedNodeId",
            Self::StatusCode => "StatusCode",
            Self::QualifiedName => "QualifiedName",
            Self::LocalizedText => "LocalizedText",
            Self::ExtensionObject => "ExtensionObject",
            Self::DataValue => "DataValue",
            Self::Variant => "Variant",
            Self::DiagnosticInfo => "DiagnosticInfo",
        }
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Well-known records
// =============================================================================

/// Range (encoding id 886).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Range {
    /// Lower bound.
    pub low: f64,
    /// Upper bound.
    pub high: f64,
}

/// EUInformation (encoding id 889).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EuInformation {
    /// Namespace URI of the unit table.
    pub namespace_uri: Option<String>,
    /// UNECE unit id.
    pub unit_id: i32,
    /// Display name, e.g. `°C`.
    pub display_name: LocalizedText,
    /// Description.
    pub description: LocalizedText,
}

/// ComplexNumberType (encoding id 12181).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ComplexNumber {
    /// Real part.
    pub real: f32,
    /// Imaginary part.
    pub imaginary: f32,
}

/// DoubleComplexNumberType (encoding id 12182).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DoubleComplexNumber {
    /// Real part.
    pub real: f64,
    /// Imaginary part.
    pub imaginary: f64,
}

/// Axis scale of an [`AxisInformation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AxisScale {
    /// Linear.
    #[default]
    Linear,
    /// Base-10 logarithmic.
    Log,
    /// Natural logarithmic.
    Ln,
}

impl AxisScale {
    /// Returns the wire value.
    pub const fn value(&self) -> i32 {
        match self {
            Self::Linear => 0,
            Self::Log => 1,
            Self::Ln => 2,
        }
    }

    /// Creates from the wire value.
    pub fn from_value(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Linear),
            1 => Some(Self::Log),
            2 => Some(Self::Ln),
            _ => None,
        }
    }
}

/// AxisInformation (encoding id 12089).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AxisInformation {
    /// Engineering units.
    pub engineering_units: EuInformation,
    /// Range.
    pub eu_range: Range,
    /// Title.
    pub title: LocalizedText,
    /// Scale.
    pub axis_scale_type: AxisScale,
    /// Explicit axis steps, `None` for equidistant.
    pub axis_steps: Option<Vec<f64>>,
}

/// XVType (encoding id 12090).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct XvType {
    /// Position on the X axis.
    pub x: f64,
    /// Value.
    pub value: f32,
}

/// Argument (encoding id 298), describing a method argument.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Argument {
    /// Argument name.
    pub name: Option<String>,
    /// Data type node id.
    pub data_type: NodeId,
    /// Value rank (-1 scalar, 1 one-dimensional array, ...).
    pub value_rank: i32,
    /// Array dimensions.
    pub array_dimensions: Option<Vec<u32>>,
    /// Description.
    pub description: LocalizedText,
}

// =============================================================================
// Opaque payloads
// =============================================================================

/// Encoding of an opaque structured payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BodyEncoding {
    /// No body.
    None,
    /// OPC UA binary.
    Binary,
    /// XML text.
    Xml,
}

/// A structured value the codec does not interpret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpaquePayload {
    /// Encoding id of the body.
    pub type_id: NodeId,
    /// Body encoding.
    pub encoding: BodyEncoding,
    /// Raw body (UTF-8 text for XML).
    pub body: Vec<u8>,
}

impl OpaquePayload {
    /// Creates a payload without a body.
    pub fn empty(type_id: NodeId) -> Self {
        Self {
            type_id,
            encoding: BodyEncoding::None,
            body: Vec::new(),
        }
    }

    /// Creates a payload with a binary body.
    pub fn binary(type_id: NodeId, body: Vec<u8>) -> Self {
        Self {
            type_id,
            encoding: BodyEncoding::Binary,
            body,
        }
    }
}

// =============================================================================
// DynamicValue
// =============================================================================

/// Any value that can travel over the wire.
///
/// The set of kinds is closed. A value never changes kind in place;
/// conversions such as [`decode_as`](super::decode_as) build a new value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum DynamicValue {
    /// No value.
    #[default]
    Null,
    /// Boolean.
    Boolean(bool),
    /// 8-bit signed integer.
    SByte(i8),
    /// 8-bit unsigned integer.
    Byte(u8),
    /// 16-bit signed integer.
    Int16(i16),
    /// 16-bit unsigned integer.
    UInt16(u16),
    /// 32-bit signed integer.
    Int32(i32),
    /// 32-bit unsigned integer.
    UInt32(u32),
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit unsigned integer.
    UInt64(u64),
    /// 32-bit float.
    Float(f32),
    /// 64-bit float.
    Double(f64),
    /// Text.
    String(String),
    /// Raw bytes.
    ByteString(Vec<u8>),
    /// XML fragment.
    XmlElement(String),
    /// Timestamp.
    DateTime(DateTime<Utc>),
    /// GUID.
    Guid(Uuid),
    /// Node id.
    NodeId(NodeId),
    /// Expanded node id.
    ExpandedNodeId(ExpandedNodeId),
    /// Status code.
    StatusCode(StatusCode),
    /// Qualified name.
    QualifiedName(QualifiedName),
    /// Localized text.
    LocalizedText(LocalizedText),
    /// Range record.
    Range(Range),
    /// EUInformation record.
    EuInformation(EuInformation),
    /// ComplexNumberType record.
    ComplexNumber(ComplexNumber),
    /// DoubleComplexNumberType record.
    DoubleComplexNumber(DoubleComplexNumber),
    /// AxisInformation record.
    AxisInformation(AxisInformation),
    /// XVType record.
    XvType(XvType),
    /// Argument record.
    Argument(Argument),
    /// One-dimensional array.
    Array(Vec<DynamicValue>),
    /// Multidimensional array.
    Matrix(MultiDimArray),
    /// Uninterpreted structured value.
    Opaque(OpaquePayload),
    /// A wire element the codec cannot represent.
    Unsupported {
        /// What was encountered.
        reason: String,
    },
}

impl DynamicValue {
    /// Creates an unsupported marker.
    pub fn unsupported(reason: impl Into<String>) -> Self {
        Self::Unsupported {
            reason: reason.into(),
        }
    }

    /// Returns `true` for [`DynamicValue::Null`].
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns `true` for arrays and matrices.
    #[inline]
    pub fn is_array(&self) -> bool {
        matches!(self, Self::Array(_) | Self::Matrix(_))
    }

    /// Returns the wire type this value encodes to without a hint.
    ///
    /// Records and opaque payloads are `ExtensionObject`. Arrays report their
    /// common element type, or `Variant` when mixed. `Null` and
    /// `Unsupported` report `Variant`.
    pub fn kind(&self) -> WireType {
        match self {
            Self::Null | Self::Unsupported { .. } => WireType::Variant,
            Self::Boolean(_) => WireType::Boolean,
            Self::SByte(_) => WireType::SByte,
            Self::Byte(_) => WireType::Byte,
            Self::Int16(_) => WireType::Int16,
            Self::UInt16(_) => WireType::UInt16,
            Self::Int32(_) => WireType::Int32,
            Self::UInt32(_) => WireType::UInt32,
            Self::Int64(_) => WireType::Int64,
            Self::UInt64(_) => WireType::UInt64,
            Self::Float(_) => WireType::Float,
            Self::Double(_) => WireType::Double,
            Self::String(_) => WireType::String,
            Self::ByteString(_) => WireType::ByteString,
            Self::XmlElement(_) => WireType::XmlElement,
            Self::DateTime(_) => WireType::DateTime,
            Self::Guid(_) => WireType::Guid,
            Self::NodeId(_) => WireType::NodeId,
            Self::ExpandedNodeId(_) => WireType::ExpandedNodeId,
            Self::StatusCode(_) => WireType::StatusCode,
            Self::QualifiedName(_) => WireType::QualifiedName,
            Self::LocalizedText(_) => WireType::LocalizedText,
            Self::Range(_)
            | Self::EuInformation(_)
            | Self::ComplexNumber(_)
            | Self::DoubleComplexNumber(_)
            | Self::AxisInformation(_)
            | Self::XvType(_)
            | Self::Argument(_)
            | Self::Opaque(_) => WireType::ExtensionObject,
            Self::Array(items) => common_element_type(items),
            Self::Matrix(matrix) => common_element_type(matrix.values()),
        }
    }

    /// Returns a short name of the value's kind for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "Null",
            Self::Range(_) => "Range",
            Self::EuInformation(_) => "EUInformation",
            Self::ComplexNumber(_) => "ComplexNumber",
            Self::DoubleComplexNumber(_) => "DoubleComplexNumber",
            Self::AxisInformation(_) => "AxisInformation",
            Self::XvType(_) => "XVType",
            Self::Argument(_) => "Argument",
            Self::Array(_) => "Array",
            Self::Matrix(_) => "Matrix",
            Self::Opaque(_) => "Opaque",
            Self::Unsupported { .. } => "Unsupported",
            scalar => scalar.kind().name(),
        }
    }

    /// Returns the boolean value.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns any integer value widened to `i128`.
    pub fn as_integer(&self) -> Option<i128> {
        match *self {
            Self::SByte(v) => Some(v.into()),
            Self::Byte(v) => Some(v.into()),
            Self::Int16(v) => Some(v.into()),
            Self::UInt16(v) => Some(v.into()),
            Self::Int32(v) => Some(v.into()),
            Self::UInt32(v) => Some(v.into()),
            Self::Int64(v) => Some(v.into()),
            Self::UInt64(v) => Some(v.into()),
            _ => None,
        }
    }

    /// Returns any numeric value as `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::Float(v) => Some(v.into()),
            Self::Double(v) => Some(v),
            _ => self.as_integer().map(|v| v as f64),
        }
    }

    /// Returns any integer value as `u32` if it fits.
    pub fn as_u32(&self) -> Option<u32> {
        self.as_integer().and_then(|v| u32::try_from(v).ok())
    }

    /// Returns string-like content.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) | Self::XmlElement(v) => Some(v),
            _ => None,
        }
    }
}

pub(crate) fn common_element_type(items: &[DynamicValue]) -> WireType {
    let mut kinds = items.iter().map(|item| match item {
        DynamicValue::Null
        | DynamicValue::Unsupported { .. }
        | DynamicValue::Array(_)
        | DynamicValue::Matrix(_) => WireType::Variant,
        other => other.kind(),
    });
    match kinds.next() {
        Some(first) if kinds.all(|k| k == first) => first,
        _ => WireType::Variant,
    }
}

impl fmt::Display for DynamicValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Boolean(v) => write!(f, "{v}"),
            Self::SByte(v) => write!(f, "{v}"),
            Self::Byte(v) => write!(f, "{v}"),
            Self::Int16(v) => write!(f, "{v}"),
            Self::UInt16(v) => write!(f, "{v}"),
            Self::Int32(v) => write!(f, "{v}"),
            Self::UInt32(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::UInt64(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::String(v) | Self::XmlElement(v) => f.write_str(v),
            Self::ByteString(v) => write!(f, "<{} bytes>", v.len()),
            Self::DateTime(v) => write!(f, "{}", v.to_rfc3339()),
            Self::Guid(v) => write!(f, "{v}"),
            Self::NodeId(v) => write!(f, "{v}"),
            Self::ExpandedNodeId(v) => write!(f, "{v}"),
            Self::StatusCode(v) => write!(f, "{v}"),
            Self::QualifiedName(v) => write!(f, "{v}"),
            Self::LocalizedText(v) => write!(f, "{v}"),
            Self::Range(r) => write!(f, "[{}, {}]", r.low, r.high),
            Self::ComplexNumber(c) => write!(f, "{}{:+}i", c.real, c.imaginary),
            Self::DoubleComplexNumber(c) => write!(f, "{}{:+}i", c.real, c.imaginary),
            Self::XvType(xv) => write!(f, "({}, {})", xv.x, xv.value),
            Self::Array(items) => write!(f, "Array[{}]", items.len()),
            Self::Matrix(m) => write!(f, "Matrix{:?}", m.dimensions()),
            Self::Opaque(p) => write!(f, "Opaque({}, {} bytes)", p.type_id, p.body.len()),
            Self::Unsupported { reason } => write!(f, "Unsupported({reason})"),
            other => f.write_str(other.type_name()),
        }
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for DynamicValue {
                fn from(value: $ty) -> Self {
                    Self::$variant(value)
                }
            }
        )*
    };
}

impl_from! {
    bool => Boolean,
    i8 => SByte,
    u8 => Byte,
    i16 => Int16,
    u16 => UInt16,
    i32 => Int32,
    u32 => UInt32,
    i64 => Int64,
    u64 => UInt64,
    f32 => Float,
    f64 => Double,
    String => String,
    DateTime<Utc> => DateTime,
    Uuid => Guid,
    NodeId => NodeId,
    StatusCode => StatusCode,
    QualifiedName => QualifiedName,
    LocalizedText => LocalizedText,
    Vec<DynamicValue> => Array,
    MultiDimArray => Matrix,
}

impl From<&str> for DynamicValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_of_scalars_and_records() {
        assert_eq!(DynamicValue::from(3i32).kind(), WireType::Int32);
        assert_eq!(DynamicValue::from("x").kind(), WireType::String);
        assert_eq!(
            DynamicValue::Range(Range::default()).kind(),
            WireType::ExtensionObject
        );
        assert_eq!(DynamicValue::Null.kind(), WireType::Variant);
    }

    #[test]
    fn test_kind_of_arrays() {
        let homogeneous = DynamicValue::Array(vec![1.0f64.into(), 2.0f64.into()]);
        assert_eq!(homogeneous.kind(), WireType::Double);

        let mixed = DynamicValue::Array(vec![1.0f64.into(), "a".into()]);
        assert_eq!(mixed.kind(), WireType::Variant);

        let with_null = DynamicValue::Array(vec![DynamicValue::Null, DynamicValue::Null]);
        assert_eq!(with_null.kind(), WireType::Variant);

        assert_eq!(DynamicValue::Array(vec![]).kind(), WireType::Variant);
    }

    #[test]
    fn test_numeric_accessors() {
        assert_eq!(DynamicValue::UInt64(u64::MAX).as_integer(), Some(u64::MAX.into()));
        assert_eq!(DynamicValue::Float(1.5).as_f64(), Some(1.5));
        assert_eq!(DynamicValue::Int16(-4).as_u32(), None);
        assert_eq!(DynamicValue::String("a".into()).as_f64(), None);
    }

    #[test]
    fn test_builtin_ids() {
        assert_eq!(WireType::from_builtin_id(1), Some(WireType::Boolean));
        assert_eq!(WireType::from_builtin_id(11), Some(WireType::Double));
        assert_eq!(WireType::from_builtin_id(25), Some(WireType::DiagnosticInfo));
        assert_eq!(WireType::from_builtin_id(0), None);
        assert_eq!(WireType::from_builtin_id(26), None);
        for id in 1..=25u32 {
            let ty = WireType::from_builtin_id(id).unwrap();
            assert_eq!(u32::from(ty.builtin_id()), id);
        }
    }

    #[test]
    fn test_type_name() {
        assert_eq!(DynamicValue::Int32(1).type_name(), "Int32");
        assert_eq!(DynamicValue::XvType(XvType::default()).type_name(), "XVType");
        assert_eq!(DynamicValue::Array(vec![]).type_name(), "Array");
    }

    #[test]
    fn test_serde_tagging() {
        let json = serde_json::to_string(&DynamicValue::Int32(7)).unwrap();
        assert_eq!(json, r#"{"kind":"Int32","value":7}"#);
        let back: DynamicValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, DynamicValue::Int32(7));
    }
}
