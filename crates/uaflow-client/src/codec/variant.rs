// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Wire-typed values as exchanged with the stack.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::value::WireType;
use crate::status::StatusCode;
use crate::types::{ExpandedNodeId, LocalizedText, NodeId, QualifiedName};

/// A wire value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Variant {
    /// No value.
    #[default]
    Empty,
    /// Boolean.
    Boolean(bool),
    /// SByte.
    SByte(i8),
    /// Byte.
    Byte(u8),
    /// Int16.
    Int16(i16),
    /// UInt16.
    UInt16(u16),
    /// Int32.
    Int32(i32),
    /// UInt32.
    UInt32(u32),
    /// Int64.
    Int64(i64),
    /// UInt64.
    UInt64(u64),
    /// Float.
    Float(f32),
    /// Double.
    Double(f64),
    /// String.
    String(String),
    /// DateTime.
    DateTime(DateTime<Utc>),
    /// Guid.
    Guid(Uuid),
    /// ByteString.
    ByteString(Vec<u8>),
    /// XmlElement.
    XmlElement(String),
    /// NodeId.
    NodeId(NodeId),
    /// ExpandedNodeId.
    ExpandedNodeId(ExpandedNodeId),
    /// StatusCode.
    StatusCode(StatusCode),
    /// QualifiedName.
    QualifiedName(QualifiedName),
    /// LocalizedText.
    LocalizedText(LocalizedText),
    /// ExtensionObject.
    ExtensionObject(ExtensionObject),
    /// Nested DataValue.
    DataValue(Box<DataValue>),
    /// DiagnosticInfo.
    DiagnosticInfo(DiagnosticInfo),
    /// Array, optionally with dimensions.
    Array(WireArray),
}

impl Variant {
    /// Returns the wire type of a scalar, or the element type of an array.
    ///
    /// `Empty` reports `Variant`.
    pub fn wire_type(&self) -> WireType {
        match self {
            Self::Empty => WireType::Variant,
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
            Self::DateTime(_) => WireType::DateTime,
            Self::Guid(_) => WireType::Guid,
            Self::ByteString(_) => WireType::ByteString,
            Self::XmlElement(_) => WireType::XmlElement,
            Self::NodeId(_) => WireType::NodeId,
            Self::ExpandedNodeId(_) => WireType::ExpandedNodeId,
            Self::StatusCode(_) => WireType::StatusCode,
            Self::QualifiedName(_) => WireType::QualifiedName,
            Self::LocalizedText(_) => WireType::LocalizedText,
            Self::ExtensionObject(_) => WireType::ExtensionObject,
            Self::DataValue(_) => WireType::DataValue,
            Self::DiagnosticInfo(_) => WireType::DiagnosticInfo,
            Self::Array(array) => array.element_type,
        }
    }

    /// Returns `true` for `Empty`.
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

impl From<i32> for Variant {
    fn from(value: i32) -> Self {
        Self::Int32(value)
    }
}

impl From<f64> for Variant {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<&str> for Variant {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

/// Body of an extension object.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExtensionBody {
    /// No body.
    #[default]
    None,
    /// Binary-encoded body.
    Binary(Vec<u8>),
    /// XML-encoded body.
    Xml(String),
}

/// A structured value: encoding id plus body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionObject {
    /// Encoding id.
    pub type_id: NodeId,
    /// Body.
    pub body: ExtensionBody,
}

/// An array on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireArray {
    /// Element type; `Variant` elements may be of any type.
    pub element_type: WireType,
    /// Elements in row-major order.
    pub values: Vec<Variant>,
    /// Dimension lengths, present for multidimensional arrays.
    pub dimensions: Option<Vec<u32>>,
}

impl WireArray {
    /// Creates a one-dimensional array.
    pub fn new(element_type: WireType, values: Vec<Variant>) -> Self {
        Self {
            element_type,
            values,
            dimensions: None,
        }
    }
}

/// A value with status and timestamps.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DataValue {
    /// Value.
    pub value: Variant,
    /// Status.
    pub status: StatusCode,
    /// Source timestamp.
    pub source_timestamp: Option<DateTime<Utc>>,
    /// Server timestamp.
    pub server_timestamp: Option<DateTime<Utc>>,
}

impl DataValue {
    /// Creates a good value without timestamps.
    pub fn new(value: Variant) -> Self {
        Self {
            value,
            ..Self::default()
        }
    }

    /// Creates a value-less result carrying only a status.
    pub fn from_status(status: StatusCode) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    /// Sets the source timestamp.
    pub fn with_source_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.source_timestamp = Some(timestamp);
        self
    }

    /// Sets the server timestamp.
    pub fn with_server_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.server_timestamp = Some(timestamp);
        self
    }
}

/// Vendor diagnostics attached to a result.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DiagnosticInfo {
    /// Symbolic id index into the string table.
    pub symbolic_id: Option<i32>,
    /// Additional text.
    pub additional_info: Option<String>,
    /// Inner status code.
    pub inner_status: Option<StatusCode>,
}
