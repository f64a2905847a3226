// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Well-known structured records and their binary encodings.

use super::binary::{BinaryReader, BinaryWriter};
use super::value::{
    Argument, AxisInformation, AxisScale, ComplexNumber, DoubleComplexNumber, DynamicValue,
    EuInformation, Range, XvType,
};
use super::variant::{ExtensionBody, ExtensionObject};
use crate::error::CodecError;
use crate::types::NodeId;

/// Default binary encoding ids (namespace 0).
pub mod encoding_ids {
    /// Argument_Encoding_DefaultBinary.
    pub const ARGUMENT: u32 = 298;
    /// Range_Encoding_DefaultBinary.
    pub const RANGE: u32 = 886;
    /// EUInformation_Encoding_DefaultBinary.
    pub const EU_INFORMATION: u32 = 889;
    /// AxisInformation_Encoding_DefaultBinary.
    pub const AXIS_INFORMATION: u32 = 12089;
    /// XVType_Encoding_DefaultBinary.
    pub const XV_TYPE: u32 = 12090;
    /// ComplexNumberType_Encoding_DefaultBinary.
    pub const COMPLEX_NUMBER: u32 = 12181;
    /// DoubleComplexNumberType_Encoding_DefaultBinary.
    pub const DOUBLE_COMPLEX_NUMBER: u32 = 12182;
}

/// Encodes a record value into a binary extension object.
///
/// Returns `None` if `value` is not a record.
pub(crate) fn encode(value: &DynamicValue) -> Option<Result<ExtensionObject, CodecError>> {
    let id = match value {
        DynamicValue::Range(_) => encoding_ids::RANGE,
        DynamicValue::EuInformation(_) => encoding_ids::EU_INFORMATION,
        DynamicValue::ComplexNumber(_) => encoding_ids::COMPLEX_NUMBER,
        DynamicValue::DoubleComplexNumber(_) => encoding_ids::DOUBLE_COMPLEX_NUMBER,
        DynamicValue::AxisInformation(_) => encoding_ids::AXIS_INFORMATION,
        DynamicValue::XvType(_) => encoding_ids::XV_TYPE,
        DynamicValue::Argument(_) => encoding_ids::ARGUMENT,
        _ => return None,
    };

    let mut w = BinaryWriter::new();
    let written = match value {
        DynamicValue::Range(r) => {
            write_range(&mut w, r);
            Ok(())
        }
        DynamicValue::EuInformation(eu) => write_eu_information(&mut w, eu),
        DynamicValue::ComplexNumber(c) => {
            w.write_f32(c.real);
            w.write_f32(c.imaginary);
            Ok(())
        }
        DynamicValue::DoubleComplexNumber(c) => {
            w.write_f64(c.real);
            w.write_f64(c.imaginary);
            Ok(())
        }
        DynamicValue::AxisInformation(axis) => write_axis_information(&mut w, axis),
        DynamicValue::XvType(xv) => {
            w.write_f64(xv.x);
            w.write_f32(xv.value);
            Ok(())
        }
        DynamicValue::Argument(arg) => write_argument(&mut w, arg),
        _ => Ok(()),
    };

    Some(written.map(|()| ExtensionObject {
        type_id: NodeId::numeric(0, id),
        body: ExtensionBody::Binary(w.into_bytes()),
    }))
}

/// Decodes a binary body whose encoding id is a known record.
///
/// Returns `None` for unknown ids and for bodies that do not parse
/// completely.
pub(crate) fn decode(type_id: &NodeId, body: &[u8]) -> Option<DynamicValue> {
    let id = type_id.as_standard_numeric()?;
    let mut r = BinaryReader::new(body);

    let value = match id {
        encoding_ids::RANGE => read_range(&mut r).map(DynamicValue::Range),
        encoding_ids::EU_INFORMATION => {
            read_eu_information(&mut r).map(DynamicValue::EuInformation)
        }
        encoding_ids::COMPLEX_NUMBER => read_complex(&mut r).map(DynamicValue::ComplexNumber),
        encoding_ids::DOUBLE_COMPLEX_NUMBER => {
            read_double_complex(&mut r).map(DynamicValue::DoubleComplexNumber)
        }
        encoding_ids::AXIS_INFORMATION => {
            read_axis_information(&mut r).map(DynamicValue::AxisInformation)
        }
        encoding_ids::XV_TYPE => read_xv(&mut r).map(DynamicValue::XvType),
        encoding_ids::ARGUMENT => read_argument(&mut r).map(DynamicValue::Argument),
        _ => return None,
    };

    match value.and_then(|v| r.finish().map(|()| v)) {
        Ok(v) => Some(v),
        Err(error) => {
            tracing::trace!(type_id = %type_id, %error, "Keeping record body opaque");
            None
        }
    }
}

fn write_range(w: &mut BinaryWriter, r: &Range) {
    w.write_f64(r.low);
    w.write_f64(r.high);
}

fn read_range(r: &mut BinaryReader<'_>) -> Result<Range, CodecError> {
    Ok(Range {
        low: r.read_f64()?,
        high: r.read_f64()?,
    })
}

fn read_complex(r: &mut BinaryReader<'_>) -> Result<ComplexNumber, CodecError> {
    Ok(ComplexNumber {
        real: r.read_f32()?,
        imaginary: r.read_f32()?,
    })
}

fn read_double_complex(r: &mut BinaryReader<'_>) -> Result<DoubleComplexNumber, CodecError> {
    Ok(DoubleComplexNumber {
        real: r.read_f64()?,
        imaginary: r.read_f64()?,
    })
}

fn read_xv(r: &mut BinaryReader<'_>) -> Result<XvType, CodecError> {
    Ok(XvType {
        x: r.read_f64()?,
        value: r.read_f32()?,
    })
}

fn write_eu_information(w: &mut BinaryWriter, eu: &EuInformation) -> Result<(), CodecError> {
    w.write_string(eu.namespace_uri.as_deref())?;
    w.write_i32(eu.unit_id);
    w.write_localized_text(&eu.display_name)?;
    w.write_localized_text(&eu.description)
}

fn read_eu_information(r: &mut BinaryReader<'_>) -> Result<EuInformation, CodecError> {
    Ok(EuInformation {
        namespace_uri: r.read_string()?,
        unit_id: r.read_i32()?,
        display_name: r.read_localized_text()?,
        description: r.read_localized_text()?,
    })
}

fn write_axis_information(w: &mut BinaryWriter, axis: &AxisInformation) -> Result<(), CodecError> {
    write_eu_information(w, &axis.engineering_units)?;
    write_range(w, &axis.eu_range);
    w.write_localized_text(&axis.title)?;
    w.write_i32(axis.axis_scale_type.value());
    w.write_f64_array(axis.axis_steps.as_deref())
}

fn read_axis_information(r: &mut BinaryReader<'_>) -> Result<AxisInformation, CodecError> {
    let engineering_units = read_eu_information(r)?;
    let eu_range = read_range(r)?;
    let title = r.read_localized_text()?;
    let scale = r.read_i32()?;
    let axis_scale_type = AxisScale::from_value(scale)
        .ok_or_else(|| CodecError::invalid_encoding(format!("unknown axis scale {scale}")))?;
    Ok(AxisInformation {
        engineering_units,
        eu_range,
        title,
        axis_scale_type,
        axis_steps: r.read_f64_array()?,
    })
}

fn write_argument(w: &mut BinaryWriter, arg: &Argument) -> Result<(), CodecError> {
    w.write_string(arg.name.as_deref())?;
    w.write_node_id(&arg.data_type)?;
    w.write_i32(arg.value_rank);
    w.write_u32_array(arg.array_dimensions.as_deref())?;
    w.write_localized_text(&arg.description)
}

fn read_argument(r: &mut BinaryReader<'_>) -> Result<Argument, CodecError> {
    Ok(Argument {
        name: r.read_string()?,
        data_type: r.read_node_id()?,
        value_rank: r.read_i32()?,
        array_dimensions: r.read_u32_array()?,
        description: r.read_localized_text()?,
    })
}
