// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Monitoring filters: data-change deadbands and event filters.
//!
//! Application code builds [`MonitoringFilter`] values with generic literals.
//! [`encode_filter`] validates them and produces the [`WireFilter`] the stack
//! consumes. [`decode_filter`] goes the other way and never fails.
//!
//! # Examples
//!
//! ```
//! use uaflow_client::codec::filter::*;
//! use uaflow_client::codec::DynamicValue;
//!
//! let mut where_clause = ContentFilter::default();
//! where_clause.push(
//!     FilterOperator::GreaterThanOrEqual,
//!     vec![
//!         FilterOperand::SimpleAttribute(SimpleAttributeOperand::event_field("Severity")),
//!         FilterOperand::Literal(DynamicValue::UInt16(500)),
//!     ],
//! );
//! let filter = MonitoringFilter::Event(EventFilter {
//!     select_clauses: vec![
//!         SimpleAttributeOperand::event_field("Message"),
//!         SimpleAttributeOperand::event_field("Severity"),
//!     ],
//!     where_clause,
//! });
//! assert!(encode_filter(&filter).is_ok());
//! ```

use serde::{Deserialize, Serialize};

use super::value::DynamicValue;
use super::variant::Variant;
use crate::error::CodecError;
use crate::status::StatusCode;
use crate::types::{AttributeId, NodeId, QualifiedName};

// =============================================================================
// Data-change filter
// =============================================================================

/// Which changes trigger a data-change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DataChangeTrigger {
    /// Status changes only.
    Status,
    /// Status or value changes.
    #[default]
    StatusValue,
    /// Status, value or source timestamp changes.
    StatusValueTimestamp,
}

/// Deadband applied to value changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DeadbandType {
    /// No deadband.
    #[default]
    None,
    /// Absolute change in engineering units.
    Absolute,
    /// Percentage of the EURange.
    Percent,
}

/// A data-change filter.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DataChangeFilter {
    /// Trigger.
    pub trigger: DataChangeTrigger,
    /// Deadband type.
    pub deadband_type: DeadbandType,
    /// Deadband value; for `Percent` within 0..=100.
    pub deadband_value: f64,
}

impl DataChangeFilter {
    fn validate(&self) -> Result<(), CodecError> {
        match self.deadband_type {
            DeadbandType::None => Ok(()),
            DeadbandType::Absolute => {
                if self.deadband_value.is_finite() && self.deadband_value >= 0.0 {
                    Ok(())
                } else {
                    Err(CodecError::invalid_filter(format!(
                        "absolute deadband {} must be a non-negative number",
                        self.deadband_value
                    )))
                }
            }
            DeadbandType::Percent => {
                if (0.0..=100.0).contains(&self.deadband_value) {
                    Ok(())
                } else {
                    Err(CodecError::invalid_filter(format!(
                        "percent deadband {} outside 0..=100",
                        self.deadband_value
                    )))
                }
            }
        }
    }
}

// =============================================================================
// Operands
// =============================================================================

/// Selects a value from an event by type and browse path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleAttributeOperand {
    /// Event type the path starts from.
    pub type_definition_id: NodeId,
    /// Browse path below the type.
    pub browse_path: Vec<QualifiedName>,
    /// Attribute to return.
    pub attribute_id: AttributeId,
    /// Optional index range.
    pub index_range: Option<String>,
}

impl SimpleAttributeOperand {
    /// Selects the `Value` of a BaseEventType field, e.g. `Message`.
    pub fn event_field(name: impl Into<String>) -> Self {
        Self {
            type_definition_id: NodeId::BASE_EVENT_TYPE,
            browse_path: vec![QualifiedName::new(0, name)],
            attribute_id: AttributeId::Value,
            index_range: None,
        }
    }
}

/// Selects an attribute of an arbitrary node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeOperand {
    /// Starting node.
    pub node_id: NodeId,
    /// Alias usable by other operands.
    pub alias: Option<String>,
    /// Hierarchical browse path from the starting node.
    pub browse_path: Vec<QualifiedName>,
    /// Attribute to return.
    pub attribute_id: AttributeId,
    /// Optional index range.
    pub index_range: Option<String>,
}

/// Operand of a content-filter element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FilterOperand {
    /// Result of another element, by index.
    Element(u32),
    /// A constant.
    Literal(DynamicValue),
    /// An event field.
    SimpleAttribute(SimpleAttributeOperand),
    /// A node attribute.
    Attribute(AttributeOperand),
}

// =============================================================================
// Operators
// =============================================================================

/// Content-filter operators (Part 4, 7.7.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterOperator {
    /// a == b.
    Equals,
    /// a is null.
    IsNull,
    /// a > b.
    GreaterThan,
    /// a < b.
    LessThan,
    /// a >= b.
    GreaterThanOrEqual,
    /// a <= b.
    LessThanOrEqual,
    /// a matches pattern b.
    Like,
    /// !a.
    Not,
    /// b <= a <= c.
    Between,
    /// a in (b, c, ...).
    InList,
    /// a && b.
    And,
    /// a || b.
    Or,
    /// a converted to type b.
    Cast,
    /// Event source is in view a.
    InView,
    /// Event is of type a.
    OfType,
    /// Reference relation between nodes.
    RelatedTo,
    /// a & b.
    BitwiseAnd,
    /// a | b.
    BitwiseOr,
}

impl FilterOperator {
    /// Returns the wire value.
    pub const fn value(&self) -> u32 {
        *self as u32
    }

    /// Returns the minimum and maximum operand count (`None` = unbounded).
    pub const fn operand_count(&self) -> (usize, Option<usize>) {
        match self {
            Self::IsNull | Self::Not | Self::InView | Self::OfType => (1, Some(1)),
            Self::Between => (3, Some(3)),
            Self::InList => (2, None),
            Self::RelatedTo => (3, Some(6)),
            Self::Equals
            | Self::GreaterThan
            | Self::LessThan
            | Self::GreaterThanOrEqual
            | Self::LessThanOrEqual
            | Self::Like
            | Self::And
            | Self::Or
            | Self::Cast
            | Self::BitwiseAnd
            | Self::BitwiseOr => (2, Some(2)),
        }
    }
}

// =============================================================================
// Content filter and event filter
// =============================================================================

/// One element of a content filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentFilterElement {
    /// Operator.
    pub operator: FilterOperator,
    /// Operands.
    pub operands: Vec<FilterOperand>,
}

/// A content-filter expression tree; element 0 is the root.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ContentFilter {
    /// Elements.
    pub elements: Vec<ContentFilterElement>,
}

impl ContentFilter {
    /// Appends an element and returns its index for use in [`FilterOperand::Element`].
    pub fn push(&mut self, operator: FilterOperator, operands: Vec<FilterOperand>) -> u32 {
        self.elements.push(ContentFilterElement { operator, operands });
        (self.elements.len() - 1) as u32
    }

    /// Returns `true` if the filter has no elements (matches everything).
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

/// An event filter.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EventFilter {
    /// Fields returned with every event, in order.
    pub select_clauses: Vec<SimpleAttributeOperand>,
    /// Condition events must satisfy.
    pub where_clause: ContentFilter,
}

/// A monitoring filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MonitoringFilter {
    /// Data-change filter.
    DataChange(DataChangeFilter),
    /// Event filter.
    Event(EventFilter),
}

// =============================================================================
// Wire forms
// =============================================================================

/// Wire operand: literals are wire values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WireFilterOperand {
    /// Element reference.
    Element(u32),
    /// Literal.
    Literal(Variant),
    /// Event field.
    SimpleAttribute(SimpleAttributeOperand),
    /// Node attribute.
    Attribute(AttributeOperand),
}

/// Wire content-filter element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireFilterElement {
    /// Operator.
    pub operator: FilterOperator,
    /// Operands.
    pub operands: Vec<WireFilterOperand>,
}

/// Wire monitoring filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WireFilter {
    /// Data-change filter.
    DataChange(DataChangeFilter),
    /// Event filter.
    Event {
        /// Select clauses.
        select_clauses: Vec<SimpleAttributeOperand>,
        /// Where-clause elements.
        where_clause: Vec<WireFilterElement>,
    },
}

// =============================================================================
// Filter results
// =============================================================================

/// Server verdict on one where-clause element.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContentFilterElementResult {
    /// Element status.
    pub status: StatusCode,
    /// Per-operand status.
    pub operand_status_codes: Vec<StatusCode>,
}

/// Server verdict on an event filter.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EventFilterResult {
    /// Per-select-clause status.
    pub select_clause_results: Vec<StatusCode>,
    /// Per-element where-clause results.
    pub where_clause_results: Vec<ContentFilterElementResult>,
}

impl EventFilterResult {
    /// Returns `true` if any clause was rejected.
    pub fn has_errors(&self) -> bool {
        self.select_clause_results.iter().any(StatusCode::is_bad)
            || self.where_clause_results.iter().any(|r| {
                r.status.is_bad() || r.operand_status_codes.iter().any(StatusCode::is_bad)
            })
    }
}

// =============================================================================
// Conversion
// =============================================================================

/// Validates a filter and converts it to its wire form.
pub fn encode_filter(filter: &MonitoringFilter) -> Result<WireFilter, CodecError> {
    match filter {
        MonitoringFilter::DataChange(dc) => {
            dc.validate()?;
            Ok(WireFilter::DataChange(*dc))
        }
        MonitoringFilter::Event(event) => {
            if event.select_clauses.is_empty() {
                return Err(CodecError::invalid_filter(
                    "event filter needs at least one select clause",
                ));
            }
            let count = event.where_clause.elements.len();
            let where_clause = event
                .where_clause
                .elements
                .iter()
                .enumerate()
                .map(|(index, element)| encode_element(index, element, count))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(WireFilter::Event {
                select_clauses: event.select_clauses.clone(),
                where_clause,
            })
        }
    }
}

fn encode_element(
    index: usize,
    element: &ContentFilterElement,
    count: usize,
) -> Result<WireFilterElement, CodecError> {
    let (min, max) = element.operator.operand_count();
    let n = element.operands.len();
    if n < min || max.is_some_and(|max| n > max) {
        return Err(CodecError::invalid_filter(format!(
            "element {index}: {:?} takes {}, got {n}",
            element.operator,
            match max {
                Some(max) if max == min => format!("{min} operand(s)"),
                Some(max) => format!("{min} to {max} operands"),
                None => format!("at least {min} operands"),
            }
        )));
    }

    let operands = element
        .operands
        .iter()
        .map(|operand| match operand {
            FilterOperand::Element(target) => {
                if (*target as usize) < count {
                    Ok(WireFilterOperand::Element(*target))
                } else {
                    Err(CodecError::invalid_filter(format!(
                        "element {index}: operand references element {target} of {count}"
                    )))
                }
            }
            FilterOperand::Literal(value) => super::encode(value, None).map(WireFilterOperand::Literal),
            FilterOperand::SimpleAttribute(op) => Ok(WireFilterOperand::SimpleAttribute(op.clone())),
            FilterOperand::Attribute(op) => Ok(WireFilterOperand::Attribute(op.clone())),
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(WireFilterElement {
        operator: element.operator,
        operands,
    })
}

/// Converts a wire filter back to the generic form.
pub fn decode_filter(filter: &WireFilter) -> MonitoringFilter {
    match filter {
        WireFilter::DataChange(dc) => MonitoringFilter::DataChange(*dc),
        WireFilter::Event {
            select_clauses,
            where_clause,
        } => MonitoringFilter::Event(EventFilter {
            select_clauses: select_clauses.clone(),
            where_clause: ContentFilter {
                elements: where_clause
                    .iter()
                    .map(|element| ContentFilterElement {
                        operator: element.operator,
                        operands: element
                            .operands
                            .iter()
                            .map(|operand| match operand {
                                WireFilterOperand::Element(i) => FilterOperand::Element(*i),
                                WireFilterOperand::Literal(v) => {
                                    FilterOperand::Literal(super::decode(v))
                                }
                                WireFilterOperand::SimpleAttribute(op) => {
                                    FilterOperand::SimpleAttribute(op.clone())
                                }
                                WireFilterOperand::Attribute(op) => {
                                    FilterOperand::Attribute(op.clone())
                                }
                            })
                            .collect(),
                    })
                    .collect(),
            },
        }),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn severity() -> FilterOperand {
        FilterOperand::SimpleAttribute(SimpleAttributeOperand::event_field("Severity"))
    }

    fn event_filter(where_clause: ContentFilter) -> MonitoringFilter {
        MonitoringFilter::Event(EventFilter {
            select_clauses: vec![SimpleAttributeOperand::event_field("Message")],
            where_clause,
        })
    }

    #[test]
    fn test_percent_deadband_range() {
        let filter = |value| {
            MonitoringFilter::DataChange(DataChangeFilter {
                trigger: DataChangeTrigger::StatusValue,
                deadband_type: DeadbandType::Percent,
                deadband_value: value,
            })
        };
        assert!(encode_filter(&filter(0.0)).is_ok());
        assert!(encode_filter(&filter(100.0)).is_ok());
        assert!(encode_filter(&filter(100.5)).is_err());
        assert!(encode_filter(&filter(-1.0)).is_err());
        assert!(encode_filter(&filter(f64::NAN)).is_err());
    }

    #[test]
    fn test_operand_counts() {
        let cases = [
            (FilterOperator::Equals, 2, true),
            (FilterOperator::Equals, 1, false),
            (FilterOperator::IsNull, 1, true),
            (FilterOperator::Not, 2, false),
            (FilterOperator::Between, 3, true),
            (FilterOperator::Between, 2, false),
            (FilterOperator::InList, 2, true),
            (FilterOperator::InList, 5, true),
            (FilterOperator::InList, 1, false),
            (FilterOperator::And, 2, true),
            (FilterOperator::Or, 3, false),
        ];
        for (operator, n, ok) in cases {
            let mut where_clause = ContentFilter::default();
            where_clause.push(operator, vec![severity(); n]);
            assert_eq!(
                encode_filter(&event_filter(where_clause)).is_ok(),
                ok,
                "{operator:?} with {n}"
            );
        }
    }

    #[test]
    fn test_element_index_validation() {
        let mut where_clause = ContentFilter::default();
        where_clause.push(
            FilterOperator::And,
            vec![FilterOperand::Element(1), FilterOperand::Element(2)],
        );
        where_clause.push(FilterOperator::IsNull, vec![severity()]);
        let err = encode_filter(&event_filter(where_clause.clone())).unwrap_err();
        assert!(matches!(err, CodecError::InvalidFilter { .. }));

        where_clause.push(FilterOperator::IsNull, vec![severity()]);
        assert!(encode_filter(&event_filter(where_clause)).is_ok());
    }

    #[test]
    fn test_event_filter_requires_select_clause() {
        let filter = MonitoringFilter::Event(EventFilter::default());
        assert!(encode_filter(&filter).is_err());
    }

    #[test]
    fn test_literals_pass_through_codec() {
        let mut where_clause = ContentFilter::default();
        where_clause.push(
            FilterOperator::GreaterThan,
            vec![severity(), FilterOperand::Literal(DynamicValue::UInt16(100))],
        );
        let filter = event_filter(where_clause);
        let wire = encode_filter(&filter).unwrap();
        match &wire {
            WireFilter::Event { where_clause, .. } => {
                assert_eq!(
                    where_clause[0].operands[1],
                    WireFilterOperand::Literal(Variant::UInt16(100))
                );
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(decode_filter(&wire), filter);
    }

    #[test]
    fn test_filter_result_errors() {
        let mut result = EventFilterResult {
            select_clause_results: vec![StatusCode::GOOD],
            where_clause_results: vec![ContentFilterElementResult::default()],
        };
        assert!(!result.has_errors());
        result.where_clause_results[0].operand_status_codes = vec![StatusCode::BAD_NODE_ID_UNKNOWN];
        assert!(result.has_errors());
    }
}
