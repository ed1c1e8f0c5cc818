//! Records carried by an mzML document
//!
//! [`Spectrum`] and [`Chromatogram`] are the two record types stored in the
//! indexed lists. Both convert to and from [`XmlElement`] trees through the
//! [`Record`] trait, which is the only thing the reader and writer know about
//! them. Descriptive content the codec does not act on (scan lists,
//! precursors, products) is kept as ordered element trees and written back
//! untouched.

mod array;
mod chromatogram;
mod metadata;
mod spectrum;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use array::{ArrayData, ArrayError, BinaryDataArray, EncodingPolicy};
pub use chromatogram::Chromatogram;
pub use metadata::{DocumentMetadata, MZML_NAMESPACE, MZML_VERSION, XSI_NAMESPACE};
pub use spectrum::Spectrum;

use crate::binary::BinaryError;
use crate::cv::{CvParam, UserParam};
use crate::xml::{decode_id, encode_id, XmlElement, XmlNode};

/// The two kinds of indexed record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    /// `<spectrum>` in `<spectrumList>`
    Spectrum,
    /// `<chromatogram>` in `<chromatogramList>`
    Chromatogram,
}

impl RecordKind {
    /// Record element name
    pub fn element(&self) -> &'static str {
        match self {
            RecordKind::Spectrum => "spectrum",
            RecordKind::Chromatogram => "chromatogram",
        }
    }

    /// Enclosing list element name
    pub fn list_element(&self) -> &'static str {
        match self {
            RecordKind::Spectrum => "spectrumList",
            RecordKind::Chromatogram => "chromatogramList",
        }
    }

    /// `name` attribute of the matching `<index>`
    pub fn index_name(&self) -> &'static str {
        self.element()
    }

    /// Kind whose record element is `name`
    pub fn from_element(name: &str) -> Option<Self> {
        match name {
            "spectrum" => Some(RecordKind::Spectrum),
            "chromatogram" => Some(RecordKind::Chromatogram),
            _ => None,
        }
    }

    /// Kind whose list element is `name`
    pub fn from_list_element(name: &str) -> Option<Self> {
        match name {
            "spectrumList" => Some(RecordKind::Spectrum),
            "chromatogramList" => Some(RecordKind::Chromatogram),
            _ => None,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.element())
    }
}

/// What to do with `<binary>` content while reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BinaryReadMode {
    /// Decode every array while reading
    #[default]
    Eager,
    /// Keep the Base64 text; decode with [`BinaryDataArray::decode`]
    Lazy,
    /// Drop the Base64 text; only array lengths survive
    Skip,
}

/// Errors converting between records and element trees
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    /// A required attribute is absent
    #[error("<{element}> is missing required attribute \"{attribute}\"")]
    MissingAttribute {
        /// Element name
        element: String,
        /// Attribute name
        attribute: &'static str,
    },

    /// An attribute could not be parsed
    #[error("<{element}> has invalid {attribute}=\"{value}\"")]
    InvalidAttributeValue {
        /// Element name
        element: String,
        /// Attribute name
        attribute: &'static str,
        /// Offending value
        value: String,
    },

    /// Encoding or decoding a binary array failed
    #[error("binary data array {array}: {source}")]
    Binary {
        /// Position of the array within its record
        array: usize,
        /// Codec failure
        #[source]
        source: BinaryError,
    },

    /// The array was read with [`BinaryReadMode::Skip`]
    #[error("binary data array {array} was read without its data")]
    OmittedBinaryData {
        /// Position of the array within its record
        array: usize,
    },

    /// The element is not the expected record element
    #[error("expected <{expected}>, found <{found}>")]
    UnexpectedElement {
        /// Element the record type reads
        expected: &'static str,
        /// Element actually given
        found: String,
    },
}

impl RecordError {
    /// True when no fallback compression met the error tolerance
    pub fn is_encoding_violation(&self) -> bool {
        matches!(
            self,
            RecordError::Binary {
                source: BinaryError::EncodingViolation { .. },
                ..
            }
        )
    }
}

/// A record stored in an indexed list.
///
/// Implementations must be cheap to move between threads: the writer renders
/// batches of records on a worker pool.
pub trait Record: Sized + Send + Sync {
    /// Which list the record belongs to
    const KIND: RecordKind;

    /// Native id, unique within its list
    fn id(&self) -> &str;

    /// Build the record element. `ordinal` is the record's position in its
    /// list and becomes the `index` attribute.
    fn to_element(&self, ordinal: usize, encoding: &EncodingPolicy) -> Result<XmlElement, RecordError>;

    /// Read a record from its element.
    fn from_element(element: XmlElement, mode: BinaryReadMode) -> Result<Self, RecordError>;
}

/// Children shared by spectra and chromatograms, split by role.
#[derive(Debug, Default)]
struct Content {
    param_group_refs: Vec<String>,
    cv_params: Vec<CvParam>,
    user_params: Vec<UserParam>,
    children: Vec<XmlElement>,
    arrays: Vec<BinaryDataArray>,
}

impl Content {
    fn read(children: Vec<XmlNode>, default_length: usize, mode: BinaryReadMode) -> Result<Self, RecordError> {
        let mut content = Content::default();
        for node in children {
            let XmlNode::Element(child) = node else {
                continue;
            };
            match child.name.as_str() {
                "referenceableParamGroupRef" => {
                    if let Some(r) = child.attribute("ref") {
                        content.param_group_refs.push(decode_id(r).into_owned());
                    }
                }
                "cvParam" => content.cv_params.push(CvParam::from_element(&child)),
                "userParam" => content.user_params.push(UserParam::from_element(&child)),
                "binaryDataArrayList" => {
                    for node in child.children {
                        let XmlNode::Element(array) = node else {
                            continue;
                        };
                        if array.name != "binaryDataArray" {
                            continue;
                        }
                        let index = content.arrays.len();
                        content
                            .arrays
                            .push(BinaryDataArray::from_element(array, index, default_length, mode)?);
                    }
                }
                _ => content.children.push(child),
            }
        }
        Ok(content)
    }

    /// Append everything after the record's own attributes, in schema order.
    fn write(
        element: &mut XmlElement,
        parts: ContentRef<'_>,
        default_length: usize,
        encoding: &EncodingPolicy,
        always_write_arrays: bool,
    ) -> Result<(), RecordError> {
        for r in parts.param_group_refs {
            element.push(XmlElement::new("referenceableParamGroupRef").with_attribute("ref", encode_id(r)));
        }
        for param in parts.cv_params {
            element.push(param.to_element());
        }
        for param in parts.user_params {
            element.push(param.to_element());
        }
        for child in parts.children {
            element.push(child.clone());
        }
        if always_write_arrays || !parts.arrays.is_empty() {
            let mut list =
                XmlElement::new("binaryDataArrayList").with_attribute("count", parts.arrays.len().to_string());
            for (index, array) in parts.arrays.iter().enumerate() {
                let spec = encoding.spec_for(array.array_accession());
                list.push(array.to_element(index, default_length, spec)?);
            }
            element.push(list);
        }
        Ok(())
    }
}

/// Borrowed view of [`Content`] for writing.
struct ContentRef<'a> {
    param_group_refs: &'a [String],
    cv_params: &'a [CvParam],
    user_params: &'a [UserParam],
    children: &'a [XmlElement],
    arrays: &'a [BinaryDataArray],
}

fn required<'a>(element: &'a XmlElement, attribute: &'static str) -> Result<&'a str, RecordError> {
    element.attribute(attribute).ok_or_else(|| RecordError::MissingAttribute {
        element: element.name.clone(),
        attribute,
    })
}

fn parse_number<T: std::str::FromStr>(element: &XmlElement, attribute: &'static str) -> Result<T, RecordError> {
    let value = required(element, attribute)?;
    value.trim().parse().map_err(|_| RecordError::InvalidAttributeValue {
        element: element.name.clone(),
        attribute,
        value: value.to_string(),
    })
}

fn expect_element(element: &XmlElement, kind: RecordKind) -> Result<(), RecordError> {
    if element.name == kind.element() {
        Ok(())
    } else {
        Err(RecordError::UnexpectedElement {
            expected: kind.element(),
            found: element.name.clone(),
        })
    }
}

fn optional_ref(element: &XmlElement, attribute: &str) -> Option<String> {
    element.attribute(attribute).map(|r| decode_id(r).into_owned())
}
