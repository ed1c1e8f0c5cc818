//! `<binaryDataArray>` and the per-array encoding policy

use serde::{Deserialize, Serialize};

use super::{BinaryReadMode, RecordError};
use crate::binary::{BinaryArraySpec, BinaryCodec, BinaryError, Compression, EncodedArray, Precision};
use crate::cv::{CvParam, UserParam, MS_CV_ACCESSIONS as CV};
use crate::xml::{decode_id, encode_id, XmlElement, XmlNode};

/// Contents of a binary data array
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum ArrayData {
    /// Values in memory
    Decoded {
        /// The values
        values: Vec<f64>,
    },
    /// Base64 text kept as read, decoded on demand
    Encoded(EncodedArray),
    /// Read without its data; only the length is known
    Omitted {
        /// Number of values in the source document
        length: usize,
    },
}

/// Failure to produce the values of a single array
#[derive(Debug, thiserror::Error)]
pub enum ArrayError {
    /// Encoding or decoding failed
    #[error(transparent)]
    Binary(#[from] BinaryError),

    /// The array was read with [`BinaryReadMode::Skip`]
    #[error("array was read without its data")]
    Omitted,
}

impl ArrayError {
    /// The record-level error for the array at `index`.
    pub fn in_record(self, index: usize) -> RecordError {
        match self {
            ArrayError::Binary(source) => RecordError::Binary { array: index, source },
            ArrayError::Omitted => RecordError::OmittedBinaryData { array: index },
        }
    }
}

/// One `<binaryDataArray>`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinaryDataArray {
    /// Array type and any other descriptive terms. Precision and compression
    /// terms are not kept here; they are derived from the data on output.
    pub cv_params: Vec<CvParam>,
    /// Free-form parameters
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub user_params: Vec<UserParam>,
    /// `referenceableParamGroupRef` ids
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub param_group_refs: Vec<String>,
    /// `dataProcessingRef` attribute
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_processing_ref: Option<String>,
    /// The values, in whichever form they were read or built
    pub data: ArrayData,
}

impl BinaryDataArray {
    /// Array of `values` typed by the CV term `accession`/`name`
    pub fn new(accession: &str, name: &str, values: Vec<f64>) -> Self {
        Self {
            cv_params: vec![CvParam::new(accession, name)],
            user_params: Vec::new(),
            param_group_refs: Vec::new(),
            data_processing_ref: None,
            data: ArrayData::Decoded { values },
        }
    }

    /// m/z array
    pub fn mz(values: Vec<f64>) -> Self {
        let mut array = Self::new(CV::MZ_ARRAY, "m/z array", values);
        array.cv_params[0] = array.cv_params[0].clone().with_unit(CV::UNIT_MZ, "m/z");
        array
    }

    /// Intensity array
    pub fn intensity(values: Vec<f64>) -> Self {
        let mut array = Self::new(CV::INTENSITY_ARRAY, "intensity array", values);
        array.cv_params[0] = array.cv_params[0]
            .clone()
            .with_unit(CV::UNIT_COUNTS, "number of detector counts");
        array
    }

    /// Time array
    pub fn time(values: Vec<f64>) -> Self {
        let mut array = Self::new(CV::TIME_ARRAY, "time array", values);
        array.cv_params[0] = array.cv_params[0].clone().with_unit(CV::UNIT_MINUTE, "minute");
        array
    }

    /// Accession of the array type term, if one is present
    pub fn array_accession(&self) -> Option<&str> {
        self.cv_params
            .iter()
            .map(|p| p.accession.as_str())
            .find(|a| ARRAY_TYPES.contains(a))
            .or_else(|| self.cv_params.first().map(|p| p.accession.as_str()))
    }

    /// Number of values
    pub fn len(&self) -> usize {
        match &self.data {
            ArrayData::Decoded { values } => values.len(),
            ArrayData::Encoded(encoded) => encoded.length,
            ArrayData::Omitted { length } => *length,
        }
    }

    /// True when the array holds no values
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when the values are available without going back to the source
    pub fn has_data(&self) -> bool {
        !matches!(self.data, ArrayData::Omitted { .. })
    }

    /// The values, decoding lazily read arrays.
    pub fn values(&self) -> Result<Vec<f64>, ArrayError> {
        match &self.data {
            ArrayData::Decoded { values } => Ok(values.clone()),
            ArrayData::Encoded(encoded) => Ok(encoded.decode()?),
            ArrayData::Omitted { .. } => Err(ArrayError::Omitted),
        }
    }

    /// Replace encoded data by its decoded values.
    pub fn decode(&mut self) -> Result<(), ArrayError> {
        if let ArrayData::Encoded(encoded) = &self.data {
            let values = encoded.decode()?;
            self.data = ArrayData::Decoded { values };
        }
        Ok(())
    }

    /// Read the array at position `index` of its record.
    pub(crate) fn from_element(
        element: XmlElement,
        index: usize,
        default_length: usize,
        mode: BinaryReadMode,
    ) -> Result<Self, RecordError> {
        let length = match element.attribute("arrayLength") {
            Some(value) => parse_attribute(&element, "arrayLength", value)?,
            None => default_length,
        };
        let data_processing_ref = element.attribute("dataProcessingRef").map(|r| decode_id(r).into_owned());

        let mut precision = Precision::Float64;
        let mut compression = Compression::None;
        let mut cv_params = Vec::new();
        let mut user_params = Vec::new();
        let mut param_group_refs = Vec::new();
        let mut text = String::new();

        for child in element.children {
            let XmlNode::Element(child) = child else {
                continue;
            };
            match child.name.as_str() {
                "cvParam" => {
                    let param = CvParam::from_element(&child);
                    if let Some(p) = Precision::from_cv_accession(&param.accession) {
                        precision = p;
                    } else if let Some(c) = Compression::from_cv_accession(&param.accession) {
                        compression = c;
                    } else {
                        cv_params.push(param);
                    }
                }
                "userParam" => user_params.push(UserParam::from_element(&child)),
                "referenceableParamGroupRef" => {
                    if let Some(r) = child.attribute("ref") {
                        param_group_refs.push(decode_id(r).into_owned());
                    }
                }
                "binary" => text = child.text(),
                _ => {}
            }
        }

        let data = match mode {
            BinaryReadMode::Skip => ArrayData::Omitted { length },
            BinaryReadMode::Lazy => ArrayData::Encoded(EncodedArray {
                text,
                precision,
                compression,
                length,
            }),
            BinaryReadMode::Eager => {
                let values = BinaryCodec::decode(&text, precision, compression, Some(length))
                    .map_err(|source| RecordError::Binary { array: index, source })?;
                ArrayData::Decoded { values }
            }
        };

        Ok(Self {
            cv_params,
            user_params,
            param_group_refs,
            data_processing_ref,
            data,
        })
    }

    pub(crate) fn to_element(
        &self,
        index: usize,
        default_length: usize,
        spec: &BinaryArraySpec,
    ) -> Result<XmlElement, RecordError> {
        self.render(default_length, spec).map_err(|e| e.in_record(index))
    }

    fn render(&self, default_length: usize, spec: &BinaryArraySpec) -> Result<XmlElement, ArrayError> {
        let encoded = match &self.data {
            ArrayData::Encoded(encoded)
                if encoded.precision == spec.precision && encoded.compression == spec.compression =>
            {
                encoded.clone()
            }
            ArrayData::Encoded(encoded) => BinaryCodec::encode(&encoded.decode()?, spec)?,
            ArrayData::Decoded { values } => BinaryCodec::encode(values, spec)?,
            ArrayData::Omitted { .. } => return Err(ArrayError::Omitted),
        };

        let mut element =
            XmlElement::new("binaryDataArray").with_attribute("encodedLength", encoded.encoded_length().to_string());
        if encoded.length != default_length {
            element.attributes.set("arrayLength", encoded.length.to_string());
        }
        if let Some(r) = &self.data_processing_ref {
            element.attributes.set("dataProcessingRef", encode_id(r));
        }
        for r in &self.param_group_refs {
            element.push(XmlElement::new("referenceableParamGroupRef").with_attribute("ref", encode_id(r)));
        }
        element.push(CvParam::new(encoded.precision.cv_accession(), encoded.precision.cv_name()).to_element());
        element.push(CvParam::new(encoded.compression.cv_accession(), encoded.compression.cv_name()).to_element());
        for param in &self.cv_params {
            element.push(param.to_element());
        }
        for param in &self.user_params {
            element.push(param.to_element());
        }
        element.push(XmlElement::new("binary").with_text(encoded.text));
        Ok(element)
    }
}

fn parse_attribute<T: std::str::FromStr>(element: &XmlElement, attribute: &'static str, value: &str) -> Result<T, RecordError> {
    value.trim().parse().map_err(|_| RecordError::InvalidAttributeValue {
        element: element.name.clone(),
        attribute,
        value: value.to_string(),
    })
}

const ARRAY_TYPES: [&str; 3] = [CV::MZ_ARRAY, CV::INTENSITY_ARRAY, CV::TIME_ARRAY];

fn numpress_spec(compression: Compression, tolerance: f64) -> BinaryArraySpec {
    BinaryArraySpec::new(Precision::Float64, compression).with_tolerance(tolerance)
}

/// Encoding chosen per array type when writing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodingPolicy {
    /// m/z arrays
    pub mz: BinaryArraySpec,
    /// Intensity arrays
    pub intensity: BinaryArraySpec,
    /// Time arrays
    pub time: BinaryArraySpec,
    /// Every other array type
    pub other: BinaryArraySpec,
}

impl Default for EncodingPolicy {
    fn default() -> Self {
        Self::lossless()
    }
}

impl EncodingPolicy {
    /// 64-bit zlib everywhere
    pub fn lossless() -> Self {
        let spec = BinaryArraySpec::new(Precision::Float64, Compression::Zlib);
        Self {
            mz: spec.clone(),
            intensity: spec.clone(),
            time: spec.clone(),
            other: spec,
        }
    }

    /// 64-bit m/z and time, 32-bit intensities, all zlib
    pub fn compact() -> Self {
        Self {
            intensity: BinaryArraySpec::new(Precision::Float32, Compression::Zlib),
            other: BinaryArraySpec::new(Precision::Float32, Compression::Zlib),
            ..Self::lossless()
        }
    }

    /// Numpress linear for m/z and time, slof for intensities, each followed
    /// by zlib and guarded by the usual tolerances.
    pub fn numpress() -> Self {
        Self {
            mz: numpress_spec(Compression::NumpressLinearZlib, 2e-9),
            intensity: numpress_spec(Compression::NumpressSlofZlib, 2e-4),
            time: numpress_spec(Compression::NumpressLinearZlib, 2e-9),
            other: BinaryArraySpec::new(Precision::Float64, Compression::Zlib),
        }
    }

    /// Spec for an array whose type term is `accession`
    pub fn spec_for(&self, accession: Option<&str>) -> &BinaryArraySpec {
        match accession {
            Some(CV::MZ_ARRAY) => &self.mz,
            Some(CV::INTENSITY_ARRAY) => &self.intensity,
            Some(CV::TIME_ARRAY) => &self.time,
            _ => &self.other,
        }
    }
}
