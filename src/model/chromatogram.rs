//! `<chromatogram>` records

use serde::Serialize;

use super::{
    expect_element, optional_ref, parse_number, required, BinaryDataArray, BinaryReadMode, Content, ContentRef,
    EncodingPolicy, Record, RecordError, RecordKind,
};
use crate::cv::{CvParam, UserParam, MS_CV_ACCESSIONS as CV};
use crate::xml::{encode_id, XmlElement};

/// A chromatogram: time array plus one or more value arrays
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Chromatogram {
    /// Position in the source list
    pub index: usize,

    /// Native id (e.g. "TIC")
    pub id: String,

    /// Default array length (number of points)
    pub default_array_length: usize,

    /// `dataProcessingRef` attribute
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_processing_ref: Option<String>,

    /// `referenceableParamGroupRef` ids
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub param_group_refs: Vec<String>,

    /// Chromatogram type and other terms
    pub cv_params: Vec<CvParam>,

    /// User parameters
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub user_params: Vec<UserParam>,

    /// `precursor` and `product`, kept as read
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<XmlElement>,

    /// Binary data arrays
    pub arrays: Vec<BinaryDataArray>,
}

impl Chromatogram {
    /// Chromatogram with a time and an intensity array
    pub fn new(id: impl Into<String>, time: Vec<f64>, intensity: Vec<f64>) -> Self {
        Self {
            id: id.into(),
            default_array_length: time.len(),
            arrays: vec![BinaryDataArray::time(time), BinaryDataArray::intensity(intensity)],
            ..Default::default()
        }
    }

    /// Total ion current chromatogram
    pub fn tic(time: Vec<f64>, intensity: Vec<f64>) -> Self {
        let mut chromatogram = Self::new("TIC", time, intensity);
        chromatogram
            .cv_params
            .push(CvParam::new(CV::TIC_CHROMATOGRAM, "total ion current chromatogram"));
        chromatogram
    }

    /// Time array
    pub fn time_array(&self) -> Option<&BinaryDataArray> {
        self.arrays.iter().find(|a| a.array_accession() == Some(CV::TIME_ARRAY))
    }

    /// Intensity array
    pub fn intensity_array(&self) -> Option<&BinaryDataArray> {
        self.arrays
            .iter()
            .find(|a| a.array_accession() == Some(CV::INTENSITY_ARRAY))
    }

    /// Decode any lazily read arrays in place.
    pub fn decode_arrays(&mut self) -> Result<(), RecordError> {
        for (index, array) in self.arrays.iter_mut().enumerate() {
            array.decode().map_err(|e| e.in_record(index))?;
        }
        Ok(())
    }
}

impl Record for Chromatogram {
    const KIND: RecordKind = RecordKind::Chromatogram;

    fn id(&self) -> &str {
        &self.id
    }

    fn to_element(&self, ordinal: usize, encoding: &EncodingPolicy) -> Result<XmlElement, RecordError> {
        let mut element = XmlElement::new("chromatogram")
            .with_attribute("index", ordinal.to_string())
            .with_attribute("id", &self.id)
            .with_attribute("defaultArrayLength", self.default_array_length.to_string());
        if let Some(r) = &self.data_processing_ref {
            element.attributes.set("dataProcessingRef", encode_id(r));
        }

        let parts = ContentRef {
            param_group_refs: &self.param_group_refs,
            cv_params: &self.cv_params,
            user_params: &self.user_params,
            children: &self.children,
            arrays: &self.arrays,
        };
        Content::write(&mut element, parts, self.default_array_length, encoding, true)?;
        Ok(element)
    }

    fn from_element(mut element: XmlElement, mode: BinaryReadMode) -> Result<Self, RecordError> {
        expect_element(&element, RecordKind::Chromatogram)?;
        let index = parse_number(&element, "index")?;
        let id = required(&element, "id")?.to_string();
        let default_array_length = parse_number(&element, "defaultArrayLength")?;
        let data_processing_ref = optional_ref(&element, "dataProcessingRef");

        let content = Content::read(element.take_children(), default_array_length, mode)?;
        Ok(Self {
            index,
            id,
            default_array_length,
            data_processing_ref,
            param_group_refs: content.param_group_refs,
            cv_params: content.cv_params,
            user_params: content.user_params,
            children: content.children,
            arrays: content.arrays,
        })
    }
}
