//! `<spectrum>` records

use serde::Serialize;

use super::{
    expect_element, optional_ref, parse_number, required, BinaryDataArray, BinaryReadMode, Content, ContentRef,
    EncodingPolicy, Record, RecordError, RecordKind,
};
use crate::cv::{find_param, CvParam, UserParam, MS_CV_ACCESSIONS as CV};
use crate::xml::{encode_id, XmlElement};

/// Represents a single spectrum from an mzML file
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Spectrum {
    /// Spectrum index (0-based) as found in the source; the writer
    /// replaces it by the record's position in the output list
    pub index: usize,

    /// Native spectrum ID from the file
    pub id: String,

    /// Default array length (number of peaks)
    pub default_array_length: usize,

    /// `dataProcessingRef` attribute
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_processing_ref: Option<String>,

    /// `sourceFileRef` attribute
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_file_ref: Option<String>,

    /// `spotID` attribute (MALDI)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spot_id: Option<String>,

    /// `referenceableParamGroupRef` ids
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub param_group_refs: Vec<String>,

    /// All CV parameters for this spectrum
    pub cv_params: Vec<CvParam>,

    /// User parameters
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub user_params: Vec<UserParam>,

    /// `scanList`, `precursorList`, `productList`, kept as read
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<XmlElement>,

    /// Binary data arrays
    pub arrays: Vec<BinaryDataArray>,
}

impl Spectrum {
    /// Spectrum with an m/z and an intensity array
    pub fn new(id: impl Into<String>, mz: Vec<f64>, intensity: Vec<f64>) -> Self {
        Self {
            id: id.into(),
            default_array_length: mz.len(),
            arrays: vec![BinaryDataArray::mz(mz), BinaryDataArray::intensity(intensity)],
            ..Default::default()
        }
    }

    /// Builder-style CV parameter appender
    pub fn with_cv_param(mut self, param: CvParam) -> Self {
        self.cv_params.push(param);
        self
    }

    /// MS level, when annotated
    pub fn ms_level(&self) -> Option<i64> {
        find_param(&self.cv_params, CV::MS_LEVEL)?.parse_value()
    }

    /// Whether the spectrum is annotated as centroided
    pub fn is_centroided(&self) -> bool {
        find_param(&self.cv_params, CV::CENTROID_SPECTRUM).is_some()
    }

    /// Total ion current, when annotated
    pub fn total_ion_current(&self) -> Option<f64> {
        find_param(&self.cv_params, CV::TOTAL_ION_CURRENT)?.parse_value()
    }

    /// Scan number taken from the native id.
    ///
    /// Understands the `scan=`, `scanId=` and `index=` (zero based) terms of
    /// vendor native ids, and `S<number>` ids; anything else is `None`.
    pub fn scan_number(&self) -> Option<i64> {
        for term in self.id.split_whitespace() {
            if let Some((key, value)) = term.split_once('=') {
                match key {
                    "scan" | "scanId" => return value.parse().ok(),
                    "index" => return value.parse::<i64>().ok().map(|i| i + 1),
                    _ => {}
                }
            }
        }
        self.id.strip_prefix('S').and_then(|rest| rest.parse().ok())
    }

    /// The array typed `accession`
    pub fn array(&self, accession: &str) -> Option<&BinaryDataArray> {
        self.arrays.iter().find(|a| a.array_accession() == Some(accession))
    }

    /// m/z array
    pub fn mz_array(&self) -> Option<&BinaryDataArray> {
        self.array(CV::MZ_ARRAY)
    }

    /// Intensity array
    pub fn intensity_array(&self) -> Option<&BinaryDataArray> {
        self.array(CV::INTENSITY_ARRAY)
    }

    /// Get the number of peaks
    pub fn peak_count(&self) -> usize {
        self.default_array_length
    }

    /// Decode any lazily read arrays in place.
    pub fn decode_arrays(&mut self) -> Result<(), RecordError> {
        for (index, array) in self.arrays.iter_mut().enumerate() {
            array.decode().map_err(|e| e.in_record(index))?;
        }
        Ok(())
    }
}

impl Record for Spectrum {
    const KIND: RecordKind = RecordKind::Spectrum;

    fn id(&self) -> &str {
        &self.id
    }

    fn to_element(&self, ordinal: usize, encoding: &EncodingPolicy) -> Result<XmlElement, RecordError> {
        let mut element = XmlElement::new("spectrum")
            .with_attribute("index", ordinal.to_string())
            .with_attribute("id", &self.id)
            .with_attribute("defaultArrayLength", self.default_array_length.to_string());
        if let Some(r) = &self.data_processing_ref {
            element.attributes.set("dataProcessingRef", encode_id(r));
        }
        if let Some(r) = &self.source_file_ref {
            element.attributes.set("sourceFileRef", encode_id(r));
        }
        if let Some(spot) = &self.spot_id {
            element.attributes.set("spotID", spot);
        }

        let parts = ContentRef {
            param_group_refs: &self.param_group_refs,
            cv_params: &self.cv_params,
            user_params: &self.user_params,
            children: &self.children,
            arrays: &self.arrays,
        };
        Content::write(&mut element, parts, self.default_array_length, encoding, false)?;
        Ok(element)
    }

    fn from_element(mut element: XmlElement, mode: BinaryReadMode) -> Result<Self, RecordError> {
        expect_element(&element, RecordKind::Spectrum)?;
        let index = parse_number(&element, "index")?;
        let id = required(&element, "id")?.to_string();
        let default_array_length = parse_number(&element, "defaultArrayLength")?;
        let data_processing_ref = optional_ref(&element, "dataProcessingRef");
        let source_file_ref = optional_ref(&element, "sourceFileRef");
        let spot_id = element.attribute("spotID").map(str::to_string);

        let content = Content::read(element.take_children(), default_array_length, mode)?;
        Ok(Self {
            index,
            id,
            default_array_length,
            data_processing_ref,
            source_file_ref,
            spot_id,
            param_group_refs: content.param_group_refs,
            cv_params: content.cv_params,
            user_params: content.user_params,
            children: content.children,
            arrays: content.arrays,
        })
    }
}
