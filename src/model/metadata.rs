//! Document-level metadata
//!
//! Everything between `<mzML>` and the first record list is carried as
//! ordered element trees. The codec reads and writes it but never interprets
//! it; only the handful of attributes the lists and the run need are exposed
//! as fields.

use serde::Serialize;

use super::RecordKind;
use crate::cv::{CvParam, MS_CV_ACCESSIONS as CV};
use crate::xml::{Attributes, XmlElement};

/// Namespace of mzML 1.1 documents
pub const MZML_NAMESPACE: &str = "http://psi.hupo.org/ms/mzml";

/// mzML schema version written by default
pub const MZML_VERSION: &str = "1.1.0";

/// XML Schema instance namespace
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";
const MZML_SCHEMA_LOCATION: &str = "http://psi.hupo.org/ms/mzml http://psidev.info/files/ms/mzML/xsd/mzML1.1.0.xsd";

/// Id of the software entry added by [`DocumentMetadata::new`]
pub const SOFTWARE_ID: &str = "mzcodec";
const DATA_PROCESSING_ID: &str = "mzcodec_processing";
const INSTRUMENT_CONFIGURATION_ID: &str = "IC";

/// Metadata of one mzML document
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DocumentMetadata {
    /// Attributes of `<mzML>` (namespaces, version, id, accession)
    pub mzml_attributes: Attributes,

    /// `cvList` through `dataProcessingList`, in document order
    pub header: Vec<XmlElement>,

    /// Attributes of `<run>`
    pub run_attributes: Attributes,

    /// `<run>` children that precede the record lists
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub run_header: Vec<XmlElement>,

    /// `defaultDataProcessingRef` of `<spectrumList>`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spectrum_data_processing_ref: Option<String>,

    /// `defaultDataProcessingRef` of `<chromatogramList>`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chromatogram_data_processing_ref: Option<String>,
}

impl DocumentMetadata {
    /// Minimal valid metadata for a new document with run `run_id`.
    ///
    /// Declares the MS and UO vocabularies, this library as the only
    /// software, one empty instrument configuration and one data processing
    /// entry used as the default for both lists.
    pub fn new(run_id: impl Into<String>) -> Self {
        let software = XmlElement::new("software")
            .with_attribute("id", SOFTWARE_ID)
            .with_attribute("version", env!("CARGO_PKG_VERSION"))
            .with_child(XmlElement::new("userParam").with_attribute("name", SOFTWARE_ID));

        let processing = XmlElement::new("dataProcessing")
            .with_attribute("id", DATA_PROCESSING_ID)
            .with_child(
                XmlElement::new("processingMethod")
                    .with_attribute("order", "0")
                    .with_attribute("softwareRef", SOFTWARE_ID)
                    .with_child(CvParam::new("MS:1000544", "Conversion to mzML").to_element()),
            );

        let header = vec![
            XmlElement::new("cvList")
                .with_attribute("count", "2")
                .with_child(cv_entry("MS", "Proteomics Standards Initiative Mass Spectrometry Ontology"))
                .with_child(cv_entry("UO", "Unit Ontology")),
            XmlElement::new("fileDescription").with_child(
                XmlElement::new("fileContent")
                    .with_child(CvParam::new(CV::MS1_SPECTRUM, "MS1 spectrum").to_element()),
            ),
            list("softwareList", vec![software]),
            list(
                "instrumentConfigurationList",
                vec![XmlElement::new("instrumentConfiguration").with_attribute("id", INSTRUMENT_CONFIGURATION_ID)],
            ),
            list("dataProcessingList", vec![processing]),
        ];

        let mut run_attributes = Attributes::new();
        run_attributes.push("id", run_id);
        run_attributes.push("defaultInstrumentConfigurationRef", INSTRUMENT_CONFIGURATION_ID);

        Self {
            mzml_attributes: default_mzml_attributes(),
            header,
            run_attributes,
            run_header: Vec::new(),
            spectrum_data_processing_ref: Some(DATA_PROCESSING_ID.to_string()),
            chromatogram_data_processing_ref: Some(DATA_PROCESSING_ID.to_string()),
        }
    }

    /// `version` attribute of `<mzML>`
    pub fn version(&self) -> Option<&str> {
        self.mzml_attributes.get("version")
    }

    /// `id` attribute of `<run>`
    pub fn run_id(&self) -> Option<&str> {
        self.run_attributes.get("id")
    }

    /// First header element called `name`
    pub fn header_element(&self, name: &str) -> Option<&XmlElement> {
        self.header.iter().find(|e| e.name == name)
    }

    /// Default data processing reference for one record list
    pub fn default_data_processing_ref(&self, kind: RecordKind) -> Option<&str> {
        match kind {
            RecordKind::Spectrum => self.spectrum_data_processing_ref.as_deref(),
            RecordKind::Chromatogram => self.chromatogram_data_processing_ref.as_deref(),
        }
    }

    /// Ids of the declared software entries
    pub fn software_ids(&self) -> Vec<&str> {
        self.header_element("softwareList")
            .map(|list| list.elements().filter_map(|s| s.attribute("id")).collect())
            .unwrap_or_default()
    }

    /// Make sure `<mzML>` carries the namespace and a version.
    ///
    /// Documents read from disk keep their own attributes; this only fills
    /// gaps so that written output is valid.
    pub(crate) fn mzml_attributes_for_output(&self) -> Attributes {
        let mut attributes = self.mzml_attributes.clone();
        if attributes.get("xmlns").is_none() {
            attributes.push("xmlns", MZML_NAMESPACE);
        }
        if attributes.get("version").is_none() {
            attributes.push("version", MZML_VERSION);
        }
        attributes
    }
}

fn default_mzml_attributes() -> Attributes {
    let mut attributes = Attributes::new();
    attributes.push("xmlns", MZML_NAMESPACE);
    attributes.push("xmlns:xsi", XSI_NAMESPACE);
    attributes.push("xsi:schemaLocation", MZML_SCHEMA_LOCATION);
    attributes.push("version", MZML_VERSION);
    attributes
}

fn cv_entry(id: &str, name: &str) -> XmlElement {
    XmlElement::new("cv")
        .with_attribute("id", id)
        .with_attribute("fullName", name)
}

fn list(name: &str, items: Vec<XmlElement>) -> XmlElement {
    let mut element = XmlElement::new(name).with_attribute("count", items.len().to_string());
    for item in items {
        element.push(item);
    }
    element
}
