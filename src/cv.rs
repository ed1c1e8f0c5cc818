//! Controlled Vocabulary (CV) parameter handling for mzML
//!
//! mzML uses CV terms from the PSI-MS ontology to describe data semantically.
//! Terms are carried as [`CvParam`] values and never looked up in the
//! ontology; only the handful of accessions the codec itself acts on are
//! named in [`MS_CV_ACCESSIONS`].

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::xml::XmlElement;

/// A controlled vocabulary parameter from mzML
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CvParam {
    /// CV reference (e.g., "MS" for PSI-MS)
    pub cv_ref: String,

    /// Accession number (e.g., "MS:1000511")
    pub accession: String,

    /// Human-readable name
    pub name: String,

    /// Optional value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    /// Unit CV reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_cv_ref: Option<String>,

    /// Unit accession
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_accession: Option<String>,

    /// Unit name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_name: Option<String>,
}

impl CvParam {
    /// Parameter without a value, `cvRef` taken from the accession prefix
    pub fn new(accession: &str, name: &str) -> Self {
        Self {
            cv_ref: accession.split(':').next().unwrap_or_default().to_string(),
            accession: accession.to_string(),
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Builder-style value setter
    pub fn with_value(mut self, value: impl ToString) -> Self {
        self.value = Some(value.to_string());
        self
    }

    /// Builder-style unit setter
    pub fn with_unit(mut self, accession: &str, name: &str) -> Self {
        self.unit_cv_ref = accession.split(':').next().map(str::to_string);
        self.unit_accession = Some(accession.to_string());
        self.unit_name = Some(name.to_string());
        self
    }

    /// Parse the value, `None` for flags and unparsable values
    pub fn parse_value<T: FromStr>(&self) -> Option<T> {
        self.value.as_deref()?.trim().parse().ok()
    }

    /// Read a `<cvParam>` element. Missing attributes become empty strings.
    pub fn from_element(element: &XmlElement) -> Self {
        let attr = |name: &str| element.attribute(name).map(str::to_string);
        Self {
            cv_ref: attr("cvRef").unwrap_or_default(),
            accession: attr("accession").unwrap_or_default(),
            name: attr("name").unwrap_or_default(),
            // An empty value attribute is how flags are usually written.
            value: attr("value").filter(|v| !v.is_empty()),
            unit_cv_ref: attr("unitCvRef"),
            unit_accession: attr("unitAccession"),
            unit_name: attr("unitName"),
        }
    }

    /// Build the `<cvParam>` element. `value` is always written, empty for flags.
    pub fn to_element(&self) -> XmlElement {
        let mut element = XmlElement::new("cvParam")
            .with_attribute("cvRef", &self.cv_ref)
            .with_attribute("accession", &self.accession)
            .with_attribute("name", &self.name)
            .with_attribute("value", self.value.as_deref().unwrap_or_default());
        if let Some(unit) = &self.unit_cv_ref {
            element.attributes.set("unitCvRef", unit);
        }
        if let Some(unit) = &self.unit_accession {
            element.attributes.set("unitAccession", unit);
        }
        if let Some(unit) = &self.unit_name {
            element.attributes.set("unitName", unit);
        }
        element
    }
}

/// A free-form `<userParam>`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserParam {
    /// Parameter name
    pub name: String,

    /// Optional value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    /// Optional XML schema type of the value (e.g. "xsd:float")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,

    /// Unit accession
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_accession: Option<String>,

    /// Unit name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_name: Option<String>,
}

impl UserParam {
    /// Read a `<userParam>` element.
    pub fn from_element(element: &XmlElement) -> Self {
        let attr = |name: &str| element.attribute(name).map(str::to_string);
        Self {
            name: attr("name").unwrap_or_default(),
            value: attr("value"),
            value_type: attr("type"),
            unit_accession: attr("unitAccession"),
            unit_name: attr("unitName"),
        }
    }

    /// Build the `<userParam>` element.
    pub fn to_element(&self) -> XmlElement {
        let mut element = XmlElement::new("userParam").with_attribute("name", &self.name);
        let optional = [
            ("type", &self.value_type),
            ("value", &self.value),
            ("unitAccession", &self.unit_accession),
            ("unitName", &self.unit_name),
        ];
        for (name, value) in optional {
            if let Some(value) = value {
                element.attributes.set(name, value);
            }
        }
        if let Some(accession) = &self.unit_accession {
            if let Some(prefix) = accession.split(':').next() {
                element.attributes.set("unitCvRef", prefix);
            }
        }
        element
    }
}

/// PSI-MS and UO accessions the codec reads or writes
#[allow(non_snake_case)]
pub mod MS_CV_ACCESSIONS {
    /// ms level
    pub const MS_LEVEL: &str = "MS:1000511";
    /// centroid spectrum
    pub const CENTROID_SPECTRUM: &str = "MS:1000127";
    /// MS1 spectrum, the file content of the default header
    pub const MS1_SPECTRUM: &str = "MS:1000579";
    /// total ion current
    pub const TOTAL_ION_CURRENT: &str = "MS:1000285";
    /// total ion current chromatogram
    pub const TIC_CHROMATOGRAM: &str = "MS:1000235";

    /// 32-bit float
    pub const FLOAT_32_BIT: &str = "MS:1000521";
    /// 64-bit float
    pub const FLOAT_64_BIT: &str = "MS:1000523";

    /// no compression
    pub const NO_COMPRESSION: &str = "MS:1000576";
    /// zlib compression
    pub const ZLIB_COMPRESSION: &str = "MS:1000574";
    /// MS-Numpress linear prediction compression
    pub const NUMPRESS_LINEAR: &str = "MS:1002312";
    /// MS-Numpress positive integer compression
    pub const NUMPRESS_PIC: &str = "MS:1002313";
    /// MS-Numpress short logged float compression
    pub const NUMPRESS_SLOF: &str = "MS:1002314";
    /// MS-Numpress linear prediction compression followed by zlib compression
    pub const NUMPRESS_LINEAR_ZLIB: &str = "MS:1002746";
    /// MS-Numpress positive integer compression followed by zlib compression
    pub const NUMPRESS_PIC_ZLIB: &str = "MS:1002747";
    /// MS-Numpress short logged float compression followed by zlib compression
    pub const NUMPRESS_SLOF_ZLIB: &str = "MS:1002748";

    /// m/z array
    pub const MZ_ARRAY: &str = "MS:1000514";
    /// intensity array
    pub const INTENSITY_ARRAY: &str = "MS:1000515";
    /// time array
    pub const TIME_ARRAY: &str = "MS:1000595";

    /// m/z unit
    pub const UNIT_MZ: &str = "MS:1000040";
    /// number of detector counts
    pub const UNIT_COUNTS: &str = "MS:1000131";
    /// minute (UO)
    pub const UNIT_MINUTE: &str = "UO:0000031";
}

/// First parameter with `accession`
pub fn find_param<'a>(params: &'a [CvParam], accession: &str) -> Option<&'a CvParam> {
    params.iter().find(|p| p.accession == accession)
}
