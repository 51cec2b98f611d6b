//! Region filter encoders for WFS GetFeature requests.

use std::fmt;

use harvester_core::Region;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const FES_NS: &str = "http://www.opengis.net/fes/2.0";
const GML_NS: &str = "http://www.opengis.net/gml/3.2";

type XmlWriter = Writer<Vec<u8>>;

/// How the spatial restriction is put on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestEncoding {
    /// `BBOX=minx,miny,maxx,maxy,SRS` query parameter.
    #[default]
    PlainBbox,
    /// OGC filter document in the `FILTER` query parameter.
    FilterExpression,
}

/// Equality predicate on a feature attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributePredicate {
    pub property: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("attribute predicates require the filter-expression encoding")]
    PredicatesNeedFilter,
    #[error("cannot write filter document: {0}")]
    Xml(String),
}

/// Query parameter carrying the region (and predicates), or `None` when the
/// request is unrestricted.
pub fn encode_region(
    encoding: RequestEncoding,
    region: Option<&Region>,
    srs_name: &str,
    geometry_property: &str,
    predicates: &[AttributePredicate],
) -> Result<Option<(&'static str, String)>, EncodeError> {
    match encoding {
        RequestEncoding::PlainBbox => {
            if !predicates.is_empty() {
                return Err(EncodeError::PredicatesNeedFilter);
            }
            Ok(region.map(|r| ("BBOX", bbox_param(r, srs_name))))
        }
        RequestEncoding::FilterExpression => {
            if region.is_none() && predicates.is_empty() {
                return Ok(None);
            }
            let filter = filter_expression(region, srs_name, geometry_property, predicates)?;
            Ok(Some(("FILTER", filter)))
        }
    }
}

pub fn bbox_param(region: &Region, srs_name: &str) -> String {
    let [min_x, min_y, max_x, max_y] = region.bounds();
    format!("{min_x},{min_y},{max_x},{max_y},{srs_name}")
}

/// FES 2.0 filter document restricting to `region` and every predicate.
pub fn filter_expression(
    region: Option<&Region>,
    srs_name: &str,
    geometry_property: &str,
    predicates: &[AttributePredicate],
) -> Result<String, EncodeError> {
    let mut writer = Writer::new(Vec::new());
    let filter = BytesStart::new("fes:Filter")
        .with_attributes([("xmlns:fes", FES_NS), ("xmlns:gml", GML_NS)]);
    emit(&mut writer, Event::Start(filter))?;

    let combined = usize::from(region.is_some()) + predicates.len() > 1;
    if combined {
        open(&mut writer, "fes:And")?;
    }
    if let Some(region) = region {
        write_bbox(&mut writer, region, srs_name, geometry_property)?;
    }
    for predicate in predicates {
        write_equality(&mut writer, predicate)?;
    }
    if combined {
        close(&mut writer, "fes:And")?;
    }
    close(&mut writer, "fes:Filter")?;

    String::from_utf8(writer.into_inner()).map_err(xml_error)
}

fn write_bbox(
    writer: &mut XmlWriter,
    region: &Region,
    srs_name: &str,
    geometry_property: &str,
) -> Result<(), EncodeError> {
    open(writer, "fes:BBOX")?;
    text_element(writer, "fes:ValueReference", geometry_property)?;
    let envelope = BytesStart::new("gml:Envelope").with_attributes([("srsName", srs_name)]);
    emit(writer, Event::Start(envelope))?;
    let lower = format!("{} {}", region.min_x(), region.min_y());
    let upper = format!("{} {}", region.max_x(), region.max_y());
    text_element(writer, "gml:lowerCorner", &lower)?;
    text_element(writer, "gml:upperCorner", &upper)?;
    close(writer, "gml:Envelope")?;
    close(writer, "fes:BBOX")
}

fn write_equality(writer: &mut XmlWriter, predicate: &AttributePredicate) -> Result<(), EncodeError> {
    open(writer, "fes:PropertyIsEqualTo")?;
    text_element(writer, "fes:ValueReference", &predicate.property)?;
    text_element(writer, "fes:Literal", &predicate.value)?;
    close(writer, "fes:PropertyIsEqualTo")
}

fn text_element(writer: &mut XmlWriter, name: &str, text: &str) -> Result<(), EncodeError> {
    open(writer, name)?;
    emit(writer, Event::Text(BytesText::new(text)))?;
    close(writer, name)
}

fn open(writer: &mut XmlWriter, name: &str) -> Result<(), EncodeError> {
    emit(writer, Event::Start(BytesStart::new(name)))
}

fn close(writer: &mut XmlWriter, name: &str) -> Result<(), EncodeError> {
    emit(writer, Event::End(BytesEnd::new(name)))
}

fn emit(writer: &mut XmlWriter, event: Event<'_>) -> Result<(), EncodeError> {
    writer.write_event(event).map_err(xml_error)
}

fn xml_error(err: impl fmt::Display) -> EncodeError {
    EncodeError::Xml(err.to_string())
}
