// src/document/mod.rs

//! Builds and writes the VFM input document.
//!
//! The document is assembled as an owned element tree first and only then
//! serialized, so nothing reaches the disk until the whole export has
//! succeeded.

pub mod reader;

use std::fs::{self, File};
use std::io::{Cursor, Write};
use std::path::Path;

use log::{debug, info, warn};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::fields::{VirtualField, VirtualFields};
use crate::format::format_components;
use crate::results::{DisplacementSeries, ReactionSeries};
use crate::VfmError;

pub use reader::{load_document, read_document, VfmInput};

pub const ROOT_TAG: &str = "febio_optimize";
pub const MEASURED_DISPLACEMENTS_TAG: &str = "MeasuredDisplacements";
pub const VIRTUAL_DISPLACEMENTS_TAG: &str = "VirtualDisplacements";
pub const VIRTUAL_DISPLACEMENT_TAG: &str = "virtualdisplacement";
pub const MEASURED_LOADS_TAG: &str = "MeasuredLoads";
pub const PARAMETERS_TAG: &str = "Parameters";
pub const TIME_TAG: &str = "time";
pub const NODE_TAG: &str = "node";
pub const SURFACE_TAG: &str = "surface";

/// Time step the virtual fields are attached to.
pub const VIRTUAL_FIELD_TIME: usize = 1;

const INDENT_WIDTH: usize = 2;

/// A node of the in-memory document tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: Option<String>,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    pub fn new(name: &str) -> Self {
        XmlElement {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_attribute(mut self, key: &str, value: impl ToString) -> Self {
        self.attributes.push((key.to_string(), value.to_string()));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn push(&mut self, child: XmlElement) {
        self.children.push(child);
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Direct children named `name`, in document order.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }
}

/// Assembles the full document tree.
///
/// Measured displacement time steps are numbered from 0, load time steps
/// from 1. The x series is written negated and the y series is written
/// negated; each flip is applied to its own series.
pub fn build_document(
    displacements: &DisplacementSeries,
    fields: &VirtualFields,
    x_loads: &ReactionSeries,
    y_loads: &ReactionSeries,
) -> Result<XmlElement, VfmError> {
    let mut root = XmlElement::new(ROOT_TAG);
    root.push(measured_displacements(displacements));
    root.push(virtual_displacements(fields));

    let x_loads = x_loads.negated();
    let y_loads = y_loads.negated();
    root.push(measured_loads(&x_loads, &y_loads)?);

    Ok(root)
}

fn measured_displacements(displacements: &DisplacementSeries) -> XmlElement {
    let mut section = XmlElement::new(MEASURED_DISPLACEMENTS_TAG);
    for t in 0..displacements.time_steps() {
        let mut time = XmlElement::new(TIME_TAG).with_attribute("t", t);
        for (node_index, vector) in displacements.time_slice(t).outer_iter().enumerate() {
            let components: Vec<f64> = vector.iter().copied().collect();
            time.push(
                XmlElement::new(NODE_TAG)
                    .with_attribute("id", node_index + 1)
                    .with_text(format_components(&components)),
            );
        }
        section.push(time);
    }
    section
}

fn virtual_displacements(fields: &VirtualFields) -> XmlElement {
    let mut section = XmlElement::new(VIRTUAL_DISPLACEMENTS_TAG);
    for field in fields.iter() {
        section.push(virtual_field(field));
    }
    section
}

fn virtual_field(field: &VirtualField) -> XmlElement {
    let mut time = XmlElement::new(TIME_TAG).with_attribute("t", VIRTUAL_FIELD_TIME);
    for (node_index, value) in field.values.iter().enumerate() {
        time.push(
            XmlElement::new(NODE_TAG)
                .with_attribute("id", node_index + 1)
                .with_text(format_components(value.as_slice())),
        );
    }

    let mut block = XmlElement::new(VIRTUAL_DISPLACEMENT_TAG).with_attribute("id", field.id);
    block.push(time);
    block
}

fn measured_loads(x_loads: &ReactionSeries, y_loads: &ReactionSeries) -> Result<XmlElement, VfmError> {
    if y_loads.time_steps() < x_loads.time_steps() {
        return Err(VfmError::Lookup(format!(
            "region '{}' has {} time steps but region '{}' has {}",
            y_loads.region,
            y_loads.time_steps(),
            x_loads.region,
            x_loads.time_steps()
        )));
    }
    if y_loads.time_steps() > x_loads.time_steps() {
        warn!(
            "Region '{}' has {} time steps, only the first {} are written.",
            y_loads.region,
            y_loads.time_steps(),
            x_loads.time_steps()
        );
    }

    let mut section = XmlElement::new(MEASURED_LOADS_TAG);
    for (t, (x_step, y_step)) in x_loads.values.iter().zip(&y_loads.values).enumerate() {
        let mut time = XmlElement::new(TIME_TAG).with_attribute("t", t + 1);
        time.push(
            XmlElement::new(SURFACE_TAG)
                .with_attribute("id", &x_loads.region)
                .with_text(format_components(x_step)),
        );
        time.push(
            XmlElement::new(SURFACE_TAG)
                .with_attribute("id", &y_loads.region)
                .with_text(format_components(y_step)),
        );
        section.push(time);
    }
    Ok(section)
}

/// Serializes the tree as UTF-8 XML with two-space indentation.
pub fn to_pretty_xml(root: &XmlElement) -> Result<String, VfmError> {
    let mut buffer = Vec::new();
    let mut writer = Writer::new_with_indent(Cursor::new(&mut buffer), b' ', INDENT_WIDTH);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(|e| VfmError::Serialization(format!("failed to write XML declaration: {e}")))?;
    write_element(&mut writer, root)?;

    let mut xml = String::from_utf8(buffer)
        .map_err(|e| VfmError::Serialization(format!("invalid UTF-8 in generated XML: {e}")))?;
    xml.push('\n');
    Ok(xml)
}

fn write_element<W: Write>(writer: &mut Writer<W>, element: &XmlElement) -> Result<(), VfmError> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.text.is_none() && element.children.is_empty() {
        return writer
            .write_event(Event::Empty(start))
            .map_err(|e| VfmError::Serialization(format!("failed to write <{}/>: {e}", element.name)));
    }

    writer
        .write_event(Event::Start(start))
        .map_err(|e| VfmError::Serialization(format!("failed to open <{}>: {e}", element.name)))?;
    if let Some(text) = &element.text {
        writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(|e| VfmError::Serialization(format!("failed to write text of <{}>: {e}", element.name)))?;
    }
    for child in &element.children {
        write_element(writer, child)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.name.as_str())))
        .map_err(|e| VfmError::Serialization(format!("failed to close <{}>: {e}", element.name)))
}

/// Writes `xml` to `path`. On failure the partial file is removed.
pub fn write_document<P: AsRef<Path>>(path: P, xml: &str) -> Result<(), VfmError> {
    let path = path.as_ref();
    info!("Writing VFM document: {}", path.display());

    let mut file = File::create(path)
        .map_err(|e| VfmError::Output(format!("failed to create {}: {}", path.display(), e)))?;
    let written = file.write_all(xml.as_bytes()).and_then(|_| file.sync_all());
    drop(file);

    if let Err(e) = written {
        if let Err(cleanup) = fs::remove_file(path) {
            debug!("Could not remove partial file {}: {}", path.display(), cleanup);
        }
        return Err(VfmError::Output(format!("failed to write {}: {}", path.display(), e)));
    }

    debug!("Wrote {} bytes to {}", xml.len(), path.display());
    Ok(())
}
