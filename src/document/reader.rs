// src/document/reader.rs

//! Reads a VFM document back into plain data, the way the optimizer that
//! consumes it does.

use std::fs;
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::{
    XmlElement, MEASURED_DISPLACEMENTS_TAG, MEASURED_LOADS_TAG, NODE_TAG, PARAMETERS_TAG, ROOT_TAG,
    SURFACE_TAG, TIME_TAG, VIRTUAL_DISPLACEMENTS_TAG, VIRTUAL_DISPLACEMENT_TAG,
};
use crate::VfmError;

/// One nodal sample of a time slice.
#[derive(Debug, Clone, PartialEq)]
pub struct NodalSample {
    pub id: i64,
    pub value: [f64; 3],
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSliceNodes {
    pub t: i64,
    pub nodes: Vec<NodalSample>,
}

/// A virtual field block. `id` is -1 when the block carries none.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VirtualFieldInput {
    pub id: i64,
    pub times: Vec<TimeSliceNodes>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceLoad {
    pub surface: String,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSliceLoads {
    pub t: i64,
    pub loads: Vec<SurfaceLoad>,
}

/// An optimization parameter: initial guess, bounds and scale.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterInput {
    pub name: String,
    pub initial: f64,
    pub lower: f64,
    pub upper: f64,
    pub scale: f64,
}

/// Everything a VFM document carries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VfmInput {
    pub measured_displacements: Vec<TimeSliceNodes>,
    pub virtual_displacements: Vec<VirtualFieldInput>,
    pub measured_loads: Vec<TimeSliceLoads>,
    pub parameters: Vec<ParameterInput>,
}

pub fn load_document<P: AsRef<Path>>(path: P) -> Result<VfmInput, VfmError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .map_err(|e| VfmError::FileAccess(format!("{}: {}", path.display(), e)))?;
    read_document(&content)
}

pub fn read_document(content: &str) -> Result<VfmInput, VfmError> {
    let root = parse_tree(content)?;
    if root.name != ROOT_TAG {
        return Err(VfmError::Document(format!(
            "expected <{}> root, found <{}>",
            ROOT_TAG, root.name
        )));
    }

    let mut input = VfmInput::default();
    for section in &root.children {
        match section.name.as_str() {
            MEASURED_DISPLACEMENTS_TAG => input.measured_displacements = parse_node_slices(section)?,
            VIRTUAL_DISPLACEMENTS_TAG => input.virtual_displacements = parse_virtual_fields(section)?,
            MEASURED_LOADS_TAG => input.measured_loads = parse_load_slices(section)?,
            PARAMETERS_TAG => input.parameters = parse_parameters(section)?,
            other => {
                return Err(VfmError::Document(format!(
                    "unexpected <{}> in <{}>",
                    other, ROOT_TAG
                )))
            }
        }
    }
    Ok(input)
}

/// Parses XML text into an element tree. Whitespace-only text is dropped.
pub fn parse_tree(content: &str) -> Result<XmlElement, VfmError> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => stack.push(element_from_start(e)?),
            Ok(Event::Empty(ref e)) => {
                let element = element_from_start(e)?;
                attach(&mut stack, &mut root, element)?;
            }
            Ok(Event::Text(ref e)) => {
                let text = e
                    .unescape()
                    .map_err(|e| VfmError::Document(format!("invalid text: {e}")))?;
                match stack.last_mut() {
                    Some(parent) => parent.text.get_or_insert_with(String::new).push_str(&text),
                    None => {
                        return Err(VfmError::Document(format!(
                            "text outside of the root element: '{}'",
                            text
                        )))
                    }
                }
            }
            Ok(Event::End(_)) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| VfmError::Document("unbalanced closing tag".to_string()))?;
                attach(&mut stack, &mut root, element)?;
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(VfmError::Document(format!(
                    "XML parse error at position {}: {e}",
                    reader.buffer_position()
                )))
            }
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(VfmError::Document(format!("<{}> is never closed", open.name)));
    }
    root.ok_or_else(|| VfmError::Document("document has no root element".to_string()))
}

fn element_from_start(start: &BytesStart<'_>) -> Result<XmlElement, VfmError> {
    let mut element = XmlElement::new(&String::from_utf8_lossy(start.name().as_ref()));
    for attr in start.attributes() {
        let attr = attr.map_err(|e| VfmError::Document(format!("invalid attribute: {e}")))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| VfmError::Document(format!("invalid value for attribute '{}': {e}", key)))?;
        element.attributes.push((key, value.into_owned()));
    }
    Ok(element)
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<(), VfmError> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
    } else if root.is_none() {
        *root = Some(element);
    } else {
        return Err(VfmError::Document(format!(
            "second root element <{}>",
            element.name
        )));
    }
    Ok(())
}

/// `time` slices of `node` samples. Other children are skipped; at least
/// one slice is required.
fn parse_node_slices(block: &XmlElement) -> Result<Vec<TimeSliceNodes>, VfmError> {
    let mut slices = Vec::new();
    for time in block.children_named(TIME_TAG) {
        let mut slice = TimeSliceNodes {
            t: integer_attribute(time, "t")?.unwrap_or(0),
            nodes: Vec::new(),
        };
        for node in &time.children {
            if node.name != NODE_TAG && node.name != "elem" {
                return Err(VfmError::Document(format!(
                    "unexpected <{}> in <{}>",
                    node.name, TIME_TAG
                )));
            }
            let values = parse_values(node)?;
            let mut value = [0.0; 3];
            for (slot, v) in value.iter_mut().zip(values) {
                *slot = v;
            }
            slice.nodes.push(NodalSample {
                id: integer_attribute(node, "id")?.unwrap_or(-1),
                value,
            });
        }
        slices.push(slice);
    }

    if slices.is_empty() {
        return Err(VfmError::Document(format!("<{}> has no <{}> entries", block.name, TIME_TAG)));
    }
    Ok(slices)
}

fn parse_virtual_fields(section: &XmlElement) -> Result<Vec<VirtualFieldInput>, VfmError> {
    let mut fields = Vec::new();
    for child in &section.children {
        match child.name.as_str() {
            VIRTUAL_DISPLACEMENT_TAG => fields.push(VirtualFieldInput {
                id: integer_attribute(child, "id")?.unwrap_or(-1),
                times: parse_node_slices(child)?,
            }),
            // older documents put the time slices of a single field directly here
            TIME_TAG => {
                fields.push(VirtualFieldInput {
                    id: -1,
                    times: parse_node_slices(section)?,
                });
                break;
            }
            other => {
                return Err(VfmError::Document(format!(
                    "unexpected <{}> in <{}>",
                    other, section.name
                )))
            }
        }
    }

    if fields.is_empty() {
        return Err(VfmError::Document(format!("<{}> is empty", section.name)));
    }
    Ok(fields)
}

fn parse_load_slices(section: &XmlElement) -> Result<Vec<TimeSliceLoads>, VfmError> {
    let mut slices = Vec::new();
    for time in section.children_named(TIME_TAG) {
        let mut slice = TimeSliceLoads {
            t: integer_attribute(time, "t")?.unwrap_or(0),
            loads: Vec::new(),
        };
        for surface in &time.children {
            if surface.name != SURFACE_TAG {
                return Err(VfmError::Document(format!(
                    "unexpected <{}> in <{}>",
                    surface.name, TIME_TAG
                )));
            }
            slice.loads.push(SurfaceLoad {
                surface: surface.attribute("id").unwrap_or_default().to_string(),
                values: parse_values(surface)?,
            });
        }
        slices.push(slice);
    }

    if slices.is_empty() {
        return Err(VfmError::Document(format!("<{}> has no <{}> entries", section.name, TIME_TAG)));
    }
    Ok(slices)
}

fn parse_parameters(section: &XmlElement) -> Result<Vec<ParameterInput>, VfmError> {
    section
        .children
        .iter()
        .map(|param| {
            if param.name != "param" {
                return Err(VfmError::Document(format!(
                    "unexpected <{}> in <{}>",
                    param.name, section.name
                )));
            }
            let mut values = [0.0, 0.0, 0.0, 1.0];
            for (slot, v) in values.iter_mut().zip(parse_values(param)?) {
                *slot = v;
            }
            Ok(ParameterInput {
                name: param.attribute("name").unwrap_or_default().to_string(),
                initial: values[0],
                lower: values[1],
                upper: values[2],
                scale: values[3],
            })
        })
        .collect()
}

/// Comma-separated numbers of an element's text.
fn parse_values(element: &XmlElement) -> Result<Vec<f64>, VfmError> {
    let text = match element.text.as_deref() {
        Some(text) if !text.trim().is_empty() => text,
        _ => return Ok(Vec::new()),
    };
    text.split(',')
        .map(|item| {
            let item = item.trim();
            item.parse::<f64>().map_err(|e| {
                VfmError::Document(format!(
                    "invalid number '{}' in <{}>: {}",
                    item, element.name, e
                ))
            })
        })
        .collect()
}

fn integer_attribute(element: &XmlElement, key: &str) -> Result<Option<i64>, VfmError> {
    element
        .attribute(key)
        .map(|value| {
            value.trim().parse::<i64>().map_err(|e| {
                VfmError::Document(format!(
                    "invalid {} '{}' on <{}>: {}",
                    key, value, element.name, e
                ))
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<febio_optimize>
  <!-- parameters are added by hand -->
  <Parameters>
    <param name="mu">1.5,0.1,10</param>
  </Parameters>
  <MeasuredDisplacements>
    <time t="0">
      <node id="1">0,0,0</node>
      <node id="2">0.01,-0.005</node>
    </time>
  </MeasuredDisplacements>
  <VirtualDisplacements>
    <virtualdisplacement id="1">
      <time t="1">
        <node id="1">0,0,0</node>
        <node id="2">2,0,0</node>
      </time>
    </virtualdisplacement>
    <virtualdisplacement>
      <time t="1">
        <node id="1">0,2,0</node>
      </time>
    </virtualdisplacement>
  </VirtualDisplacements>
  <MeasuredLoads>
    <time t="1">
      <surface id="PrescribedDisplacement2">-0,1.5</surface>
      <surface id="PrescribedDisplacement3">-6.5</surface>
    </time>
  </MeasuredLoads>
</febio_optimize>
"#;

    #[test]
    fn test_read_document_sections() {
        let input = read_document(DOCUMENT).unwrap();

        assert_eq!(input.measured_displacements.len(), 1);
        let slice = &input.measured_displacements[0];
        assert_eq!(slice.t, 0);
        assert_eq!(slice.nodes[1], NodalSample { id: 2, value: [0.01, -0.005, 0.0] });

        assert_eq!(input.virtual_displacements.len(), 2);
        assert_eq!(input.virtual_displacements[0].id, 1);
        assert_eq!(input.virtual_displacements[0].times[0].nodes[1].value, [2.0, 0.0, 0.0]);
        assert_eq!(input.virtual_displacements[1].id, -1);

        let loads = &input.measured_loads[0];
        assert_eq!(loads.t, 1);
        assert_eq!(loads.loads[0].surface, "PrescribedDisplacement2");
        assert_eq!(loads.loads[0].values, vec![-0.0, 1.5]);
        assert_eq!(loads.loads[1].values, vec![-6.5]);

        assert_eq!(
            input.parameters,
            vec![ParameterInput {
                name: "mu".to_string(),
                initial: 1.5,
                lower: 0.1,
                upper: 10.0,
                scale: 1.0,
            }]
        );
    }

    #[test]
    fn test_legacy_virtual_displacements_without_blocks() {
        let xml = r#"<febio_optimize>
  <VirtualDisplacements>
    <time t="1"><node id="1">1,0,0</node></time>
    <time t="2"><node id="1">2,0,0</node></time>
  </VirtualDisplacements>
</febio_optimize>"#;
        let input = read_document(xml).unwrap();

        assert_eq!(input.virtual_displacements.len(), 1);
        assert_eq!(input.virtual_displacements[0].id, -1);
        assert_eq!(input.virtual_displacements[0].times.len(), 2);
    }

    #[test]
    fn test_wrong_root_is_rejected() {
        let result = read_document("<febio_spec><MeasuredLoads/></febio_spec>");
        assert!(matches!(result, Err(VfmError::Document(_))));
    }

    #[test]
    fn test_unknown_section_is_rejected() {
        let result = read_document("<febio_optimize><Extra/></febio_optimize>");
        match result {
            Err(VfmError::Document(msg)) => assert!(msg.contains("Extra")),
            other => panic!("expected document error, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_number_is_rejected() {
        let xml = r#"<febio_optimize><MeasuredLoads><time t="1">
            <surface id="PrescribedDisplacement2">1.0,abc</surface>
        </time></MeasuredLoads></febio_optimize>"#;
        assert!(matches!(read_document(xml), Err(VfmError::Document(_))));
    }

    #[test]
    fn test_empty_section_is_rejected() {
        let result = read_document("<febio_optimize><MeasuredDisplacements/></febio_optimize>");
        assert!(matches!(result, Err(VfmError::Document(_))));
    }

    #[test]
    fn test_unclosed_element_is_rejected() {
        assert!(matches!(parse_tree("<febio_optimize><MeasuredLoads>"), Err(VfmError::Document(_))));
    }

    #[test]
    fn test_load_missing_document() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_document(dir.path().join("VFMData.feb"));
        assert!(matches!(result, Err(VfmError::FileAccess(_))));
    }
}
